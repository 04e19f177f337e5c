//! Invitation composer.
//!
//! Reacts to project updates. When `invitation_ready` flips from not-ready to
//! ready, it resolves the contractor's display name, sends an SMS and an email
//! to the client independently, and records both outcomes on the project in a
//! single write.
//!
//! If the contractor lookup fails, nothing is sent and nothing is written; the
//! error is returned so the trigger can be replayed.

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use pulse_common::error::AppError;
use pulse_common::types::{ChannelOutcome, InvitationSent, Project, ProjectChange, non_empty};
use pulse_notifier::{EmailMessage, EmailSender, SmsMessage, SmsSender};

use crate::store::{ProjectStore, UserStore};
use crate::template::{
    DEFAULT_CLIENT_NAME, DEFAULT_CONTRACTOR_NAME, DEFAULT_PROJECT_NAME, InvitationContext,
    SENDER_NAME,
};

/// What the composer did with a project update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum InvitationOutcome {
    /// Not a ready transition; no sends, no writes.
    Skipped,
    /// Invitations attempted and the record written to the project.
    Sent { invitation_sent: InvitationSent },
}

/// Composes and sends client invitations.
pub struct InvitationComposer {
    sms: Option<Arc<dyn SmsSender>>,
    email: Option<Arc<dyn EmailSender>>,
    users: Arc<dyn UserStore>,
    projects: Arc<dyn ProjectStore>,
    web_origin: String,
}

impl InvitationComposer {
    /// Channels left as `None` are treated as unconfigured and never attempted.
    pub fn new(
        sms: Option<Arc<dyn SmsSender>>,
        email: Option<Arc<dyn EmailSender>>,
        users: Arc<dyn UserStore>,
        projects: Arc<dyn ProjectStore>,
        web_origin: impl Into<String>,
    ) -> Self {
        Self {
            sms,
            email,
            users,
            projects,
            web_origin: web_origin.into(),
        }
    }

    pub fn sms_enabled(&self) -> bool {
        self.sms.is_some()
    }

    pub fn email_enabled(&self) -> bool {
        self.email.is_some()
    }

    /// `<web_origin>/join/<project_id>`
    pub fn invite_link(&self, project_id: impl std::fmt::Display) -> String {
        format!("{}/join/{}", self.web_origin.trim_end_matches('/'), project_id)
    }

    /// Handle a project update.
    pub async fn handle(&self, change: &ProjectChange) -> Result<InvitationOutcome, AppError> {
        if !change.is_ready_transition() {
            tracing::debug!(
                project_id = %change.project_id,
                "Skipping - invitation not ready or already sent"
            );
            return Ok(InvitationOutcome::Skipped);
        }

        let project = &change.after;
        let contractor_name = self.contractor_name(project).await?;

        let context = InvitationContext {
            contractor_name,
            client_name: non_empty(project.client_name.as_deref())
                .unwrap_or(DEFAULT_CLIENT_NAME)
                .to_string(),
            project_name: non_empty(project.project_name.as_deref())
                .unwrap_or(DEFAULT_PROJECT_NAME)
                .to_string(),
            invite_link: self.invite_link(change.project_id),
        };

        let sms = match non_empty(project.client_phone.as_deref()) {
            Some(phone) => self.send_sms(phone, &context).await,
            None => None,
        };
        let email = match non_empty(project.client_email.as_deref()) {
            Some(address) => self.send_email(address, &context).await,
            None => None,
        };

        let invitation_sent = InvitationSent {
            sms,
            email,
            sent_at: Utc::now(),
        };

        self.projects
            .record_invitation(change.project_id, &invitation_sent)
            .await?;

        tracing::info!(
            project_id = %change.project_id,
            sms = ?invitation_sent.sms.as_ref().map(|o| o.success),
            email = ?invitation_sent.email.as_ref().map(|o| o.success),
            "Invitation processed"
        );

        Ok(InvitationOutcome::Sent { invitation_sent })
    }

    /// Business name, else email local part, else the generic label. A missing
    /// reference or record is not an error; a failed lookup is.
    async fn contractor_name(&self, project: &Project) -> Result<String, AppError> {
        let Some(contractor_id) = project.contractor_id else {
            return Ok(DEFAULT_CONTRACTOR_NAME.to_string());
        };

        let contractor = self.users.find_contractor(contractor_id).await?;
        Ok(contractor
            .as_ref()
            .and_then(|c| c.display_name())
            .unwrap_or(DEFAULT_CONTRACTOR_NAME)
            .to_string())
    }

    async fn send_sms(&self, phone: &str, context: &InvitationContext) -> Option<ChannelOutcome> {
        let sender = self.sms.as_ref()?;
        let message = SmsMessage {
            to: phone.to_string(),
            body: context.sms_body(),
        };

        let outcome = match sender.send_sms(&message).await {
            Ok(sid) => {
                tracing::info!(to = %phone, sid = %sid, "SMS invitation sent");
                ChannelOutcome::sent(Some(sid))
            }
            Err(e) => {
                tracing::error!(to = %phone, channel = sender.name(), error = %e, "Error sending SMS invitation");
                ChannelOutcome::failed(e.to_string())
            }
        };
        Some(outcome)
    }

    async fn send_email(&self, address: &str, context: &InvitationContext) -> Option<ChannelOutcome> {
        let sender = self.email.as_ref()?;
        let message = EmailMessage {
            to: address.to_string(),
            from_name: SENDER_NAME.to_string(),
            subject: context.email_subject(),
            text: context.email_text(),
            html: context.email_html(),
        };

        let outcome = match sender.send_email(&message).await {
            Ok(()) => {
                tracing::info!(to = %address, "Email invitation sent");
                ChannelOutcome::sent(None)
            }
            Err(e) => {
                tracing::error!(to = %address, channel = sender.name(), error = %e, "Error sending email invitation");
                ChannelOutcome::failed(e.to_string())
            }
        };
        Some(outcome)
    }
}
