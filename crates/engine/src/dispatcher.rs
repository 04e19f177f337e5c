//! Notification dispatcher.
//!
//! Reacts to a newly created notification request:
//! 1. Skips requests already marked processed (redelivered events)
//! 2. Marks requests without tokens as failed, without calling FCM
//! 3. Sends one multicast push and records success/failure counts
//! 4. Prunes tokens FCM rejected from the recipient's stored token set
//!
//! Every path that gets past step 1 writes exactly one terminal record.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use pulse_common::error::AppError;
use pulse_common::types::{DispatchRecord, NotificationRequest};
use pulse_notifier::{PushMessage, PushSender};

use crate::store::{NotificationStore, UserStore};

/// Error recorded when a request lists no device tokens.
pub const NO_TOKENS_ERROR: &str = "No FCM tokens";

/// What the dispatcher did with a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DispatchOutcome {
    /// `processed` was already set; nothing sent or written.
    AlreadyProcessed,
    /// No tokens; marked processed with [`NO_TOKENS_ERROR`].
    NoRecipients,
    /// Multicast completed; per-token failures are counted, not fatal.
    Delivered {
        success_count: usize,
        failure_count: usize,
        pruned_tokens: Vec<String>,
    },
    /// The push call itself failed; the message was recorded verbatim.
    Failed { error: String },
}

/// Push dispatcher for notification requests.
pub struct NotificationDispatcher {
    push: Arc<dyn PushSender>,
    notifications: Arc<dyn NotificationStore>,
    users: Arc<dyn UserStore>,
}

impl NotificationDispatcher {
    pub fn new(
        push: Arc<dyn PushSender>,
        notifications: Arc<dyn NotificationStore>,
        users: Arc<dyn UserStore>,
    ) -> Self {
        Self {
            push,
            notifications,
            users,
        }
    }

    /// Dispatch a newly created notification request.
    ///
    /// Returns `Err` only when the terminal record itself cannot be written.
    pub async fn dispatch(&self, request: &NotificationRequest) -> Result<DispatchOutcome, AppError> {
        if request.processed {
            tracing::debug!(notification_id = %request.id, "Notification already processed, skipping");
            return Ok(DispatchOutcome::AlreadyProcessed);
        }

        if request.fcm_tokens.is_empty() {
            tracing::info!(notification_id = %request.id, "No FCM tokens on notification");
            self.notifications
                .mark_processed(request.id, &DispatchRecord::failed(NO_TOKENS_ERROR))
                .await?;
            return Ok(DispatchOutcome::NoRecipients);
        }

        let message = PushMessage {
            tokens: request.fcm_tokens.clone(),
            title: request.title_or_default().to_string(),
            body: request.body_or_default().to_string(),
            data: request.data_map(),
        };

        let response = match self.push.send_multicast(&message).await {
            Ok(response) => response,
            Err(e) => {
                let error = e.to_string();
                tracing::error!(
                    notification_id = %request.id,
                    channel = self.push.name(),
                    error = %error,
                    "Push send failed"
                );
                self.notifications
                    .mark_processed(request.id, &DispatchRecord::failed(error.clone()))
                    .await?;
                return Ok(DispatchOutcome::Failed { error });
            }
        };

        let success_count = response.success_count();
        let failure_count = response.failure_count();

        tracing::info!(
            notification_id = %request.id,
            success_count,
            failure_count,
            "Push notification sent"
        );

        self.notifications
            .mark_processed(
                request.id,
                &DispatchRecord::delivered(success_count, failure_count),
            )
            .await?;

        let failed_tokens = response.failed_tokens(&message.tokens);
        for (token, result) in message.tokens.iter().zip(&response.responses) {
            if let Some(error) = &result.error {
                tracing::warn!(notification_id = %request.id, token = %token, error = %error, "Failed to send to token");
            }
        }

        let pruned_tokens = self.prune_tokens(request, failed_tokens).await;

        Ok(DispatchOutcome::Delivered {
            success_count,
            failure_count,
            pruned_tokens,
        })
    }

    /// Remove failed tokens from the recipient's token set. Best-effort: a
    /// failure is logged and reported as nothing pruned.
    async fn prune_tokens(&self, request: &NotificationRequest, failed: Vec<String>) -> Vec<String> {
        let Some(recipient_id) = request.recipient_id else {
            return Vec::new();
        };
        if failed.is_empty() {
            return Vec::new();
        }

        match self.users.remove_tokens(recipient_id, &failed).await {
            Ok(()) => {
                tracing::info!(
                    notification_id = %request.id,
                    recipient_id = %recipient_id,
                    removed = failed.len(),
                    "Removed invalid tokens"
                );
                failed
            }
            Err(e) => {
                tracing::warn!(
                    notification_id = %request.id,
                    recipient_id = %recipient_id,
                    error = %e,
                    "Failed to remove invalid tokens"
                );
                Vec::new()
            }
        }
    }
}
