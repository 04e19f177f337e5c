use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

/// Push title used when a request carries none.
pub const DEFAULT_PUSH_TITLE: &str = "ProjectPulse";

/// Push body used when a request carries none.
pub const DEFAULT_PUSH_BODY: &str = "You have a new update";

/// A request to push a message to one user's devices.
///
/// Written by upstream app logic into the `notifications` table; the dispatcher
/// marks it processed exactly once and the sweeper deletes it after the
/// retention window.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct NotificationRequest {
    pub id: Uuid,
    /// User whose stored token set the tokens below were copied from
    #[serde(default)]
    pub recipient_id: Option<Uuid>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub fcm_tokens: Vec<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub body: Option<String>,
    /// Free-form payload forwarded to devices as the FCM `data` map
    #[serde(default)]
    pub data: serde_json::Value,
    #[serde(default, deserialize_with = "null_as_default")]
    pub processed: bool,
    #[serde(default)]
    pub processed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub success_count: Option<i32>,
    #[serde(default)]
    pub failure_count: Option<i32>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default = "Utc::now", deserialize_with = "null_as_now")]
    pub created_at: DateTime<Utc>,
}

impl NotificationRequest {
    /// Title with the app-wide default applied.
    pub fn title_or_default(&self) -> &str {
        non_empty(self.title.as_deref()).unwrap_or(DEFAULT_PUSH_TITLE)
    }

    /// Body with the app-wide default applied.
    pub fn body_or_default(&self) -> &str {
        non_empty(self.body.as_deref()).unwrap_or(DEFAULT_PUSH_BODY)
    }

    /// The `data` payload flattened to the string map FCM requires.
    ///
    /// Non-string values are sent as their JSON text; anything other than an
    /// object yields an empty map.
    pub fn data_map(&self) -> HashMap<String, String> {
        match &self.data {
            serde_json::Value::Object(map) => map
                .iter()
                .map(|(k, v)| {
                    let value = match v {
                        serde_json::Value::String(s) => s.clone(),
                        other => other.to_string(),
                    };
                    (k.clone(), value)
                })
                .collect(),
            _ => HashMap::new(),
        }
    }
}

/// Terminal state written onto a notification request by the dispatcher.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchRecord {
    pub processed_at: DateTime<Utc>,
    pub success_count: Option<i32>,
    pub failure_count: Option<i32>,
    pub error: Option<String>,
}

impl DispatchRecord {
    pub fn delivered(success_count: usize, failure_count: usize) -> Self {
        Self {
            processed_at: Utc::now(),
            success_count: Some(success_count as i32),
            failure_count: Some(failure_count as i32),
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            processed_at: Utc::now(),
            success_count: None,
            failure_count: None,
            error: Some(error.into()),
        }
    }
}

/// Document data of a project as seen by the project-updated trigger.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Project {
    #[serde(default)]
    pub contractor_id: Option<Uuid>,
    #[serde(default)]
    pub client_id: Option<Uuid>,
    #[serde(default)]
    pub project_name: Option<String>,
    #[serde(default)]
    pub client_name: Option<String>,
    #[serde(default)]
    pub client_email: Option<String>,
    #[serde(default)]
    pub client_phone: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub invitation_ready: bool,
    #[serde(default)]
    pub invitation_sent: Option<InvitationSent>,
}

/// A project update: the document before and after the write.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectChange {
    pub project_id: Uuid,
    pub before: Project,
    pub after: Project,
}

impl ProjectChange {
    /// True only for a not-ready → ready transition of `invitation_ready`.
    pub fn is_ready_transition(&self) -> bool {
        !self.before.invitation_ready && self.after.invitation_ready
    }
}

/// Result of one outbound invitation channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelOutcome {
    pub success: bool,
    /// Provider message identifier (Twilio SID for SMS)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ChannelOutcome {
    pub fn sent(sid: Option<String>) -> Self {
        Self {
            success: true,
            sid,
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            sid: None,
            error: Some(error.into()),
        }
    }
}

/// Invitation delivery record merged onto the project as `invitation_sent`.
///
/// A `None` channel means it was not attempted (no contact field or channel
/// not configured) and serializes as `null`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvitationSent {
    pub sms: Option<ChannelOutcome>,
    pub email: Option<ChannelOutcome>,
    pub sent_at: DateTime<Utc>,
}

/// Optional contractor-specific profile stored on the user record.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContractorProfile {
    #[serde(default)]
    pub business_name: Option<String>,
}

/// The contractor user a project references.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Contractor {
    pub id: Uuid,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub contractor_profile: Option<ContractorProfile>,
}

impl Contractor {
    /// Name shown to clients: business name, else the local part of the
    /// account email, else `None`.
    pub fn display_name(&self) -> Option<&str> {
        let business = self
            .contractor_profile
            .as_ref()
            .and_then(|p| non_empty(p.business_name.as_deref()));

        business.or_else(|| {
            self.email
                .as_deref()
                .and_then(|email| email.split('@').next())
                .filter(|local| !local.is_empty())
        })
    }
}

/// Deserialize an explicit `null` the same as a missing field.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Option::<T>::deserialize(deserializer).map(Option::unwrap_or_default)
}

fn null_as_now<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<DateTime<Utc>>::deserialize(deserializer).map(|value| value.unwrap_or_else(Utc::now))
}

/// Treat empty strings like missing values.
pub fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|s| !s.is_empty())
}
