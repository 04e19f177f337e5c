//! Persistence seams for the handlers.
//!
//! The handlers only touch the store through these traits: Postgres in
//! production ([`postgres::PgStore`]), [`memory::InMemoryStore`] under test.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use pulse_common::error::AppError;
use pulse_common::types::{Contractor, DispatchRecord, InvitationSent};

/// Access to notification request records.
#[async_trait]
pub trait NotificationStore: Send + Sync {
    /// Set `processed = true` together with the outcome fields.
    async fn mark_processed(&self, id: Uuid, record: &DispatchRecord) -> Result<(), AppError>;

    /// IDs of records created before `cutoff`, oldest first, at most `limit`.
    async fn find_expired(&self, cutoff: DateTime<Utc>, limit: u32) -> Result<Vec<Uuid>, AppError>;

    /// Delete the given records as one atomic batch. Returns rows removed.
    async fn delete_batch(&self, ids: &[Uuid]) -> Result<u64, AppError>;
}

/// Access to user records: device tokens and contractor profiles.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Remove `tokens` from the user's stored token set.
    async fn remove_tokens(&self, user_id: Uuid, tokens: &[String]) -> Result<(), AppError>;

    /// Look up a contractor; `Ok(None)` when no such user exists.
    async fn find_contractor(&self, id: Uuid) -> Result<Option<Contractor>, AppError>;
}

/// Access to project records.
#[async_trait]
pub trait ProjectStore: Send + Sync {
    /// Merge the `invitation_sent` record onto the project.
    async fn record_invitation(&self, project_id: Uuid, sent: &InvitationSent) -> Result<(), AppError>;
}
