//! Retention sweeper. Deletes old notification requests.
//!
//! Each run removes at most `batch_limit` records older than the retention
//! window in one atomic batch. Anything beyond the cap waits for the next run.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use pulse_common::error::AppError;

use crate::store::NotificationStore;

/// Default retention window in days.
pub const DEFAULT_RETENTION_DAYS: u32 = 30;

/// Default maximum records deleted per run.
pub const DEFAULT_BATCH_LIMIT: u32 = 500;

/// Result of one sweep.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepReport {
    pub cutoff: DateTime<Utc>,
    pub deleted: u64,
}

/// Deletes notification requests past the retention window.
pub struct RetentionSweeper {
    notifications: Arc<dyn NotificationStore>,
    retention: Duration,
    batch_limit: u32,
}

impl RetentionSweeper {
    pub fn new(notifications: Arc<dyn NotificationStore>, retention_days: u32, batch_limit: u32) -> Self {
        Self {
            notifications,
            retention: Duration::days(retention_days as i64),
            batch_limit,
        }
    }

    /// Sweeper with the 30-day window and 500-record cap.
    pub fn with_defaults(notifications: Arc<dyn NotificationStore>) -> Self {
        Self::new(notifications, DEFAULT_RETENTION_DAYS, DEFAULT_BATCH_LIMIT)
    }

    /// Sweep records created before `now - retention`.
    pub async fn sweep(&self, now: DateTime<Utc>) -> Result<SweepReport, AppError> {
        let cutoff = now - self.retention;
        let expired = self
            .notifications
            .find_expired(cutoff, self.batch_limit)
            .await?;

        if expired.is_empty() {
            tracing::debug!(cutoff = %cutoff, "No expired notifications");
            return Ok(SweepReport { cutoff, deleted: 0 });
        }

        let deleted = self.notifications.delete_batch(&expired).await?;
        tracing::info!(cutoff = %cutoff, deleted, "Deleted old notification documents");

        Ok(SweepReport { cutoff, deleted })
    }
}
