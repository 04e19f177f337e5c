//! Periodic retention sweep.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::time::MissedTickBehavior;

use pulse_common::error::AppError;
use pulse_engine::sweeper::{RetentionSweeper, SweepReport};

/// Runs the retention sweeper on a fixed interval.
pub struct SweepScheduler {
    sweeper: Arc<RetentionSweeper>,
    interval: Duration,
}

impl SweepScheduler {
    pub fn new(sweeper: Arc<RetentionSweeper>, interval_secs: u64) -> Self {
        Self {
            sweeper,
            interval: Duration::from_secs(interval_secs.max(1)),
        }
    }

    /// Run one sweep now.
    pub async fn tick(&self) -> Result<SweepReport, AppError> {
        self.sweeper.sweep(Utc::now()).await
    }

    /// Sweep immediately, then once per interval. Runs until the task is
    /// cancelled; a failed sweep is logged and retried on the next tick.
    pub async fn run(&self) {
        tracing::info!(interval_secs = self.interval.as_secs(), "Sweep scheduler started");

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;

            match self.tick().await {
                Ok(report) => {
                    tracing::info!(
                        cutoff = %report.cutoff,
                        deleted = report.deleted,
                        "Sweep completed"
                    );
                }
                Err(e) => {
                    tracing::error!(error = %e, "Error deleting old notifications");
                }
            }
        }
    }
}
