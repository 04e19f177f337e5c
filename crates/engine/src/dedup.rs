//! Trigger-event deduplication using Redis claims on event IDs.
//!
//! The hosting platform delivers trigger events at least once. Before a handler
//! runs, the event ID is claimed with `SET NX EX`; a second delivery of the
//! same ID finds the key present and is dropped. Keys expire on their own.

use redis::AsyncCommands;
use redis::aio::ConnectionManager;

use pulse_common::error::AppError;

/// How long a claimed event ID is remembered (24 hours).
pub const DEFAULT_CLAIM_TTL_SECONDS: u64 = 86_400;

/// Redis-backed event deduplicator.
#[derive(Clone)]
pub struct EventDeduplicator {
    redis: ConnectionManager,
    ttl_seconds: u64,
}

impl EventDeduplicator {
    pub fn new(redis: ConnectionManager) -> Self {
        Self {
            redis,
            ttl_seconds: DEFAULT_CLAIM_TTL_SECONDS,
        }
    }

    pub fn with_ttl(mut self, ttl_seconds: u64) -> Self {
        self.ttl_seconds = ttl_seconds;
        self
    }

    /// Claim an event ID for processing.
    ///
    /// Returns `true` the first time an ID is seen within the TTL (run the
    /// handler) and `false` for a redelivery (skip it).
    pub async fn claim(&self, kind: &str, event_id: &str) -> Result<bool, AppError> {
        let key = Self::claim_key(kind, event_id);
        let mut redis = self.redis.clone();

        // SET key "1" NX EX ttl
        // Some("OK") => newly claimed, None => already claimed
        let result: Option<String> = redis::cmd("SET")
            .arg(&key)
            .arg("1")
            .arg("NX")
            .arg("EX")
            .arg(self.ttl_seconds)
            .query_async(&mut redis)
            .await?;

        let claimed = result.is_some();
        if !claimed {
            tracing::info!(kind, event_id, "Duplicate trigger event suppressed");
        }

        Ok(claimed)
    }

    /// Release a claim so the event can be retried (used when a handler fails).
    pub async fn release(&self, kind: &str, event_id: &str) -> Result<(), AppError> {
        let key = Self::claim_key(kind, event_id);
        let mut redis = self.redis.clone();
        redis.del::<_, ()>(&key).await?;
        Ok(())
    }

    fn claim_key(kind: &str, event_id: &str) -> String {
        format!("trigger:claim:{}:{}", kind, event_id)
    }
}
