//! Postgres-backed store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use pulse_common::error::AppError;
use pulse_common::types::{Contractor, ContractorProfile, DispatchRecord, InvitationSent};

use super::{NotificationStore, ProjectStore, UserStore};

/// Store implementation over the `notifications`, `users` and `projects` tables.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl NotificationStore for PgStore {
    async fn mark_processed(&self, id: Uuid, record: &DispatchRecord) -> Result<(), AppError> {
        let result = sqlx::query(
            r#"
            UPDATE notifications
            SET processed = true, processed_at = $2, success_count = $3, failure_count = $4, error = $5
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(record.processed_at)
        .bind(record.success_count)
        .bind(record.failure_count)
        .bind(&record.error)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Notification {} not found", id)));
        }

        Ok(())
    }

    async fn find_expired(&self, cutoff: DateTime<Utc>, limit: u32) -> Result<Vec<Uuid>, AppError> {
        let rows: Vec<(Uuid,)> = sqlx::query_as(
            "SELECT id FROM notifications WHERE created_at < $1 ORDER BY created_at LIMIT $2",
        )
        .bind(cutoff)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    async fn delete_batch(&self, ids: &[Uuid]) -> Result<u64, AppError> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query("DELETE FROM notifications WHERE id = ANY($1)")
            .bind(ids)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(result.rows_affected())
    }
}

#[async_trait]
impl UserStore for PgStore {
    async fn remove_tokens(&self, user_id: Uuid, tokens: &[String]) -> Result<(), AppError> {
        sqlx::query(
            r#"
            UPDATE users
            SET fcm_tokens = ARRAY(SELECT t FROM unnest(fcm_tokens) AS t WHERE t <> ALL($2))
            WHERE id = $1
            "#,
        )
        .bind(user_id)
        .bind(tokens)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find_contractor(&self, id: Uuid) -> Result<Option<Contractor>, AppError> {
        let row: Option<(Uuid, Option<String>, Option<serde_json::Value>)> =
            sqlx::query_as("SELECT id, email, contractor_profile FROM users WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(row.map(|(id, email, profile)| {
            let contractor_profile = profile.and_then(|value| {
                serde_json::from_value::<ContractorProfile>(value)
                    .map_err(|e| {
                        tracing::warn!(contractor_id = %id, error = %e, "Ignoring malformed contractor profile");
                    })
                    .ok()
            });

            Contractor {
                id,
                email,
                contractor_profile,
            }
        }))
    }
}

#[async_trait]
impl ProjectStore for PgStore {
    async fn record_invitation(&self, project_id: Uuid, sent: &InvitationSent) -> Result<(), AppError> {
        let value = serde_json::to_value(sent)
            .map_err(|e| AppError::Internal(format!("Failed to encode invitation record: {}", e)))?;

        let result = sqlx::query(
            "UPDATE projects SET invitation_sent = $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(project_id)
        .bind(value)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Project {} not found", project_id)));
        }

        Ok(())
    }
}
