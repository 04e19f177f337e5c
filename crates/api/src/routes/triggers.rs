//! Trigger routes. One per event source: notification created, project
//! updated, and the daily sweep schedule.

use std::future::Future;

use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use pulse_common::error::AppError;
use pulse_common::types::{NotificationRequest, ProjectChange};

use crate::middleware::auth::TriggerCaller;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/triggers/notifications", post(notification_created))
        .route("/triggers/projects", post(project_updated))
        .route("/triggers/sweep", post(sweep))
}

/// Body of a notification-created event.
#[derive(Debug, Deserialize)]
pub struct NotificationTrigger {
    /// Platform event ID, used to drop redeliveries
    #[serde(default)]
    pub event_id: Option<String>,
    pub notification: NotificationRequest,
}

/// Body of a project-updated event.
#[derive(Debug, Deserialize)]
pub struct ProjectTrigger {
    #[serde(default)]
    pub event_id: Option<String>,
    #[serde(flatten)]
    pub change: ProjectChange,
}

/// POST /triggers/notifications: dispatch a new notification request.
async fn notification_created(
    State(state): State<AppState>,
    caller: TriggerCaller,
    Json(NotificationTrigger {
        event_id,
        notification,
    }): Json<NotificationTrigger>,
) -> Result<Json<Value>, AppError> {
    let dispatcher = state
        .dispatcher
        .clone()
        .ok_or_else(|| AppError::Config("Push delivery is not configured".to_string()))?;

    tracing::debug!(
        caller = %caller.name,
        notification_id = %notification.id,
        "Notification trigger received"
    );

    run_once(&state, "notification", event_id.as_deref(), || async move {
        dispatcher.dispatch(&notification).await
    })
    .await
}

/// POST /triggers/projects: send invitations on a ready transition.
async fn project_updated(
    State(state): State<AppState>,
    caller: TriggerCaller,
    Json(ProjectTrigger { event_id, change }): Json<ProjectTrigger>,
) -> Result<Json<Value>, AppError> {
    tracing::debug!(
        caller = %caller.name,
        project_id = %change.project_id,
        "Project trigger received"
    );

    let composer = state.composer.clone();
    run_once(&state, "project", event_id.as_deref(), || async move {
        composer.handle(&change).await
    })
    .await
}

/// POST /triggers/sweep: run one retention sweep.
async fn sweep(State(state): State<AppState>, caller: TriggerCaller) -> Result<Json<Value>, AppError> {
    tracing::debug!(caller = %caller.name, "Sweep trigger received");

    let report = state.sweeper.sweep(Utc::now()).await?;
    to_json(&report)
}

/// Run `handler` unless the event was already claimed. A failed handler
/// releases its claim so a redelivery can retry.
async fn run_once<T, F, Fut>(
    state: &AppState,
    kind: &str,
    event_id: Option<&str>,
    handler: F,
) -> Result<Json<Value>, AppError>
where
    T: Serialize,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, AppError>>,
{
    let claim = match (&state.dedup, event_id) {
        (Some(dedup), Some(event_id)) => {
            if !dedup.claim(kind, event_id).await? {
                return Ok(Json(json!({ "duplicate": true })));
            }
            Some((dedup, event_id))
        }
        _ => None,
    };

    match handler().await {
        Ok(outcome) => to_json(&outcome),
        Err(e) => {
            if let Some((dedup, event_id)) = claim
                && let Err(release_err) = dedup.release(kind, event_id).await
            {
                tracing::warn!(kind, event_id, error = %release_err, "Failed to release event claim");
            }
            Err(e)
        }
    }
}

fn to_json<T: Serialize>(value: &T) -> Result<Json<Value>, AppError> {
    serde_json::to_value(value)
        .map(Json)
        .map_err(|e| AppError::Internal(format!("Failed to serialize response: {}", e)))
}
