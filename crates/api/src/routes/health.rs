//! Health check endpoint.

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::json;

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}

async fn health_check(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "service": "pulse-api",
        "version": env!("CARGO_PKG_VERSION"),
        "channels": {
            "push": state.dispatcher.is_some(),
            "sms": state.composer.sms_enabled(),
            "email": state.composer.email_enabled(),
        },
        "dedup": state.dedup.is_some(),
    }))
}
