//! Integration tests for the trigger routes.
//!
//! Uses `tower::ServiceExt` to exercise the Axum router without a real HTTP
//! server. Handlers run against the in-memory store and recording senders.
//! The deduplication test needs Redis:
//!
//! ```bash
//! REDIS_URL="redis://localhost:6379" \
//!   cargo test -p pulse-api --test integration -- --ignored --nocapture
//! ```

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use chrono::{Duration, Utc};
use serde_json::{Value, json};
use tower::ServiceExt;
use uuid::Uuid;

use pulse_api::middleware::auth::encode_jwt;
use pulse_api::routes::create_router;
use pulse_api::state::AppState;
use pulse_common::types::NotificationRequest;
use pulse_engine::dedup::EventDeduplicator;
use pulse_engine::dispatcher::NotificationDispatcher;
use pulse_engine::invitation::InvitationComposer;
use pulse_engine::store::memory::{InMemoryStore, MemoryUser};
use pulse_engine::sweeper::RetentionSweeper;
use pulse_notifier::memory::{RecordingEmailSender, RecordingPushSender, RecordingSmsSender};

const TEST_SECRET: &str = "test-trigger-secret-for-integration-tests";

// ============================================================
// Helpers
// ============================================================

struct Harness {
    store: Arc<InMemoryStore>,
    push: Arc<RecordingPushSender>,
    sms: Arc<RecordingSmsSender>,
    email: Arc<RecordingEmailSender>,
    state: AppState,
}

impl Harness {
    fn new() -> Self {
        Self::with_push(RecordingPushSender::new())
    }

    fn with_push(push: RecordingPushSender) -> Self {
        let store = Arc::new(InMemoryStore::new());
        let push = Arc::new(push);
        let sms = Arc::new(RecordingSmsSender::new());
        let email = Arc::new(RecordingEmailSender::new());

        let dispatcher = NotificationDispatcher::new(push.clone(), store.clone(), store.clone());
        let composer = InvitationComposer::new(
            Some(sms.clone()),
            Some(email.clone()),
            store.clone(),
            store.clone(),
            "https://app.example.com",
        );
        let sweeper = RetentionSweeper::with_defaults(store.clone());

        let state = AppState::new(
            Some(Arc::new(dispatcher)),
            Arc::new(composer),
            Arc::new(sweeper),
            TEST_SECRET,
        );

        Self {
            store,
            push,
            sms,
            email,
            state,
        }
    }

    fn app(&self) -> Router {
        create_router(self.state.clone())
    }
}

fn token() -> String {
    encode_jwt("event-relay", TEST_SECRET, 1).unwrap()
}

fn post(uri: &str, token: Option<&str>, body: &Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json");
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {}", token));
    }
    builder
        .body(Body::from(serde_json::to_string(body).unwrap()))
        .unwrap()
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if body.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&body).unwrap()
    };
    (status, json)
}

fn notification(tokens: &[&str]) -> NotificationRequest {
    serde_json::from_value(json!({
        "id": Uuid::new_v4(),
        "fcm_tokens": tokens,
        "title": "Update",
        "body": "New photo",
    }))
    .unwrap()
}

// ============================================================
// Health and auth
// ============================================================

#[tokio::test]
async fn test_health_endpoint() {
    let harness = Harness::new();

    let (status, json) = send(
        harness.app(),
        Request::builder().uri("/health").body(Body::empty()).unwrap(),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
    assert_eq!(json["service"], "pulse-api");
    assert_eq!(json["channels"]["push"], true);
    assert_eq!(json["channels"]["sms"], true);
    assert_eq!(json["dedup"], false);
}

#[tokio::test]
async fn test_triggers_require_bearer_token() {
    let harness = Harness::new();

    let (status, json) = send(harness.app(), post("/triggers/sweep", None, &json!({}))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(json["error"].as_str().unwrap().contains("Bearer"));

    let forged = encode_jwt("event-relay", "some-other-secret", 1).unwrap();
    let (status, _) = send(harness.app(), post("/triggers/sweep", Some(&forged), &json!({}))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    assert_eq!(harness.store.delete_batches(), 0);
}

#[tokio::test]
async fn test_unauthorized_notification_trigger_sends_nothing() {
    let harness = Harness::new();
    let request = notification(&["t1"]);
    harness.store.insert_notification(request.clone());

    let (status, _) = send(
        harness.app(),
        post("/triggers/notifications", None, &json!({ "notification": request })),
    )
    .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(harness.push.call_count(), 0);
    assert!(!harness.store.notification(request.id).unwrap().processed);
}

// ============================================================
// Notification trigger
// ============================================================

#[tokio::test]
async fn test_notification_trigger_dispatches_and_prunes() {
    let harness = Harness::with_push(RecordingPushSender::new().with_failing_tokens(["t2"]));
    let recipient = Uuid::new_v4();
    harness.store.insert_user(
        recipient,
        MemoryUser {
            fcm_tokens: vec!["t1".into(), "t2".into()],
            ..Default::default()
        },
    );
    let mut request = notification(&["t1", "t2"]);
    request.recipient_id = Some(recipient);
    harness.store.insert_notification(request.clone());

    let (status, json) = send(
        harness.app(),
        post(
            "/triggers/notifications",
            Some(&token()),
            &json!({ "event_id": "evt-1", "notification": request }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "delivered");
    assert_eq!(json["success_count"], 1);
    assert_eq!(json["failure_count"], 1);
    assert_eq!(json["pruned_tokens"], json!(["t2"]));

    let stored = harness.store.notification(request.id).unwrap();
    assert!(stored.processed);
    assert_eq!(harness.store.user_tokens(recipient), vec!["t1".to_string()]);
}

#[tokio::test]
async fn test_notification_trigger_redelivery_is_noop() {
    let harness = Harness::new();
    let mut request = notification(&["t1"]);
    request.processed = true;
    harness.store.insert_notification(request.clone());

    let (status, json) = send(
        harness.app(),
        post("/triggers/notifications", Some(&token()), &json!({ "notification": request })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json, json!({ "status": "already_processed" }));
    assert_eq!(harness.push.call_count(), 0);
    assert_eq!(harness.store.notification_writes(), 0);
}

#[tokio::test]
async fn test_notification_trigger_null_tokens_marks_no_recipients() {
    let harness = Harness::new();
    let request = notification(&[]);
    harness.store.insert_notification(request.clone());

    let (status, json) = send(
        harness.app(),
        post(
            "/triggers/notifications",
            Some(&token()),
            &json!({
                "notification": {
                    "id": request.id,
                    "fcm_tokens": null,
                    "processed": null,
                    "title": "Update",
                }
            }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json, json!({ "status": "no_recipients" }));
    assert_eq!(harness.push.call_count(), 0);

    let stored = harness.store.notification(request.id).unwrap();
    assert!(stored.processed);
    assert_eq!(stored.error.as_deref(), Some("No FCM tokens"));
}

#[tokio::test]
async fn test_notification_trigger_without_push_channel() {
    let harness = Harness::new();
    let mut state = harness.state.clone();
    state.dispatcher = None;
    let request = notification(&["t1"]);
    harness.store.insert_notification(request.clone());

    let (status, json) = send(
        create_router(state),
        post("/triggers/notifications", Some(&token()), &json!({ "notification": request })),
    )
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json["error"], "Push delivery is not configured");
    assert!(!harness.store.notification(request.id).unwrap().processed);
}

#[tokio::test]
async fn test_notification_trigger_rejects_malformed_body() {
    let harness = Harness::new();

    let response = harness
        .app()
        .oneshot(post(
            "/triggers/notifications",
            Some(&token()),
            &json!({ "notification": { "title": "no id" } }),
        ))
        .await
        .unwrap();

    assert!(response.status().is_client_error());
    assert_eq!(harness.push.call_count(), 0);
}

// ============================================================
// Project trigger
// ============================================================

#[tokio::test]
async fn test_project_trigger_sends_invitations() {
    let harness = Harness::new();
    let project_id = Uuid::new_v4();
    let project = json!({
        "project_name": "Kitchen Remodel",
        "client_name": "Sarah",
        "client_phone": "+15551234567",
        "client_email": "sarah@example.com",
    });
    let mut before = project.clone();
    before["invitation_ready"] = json!(false);
    let mut after = project;
    after["invitation_ready"] = json!(true);

    let (status, json) = send(
        harness.app(),
        post(
            "/triggers/projects",
            Some(&token()),
            &json!({ "project_id": project_id, "before": before, "after": after }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "sent");
    assert_eq!(json["invitation_sent"]["sms"]["success"], true);
    assert_eq!(json["invitation_sent"]["email"]["success"], true);

    let sms = harness.sms.sent();
    assert_eq!(sms.len(), 1);
    assert!(
        sms[0]
            .body
            .contains(&format!("https://app.example.com/join/{}", project_id))
    );
    assert_eq!(harness.email.sent().len(), 1);
    assert!(harness.store.invitation(project_id).is_some());
}

#[tokio::test]
async fn test_project_trigger_null_ready_flag_counts_as_not_ready() {
    let harness = Harness::new();
    let project_id = Uuid::new_v4();

    let (status, json) = send(
        harness.app(),
        post(
            "/triggers/projects",
            Some(&token()),
            &json!({
                "project_id": project_id,
                "before": { "client_phone": "+15551234567", "invitation_ready": null },
                "after": { "client_phone": "+15551234567", "invitation_ready": true },
            }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "sent");
    assert_eq!(harness.sms.sent().len(), 1);
    assert!(harness.store.invitation(project_id).is_some());
}

#[tokio::test]
async fn test_project_trigger_skips_non_transition() {
    let harness = Harness::new();
    let project = json!({
        "client_phone": "+15551234567",
        "invitation_ready": true,
    });

    let (status, json) = send(
        harness.app(),
        post(
            "/triggers/projects",
            Some(&token()),
            &json!({ "project_id": Uuid::new_v4(), "before": project, "after": project }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json, json!({ "status": "skipped" }));
    assert!(harness.sms.sent().is_empty());
    assert_eq!(harness.store.project_writes(), 0);
}

// ============================================================
// Sweep trigger
// ============================================================

#[tokio::test]
async fn test_sweep_trigger_deletes_expired() {
    let harness = Harness::new();
    let mut old = notification(&["t1"]);
    old.created_at = Utc::now() - Duration::days(45);
    let fresh = notification(&["t1"]);
    harness.store.insert_notification(old.clone());
    harness.store.insert_notification(fresh.clone());

    let (status, json) = send(harness.app(), post("/triggers/sweep", Some(&token()), &json!({}))).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["deleted"], 1);
    assert!(json["cutoff"].is_string());
    assert!(harness.store.notification(old.id).is_none());
    assert!(harness.store.notification(fresh.id).is_some());
}

// ============================================================
// Deduplication (requires Redis)
// ============================================================

#[tokio::test]
#[ignore]
async fn test_duplicate_event_id_is_suppressed() {
    let url = std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://localhost:6379".to_string());
    let redis = redis::Client::open(url.as_str())
        .unwrap()
        .get_connection_manager()
        .await
        .unwrap();

    let harness = Harness::new();
    let state = harness
        .state
        .clone()
        .with_dedup(EventDeduplicator::new(redis).with_ttl(60));

    let request = notification(&["t1"]);
    harness.store.insert_notification(request.clone());
    let event_id = format!("evt-{}", Uuid::new_v4());
    let body = json!({ "event_id": event_id, "notification": request });

    let (status, first) = send(
        create_router(state.clone()),
        post("/triggers/notifications", Some(&token()), &body),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["status"], "delivered");

    let (status, second) = send(
        create_router(state),
        post("/triggers/notifications", Some(&token()), &body),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(second, json!({ "duplicate": true }));
    assert_eq!(harness.push.call_count(), 1);
}
