//! Shared application state for the Axum API server.

use std::sync::Arc;

use redis::aio::ConnectionManager;
use sqlx::PgPool;

use pulse_common::config::AppConfig;
use pulse_engine::dedup::EventDeduplicator;
use pulse_engine::dispatcher::NotificationDispatcher;
use pulse_engine::invitation::InvitationComposer;
use pulse_engine::store::postgres::PgStore;
use pulse_engine::sweeper::RetentionSweeper;
use pulse_notifier::fcm::FcmClient;
use pulse_notifier::sendgrid::SendGridClient;
use pulse_notifier::twilio::TwilioClient;
use pulse_notifier::{EmailSender, SmsSender, http_client};

/// Application state shared across all route handlers via Axum `State`.
#[derive(Clone)]
pub struct AppState {
    /// `None` when push credentials are not configured
    pub dispatcher: Option<Arc<NotificationDispatcher>>,
    pub composer: Arc<InvitationComposer>,
    pub sweeper: Arc<RetentionSweeper>,
    pub dedup: Option<EventDeduplicator>,
    pub trigger_secret: String,
}

impl AppState {
    pub fn new(
        dispatcher: Option<Arc<NotificationDispatcher>>,
        composer: Arc<InvitationComposer>,
        sweeper: Arc<RetentionSweeper>,
        trigger_secret: impl Into<String>,
    ) -> Self {
        Self {
            dispatcher,
            composer,
            sweeper,
            dedup: None,
            trigger_secret: trigger_secret.into(),
        }
    }

    pub fn with_dedup(mut self, dedup: EventDeduplicator) -> Self {
        self.dedup = Some(dedup);
        self
    }

    /// Wire Postgres-backed handlers and the configured delivery channels.
    pub fn from_config(
        config: &AppConfig,
        pool: PgPool,
        redis: Option<ConnectionManager>,
    ) -> anyhow::Result<Self> {
        let store = Arc::new(PgStore::new(pool));
        let http = http_client(config.http_timeout_secs)?;

        let dispatcher = match &config.push {
            Some(credentials) => {
                let push = Arc::new(FcmClient::new(credentials.clone(), http.clone()));
                Some(Arc::new(NotificationDispatcher::new(
                    push,
                    store.clone(),
                    store.clone(),
                )))
            }
            None => {
                tracing::warn!("FCM credentials not configured, push delivery disabled");
                None
            }
        };

        let sms = config.sms.clone().map(|credentials| {
            Arc::new(TwilioClient::new(credentials, http.clone())) as Arc<dyn SmsSender>
        });
        if sms.is_none() {
            tracing::warn!("Twilio credentials not configured, SMS invitations disabled");
        }

        let email = config.email.clone().map(|credentials| {
            Arc::new(SendGridClient::new(credentials, http.clone())) as Arc<dyn EmailSender>
        });
        if email.is_none() {
            tracing::warn!("SendGrid credentials not configured, email invitations disabled");
        }

        let composer = Arc::new(InvitationComposer::new(
            sms,
            email,
            store.clone(),
            store.clone(),
            config.web_origin.clone(),
        ));

        let sweeper = Arc::new(RetentionSweeper::new(
            store,
            config.notification_retention_days,
            config.sweep_batch_limit,
        ));

        let state = Self::new(dispatcher, composer, sweeper, config.trigger_secret.clone());
        Ok(match redis {
            Some(redis) => state.with_dedup(EventDeduplicator::new(redis)),
            None => state,
        })
    }
}
