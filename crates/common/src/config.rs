use std::str::FromStr;

use serde::Deserialize;

/// Default origin of the client web app used in invitation links.
pub const DEFAULT_WEB_APP_ORIGIN: &str = "https://projectpulse-7d258.web.app";

/// Service-account credentials for FCM HTTP v1 delivery.
#[derive(Debug, Clone, Deserialize)]
pub struct PushCredentials {
    /// Firebase project ID (path segment of the send endpoint)
    pub project_id: String,

    /// Service-account email, used as the JWT issuer
    pub client_email: String,

    /// PEM-encoded RSA private key of the service account
    pub private_key: String,

    /// OAuth token endpoint
    pub token_uri: String,

    /// FCM API base URL
    pub base_url: String,
}

/// Twilio account credentials.
#[derive(Debug, Clone, Deserialize)]
pub struct SmsCredentials {
    pub account_sid: String,
    pub auth_token: String,

    /// Sender phone number in E.164 form
    pub from_number: String,

    pub base_url: String,
}

/// SendGrid credentials and sender identity.
#[derive(Debug, Clone, Deserialize)]
pub struct EmailCredentials {
    pub api_key: String,
    pub from_email: String,
    pub base_url: String,
}

/// Global application configuration loaded from environment variables.
///
/// Built once at startup and handed to each component; nothing reads the
/// environment after this point.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// PostgreSQL connection string
    pub database_url: String,

    /// Maximum number of PostgreSQL connections in the pool (default: 20)
    pub db_max_connections: u32,

    /// Redis connection string. Enables trigger-event deduplication when set.
    pub redis_url: Option<String>,

    /// Address the trigger API binds to (default: 0.0.0.0:3000)
    pub api_bind_addr: String,

    /// HS256 secret that trigger callers sign their bearer tokens with
    pub trigger_secret: String,

    /// Origin of the client web app, e.g. `https://app.example.com`
    pub web_origin: String,

    /// FCM credentials. Push delivery is disabled when absent.
    pub push: Option<PushCredentials>,

    /// Twilio credentials. SMS invitations are skipped when absent.
    pub sms: Option<SmsCredentials>,

    /// SendGrid credentials. Email invitations are skipped when absent.
    pub email: Option<EmailCredentials>,

    /// Timeout applied to every outbound HTTP request, in seconds (default: 15)
    pub http_timeout_secs: u64,

    /// Age after which notification records are swept, in days (default: 30)
    pub notification_retention_days: u32,

    /// Maximum records deleted per sweep (default: 500)
    pub sweep_batch_limit: u32,

    /// Interval between sweeps in the worker, in seconds (default: 86400)
    pub sweep_interval_secs: u64,
}

impl AppConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        Ok(Self {
            database_url: std::env::var("DATABASE_URL")
                .map_err(|_| anyhow::anyhow!("DATABASE_URL environment variable is required"))?,
            db_max_connections: parse_var("DB_MAX_CONNECTIONS", 20)?,
            redis_url: std::env::var("REDIS_URL").ok(),
            api_bind_addr: std::env::var("API_BIND_ADDR")
                .unwrap_or_else(|_| "0.0.0.0:3000".to_string()),
            trigger_secret: std::env::var("TRIGGER_SECRET")
                .map_err(|_| anyhow::anyhow!("TRIGGER_SECRET environment variable is required"))?,
            web_origin: std::env::var("WEB_APP_ORIGIN")
                .unwrap_or_else(|_| DEFAULT_WEB_APP_ORIGIN.to_string()),
            push: Self::push_from_env(),
            sms: Self::sms_from_env(),
            email: Self::email_from_env(),
            http_timeout_secs: parse_var("HTTP_TIMEOUT_SECS", 15)?,
            notification_retention_days: parse_var("NOTIFICATION_RETENTION_DAYS", 30)?,
            sweep_batch_limit: parse_var("SWEEP_BATCH_LIMIT", 500)?,
            sweep_interval_secs: parse_var("SWEEP_INTERVAL_SECS", 86_400)?,
        })
    }

    fn push_from_env() -> Option<PushCredentials> {
        let project_id = std::env::var("FCM_PROJECT_ID").ok()?;
        let client_email = std::env::var("FCM_CLIENT_EMAIL").ok()?;
        // Keys pasted into .env files usually carry escaped newlines.
        let private_key = std::env::var("FCM_PRIVATE_KEY").ok()?.replace("\\n", "\n");

        Some(PushCredentials {
            project_id,
            client_email,
            private_key,
            token_uri: std::env::var("FCM_TOKEN_URI")
                .unwrap_or_else(|_| "https://oauth2.googleapis.com/token".to_string()),
            base_url: std::env::var("FCM_BASE_URL")
                .unwrap_or_else(|_| "https://fcm.googleapis.com".to_string()),
        })
    }

    fn sms_from_env() -> Option<SmsCredentials> {
        Some(SmsCredentials {
            account_sid: std::env::var("TWILIO_ACCOUNT_SID").ok()?,
            auth_token: std::env::var("TWILIO_AUTH_TOKEN").ok()?,
            from_number: std::env::var("TWILIO_PHONE_NUMBER").ok()?,
            base_url: std::env::var("TWILIO_BASE_URL")
                .unwrap_or_else(|_| "https://api.twilio.com".to_string()),
        })
    }

    fn email_from_env() -> Option<EmailCredentials> {
        Some(EmailCredentials {
            api_key: std::env::var("SENDGRID_API_KEY").ok()?,
            from_email: std::env::var("SENDGRID_FROM_EMAIL").ok()?,
            base_url: std::env::var("SENDGRID_BASE_URL")
                .unwrap_or_else(|_| "https://api.sendgrid.com".to_string()),
        })
    }
}

/// Read and parse an optional variable, falling back to `default` when unset.
fn parse_var<T: FromStr>(name: &str, default: T) -> anyhow::Result<T> {
    match std::env::var(name) {
        Ok(raw) => raw.parse().map_err(|_| {
            anyhow::anyhow!(
                "{} must be a valid {}",
                name,
                std::any::type_name::<T>()
            )
        }),
        Err(_) => Ok(default),
    }
}
