//! Firebase Cloud Messaging (HTTP v1) push channel.
//!
//! HTTP v1 has no multicast endpoint, so a multicast is fanned out as one
//! request per token, issued concurrently. Authentication uses a Google
//! service-account JWT assertion exchanged for a short-lived OAuth token,
//! cached until shortly before it expires.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use pulse_common::config::PushCredentials;

use crate::{ChannelError, MulticastResponse, PushMessage, PushSender, SendResult};

const MESSAGING_SCOPE: &str = "https://www.googleapis.com/auth/firebase.messaging";
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";

/// Lifetime requested for the service-account assertion.
const ASSERTION_LIFETIME_SECS: i64 = 3600;

/// Refresh the cached access token this long before it expires.
const TOKEN_REFRESH_MARGIN_SECS: i64 = 60;

/// Claims of the service-account assertion.
#[derive(Debug, Serialize, Deserialize)]
struct AssertionClaims {
    iss: String,
    scope: String,
    aud: String,
    iat: i64,
    exp: i64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
}

#[derive(Debug, Clone)]
struct CachedToken {
    access_token: String,
    expires_at: DateTime<Utc>,
}

/// Google API error envelope: `{"error": {"code", "message", "status"}}`.
#[derive(Debug, Deserialize)]
struct GoogleErrorEnvelope {
    error: GoogleError,
}

#[derive(Debug, Deserialize)]
struct GoogleError {
    #[serde(default)]
    message: String,
    #[serde(default)]
    status: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SendResponse {
    name: String,
}

/// FCM HTTP v1 client.
pub struct FcmClient {
    credentials: PushCredentials,
    client: reqwest::Client,
    token: Mutex<Option<CachedToken>>,
}

impl FcmClient {
    pub fn new(credentials: PushCredentials, client: reqwest::Client) -> Self {
        Self {
            credentials,
            client,
            token: Mutex::new(None),
        }
    }

    fn send_url(&self) -> String {
        format!(
            "{}/v1/projects/{}/messages:send",
            self.credentials.base_url.trim_end_matches('/'),
            self.credentials.project_id
        )
    }

    /// Build the signed RS256 assertion for the token exchange.
    fn sign_assertion(&self, now: DateTime<Utc>) -> Result<String, ChannelError> {
        let claims = AssertionClaims {
            iss: self.credentials.client_email.clone(),
            scope: MESSAGING_SCOPE.to_string(),
            aud: self.credentials.token_uri.clone(),
            iat: now.timestamp(),
            exp: now.timestamp() + ASSERTION_LIFETIME_SECS,
        };

        let key = EncodingKey::from_rsa_pem(self.credentials.private_key.as_bytes())
            .map_err(|e| ChannelError::Auth(format!("Invalid service account key: {}", e)))?;

        encode(&Header::new(Algorithm::RS256), &claims, &key)
            .map_err(|e| ChannelError::Auth(format!("Failed to sign assertion: {}", e)))
    }

    /// Return a valid OAuth access token, exchanging a fresh assertion when
    /// the cached one is missing or about to expire.
    async fn access_token(&self) -> Result<String, ChannelError> {
        let mut cached = self.token.lock().await;
        let now = Utc::now();

        if let Some(token) = cached.as_ref()
            && token.expires_at > now + Duration::seconds(TOKEN_REFRESH_MARGIN_SECS)
        {
            return Ok(token.access_token.clone());
        }

        let assertion = self.sign_assertion(now)?;
        let response = self
            .client
            .post(&self.credentials.token_uri)
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ChannelError::Auth(format!(
                "Token exchange failed ({}): {}",
                status.as_u16(),
                body
            )));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| ChannelError::InvalidResponse(format!("token response: {}", e)))?;

        tracing::debug!(expires_in = token.expires_in, "Refreshed FCM access token");

        let access_token = token.access_token.clone();
        *cached = Some(CachedToken {
            access_token: token.access_token,
            expires_at: now + Duration::seconds(token.expires_in),
        });

        Ok(access_token)
    }

    /// Send the message to a single token. Transport and API failures become
    /// a failed [`SendResult`] rather than an error.
    async fn send_one(&self, access_token: &str, token: &str, message: &PushMessage) -> SendResult {
        let body = serde_json::json!({
            "message": {
                "token": token,
                "notification": {
                    "title": message.title,
                    "body": message.body,
                },
                "data": message.data,
            }
        });

        let response = match self
            .client
            .post(self.send_url())
            .bearer_auth(access_token)
            .json(&body)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => return SendResult::err(e.to_string()),
        };

        let status = response.status();
        if status.is_success() {
            return match response.json::<SendResponse>().await {
                Ok(sent) => SendResult::ok(sent.name),
                Err(e) => SendResult::err(format!("invalid send response: {}", e)),
            };
        }

        let text = response.text().await.unwrap_or_default();
        SendResult::err(describe_error(status.as_u16(), &text))
    }
}

/// Render an FCM error body as `STATUS: message`, falling back to the raw body.
fn describe_error(status: u16, body: &str) -> String {
    match serde_json::from_str::<GoogleErrorEnvelope>(body) {
        Ok(envelope) => match envelope.error.status {
            Some(code) => format!("{}: {}", code, envelope.error.message),
            None => envelope.error.message,
        },
        Err(_) => format!("HTTP {}: {}", status, body),
    }
}

#[async_trait]
impl PushSender for FcmClient {
    async fn send_multicast(&self, message: &PushMessage) -> Result<MulticastResponse, ChannelError> {
        let access_token = self.access_token().await?;

        let sends = message
            .tokens
            .iter()
            .map(|token| self.send_one(&access_token, token, message));
        let responses = futures::future::join_all(sends).await;

        Ok(MulticastResponse { responses })
    }

    fn name(&self) -> &'static str {
        "fcm"
    }
}
