//! Outbound delivery channels: push (FCM), SMS (Twilio) and email (SendGrid).
//!
//! Each provider sits behind a small trait so the engine can be driven with the
//! recording senders in [`memory`] under test. No client retries; a failed send
//! is reported once and left to the caller to record.

pub mod fcm;
pub mod memory;
pub mod sendgrid;
pub mod twilio;

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use pulse_common::error::AppError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised by a delivery channel call as a whole.
#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{provider} API error ({status}): {message}")]
    Api {
        provider: &'static str,
        status: u16,
        message: String,
    },

    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl From<ChannelError> for AppError {
    fn from(err: ChannelError) -> Self {
        AppError::Channel(err.to_string())
    }
}

/// A push message addressed to several device tokens at once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushMessage {
    pub tokens: Vec<String>,
    pub title: String,
    pub body: String,
    pub data: HashMap<String, String>,
}

/// Per-token result of a multicast send, in the same order as the tokens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendResult {
    pub message_id: Option<String>,
    pub error: Option<String>,
}

impl SendResult {
    pub fn ok(message_id: impl Into<String>) -> Self {
        Self {
            message_id: Some(message_id.into()),
            error: None,
        }
    }

    pub fn err(error: impl Into<String>) -> Self {
        Self {
            message_id: None,
            error: Some(error.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Aggregate response of a multicast send.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MulticastResponse {
    pub responses: Vec<SendResult>,
}

impl MulticastResponse {
    pub fn success_count(&self) -> usize {
        self.responses.iter().filter(|r| r.is_success()).count()
    }

    pub fn failure_count(&self) -> usize {
        self.responses.len() - self.success_count()
    }

    /// Tokens whose send failed, matched to `tokens` by position.
    pub fn failed_tokens(&self, tokens: &[String]) -> Vec<String> {
        tokens
            .iter()
            .zip(&self.responses)
            .filter(|(_, r)| !r.is_success())
            .map(|(token, _)| token.clone())
            .collect()
    }
}

/// An SMS to a single destination number. The sender number is owned by the
/// client configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SmsMessage {
    pub to: String,
    pub body: String,
}

/// A transactional email with plain-text and HTML bodies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailMessage {
    pub to: String,
    /// Display name shown next to the configured sender address
    pub from_name: String,
    pub subject: String,
    pub text: String,
    pub html: String,
}

/// Multi-recipient push delivery.
#[async_trait]
pub trait PushSender: Send + Sync {
    /// Send one message to every token. `Err` means the call itself failed;
    /// per-token failures are reported inside the response.
    async fn send_multicast(&self, message: &PushMessage) -> Result<MulticastResponse, ChannelError>;

    /// Provider name for logs.
    fn name(&self) -> &'static str;
}

/// SMS delivery.
#[async_trait]
pub trait SmsSender: Send + Sync {
    /// Send an SMS and return the provider's message identifier.
    async fn send_sms(&self, message: &SmsMessage) -> Result<String, ChannelError>;

    fn name(&self) -> &'static str;
}

/// Transactional email delivery.
#[async_trait]
pub trait EmailSender: Send + Sync {
    async fn send_email(&self, message: &EmailMessage) -> Result<(), ChannelError>;

    fn name(&self) -> &'static str;
}

/// Shared HTTP client with the configured request timeout.
pub fn http_client(timeout_secs: u64) -> Result<reqwest::Client, ChannelError> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .user_agent(concat!("pulse-notifier/", env!("CARGO_PKG_VERSION")))
        .build()?;
    Ok(client)
}
