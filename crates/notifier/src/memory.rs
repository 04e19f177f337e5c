//! In-memory recording senders for tests and local runs.
//!
//! Each sender keeps every message it was asked to deliver and answers from a
//! script set at construction time. Not for production use.

use std::collections::HashSet;
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;

use crate::{
    ChannelError, EmailMessage, EmailSender, MulticastResponse, PushMessage, PushSender,
    SendResult, SmsMessage, SmsSender,
};

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Push sender that succeeds for every token except the configured ones.
#[derive(Debug, Default)]
pub struct RecordingPushSender {
    sent: Mutex<Vec<PushMessage>>,
    failing_tokens: HashSet<String>,
    call_error: Option<String>,
}

impl RecordingPushSender {
    pub fn new() -> Self {
        Self::default()
    }

    /// Report these tokens as unregistered.
    pub fn with_failing_tokens<I, S>(mut self, tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.failing_tokens = tokens.into_iter().map(Into::into).collect();
        self
    }

    /// Fail the whole call with this message.
    pub fn failing_with(mut self, error: impl Into<String>) -> Self {
        self.call_error = Some(error.into());
        self
    }

    pub fn sent(&self) -> Vec<PushMessage> {
        lock(&self.sent).clone()
    }

    pub fn call_count(&self) -> usize {
        lock(&self.sent).len()
    }
}

#[async_trait]
impl PushSender for RecordingPushSender {
    async fn send_multicast(&self, message: &PushMessage) -> Result<MulticastResponse, ChannelError> {
        lock(&self.sent).push(message.clone());

        if let Some(error) = &self.call_error {
            return Err(ChannelError::InvalidResponse(error.clone()));
        }

        let responses = message
            .tokens
            .iter()
            .enumerate()
            .map(|(i, token)| {
                if self.failing_tokens.contains(token) {
                    SendResult::err("UNREGISTERED: Requested entity was not found.")
                } else {
                    SendResult::ok(format!("projects/test/messages/{}", i))
                }
            })
            .collect();

        Ok(MulticastResponse { responses })
    }

    fn name(&self) -> &'static str {
        "recording-push"
    }
}

/// SMS sender returning sequential `SM` identifiers, or a fixed error.
#[derive(Debug, Default)]
pub struct RecordingSmsSender {
    sent: Mutex<Vec<SmsMessage>>,
    error: Option<String>,
}

impl RecordingSmsSender {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_with(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    pub fn sent(&self) -> Vec<SmsMessage> {
        lock(&self.sent).clone()
    }
}

#[async_trait]
impl SmsSender for RecordingSmsSender {
    async fn send_sms(&self, message: &SmsMessage) -> Result<String, ChannelError> {
        let mut sent = lock(&self.sent);
        sent.push(message.clone());

        match &self.error {
            Some(error) => Err(ChannelError::Api {
                provider: "recording-sms",
                status: 400,
                message: error.clone(),
            }),
            None => Ok(format!("SM{:032}", sent.len())),
        }
    }

    fn name(&self) -> &'static str {
        "recording-sms"
    }
}

/// Email sender that accepts everything, or fails with a fixed error.
#[derive(Debug, Default)]
pub struct RecordingEmailSender {
    sent: Mutex<Vec<EmailMessage>>,
    error: Option<String>,
}

impl RecordingEmailSender {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_with(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    pub fn sent(&self) -> Vec<EmailMessage> {
        lock(&self.sent).clone()
    }
}

#[async_trait]
impl EmailSender for RecordingEmailSender {
    async fn send_email(&self, message: &EmailMessage) -> Result<(), ChannelError> {
        lock(&self.sent).push(message.clone());

        match &self.error {
            Some(error) => Err(ChannelError::Api {
                provider: "recording-email",
                status: 403,
                message: error.clone(),
            }),
            None => Ok(()),
        }
    }

    fn name(&self) -> &'static str {
        "recording-email"
    }
}
