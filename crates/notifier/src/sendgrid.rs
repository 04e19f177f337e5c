//! SendGrid v3 transactional email channel.

use async_trait::async_trait;
use serde::Deserialize;

use pulse_common::config::EmailCredentials;

use crate::{ChannelError, EmailMessage, EmailSender};

/// SendGrid error body: `{"errors": [{"message": "...", "field": "..."}]}`.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    errors: Vec<ErrorItem>,
}

#[derive(Debug, Deserialize)]
struct ErrorItem {
    message: String,
}

/// SendGrid client sending from the configured address.
pub struct SendGridClient {
    credentials: EmailCredentials,
    client: reqwest::Client,
}

impl SendGridClient {
    pub fn new(credentials: EmailCredentials, client: reqwest::Client) -> Self {
        Self {
            credentials,
            client,
        }
    }

    /// Request body for `POST /v3/mail/send`.
    fn request_body(&self, message: &EmailMessage) -> serde_json::Value {
        serde_json::json!({
            "personalizations": [{
                "to": [{ "email": message.to }],
            }],
            "from": {
                "email": self.credentials.from_email,
                "name": message.from_name,
            },
            "subject": message.subject,
            "content": [
                { "type": "text/plain", "value": message.text },
                { "type": "text/html", "value": message.html },
            ],
        })
    }
}

#[async_trait]
impl EmailSender for SendGridClient {
    async fn send_email(&self, message: &EmailMessage) -> Result<(), ChannelError> {
        let url = format!(
            "{}/v3/mail/send",
            self.credentials.base_url.trim_end_matches('/')
        );

        let response = self
            .client
            .post(url)
            .bearer_auth(&self.credentials.api_key)
            .json(&self.request_body(message))
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let text = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorBody>(&text)
            .ok()
            .filter(|body| !body.errors.is_empty())
            .map(|body| {
                body.errors
                    .into_iter()
                    .map(|e| e.message)
                    .collect::<Vec<_>>()
                    .join("; ")
            })
            .unwrap_or(text);

        Err(ChannelError::Api {
            provider: "sendgrid",
            status: status.as_u16(),
            message,
        })
    }

    fn name(&self) -> &'static str {
        "sendgrid"
    }
}
