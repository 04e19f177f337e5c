//! Twilio Programmable Messaging SMS channel.

use async_trait::async_trait;
use serde::Deserialize;

use pulse_common::config::SmsCredentials;

use crate::{ChannelError, SmsMessage, SmsSender};

#[derive(Debug, Deserialize)]
struct MessageResource {
    sid: String,
}

/// Twilio error body: `{"code": 21211, "message": "...", "status": 400}`.
#[derive(Debug, Deserialize)]
struct TwilioError {
    #[serde(default)]
    code: Option<u32>,
    message: String,
}

/// Twilio REST client sending from the configured number.
pub struct TwilioClient {
    credentials: SmsCredentials,
    client: reqwest::Client,
}

impl TwilioClient {
    pub fn new(credentials: SmsCredentials, client: reqwest::Client) -> Self {
        Self {
            credentials,
            client,
        }
    }

    fn messages_url(&self) -> String {
        format!(
            "{}/2010-04-01/Accounts/{}/Messages.json",
            self.credentials.base_url.trim_end_matches('/'),
            self.credentials.account_sid
        )
    }
}

#[async_trait]
impl SmsSender for TwilioClient {
    async fn send_sms(&self, message: &SmsMessage) -> Result<String, ChannelError> {
        let response = self
            .client
            .post(self.messages_url())
            .basic_auth(
                &self.credentials.account_sid,
                Some(&self.credentials.auth_token),
            )
            .form(&[
                ("To", message.to.as_str()),
                ("From", self.credentials.from_number.as_str()),
                ("Body", message.body.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let message = match serde_json::from_str::<TwilioError>(&text) {
                Ok(TwilioError {
                    code: Some(code),
                    message,
                }) => format!("{} (code {})", message, code),
                Ok(TwilioError { message, .. }) => message,
                Err(_) => text,
            };
            return Err(ChannelError::Api {
                provider: "twilio",
                status: status.as_u16(),
                message,
            });
        }

        let resource: MessageResource = response
            .json()
            .await
            .map_err(|e| ChannelError::InvalidResponse(format!("twilio message: {}", e)))?;

        tracing::debug!(sid = %resource.sid, "Twilio accepted message");
        Ok(resource.sid)
    }

    fn name(&self) -> &'static str {
        "twilio"
    }
}
