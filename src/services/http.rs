//! HTTP messaging provider sender.

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;

use crate::error::{AppError, Result};
use crate::models::NotifierConfig;
use crate::services::{MessageSender, Recipient};
use crate::snapshot::normalize_phone;
use crate::utils::http::create_async_client;

const USER_AGENT: &str = "portal-notifier/0.1";

/// Request body accepted by the provider's send-message endpoint.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct OutgoingMessage<'a> {
    chat_id: String,
    message: &'a str,
    link_preview: bool,
}

/// Delivers messages by POSTing them to the messaging provider.
pub struct HttpSender {
    client: Client,
    endpoint: String,
}

impl HttpSender {
    pub fn new(endpoint: impl Into<String>, timeout_secs: u64) -> Result<Self> {
        Ok(Self {
            client: create_async_client(USER_AGENT, timeout_secs)?,
            endpoint: endpoint.into(),
        })
    }

    /// Build a sender from config; `None` when no endpoint is configured.
    pub fn from_config(config: &NotifierConfig) -> Result<Option<Self>> {
        config
            .endpoint
            .as_deref()
            .map(|endpoint| Self::new(endpoint, config.timeout_secs))
            .transpose()
    }

    /// Provider chat id: `<digits>@c.us` for people, `<id>@g.us` for groups.
    fn chat_id(recipient: &Recipient) -> String {
        match recipient {
            Recipient::Direct(phone) => format!("{}@c.us", normalize_phone(phone)),
            Recipient::Broadcast(channel) => format!("{channel}@g.us"),
        }
    }
}

#[async_trait]
impl MessageSender for HttpSender {
    async fn deliver(&self, recipient: &Recipient, message: &str) -> Result<()> {
        let body = OutgoingMessage {
            chat_id: Self::chat_id(recipient),
            message,
            link_preview: false,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::delivery(recipient.to_string(), e))?;

        response
            .error_for_status()
            .map_err(|e| AppError::delivery(recipient.to_string(), e))?;
        Ok(())
    }
}
