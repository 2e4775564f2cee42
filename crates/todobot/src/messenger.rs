//! Outbound chat messages.
//!
//! The bot talks to users through a [`Messenger`]. [`LineMessenger`] sends
//! text messages through the LINE Messaging API.

use std::fmt;

use async_trait::async_trait;
use serde::Serialize;
use tracing::debug;

use crate::error::{Error, Result};

/// Sends text messages to chat users.
#[async_trait]
pub trait Messenger: Send + Sync {
    /// Answer a webhook event using its one-time reply token.
    ///
    /// # Errors
    ///
    /// Returns an error if the message could not be delivered.
    async fn reply(&self, reply_token: &str, text: &str) -> Result<()>;

    /// Send an unsolicited message to a user.
    ///
    /// # Errors
    ///
    /// Returns an error if the message could not be delivered.
    async fn push(&self, to: &str, text: &str) -> Result<()>;
}

#[derive(Serialize)]
struct TextMessage<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    text: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ReplyRequest<'a> {
    reply_token: &'a str,
    messages: [TextMessage<'a>; 1],
}

#[derive(Serialize)]
struct PushRequest<'a> {
    to: &'a str,
    messages: [TextMessage<'a>; 1],
}

fn text(text: &str) -> [TextMessage<'_>; 1] {
    [TextMessage { kind: "text", text }]
}

/// LINE Messaging API client.
#[derive(Clone)]
pub struct LineMessenger {
    client: reqwest::Client,
    api_base: String,
    channel_token: String,
}

impl fmt::Debug for LineMessenger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LineMessenger")
            .field("api_base", &self.api_base)
            .finish_non_exhaustive()
    }
}

impl LineMessenger {
    /// Create a client for the API at `api_base` authenticated with `channel_token`.
    #[must_use]
    pub fn new(
        client: reqwest::Client,
        api_base: impl Into<String>,
        channel_token: impl Into<String>,
    ) -> Self {
        Self {
            client,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            channel_token: channel_token.into(),
        }
    }

    async fn post<T: Serialize + Sync>(&self, path: &str, body: &T) -> Result<()> {
        let endpoint = format!("{}{path}", self.api_base);
        let response = self
            .client
            .post(&endpoint)
            .bearer_auth(&self.channel_token)
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::api(endpoint, status.as_u16(), body));
        }

        debug!("POST {} -> {}", endpoint, status);
        Ok(())
    }
}

#[async_trait]
impl Messenger for LineMessenger {
    async fn reply(&self, reply_token: &str, message: &str) -> Result<()> {
        let body = ReplyRequest {
            reply_token,
            messages: text(message),
        };
        self.post("/v2/bot/message/reply", &body).await
    }

    async fn push(&self, to: &str, message: &str) -> Result<()> {
        let body = PushRequest {
            to,
            messages: text(message),
        };
        self.post("/v2/bot/message/push", &body).await
    }
}
