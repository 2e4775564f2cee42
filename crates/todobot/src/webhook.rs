//! Inbound chat webhook payloads and signature checks.
//!
//! The LINE platform posts a JSON body of events to the webhook and signs it
//! with the channel secret in the `X-Line-Signature` header.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;

use crate::error::{Error, Result};

/// Header carrying the webhook body signature.
pub const SIGNATURE_HEADER: &str = "x-line-signature";

/// A webhook request body.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct WebhookBody {
    /// Bot user id the events are addressed to.
    #[serde(default)]
    pub destination: String,
    /// Events in delivery order.
    #[serde(default)]
    pub events: Vec<Event>,
}

/// A single webhook event.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Event {
    /// A user sent a message.
    #[serde(rename_all = "camelCase")]
    Message {
        /// One-time token for replying to this event.
        reply_token: String,
        /// Who sent the message.
        source: Source,
        /// The message itself.
        message: Message,
    },
    /// The bot was added to a group or room.
    #[serde(rename_all = "camelCase")]
    Join {
        /// One-time token for replying to this event.
        reply_token: String,
        /// Where the bot joined.
        source: Source,
    },
    /// A user added the bot as a friend.
    #[serde(rename_all = "camelCase")]
    Follow {
        /// One-time token for replying to this event.
        reply_token: String,
        /// Who followed.
        source: Source,
    },
    /// Any event the bot does not act on.
    #[serde(other)]
    Other,
}

/// The origin of an event.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Source {
    /// `user`, `group` or `room`.
    #[serde(rename = "type", default)]
    pub kind: String,
    /// The user behind the event, when known.
    #[serde(default)]
    pub user_id: Option<String>,
}

/// Message content of a message event.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Message {
    /// A plain text message.
    Text {
        /// The text sent.
        text: String,
    },
    /// Stickers, images, locations and everything else.
    #[serde(other)]
    Other,
}

impl WebhookBody {
    /// Parse a webhook body.
    ///
    /// # Errors
    ///
    /// Returns an error if the body is not valid webhook JSON.
    pub fn parse(body: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(body)?)
    }
}

/// Compute the base64 signature of `body` under `channel_secret`.
#[must_use]
pub fn sign(channel_secret: &str, body: &[u8]) -> String {
    STANDARD.encode(mac(channel_secret, body).finalize().into_bytes())
}

/// Check a webhook signature header against the body.
///
/// # Errors
///
/// Returns [`Error::InvalidSignature`] if the signature is missing, not
/// base64, or does not match.
pub fn verify_signature(channel_secret: &str, body: &[u8], signature: Option<&str>) -> Result<()> {
    let signature = signature.ok_or(Error::InvalidSignature)?;
    let expected = STANDARD
        .decode(signature.trim())
        .map_err(|_| Error::InvalidSignature)?;

    mac(channel_secret, body)
        .verify_slice(&expected)
        .map_err(|_| Error::InvalidSignature)
}

fn mac(channel_secret: &str, body: &[u8]) -> Hmac<Sha256> {
    // HMAC accepts keys of any length.
    let mut mac = Hmac::<Sha256>::new_from_slice(channel_secret.as_bytes())
        .unwrap_or_else(|_| unreachable!("HMAC takes keys of any size"));
    mac.update(body);
    mac
}
