//! Browser sessions kept in a single signed cookie.
//!
//! The cookie value is base64 encoded JSON. A missing, tampered or
//! undecodable cookie loads as an empty session.

use axum_extra::extract::cookie::{Cookie, Key, SameSite, SignedCookieJar};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::SessionConfig;
use crate::error::Result;

const KEY_CONTEXT: &str = "todobot 2018-11-15 session cookie signing key";

/// Derive the cookie signing key from the configured session secret.
#[must_use]
pub fn derive_key(secret: &str) -> Key {
    let mut bytes = [0u8; 64];
    let mut hasher = blake3::Hasher::new_derive_key(KEY_CONTEXT);
    hasher.update(secret.as_bytes());
    hasher.finalize_xof().fill(&mut bytes);
    Key::from(&bytes)
}

/// Values remembered between dashboard requests.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Session {
    /// OAuth state issued by `/login`, awaiting `/auth`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    /// Login provider access token.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    /// Logged-in user id.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    /// Display name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Profile picture URL.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub picture: Option<String>,
}

impl Session {
    /// Read the session from the request cookies.
    #[must_use]
    pub fn load(jar: &SignedCookieJar, config: &SessionConfig) -> Self {
        let Some(cookie) = jar.get(&config.cookie_name) else {
            return Self::default();
        };

        match decode(cookie.value()) {
            Some(session) => session,
            None => {
                debug!("Discarding undecodable session cookie");
                Self::default()
            }
        }
    }

    /// Write the session into the response cookies.
    ///
    /// # Errors
    ///
    /// Returns an error if the session cannot be serialized.
    pub fn store(&self, jar: SignedCookieJar, config: &SessionConfig) -> Result<SignedCookieJar> {
        let value = URL_SAFE_NO_PAD.encode(serde_json::to_vec(self)?);
        let cookie = Cookie::build((config.cookie_name.clone(), value))
            .path("/")
            .http_only(true)
            .secure(config.secure)
            .same_site(SameSite::Lax);
        Ok(jar.add(cookie))
    }

    /// Remove the session cookie.
    #[must_use]
    pub fn destroy(jar: SignedCookieJar, config: &SessionConfig) -> SignedCookieJar {
        jar.remove(Cookie::build((config.cookie_name.clone(), String::new())).path("/"))
    }

    /// The logged-in user, if any.
    #[must_use]
    pub fn user_id(&self) -> Option<&str> {
        self.user_id.as_deref().filter(|id| !id.is_empty())
    }

    /// Whether the session holds an access token.
    #[must_use]
    pub fn is_logged_in(&self) -> bool {
        self.access_token.as_deref().is_some_and(|t| !t.is_empty())
    }
}

fn decode(value: &str) -> Option<Session> {
    let bytes = URL_SAFE_NO_PAD.decode(value).ok()?;
    serde_json::from_slice(&bytes).ok()
}
