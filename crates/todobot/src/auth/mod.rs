//! Dashboard login through LINE Login (OAuth 2.0 with OpenID Connect).
//!
//! A [`LoginProvider`] builds the authorization redirect, exchanges the
//! returned code for tokens and revokes access tokens on logout. The ID token
//! that comes back from the exchange is checked by [`IdTokenVerifier`].

pub(crate) mod id_token;

pub use id_token::{IdTokenClaims, IdTokenVerifier};

use std::fmt;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;
use url::Url;

use crate::config::LoginConfig;
use crate::error::{Error, Result};

/// Scopes requested from the login provider.
pub const SCOPES: &str = "openid profile";

/// Generate an unguessable OAuth `state` value.
#[must_use]
pub fn generate_state() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

/// Tokens returned by a successful code exchange.
#[derive(Clone, PartialEq, Eq, Deserialize)]
pub struct LoginTokens {
    /// Bearer token for the user's session with the provider.
    pub access_token: String,
    /// Signed OpenID Connect ID token.
    pub id_token: String,
}

impl fmt::Debug for LoginTokens {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginTokens").finish_non_exhaustive()
    }
}

/// An OAuth login provider.
#[async_trait]
pub trait LoginProvider: Send + Sync {
    /// The URL to send the browser to, carrying `state`.
    ///
    /// # Errors
    ///
    /// Returns an error if the configured authorization URL is invalid.
    fn authorize_url(&self, state: &str) -> Result<Url>;

    /// Exchange an authorization code for tokens.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the provider rejects the code.
    async fn exchange(&self, code: &str) -> Result<LoginTokens>;

    /// Revoke an access token.
    ///
    /// # Errors
    ///
    /// Returns an error carrying the provider's response body if the
    /// revocation is not accepted.
    async fn revoke(&self, access_token: &str) -> Result<()>;
}

/// LINE Login client.
#[derive(Clone)]
pub struct LineLogin {
    client: reqwest::Client,
    config: LoginConfig,
}

impl fmt::Debug for LineLogin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LineLogin")
            .field("client_id", &self.config.client_id)
            .field("redirect_url", &self.config.redirect_url)
            .finish_non_exhaustive()
    }
}

impl LineLogin {
    /// Create a client from login configuration.
    #[must_use]
    pub fn new(client: reqwest::Client, config: LoginConfig) -> Self {
        Self { client, config }
    }

    async fn post_form(&self, endpoint: &str, pairs: &[(&str, &str)]) -> Result<reqwest::Response> {
        let body = url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(pairs)
            .finish();

        let response = self
            .client
            .post(endpoint)
            .header(
                reqwest::header::CONTENT_TYPE,
                "application/x-www-form-urlencoded",
            )
            .body(body)
            .send()
            .await?;

        let status = response.status();
        debug!("POST {} -> {}", endpoint, status);
        if status != reqwest::StatusCode::OK {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::api(endpoint, status.as_u16(), body));
        }
        Ok(response)
    }
}

#[async_trait]
impl LoginProvider for LineLogin {
    fn authorize_url(&self, state: &str) -> Result<Url> {
        Ok(Url::parse_with_params(
            &self.config.authorize_url,
            &[
                ("response_type", "code"),
                ("client_id", self.config.client_id.as_str()),
                ("redirect_uri", self.config.redirect_url.as_str()),
                ("state", state),
                ("scope", SCOPES),
            ],
        )?)
    }

    async fn exchange(&self, code: &str) -> Result<LoginTokens> {
        let response = self
            .post_form(
                &self.config.token_url,
                &[
                    ("grant_type", "authorization_code"),
                    ("code", code),
                    ("redirect_uri", self.config.redirect_url.as_str()),
                    ("client_id", self.config.client_id.as_str()),
                    ("client_secret", self.config.client_secret.as_str()),
                ],
            )
            .await?;
        Ok(response.json().await?)
    }

    async fn revoke(&self, access_token: &str) -> Result<()> {
        self.post_form(
            &self.config.revoke_url,
            &[
                ("access_token", access_token),
                ("client_id", self.config.client_id.as_str()),
                ("client_secret", self.config.client_secret.as_str()),
            ],
        )
        .await?;
        Ok(())
    }
}
