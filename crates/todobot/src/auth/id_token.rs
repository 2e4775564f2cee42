use std::fmt;

use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Profile claims carried by a verified ID token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdTokenClaims {
    /// The user id; matches the chat user id for the same channel provider.
    pub sub: String,
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// Profile picture URL.
    #[serde(default)]
    pub picture: String,
}

/// Verifies HS256 ID tokens issued to one login channel.
#[derive(Clone)]
pub struct IdTokenVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl fmt::Debug for IdTokenVerifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdTokenVerifier")
            .field("audience", &self.validation.aud)
            .finish_non_exhaustive()
    }
}

impl IdTokenVerifier {
    /// Create a verifier for tokens addressed to `client_id` and signed with
    /// `client_secret`.
    #[must_use]
    pub fn new(client_id: &str, client_secret: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_audience(&[client_id]);
        validation.set_required_spec_claims(&["exp", "aud", "sub"]);

        Self {
            key: DecodingKey::from_secret(client_secret.as_bytes()),
            validation,
        }
    }

    /// Check the signature, audience and expiry of `token` and return its claims.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::IdToken`] if any check fails.
    pub fn verify(&self, token: &str) -> Result<IdTokenClaims> {
        Ok(decode::<IdTokenClaims>(token, &self.key, &self.validation)?.claims)
    }
}
