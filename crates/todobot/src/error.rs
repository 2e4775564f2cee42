//! Error types for todobot.
//!
//! The `Display` text of every variant is what chat users and dashboard
//! clients see, so messages stay short and lowercase.

use std::path::PathBuf;
use thiserror::Error;

use crate::dates::ParseError;

/// The main error type for todobot operations.
#[derive(Error, Debug)]
pub enum Error {
    // === Storage Errors ===
    /// Failed to open or create the database.
    #[error("failed to open database at {path}: {source}")]
    DatabaseOpen {
        /// Path to the database file.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: rusqlite::Error,
    },

    /// A database query failed.
    #[error("database query failed: {0}")]
    DatabaseQuery(#[from] rusqlite::Error),

    /// Failed to run database migrations.
    #[error("database migration failed: {message}")]
    DatabaseMigration {
        /// Description of what went wrong.
        message: String,
    },

    /// No todo with this id belongs to the requesting user.
    #[error("no record: todo {id} not found")]
    TodoNotFound {
        /// The requested todo id.
        id: i64,
    },

    // === Configuration Errors ===
    /// Failed to load configuration.
    #[error("failed to load configuration: {0}")]
    ConfigLoad(Box<figment::Error>),

    /// Configuration validation failed.
    #[error("invalid configuration: {message}")]
    ConfigValidation {
        /// Description of the validation failure.
        message: String,
    },

    // === Request Errors ===
    /// A chat message did not match any accepted task layout.
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// The request has no logged-in user.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// The request body or query was rejected.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A webhook request carried a missing or wrong signature.
    #[error("invalid webhook signature")]
    InvalidSignature,

    // === Remote API Errors ===
    /// An outbound HTTP request failed before a response arrived.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// A remote API answered with a non-success status.
    #[error("{endpoint} returned {status}: {body}")]
    Api {
        /// The endpoint that was called.
        endpoint: String,
        /// HTTP status code.
        status: u16,
        /// Response body, as returned.
        body: String,
    },

    /// An ID token failed verification.
    #[error("invalid ID token: {0}")]
    IdToken(#[from] jsonwebtoken::errors::Error),

    /// A URL could not be built.
    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),

    // === I/O Errors ===
    /// Failed to create a required directory.
    #[error("failed to create directory {path}: {source}")]
    DirectoryCreate {
        /// Path that couldn't be created.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    // === Serialization Errors ===
    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // === Generic Errors ===
    /// An internal error occurred (bug).
    #[error("internal error: {0}")]
    Internal(String),
}

/// A specialized Result type for todobot operations.
pub type Result<T> = std::result::Result<T, Error>;

impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Self::ConfigLoad(Box::new(err))
    }
}

impl Error {
    /// Create a new internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Create a new unauthorized error.
    #[must_use]
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Unauthorized(message.into())
    }

    /// Create a new invalid input error.
    #[must_use]
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    /// Create a remote API status error.
    #[must_use]
    pub fn api(endpoint: impl Into<String>, status: u16, body: impl Into<String>) -> Self {
        Self::Api {
            endpoint: endpoint.into(),
            status,
            body: body.into(),
        }
    }

    /// Check if this error means the todo does not exist for the user.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::TodoNotFound { .. })
    }

    /// Check if this error is caused by the caller rather than the server.
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::Parse(_) | Self::InvalidInput(_) | Self::InvalidSignature
        )
    }
}
