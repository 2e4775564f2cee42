//! HTTP server: the dashboard, its JSON API and the chat webhook.
//!
//! All routes share an [`AppState`]. Every response is marked uncacheable,
//! and the router is wrapped in request tracing and panic recovery.

mod error;
mod handlers;

pub use error::WebError;

use std::fmt;
use std::ops::Deref;
use std::path::Path;
use std::sync::Arc;

use axum::extract::{FromRef, Request};
use axum::http::{header, HeaderValue};
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::{get, post};
use axum::Router;
use axum_extra::extract::cookie::Key;
use chrono::FixedOffset;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::auth::{IdTokenVerifier, LoginProvider};
use crate::bot::TodoBot;
use crate::config::{Config, SessionConfig};
use crate::error::Result;
use crate::messenger::Messenger;
use crate::session::derive_key;
use crate::storage::SharedStorage;

/// Everything a request handler needs.
#[derive(Clone)]
pub struct AppState(Arc<AppStateInner>);

/// Fields of [`AppState`].
pub struct AppStateInner {
    /// Task storage.
    pub storage: SharedStorage,
    /// The chat bot.
    pub bot: Arc<TodoBot>,
    /// Dashboard login provider.
    pub login: Arc<dyn LoginProvider>,
    /// ID token verifier for the login channel.
    pub verifier: IdTokenVerifier,
    /// Session cookie signing key.
    pub key: Key,
    /// Session cookie settings.
    pub session: SessionConfig,
    /// Secret the chat platform signs webhooks with.
    pub channel_secret: String,
    /// Token `/remind` requires, if any.
    pub reminder_token: Option<String>,
    /// Offset all dates use.
    pub offset: FixedOffset,
}

impl fmt::Debug for AppState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppState")
            .field("storage", &self.storage)
            .field("bot", &self.bot)
            .field("verifier", &self.verifier)
            .field("offset", &self.offset)
            .finish_non_exhaustive()
    }
}

impl fmt::Debug for AppStateInner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppStateInner").finish_non_exhaustive()
    }
}

impl Deref for AppState {
    type Target = AppStateInner;

    fn deref(&self) -> &AppStateInner {
        &self.0
    }
}

impl FromRef<AppState> for Key {
    fn from_ref(state: &AppState) -> Self {
        state.key.clone()
    }
}

impl AppState {
    /// Assemble the state from configuration and the outbound clients.
    ///
    /// # Errors
    ///
    /// Returns an error if the configured offset is invalid.
    pub fn new(
        config: &Config,
        storage: SharedStorage,
        messenger: Arc<dyn Messenger>,
        login: Arc<dyn LoginProvider>,
    ) -> Result<Self> {
        let bot = TodoBot::new(storage.clone(), messenger, config.bot.edit_url.clone());

        Ok(Self(Arc::new(AppStateInner {
            storage,
            bot: Arc::new(bot),
            login,
            verifier: IdTokenVerifier::new(&config.login.client_id, &config.login.client_secret),
            key: derive_key(&config.session.secret),
            session: config.session.clone(),
            channel_secret: config.bot.channel_secret.clone(),
            reminder_token: config.reminder.token.clone().filter(|t| !t.is_empty()),
            offset: config.offset()?,
        })))
    }
}

/// Build the application router.
///
/// Paths that match no route are served from `assets_dir` when one is given.
pub fn router(state: AppState, assets_dir: Option<&Path>) -> Router {
    let routes = Router::new()
        .route("/", get(handlers::index))
        .route("/login", get(handlers::login))
        .route("/auth", get(handlers::auth))
        .route("/list", get(handlers::list))
        .route("/pin", post(handlers::pin))
        .route("/done", post(handlers::done))
        .route("/edit", post(handlers::edit))
        .route("/delete", post(handlers::delete))
        .route("/user-info", get(handlers::user_info))
        .route("/logout", get(handlers::logout))
        .route("/callback", post(handlers::callback))
        .route("/remind", get(handlers::remind));

    let routes = match assets_dir {
        Some(dir) => routes.fallback_service(ServeDir::new(dir)),
        None => routes,
    };

    routes
        .layer(CatchPanicLayer::new())
        .layer(middleware::from_fn(no_cache))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn no_cache(request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();
    headers.insert(
        header::CACHE_CONTROL,
        HeaderValue::from_static("no-cache, no-store, must-revalidate"),
    );
    headers.insert(header::PRAGMA, HeaderValue::from_static("no-cache"));
    headers.insert(header::EXPIRES, HeaderValue::from_static("0"));
    response
}

#[cfg(test)]
mod tests;
