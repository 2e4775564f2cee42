//! Configuration management for todobot.
//!
//! This module provides configuration loading and validation using figment,
//! supporting TOML config files, environment variables, and defaults.

use std::net::SocketAddr;
use std::path::PathBuf;

use chrono::{FixedOffset, NaiveTime};
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::dates::fixed_offset;
use crate::error::{Error, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "config.toml";

/// Default data directory name.
const DATA_DIR_NAME: &str = "todobot";

/// Default database file name.
const DATABASE_FILE_NAME: &str = "todos.db";

/// Prefix for environment variable overrides.
const ENV_PREFIX: &str = "TODOBOT_";

/// Application configuration.
///
/// Configuration is loaded from (in order of precedence, highest first):
/// 1. The bare `PORT` environment variable
/// 2. Environment variables prefixed with `TODOBOT_`, with `__` between
///    section and key (`TODOBOT_BOT__CHANNEL_SECRET`)
/// 3. TOML config file at `~/.config/todobot/config.toml`
/// 4. Default values
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// HTTP server configuration.
    pub server: ServerConfig,
    /// Storage configuration.
    pub storage: StorageConfig,
    /// Chat bot (LINE Messaging API) configuration.
    pub bot: BotConfig,
    /// Dashboard login (LINE Login) configuration.
    pub login: LoginConfig,
    /// Session cookie configuration.
    pub session: SessionConfig,
    /// Reminder configuration.
    pub reminder: ReminderConfig,
    /// Time zone configuration.
    pub timezone: TimeZoneConfig,
}

/// HTTP server configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to bind.
    pub host: String,
    /// Port to listen on.
    pub port: u16,
    /// Directory of static assets served for unmatched paths.
    pub assets_dir: Option<PathBuf>,
}

/// Storage-related configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Path to the database file.
    /// Defaults to `~/.local/share/todobot/todos.db`
    pub database_path: Option<PathBuf>,
}

/// Chat bot configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BotConfig {
    /// Channel secret used to verify webhook signatures.
    pub channel_secret: String,
    /// Channel access token used for reply and push calls.
    pub channel_token: String,
    /// Dashboard URL sent to users who ask to edit their list.
    pub edit_url: String,
    /// Base URL of the Messaging API.
    pub api_base: String,
}

/// Dashboard login configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoginConfig {
    /// OAuth client (channel) id.
    pub client_id: String,
    /// OAuth client (channel) secret; also signs ID tokens.
    pub client_secret: String,
    /// Redirect URL registered for the `/auth` callback.
    pub redirect_url: String,
    /// Authorization endpoint.
    pub authorize_url: String,
    /// Token endpoint.
    pub token_url: String,
    /// Token revocation endpoint.
    pub revoke_url: String,
}

/// Session cookie configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Secret the session cookie is signed with.
    pub secret: String,
    /// Name of the session cookie.
    pub cookie_name: String,
    /// Only send the cookie over HTTPS.
    pub secure: bool,
}

/// Reminder configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReminderConfig {
    /// Local time (`HH:MM`) to send reminders every day. Unset disables the
    /// built-in timer; `/remind` still works.
    pub daily_at: Option<String>,
    /// When set, `/remind` requires `?token=<value>`.
    pub token: Option<String>,
}

/// Time zone configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeZoneConfig {
    /// Fixed offset from UTC, in minutes, that all dates use.
    pub utc_offset_minutes: i32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 80,
            assets_dir: None,
        }
    }
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            channel_secret: String::new(),
            channel_token: String::new(),
            edit_url: String::new(),
            api_base: "https://api.line.me".to_string(),
        }
    }
}

impl Default for LoginConfig {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            client_secret: String::new(),
            redirect_url: String::new(),
            authorize_url: "https://access.line.me/oauth2/v2.1/authorize".to_string(),
            token_url: "https://api.line.me/oauth2/v2.1/token".to_string(),
            revoke_url: "https://api.line.me/oauth2/v2.1/revoke".to_string(),
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            secret: String::new(),
            cookie_name: "session".to_string(),
            secure: false,
        }
    }
}

impl Default for TimeZoneConfig {
    fn default() -> Self {
        // Asia/Bangkok
        Self {
            utc_offset_minutes: 7 * 60,
        }
    }
}

impl Config {
    /// Load configuration from all sources.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading or parsing fails.
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load configuration with an optional custom config path.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading or parsing fails.
    pub fn load_from(config_path: Option<PathBuf>) -> Result<Self> {
        let config_file = config_path.unwrap_or_else(Self::default_config_path);

        let figment = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(&config_file))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .merge(Env::raw().only(&["PORT"]).map(|_| "server.port".into()));

        let config: Config = figment.extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Get the default configuration file path.
    #[must_use]
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from(".config"))
            .join(DATA_DIR_NAME)
            .join(CONFIG_FILE_NAME)
    }

    /// Get the default data directory path.
    #[must_use]
    pub fn default_data_dir() -> PathBuf {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from(".local/share"))
            .join(DATA_DIR_NAME)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid.
    pub fn validate(&self) -> Result<()> {
        if fixed_offset(self.timezone.utc_offset_minutes).is_none() {
            return Err(Error::ConfigValidation {
                message: format!(
                    "utc_offset_minutes ({}) must be within one day of UTC",
                    self.timezone.utc_offset_minutes
                ),
            });
        }

        if let Some(daily_at) = &self.reminder.daily_at {
            if parse_daily_at(daily_at).is_none() {
                return Err(Error::ConfigValidation {
                    message: format!("reminder daily_at must be HH:MM, got {daily_at:?}"),
                });
            }
        }

        if self.session.cookie_name.trim().is_empty() {
            return Err(Error::ConfigValidation {
                message: "session cookie_name must not be empty".to_string(),
            });
        }

        Ok(())
    }

    /// Validate that everything the HTTP server needs is present.
    ///
    /// # Errors
    ///
    /// Returns an error naming the first missing credential.
    pub fn validate_for_serving(&self) -> Result<()> {
        self.validate()?;

        let required = [
            ("bot.channel_secret", &self.bot.channel_secret),
            ("bot.channel_token", &self.bot.channel_token),
            ("login.client_id", &self.login.client_id),
            ("login.client_secret", &self.login.client_secret),
            ("login.redirect_url", &self.login.redirect_url),
            ("session.secret", &self.session.secret),
        ];
        for (name, value) in required {
            if value.trim().is_empty() {
                return Err(Error::ConfigValidation {
                    message: format!("{name} must be set"),
                });
            }
        }

        Ok(())
    }

    /// Get the database path, resolving defaults if not set.
    #[must_use]
    pub fn database_path(&self) -> PathBuf {
        self.storage
            .database_path
            .clone()
            .unwrap_or_else(|| Self::default_data_dir().join(DATABASE_FILE_NAME))
    }

    /// Get the configured fixed offset.
    ///
    /// # Errors
    ///
    /// Returns an error if the offset is out of range.
    pub fn offset(&self) -> Result<FixedOffset> {
        fixed_offset(self.timezone.utc_offset_minutes).ok_or_else(|| Error::ConfigValidation {
            message: format!(
                "utc_offset_minutes ({}) must be within one day of UTC",
                self.timezone.utc_offset_minutes
            ),
        })
    }

    /// Get the socket address to bind.
    ///
    /// # Errors
    ///
    /// Returns an error if the host is not an IP address.
    pub fn bind_addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.server.host, self.server.port)
            .parse()
            .map_err(|_| Error::ConfigValidation {
                message: format!("invalid server host: {}", self.server.host),
            })
    }

    /// Get the daily reminder time, if one is configured.
    #[must_use]
    pub fn daily_reminder_at(&self) -> Option<NaiveTime> {
        self.reminder.daily_at.as_deref().and_then(parse_daily_at)
    }
}

fn parse_daily_at(value: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(value.trim(), "%H:%M").ok()
}
