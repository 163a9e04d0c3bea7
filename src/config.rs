//! Configuration management
//!
//! Loads configuration from:
//! 1. Default values
//! 2. Configuration files (config/default.toml, config/local.toml)
//! 3. Environment variables (override)
//!
//! The resulting [`AppConfig`] is built once at startup and never mutated.

use config::builder::DefaultState;
use config::ConfigBuilder;
use serde::{Deserialize, Deserializer};
use std::path::PathBuf;
use std::time::Duration;

use crate::error::AppError;

/// Environment variable prefix (`FAMILY_CALENDAR__AUTH__JWT_SECRET`, ...)
pub const ENV_PREFIX: &str = "FAMILY_CALENDAR";

/// Longest accepted session token lifetime (one year)
pub const MAX_SESSION_TTL_SECONDS: i64 = 365 * 24 * 60 * 60;

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    pub logging: LoggingConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Bind address (e.g., "0.0.0.0")
    pub host: String,
    /// Port number (e.g., 8080)
    pub port: u16,
    /// The single origin allowed to call the API from a browser
    pub cors_allowed_origin: String,
}

/// Database configuration (SQLite only)
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Path to SQLite database file
    pub path: PathBuf,
}

/// Authentication configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// HMAC secret for session tokens. Required.
    #[serde(default)]
    pub jwt_secret: String,
    /// Marks login cookies `Secure`. Only disable for local development.
    #[serde(default = "default_true", deserialize_with = "deserialize_secure_flag")]
    pub use_secure_connections: bool,
    /// Exact post-login redirect targets a client may request
    #[serde(default)]
    pub allowed_callbacks: Vec<String>,
    /// Session token lifetime in seconds (default: 86400 = 24h)
    pub session_ttl_seconds: i64,
    /// Timeout applied to each call to the identity provider
    pub provider_timeout_seconds: u64,
    /// Optional override for the token confirmation page template
    pub success_template: Option<PathBuf>,
    #[serde(default)]
    pub google: GoogleOAuthConfig,
}

impl AuthConfig {
    pub fn provider_timeout(&self) -> Duration {
        Duration::from_secs(self.provider_timeout_seconds)
    }
}

/// Google OAuth client configuration
#[derive(Debug, Clone, Deserialize)]
pub struct GoogleOAuthConfig {
    #[serde(default)]
    pub client_id: String,
    #[serde(default)]
    pub client_secret: String,
    /// Where Google sends the browser back to (our callback route)
    #[serde(default)]
    pub redirect_url: String,
    #[serde(default = "default_google_auth_url")]
    pub auth_url: String,
    #[serde(default = "default_google_token_url")]
    pub token_url: String,
    #[serde(default = "default_google_userinfo_url")]
    pub userinfo_url: String,
    #[serde(default = "default_google_scopes")]
    pub scopes: Vec<String>,
}

impl Default for GoogleOAuthConfig {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            client_secret: String::new(),
            redirect_url: String::new(),
            auth_url: default_google_auth_url(),
            token_url: default_google_token_url(),
            userinfo_url: default_google_userinfo_url(),
            scopes: default_google_scopes(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_google_auth_url() -> String {
    "https://accounts.google.com/o/oauth2/auth".to_string()
}

fn default_google_token_url() -> String {
    "https://oauth2.googleapis.com/token".to_string()
}

fn default_google_userinfo_url() -> String {
    "https://www.googleapis.com/oauth2/v2/userinfo".to_string()
}

fn default_google_scopes() -> Vec<String> {
    vec![
        "https://www.googleapis.com/auth/userinfo.email".to_string(),
        "https://www.googleapis.com/auth/userinfo.profile".to_string(),
    ]
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    pub level: String,
    /// Log format: "pretty" or "json"
    pub format: String,
}

/// Accepts a real boolean or the usual textual spellings.
///
/// Anything unrecognised keeps cookies secure.
fn deserialize_secure_flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Flag {
        Bool(bool),
        Text(String),
    }

    Ok(match Flag::deserialize(deserializer)? {
        Flag::Bool(value) => value,
        Flag::Text(raw) => parse_secure_flag(&raw),
    })
}

pub(crate) fn parse_secure_flag(raw: &str) -> bool {
    match raw.trim() {
        "" => true,
        "1" | "t" | "T" | "true" | "TRUE" | "True" => true,
        "0" | "f" | "F" | "false" | "FALSE" | "False" => false,
        other => {
            tracing::warn!(
                value = %other,
                "Invalid auth.use_secure_connections value, defaulting to true"
            );
            true
        }
    }
}

impl AppConfig {
    /// Load configuration from file and environment
    ///
    /// # Loading Order
    /// 1. Default values
    /// 2. config/default.toml (if exists)
    /// 3. config/local.toml (if exists)
    /// 4. Environment variables (FAMILY_CALENDAR__*)
    ///
    /// `auth.allowed_callbacks` is read from the environment as a
    /// comma-separated list.
    ///
    /// # Errors
    /// Returns error if configuration is invalid, including a missing
    /// `auth.jwt_secret`.
    pub fn load() -> Result<Self, AppError> {
        use config::File;

        Self::load_with(|builder| {
            builder
                // Load from config/default.toml if it exists
                .add_source(File::with_name("config/default").required(false))
                // Load from config/local.toml if it exists (overrides default)
                .add_source(File::with_name("config/local").required(false))
                // Load from environment variables (FAMILY_CALENDAR__*)
                .add_source(environment_source())
        })
    }

    /// Load configuration from defaults plus the sources added by `sources`.
    pub fn load_with<F>(sources: F) -> Result<Self, AppError>
    where
        F: FnOnce(ConfigBuilder<DefaultState>) -> ConfigBuilder<DefaultState>,
    {
        use config::Config;

        let builder = Config::builder()
            // Start with default values
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 8080)?
            .set_default("server.cors_allowed_origin", "http://localhost:3000")?
            .set_default("database.path", "family_calendar.db")?
            .set_default("auth.session_ttl_seconds", 86400)?
            .set_default("auth.provider_timeout_seconds", 10)?
            .set_default("logging.level", "info")?
            .set_default("logging.format", "pretty")?;

        let config = sources(builder)
            .build()
            .map_err(|e| AppError::Config(e.to_string()))?;

        let mut app_config: Self = config
            .try_deserialize()
            .map_err(|e| AppError::Config(e.to_string()))?;
        app_config.auth.allowed_callbacks = app_config
            .auth
            .allowed_callbacks
            .iter()
            .map(|callback| callback.trim())
            .filter(|callback| !callback.is_empty())
            .map(ToOwned::to_owned)
            .collect();
        app_config.validate()?;
        Ok(app_config)
    }

    fn validate(&self) -> Result<(), AppError> {
        if self.auth.jwt_secret.trim().is_empty() {
            return Err(AppError::Config(
                "auth.jwt_secret is required but not set".to_string(),
            ));
        }

        if self.auth.session_ttl_seconds <= 0 {
            return Err(AppError::Config(
                "auth.session_ttl_seconds must be greater than 0".to_string(),
            ));
        }

        if self.auth.session_ttl_seconds > MAX_SESSION_TTL_SECONDS {
            return Err(AppError::Config(format!(
                "auth.session_ttl_seconds must be at most {}",
                MAX_SESSION_TTL_SECONDS
            )));
        }

        if self.auth.provider_timeout_seconds == 0 {
            return Err(AppError::Config(
                "auth.provider_timeout_seconds must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Log settings that load fine but are unsafe or incomplete
    pub fn warn_on_risky_settings(&self) {
        if !self.auth.use_secure_connections {
            tracing::warn!("Using insecure login cookies; only do this for local development");
        }

        if self.auth.google.client_id.is_empty() {
            tracing::warn!("auth.google.client_id is empty; Google sign-in will fail");
        }
    }
}

/// Environment source shared by [`AppConfig::load`] and tests.
pub fn environment_source() -> config::Environment {
    config::Environment::with_prefix(ENV_PREFIX)
        .separator("__")
        .try_parsing(true)
        .list_separator(",")
        .with_list_parse_key("auth.allowed_callbacks")
}
