use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use std::default::Default;
use std::path::Path;
use url::Url;

use crate::session::PersistedSession;
use crate::signer::{ApplicationCredentials, NonceStrategy};
use crate::transport::BodyEncoding;

/// Application configuration module
/// This module handles the application configuration including loading,
/// validating and saving configuration settings.
/// Represents the application configuration
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct Config {
    /// Application credentials issued by the provider
    #[serde(default)]
    pub credentials: ApplicationCredentials,

    /// Endpoint settings
    #[serde(default)]
    pub api: ApiConfig,

    /// Request signing settings
    #[serde(default)]
    pub signing: SigningConfig,

    /// Session reuse settings for an external persistence layer
    #[serde(default)]
    pub session_management: SessionManagementConfig,

    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,
}

/// Endpoint configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ApiConfig {
    /// Base URL of the REST API
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Path of the session resource, without the `.json` suffix
    #[serde(default = "default_session_path")]
    pub session_path: String,

    /// Request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Body encoding of session requests
    #[serde(default)]
    pub body_encoding: BodyEncoding,

    /// Value of the REST API version header; empty to omit it
    #[serde(default = "default_api_version")]
    pub api_version: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            session_path: default_session_path(),
            timeout_secs: default_timeout_secs(),
            body_encoding: BodyEncoding::default(),
            api_version: default_api_version(),
        }
    }
}

/// Request signing configuration
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct SigningConfig {
    /// Nonce range; `compat` matches the provider's reference SDK
    #[serde(default)]
    pub nonce_strategy: NonceStrategy,
}

/// Session reuse configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SessionManagementConfig {
    /// Whether saved tokens may be reused across runs
    #[serde(default)]
    pub enable: bool,

    /// Age in hours after which a saved token is no longer reused
    #[serde(default = "default_expired_time_hours")]
    pub expired_time_hours: u64,

    /// File the command line tool keeps the session snapshot in
    #[serde(default = "default_snapshot_path")]
    pub snapshot_path: String,
}

impl Default for SessionManagementConfig {
    fn default() -> Self {
        Self {
            enable: false,
            expired_time_hours: default_expired_time_hours(),
            snapshot_path: default_snapshot_path(),
        }
    }
}

impl SessionManagementConfig {
    /// Maximum age of a reusable token
    pub fn max_token_age(&self) -> chrono::Duration {
        chrono::Duration::hours(self.expired_time_hours.min(i32::MAX as u64) as i64)
    }

    /// Whether a saved session may be used instead of creating a new one
    pub fn is_reusable(&self, saved: &PersistedSession, credentials: &ApplicationCredentials) -> bool {
        self.is_reusable_at(saved, credentials, chrono::Utc::now())
    }

    pub fn is_reusable_at(
        &self,
        saved: &PersistedSession,
        credentials: &ApplicationCredentials,
        now: chrono::DateTime<chrono::Utc>,
    ) -> bool {
        self.enable
            && !saved.token.is_empty()
            && saved.matches(credentials)
            && !saved.is_expired_at(self.max_token_age(), now)
    }
}

/// Log verbosity level
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

fn default_endpoint() -> String {
    "https://api.quickblox.com".to_string()
}

fn default_session_path() -> String {
    "session".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_api_version() -> String {
    "0.1.1".to_string()
}

fn default_expired_time_hours() -> u64 {
    2 // Provider sessions expire two hours after the last request
}

fn default_snapshot_path() -> String {
    "session.json".to_string()
}

impl Config {
    /// Load configuration from a JSON file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Save configuration as pretty-printed JSON
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let json = serde_json::to_string_pretty(self).context("Failed to serialize config to JSON")?;

        std::fs::write(path, json)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Validate the configuration for consistency and required values
    pub fn validate(&self) -> Result<()> {
        self.credentials.validate()?;

        if self.api.timeout_secs == 0 {
            return Err(anyhow!("API timeout must be greater than zero"));
        }

        if self.api.session_path.trim_matches('/').is_empty() {
            return Err(anyhow!("Session path must not be empty"));
        }

        self.session_url()?;

        Ok(())
    }

    /// Absolute URL of the session resource
    pub fn session_url(&self) -> Result<String> {
        let base = Url::parse(&self.api.endpoint)
            .with_context(|| format!("Invalid API endpoint: {}", self.api.endpoint))?;

        if base.scheme() != "http" && base.scheme() != "https" {
            return Err(anyhow!("API endpoint must be http or https: {}", self.api.endpoint));
        }

        let url = format!(
            "{}/{}.json",
            base.as_str().trim_end_matches('/'),
            self.api.session_path.trim_matches('/')
        );

        Ok(url)
    }
}
