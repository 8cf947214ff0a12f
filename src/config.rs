use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::auth::FULL_MAILBOX_SCOPE;
use crate::error::{Result, SyncError};
use crate::models::LabelDefinition;

static HEX_COLOR: Lazy<Regex> = Lazy::new(|| Regex::new(r"^#[0-9a-fA-F]{6}$").unwrap());

pub const ENV_CREDENTIALS_PATH: &str = "GMAIL_CREDENTIALS_PATH";
pub const ENV_TOKENS_DIRECTORY: &str = "GMAIL_TOKENS_DIRECTORY";
pub const ENV_AUTH_PORT: &str = "GMAIL_AUTH_PORT";
pub const ENV_APPLICATION_NAME: &str = "GMAIL_APPLICATION_NAME";

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub labels: LabelsConfig,
    #[serde(default)]
    pub processing: ProcessingConfig,
    #[serde(default)]
    pub api: ApiConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    #[serde(default = "default_credentials_path")]
    pub credentials_path: PathBuf,
    #[serde(default = "default_tokens_directory")]
    pub tokens_directory: PathBuf,
    /// Loopback port for the consent callback
    #[serde(default = "default_port")]
    pub port: u16,
    /// Sent as the user agent on every API call
    #[serde(default = "default_application_name")]
    pub application_name: String,
    #[serde(default = "default_user_key")]
    pub user_key: String,
    /// Unset means wait for consent indefinitely
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub consent_timeout_secs: Option<u64>,
    #[serde(default = "default_scopes")]
    pub scopes: Vec<String>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            credentials_path: default_credentials_path(),
            tokens_directory: default_tokens_directory(),
            port: default_port(),
            application_name: default_application_name(),
            user_key: default_user_key(),
            consent_timeout_secs: None,
            scopes: default_scopes(),
        }
    }
}

impl AuthConfig {
    pub fn consent_timeout(&self) -> Option<Duration> {
        self.consent_timeout_secs.map(Duration::from_secs)
    }
}

/// What to do when the same label name is declared more than once
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum DuplicatePolicy {
    /// One label per name; the first position is kept and the last color wins
    #[default]
    Collapse,
    /// Issue a create for every entry, duplicates included
    CreateEach,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LabelsConfig {
    #[serde(default)]
    pub duplicates: DuplicatePolicy,
    #[serde(default)]
    pub definitions: Vec<LabelDefinition>,
}

/// Message processing policy. Parsed and validated, not yet acted upon.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessingConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
    #[serde(default)]
    pub process_attachments: bool,
    #[serde(default = "default_max_results")]
    pub max_results: u32,
    /// Sender address -> label name
    #[serde(default)]
    pub sender_label_mapping: BTreeMap<String, String>,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            query: None,
            process_attachments: false,
            max_results: default_max_results(),
            sender_label_mapping: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl ApiConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

fn default_credentials_path() -> PathBuf {
    PathBuf::from("credentials.json")
}

fn default_tokens_directory() -> PathBuf {
    PathBuf::from("tokens")
}

fn default_port() -> u16 {
    8887
}

fn default_application_name() -> String {
    "Gmail Mini Project".to_string()
}

fn default_user_key() -> String {
    "user".to_string()
}

fn default_scopes() -> Vec<String> {
    vec![FULL_MAILBOX_SCOPE.to_string()]
}

fn default_max_results() -> u32 {
    100
}

fn default_request_timeout_secs() -> u64 {
    30
}

impl Config {
    /// Load, apply environment overrides and validate
    pub async fn load(path: &Path) -> Result<Self> {
        let mut config = if !path.exists() {
            tracing::warn!("Config file not found at {:?}, using defaults", path);
            Self::default()
        } else {
            let content = tokio::fs::read_to_string(path).await.map_err(|e| {
                SyncError::ConfigError(format!("Failed to read config file: {}", e))
            })?;

            let config: Self = toml::from_str(&content).map_err(|e| {
                SyncError::ConfigError(format!("Failed to parse config file: {}", e))
            })?;

            tracing::info!("Loaded configuration from {:?}", path);
            config
        };

        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    pub async fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                SyncError::ConfigError(format!("Failed to create config directory: {}", e))
            })?;
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| SyncError::ConfigError(format!("Failed to serialize config: {}", e)))?;

        tokio::fs::write(path, content)
            .await
            .map_err(|e| SyncError::ConfigError(format!("Failed to write config file: {}", e)))?;

        tracing::info!("Saved configuration to {:?}", path);
        Ok(())
    }

    /// Override auth settings from `GMAIL_*` environment variables
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(path) = std::env::var(ENV_CREDENTIALS_PATH) {
            self.auth.credentials_path = PathBuf::from(path);
        }
        if let Ok(dir) = std::env::var(ENV_TOKENS_DIRECTORY) {
            self.auth.tokens_directory = PathBuf::from(dir);
        }
        if let Ok(port) = std::env::var(ENV_AUTH_PORT) {
            self.auth.port = port.trim().parse().map_err(|_| {
                SyncError::ConfigError(format!("{} is not a valid port: '{}'", ENV_AUTH_PORT, port))
            })?;
        }
        if let Ok(name) = std::env::var(ENV_APPLICATION_NAME) {
            self.auth.application_name = name;
        }
        Ok(())
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.auth.port == 0 {
            return Err(SyncError::ConfigError(
                "auth.port must be a fixed, non-zero port".to_string(),
            ));
        }
        if self.auth.application_name.trim().is_empty() {
            return Err(SyncError::ConfigError(
                "auth.application_name cannot be empty".to_string(),
            ));
        }
        if self.auth.user_key.is_empty() {
            return Err(SyncError::ConfigError(
                "auth.user_key cannot be empty".to_string(),
            ));
        }
        if self.auth.scopes.is_empty() || self.auth.scopes.iter().any(|s| s.is_empty()) {
            return Err(SyncError::ConfigError(
                "auth.scopes must contain at least one non-empty scope".to_string(),
            ));
        }
        if self.auth.consent_timeout_secs == Some(0) {
            return Err(SyncError::ConfigError(
                "auth.consent_timeout_secs must be greater than 0 when set".to_string(),
            ));
        }

        for definition in &self.labels.definitions {
            if definition.name.is_empty() {
                return Err(SyncError::ConfigError(
                    "labels.definitions cannot contain an empty name".to_string(),
                ));
            }
            if !HEX_COLOR.is_match(&definition.color) {
                return Err(SyncError::ConfigError(format!(
                    "Invalid color '{}' for label '{}'. Expected #RRGGBB",
                    definition.color, definition.name
                )));
            }
        }

        if self.processing.max_results == 0 || self.processing.max_results > 500 {
            return Err(SyncError::ConfigError(
                "processing.max_results must be between 1 and 500".to_string(),
            ));
        }
        for (sender, label) in &self.processing.sender_label_mapping {
            if label.is_empty() {
                return Err(SyncError::ConfigError(format!(
                    "processing.sender_label_mapping has an empty label for '{}'",
                    sender
                )));
            }
            if !self.labels.definitions.iter().any(|d| &d.name == label) {
                tracing::warn!(
                    "Sender '{}' maps to label '{}', which is not declared in labels.definitions",
                    sender,
                    label
                );
            }
        }

        if self.api.request_timeout_secs == 0 {
            return Err(SyncError::ConfigError(
                "api.request_timeout_secs must be greater than 0".to_string(),
            ));
        }

        tracing::debug!("Configuration validation passed");
        Ok(())
    }

    /// Create an example configuration file
    pub async fn create_example(path: &Path) -> Result<()> {
        let mut config = Self::default();
        config.labels.definitions = vec![
            LabelDefinition::new("Work", "#4a86e8"),
            LabelDefinition::new("Personal", "#16a766"),
        ];
        config.processing.query = Some("is:unread".to_string());
        config.save(path).await
    }
}
