//! Settings file management

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::errors::MonitorError;
use crate::filesys::file::File;
use crate::logs::LogLevel;
use crate::models::project::{Project, Webhook};

/// Environment variable overriding [`BootstrapSettings::max_retries`]
pub const ENV_MAX_RETRIES: &str = "DB_MAX_RETRIES";

/// Environment variable overriding [`BootstrapSettings::initial_delay_ms`]
pub const ENV_RETRY_DELAY: &str = "DB_RETRY_DELAY";

/// Service settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,

    /// Emit JSON logs on stdout
    #[serde(default)]
    pub log_json: bool,

    /// Directory for rolling log files
    #[serde(default)]
    pub log_dir: Option<PathBuf>,

    /// HTTP server configuration
    #[serde(default)]
    pub server: ServerSettings,

    /// Data directory
    #[serde(default = "default_storage_dir")]
    pub storage_dir: PathBuf,

    /// Seconds between keep-alive pings on event streams
    #[serde(default = "default_keep_alive_secs")]
    pub keep_alive_secs: u64,

    /// Store initialization retry configuration
    #[serde(default)]
    pub bootstrap: BootstrapSettings,

    /// Program run as `<program> compose ...`
    #[serde(default = "default_compose_command")]
    pub compose_command: String,

    /// Registered projects
    #[serde(default)]
    pub projects: Vec<Project>,

    /// Deploy webhooks
    #[serde(default)]
    pub webhooks: Vec<Webhook>,
}

fn default_storage_dir() -> PathBuf {
    PathBuf::from("./data")
}

fn default_keep_alive_secs() -> u64 {
    15
}

fn default_compose_command() -> String {
    "docker".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_level: LogLevel::Info,
            log_json: false,
            log_dir: None,
            server: ServerSettings::default(),
            storage_dir: default_storage_dir(),
            keep_alive_secs: default_keep_alive_secs(),
            bootstrap: BootstrapSettings::default(),
            compose_command: default_compose_command(),
            projects: Vec::new(),
            webhooks: Vec::new(),
        }
    }
}

impl Settings {
    /// Read settings from `file`, falling back to defaults when it is missing
    pub async fn load(file: &File) -> Result<Self, MonitorError> {
        let mut settings = if file.exists().await {
            file.read_json::<Settings>().await.map_err(|e| {
                MonitorError::ConfigError(format!(
                    "Unable to read settings file {}: {}",
                    file.path().display(),
                    e
                ))
            })?
        } else {
            warn!(
                "Settings file {} not found, using defaults",
                file.path().display()
            );
            Settings::default()
        };

        settings
            .bootstrap
            .apply_overrides(|key| std::env::var(key).ok());
        Ok(settings)
    }

    pub fn keep_alive_interval(&self) -> Duration {
        Duration::from_secs(self.keep_alive_secs.max(1))
    }
}

/// HTTP server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3000
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Store initialization retry settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BootstrapSettings {
    /// Attempts before giving up
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Delay after the first failed attempt, in milliseconds
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,
}

fn default_max_retries() -> u32 {
    15
}

fn default_initial_delay_ms() -> u64 {
    2000
}

impl Default for BootstrapSettings {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            initial_delay_ms: default_initial_delay_ms(),
        }
    }
}

impl BootstrapSettings {
    /// Apply `DB_MAX_RETRIES` / `DB_RETRY_DELAY` values from `lookup`
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup(ENV_MAX_RETRIES) {
            match value.trim().parse() {
                Ok(max_retries) => self.max_retries = max_retries,
                Err(_) => warn!("Ignoring invalid {}: {}", ENV_MAX_RETRIES, value),
            }
        }
        if let Some(value) = lookup(ENV_RETRY_DELAY) {
            match value.trim().parse() {
                Ok(delay) => self.initial_delay_ms = delay,
                Err(_) => warn!("Ignoring invalid {}: {}", ENV_RETRY_DELAY, value),
            }
        }
    }
}
