//! Application configuration options

use std::time::Duration;

use crate::bootstrap;
use crate::events::BusOptions;
use crate::models::project::{Project, Webhook};
use crate::pipeline::runner::DEFAULT_COMPOSE_PROGRAM;
use crate::storage::layout::StorageLayout;
use crate::storage::settings::{ServerSettings, Settings};

/// Main application options
#[derive(Debug, Clone)]
pub struct AppOptions {
    /// Storage layout paths
    pub storage: StorageLayout,

    /// HTTP server configuration
    pub server: ServerSettings,

    /// Event bus options
    pub bus: BusOptions,

    /// Store initialization retries
    pub bootstrap: bootstrap::Options,

    /// Program run as `<program> compose ...`
    pub compose_program: String,

    /// Registered projects
    pub projects: Vec<Project>,

    /// Deploy webhooks
    pub webhooks: Vec<Webhook>,

    /// Maximum delay for graceful shutdown
    pub max_shutdown_delay: Duration,
}

impl Default for AppOptions {
    fn default() -> Self {
        Self {
            storage: StorageLayout::default(),
            server: ServerSettings::default(),
            bus: BusOptions::default(),
            bootstrap: bootstrap::Options::default(),
            compose_program: DEFAULT_COMPOSE_PROGRAM.to_string(),
            projects: Vec::new(),
            webhooks: Vec::new(),
            max_shutdown_delay: Duration::from_secs(30),
        }
    }
}

impl From<&Settings> for AppOptions {
    fn from(settings: &Settings) -> Self {
        Self {
            storage: StorageLayout::new(settings.storage_dir.clone()),
            server: settings.server.clone(),
            bus: BusOptions {
                keep_alive_interval: settings.keep_alive_interval(),
            },
            bootstrap: bootstrap::Options::from(&settings.bootstrap),
            compose_program: settings.compose_command.clone(),
            projects: settings.projects.clone(),
            webhooks: settings.webhooks.clone(),
            ..Default::default()
        }
    }
}
