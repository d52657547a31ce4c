//! Application state management

use std::sync::Arc;

use tracing::info;

use crate::app::options::AppOptions;
use crate::bootstrap;
use crate::deploy::DeploymentService;
use crate::errors::MonitorError;
use crate::events::EventBus;
use crate::pipeline::{CommandLauncher, PipelineRunner, ProcessLauncher};
use crate::storage::projects::StaticProjectStore;
use crate::storage::recorder::FileRecorder;

/// Main application state
pub struct AppState {
    /// Event bus shared by the runner and the event streams
    pub bus: EventBus,

    /// Deployment service
    pub service: Arc<DeploymentService>,
}

impl AppState {
    /// Initialize application state
    ///
    /// Retries store initialization per `options.bootstrap` and fails with
    /// [`MonitorError::BootstrapExhausted`] when every attempt failed.
    pub async fn init(options: &AppOptions) -> Result<Self, MonitorError> {
        Self::init_with_launcher(options, Arc::new(CommandLauncher)).await
    }

    /// Initialize application state with a custom process launcher
    pub async fn init_with_launcher(
        options: &AppOptions,
        launcher: Arc<dyn ProcessLauncher>,
    ) -> Result<Self, MonitorError> {
        info!("Initializing application state...");

        let recorder = Arc::new(FileRecorder::new(options.storage.deployment_logs_dir()));
        bootstrap::run(&options.bootstrap, recorder.as_ref(), tokio::time::sleep).await?;

        let projects = Arc::new(StaticProjectStore::new(
            options.projects.clone(),
            options.webhooks.clone(),
        )?);
        info!("Loaded {} projects", projects.len());

        let bus = EventBus::new(options.bus.clone());
        let runner = Arc::new(PipelineRunner::new(
            bus.clone(),
            launcher,
            options.compose_program.clone(),
        ));
        let service = Arc::new(DeploymentService::new(
            projects,
            recorder,
            runner,
            bus.clone(),
        ));

        Ok(Self { bus, service })
    }
}
