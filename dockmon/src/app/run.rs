//! Main application run loop

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::app::options::AppOptions;
use crate::app::state::AppState;
use crate::errors::MonitorError;
use crate::server::serve::serve;
use crate::server::state::ServerState;

/// Run dockmon until `shutdown_signal` resolves
///
/// Fails with [`MonitorError::BootstrapExhausted`] when the store never
/// became available.
pub async fn run(
    options: AppOptions,
    shutdown_signal: impl Future<Output = ()> + Send + 'static,
) -> Result<(), MonitorError> {
    info!("Initializing dockmon...");

    let (shutdown_tx, _shutdown_rx): (broadcast::Sender<()>, _) = broadcast::channel(1);
    let streams_shutdown = CancellationToken::new();
    let mut shutdown_manager = ShutdownManager::new(
        shutdown_tx.clone(),
        streams_shutdown.clone(),
        options.max_shutdown_delay,
    );

    let app_state = AppState::init(&options).await?;

    if let Err(e) = init_server(
        &options,
        &app_state,
        streams_shutdown,
        &mut shutdown_manager,
        shutdown_tx.subscribe(),
    )
    .await
    {
        error!("Failed to start dockmon: {}", e);
        shutdown_manager.shutdown().await?;
        return Err(e);
    }

    shutdown_signal.await;
    info!("Shutdown signal received, shutting down...");

    drop(shutdown_tx);
    shutdown_manager.shutdown().await
}

async fn init_server(
    options: &AppOptions,
    app_state: &AppState,
    streams_shutdown: CancellationToken,
    shutdown_manager: &mut ShutdownManager,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), MonitorError> {
    info!("Initializing HTTP server...");

    let server_state = ServerState::new(
        app_state.service.clone(),
        app_state.bus.clone(),
        streams_shutdown,
    );

    let server_handle = serve(&options.server, Arc::new(server_state), async move {
        let _ = shutdown_rx.recv().await;
    })
    .await?;

    shutdown_manager.with_server_handle(server_handle)
}

// ================================= SHUTDOWN ===================================== //

struct ShutdownManager {
    shutdown_tx: broadcast::Sender<()>,
    streams_shutdown: CancellationToken,
    max_shutdown_delay: Duration,
    server_handle: Option<JoinHandle<Result<(), MonitorError>>>,
}

impl ShutdownManager {
    fn new(
        shutdown_tx: broadcast::Sender<()>,
        streams_shutdown: CancellationToken,
        max_shutdown_delay: Duration,
    ) -> Self {
        Self {
            shutdown_tx,
            streams_shutdown,
            max_shutdown_delay,
            server_handle: None,
        }
    }

    fn with_server_handle(
        &mut self,
        handle: JoinHandle<Result<(), MonitorError>>,
    ) -> Result<(), MonitorError> {
        if self.server_handle.is_some() {
            return Err(MonitorError::ShutdownError(
                "server_handle already set".to_string(),
            ));
        }
        self.server_handle = Some(handle);
        Ok(())
    }

    async fn shutdown(&mut self) -> Result<(), MonitorError> {
        let _ = self.shutdown_tx.send(());
        self.streams_shutdown.cancel();

        match tokio::time::timeout(self.max_shutdown_delay, self.shutdown_impl()).await {
            Ok(result) => result,
            Err(_) => {
                error!(
                    "Shutdown timed out after {:?}, forcing shutdown...",
                    self.max_shutdown_delay
                );
                std::process::exit(1);
            }
        }
    }

    async fn shutdown_impl(&mut self) -> Result<(), MonitorError> {
        info!("Shutting down dockmon...");

        // Pipelines still running are abandoned with the runtime; their
        // deployment logs stay in the `started` state.
        if let Some(handle) = self.server_handle.take() {
            handle
                .await
                .map_err(|e| MonitorError::ShutdownError(e.to_string()))??;
        }

        info!("Shutdown complete");
        Ok(())
    }
}
