//! HTTP server setup

use std::future::Future;
use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::errors::MonitorError;
use crate::server::handlers::{
    build_handler, deploy_handler, health_handler, log_handler, project_handler,
    project_logs_handler, project_webhooks_handler, projects_handler, stream_handler,
    version_handler, webhook_handler, webhooks_handler,
};
use crate::server::state::ServerState;
use crate::storage::settings::ServerSettings;

/// Build the application router
pub fn router(state: Arc<ServerState>) -> Router {
    Router::new()
        // Health and version
        .route("/health", get(health_handler))
        .route("/version", get(version_handler))
        // Event stream and stored logs
        .route("/logs/stream", get(stream_handler))
        .route("/logs/{id}", get(log_handler))
        // Projects and webhooks
        .route("/projects", get(projects_handler))
        .route("/projects/{id}", get(project_handler))
        .route("/projects/{id}/logs", get(project_logs_handler))
        .route("/projects/{id}/webhooks", get(project_webhooks_handler))
        .route("/webhooks", get(webhooks_handler))
        // Runs
        .route("/build/{id}", post(build_handler))
        .route("/deploy/{id}", post(deploy_handler))
        .route("/webhook/{token}", post(webhook_handler))
        // State and middleware
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// Start the HTTP server
pub async fn serve(
    settings: &ServerSettings,
    state: Arc<ServerState>,
    shutdown_signal: impl Future<Output = ()> + Send + 'static,
) -> Result<JoinHandle<Result<(), MonitorError>>, MonitorError> {
    let app = router(state);

    let addr = format!("{}:{}", settings.host, settings.port);
    info!("Starting HTTP server on {}", addr);

    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|e| MonitorError::ServerError(e.to_string()))?;

    let handle = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal)
            .await
            .map_err(|e| MonitorError::ServerError(e.to_string()))
    });

    Ok(handle)
}
