//! HTTP request handlers

use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{
        sse::{Event, Sse},
        IntoResponse, Response,
    },
    Json,
};
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::{error, info};

use crate::deploy::{RunTicket, WebhookEntry};
use crate::errors::MonitorError;
use crate::events::Frame;
use crate::models::deployment::{DeploymentLog, TriggeredBy};
use crate::models::project::Project;
use crate::server::state::ServerState;
use crate::utils::version_info;

/// Error body returned by every failing route
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Handler error mapped onto a status code
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl From<MonitorError> for ApiError {
    fn from(err: MonitorError) -> Self {
        match err {
            MonitorError::NotFound(message) => Self {
                status: StatusCode::NOT_FOUND,
                message,
            },
            other => {
                error!("Request failed: {}", other);
                Self {
                    status: StatusCode::INTERNAL_SERVER_ERROR,
                    message: "Server error".to_string(),
                }
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(ErrorResponse {
                error: self.message,
            }),
        )
            .into_response()
    }
}

/// Health check response
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub clients: usize,
    pub message: String,
}

/// Health check handler
pub async fn health_handler(State(state): State<Arc<ServerState>>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok".to_string(),
        clients: state.bus.subscriber_count(),
        message: "Server is running".to_string(),
    })
}

/// Version handler
pub async fn version_handler() -> impl IntoResponse {
    Json(version_info())
}

/// Event stream query
#[derive(Debug, Deserialize)]
pub struct StreamQuery {
    /// Only receive events of this project
    pub project: Option<String>,
}

/// Event stream handler
///
/// The bus subscription lives as long as the response stream; the client
/// disconnecting drops both. Streams end when the server shuts down.
pub async fn stream_handler(
    State(state): State<Arc<ServerState>>,
    Query(query): Query<StreamQuery>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let filter = query.project.filter(|project| !project.is_empty());
    info!(
        "Event stream requested for project: {}",
        filter.as_deref().unwrap_or("all")
    );

    let (tx, rx) = mpsc::unbounded_channel::<Frame>();
    let subscription = state.bus.subscribe(filter, Arc::new(tx));

    let stream = UnboundedReceiverStream::new(rx)
        .map(move |frame| {
            let _subscription = &subscription;
            Ok::<_, Infallible>(Event::default().event(frame.event.as_str()).data(frame.data))
        })
        .take_until(state.shutdown.clone().cancelled_owned());

    Sse::new(stream)
}

/// Stored deployment log handler
pub async fn log_handler(
    State(state): State<Arc<ServerState>>,
    Path(id): Path<u64>,
) -> Result<Json<DeploymentLog>, ApiError> {
    Ok(Json(state.service.get_log(id).await?))
}

/// Build trigger handler
pub async fn build_handler(
    State(state): State<Arc<ServerState>>,
    Path(id): Path<i64>,
) -> Result<Json<RunTicket>, ApiError> {
    let started = state.service.trigger_build(id).await?;
    Ok(Json(started.ticket))
}

/// Deploy trigger handler
pub async fn deploy_handler(
    State(state): State<Arc<ServerState>>,
    Path(id): Path<i64>,
) -> Result<Json<RunTicket>, ApiError> {
    let started = state.service.trigger_deploy(id, TriggeredBy::User).await?;
    Ok(Json(started.ticket))
}

/// Webhook trigger handler
pub async fn webhook_handler(
    State(state): State<Arc<ServerState>>,
    Path(token): Path<String>,
) -> Result<Json<RunTicket>, ApiError> {
    let started = state.service.trigger_webhook(&token).await?;
    Ok(Json(started.ticket))
}

/// Project list handler
pub async fn projects_handler(
    State(state): State<Arc<ServerState>>,
) -> Result<Json<Vec<Project>>, ApiError> {
    Ok(Json(state.service.list_projects().await?))
}

/// Single project handler
pub async fn project_handler(
    State(state): State<Arc<ServerState>>,
    Path(id): Path<i64>,
) -> Result<Json<Project>, ApiError> {
    Ok(Json(state.service.get_project(id).await?))
}

/// Run history handler
pub async fn project_logs_handler(
    State(state): State<Arc<ServerState>>,
    Path(id): Path<i64>,
) -> Result<Json<Vec<DeploymentLog>>, ApiError> {
    Ok(Json(state.service.project_logs(id).await?))
}

/// Webhooks of one project
pub async fn project_webhooks_handler(
    State(state): State<Arc<ServerState>>,
    Path(id): Path<i64>,
) -> Result<Json<Vec<WebhookEntry>>, ApiError> {
    Ok(Json(state.service.list_webhooks(Some(id)).await?))
}

/// Webhook list handler
pub async fn webhooks_handler(
    State(state): State<Arc<ServerState>>,
) -> Result<Json<Vec<WebhookEntry>>, ApiError> {
    Ok(Json(state.service.list_webhooks(None).await?))
}
