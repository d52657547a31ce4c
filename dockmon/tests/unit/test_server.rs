//! HTTP route tests

use std::sync::Arc;
use std::time::Duration;

use axum::body::{to_bytes, Body, BodyDataStream, Bytes};
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use dockmon::deploy::{RunTicket, WebhookEntry};
use dockmon::events::{EventPayload, EventType};
use dockmon::models::deployment::DeploymentLog;
use dockmon::models::project::Project;
use futures::StreamExt;
use dockmon::server::handlers::{ErrorResponse, HealthResponse};
use dockmon::server::serve::router;
use dockmon::server::state::ServerState;
use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;

use crate::common::{Harness, ScriptedLauncher};

fn app(harness: &Harness) -> Router {
    router(Arc::new(ServerState::new(
        harness.service.clone(),
        harness.bus.clone(),
        CancellationToken::new(),
    )))
}

async fn call(app: Router, method: Method, uri: &str) -> (StatusCode, Bytes) {
    let response = app
        .oneshot(
            Request::builder()
                .method(method)
                .uri(uri)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, body)
}

fn json<T: DeserializeOwned>(body: &[u8]) -> T {
    serde_json::from_slice(body).unwrap()
}

#[tokio::test]
async fn test_health() {
    let harness = Harness::new(ScriptedLauncher::new()).await;

    let (status, body) = call(app(&harness), Method::GET, "/health").await;
    assert_eq!(status, StatusCode::OK);

    let health: HealthResponse = json(&body);
    assert_eq!(health.status, "ok");
    assert_eq!(health.clients, 0);
    assert_eq!(health.message, "Server is running");
    harness.dir.delete().await.unwrap();
}

#[tokio::test]
async fn test_build_route() {
    let harness = Harness::new(ScriptedLauncher::new()).await;

    let (status, body) = call(app(&harness), Method::POST, "/build/1").await;
    assert_eq!(status, StatusCode::OK);

    let ticket: RunTicket = json(&body);
    assert_eq!(ticket.status, "build_started");
    assert_eq!(ticket.project, "web");

    // The run was recorded before the response
    let uri = format!("/logs/{}", ticket.run_id);
    let (status, _) = call(app(&harness), Method::GET, &uri).await;
    assert_eq!(status, StatusCode::OK);
    harness.dir.delete().await.unwrap();
}

#[tokio::test]
async fn test_unknown_project_is_404() {
    let harness = Harness::new(ScriptedLauncher::new()).await;

    for uri in ["/build/99", "/deploy/99"] {
        let (status, body) = call(app(&harness), Method::POST, uri).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let error: ErrorResponse = json(&body);
        assert_eq!(error.error, "Project not found");
    }

    let (status, body) = call(app(&harness), Method::POST, "/webhook/bad-token").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json::<ErrorResponse>(&body).error, "Webhook not found");

    let (status, body) = call(app(&harness), Method::GET, "/logs/12345").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json::<ErrorResponse>(&body).error, "Log not found");

    assert!(harness.launcher.launched().is_empty());
    harness.dir.delete().await.unwrap();
}

#[tokio::test]
async fn test_webhook_route() {
    let harness = Harness::new(ScriptedLauncher::new()).await;

    let (status, body) = call(app(&harness), Method::POST, "/webhook/web-hook").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json::<RunTicket>(&body).status, "deploy_started");
    harness.dir.delete().await.unwrap();
}

#[tokio::test]
async fn test_project_routes() {
    let harness = Harness::new(ScriptedLauncher::new()).await;

    let (status, body) = call(app(&harness), Method::GET, "/projects").await;
    assert_eq!(status, StatusCode::OK);
    let names: Vec<String> = json::<Vec<Project>>(&body)
        .into_iter()
        .map(|p| p.name)
        .collect();
    assert_eq!(names, vec!["api", "web"]);

    let (status, body) = call(app(&harness), Method::GET, "/projects/2").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json::<Project>(&body).name, "api");

    let (status, body) = call(app(&harness), Method::GET, "/projects/99").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json::<ErrorResponse>(&body).error, "Project not found");
    harness.dir.delete().await.unwrap();
}

#[tokio::test]
async fn test_project_logs_route() {
    let harness = Harness::new(ScriptedLauncher::new()).await;

    let first = harness.service.trigger_build(1).await.unwrap();
    first.completion.await.unwrap();
    let second = harness.service.trigger_build(1).await.unwrap();
    second.completion.await.unwrap();

    let (status, body) = call(app(&harness), Method::GET, "/projects/1/logs").await;
    assert_eq!(status, StatusCode::OK);
    let ids: Vec<u64> = json::<Vec<DeploymentLog>>(&body)
        .iter()
        .map(|log| log.id)
        .collect();
    assert_eq!(ids, vec![second.ticket.run_id, first.ticket.run_id]);

    let (status, body) = call(app(&harness), Method::GET, "/projects/2/logs").await;
    assert_eq!(status, StatusCode::OK);
    assert!(json::<Vec<DeploymentLog>>(&body).is_empty());
    harness.dir.delete().await.unwrap();
}

#[tokio::test]
async fn test_webhook_listing_routes() {
    let harness = Harness::new(ScriptedLauncher::new()).await;

    let (status, body) = call(app(&harness), Method::GET, "/webhooks").await;
    assert_eq!(status, StatusCode::OK);
    let webhooks: Vec<WebhookEntry> = json(&body);
    assert_eq!(webhooks.len(), 1);
    assert_eq!(webhooks[0].webhook.token, "web-hook");
    assert_eq!(webhooks[0].project_name.as_deref(), Some("web"));
    assert_eq!(webhooks[0].url, "/webhook/web-hook");

    let (_, body) = call(app(&harness), Method::GET, "/projects/2/webhooks").await;
    assert!(json::<Vec<WebhookEntry>>(&body).is_empty());
    harness.dir.delete().await.unwrap();
}

async fn open_stream(app: Router, uri: &str) -> BodyDataStream {
    let response = app
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response.headers()["content-type"].to_str().unwrap().to_string();
    assert!(content_type.starts_with("text/event-stream"));
    response.into_body().into_data_stream()
}

/// Read SSE text until it contains `needle`
async fn read_until(body: &mut BodyDataStream, needle: &str) -> String {
    let mut text = String::new();
    while !text.contains(needle) {
        let chunk = tokio::time::timeout(Duration::from_secs(5), body.next())
            .await
            .expect("no event within 5s")
            .expect("stream ended")
            .unwrap();
        text.push_str(std::str::from_utf8(&chunk).unwrap());
    }
    text
}

#[tokio::test]
async fn test_stream_filters_by_project() {
    let harness = Harness::new(ScriptedLauncher::new()).await;
    let mut body = open_stream(app(&harness), "/logs/stream?project=web").await;
    assert_eq!(harness.bus.subscriber_count(), 1);

    let connection = read_until(&mut body, "\n\n").await;
    assert!(connection.starts_with("event: connection\ndata: "));
    assert!(connection.contains("\"project\":\"web\""));
    assert!(connection.contains("SSE connection established"));

    harness.bus.publish(
        EventType::BuildLog,
        &EventPayload::new("api").with_output("api output"),
    );
    harness.bus.publish(
        EventType::BuildLog,
        &EventPayload::new("web").with_output("web output"),
    );

    let text = read_until(&mut body, "web output").await;
    assert!(text.contains("event: build_log\n"));
    assert!(!text.contains("api output"));

    // Dropping the body is the client disconnecting
    drop(body);
    assert_eq!(harness.bus.subscriber_count(), 0);
    harness.dir.delete().await.unwrap();
}

#[tokio::test]
async fn test_stream_empty_filter_receives_all() {
    let harness = Harness::new(ScriptedLauncher::new()).await;
    let mut body = open_stream(app(&harness), "/logs/stream?project=").await;

    let connection = read_until(&mut body, "\n\n").await;
    assert!(connection.contains("\"project\":\"*\""));

    harness.bus.publish(
        EventType::DeployLog,
        &EventPayload::new("api").with_output("api output"),
    );
    let text = read_until(&mut body, "api output").await;
    assert!(text.contains("event: deploy_log\n"));
    harness.dir.delete().await.unwrap();
}

#[tokio::test]
async fn test_stream_ends_on_shutdown() {
    let harness = Harness::new(ScriptedLauncher::new()).await;
    let shutdown = CancellationToken::new();
    let app = router(Arc::new(ServerState::new(
        harness.service.clone(),
        harness.bus.clone(),
        shutdown.clone(),
    )));

    let mut body = open_stream(app, "/logs/stream").await;
    read_until(&mut body, "event: connection").await;

    shutdown.cancel();
    loop {
        let next = tokio::time::timeout(Duration::from_secs(5), body.next())
            .await
            .expect("stream still open after shutdown");
        if next.is_none() {
            break;
        }
    }

    drop(body);
    assert_eq!(harness.bus.subscriber_count(), 0);
    harness.dir.delete().await.unwrap();
}
