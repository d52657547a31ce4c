//! Build and deploy orchestration

pub mod service;

pub use service::{DeploymentService, RunTicket, StartedRun, WebhookEntry, PROJECT_LOG_LIMIT};
