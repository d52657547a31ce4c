//! Deployment service
//!
//! Entry point for build and deploy requests: resolves the project, records
//! the run, starts the pipeline in the background and finalizes the record
//! once the pipeline resolves.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::errors::MonitorError;
use crate::events::{EventBus, EventPayload, EventType};
use crate::models::deployment::{Action, DeploymentLog, TriggeredBy};
use crate::models::project::{Project, Webhook};
use crate::pipeline::{PipelineRunner, RunResult};
use crate::storage::projects::ProjectStore;
use crate::storage::recorder::DeploymentRecorder;

/// Acknowledgment returned as soon as a run is started
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunTicket {
    /// `build_started` or `deploy_started`
    pub status: String,
    pub project: String,
    pub run_id: u64,
}

/// Runs returned by [`DeploymentService::project_logs`]
pub const PROJECT_LOG_LIMIT: usize = 50;

/// Webhook as listed to clients
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookEntry {
    #[serde(flatten)]
    pub webhook: Webhook,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_name: Option<String>,

    /// Path that triggers the webhook
    pub url: String,
}

/// A run started in the background
#[derive(Debug)]
pub struct StartedRun {
    pub ticket: RunTicket,

    /// Resolves once the pipeline finished and its outcome was recorded
    pub completion: JoinHandle<RunResult>,
}

/// Starts and records build/deploy runs
pub struct DeploymentService {
    projects: Arc<dyn ProjectStore>,
    recorder: Arc<dyn DeploymentRecorder>,
    runner: Arc<PipelineRunner>,
    bus: EventBus,
}

impl DeploymentService {
    pub fn new(
        projects: Arc<dyn ProjectStore>,
        recorder: Arc<dyn DeploymentRecorder>,
        runner: Arc<PipelineRunner>,
        bus: EventBus,
    ) -> Self {
        Self {
            projects,
            recorder,
            runner,
            bus,
        }
    }

    /// Start a user-triggered build of project `project_id`
    pub async fn trigger_build(&self, project_id: i64) -> Result<StartedRun, MonitorError> {
        let project = self.lookup(project_id).await?;
        self.start(project, Action::Build, TriggeredBy::User).await
    }

    /// Start a deploy of project `project_id`
    pub async fn trigger_deploy(
        &self,
        project_id: i64,
        triggered_by: TriggeredBy,
    ) -> Result<StartedRun, MonitorError> {
        let project = self.lookup(project_id).await?;
        self.start(project, Action::Deploy, triggered_by).await
    }

    /// Start a deploy of the project owning webhook `token`
    pub async fn trigger_webhook(&self, token: &str) -> Result<StartedRun, MonitorError> {
        let webhook = self
            .projects
            .find_webhook(token)
            .await?
            .ok_or_else(|| MonitorError::NotFound("Webhook not found".to_string()))?;

        info!("Webhook {} triggered for project {}", webhook.id, webhook.project_id);
        let project = self.lookup(webhook.project_id).await?;
        self.start(project, Action::Deploy, TriggeredBy::Webhook(webhook.id))
            .await
    }

    /// Stored record of run `run_id`
    pub async fn get_log(&self, run_id: u64) -> Result<DeploymentLog, MonitorError> {
        self.recorder
            .get_run(run_id)
            .await?
            .ok_or_else(|| MonitorError::NotFound("Log not found".to_string()))
    }

    /// Every registered project, ordered by name
    pub async fn list_projects(&self) -> Result<Vec<Project>, MonitorError> {
        self.projects.list_projects().await
    }

    /// Project `project_id`
    pub async fn get_project(&self, project_id: i64) -> Result<Project, MonitorError> {
        self.lookup(project_id).await
    }

    /// Latest runs of project `project_id`, newest first
    ///
    /// An unknown project simply has no runs.
    pub async fn project_logs(&self, project_id: i64) -> Result<Vec<DeploymentLog>, MonitorError> {
        self.recorder
            .list_runs(project_id, PROJECT_LOG_LIMIT)
            .await
    }

    /// Webhooks of project `project_id`, or of every project
    pub async fn list_webhooks(
        &self,
        project_id: Option<i64>,
    ) -> Result<Vec<WebhookEntry>, MonitorError> {
        let webhooks = self.projects.list_webhooks(project_id).await?;

        let mut entries = Vec::with_capacity(webhooks.len());
        for webhook in webhooks {
            let project_name = self
                .projects
                .get_project(webhook.project_id)
                .await?
                .map(|project| project.name);
            entries.push(WebhookEntry {
                url: format!("/webhook/{}", webhook.token),
                project_name,
                webhook,
            });
        }
        Ok(entries)
    }

    async fn lookup(&self, project_id: i64) -> Result<Project, MonitorError> {
        self.projects
            .get_project(project_id)
            .await?
            .ok_or_else(|| MonitorError::NotFound("Project not found".to_string()))
    }

    async fn start(
        &self,
        project: Project,
        action: Action,
        triggered_by: TriggeredBy,
    ) -> Result<StartedRun, MonitorError> {
        let run_id = self
            .recorder
            .start_run(&project, action, &triggered_by)
            .await?;

        let ticket = RunTicket {
            status: format!("{}_started", action.as_str()),
            project: project.name.clone(),
            run_id,
        };
        info!(
            "Run {} started: {} of {} (triggered by {})",
            run_id,
            action.as_str(),
            project.name,
            triggered_by
        );

        let task = match action {
            Action::Build => self.runner.spawn_build(project),
            Action::Deploy => self.runner.spawn_deploy(project, triggered_by),
        };

        let recorder = self.recorder.clone();
        let bus = self.bus.clone();
        let completion = tokio::spawn(async move {
            let project = task.project().to_string();
            let result = task.join().await;

            // The pipeline already ran; a failed write only loses the audit record
            if let Err(e) = recorder
                .complete_run(run_id, result.status, &result.log_content)
                .await
            {
                error!("Failed to record outcome of run {}: {}", run_id, e);
                bus.publish(
                    EventType::error(action),
                    &EventPayload::new(project).with_message(e.to_string()),
                );
            }
            result
        });

        Ok(StartedRun { ticket, completion })
    }
}
