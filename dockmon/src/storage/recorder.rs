//! Deployment log persistence

use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use tracing::{debug, info};

use crate::bootstrap::StoreInitializer;
use crate::errors::MonitorError;
use crate::filesys::dir::Dir;
use crate::filesys::file::File;
use crate::models::deployment::{Action, DeploymentLog, RunStatus, TriggeredBy};
use crate::models::project::Project;

/// Records the start and the outcome of every run
#[async_trait]
pub trait DeploymentRecorder: Send + Sync {
    /// Create a `started` record and return its run ID
    async fn start_run(
        &self,
        project: &Project,
        action: Action,
        triggered_by: &TriggeredBy,
    ) -> Result<u64, MonitorError>;

    /// Write the terminal status and log of a run
    ///
    /// Called exactly once per run; a second call overwrites the first.
    async fn complete_run(
        &self,
        run_id: u64,
        status: RunStatus,
        log_content: &str,
    ) -> Result<(), MonitorError>;

    /// Stored record of a run
    async fn get_run(&self, run_id: u64) -> Result<Option<DeploymentLog>, MonitorError>;

    /// Up to `limit` runs of a project, newest first
    async fn list_runs(
        &self,
        project_id: i64,
        limit: usize,
    ) -> Result<Vec<DeploymentLog>, MonitorError>;
}

/// Stores each run as `<id>.json` in a directory
#[derive(Debug)]
pub struct FileRecorder {
    dir: Dir,
    next_id: AtomicU64,
}

impl FileRecorder {
    pub fn new(dir: Dir) -> Self {
        Self {
            dir,
            next_id: AtomicU64::new(1),
        }
    }

    fn run_file(&self, run_id: u64) -> File {
        self.dir.file(&format!("{}.json", run_id))
    }

    /// Highest run ID already on disk
    async fn highest_run_id(&self) -> Result<u64, MonitorError> {
        let files = self.dir.list_files().await?;
        Ok(files
            .iter()
            .filter_map(|path| run_id_of(path))
            .max()
            .unwrap_or(0))
    }
}

/// Run ID of a `<id>.json` record file
fn run_id_of(path: &Path) -> Option<u64> {
    if path.extension()? != "json" {
        return None;
    }
    path.file_stem()?.to_str()?.parse().ok()
}

#[async_trait]
impl DeploymentRecorder for FileRecorder {
    async fn start_run(
        &self,
        project: &Project,
        action: Action,
        triggered_by: &TriggeredBy,
    ) -> Result<u64, MonitorError> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let record = DeploymentLog {
            id,
            project_id: project.id,
            action,
            status: RunStatus::Started,
            triggered_by: triggered_by.clone(),
            log_content: String::new(),
            created_at: Utc::now(),
            updated_at: None,
        };

        self.run_file(id)
            .write_json(&record)
            .await
            .map_err(|e| MonitorError::StoreError(format!("Failed to record run {}: {}", id, e)))?;

        debug!(
            "Recorded {} run {} for project {} ({})",
            action.as_str(),
            id,
            project.name,
            triggered_by
        );
        Ok(id)
    }

    async fn complete_run(
        &self,
        run_id: u64,
        status: RunStatus,
        log_content: &str,
    ) -> Result<(), MonitorError> {
        let file = self.run_file(run_id);
        if !file.exists().await {
            return Err(MonitorError::NotFound(format!("Deployment log {}", run_id)));
        }

        let mut record: DeploymentLog = file.read_json().await?;
        record.status = status;
        record.log_content = log_content.to_string();
        record.updated_at = Some(Utc::now());

        file.write_json(&record).await.map_err(|e| {
            MonitorError::StoreError(format!("Failed to complete run {}: {}", run_id, e))
        })
    }

    async fn get_run(&self, run_id: u64) -> Result<Option<DeploymentLog>, MonitorError> {
        let file = self.run_file(run_id);
        if !file.exists().await {
            return Ok(None);
        }
        Ok(Some(file.read_json().await?))
    }

    async fn list_runs(
        &self,
        project_id: i64,
        limit: usize,
    ) -> Result<Vec<DeploymentLog>, MonitorError> {
        let mut runs = Vec::new();
        for path in self.dir.list_files().await? {
            if run_id_of(&path).is_none() {
                continue;
            }
            let record: DeploymentLog = File::new(path).read_json().await?;
            if record.project_id == project_id {
                runs.push(record);
            }
        }

        runs.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        runs.truncate(limit);
        Ok(runs)
    }
}

#[async_trait]
impl StoreInitializer for FileRecorder {
    async fn initialize(&self) -> Result<(), MonitorError> {
        self.dir.create().await?;

        // Fail now rather than on the first run if the directory is read-only
        let probe = self.dir.file(".probe");
        probe.write_atomic(b"ok").await?;
        tokio::fs::remove_file(probe.path()).await?;

        let highest = self.highest_run_id().await?;
        self.next_id.fetch_max(highest + 1, Ordering::SeqCst);
        info!(
            "Deployment log store ready at {} (next run id {})",
            self.dir.path().display(),
            self.next_id.load(Ordering::SeqCst)
        );
        Ok(())
    }
}
