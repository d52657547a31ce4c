//! Spawned pipeline runs

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::models::deployment::Action;
use crate::pipeline::RunResult;

/// A pipeline run executing on its own tokio task
///
/// The cancellation token is observed between stages only; a running stage
/// process is never interrupted.
#[derive(Debug)]
pub struct PipelineTask {
    project: String,
    action: Action,
    cancel: CancellationToken,
    handle: JoinHandle<RunResult>,
}

impl PipelineTask {
    pub(crate) fn new(
        project: String,
        action: Action,
        cancel: CancellationToken,
        handle: JoinHandle<RunResult>,
    ) -> Self {
        Self {
            project,
            action,
            cancel,
            handle,
        }
    }

    /// Name of the project being run
    pub fn project(&self) -> &str {
        &self.project
    }

    pub fn action(&self) -> Action {
        self.action
    }

    /// Token stopping the run at the next stage boundary
    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Wait for the run's result
    pub async fn join(self) -> RunResult {
        match self.handle.await {
            Ok(result) => result,
            Err(e) => RunResult::failed(String::new(), format!("Pipeline task aborted: {}", e)),
        }
    }
}
