//! Build and deploy pipelines
//!
//! A pipeline runs the docker compose stages of one project in order,
//! streaming every output chunk to the [`crate::events::EventBus`] and
//! classifying the run as success or error.

pub mod process;
pub mod runner;
pub mod sequencer;
pub mod stage;
pub mod task;

pub use process::{CommandLauncher, ProcessExit, ProcessLauncher, ProcessMessage};
pub use runner::PipelineRunner;
pub use sequencer::{SequencerEvent, SequencerState, StageSequencer};
pub use stage::{FailurePolicy, Stage, StageCommand, StageKind};
pub use task::PipelineTask;

use crate::models::deployment::RunStatus;

/// Outcome of one build or deploy run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunResult {
    /// `Success` or `Error`
    pub status: RunStatus,

    /// Everything appended to the run's log
    pub log_content: String,

    /// Error message of a failed run
    pub error: Option<String>,
}

impl RunResult {
    pub fn success(log_content: String) -> Self {
        Self {
            status: RunStatus::Success,
            log_content,
            error: None,
        }
    }

    pub fn failed(log_content: String, error: impl Into<String>) -> Self {
        Self {
            status: RunStatus::Error,
            log_content,
            error: Some(error.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == RunStatus::Success
    }
}
