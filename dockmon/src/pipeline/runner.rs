//! Pipeline runner

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::events::{EventBus, EventPayload, EventType};
use crate::models::deployment::{Action, TriggeredBy};
use crate::models::project::Project;
use crate::pipeline::process::{ProcessExit, ProcessLauncher, ProcessMessage};
use crate::pipeline::sequencer::{SequencerEvent, SequencerState, StageSequencer};
use crate::pipeline::stage::{build_stages, deploy_stages, FailurePolicy, Stage};
use crate::pipeline::task::PipelineTask;
use crate::pipeline::RunResult;

/// Program invoked with `compose` when none is configured
pub const DEFAULT_COMPOSE_PROGRAM: &str = "docker";

/// Runs build and deploy pipelines and streams their output
///
/// Runs are independent: nothing prevents two runs of the same project from
/// executing at once, and a stalled stage process stalls its run forever.
pub struct PipelineRunner {
    bus: EventBus,
    launcher: Arc<dyn ProcessLauncher>,
    compose_program: String,
}

impl PipelineRunner {
    pub fn new(
        bus: EventBus,
        launcher: Arc<dyn ProcessLauncher>,
        compose_program: impl Into<String>,
    ) -> Self {
        Self {
            bus,
            launcher,
            compose_program: compose_program.into(),
        }
    }

    /// Pull, build and create the project's services
    pub async fn run_build(&self, project: &Project) -> RunResult {
        self.run_build_with(project, &CancellationToken::new()).await
    }

    /// Bring the project up, rebuilding if needed
    pub async fn run_deploy(&self, project: &Project, trigger: &TriggeredBy) -> RunResult {
        self.run_deploy_with(project, trigger, &CancellationToken::new())
            .await
    }

    /// Spawn [`Self::run_build`] on its own task
    pub fn spawn_build(self: &Arc<Self>, project: Project) -> PipelineTask {
        let cancel = CancellationToken::new();
        let runner = self.clone();
        let token = cancel.clone();
        let name = project.name.clone();

        let handle = tokio::spawn(async move { runner.run_build_with(&project, &token).await });
        PipelineTask::new(name, Action::Build, cancel, handle)
    }

    /// Spawn [`Self::run_deploy`] on its own task
    pub fn spawn_deploy(self: &Arc<Self>, project: Project, trigger: TriggeredBy) -> PipelineTask {
        let cancel = CancellationToken::new();
        let runner = self.clone();
        let token = cancel.clone();
        let name = project.name.clone();

        let handle = tokio::spawn(async move {
            runner.run_deploy_with(&project, &trigger, &token).await
        });
        PipelineTask::new(name, Action::Deploy, cancel, handle)
    }

    async fn run_build_with(&self, project: &Project, cancel: &CancellationToken) -> RunResult {
        let intro = format!("Starting build for {}...\n", project.name);
        self.execute(project, Action::Build, build_stages(), intro, cancel)
            .await
    }

    async fn run_deploy_with(
        &self,
        project: &Project,
        trigger: &TriggeredBy,
        cancel: &CancellationToken,
    ) -> RunResult {
        let intro = format!(
            "Starting deployment for {} (triggered by {})...\n",
            project.name, trigger
        );
        self.execute(project, Action::Deploy, deploy_stages(), intro, cancel)
            .await
    }

    async fn execute(
        &self,
        project: &Project,
        action: Action,
        stages: Vec<Stage>,
        intro: String,
        cancel: &CancellationToken,
    ) -> RunResult {
        info!("Starting {} pipeline for {}", action.as_str(), project.name);

        let mut log = RunLog::new(&self.bus, &project.name, action);
        let mut sequencer = StageSequencer::new(stages);
        log.append(&intro);

        loop {
            let event = match sequencer.state().clone() {
                SequencerState::Pending => SequencerEvent::Start,

                SequencerState::Running(index) => {
                    if cancel.is_cancelled() {
                        warn!("{} pipeline for {} cancelled", action.as_str(), project.name);
                        SequencerEvent::Cancel
                    } else {
                        let Some(stage) = sequencer.stage(index).cloned() else {
                            return log.fail(format!("Stage {} is out of range", index));
                        };
                        let exit = self.run_stage(project, &stage, &mut log).await;
                        SequencerEvent::StageExited(exit)
                    }
                }

                SequencerState::Succeeded => {
                    if action == Action::Build {
                        log.append("\nBuild process completed successfully.\n");
                    }
                    info!("{} pipeline for {} succeeded", action.as_str(), project.name);
                    return log.succeed();
                }

                SequencerState::Failed(message) => {
                    error!(
                        "{} pipeline for {} failed: {}",
                        action.as_str(),
                        project.name,
                        message
                    );
                    return log.fail(message);
                }
            };

            if let Err(e) = sequencer.process(event) {
                error!("Pipeline state error for {}: {}", project.name, e);
                return log.fail(e);
            }
        }
    }

    /// Run one stage to completion, streaming its output into `log`
    async fn run_stage(&self, project: &Project, stage: &Stage, log: &mut RunLog<'_>) -> ProcessExit {
        if let Some(intro) = stage.kind.intro() {
            log.append(intro);
        }

        let command = stage.command(project, &self.compose_program);
        debug!("Running stage {} for {}: {}", stage.kind.name(), project.name, command);

        let mut messages = self.launcher.launch(&command);
        let exit = loop {
            match messages.recv().await {
                Some(ProcessMessage::Output(chunk)) => log.append(&chunk),
                Some(ProcessMessage::Exited(exit)) => break exit,
                None => {
                    break ProcessExit::SpawnFailed(
                        "process ended without reporting an exit status".to_string(),
                    )
                }
            }
        };

        if exit.success() {
            if let Some(note) = stage.kind.success_note() {
                log.append(note);
            }
        } else {
            match stage.policy {
                FailurePolicy::Warn => log.append(&stage.kind.warning_note(&exit)),
                FailurePolicy::Abort => {
                    if let Some(note) = stage.kind.failure_note(&exit) {
                        if stage.kind.streams_failure_note(&exit) {
                            log.append(&note);
                        } else {
                            log.record(&note);
                        }
                    }
                }
            }
        }

        debug!("Stage {} for {} exited: {:?}", stage.kind.name(), project.name, exit);
        exit
    }
}

/// Cumulative log of one run; every append is published immediately
struct RunLog<'a> {
    bus: &'a EventBus,
    project: &'a str,
    action: Action,
    content: String,
}

impl<'a> RunLog<'a> {
    fn new(bus: &'a EventBus, project: &'a str, action: Action) -> Self {
        Self {
            bus,
            project,
            action,
            content: String::new(),
        }
    }

    fn append(&mut self, output: &str) {
        self.content.push_str(output);
        self.bus.publish(
            EventType::log(self.action),
            &EventPayload::new(self.project).with_output(output),
        );
    }

    /// Append to the stored log without publishing
    fn record(&mut self, output: &str) {
        self.content.push_str(output);
    }

    fn succeed(self) -> RunResult {
        self.bus.publish(
            EventType::completed(self.action),
            &EventPayload::new(self.project).with_status("completed"),
        );
        RunResult::success(self.content)
    }

    fn fail(self, message: String) -> RunResult {
        self.bus.publish(
            EventType::error(self.action),
            &EventPayload::new(self.project).with_message(message.clone()),
        );
        RunResult::failed(self.content, message)
    }
}
