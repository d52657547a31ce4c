//! Pipeline stages and their docker compose invocations

use std::path::PathBuf;

use crate::models::project::Project;
use crate::pipeline::process::ProcessExit;

/// What a failed stage does to its run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Append a warning and continue with the next stage
    Warn,

    /// Stop the run with an error
    Abort,
}

/// The compose subcommands a pipeline is made of
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageKind {
    Pull,
    Build,
    Create,
    Up,
}

impl StageKind {
    pub fn name(&self) -> &'static str {
        match self {
            StageKind::Pull => "pull",
            StageKind::Build => "build",
            StageKind::Create => "create",
            StageKind::Up => "up",
        }
    }

    /// Arguments following `compose -f <file>`
    fn compose_args(&self) -> &'static [&'static str] {
        match self {
            StageKind::Pull => &["pull"],
            StageKind::Build => &["build", "--no-cache", "--pull"],
            StageKind::Create => &["create", "--force-recreate"],
            StageKind::Up => &["up", "-d", "--build"],
        }
    }

    /// Line logged before the stage starts
    pub fn intro(&self) -> Option<&'static str> {
        match self {
            StageKind::Build => Some("Building services from Dockerfile...\n"),
            StageKind::Create => Some("Creating containers...\n"),
            StageKind::Pull | StageKind::Up => None,
        }
    }

    /// Line logged after a successful exit
    pub fn success_note(&self) -> Option<&'static str> {
        match self {
            StageKind::Pull => Some("Images pulled successfully\n"),
            StageKind::Build => Some("Build completed successfully\n"),
            StageKind::Create | StageKind::Up => None,
        }
    }

    /// Line logged when a [`FailurePolicy::Warn`] stage fails
    pub fn warning_note(&self, exit: &ProcessExit) -> String {
        let cause = match exit {
            ProcessExit::Code(code) => format!("exit code {}", code),
            ProcessExit::SpawnFailed(err) => err.clone(),
        };
        match self {
            StageKind::Pull => format!(
                "Warning during image pull ({}) - continuing with build\n",
                cause
            ),
            _ => format!("Warning during {} ({}) - continuing\n", self.name(), cause),
        }
    }

    /// Line logged when a [`FailurePolicy::Abort`] stage fails
    pub fn failure_note(&self, exit: &ProcessExit) -> Option<String> {
        match (self, exit) {
            (StageKind::Up, ProcessExit::Code(_)) => None,
            (StageKind::Up, ProcessExit::SpawnFailed(_)) => {
                Some(format!("\n{}\n", self.failure_message(exit)))
            }
            (StageKind::Create, ProcessExit::Code(code)) => {
                Some(format!("Error creating containers (exit code {})\n", code))
            }
            (StageKind::Create, ProcessExit::SpawnFailed(err)) => {
                Some(format!("Error creating containers: {}\n", err))
            }
            (kind, ProcessExit::Code(code)) => {
                Some(format!("Error during {} (exit code {})\n", kind.name(), code))
            }
            (kind, ProcessExit::SpawnFailed(err)) => {
                Some(format!("Error during {} command: {}\n", kind.name(), err))
            }
        }
    }

    /// Whether [`Self::failure_note`] is published as a `*_log` event
    ///
    /// A deploy that never started only records its note; the `deploy_error`
    /// event already carries the same text.
    pub fn streams_failure_note(&self, exit: &ProcessExit) -> bool {
        !matches!((self, exit), (StageKind::Up, ProcessExit::SpawnFailed(_)))
    }

    /// Message carried by the `*_error` event of a failed run
    pub fn failure_message(&self, exit: &ProcessExit) -> String {
        match (self, exit) {
            (StageKind::Build, ProcessExit::Code(code)) => {
                format!("Build failed with exit code {}", code)
            }
            (StageKind::Create, ProcessExit::Code(code)) => {
                format!("Container creation failed with exit code {}", code)
            }
            (StageKind::Pull | StageKind::Up, ProcessExit::Code(code)) => {
                format!("Process exited with code {}", code)
            }
            (StageKind::Up, ProcessExit::SpawnFailed(err)) => {
                format!("Error executing deployment: {}", err)
            }
            (_, ProcessExit::SpawnFailed(err)) => err.clone(),
        }
    }
}

/// One step of a pipeline
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stage {
    pub kind: StageKind,
    pub policy: FailurePolicy,
}

impl Stage {
    pub fn new(kind: StageKind, policy: FailurePolicy) -> Self {
        Self { kind, policy }
    }

    /// Command line running this stage for `project`
    pub fn command(&self, project: &Project, program: &str) -> StageCommand {
        let mut args = vec![
            "compose".to_string(),
            "-f".to_string(),
            project.compose_file().to_string_lossy().into_owned(),
        ];
        args.extend(self.kind.compose_args().iter().map(|a| a.to_string()));

        StageCommand {
            program: program.to_string(),
            args,
            working_dir: project.path.clone(),
        }
    }
}

/// Stages of a build: best-effort pull, then build and create
pub fn build_stages() -> Vec<Stage> {
    vec![
        Stage::new(StageKind::Pull, FailurePolicy::Warn),
        Stage::new(StageKind::Build, FailurePolicy::Abort),
        Stage::new(StageKind::Create, FailurePolicy::Abort),
    ]
}

/// Stages of a deploy: bring the project up, rebuilding if needed
pub fn deploy_stages() -> Vec<Stage> {
    vec![Stage::new(StageKind::Up, FailurePolicy::Abort)]
}

/// A process invocation scoped to a project directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageCommand {
    pub program: String,
    pub args: Vec<String>,
    pub working_dir: PathBuf,
}

impl std::fmt::Display for StageCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.program, self.args.join(" "))
    }
}
