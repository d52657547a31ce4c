//! Finite state machine sequencing the stages of one run

use crate::pipeline::process::ProcessExit;
use crate::pipeline::stage::{FailurePolicy, Stage};

/// Message reported for a run stopped through its cancellation token
pub const CANCELLED_MESSAGE: &str = "Run cancelled";

/// Sequencer state
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SequencerState {
    /// No stage started yet
    Pending,

    /// Stage at this index is running
    Running(usize),

    /// Every stage finished without a fatal failure
    Succeeded,

    /// A fatal stage failed, or the run was cancelled
    Failed(String),
}

impl SequencerState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, SequencerState::Succeeded | SequencerState::Failed(_))
    }
}

/// Sequencer event
#[derive(Debug, Clone)]
pub enum SequencerEvent {
    /// Begin with the first stage
    Start,

    /// The running stage's process reported its exit
    StageExited(ProcessExit),

    /// Stop before the next stage
    Cancel,
}

/// Drives a run through its stages, one exit message at a time
#[derive(Debug, Clone)]
pub struct StageSequencer {
    stages: Vec<Stage>,
    state: SequencerState,
}

impl StageSequencer {
    pub fn new(stages: Vec<Stage>) -> Self {
        Self {
            stages,
            state: SequencerState::Pending,
        }
    }

    /// Get current state
    pub fn state(&self) -> &SequencerState {
        &self.state
    }

    /// Stage at `index`
    pub fn stage(&self, index: usize) -> Option<&Stage> {
        self.stages.get(index)
    }

    /// Stage currently running, if any
    pub fn current_stage(&self) -> Option<&Stage> {
        match self.state {
            SequencerState::Running(index) => self.stages.get(index),
            _ => None,
        }
    }

    /// Process an event and transition state
    pub fn process(&mut self, event: SequencerEvent) -> Result<&SequencerState, String> {
        let new_state = match (&self.state, &event) {
            (SequencerState::Pending, SequencerEvent::Start) => self.running_or_done(0),

            (SequencerState::Running(index), SequencerEvent::StageExited(exit)) => {
                let index = *index;
                let stage = &self.stages[index];
                if exit.success() || stage.policy == FailurePolicy::Warn {
                    self.running_or_done(index + 1)
                } else {
                    SequencerState::Failed(stage.kind.failure_message(exit))
                }
            }

            (SequencerState::Pending | SequencerState::Running(_), SequencerEvent::Cancel) => {
                SequencerState::Failed(CANCELLED_MESSAGE.to_string())
            }

            (state, event) => {
                return Err(format!("Invalid transition: {:?} -> {:?}", state, event));
            }
        };

        self.state = new_state;
        Ok(&self.state)
    }

    fn running_or_done(&self, index: usize) -> SequencerState {
        if index < self.stages.len() {
            SequencerState::Running(index)
        } else {
            SequencerState::Succeeded
        }
    }
}
