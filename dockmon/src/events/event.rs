//! Event types and wire frames

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::errors::MonitorError;
use crate::models::deployment::Action;
use crate::utils::now_millis;

/// Project name reported by events that are not tied to one project
pub const ALL_PROJECTS: &str = "*";

/// Event names carried on the `event:` line of a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    Connection,
    BuildLog,
    BuildCompleted,
    BuildError,
    DeployLog,
    DeployCompleted,
    DeployError,
    Ping,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::Connection => "connection",
            EventType::BuildLog => "build_log",
            EventType::BuildCompleted => "build_completed",
            EventType::BuildError => "build_error",
            EventType::DeployLog => "deploy_log",
            EventType::DeployCompleted => "deploy_completed",
            EventType::DeployError => "deploy_error",
            EventType::Ping => "ping",
        }
    }

    /// Output chunk event for the given action
    pub fn log(action: Action) -> Self {
        match action {
            Action::Build => EventType::BuildLog,
            Action::Deploy => EventType::DeployLog,
        }
    }

    /// Success event for the given action
    pub fn completed(action: Action) -> Self {
        match action {
            Action::Build => EventType::BuildCompleted,
            Action::Deploy => EventType::DeployCompleted,
        }
    }

    /// Failure event for the given action
    pub fn error(action: Action) -> Self {
        match action {
            Action::Build => EventType::BuildError,
            Action::Deploy => EventType::DeployError,
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// JSON payload of an event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventPayload {
    /// Project name the event belongs to, used for subscriber filtering
    pub project: String,

    /// Epoch milliseconds
    pub timestamp: u64,

    /// Output fragment, not necessarily newline-terminated
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

impl EventPayload {
    /// Payload for `project` stamped with the current time
    pub fn new(project: impl Into<String>) -> Self {
        Self {
            project: project.into(),
            timestamp: now_millis(),
            output: None,
            message: None,
            status: None,
        }
    }

    pub fn with_output(mut self, output: impl Into<String>) -> Self {
        self.output = Some(output.into());
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.status = Some(status.into());
        self
    }
}

/// One encoded event-stream frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub event: EventType,

    /// Serialized JSON payload
    pub data: String,
}

impl Frame {
    pub fn encode(event: EventType, payload: &EventPayload) -> Result<Self, MonitorError> {
        Ok(Self {
            event,
            data: serde_json::to_string(payload)?,
        })
    }

    /// Decode the JSON payload back
    pub fn payload(&self) -> Result<EventPayload, MonitorError> {
        Ok(serde_json::from_str(&self.data)?)
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "event: {}\ndata: {}\n\n", self.event, self.data)
    }
}
