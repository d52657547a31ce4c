//! Deployment log models

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Kind of run recorded for a project
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Build,
    Deploy,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Build => "build",
            Action::Deploy => "deploy",
        }
    }
}

/// Status of a recorded run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Started,
    Success,
    Error,
}

impl RunStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, RunStatus::Started)
    }
}

/// Origin of a run request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TriggeredBy {
    /// Interactive user request
    User,

    /// Webhook with the given ID
    Webhook(i64),
}

impl fmt::Display for TriggeredBy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TriggeredBy::User => write!(f, "user"),
            TriggeredBy::Webhook(id) => write!(f, "webhook:{}", id),
        }
    }
}

impl FromStr for TriggeredBy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "user" {
            return Ok(TriggeredBy::User);
        }
        s.strip_prefix("webhook:")
            .and_then(|id| id.parse().ok())
            .map(TriggeredBy::Webhook)
            .ok_or_else(|| format!("Invalid trigger source: {}", s))
    }
}

impl Serialize for TriggeredBy {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for TriggeredBy {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Persisted record of one build or deploy run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeploymentLog {
    pub id: u64,
    pub project_id: i64,
    pub action: Action,
    pub status: RunStatus,
    pub triggered_by: TriggeredBy,

    /// Output accumulated over the whole run
    #[serde(default)]
    pub log_content: String,

    pub created_at: DateTime<Utc>,

    /// Set by the terminal write
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}
