//! Project models

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Compose definition file expected in every project directory
pub const COMPOSE_FILE_NAME: &str = "compose.yml";

/// A registered project
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    /// Unique project ID
    pub id: i64,

    /// Unique project name, used to filter event streams
    pub name: String,

    /// Directory holding the compose definition
    pub path: PathBuf,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repo_url: Option<String>,
}

impl Project {
    /// Path to the project's compose definition
    pub fn compose_file(&self) -> PathBuf {
        self.path.join(COMPOSE_FILE_NAME)
    }
}

/// A webhook that deploys a project when its token is posted
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Webhook {
    pub id: i64,
    pub project_id: i64,
    pub token: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}
