//! Storage layout configuration

use std::path::PathBuf;

use crate::filesys::dir::Dir;

/// On-disk layout of the service's data directory
#[derive(Debug, Clone)]
pub struct StorageLayout {
    /// Base directory for all storage
    pub base_dir: PathBuf,
}

impl StorageLayout {
    /// Create a new storage layout
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    /// Directory holding one JSON record per deployment run
    pub fn deployment_logs_dir(&self) -> Dir {
        Dir::new(self.base_dir.join("deployment_logs"))
    }
}

impl Default for StorageLayout {
    fn default() -> Self {
        Self::new("./data")
    }
}
