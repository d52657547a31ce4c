//! Error types for dockmon

use thiserror::Error;

/// Main error type for dockmon
///
/// Pipeline failures are not errors: a failed stage is reported through
/// [`crate::pipeline::RunResult`]. This type covers the plumbing around runs.
#[derive(Error, Debug)]
pub enum MonitorError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Store error: {0}")]
    StoreError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Server error: {0}")]
    ServerError(String),

    #[error("Shutdown error: {0}")]
    ShutdownError(String),

    #[error("Store unavailable after {attempts} attempts: {last_error}")]
    BootstrapExhausted { attempts: u32, last_error: String },
}
