//! dockmon Library
//!
//! Core modules for the dockmon build/deploy orchestrator: the pipeline
//! runner, the event bus that streams its output, and the plumbing around
//! them.

pub mod app;
pub mod bootstrap;
pub mod deploy;
pub mod errors;
pub mod events;
pub mod filesys;
pub mod logs;
pub mod models;
pub mod pipeline;
pub mod server;
pub mod storage;
pub mod utils;
