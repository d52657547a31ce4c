//! Persistent state: settings, projects and deployment logs

pub mod layout;
pub mod projects;
pub mod recorder;
pub mod settings;
