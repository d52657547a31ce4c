//! Project lookup

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;

use crate::errors::MonitorError;
use crate::models::project::{Project, Webhook};

/// Read access to registered projects and webhooks
#[async_trait]
pub trait ProjectStore: Send + Sync {
    /// Project with the given ID
    async fn get_project(&self, id: i64) -> Result<Option<Project>, MonitorError>;

    /// Webhook owning `token`
    async fn find_webhook(&self, token: &str) -> Result<Option<Webhook>, MonitorError>;

    /// Every project, ordered by name
    async fn list_projects(&self) -> Result<Vec<Project>, MonitorError>;

    /// Webhooks of one project, or of all projects, newest first
    async fn list_webhooks(&self, project_id: Option<i64>) -> Result<Vec<Webhook>, MonitorError>;
}

/// Projects and webhooks declared in the settings file
#[derive(Debug, Clone, Default)]
pub struct StaticProjectStore {
    projects: HashMap<i64, Project>,
    webhooks: HashMap<String, Webhook>,
}

impl StaticProjectStore {
    /// Index `projects` and `webhooks`, rejecting duplicate IDs, names or tokens
    pub fn new(projects: Vec<Project>, webhooks: Vec<Webhook>) -> Result<Self, MonitorError> {
        let mut names = HashSet::new();
        let mut by_id = HashMap::new();
        for project in projects {
            if !names.insert(project.name.clone()) {
                return Err(MonitorError::ConfigError(format!(
                    "Duplicate project name: {}",
                    project.name
                )));
            }
            if by_id.contains_key(&project.id) {
                return Err(MonitorError::ConfigError(format!(
                    "Duplicate project id: {}",
                    project.id
                )));
            }
            by_id.insert(project.id, project);
        }

        let mut by_token = HashMap::new();
        for webhook in webhooks {
            if !by_id.contains_key(&webhook.project_id) {
                return Err(MonitorError::ConfigError(format!(
                    "Webhook {} references unknown project {}",
                    webhook.id, webhook.project_id
                )));
            }
            if by_token.contains_key(&webhook.token) {
                return Err(MonitorError::ConfigError(format!(
                    "Duplicate webhook token for webhook {}",
                    webhook.id
                )));
            }
            by_token.insert(webhook.token.clone(), webhook);
        }

        Ok(Self {
            projects: by_id,
            webhooks: by_token,
        })
    }

    pub fn len(&self) -> usize {
        self.projects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.projects.is_empty()
    }
}

#[async_trait]
impl ProjectStore for StaticProjectStore {
    async fn get_project(&self, id: i64) -> Result<Option<Project>, MonitorError> {
        Ok(self.projects.get(&id).cloned())
    }

    async fn find_webhook(&self, token: &str) -> Result<Option<Webhook>, MonitorError> {
        Ok(self.webhooks.get(token).cloned())
    }

    async fn list_projects(&self) -> Result<Vec<Project>, MonitorError> {
        let mut projects: Vec<Project> = self.projects.values().cloned().collect();
        projects.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(projects)
    }

    async fn list_webhooks(&self, project_id: Option<i64>) -> Result<Vec<Webhook>, MonitorError> {
        let mut webhooks: Vec<Webhook> = self
            .webhooks
            .values()
            .filter(|webhook| project_id.is_none_or(|id| webhook.project_id == id))
            .cloned()
            .collect();
        // Declared webhooks carry no creation time; higher IDs are newer
        webhooks.sort_by(|a, b| b.id.cmp(&a.id));
        Ok(webhooks)
    }
}
