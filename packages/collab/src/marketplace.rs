//! Marketplace: publishing, listing and cloning projects.
//!
//! Projects are held in memory. Ownership is checked against the session
//! user taken from the `ssid` cookie; a mismatch aborts the operation as an
//! ordinary application error.

use chrono::{DateTime, Utc};
use reactype_editor::AppState;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::info;
use uuid::Uuid;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum MarketplaceError {
    #[error("userId of project does not match the session user")]
    OwnershipMismatch,

    #[error("No session user")]
    Unauthenticated,

    #[error("Project not found: {0}")]
    NotFound(String),
}

/// A stored project
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectDocument {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub name: String,
    pub project: AppState,
    pub user_id: String,
    pub username: String,
    #[serde(default)]
    pub comments: Vec<String>,
    pub published: bool,
    pub created_at: DateTime<Utc>,
    /// "Forked from <owner>" on clones
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub forked: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishRequest {
    /// Existing project to update; a new one is created when absent
    #[serde(rename = "_id", default)]
    pub id: Option<Uuid>,
    pub name: String,
    pub project: AppState,
    pub user_id: String,
    pub username: String,
    #[serde(default)]
    pub comments: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnpublishRequest {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub user_id: String,
}

#[derive(Clone, Default)]
pub struct Marketplace {
    projects: Arc<RwLock<HashMap<Uuid, ProjectDocument>>>,
}

impl Marketplace {
    pub fn new() -> Self {
        Self::default()
    }

    /// All published projects, oldest first
    pub async fn get_published_projects(&self) -> Vec<ProjectDocument> {
        let projects = self.projects.read().await;
        let mut published: Vec<_> = projects.values().filter(|p| p.published).cloned().collect();
        published.sort_by_key(|p| p.created_at);
        published
    }

    /// Create or update a published project
    pub async fn publish_project(
        &self,
        request: PublishRequest,
        session_user: Option<&str>,
    ) -> Result<ProjectDocument, MarketplaceError> {
        if session_user != Some(request.user_id.as_str()) {
            return Err(MarketplaceError::OwnershipMismatch);
        }

        let mut projects = self.projects.write().await;
        let id = match request.id {
            Some(id) => {
                if let Some(existing) = projects.get(&id) {
                    if existing.user_id != request.user_id {
                        return Err(MarketplaceError::OwnershipMismatch);
                    }
                }
                id
            }
            None => Uuid::new_v4(),
        };

        let document = ProjectDocument {
            id,
            name: request.name,
            project: request.project,
            user_id: request.user_id,
            username: request.username,
            comments: request.comments,
            published: true,
            created_at: Utc::now(),
            forked: projects.get(&id).and_then(|p| p.forked.clone()),
        };
        projects.insert(id, document.clone());
        info!(project = %id, "project published");

        Ok(document)
    }

    pub async fn unpublish_project(
        &self,
        id: Uuid,
        user_id: &str,
        session_user: Option<&str>,
    ) -> Result<ProjectDocument, MarketplaceError> {
        if session_user != Some(user_id) {
            return Err(MarketplaceError::OwnershipMismatch);
        }

        let mut projects = self.projects.write().await;
        let project = projects
            .get_mut(&id)
            .ok_or_else(|| MarketplaceError::NotFound(id.to_string()))?;
        if project.user_id != user_id {
            return Err(MarketplaceError::OwnershipMismatch);
        }

        project.published = false;
        info!(project = %id, "project unpublished");
        Ok(project.clone())
    }

    /// Copy a project into the session user's account
    pub async fn clone_project(
        &self,
        id: Uuid,
        session_user: Option<&str>,
        username: &str,
    ) -> Result<ProjectDocument, MarketplaceError> {
        let owner = session_user.ok_or(MarketplaceError::Unauthenticated)?;

        let mut projects = self.projects.write().await;
        let source = projects
            .get(&id)
            .ok_or_else(|| MarketplaceError::NotFound(id.to_string()))?;

        let mut project = source.project.clone();
        project.forked = true;

        let clone = ProjectDocument {
            id: Uuid::new_v4(),
            name: source.name.clone(),
            project,
            user_id: owner.to_string(),
            username: username.to_string(),
            comments: source.comments.clone(),
            published: false,
            created_at: Utc::now(),
            forked: Some(format!("Forked from {}", source.username)),
        };
        projects.insert(clone.id, clone.clone());
        info!(source = %id, project = %clone.id, "project cloned");

        Ok(clone)
    }
}
