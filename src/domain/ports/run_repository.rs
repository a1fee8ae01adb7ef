use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::models::{RunPhase, WorkflowRun};

/// Lightweight listing entry for stored runs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub id: Uuid,
    pub document_title: Option<String>,
    pub phase: RunPhase,
    pub task_count: usize,
    pub started_at: DateTime<Utc>,
}

impl From<&WorkflowRun> for RunSummary {
    fn from(run: &WorkflowRun) -> Self {
        Self {
            id: run.id,
            document_title: run.document_title.clone(),
            phase: run.phase,
            task_count: run.tasks.len(),
            started_at: run.started_at,
        }
    }
}

/// Repository port for workflow run persistence
#[async_trait]
pub trait RunRepository: Send + Sync {
    /// Insert or replace a run
    async fn save(&self, run: &WorkflowRun) -> DomainResult<()>;

    /// Get an active run by ID
    async fn get(&self, id: Uuid) -> DomainResult<Option<WorkflowRun>>;

    /// Get an archived run by ID
    async fn get_archived(&self, id: Uuid) -> DomainResult<Option<WorkflowRun>>;

    /// List active runs, oldest first
    async fn list(&self) -> DomainResult<Vec<RunSummary>>;

    /// Move a finished run out of the active set
    async fn archive(&self, id: Uuid) -> DomainResult<()>;
}
