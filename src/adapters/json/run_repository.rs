//! JSON file implementation of the RunRepository.
//!
//! Active runs live at `<root>/runs/<uuid>.json`; archived runs are moved to
//! `<root>/archive/<uuid>.json`. Writes go through a temporary file and a
//! rename so a crash never leaves a truncated run behind.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tracing::debug;
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{RunPhase, WorkflowRun};
use crate::domain::ports::{RunRepository, RunSummary};

#[derive(Debug, Clone)]
pub struct JsonRunRepository {
    root: PathBuf,
}

impl JsonRunRepository {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn runs_dir(&self) -> PathBuf {
        self.root.join("runs")
    }

    fn archive_dir(&self) -> PathBuf {
        self.root.join("archive")
    }

    fn run_path(&self, id: Uuid) -> PathBuf {
        self.runs_dir().join(format!("{id}.json"))
    }

    fn archive_path(&self, id: Uuid) -> PathBuf {
        self.archive_dir().join(format!("{id}.json"))
    }
}

async fn read_run(path: &Path) -> DomainResult<Option<WorkflowRun>> {
    match fs::read(path).await {
        Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

#[async_trait]
impl RunRepository for JsonRunRepository {
    async fn save(&self, run: &WorkflowRun) -> DomainResult<()> {
        fs::create_dir_all(self.runs_dir()).await?;
        let path = self.run_path(run.id);
        let tmp = path.with_extension("json.tmp");

        let json = serde_json::to_vec_pretty(run)?;
        fs::write(&tmp, json).await?;
        fs::rename(&tmp, &path).await?;

        debug!(run_id = %run.id, path = %path.display(), "run saved");
        Ok(())
    }

    async fn get(&self, id: Uuid) -> DomainResult<Option<WorkflowRun>> {
        read_run(&self.run_path(id)).await
    }

    async fn get_archived(&self, id: Uuid) -> DomainResult<Option<WorkflowRun>> {
        read_run(&self.archive_path(id)).await
    }

    async fn list(&self) -> DomainResult<Vec<RunSummary>> {
        let mut entries = match fs::read_dir(self.runs_dir()).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut summaries = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            if let Some(run) = read_run(&path).await? {
                summaries.push(RunSummary::from(&run));
            }
        }

        summaries.sort_by(|a, b| a.started_at.cmp(&b.started_at).then(a.id.cmp(&b.id)));
        Ok(summaries)
    }

    async fn archive(&self, id: Uuid) -> DomainResult<()> {
        let run = self.get(id).await?.ok_or(DomainError::RunNotFound(id))?;
        if run.phase != RunPhase::Summary {
            return Err(DomainError::WrongPhase {
                phase: run.phase,
                operation: "archive",
            });
        }

        fs::create_dir_all(self.archive_dir()).await?;
        fs::rename(self.run_path(id), self.archive_path(id)).await?;
        debug!(run_id = %id, "run archived");
        Ok(())
    }
}
