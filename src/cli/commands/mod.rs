//! CLI command implementations.

pub mod extract;
pub mod init;
pub mod plan;
pub mod report;
pub mod run;

use anyhow::{Context, Result};
use std::path::Path;
use tokio::fs;

use crate::adapters::json::JsonRunRepository;
use crate::domain::models::Config;
use crate::infrastructure::config::ConfigLoader;
use crate::services::WorkflowEngine;

/// Loaded configuration plus the adapters and services commands share.
pub struct Workspace {
    pub config: Config,
    pub repo: JsonRunRepository,
    pub engine: WorkflowEngine,
}

impl Workspace {
    pub fn load() -> Result<Self> {
        let config = ConfigLoader::load().context("Failed to load configuration")?;
        Ok(Self::from_config(config))
    }

    pub fn from_config(config: Config) -> Self {
        let repo = JsonRunRepository::new(&config.storage.root);
        let engine = WorkflowEngine::new(config.planning.clone());
        Self {
            config,
            repo,
            engine,
        }
    }
}

/// Read a requirements document, `-` meaning stdin.
pub async fn read_document(path: &Path) -> Result<String> {
    if path == Path::new("-") {
        use tokio::io::AsyncReadExt;
        let mut buf = String::new();
        tokio::io::stdin()
            .read_to_string(&mut buf)
            .await
            .context("Failed to read document from stdin")?;
        return Ok(buf);
    }
    fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read document {}", path.display()))
}
