//! Implementation of the `specrun report` command.

use anyhow::{Context, Result};
use clap::{Args, ValueEnum};
use std::path::PathBuf;
use tokio::fs;

use crate::cli::commands::Workspace;
use crate::cli::id_resolver::resolve_run_or_latest;
use crate::cli::output::{output, CommandOutput};
use crate::domain::models::RunReport;
use crate::domain::ports::RunRepository;
use crate::services::{render_markdown, ReportAggregator};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum ReportFormat {
    #[default]
    Markdown,
    Json,
}

#[derive(Args, Debug)]
pub struct ReportArgs {
    /// Run ID or unique prefix (defaults to the latest active run)
    pub run: Option<String>,

    /// Report format
    #[arg(short, long, value_enum, default_value_t = ReportFormat::Markdown)]
    pub format: ReportFormat,

    /// Write the report to a file instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

#[derive(Debug, serde::Serialize)]
pub struct ReportOutput {
    #[serde(flatten)]
    pub report: RunReport,
    #[serde(skip)]
    format: ReportFormat,
}

impl CommandOutput for ReportOutput {
    fn to_human(&self) -> String {
        match self.format {
            ReportFormat::Markdown => render_markdown(&self.report),
            ReportFormat::Json => {
                serde_json::to_string_pretty(&self.report).unwrap_or_default()
            }
        }
    }
}

#[derive(Debug, serde::Serialize)]
pub struct ReportWrittenOutput {
    pub run_id: String,
    pub path: PathBuf,
}

impl CommandOutput for ReportWrittenOutput {
    fn to_human(&self) -> String {
        format!("Report for run {} written to {}", self.run_id, self.path.display())
    }
}

pub async fn execute(args: ReportArgs, json_mode: bool) -> Result<()> {
    let workspace = Workspace::load()?;
    let repo = &workspace.repo;

    let id = resolve_run_or_latest(repo, args.run.as_deref()).await?;
    let run = match repo.get(id).await? {
        Some(run) => run,
        None => repo
            .get_archived(id)
            .await?
            .with_context(|| format!("Run {id} not found"))?,
    };

    let report = ReportAggregator::new()
        .aggregate(&run)
        .context("Failed to build report")?;
    let out = ReportOutput {
        report,
        format: args.format,
    };

    match args.output {
        Some(path) => {
            fs::write(&path, out.to_human())
                .await
                .with_context(|| format!("Failed to write {}", path.display()))?;
            let written = ReportWrittenOutput {
                run_id: id.to_string(),
                path,
            };
            output(&written, json_mode);
        }
        None => output(&out, json_mode),
    }
    Ok(())
}
