//! Implementation of the `specrun plan` command.

use anyhow::{Context, Result};
use clap::Args;
use std::path::PathBuf;

use crate::cli::commands::{read_document, Workspace};
use crate::cli::output::{output, CommandOutput, TableFormatter};
use crate::domain::models::{GroupingMode, RunPhase, Task, WorkflowRun};
use crate::domain::ports::RunRepository;
use crate::services::WorkflowEngine;

#[derive(Args, Debug)]
pub struct PlanArgs {
    /// Requirements document (`-` reads stdin)
    pub document: PathBuf,

    /// Override the configured task size limit in points
    #[arg(long)]
    pub max_points: Option<u32>,

    /// Group consecutive requirements of a section into one task
    #[arg(long)]
    pub by_section: bool,

    /// Enter implementation right away
    #[arg(long)]
    pub start: bool,

    /// Print the plan without storing a run
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(Debug, serde::Serialize)]
pub struct PlanOutput {
    pub run_id: String,
    pub document_title: Option<String>,
    pub phase: RunPhase,
    pub requirements: usize,
    pub stored: bool,
    pub tasks: Vec<Task>,
}

impl PlanOutput {
    fn from_run(run: &WorkflowRun, stored: bool) -> Self {
        Self {
            run_id: run.id.to_string(),
            document_title: run.document_title.clone(),
            phase: run.phase,
            requirements: run.requirements.len(),
            stored,
            tasks: run.ordered_tasks().into_iter().cloned().collect(),
        }
    }
}

impl CommandOutput for PlanOutput {
    fn to_human(&self) -> String {
        let mut lines = vec![format!(
            "{} requirement(s) planned into {} task(s)",
            self.requirements,
            self.tasks.len()
        )];
        let refs: Vec<&Task> = self.tasks.iter().collect();
        lines.push(TableFormatter::new().format_tasks(&refs));
        if self.stored {
            lines.push(format!("Run {} saved ({} phase)", self.run_id, self.phase));
        } else {
            lines.push("Dry run: nothing saved".to_string());
        }
        lines.join("\n")
    }
}

pub async fn execute(args: PlanArgs, json_mode: bool) -> Result<()> {
    let mut workspace = Workspace::load()?;
    if let Some(points) = args.max_points {
        anyhow::ensure!(points > 0, "--max-points must be at least 1");
        workspace.config.planning.max_task_points = points;
        workspace.config.planning.default_points =
            workspace.config.planning.default_points.min(points);
    }
    if args.by_section {
        workspace.config.planning.grouping = GroupingMode::BySection;
    }
    let engine = WorkflowEngine::new(workspace.config.planning.clone());

    let document = read_document(&args.document).await?;
    let mut run = engine.analyze(&document).context("Analysis failed")?;
    engine.plan(&mut run).context("Planning failed")?;
    if args.start {
        engine
            .start_implementation(&mut run)
            .context("Failed to enter implementation")?;
    }

    if !args.dry_run {
        workspace
            .repo
            .save(&run)
            .await
            .context("Failed to save run")?;
    }

    output(&PlanOutput::from_run(&run, !args.dry_run), json_mode);
    Ok(())
}
