//! Run CLI commands: drive a stored run through implementation.
//!
//! Every mutating command loads the run, applies one engine transition and
//! saves it back. The run defaults to the most recent active one.

use anyhow::{Context, Result};
use clap::{Args, Subcommand};

use crate::cli::commands::Workspace;
use crate::cli::id_resolver::resolve_run_or_latest;
use crate::cli::output::{output, CommandOutput, TableFormatter};
use crate::domain::models::{RequirementId, RunPhase, Task, TaskId, Transition, WorkflowRun};
use crate::domain::ports::{RunRepository, RunSummary};
use crate::services::{Outcome, TaskProposal, WorkflowEngine};

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Run ID or unique prefix (defaults to the latest active run)
    #[arg(long, global = true)]
    pub run: Option<String>,

    #[command(subcommand)]
    pub command: RunCommands,
}

#[derive(Subcommand, Debug)]
pub enum RunCommands {
    /// Enter implementation once the plan is accepted
    Begin,
    /// List tasks that can be started now
    Eligible,
    /// Start the next eligible task in execution order
    Next,
    /// Start a specific task
    Start {
        /// Task ID (e.g. TASK-003)
        task: String,
    },
    /// Report the active task as completed
    Complete {
        /// Task ID
        task: String,
    },
    /// Report the active task as failed
    Fail {
        /// Task ID
        task: String,
        /// Why it failed
        #[arg(short, long)]
        reason: Option<String>,
    },
    /// Report the active task as blocked by something outside the run
    Block {
        /// Task ID
        task: String,
        /// What it is waiting on
        #[arg(short, long)]
        reason: Option<String>,
    },
    /// Return a failed or externally blocked task to pending
    Retry {
        /// Task ID
        task: String,
    },
    /// Add a task discovered during planning or implementation
    Propose {
        /// Task title
        title: String,
        /// Task description
        #[arg(short, long, default_value = "")]
        description: String,
        /// Existing tasks it depends on (comma-separated)
        #[arg(short = 'D', long, value_delimiter = ',')]
        after: Vec<String>,
        /// Requirements it implements (comma-separated)
        #[arg(long, value_delimiter = ',')]
        requirements: Vec<String>,
        /// Size in points
        #[arg(short, long)]
        estimate: Option<u32>,
        /// Touches external input or credentials
        #[arg(long)]
        external_input: bool,
    },
    /// Approve scope creep so it can be executed
    Approve {
        /// Task ID
        task: String,
    },
    /// Reject scope creep
    Reject {
        /// Task ID
        task: String,
    },
    /// Close implementation once every task is terminal
    Finish,
    /// Stop the run and force it to summary
    Abandon {
        /// Why the run is abandoned
        #[arg(short, long, default_value = "abandoned by user")]
        reason: String,
    },
    /// Show run details
    Show,
    /// List active runs
    List,
    /// Move a finished run to the archive
    Archive,
}

#[derive(Debug, serde::Serialize)]
pub struct RunActionOutput {
    pub run_id: String,
    pub phase: RunPhase,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task: Option<Task>,
    pub newly_eligible: Vec<TaskId>,
}

impl RunActionOutput {
    fn new(run: &WorkflowRun, message: impl Into<String>) -> Self {
        Self {
            run_id: run.id.to_string(),
            phase: run.phase,
            message: message.into(),
            task: None,
            newly_eligible: Vec::new(),
        }
    }

    fn with_task(mut self, task: Option<&Task>) -> Self {
        self.task = task.cloned();
        self
    }

    fn with_transition(mut self, transition: Transition) -> Self {
        self.newly_eligible = transition.newly_eligible;
        self
    }
}

impl CommandOutput for RunActionOutput {
    fn to_human(&self) -> String {
        let mut lines = vec![self.message.clone()];
        if let Some(task) = &self.task {
            lines.push(format!("  {}: {} [{}]", task.id, task.title, task.status));
            if !task.description.is_empty() {
                lines.push(format!("  {}", task.description.replace('\n', "\n  ")));
            }
        }
        if !self.newly_eligible.is_empty() {
            let ids: Vec<&str> = self.newly_eligible.iter().map(TaskId::as_str).collect();
            lines.push(format!("Now eligible: {}", ids.join(", ")));
        }
        lines.join("\n")
    }
}

#[derive(Debug, serde::Serialize)]
pub struct RunShowOutput {
    pub run: WorkflowRun,
}

impl CommandOutput for RunShowOutput {
    fn to_human(&self) -> String {
        let run = &self.run;
        let mut lines = vec![
            format!(
                "Run {}{}",
                run.id,
                run.document_title
                    .as_deref()
                    .map(|t| format!(" - {t}"))
                    .unwrap_or_default()
            ),
            format!("Phase:        {}", run.phase),
            format!("Requirements: {}", run.requirements.len()),
            format!("Started:      {}", run.started_at.format("%Y-%m-%d %H:%M:%S")),
        ];
        if let Some(current) = &run.current_task_id {
            lines.push(format!("Active task:  {current}"));
        }
        if let Some(reason) = &run.abandoned {
            lines.push(format!("Abandoned:    {reason}"));
        }
        lines.push(String::new());
        lines.push(TableFormatter::new().format_tasks(&run.ordered_tasks()));
        lines.join("\n")
    }
}

#[derive(Debug, serde::Serialize)]
pub struct RunListOutput {
    pub runs: Vec<RunSummary>,
    pub total: usize,
}

impl CommandOutput for RunListOutput {
    fn to_human(&self) -> String {
        if self.runs.is_empty() {
            return "No active runs.".to_string();
        }
        format!(
            "Found {} run(s):\n{}",
            self.total,
            TableFormatter::new().format_runs(&self.runs)
        )
    }
}

#[derive(Debug, serde::Serialize)]
pub struct EligibleOutput {
    pub run_id: String,
    pub tasks: Vec<Task>,
}

impl CommandOutput for EligibleOutput {
    fn to_human(&self) -> String {
        if self.tasks.is_empty() {
            return "No eligible tasks.".to_string();
        }
        let refs: Vec<&Task> = self.tasks.iter().collect();
        TableFormatter::new().format_tasks(&refs)
    }
}

pub async fn execute(args: RunArgs, json_mode: bool) -> Result<()> {
    let workspace = Workspace::load()?;
    let repo = &workspace.repo;
    let selector = args.run.as_deref();

    match args.command {
        RunCommands::List => list_runs(repo, json_mode).await,
        RunCommands::Show => {
            let run = load_run(repo, selector).await?;
            output(&RunShowOutput { run }, json_mode);
            Ok(())
        }
        RunCommands::Eligible => {
            let run = load_run(repo, selector).await?;
            let out = EligibleOutput {
                run_id: run.id.to_string(),
                tasks: workspace
                    .engine
                    .eligible_tasks(&run)
                    .into_iter()
                    .cloned()
                    .collect(),
            };
            output(&out, json_mode);
            Ok(())
        }
        RunCommands::Archive => {
            let run = load_run(repo, selector).await?;
            repo.archive(run.id)
                .await
                .with_context(|| format!("Failed to archive run {}", run.id))?;
            output(&RunActionOutput::new(&run, format!("Run {} archived", run.id)), json_mode);
            Ok(())
        }
        RunCommands::Begin => {
            apply(&workspace, selector, json_mode, |engine, run| {
                let transition = engine.start_implementation(run)?;
                Ok(RunActionOutput::new(run, "Implementation started").with_transition(transition))
            })
            .await
        }
        RunCommands::Next => {
            apply(&workspace, selector, json_mode, |engine, run| {
                let started = engine.next_eligible_task(run)?.cloned();
                Ok(match started {
                    Some(task) => {
                        RunActionOutput::new(run, "Started next task").with_task(Some(&task))
                    }
                    None => RunActionOutput::new(run, "No eligible task"),
                })
            })
            .await
        }
        RunCommands::Start { task } => {
            apply(&workspace, selector, json_mode, move |engine, run| {
                let task_id = TaskId::new(task);
                engine.start_task(run, &task_id)?;
                Ok(RunActionOutput::new(run, "Task started").with_task(run.task(&task_id)))
            })
            .await
        }
        RunCommands::Complete { task } => {
            apply(&workspace, selector, json_mode, move |engine, run| {
                report(engine, run, task, Outcome::Completed, None)
            })
            .await
        }
        RunCommands::Fail { task, reason } => {
            apply(&workspace, selector, json_mode, move |engine, run| {
                report(engine, run, task, Outcome::Failed, reason.as_deref())
            })
            .await
        }
        RunCommands::Block { task, reason } => {
            apply(&workspace, selector, json_mode, move |engine, run| {
                report(engine, run, task, Outcome::Blocked, reason.as_deref())
            })
            .await
        }
        RunCommands::Retry { task } => {
            apply(&workspace, selector, json_mode, move |engine, run| {
                let task_id = TaskId::new(task);
                let transition = engine.retry_task(run, &task_id)?;
                Ok(RunActionOutput::new(run, "Task returned to pending")
                    .with_task(run.task(&task_id))
                    .with_transition(transition))
            })
            .await
        }
        RunCommands::Propose {
            title,
            description,
            after,
            requirements,
            estimate,
            external_input,
        } => {
            let proposal = TaskProposal {
                title,
                description,
                depends_on: after.into_iter().map(TaskId::new).collect(),
                requirement_ids: requirements.into_iter().map(RequirementId::new).collect(),
                estimate,
                handles_external_input: external_input,
            };
            apply(&workspace, selector, json_mode, move |engine, run| {
                let ids = engine.propose_task(run, proposal)?;
                let listed: Vec<&str> = ids.iter().map(TaskId::as_str).collect();
                let message = if run.phase == RunPhase::Implementation {
                    format!("Scope creep {} awaiting approval", listed.join(", "))
                } else {
                    format!("Added {} to the plan", listed.join(", "))
                };
                Ok(RunActionOutput::new(run, message)
                    .with_task(ids.first().and_then(|id| run.task(id))))
            })
            .await
        }
        RunCommands::Approve { task } => {
            apply(&workspace, selector, json_mode, move |engine, run| {
                let task_id = TaskId::new(task);
                let message = if engine.approve_scope_creep(run, &task_id)? {
                    "Scope creep approved"
                } else {
                    "Nothing to approve"
                };
                Ok(RunActionOutput::new(run, message).with_task(run.task(&task_id)))
            })
            .await
        }
        RunCommands::Reject { task } => {
            apply(&workspace, selector, json_mode, move |engine, run| {
                let task_id = TaskId::new(task);
                engine.reject_scope_creep(run, &task_id)?;
                Ok(RunActionOutput::new(run, "Scope creep rejected").with_task(run.task(&task_id)))
            })
            .await
        }
        RunCommands::Finish => {
            apply(&workspace, selector, json_mode, |engine, run| {
                engine.finish(run)?;
                Ok(RunActionOutput::new(run, "Run finished; report is ready"))
            })
            .await
        }
        RunCommands::Abandon { reason } => {
            apply(&workspace, selector, json_mode, move |engine, run| {
                engine.abandon(run, &reason)?;
                Ok(RunActionOutput::new(run, format!("Run abandoned: {reason}")))
            })
            .await
        }
    }
}

async fn load_run(repo: &dyn RunRepository, selector: Option<&str>) -> Result<WorkflowRun> {
    let id = resolve_run_or_latest(repo, selector).await?;
    repo.get(id)
        .await?
        .with_context(|| format!("Run {id} not found"))
}

/// Load the selected run, apply one transition and save it back.
async fn apply<F>(
    workspace: &Workspace,
    selector: Option<&str>,
    json_mode: bool,
    transition: F,
) -> Result<()>
where
    F: FnOnce(&WorkflowEngine, &mut WorkflowRun) -> Result<RunActionOutput>,
{
    let mut run = load_run(&workspace.repo, selector).await?;
    let out = transition(&workspace.engine, &mut run)?;
    workspace.repo.save(&run).await.context("Failed to save run")?;
    output(&out, json_mode);
    Ok(())
}

async fn list_runs(repo: &dyn RunRepository, json_mode: bool) -> Result<()> {
    let runs = repo.list().await.context("Failed to list runs")?;
    let out = RunListOutput {
        total: runs.len(),
        runs,
    };
    output(&out, json_mode);
    Ok(())
}

fn report(
    engine: &WorkflowEngine,
    run: &mut WorkflowRun,
    task: String,
    outcome: Outcome,
    detail: Option<&str>,
) -> Result<RunActionOutput> {
    let task_id = TaskId::new(task);
    let transition = engine.report_outcome(run, &task_id, outcome, detail)?;
    Ok(
        RunActionOutput::new(run, format!("Task {}", outcome.as_str()))
            .with_task(run.task(&task_id))
            .with_transition(transition),
    )
}
