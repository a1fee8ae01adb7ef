//! Workflow state machine.
//!
//! Drives one `WorkflowRun` through analysis, planning, implementation and
//! summary. Every operation takes the run explicitly and either applies a
//! whole transition or rejects it with a specific error, leaving the run
//! untouched. The engine holds no run state of its own, so independent runs
//! can be driven in parallel from separate engines or threads.

use std::collections::HashSet;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{
    BlockReason, PlanningConfig, RequirementId, RunEventKind, RunPhase, ScopeApproval, Task,
    TaskId, TaskStatus, Transition, WorkflowRun,
};
use crate::services::dependency_resolver::DependencyResolver;
use crate::services::requirement_extractor::RequirementExtractor;
use crate::services::task_graph_builder::TaskGraphBuilder;

/// Reason recorded on the active task when a run is abandoned.
pub const CANCELLED: &str = "cancelled";

/// Result the external executor reports for the active task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Completed,
    Failed,
    /// Stopped by something outside the run; released by an explicit retry.
    Blocked,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Blocked => "blocked",
        }
    }

    fn status(self) -> TaskStatus {
        match self {
            Self::Completed => TaskStatus::Completed,
            Self::Failed => TaskStatus::Failed,
            Self::Blocked => TaskStatus::Blocked,
        }
    }
}

/// New work discovered while a run is underway.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskProposal {
    pub title: String,
    #[serde(default)]
    pub description: String,
    /// Existing tasks the new work depends on
    #[serde(default)]
    pub depends_on: Vec<TaskId>,
    /// Existing requirements the new work implements
    #[serde(default)]
    pub requirement_ids: Vec<RequirementId>,
    #[serde(default)]
    pub estimate: Option<u32>,
    #[serde(default)]
    pub handles_external_input: bool,
}

impl TaskProposal {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }

    pub fn depending_on(mut self, id: TaskId) -> Self {
        self.depends_on.push(id);
        self
    }
}

/// The run-level state machine.
pub struct WorkflowEngine {
    extractor: RequirementExtractor,
    builder: TaskGraphBuilder,
    resolver: DependencyResolver,
}

impl WorkflowEngine {
    pub fn new(policy: PlanningConfig) -> Self {
        Self::with_builder(TaskGraphBuilder::new(policy))
    }

    pub fn with_builder(builder: TaskGraphBuilder) -> Self {
        Self {
            extractor: RequirementExtractor::new(),
            builder,
            resolver: DependencyResolver::new(),
        }
    }

    /// Extract requirements from a document and open a run in `analysis`.
    #[instrument(skip_all, fields(document_len = document.len()))]
    pub fn analyze(&self, document: &str) -> DomainResult<WorkflowRun> {
        let requirements = self.extractor.extract_all(document)?;
        let mut run = WorkflowRun::new(requirements, Vec::new());
        run.document_title = RequirementExtractor::document_title(document);
        info!(
            run_id = %run.id,
            requirements = run.requirements.len(),
            "run opened in analysis"
        );
        Ok(run)
    }

    /// `analysis → planning`: build the task graph and fix its order.
    #[instrument(skip_all, fields(run_id = %run.id))]
    pub fn plan(&self, run: &mut WorkflowRun) -> DomainResult<Transition> {
        ensure_phase(run, RunPhase::Analysis, "plan")?;
        if run.requirements.is_empty() {
            return Err(DomainError::InvalidPhaseTransition {
                from: RunPhase::Analysis,
                to: RunPhase::Planning,
                reason: "no requirements were extracted".to_string(),
            });
        }

        let graph = self.builder.build(&run.requirements)?;
        run.planned_task_ids = graph.tasks.iter().map(|t| t.id.clone()).collect();
        run.tasks = graph.tasks;
        run.topological_order = graph.order;
        enter_phase(run, RunPhase::Planning);

        Ok(Transition {
            phase: run.phase,
            newly_eligible: Vec::new(),
        })
    }

    /// `planning → implementation`: every task pending, order fixed.
    #[instrument(skip_all, fields(run_id = %run.id))]
    pub fn start_implementation(&self, run: &mut WorkflowRun) -> DomainResult<Transition> {
        ensure_phase(run, RunPhase::Planning, "start_implementation")?;

        if let Some(task) = run.tasks.iter().find(|t| t.status != TaskStatus::Pending) {
            return Err(DomainError::InvalidPhaseTransition {
                from: RunPhase::Planning,
                to: RunPhase::Implementation,
                reason: format!("{} is {}, expected pending", task.id, task.status),
            });
        }
        let ordered: HashSet<&TaskId> = run.topological_order.iter().collect();
        if run.tasks.is_empty() || run.tasks.iter().any(|t| !ordered.contains(&t.id)) {
            return Err(DomainError::InvalidPhaseTransition {
                from: RunPhase::Planning,
                to: RunPhase::Implementation,
                reason: "no topological order fixed for every task".to_string(),
            });
        }

        enter_phase(run, RunPhase::Implementation);
        Ok(Transition {
            phase: run.phase,
            newly_eligible: eligible_ids(run),
        })
    }

    /// Tasks that could be started now, in execution order.
    ///
    /// A task is eligible when it is pending, not held for approval, and
    /// every dependency is completed. Outside `implementation` nothing is.
    pub fn eligible_tasks<'r>(&self, run: &'r WorkflowRun) -> Vec<&'r Task> {
        eligible(run)
    }

    /// Claim the lowest-ordered eligible task, if any.
    #[instrument(skip_all, fields(run_id = %run.id))]
    pub fn next_eligible_task<'r>(
        &self,
        run: &'r mut WorkflowRun,
    ) -> DomainResult<Option<&'r Task>> {
        ensure_phase(run, RunPhase::Implementation, "next_eligible_task")?;
        let Some(id) = eligible(run).first().map(|t| t.id.clone()) else {
            debug!("no eligible task");
            return Ok(None);
        };
        self.start_task(run, &id)?;
        Ok(run.task(&id))
    }

    /// Move a specific task `pending → in_progress`.
    #[instrument(skip_all, fields(run_id = %run.id, task_id = %id))]
    pub fn start_task(&self, run: &mut WorkflowRun, id: &TaskId) -> DomainResult<Transition> {
        ensure_phase(run, RunPhase::Implementation, "start_task")?;
        let task = run
            .task(id)
            .ok_or_else(|| DomainError::TaskNotFound(id.clone()))?;

        if task.is_held() {
            return Err(DomainError::ScopeCreepUnapproved(id.clone()));
        }
        if let Some(active) = run.active_tasks().find(|t| &t.id != id) {
            return Err(DomainError::ConcurrentTaskViolation {
                active: active.id.clone(),
                requested: id.clone(),
            });
        }
        let unmet: Vec<TaskId> = task
            .depends_on
            .iter()
            .filter(|dep| run.task(dep).map(|t| t.status) != Some(TaskStatus::Completed))
            .cloned()
            .collect();
        if !unmet.is_empty() {
            return Err(DomainError::DependencyNotMet {
                task: id.clone(),
                unmet,
            });
        }

        let task = run
            .task_mut(id)
            .ok_or_else(|| DomainError::TaskNotFound(id.clone()))?;
        task.transition_to(TaskStatus::InProgress)?;
        let attempts = task.attempts;
        run.current_task_id = Some(id.clone());
        run.record(RunEventKind::TaskStarted { task_id: id.clone() });
        debug!(attempts, "task claimed");

        Ok(Transition {
            phase: run.phase,
            newly_eligible: Vec::new(),
        })
    }

    /// Record the executor's result for the active task.
    ///
    /// A failed or externally blocked task blocks everything downstream of
    /// it. A completion releases dependency-blocked tasks whose upstream has
    /// recovered.
    #[instrument(skip_all, fields(run_id = %run.id, task_id = %id, outcome = outcome.as_str()))]
    pub fn report_outcome(
        &self,
        run: &mut WorkflowRun,
        id: &TaskId,
        outcome: Outcome,
        detail: Option<&str>,
    ) -> DomainResult<Transition> {
        ensure_phase(run, RunPhase::Implementation, "report_outcome")?;
        let before = eligible_ids(run);

        let task = run
            .task_mut(id)
            .ok_or_else(|| DomainError::TaskNotFound(id.clone()))?;
        if task.status != TaskStatus::InProgress {
            return Err(DomainError::InvalidStateTransition {
                task: id.clone(),
                from: task.status,
                to: outcome.status(),
            });
        }
        task.transition_to(outcome.status())?;
        let reason = detail.unwrap_or("unspecified").to_string();

        match outcome {
            Outcome::Completed => {
                task.failure_reason = None;
                run.record(RunEventKind::TaskCompleted { task_id: id.clone() });
                info!("task completed");
            }
            Outcome::Failed => {
                task.failure_reason = Some(reason.clone());
                run.record(RunEventKind::TaskFailed {
                    task_id: id.clone(),
                    reason: reason.clone(),
                });
                warn!(reason = %reason, "task failed");
            }
            Outcome::Blocked => {
                task.block_reason = Some(BlockReason::External(reason.clone()));
                run.record(RunEventKind::TaskBlocked {
                    task_id: id.clone(),
                    reason: reason.clone(),
                });
                warn!(reason = %reason, "task blocked externally");
            }
        }
        if run.current_task_id.as_ref() == Some(id) {
            run.current_task_id = None;
        }

        match outcome {
            Outcome::Completed => release_blocked(run),
            Outcome::Failed | Outcome::Blocked => self.block_downstream(run, id),
        }

        Ok(Transition {
            phase: run.phase,
            newly_eligible: newly_eligible(run, &before),
        })
    }

    /// Explicitly retry a failed or externally blocked task.
    ///
    /// The task returns to `pending`; tasks blocked behind it stay blocked
    /// until it completes.
    #[instrument(skip_all, fields(run_id = %run.id, task_id = %id))]
    pub fn retry_task(&self, run: &mut WorkflowRun, id: &TaskId) -> DomainResult<Transition> {
        ensure_phase(run, RunPhase::Implementation, "retry_task")?;
        let before = eligible_ids(run);

        let task = run
            .task_mut(id)
            .ok_or_else(|| DomainError::TaskNotFound(id.clone()))?;
        match (&task.status, &task.block_reason) {
            (TaskStatus::Failed, _) | (TaskStatus::Blocked, Some(BlockReason::External(_))) => {}
            (TaskStatus::Blocked, Some(BlockReason::Dependency(upstream))) => {
                return Err(DomainError::ValidationFailed(format!(
                    "{id} is blocked behind {upstream}; retry the upstream task instead"
                )));
            }
            (status, _) => {
                return Err(DomainError::InvalidStateTransition {
                    task: id.clone(),
                    from: *status,
                    to: TaskStatus::Pending,
                });
            }
        }
        task.transition_to(TaskStatus::Pending)?;
        task.failure_reason = None;
        let attempts = task.attempts;
        run.record(RunEventKind::TaskRetried { task_id: id.clone() });
        info!(attempts, "task queued for retry");

        Ok(Transition {
            phase: run.phase,
            newly_eligible: newly_eligible(run, &before),
        })
    }

    /// Append new work to the run.
    ///
    /// During planning the proposal becomes part of the plan. During
    /// implementation it is scope creep: flagged and held until
    /// `approve_scope_creep` is called. Appended tasks may only depend on
    /// existing tasks, so the graph stays acyclic. Oversized proposals are
    /// split like planned tasks; the ids of every appended task are returned.
    #[instrument(skip_all, fields(run_id = %run.id, title = %proposal.title))]
    pub fn propose_task(
        &self,
        run: &mut WorkflowRun,
        proposal: TaskProposal,
    ) -> DomainResult<Vec<TaskId>> {
        let scope_creep = match run.phase {
            RunPhase::Planning => false,
            RunPhase::Implementation => true,
            phase => {
                return Err(DomainError::WrongPhase {
                    phase,
                    operation: "propose_task",
                })
            }
        };

        if proposal.title.trim().is_empty() {
            return Err(DomainError::ValidationFailed(
                "proposed task needs a title".to_string(),
            ));
        }
        for dep in &proposal.depends_on {
            if run.task(dep).is_none() {
                return Err(DomainError::TaskNotFound(dep.clone()));
            }
        }
        if let Some(unknown) = proposal
            .requirement_ids
            .iter()
            .find(|r| run.requirement(r).is_none())
        {
            return Err(DomainError::ValidationFailed(format!(
                "unknown requirement {unknown}"
            )));
        }

        let next = run
            .tasks
            .iter()
            .filter_map(|t| t.id.number())
            .max()
            .unwrap_or(0)
            + 1;
        let estimate = proposal
            .estimate
            .unwrap_or(self.builder.policy().default_points)
            .max(1);
        // A card needs something to derive scenarios from.
        let description = if proposal.description.trim().is_empty()
            && proposal.requirement_ids.is_empty()
        {
            proposal.title.clone()
        } else {
            proposal.description
        };
        let upstream = proposal.depends_on.clone();
        let mut task = Task::new(TaskId::numbered(next), proposal.title, description)
            .with_requirements(proposal.requirement_ids)
            .with_estimate(estimate);
        for dep in proposal.depends_on {
            task = task.with_dependency(dep);
        }
        task.handles_external_input = proposal.handles_external_input;
        if scope_creep {
            task.scope_creep = true;
            task.approval = ScopeApproval::Pending;
        }

        let parts = self.builder.split_oversized(task, &run.requirements);
        let ids: Vec<TaskId> = parts.iter().map(|t| t.id.clone()).collect();

        let mut tasks = run.tasks.clone();
        tasks.extend(parts.iter().cloned());
        let order = self.resolver.topological_sort(&tasks)?;

        run.tasks = tasks;
        if scope_creep {
            warn!(tasks = ?ids, "scope creep proposed; held for approval");
        } else {
            run.topological_order = order;
            run.planned_task_ids.extend(ids.iter().cloned());
            info!(tasks = ?ids, "task added to plan");
        }
        for id in &ids {
            run.record(RunEventKind::TaskProposed {
                task_id: id.clone(),
                scope_creep,
            });
        }
        // Work appended behind a failed or blocked task starts out blocked
        for dep in &upstream {
            if matches!(
                run.task(dep).map(|t| t.status),
                Some(TaskStatus::Failed | TaskStatus::Blocked)
            ) {
                self.block_downstream(run, dep);
            }
        }
        Ok(ids)
    }

    /// Approve held scope creep, along with the other parts of the same
    /// split proposal. Returns whether anything changed.
    #[instrument(skip_all, fields(run_id = %run.id, task_id = %id))]
    pub fn approve_scope_creep(&self, run: &mut WorkflowRun, id: &TaskId) -> DomainResult<bool> {
        ensure_phase(run, RunPhase::Implementation, "approve_scope_creep")?;
        let group = proposal_group(run, id)?;

        let mut changed = false;
        for member in &group {
            let task = run
                .task_mut(member)
                .ok_or_else(|| DomainError::TaskNotFound(member.clone()))?;
            if task.approval == ScopeApproval::Pending {
                task.approval = ScopeApproval::Approved;
                run.record(RunEventKind::ScopeCreepApproved {
                    task_id: member.clone(),
                });
                changed = true;
            }
        }
        if changed {
            info!("scope creep approved");
        }
        Ok(changed)
    }

    /// Reject held scope creep. Pending proposals that build on it are
    /// rejected with it.
    #[instrument(skip_all, fields(run_id = %run.id, task_id = %id))]
    pub fn reject_scope_creep(&self, run: &mut WorkflowRun, id: &TaskId) -> DomainResult<()> {
        ensure_phase(run, RunPhase::Implementation, "reject_scope_creep")?;
        let task = run
            .task(id)
            .ok_or_else(|| DomainError::TaskNotFound(id.clone()))?;
        if task.approval != ScopeApproval::Pending {
            return Err(DomainError::ValidationFailed(format!(
                "{id} is not awaiting approval ({})",
                task.approval.as_str()
            )));
        }

        let mut rejected = proposal_group(run, id)?;
        for dependent in self.resolver.transitive_dependents(id, &run.tasks) {
            if !rejected.contains(&dependent) {
                rejected.push(dependent);
            }
        }
        for member in rejected {
            let Some(task) = run.task_mut(&member) else {
                continue;
            };
            if task.scope_creep
                && matches!(task.status, TaskStatus::Pending | TaskStatus::Blocked)
                && task.approval != ScopeApproval::Rejected
            {
                task.approval = ScopeApproval::Rejected;
                run.record(RunEventKind::ScopeCreepRejected { task_id: member });
            }
        }
        warn!("scope creep rejected");
        Ok(())
    }

    /// `implementation → summary`: every executable task is terminal.
    #[instrument(skip_all, fields(run_id = %run.id))]
    pub fn finish(&self, run: &mut WorkflowRun) -> DomainResult<Transition> {
        ensure_phase(run, RunPhase::Implementation, "finish")?;

        let open: Vec<&Task> = run
            .tasks
            .iter()
            .filter(|t| !t.is_held() && !t.is_terminal())
            .collect();
        if !open.is_empty() {
            let listed = open
                .iter()
                .map(|t| format!("{} ({})", t.id, t.status))
                .collect::<Vec<_>>()
                .join(", ");
            return Err(DomainError::InvalidPhaseTransition {
                from: RunPhase::Implementation,
                to: RunPhase::Summary,
                reason: format!("tasks not terminal: {listed}"),
            });
        }

        run.completed_at = Some(Utc::now());
        enter_phase(run, RunPhase::Summary);
        Ok(Transition {
            phase: run.phase,
            newly_eligible: Vec::new(),
        })
    }

    /// Abandon the run from any non-terminal phase.
    ///
    /// The active task fails with reason `cancelled`, its downstream tasks are
    /// blocked, and the run is forced to `summary` so a partial report can
    /// still be produced.
    #[instrument(skip_all, fields(run_id = %run.id))]
    pub fn abandon(&self, run: &mut WorkflowRun, reason: &str) -> DomainResult<Transition> {
        if run.phase.is_terminal() {
            return Err(DomainError::WrongPhase {
                phase: run.phase,
                operation: "abandon",
            });
        }

        let active: Vec<TaskId> = run.active_tasks().map(|t| t.id.clone()).collect();
        for id in &active {
            if let Some(task) = run.task_mut(id) {
                task.transition_to(TaskStatus::Failed)?;
                task.failure_reason = Some(CANCELLED.to_string());
            }
            run.record(RunEventKind::TaskFailed {
                task_id: id.clone(),
                reason: CANCELLED.to_string(),
            });
            self.block_downstream(run, id);
        }

        run.current_task_id = None;
        run.abandoned = Some(reason.to_string());
        run.completed_at = Some(Utc::now());
        run.record(RunEventKind::Abandoned {
            reason: reason.to_string(),
        });
        warn!(reason, cancelled = ?active, "run abandoned");
        enter_phase(run, RunPhase::Summary);

        Ok(Transition {
            phase: run.phase,
            newly_eligible: Vec::new(),
        })
    }

    /// Block every pending task downstream of `upstream`.
    fn block_downstream(&self, run: &mut WorkflowRun, upstream: &TaskId) {
        for id in self.resolver.transitive_dependents(upstream, &run.tasks) {
            let Some(task) = run.task_mut(&id) else {
                continue;
            };
            if task.status != TaskStatus::Pending {
                continue;
            }
            if task.transition_to(TaskStatus::Blocked).is_ok() {
                task.block_reason = Some(BlockReason::Dependency(upstream.clone()));
                run.record(RunEventKind::TaskBlocked {
                    task_id: id.clone(),
                    reason: format!("upstream {upstream} did not complete"),
                });
                debug!(task_id = %id, %upstream, "task blocked behind upstream");
            }
        }
    }
}

fn ensure_phase(run: &WorkflowRun, expected: RunPhase, operation: &'static str) -> DomainResult<()> {
    if run.phase == expected {
        Ok(())
    } else {
        Err(DomainError::WrongPhase {
            phase: run.phase,
            operation,
        })
    }
}

fn enter_phase(run: &mut WorkflowRun, to: RunPhase) {
    let from = run.phase;
    run.phase = to;
    run.record(RunEventKind::PhaseChanged { from, to });
    info!(run_id = %run.id, %from, %to, "phase changed");
}

fn eligible(run: &WorkflowRun) -> Vec<&Task> {
    if run.phase != RunPhase::Implementation {
        return Vec::new();
    }
    run.ordered_tasks()
        .into_iter()
        .filter(|t| t.status == TaskStatus::Pending && !t.is_held())
        .filter(|t| {
            t.depends_on
                .iter()
                .all(|dep| run.task(dep).map(|d| d.status) == Some(TaskStatus::Completed))
        })
        .collect()
}

fn eligible_ids(run: &WorkflowRun) -> Vec<TaskId> {
    eligible(run).into_iter().map(|t| t.id.clone()).collect()
}

fn newly_eligible(run: &WorkflowRun, before: &[TaskId]) -> Vec<TaskId> {
    eligible_ids(run)
        .into_iter()
        .filter(|id| !before.contains(id))
        .collect()
}

/// Return dependency-blocked tasks to `pending` once their blocker has
/// completed and no direct dependency is failed or blocked. Repeats until
/// nothing changes so releases cascade down a chain.
fn release_blocked(run: &mut WorkflowRun) {
    loop {
        let releasable: Vec<TaskId> = run
            .tasks
            .iter()
            .filter(|t| t.status == TaskStatus::Blocked)
            .filter(|t| match &t.block_reason {
                Some(BlockReason::Dependency(blocker)) => {
                    run.task(blocker).map(|b| b.status) == Some(TaskStatus::Completed)
                        && t.depends_on.iter().all(|dep| {
                            !matches!(
                                run.task(dep).map(|d| d.status),
                                Some(TaskStatus::Failed | TaskStatus::Blocked)
                            )
                        })
                }
                _ => false,
            })
            .map(|t| t.id.clone())
            .collect();

        if releasable.is_empty() {
            return;
        }
        for id in releasable {
            if let Some(task) = run.task_mut(&id) {
                if task.transition_to(TaskStatus::Pending).is_ok() {
                    run.record(RunEventKind::TaskReleased { task_id: id.clone() });
                    debug!(task_id = %id, "task released");
                }
            }
        }
    }
}

/// A task and the other parts of the split proposal it belongs to.
fn proposal_group(run: &WorkflowRun, id: &TaskId) -> DomainResult<Vec<TaskId>> {
    let task = run
        .task(id)
        .ok_or_else(|| DomainError::TaskNotFound(id.clone()))?;
    let group = match &task.parent {
        Some(parent) => run
            .tasks
            .iter()
            .filter(|t| t.parent.as_ref() == Some(parent))
            .map(|t| t.id.clone())
            .collect(),
        None => vec![id.clone()],
    };
    Ok(group)
}
