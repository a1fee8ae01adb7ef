//! Workflow run domain model.
//!
//! A `WorkflowRun` owns the requirements and tasks of one execution
//! lifecycle. It is a plain value: the engine mutates it through explicit
//! transition functions and the caller persists it however it likes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use super::ids::{RequirementId, TaskId};
use super::requirement::Requirement;
use super::task::{Task, TaskStatus};

/// Run-level phase.
///
/// ```text
/// Analysis → Planning → Implementation → Summary
///     └──────────┴───────────┴── abandon ──┘
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunPhase {
    #[default]
    Analysis,
    Planning,
    Implementation,
    Summary,
}

impl RunPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Analysis => "analysis",
            Self::Planning => "planning",
            Self::Implementation => "implementation",
            Self::Summary => "summary",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Summary)
    }
}

impl fmt::Display for RunPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What happened in a run, in order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum RunEventKind {
    PhaseChanged { from: RunPhase, to: RunPhase },
    TaskStarted { task_id: TaskId },
    TaskCompleted { task_id: TaskId },
    TaskFailed { task_id: TaskId, reason: String },
    TaskBlocked { task_id: TaskId, reason: String },
    TaskReleased { task_id: TaskId },
    TaskRetried { task_id: TaskId },
    TaskProposed { task_id: TaskId, scope_creep: bool },
    ScopeCreepApproved { task_id: TaskId },
    ScopeCreepRejected { task_id: TaskId },
    Abandoned { reason: String },
}

/// A timestamped entry in the run's audit trail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunEvent {
    pub at: DateTime<Utc>,
    #[serde(flatten)]
    pub kind: RunEventKind,
}

/// One execution lifecycle over a task DAG.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowRun {
    pub id: Uuid,
    /// First heading of the source document, if any
    #[serde(default)]
    pub document_title: Option<String>,
    pub phase: RunPhase,
    /// Extracted requirements, immutable for the life of the run
    pub requirements: Vec<Requirement>,
    /// Tasks in plan order (appended tasks at the end)
    pub tasks: Vec<Task>,
    /// Execution order fixed when planning begins
    #[serde(default)]
    pub topological_order: Vec<TaskId>,
    /// Tasks present in the planning-phase graph
    #[serde(default)]
    pub planned_task_ids: Vec<TaskId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_task_id: Option<TaskId>,
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    /// Reason given when the run was abandoned
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub abandoned: Option<String>,
    #[serde(default)]
    pub history: Vec<RunEvent>,
}

impl WorkflowRun {
    /// Create a run in the analysis phase.
    pub fn new(requirements: Vec<Requirement>, tasks: Vec<Task>) -> Self {
        Self {
            id: Uuid::new_v4(),
            document_title: None,
            phase: RunPhase::Analysis,
            requirements,
            tasks,
            topological_order: Vec::new(),
            planned_task_ids: Vec::new(),
            current_task_id: None,
            started_at: Utc::now(),
            completed_at: None,
            abandoned: None,
            history: Vec::new(),
        }
    }

    pub fn task(&self, id: &TaskId) -> Option<&Task> {
        self.tasks.iter().find(|t| &t.id == id)
    }

    pub fn task_mut(&mut self, id: &TaskId) -> Option<&mut Task> {
        self.tasks.iter_mut().find(|t| &t.id == id)
    }

    pub fn requirement(&self, id: &RequirementId) -> Option<&Requirement> {
        self.requirements.iter().find(|r| &r.id == id)
    }

    /// Requirements a task references, in task order.
    pub fn requirements_for(&self, task: &Task) -> Vec<&Requirement> {
        task.requirement_ids
            .iter()
            .filter_map(|id| self.requirement(id))
            .collect()
    }

    /// Tasks currently `in_progress`. Never more than one.
    pub fn active_tasks(&self) -> impl Iterator<Item = &Task> {
        self.tasks
            .iter()
            .filter(|t| t.status == TaskStatus::InProgress)
    }

    /// Tasks in execution order: fixed topological order first, then any
    /// tasks appended afterwards.
    pub fn ordered_tasks(&self) -> Vec<&Task> {
        let mut ordered: Vec<&Task> = self
            .topological_order
            .iter()
            .filter_map(|id| self.task(id))
            .collect();
        for task in &self.tasks {
            if !self.topological_order.contains(&task.id) {
                ordered.push(task);
            }
        }
        ordered
    }

    /// Tasks that directly depend on `id`.
    pub fn direct_dependents(&self, id: &TaskId) -> Vec<&Task> {
        self.tasks
            .iter()
            .filter(|t| t.depends_on.contains(id))
            .collect()
    }

    pub fn is_abandoned(&self) -> bool {
        self.abandoned.is_some()
    }

    /// Append an event to the audit trail.
    pub fn record(&mut self, kind: RunEventKind) {
        self.history.push(RunEvent {
            at: Utc::now(),
            kind,
        });
    }
}

/// Result of a state-machine transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Transition {
    /// Run phase after the transition
    pub phase: RunPhase,
    /// Tasks that became eligible to start because of this transition
    pub newly_eligible: Vec<TaskId>,
}
