//! Task domain model.
//!
//! Tasks are schedulable units of work derived from one or more requirements.
//! They form a DAG through `depends_on` and move through a strict status
//! lifecycle driven by the workflow engine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use super::ids::{RequirementId, TaskId};
use crate::domain::errors::{DomainError, DomainResult};

/// Status of a task within a workflow run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Not started; may be waiting on dependencies.
    #[default]
    Pending,
    /// Currently being worked on by the external executor.
    InProgress,
    /// Finished successfully.
    Completed,
    /// Waiting on a failed dependency or an external blocker.
    Blocked,
    /// Finished unsuccessfully; can be retried explicitly.
    Failed,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Blocked => "blocked",
            Self::Failed => "failed",
        }
    }

    /// Terminal for the purpose of closing a run.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Valid transitions from this status.
    ///
    /// `Failed -> Pending` and `Blocked -> Pending` are the explicit retry and
    /// release paths; nothing moves back automatically except a dependency block.
    pub fn valid_transitions(&self) -> &'static [TaskStatus] {
        match self {
            Self::Pending => &[Self::InProgress, Self::Blocked],
            Self::InProgress => &[Self::Completed, Self::Failed, Self::Blocked],
            Self::Blocked => &[Self::Pending],
            Self::Completed => &[],
            Self::Failed => &[Self::Pending],
        }
    }

    pub fn can_transition_to(&self, new_status: Self) -> bool {
        self.valid_transitions().contains(&new_status)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ordering policy stage. Setup precedes core, core precedes polish.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Setup,
    #[default]
    Core,
    Polish,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Setup => "setup",
            Self::Core => "core",
            Self::Polish => "polish",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "setup" | "foundation" => Some(Self::Setup),
            "core" | "implementation" => Some(Self::Core),
            "polish" | "cleanup" => Some(Self::Polish),
            _ => None,
        }
    }
}

/// Approval state of a task proposed outside the planned graph.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScopeApproval {
    /// Part of the plan; no approval needed.
    #[default]
    NotRequired,
    /// Scope creep awaiting an external approval signal.
    Pending,
    /// Scope creep approved and folded into the run.
    Approved,
    /// Scope creep rejected; never executed.
    Rejected,
}

impl ScopeApproval {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotRequired => "not_required",
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }

    /// Whether the task may be executed.
    pub fn is_executable(&self) -> bool {
        matches!(self, Self::NotRequired | Self::Approved)
    }
}

/// Why a task is blocked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum BlockReason {
    /// An upstream task failed or is itself blocked.
    Dependency(TaskId),
    /// The executor reported an external blocker.
    External(String),
}

/// A schedulable unit of work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    /// Human-readable title
    pub title: String,
    pub description: String,
    /// Requirements this task implements (references into the run)
    #[serde(default)]
    pub requirement_ids: Vec<RequirementId>,
    /// Tasks that must be completed first
    #[serde(default)]
    pub depends_on: BTreeSet<TaskId>,
    /// Size in points
    pub estimate: u32,
    pub status: TaskStatus,
    #[serde(default)]
    pub stage: Stage,
    /// Key other requirements use to reference this task's artifact
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    /// Touches externally supplied input or credentials
    #[serde(default)]
    pub handles_external_input: bool,
    /// Proposed during implementation, outside the planned graph
    #[serde(default)]
    pub scope_creep: bool,
    #[serde(default)]
    pub approval: ScopeApproval,
    /// Task this one was split from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<TaskId>,
    /// Number of times the task entered `in_progress`
    #[serde(default)]
    pub attempts: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_reason: Option<BlockReason>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl Task {
    /// Create a pending task with an explicit title and description.
    pub fn new(id: TaskId, title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id,
            title: title.into(),
            description: description.into(),
            requirement_ids: Vec::new(),
            depends_on: BTreeSet::new(),
            estimate: 1,
            status: TaskStatus::Pending,
            stage: Stage::default(),
            key: None,
            handles_external_input: false,
            scope_creep: false,
            approval: ScopeApproval::NotRequired,
            parent: None,
            attempts: 0,
            failure_reason: None,
            block_reason: None,
            started_at: None,
            completed_at: None,
        }
    }

    /// Add a dependency. Self-dependencies are ignored.
    pub fn with_dependency(mut self, task_id: TaskId) -> Self {
        if task_id != self.id {
            self.depends_on.insert(task_id);
        }
        self
    }

    pub fn with_requirements(mut self, ids: impl IntoIterator<Item = RequirementId>) -> Self {
        self.requirement_ids.extend(ids);
        self
    }

    pub fn with_estimate(mut self, estimate: u32) -> Self {
        self.estimate = estimate;
        self
    }

    pub fn with_stage(mut self, stage: Stage) -> Self {
        self.stage = stage;
        self
    }

    pub fn can_transition_to(&self, new_status: TaskStatus) -> bool {
        self.status.can_transition_to(new_status)
    }

    /// Transition to a new status, stamping timestamps.
    pub fn transition_to(&mut self, new_status: TaskStatus) -> DomainResult<()> {
        if !self.can_transition_to(new_status) {
            return Err(DomainError::InvalidStateTransition {
                task: self.id.clone(),
                from: self.status,
                to: new_status,
            });
        }

        self.status = new_status;
        match new_status {
            TaskStatus::InProgress => {
                self.attempts += 1;
                self.started_at = Some(Utc::now());
                self.completed_at = None;
            }
            TaskStatus::Completed | TaskStatus::Failed => {
                self.completed_at = Some(Utc::now());
            }
            TaskStatus::Pending => {
                self.block_reason = None;
            }
            TaskStatus::Blocked => {}
        }
        Ok(())
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Held tasks are scope creep that has not been approved.
    pub fn is_held(&self) -> bool {
        !self.approval.is_executable()
    }
}

/// Generate a short title from requirement text.
/// Takes the first line, truncates at ~80 chars on a word boundary.
pub fn generate_title(text: &str) -> String {
    let first_line = text.lines().next().unwrap_or(text).trim();
    if first_line.is_empty() {
        return "Untitled task".to_string();
    }
    let max_len = 80;
    if first_line.chars().count() <= max_len {
        return first_line.to_string();
    }
    let head: String = first_line.chars().take(max_len).collect();
    match head.rfind(' ') {
        Some(pos) => format!("{}...", &head[..pos]),
        None => format!("{head}..."),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task() -> Task {
        Task::new(TaskId::numbered(1), "Test Task", "Description")
    }

    #[test]
    fn test_task_creation() {
        let task = task();
        assert_eq!(task.title, "Test Task");
        assert_eq!(task.status, TaskStatus::Pending);
        assert_eq!(task.approval, ScopeApproval::NotRequired);
        assert!(!task.is_held());
    }

    #[test]
    fn test_generate_title() {
        assert_eq!(generate_title("Short prompt"), "Short prompt");
        assert_eq!(generate_title("First line\nSecond line"), "First line");
        assert_eq!(generate_title("   "), "Untitled task");

        let long = "This is a very long requirement that exceeds eighty characters and should be truncated at a word boundary somewhere";
        let title = generate_title(long);
        assert!(title.chars().count() <= 84);
        assert!(title.ends_with("..."));
    }

    #[test]
    fn test_task_state_transitions() {
        let mut task = task();

        task.transition_to(TaskStatus::InProgress).unwrap();
        assert!(task.started_at.is_some());
        assert_eq!(task.attempts, 1);

        task.transition_to(TaskStatus::Completed).unwrap();
        assert!(task.completed_at.is_some());
        assert!(task.is_terminal());
        assert!(task.valid_transitions_exhausted());
    }

    #[test]
    fn test_pending_cannot_complete_directly() {
        let mut task = task();
        let err = task.transition_to(TaskStatus::Completed).unwrap_err();
        assert!(matches!(
            err,
            DomainError::InvalidStateTransition {
                from: TaskStatus::Pending,
                to: TaskStatus::Completed,
                ..
            }
        ));
        assert_eq!(task.status, TaskStatus::Pending);
    }

    #[test]
    fn test_failed_task_can_be_retried() {
        let mut task = task();
        task.transition_to(TaskStatus::InProgress).unwrap();
        task.transition_to(TaskStatus::Failed).unwrap();
        task.transition_to(TaskStatus::Pending).unwrap();
        task.transition_to(TaskStatus::InProgress).unwrap();
        assert_eq!(task.attempts, 2);
    }

    #[test]
    fn test_dependency_ignores_self() {
        let task = task()
            .with_dependency(TaskId::numbered(1))
            .with_dependency(TaskId::numbered(2));
        assert_eq!(task.depends_on.len(), 1);
        assert!(task.depends_on.contains(&TaskId::numbered(2)));
    }

    #[test]
    fn test_stage_parsing() {
        assert_eq!(Stage::from_str("polish"), Some(Stage::Polish));
        assert_eq!(Stage::from_str("later"), None);
        assert_eq!(Stage::from_str(" Setup "), Some(Stage::Setup));
    }

    impl Task {
        fn valid_transitions_exhausted(&self) -> bool {
            self.status.valid_transitions().is_empty()
        }
    }
}
