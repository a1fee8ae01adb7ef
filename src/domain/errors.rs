//! Domain errors for the specrun orchestration core.

use thiserror::Error;
use uuid::Uuid;

use super::models::{RunPhase, TaskId, TaskStatus};

/// Format a cycle path as a human-readable string: `A -> B -> C -> A`.
fn format_cycle_path(path: &[TaskId]) -> String {
    let mut parts: Vec<String> = path.iter().map(ToString::to_string).collect();
    if let Some(first) = path.first() {
        parts.push(first.to_string());
    }
    parts.join(" -> ")
}

fn format_ids(ids: &[TaskId]) -> String {
    ids.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Domain-level errors. Each kind is specific; nothing is retried automatically.
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Malformed document: {0}")]
    MalformedDocument(String),

    #[error("Task dependency cycle detected: {}", format_cycle_path(.0))]
    CyclicDependency(Vec<TaskId>),

    #[error("Ambiguous dependency '{reference}': {reason}")]
    AmbiguousDependency { reference: String, reason: String },

    #[error("Cannot start {requested}: {active} is already in progress")]
    ConcurrentTaskViolation { active: TaskId, requested: TaskId },

    #[error("Cannot start {task}: dependencies not completed: {}", format_ids(.unmet))]
    DependencyNotMet { task: TaskId, unmet: Vec<TaskId> },

    #[error("Card for {0} has no derivable scenario")]
    IncompleteCard(TaskId),

    #[error("Task {0} is unapproved scope creep")]
    ScopeCreepUnapproved(TaskId),

    #[error("Invalid phase transition from {from} to {to}: {reason}")]
    InvalidPhaseTransition {
        from: RunPhase,
        to: RunPhase,
        reason: String,
    },

    #[error("Invalid state transition for {task} from {from} to {to}")]
    InvalidStateTransition {
        task: TaskId,
        from: TaskStatus,
        to: TaskStatus,
    },

    #[error("Operation not allowed in {phase} phase: {operation}")]
    WrongPhase {
        phase: RunPhase,
        operation: &'static str,
    },

    #[error("Task not found: {0}")]
    TaskNotFound(TaskId),

    #[error("Run not found: {0}")]
    RunNotFound(Uuid),

    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

pub type DomainResult<T> = Result<T, DomainError>;

impl From<serde_json::Error> for DomainError {
    fn from(err: serde_json::Error) -> Self {
        DomainError::SerializationError(err.to_string())
    }
}

impl From<std::io::Error> for DomainError {
    fn from(err: std::io::Error) -> Self {
        DomainError::StorageError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cycle_message_closes_the_loop() {
        let err = DomainError::CyclicDependency(vec![TaskId::numbered(1), TaskId::numbered(2)]);
        assert_eq!(
            err.to_string(),
            "Task dependency cycle detected: TASK-001 -> TASK-002 -> TASK-001"
        );
    }

    #[test]
    fn test_dependency_not_met_lists_ids() {
        let err = DomainError::DependencyNotMet {
            task: TaskId::numbered(2),
            unmet: vec![TaskId::numbered(1)],
        };
        assert_eq!(
            err.to_string(),
            "Cannot start TASK-002: dependencies not completed: TASK-001"
        );
    }
}
