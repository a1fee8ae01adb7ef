use crate::domain::models::{Requirement, Stage};

/// A candidate task produced by a grouping strategy, before ids,
/// dependency edges and sizing are assigned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskDraft {
    pub title: String,
    pub description: String,
    /// Indices into the requirement slice given to the strategy
    pub requirements: Vec<usize>,
    /// Declared artifact key, if any requirement names one
    pub key: Option<String>,
    pub stage: Stage,
    pub handles_external_input: bool,
}

/// Groups requirements into candidate tasks.
///
/// Strategies must keep document order: drafts are returned in the order of
/// their first requirement, and every requirement lands in exactly one draft.
pub trait GroupingStrategy: Send + Sync {
    /// Strategy name, for logging
    fn name(&self) -> &'static str;

    fn group(&self, requirements: &[Requirement]) -> Vec<TaskDraft>;
}
