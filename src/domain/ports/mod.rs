//! Port trait definitions (Hexagonal Architecture)
//!
//! - RunRepository: persistence of workflow runs
//! - GroupingStrategy: pluggable requirement-to-task grouping
//!
//! These traits keep the orchestration core independent of storage and of
//! the heuristics used to cluster requirements.

pub mod grouping;
pub mod run_repository;

pub use grouping::{GroupingStrategy, TaskDraft};
pub use run_repository::{RunRepository, RunSummary};
