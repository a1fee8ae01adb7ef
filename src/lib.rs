//! specrun - requirements-driven task orchestration
//!
//! specrun turns a structured requirements document into a dependency-ordered
//! task graph, walks that graph through a strict run lifecycle, derives
//! Given/When/Then acceptance scenarios for every task and closes the run
//! with a structured report.
//!
//! # Architecture
//!
//! This crate follows Hexagonal Architecture principles:
//!
//! - **Domain Layer** (`domain`): Models, errors and port traits
//! - **Service Layer** (`services`): Extraction, planning, the workflow state
//!   machine, card generation and reporting
//! - **Adapters** (`adapters`): File-backed run storage
//! - **Infrastructure Layer** (`infrastructure`): Configuration and logging
//! - **CLI Layer** (`cli`): Command-line interface
//!
//! # Example
//!
//! ```
//! use specrun::domain::models::PlanningConfig;
//! use specrun::services::{Outcome, WorkflowEngine};
//!
//! let engine = WorkflowEngine::new(PlanningConfig::default());
//! let mut run = engine
//!     .analyze("# Todo\n## Requirements\n- add items\n")
//!     .unwrap();
//! engine.plan(&mut run).unwrap();
//! engine.start_implementation(&mut run).unwrap();
//!
//! let id = engine.next_eligible_task(&mut run).unwrap().unwrap().id.clone();
//! engine.report_outcome(&mut run, &id, Outcome::Completed, None).unwrap();
//! engine.finish(&mut run).unwrap();
//! ```

pub mod adapters;
pub mod cli;
pub mod domain;
pub mod infrastructure;
pub mod services;

// Re-export commonly used types for convenience
pub use adapters::json::JsonRunRepository;
pub use domain::models::{
    Card, Config, PlanningConfig, Requirement, RequirementCategory, RunPhase, RunReport,
    Scenario, Task, TaskId, TaskStatus, WorkflowRun,
};
pub use domain::ports::{GroupingStrategy, RunRepository};
pub use domain::{DomainError, DomainResult};
pub use infrastructure::config::{ConfigError, ConfigLoader};
pub use services::{
    CardGenerator, Outcome, ReportAggregator, RequirementExtractor, TaskGraphBuilder,
    TaskProposal, WorkflowEngine,
};
