pub mod card;
pub mod config;
pub mod ids;
pub mod report;
pub mod requirement;
pub mod task;
pub mod workflow_run;

pub use card::{Card, Scenario, ScenarioKind};
pub use config::{Config, GroupingMode, LoggingConfig, PlanningConfig, StorageConfig};
pub use ids::{CardId, RequirementId, ScenarioId, TaskId};
pub use report::{
    CardReport, Deviation, FailedTask, ManualCheck, RunReport, ScopeCreepEntry, StatusCounts,
};
pub use requirement::{Requirement, RequirementCategory, RequirementTags};
pub use task::{generate_title, BlockReason, ScopeApproval, Stage, Task, TaskStatus};
pub use workflow_run::{RunEvent, RunEventKind, RunPhase, Transition, WorkflowRun};
