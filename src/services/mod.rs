pub mod card_generator;
pub mod dependency_resolver;
pub mod grouping;
pub mod report_aggregator;
pub mod requirement_extractor;
pub mod task_graph_builder;
pub mod workflow_engine;

pub use card_generator::CardGenerator;
pub use dependency_resolver::DependencyResolver;
pub use grouping::{strategy_for, BySection, PerRequirement};
pub use report_aggregator::{render_markdown, MarkdownReport, ReportAggregator};
pub use requirement_extractor::{Extraction, RequirementExtractor};
pub use task_graph_builder::{TaskGraph, TaskGraphBuilder};
pub use workflow_engine::{Outcome, TaskProposal, WorkflowEngine, CANCELLED};
