//! Run report aggregation.
//!
//! Reads a run that has reached `summary` and produces the hand-off report.
//! Aggregation never mutates the run and reads no clock, so aggregating the
//! same run twice yields identical reports.

use std::fmt;

use tracing::{debug, instrument};

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{
    BlockReason, Deviation, FailedTask, ManualCheck, RequirementCategory, RunPhase, RunReport,
    ScenarioKind, ScopeCreepEntry, StatusCounts, TaskStatus, WorkflowRun,
};
use crate::services::card_generator::CardGenerator;

/// Builds `RunReport`s from finished runs.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReportAggregator {
    cards: CardGenerator,
}

impl ReportAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Aggregate a run in the `summary` phase.
    #[instrument(skip_all, fields(run_id = %run.id))]
    pub fn aggregate(&self, run: &WorkflowRun) -> DomainResult<RunReport> {
        if run.phase != RunPhase::Summary {
            return Err(DomainError::WrongPhase {
                phase: run.phase,
                operation: "aggregate",
            });
        }

        let ordered = run.ordered_tasks();

        let mut counts = StatusCounts::default();
        for task in ordered.iter().filter(|t| !t.is_held()) {
            counts.add(task.status);
        }

        let failed: Vec<FailedTask> = ordered
            .iter()
            .filter(|t| t.status == TaskStatus::Failed)
            .map(|t| FailedTask {
                task_id: t.id.clone(),
                title: t.title.clone(),
                reason: t
                    .failure_reason
                    .clone()
                    .unwrap_or_else(|| "unspecified".to_string()),
            })
            .collect();

        let scope_creep: Vec<ScopeCreepEntry> = run
            .tasks
            .iter()
            .filter(|t| t.scope_creep)
            .map(|t| ScopeCreepEntry {
                task_id: t.id.clone(),
                title: t.title.clone(),
                approval: t.approval,
                status: t.status,
            })
            .collect();

        let mut deviations = Vec::new();
        if let Some(reason) = &run.abandoned {
            deviations.push(Deviation::RunAbandoned {
                reason: reason.clone(),
            });
        }
        for task in &ordered {
            if task.status == TaskStatus::Failed {
                deviations.push(Deviation::TaskFailed {
                    task_id: task.id.clone(),
                    reason: task
                        .failure_reason
                        .clone()
                        .unwrap_or_else(|| "unspecified".to_string()),
                });
            }
            if task.attempts > 1 {
                deviations.push(Deviation::TaskRetried {
                    task_id: task.id.clone(),
                    attempts: task.attempts,
                });
            }
            if let Some(BlockReason::External(detail)) = &task.block_reason {
                deviations.push(Deviation::ExternallyBlocked {
                    task_id: task.id.clone(),
                    detail: detail.clone(),
                });
            }
        }
        deviations.extend(scope_creep.iter().map(|entry| Deviation::ScopeCreep {
            task_id: entry.task_id.clone(),
            approval: entry.approval,
        }));
        deviations.extend(
            run.requirements
                .iter()
                .filter(|r| r.low_confidence)
                .map(|r| Deviation::LowConfidenceRequirement {
                    requirement_id: r.id.clone(),
                }),
        );

        let cards = self.cards.generate_all(run)?;

        let mut manual_verification: Vec<ManualCheck> = Vec::new();
        for req in &run.requirements {
            if req.low_confidence {
                manual_verification.push(ManualCheck {
                    subject: req.id.to_string(),
                    description: format!(
                        "Confirm this unclassified text is a requirement: {}",
                        req.text
                    ),
                });
            } else if req.category == RequirementCategory::NonFunctional {
                manual_verification.push(ManualCheck {
                    subject: req.id.to_string(),
                    description: format!("Verify by measurement or inspection: {}", req.text),
                });
            }
        }
        manual_verification.extend(
            cards
                .iter()
                .flat_map(|c| c.scenarios.iter())
                .filter(|s| s.kind == ScenarioKind::Security)
                .map(|s| ManualCheck {
                    subject: s.id.to_string(),
                    description: format!("Security review: {}", s.then),
                }),
        );

        debug!(
            cards = cards.len(),
            deviations = deviations.len(),
            "report aggregated"
        );

        Ok(RunReport {
            run_id: run.id,
            document_title: run.document_title.clone(),
            phase: run.phase,
            abandoned: run.is_abandoned(),
            started_at: run.started_at,
            completed_at: run.completed_at,
            counts,
            failed,
            scope_creep,
            deviations,
            manual_verification,
            cards,
        })
    }
}

/// Markdown rendering of a report, for hand-off to test authors.
pub struct MarkdownReport<'a>(pub &'a RunReport);

impl fmt::Display for MarkdownReport<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let report = self.0;
        let title = report.document_title.as_deref().unwrap_or("Untitled document");
        writeln!(f, "# Run report: {title}")?;
        writeln!(f)?;
        writeln!(f, "- Run: `{}`", report.run_id)?;
        writeln!(f, "- Phase: {}", report.phase)?;
        if report.abandoned {
            writeln!(f, "- Abandoned: yes")?;
        }
        writeln!(f)?;

        let c = &report.counts;
        writeln!(f, "## Status")?;
        writeln!(f)?;
        writeln!(f, "| completed | failed | blocked | pending | in progress |")?;
        writeln!(f, "|---|---|---|---|---|")?;
        writeln!(
            f,
            "| {} | {} | {} | {} | {} |",
            c.completed, c.failed, c.blocked, c.pending, c.in_progress
        )?;

        if !report.failed.is_empty() {
            writeln!(f)?;
            writeln!(f, "## Failed tasks")?;
            writeln!(f)?;
            for failed in &report.failed {
                writeln!(f, "- {} {}: {}", failed.task_id, failed.title, failed.reason)?;
            }
        }

        if !report.scope_creep.is_empty() {
            writeln!(f)?;
            writeln!(f, "## Scope creep")?;
            writeln!(f)?;
            for entry in &report.scope_creep {
                writeln!(
                    f,
                    "- {} {} ({}, {})",
                    entry.task_id,
                    entry.title,
                    entry.approval.as_str(),
                    entry.status
                )?;
            }
        }

        if !report.manual_verification.is_empty() {
            writeln!(f)?;
            writeln!(f, "## Manual verification")?;
            writeln!(f)?;
            for check in &report.manual_verification {
                writeln!(f, "- [ ] {}: {}", check.subject, check.description)?;
            }
        }

        writeln!(f)?;
        writeln!(f, "## Scenarios")?;
        for card in &report.cards {
            writeln!(f)?;
            writeln!(f, "### {} {}", card.card.id, card.card.title)?;
            for scenario in &card.scenarios {
                writeln!(f)?;
                writeln!(f, "**{}** ({})", scenario.id, scenario.kind)?;
                writeln!(f, "- Given {}", scenario.given)?;
                writeln!(f, "- When {}", scenario.when)?;
                writeln!(f, "- Then {}", scenario.then)?;
            }
        }
        Ok(())
    }
}

pub fn render_markdown(report: &RunReport) -> String {
    MarkdownReport(report).to_string()
}
