//! Integration tests for the workflow engine.
//!
//! These tests drive whole runs through the public API: extraction,
//! planning, execution with failures and retries, scope creep, abandonment
//! and the final report, persisting through the JSON repository between
//! steps the way the CLI does.

use specrun::adapters::json::JsonRunRepository;
use specrun::domain::models::{
    BlockReason, Deviation, PlanningConfig, RunPhase, ScenarioKind, ScopeApproval, TaskId,
    TaskStatus, WorkflowRun,
};
use specrun::domain::ports::RunRepository;
use specrun::domain::DomainError;
use specrun::services::{Outcome, ReportAggregator, TaskProposal, WorkflowEngine, CANCELLED};
use tempfile::TempDir;

const THREE: &str = "# Notes app

## Overview
A small notes service.

## Requirements
- Create notes
- Edit notes
- Delete notes
";

const CHAIN: &str = "# Pipeline

## Requirements
- Provision the store [id: store]
- Import records into the store [id: import] [after: store]
- Publish the imported records [after: import]
";

fn engine() -> WorkflowEngine {
    WorkflowEngine::new(PlanningConfig::default())
}

fn id(n: usize) -> TaskId {
    TaskId::numbered(n)
}

/// Analyze, plan and enter implementation.
fn implementing(engine: &WorkflowEngine, document: &str) -> WorkflowRun {
    let mut run = engine.analyze(document).unwrap();
    engine.plan(&mut run).unwrap();
    engine.start_implementation(&mut run).unwrap();
    run
}

fn complete(engine: &WorkflowEngine, run: &mut WorkflowRun, task: &TaskId) {
    engine.start_task(run, task).unwrap();
    engine
        .report_outcome(run, task, Outcome::Completed, None)
        .unwrap();
}

#[test]
fn test_independent_requirements_run_to_summary() {
    let engine = engine();
    let mut run = implementing(&engine, THREE);
    assert_eq!(run.tasks.len(), 3);

    while let Some(task) = engine.next_eligible_task(&mut run).unwrap() {
        let task_id = task.id.clone();
        engine
            .report_outcome(&mut run, &task_id, Outcome::Completed, None)
            .unwrap();
    }
    engine.finish(&mut run).unwrap();
    assert_eq!(run.phase, RunPhase::Summary);

    let report = ReportAggregator::new().aggregate(&run).unwrap();
    assert_eq!(report.counts.completed, 3);
    assert_eq!(report.counts.total(), 3);
    assert!(report.failed.is_empty());
    assert_eq!(report.cards.len(), 3);
    for card in &report.cards {
        assert!(card
            .scenarios
            .iter()
            .any(|s| s.kind == ScenarioKind::HappyPath));
    }
}

#[test]
fn test_failure_blocks_downstream_until_retry_succeeds() {
    let engine = engine();
    let mut run = implementing(&engine, CHAIN);

    complete(&engine, &mut run, &id(1));
    engine.start_task(&mut run, &id(2)).unwrap();
    engine
        .report_outcome(&mut run, &id(2), Outcome::Failed, Some("import timed out"))
        .unwrap();

    let downstream = run.task(&id(3)).unwrap();
    assert_eq!(downstream.status, TaskStatus::Blocked);
    assert_eq!(downstream.block_reason, Some(BlockReason::Dependency(id(2))));
    assert!(engine.eligible_tasks(&run).is_empty());

    // Only the failed task itself can be retried.
    assert!(matches!(
        engine.retry_task(&mut run, &id(3)),
        Err(DomainError::ValidationFailed(_))
    ));
    let transition = engine.retry_task(&mut run, &id(2)).unwrap();
    assert_eq!(transition.newly_eligible, vec![id(2)]);
    assert_eq!(run.task(&id(3)).unwrap().status, TaskStatus::Blocked);

    engine.start_task(&mut run, &id(2)).unwrap();
    let transition = engine
        .report_outcome(&mut run, &id(2), Outcome::Completed, None)
        .unwrap();
    assert_eq!(transition.newly_eligible, vec![id(3)]);

    complete(&engine, &mut run, &id(3));
    engine.finish(&mut run).unwrap();

    let report = ReportAggregator::new().aggregate(&run).unwrap();
    assert_eq!(report.counts.completed, 3);
    assert!(report.deviations.contains(&Deviation::TaskRetried {
        task_id: id(2),
        attempts: 2,
    }));
}

#[test]
fn test_failed_task_is_terminal_for_finish() {
    let engine = engine();
    let mut run = implementing(&engine, CHAIN);

    complete(&engine, &mut run, &id(1));
    engine.start_task(&mut run, &id(2)).unwrap();
    engine
        .report_outcome(&mut run, &id(2), Outcome::Failed, Some("bad data"))
        .unwrap();

    // TASK-003 is blocked, which is not terminal.
    assert!(matches!(
        engine.finish(&mut run),
        Err(DomainError::InvalidPhaseTransition { .. })
    ));

    engine.abandon(&mut run, "giving up").unwrap();
    let report = ReportAggregator::new().aggregate(&run).unwrap();
    assert!(report.abandoned);
    assert_eq!(report.counts.failed, 1);
    assert_eq!(report.counts.blocked, 1);
    assert_eq!(report.failed[0].reason, "bad data");
    assert_eq!(
        report.deviations.first(),
        Some(&Deviation::RunAbandoned {
            reason: "giving up".to_string()
        })
    );
}

#[test]
fn test_only_one_task_in_progress() {
    let engine = engine();
    let mut run = implementing(&engine, THREE);

    engine.start_task(&mut run, &id(1)).unwrap();
    let err = engine.start_task(&mut run, &id(2)).unwrap_err();
    assert!(matches!(
        err,
        DomainError::ConcurrentTaskViolation { ref active, .. } if *active == id(1)
    ));
    assert_eq!(run.active_tasks().count(), 1);
}

#[test]
fn test_dependency_must_complete_first() {
    let engine = engine();
    let mut run = implementing(&engine, CHAIN);

    let err = engine.start_task(&mut run, &id(3)).unwrap_err();
    assert!(matches!(err, DomainError::DependencyNotMet { .. }));
}

#[test]
fn test_scope_creep_is_held_until_approved() {
    let engine = engine();
    let mut run = implementing(&engine, THREE);
    complete(&engine, &mut run, &id(1));

    let ids = engine
        .propose_task(
            &mut run,
            TaskProposal::new("Export notes as PDF").depending_on(id(1)),
        )
        .unwrap();
    assert_eq!(ids, vec![id(4)]);
    let proposed = run.task(&id(4)).unwrap();
    assert!(proposed.scope_creep);
    assert_eq!(proposed.approval, ScopeApproval::Pending);

    assert!(matches!(
        engine.start_task(&mut run, &id(4)),
        Err(DomainError::ScopeCreepUnapproved(_))
    ));
    assert!(!engine.eligible_tasks(&run).iter().any(|t| t.id == id(4)));

    assert!(engine.approve_scope_creep(&mut run, &id(4)).unwrap());
    complete(&engine, &mut run, &id(4));
    complete(&engine, &mut run, &id(2));
    complete(&engine, &mut run, &id(3));
    engine.finish(&mut run).unwrap();

    let report = ReportAggregator::new().aggregate(&run).unwrap();
    assert_eq!(report.counts.completed, 4);
    assert_eq!(report.scope_creep.len(), 1);
    assert_eq!(report.scope_creep[0].approval, ScopeApproval::Approved);
}

#[test]
fn test_rejected_scope_creep_does_not_gate_finish() {
    let engine = engine();
    let mut run = implementing(&engine, THREE);

    engine
        .propose_task(&mut run, TaskProposal::new("Sync to the cloud"))
        .unwrap();
    engine.reject_scope_creep(&mut run, &id(4)).unwrap();

    for n in 1..=3 {
        complete(&engine, &mut run, &id(n));
    }
    engine.finish(&mut run).unwrap();

    let report = ReportAggregator::new().aggregate(&run).unwrap();
    assert_eq!(report.counts.total(), 3);
    assert!(report.cards.iter().all(|c| c.card.task_id != id(4)));
    assert_eq!(report.scope_creep[0].approval, ScopeApproval::Rejected);
}

#[test]
fn test_cyclic_plan_is_rejected() {
    let engine = engine();
    let mut run = engine
        .analyze("## Requirements\n- A needs B [id: a] [after: b]\n- B needs A [id: b] [after: a]\n")
        .unwrap();

    let err = engine.plan(&mut run).unwrap_err();
    assert!(matches!(err, DomainError::CyclicDependency(_)));
    assert_eq!(run.phase, RunPhase::Analysis);
}

#[test]
fn test_abandon_cancels_active_task() {
    let engine = engine();
    let mut run = implementing(&engine, CHAIN);
    engine.start_task(&mut run, &id(1)).unwrap();

    engine.abandon(&mut run, "requirements changed").unwrap();
    assert_eq!(run.phase, RunPhase::Summary);
    let first = run.task(&id(1)).unwrap();
    assert_eq!(first.status, TaskStatus::Failed);
    assert_eq!(first.failure_reason.as_deref(), Some(CANCELLED));
    assert_eq!(run.task(&id(2)).unwrap().status, TaskStatus::Blocked);

    assert!(matches!(
        engine.abandon(&mut run, "again"),
        Err(DomainError::WrongPhase { .. })
    ));
}

#[test]
fn test_report_requires_summary_and_is_repeatable() {
    let engine = engine();
    let mut run = implementing(&engine, THREE);
    let aggregator = ReportAggregator::new();

    assert!(matches!(
        aggregator.aggregate(&run),
        Err(DomainError::WrongPhase { .. })
    ));

    for n in 1..=3 {
        complete(&engine, &mut run, &id(n));
    }
    engine.finish(&mut run).unwrap();

    let first = aggregator.aggregate(&run).unwrap();
    let second = aggregator.aggregate(&run).unwrap();
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_run_survives_persistence_between_steps() {
    let dir = TempDir::new().unwrap();
    let repo = JsonRunRepository::new(dir.path());
    let engine = engine();

    let mut run = implementing(&engine, CHAIN);
    let run_id = run.id;
    repo.save(&run).await.unwrap();

    for n in 1..=3 {
        let mut loaded = repo.get(run_id).await.unwrap().unwrap();
        complete(&engine, &mut loaded, &id(n));
        repo.save(&loaded).await.unwrap();
    }

    run = repo.get(run_id).await.unwrap().unwrap();
    engine.finish(&mut run).unwrap();
    repo.save(&run).await.unwrap();
    repo.archive(run_id).await.unwrap();

    assert!(repo.get(run_id).await.unwrap().is_none());
    let archived = repo.get_archived(run_id).await.unwrap().unwrap();
    assert_eq!(archived.phase, RunPhase::Summary);
    assert!(repo.list().await.unwrap().is_empty());
}
