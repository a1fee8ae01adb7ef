//! End-to-end workflow tests.
//!
//! These tests exercise the full lifecycle through the CLI binary (via
//! `assert_cmd`): init, plan, task execution with failures and scope creep,
//! finish, report and archive. Each test creates its own `TempDir`; the run
//! state written by the CLI is inspected through the library API afterwards.

use std::path::Path;

use assert_cmd::Command;
use serde_json::Value;
use tempfile::TempDir;

use specrun::adapters::json::JsonRunRepository;
use specrun::domain::models::{RunPhase, TaskStatus};
use specrun::domain::ports::RunRepository;

const DOCUMENT: &str = "# Inventory service

## Overview
Tracks stock levels for the warehouse.

## Requirements
- Create the stock table [id: table] [stage: setup]
- Record deliveries into the stock table [id: deliveries] [after: table]
- Report stock below the minimum level [after: deliveries]

## Edge Cases
- Reject deliveries with a negative quantity [after: deliveries]
";

// ============================================================================
// Test harness
// ============================================================================

mod harness {
    use super::*;

    /// Build an `assert_cmd::Command` pointing at the `specrun` binary with
    /// its working directory set to `dir`.
    pub fn specrun_cmd(dir: &Path) -> Command {
        let mut cmd = assert_cmd::cargo_bin_cmd!("specrun");
        cmd.current_dir(dir);
        cmd.env("NO_COLOR", "1");
        cmd
    }

    /// Run `specrun init` and write the requirements document.
    pub fn init_project(dir: &Path) {
        specrun_cmd(dir)
            .args(["init"])
            .assert()
            .success()
            .stdout(predicates::str::contains("initialized"));
        std::fs::write(dir.join("requirements.md"), DOCUMENT).unwrap();
    }

    /// Run a CLI command with `--json`, assert success, return parsed JSON.
    pub fn run_json(dir: &Path, args: &[&str]) -> Value {
        let output = specrun_cmd(dir)
            .args(args)
            .arg("--json")
            .assert()
            .success()
            .get_output()
            .stdout
            .clone();
        serde_json::from_slice(&output)
            .unwrap_or_else(|e| panic!("Failed to parse JSON from {args:?}: {e}"))
    }

    /// Run a CLI command with `--json`, assert failure, return the error text.
    pub fn run_json_err(dir: &Path, args: &[&str]) -> String {
        let output = specrun_cmd(dir)
            .args(args)
            .arg("--json")
            .assert()
            .failure()
            .get_output()
            .stdout
            .clone();
        let value: Value = serde_json::from_slice(&output)
            .unwrap_or_else(|e| panic!("Failed to parse JSON error from {args:?}: {e}"));
        value["error"].as_str().unwrap_or_default().to_string()
    }

    /// Start the next eligible task and return its id.
    pub fn next_task(dir: &Path) -> String {
        let out = run_json(dir, &["run", "next"]);
        out["task"]["id"]
            .as_str()
            .unwrap_or_else(|| panic!("no task started: {out}"))
            .to_string()
    }

    pub fn repo(dir: &Path) -> JsonRunRepository {
        JsonRunRepository::new(dir.join(".specrun"))
    }
}

use harness::*;

#[tokio::test]
async fn test_full_lifecycle_with_failure_and_retry() {
    let dir = TempDir::new().unwrap();
    init_project(dir.path());

    let plan = run_json(dir.path(), &["plan", "requirements.md", "--start"]);
    assert_eq!(plan["phase"], "implementation");
    assert_eq!(plan["tasks"].as_array().unwrap().len(), 4);
    let run_id = plan["run_id"].as_str().unwrap().to_string();

    assert_eq!(next_task(dir.path()), "TASK-001");
    run_json(dir.path(), &["run", "complete", "TASK-001"]);

    assert_eq!(next_task(dir.path()), "TASK-002");
    let failed = run_json(
        dir.path(),
        &["run", "fail", "TASK-002", "--reason", "scanner offline"],
    );
    assert_eq!(failed["task"]["status"], "failed");

    // Everything downstream of the failure is blocked.
    let eligible = run_json(dir.path(), &["run", "eligible"]);
    assert!(eligible["tasks"].as_array().unwrap().is_empty());

    run_json(dir.path(), &["run", "retry", "TASK-002"]);
    assert_eq!(next_task(dir.path()), "TASK-002");
    let completed = run_json(dir.path(), &["run", "complete", "TASK-002"]);
    let released: Vec<&str> = completed["newly_eligible"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(Value::as_str)
        .collect();
    assert_eq!(released, vec!["TASK-003", "TASK-004"]);

    for expected in ["TASK-003", "TASK-004"] {
        assert_eq!(next_task(dir.path()), expected);
        run_json(dir.path(), &["run", "complete", expected]);
    }
    let finished = run_json(dir.path(), &["run", "finish"]);
    assert_eq!(finished["phase"], "summary");

    let report = run_json(dir.path(), &["report", &run_id]);
    assert_eq!(report["counts"]["completed"], 4);
    assert_eq!(report["cards"].as_array().unwrap().len(), 4);
    let deviations = report["deviations"].as_array().unwrap();
    assert!(deviations
        .iter()
        .any(|d| d["kind"] == "task_retried" && d["task_id"] == "TASK-002"));

    let stored = repo(dir.path())
        .get(run_id.parse().unwrap())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.phase, RunPhase::Summary);
    assert!(stored
        .tasks
        .iter()
        .all(|t| t.status == TaskStatus::Completed));
}

#[tokio::test]
async fn test_scope_creep_requires_approval() {
    let dir = TempDir::new().unwrap();
    init_project(dir.path());
    run_json(dir.path(), &["plan", "requirements.md", "--start"]);

    let proposed = run_json(
        dir.path(),
        &["run", "propose", "Barcode import", "--after", "TASK-001"],
    );
    assert_eq!(proposed["task"]["id"], "TASK-005");
    assert_eq!(proposed["task"]["approval"], "pending");

    let err = run_json_err(dir.path(), &["run", "start", "TASK-005"]);
    assert!(err.contains("unapproved scope creep"), "unexpected error: {err}");

    run_json(dir.path(), &["run", "approve", "TASK-005"]);
    let runs = repo(dir.path()).list().await.unwrap();
    let run = repo(dir.path()).get(runs[0].id).await.unwrap().unwrap();
    assert_eq!(
        run.task(&"TASK-005".into()).unwrap().approval,
        specrun::domain::models::ScopeApproval::Approved
    );
}

#[test]
fn test_abandoned_run_still_reports() {
    let dir = TempDir::new().unwrap();
    init_project(dir.path());
    run_json(dir.path(), &["plan", "requirements.md", "--start"]);
    next_task(dir.path());

    let abandoned = run_json(
        dir.path(),
        &["run", "abandon", "--reason", "priorities changed"],
    );
    assert_eq!(abandoned["phase"], "summary");

    let report = run_json(dir.path(), &["report"]);
    assert_eq!(report["abandoned"], true);
    assert_eq!(report["failed"][0]["reason"], "cancelled");
    assert_eq!(report["deviations"][0]["kind"], "run_abandoned");
}

#[test]
fn test_markdown_report_and_archive() {
    let dir = TempDir::new().unwrap();
    init_project(dir.path());
    let plan = run_json(dir.path(), &["plan", "requirements.md", "--start"]);
    let run_id = plan["run_id"].as_str().unwrap().to_string();

    for _ in 0..4 {
        let id = next_task(dir.path());
        run_json(dir.path(), &["run", "complete", &id]);
    }
    run_json(dir.path(), &["run", "finish"]);

    specrun_cmd(dir.path())
        .args(["report", &run_id[..8]])
        .assert()
        .success()
        .stdout(predicates::str::contains("# Run report: Inventory service"))
        .stdout(predicates::str::contains("Given"));

    run_json(dir.path(), &["run", "archive"]);
    let listed = run_json(dir.path(), &["run", "list"]);
    assert_eq!(listed["total"], 0);

    // Archived runs stay reachable by full id.
    let report = run_json(dir.path(), &["report", &run_id]);
    assert_eq!(report["counts"]["completed"], 4);
}
