//! CLI integration tests for the specrun binary.
//! Tests each CLI command to validate interfaces function correctly.

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;
use std::path::Path;
use tempfile::TempDir;

// ============================================================
// Helper functions
// ============================================================

const DOCUMENT: &str = "# Todo

## Requirements
- Add items to the list [id: add]
- Remove items from the list [after: add]

## Performance
- The list renders within 100 ms for 1000 items

## Acceptance Criteria
- Items survive a restart
";

/// Build an `assert_cmd::Command` pointing at the `specrun` binary,
/// with its working directory set to `dir`.
fn specrun_cmd(dir: &Path) -> Command {
    let mut cmd = assert_cmd::cargo_bin_cmd!("specrun");
    cmd.current_dir(dir);
    cmd.env("NO_COLOR", "1");
    cmd
}

/// Run `specrun init` and write a requirements document next to it.
fn init_project(dir: &Path) {
    specrun_cmd(dir).args(["init"]).assert().success();
    std::fs::write(dir.join("todo.md"), DOCUMENT).unwrap();
}

/// Run a command with `--json`, assert success, and return the parsed
/// JSON value from stdout.
fn run_json(dir: &Path, args: &[&str]) -> Value {
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

// ============================================================
// init
// ============================================================

#[test]
fn test_init_creates_project() {
    let dir = TempDir::new().unwrap();
    let out = run_json(dir.path(), &["init"]);
    assert_eq!(out["success"], true);
    assert!(dir.path().join(".specrun/config.yaml").exists());
    assert!(dir.path().join(".specrun/runs").is_dir());
}

#[test]
fn test_init_twice_requires_force() {
    let dir = TempDir::new().unwrap();
    init_project(dir.path());

    let again = run_json(dir.path(), &["init"]);
    assert_eq!(again["success"], false);

    let forced = run_json(dir.path(), &["init", "--force"]);
    assert_eq!(forced["success"], true);
    assert!(forced["message"].as_str().unwrap().contains("reinitialized"));
}

// ============================================================
// extract
// ============================================================

#[test]
fn test_extract_classifies_requirements() {
    let dir = TempDir::new().unwrap();
    init_project(dir.path());

    let out = run_json(dir.path(), &["extract", "todo.md"]);
    assert_eq!(out["total"], 4);
    assert_eq!(out["document_title"], "Todo");
    let categories: Vec<&str> = out["requirements"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|r| r["category"].as_str())
        .collect();
    assert_eq!(
        categories,
        vec!["functional", "functional", "non-functional", "acceptance"]
    );
}

#[test]
fn test_extract_category_filter() {
    let dir = TempDir::new().unwrap();
    init_project(dir.path());

    let out = run_json(
        dir.path(),
        &["extract", "todo.md", "--category", "acceptance"],
    );
    assert_eq!(out["total"], 1);
    assert_eq!(out["requirements"][0]["id"], "REQ-004");
}

#[test]
fn test_extract_human_output_is_a_table() {
    let dir = TempDir::new().unwrap();
    init_project(dir.path());

    specrun_cmd(dir.path())
        .args(["extract", "todo.md"])
        .assert()
        .success()
        .stdout(predicate::str::contains("REQ-001"))
        .stdout(predicate::str::contains("4 requirement(s)"));
}

#[test]
fn test_extract_rejects_unstructured_document() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("notes.md"), "just some prose\n").unwrap();

    specrun_cmd(dir.path())
        .args(["extract", "notes.md"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Malformed document"));
}

#[test]
fn test_extract_reads_stdin() {
    let dir = TempDir::new().unwrap();
    let output = specrun_cmd(dir.path())
        .args(["extract", "-", "--json"])
        .write_stdin(DOCUMENT)
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let out: Value = serde_json::from_slice(&output).unwrap();
    assert_eq!(out["total"], 4);
}

// ============================================================
// plan
// ============================================================

#[test]
fn test_plan_stores_run_in_planning() {
    let dir = TempDir::new().unwrap();
    init_project(dir.path());

    let out = run_json(dir.path(), &["plan", "todo.md"]);
    assert_eq!(out["phase"], "planning");
    assert_eq!(out["stored"], true);

    let listed = run_json(dir.path(), &["run", "list"]);
    assert_eq!(listed["total"], 1);
    assert_eq!(listed["runs"][0]["id"], out["run_id"]);
}

#[test]
fn test_plan_dry_run_saves_nothing() {
    let dir = TempDir::new().unwrap();
    init_project(dir.path());

    let out = run_json(dir.path(), &["plan", "todo.md", "--dry-run"]);
    assert_eq!(out["stored"], false);
    let listed = run_json(dir.path(), &["run", "list"]);
    assert_eq!(listed["total"], 0);
}

#[test]
fn test_plan_orders_dependencies_first() {
    let dir = TempDir::new().unwrap();
    init_project(dir.path());

    let out = run_json(dir.path(), &["plan", "todo.md"]);
    let ids: Vec<&str> = out["tasks"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|t| t["id"].as_str())
        .collect();
    let add = ids.iter().position(|id| *id == "TASK-001").unwrap();
    let remove = ids.iter().position(|id| *id == "TASK-002").unwrap();
    assert!(add < remove);
}

#[test]
fn test_plan_rejects_cycles() {
    let dir = TempDir::new().unwrap();
    init_project(dir.path());
    std::fs::write(
        dir.path().join("cycle.md"),
        "## Requirements\n- A [id: a] [after: b]\n- B [id: b] [after: a]\n",
    )
    .unwrap();

    let output = specrun_cmd(dir.path())
        .args(["plan", "cycle.md", "--json"])
        .assert()
        .failure()
        .get_output()
        .stdout
        .clone();
    let err: Value = serde_json::from_slice(&output).unwrap();
    assert!(err["causes"]
        .as_array()
        .unwrap()
        .iter()
        .any(|c| c.as_str().unwrap_or_default().contains("cycle")));
}

#[test]
fn test_plan_max_points_splits_tasks() {
    let dir = TempDir::new().unwrap();
    init_project(dir.path());
    std::fs::write(
        dir.path().join("big.md"),
        "## Requirements\n- Migrate the database [estimate: 5]\n",
    )
    .unwrap();

    let out = run_json(dir.path(), &["plan", "big.md", "--max-points", "2"]);
    let ids: Vec<&str> = out["tasks"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|t| t["id"].as_str())
        .collect();
    assert_eq!(ids, vec!["TASK-001.1", "TASK-001.2", "TASK-001.3"]);
}

// ============================================================
// run / report errors
// ============================================================

#[test]
fn test_run_without_runs_fails() {
    let dir = TempDir::new().unwrap();
    init_project(dir.path());

    specrun_cmd(dir.path())
        .args(["run", "next"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("No active runs"));
}

#[test]
fn test_run_next_before_begin_is_wrong_phase() {
    let dir = TempDir::new().unwrap();
    init_project(dir.path());
    run_json(dir.path(), &["plan", "todo.md"]);

    specrun_cmd(dir.path())
        .args(["run", "next"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not allowed in planning phase"));

    let begun = run_json(dir.path(), &["run", "begin"]);
    assert_eq!(begun["phase"], "implementation");
}

#[test]
fn test_report_before_summary_fails() {
    let dir = TempDir::new().unwrap();
    init_project(dir.path());
    run_json(dir.path(), &["plan", "todo.md", "--start"]);

    specrun_cmd(dir.path())
        .args(["report"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("implementation phase"));
}

#[test]
fn test_run_fail_with_short_reason_flag() {
    let dir = TempDir::new().unwrap();
    init_project(dir.path());
    run_json(dir.path(), &["plan", "todo.md", "--start"]);
    run_json(dir.path(), &["run", "start", "TASK-001"]);

    let failed = run_json(dir.path(), &["run", "fail", "TASK-001", "-r", "disk full"]);
    assert_eq!(failed["task"]["status"], "failed");
    assert_eq!(failed["task"]["failure_reason"], "disk full");

    let abandoned = run_json(dir.path(), &["run", "abandon", "-r", "out of time"]);
    assert_eq!(abandoned["phase"], "summary");
}

#[test]
fn test_run_show_displays_tasks() {
    let dir = TempDir::new().unwrap();
    init_project(dir.path());
    run_json(dir.path(), &["plan", "todo.md", "--start"]);

    specrun_cmd(dir.path())
        .args(["run", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Phase:        implementation"))
        .stdout(predicate::str::contains("TASK-004"));
}

#[test]
fn test_invalid_config_is_reported() {
    let dir = TempDir::new().unwrap();
    init_project(dir.path());
    std::fs::write(
        dir.path().join(".specrun/local.yaml"),
        "planning:\n  max_task_points: 0\n",
    )
    .unwrap();

    specrun_cmd(dir.path())
        .args(["plan", "todo.md"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to load configuration"));
}

#[test]
fn test_env_override_applies() {
    let dir = TempDir::new().unwrap();
    init_project(dir.path());
    std::fs::write(
        dir.path().join("sections.md"),
        "## Requirements\n- Add items\n- Remove items\n\n## Performance\n- Render quickly\n",
    )
    .unwrap();

    let output = specrun_cmd(dir.path())
        .env("SPECRUN_PLANNING__GROUPING", "by_section")
        .args(["plan", "sections.md", "--dry-run", "--json"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let out: Value = serde_json::from_slice(&output).unwrap();
    assert_eq!(out["tasks"].as_array().unwrap().len(), 2);
}
