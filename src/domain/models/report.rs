//! Run report model: the hand-off artifact produced at the summary phase.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::card::{Card, Scenario};
use super::ids::{RequirementId, TaskId};
use super::task::{ScopeApproval, TaskStatus};
use super::workflow_run::RunPhase;

/// Task counts per status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCounts {
    pub completed: usize,
    pub failed: usize,
    pub blocked: usize,
    pub pending: usize,
    pub in_progress: usize,
}

impl StatusCounts {
    pub fn add(&mut self, status: TaskStatus) {
        match status {
            TaskStatus::Completed => self.completed += 1,
            TaskStatus::Failed => self.failed += 1,
            TaskStatus::Blocked => self.blocked += 1,
            TaskStatus::Pending => self.pending += 1,
            TaskStatus::InProgress => self.in_progress += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.completed + self.failed + self.blocked + self.pending + self.in_progress
    }
}

/// A failed task and why it failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedTask {
    pub task_id: TaskId,
    pub title: String,
    pub reason: String,
}

/// A task proposed outside the plan and what happened to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScopeCreepEntry {
    pub task_id: TaskId,
    pub title: String,
    pub approval: ScopeApproval,
    pub status: TaskStatus,
}

/// Something that did not go according to plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Deviation {
    TaskFailed { task_id: TaskId, reason: String },
    TaskRetried { task_id: TaskId, attempts: u32 },
    ExternallyBlocked { task_id: TaskId, detail: String },
    ScopeCreep { task_id: TaskId, approval: ScopeApproval },
    LowConfidenceRequirement { requirement_id: RequirementId },
    RunAbandoned { reason: String },
}

/// Something a person has to check by hand.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManualCheck {
    /// Requirement, task or scenario id the check is about
    pub subject: String,
    pub description: String,
}

/// A card with its scenarios.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardReport {
    pub card: Card,
    pub scenarios: Vec<Scenario>,
}

/// Final structured report of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub document_title: Option<String>,
    pub phase: RunPhase,
    pub abandoned: bool,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub counts: StatusCounts,
    pub failed: Vec<FailedTask>,
    pub scope_creep: Vec<ScopeCreepEntry>,
    pub deviations: Vec<Deviation>,
    pub manual_verification: Vec<ManualCheck>,
    pub cards: Vec<CardReport>,
}

impl RunReport {
    /// All scenarios across cards, in card order.
    pub fn scenarios(&self) -> impl Iterator<Item = &Scenario> {
        self.cards.iter().flat_map(|c| c.scenarios.iter())
    }
}
