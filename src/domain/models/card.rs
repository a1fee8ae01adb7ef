//! Card and scenario models.
//!
//! A card packages one task for hand-off; scenarios are the
//! given/when/then acceptance seeds attached to it.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::ids::{CardId, ScenarioId, TaskId};

/// Kind of acceptance scenario.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScenarioKind {
    HappyPath,
    EdgeCase,
    ErrorCase,
    Security,
    Idempotency,
}

impl ScenarioKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::HappyPath => "happy_path",
            Self::EdgeCase => "edge_case",
            Self::ErrorCase => "error_case",
            Self::Security => "security",
            Self::Idempotency => "idempotency",
        }
    }
}

impl fmt::Display for ScenarioKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A deliverable-sized packaging of a task. Immutable after generation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Card {
    pub id: CardId,
    pub title: String,
    pub scope_in: Vec<String>,
    pub scope_out: Vec<String>,
    pub task_id: TaskId,
}

/// A precondition/action/outcome triple.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scenario {
    pub id: ScenarioId,
    pub card_id: CardId,
    pub kind: ScenarioKind,
    pub given: String,
    pub when: String,
    pub then: String,
}
