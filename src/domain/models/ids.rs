//! Newtype wrappers for identifiers to ensure type safety.
//!
//! Requirement, task and card identifiers are derived from document order so
//! that building the same document twice yields the same identifiers.

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Create an identifier from a string.
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Get the inner string reference.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_owned())
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }
    };
}

string_id!(
    /// Identifier of an extracted requirement (`REQ-001`).
    RequirementId
);

string_id!(
    /// Identifier of a task (`TASK-001`, split children `TASK-001.2`).
    TaskId
);

string_id!(
    /// Identifier of a card (`CARD-TASK-001`).
    CardId
);

string_id!(
    /// Identifier of a scenario (`CARD-TASK-001/S2`).
    ScenarioId
);

impl RequirementId {
    /// Identifier for the requirement at the given 1-based document position.
    pub fn numbered(n: usize) -> Self {
        Self(format!("REQ-{n:03}"))
    }
}

impl TaskId {
    /// Identifier for the task at the given 1-based plan position.
    pub fn numbered(n: usize) -> Self {
        Self(format!("TASK-{n:03}"))
    }

    /// Identifier for the `part`-th child produced by splitting this task.
    pub fn child(&self, part: usize) -> Self {
        Self(format!("{}.{part}", self.0))
    }

    /// Plan position of a numbered id, ignoring any split suffix.
    pub fn number(&self) -> Option<usize> {
        let rest = self.0.strip_prefix("TASK-")?;
        let digits = rest.split('.').next()?;
        digits.parse().ok()
    }
}

impl CardId {
    /// The card derived from a task.
    pub fn for_task(task_id: &TaskId) -> Self {
        Self(format!("CARD-{task_id}"))
    }
}

impl ScenarioId {
    /// The `n`-th scenario of a card.
    pub fn for_card(card_id: &CardId, n: usize) -> Self {
        Self(format!("{card_id}/S{n}"))
    }
}
