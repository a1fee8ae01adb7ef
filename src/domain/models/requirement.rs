//! Requirement domain model.
//!
//! Requirements are atomic, classified spans of a requirements document.
//! They are created only by the extractor and are immutable afterwards;
//! tasks refer to them by id.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::ids::RequirementId;
use super::task::Stage;

/// Classification of a requirement, taken from the section it appears in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RequirementCategory {
    /// Behavior the system must provide.
    Functional,
    /// Quality attributes: performance, security, constraints.
    NonFunctional,
    /// Boundary, failure and error-handling behavior.
    EdgeCase,
    /// Criteria the finished work is accepted against.
    Acceptance,
}

impl RequirementCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Functional => "functional",
            Self::NonFunctional => "non-functional",
            Self::EdgeCase => "edge-case",
            Self::Acceptance => "acceptance",
        }
    }
}

impl fmt::Display for RequirementCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structural markers attached to a requirement span.
///
/// Written inline as `[id: key]`, `[after: a, b]`, `[stage: setup]`,
/// `[estimate: 3]`, `[input]` or `[credentials]`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequirementTags {
    /// Name of the artifact/task this requirement produces.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    /// Explicit references to other tasks' keys.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub after: Vec<String>,
    /// Declared ordering stage.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stage: Option<Stage>,
    /// Declared size in points.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimate: Option<u32>,
    /// Touches externally supplied input or credentials.
    #[serde(default)]
    pub external_input: bool,
}

/// An atomic, classified span of text extracted from a requirements document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Requirement {
    pub id: RequirementId,
    /// The span text with structural tags removed.
    pub text: String,
    pub category: RequirementCategory,
    /// Byte offset of the span in the source document.
    pub source_offset: usize,
    /// Heading the span was found under (empty before the first heading).
    pub section: String,
    /// Set when the span could not be classified by its heading.
    #[serde(default)]
    pub low_confidence: bool,
    #[serde(default)]
    pub tags: RequirementTags,
}

impl Requirement {
    /// Points this requirement contributes to a task estimate.
    pub fn points(&self, default_points: u32) -> u32 {
        self.tags.estimate.unwrap_or(default_points).max(1)
    }
}
