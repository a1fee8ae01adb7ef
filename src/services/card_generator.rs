//! Card and acceptance-scenario generation.
//!
//! Each task yields exactly one card. Scenarios follow a fixed policy:
//! one happy path always; an edge case and an error case for every
//! requirement with boundary or validation language (or filed under an
//! edge-case heading); a security scenario when the task is flagged as
//! handling external input; an idempotency scenario when repetition is
//! called out.

use tracing::{debug, instrument};

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{
    Card, CardId, CardReport, Requirement, RequirementCategory, Scenario, ScenarioId,
    ScenarioKind, Task, WorkflowRun,
};

const BOUNDARY: &[&str] = &[
    "empty", "zero", "maximum", "minimum", "limit", "boundary", "overflow", "exceed",
    "at most", "at least", "timeout", "large",
];

const VALIDATION: &[&str] = &[
    "invalid", "reject", "error", "fail", "malformed", "validate", "must not", "missing",
    "denied", "unauthorized",
];

const IDEMPOTENCY: &[&str] = &["idempotent", "retry", "repeat", "duplicate"];

fn mentions(text: &str, keywords: &[&str]) -> bool {
    let text = text.to_lowercase();
    keywords.iter().any(|k| text.contains(k))
}

/// Whether a requirement calls for edge and error scenarios.
pub fn needs_edge_scenarios(requirement: &Requirement) -> bool {
    requirement.category == RequirementCategory::EdgeCase
        || mentions(&requirement.text, BOUNDARY)
        || mentions(&requirement.text, VALIDATION)
}

/// Generates cards and scenarios from tasks.
#[derive(Debug, Clone, Copy, Default)]
pub struct CardGenerator;

impl CardGenerator {
    pub fn new() -> Self {
        Self
    }

    /// Generate the card for one task of a run.
    ///
    /// Fails with `IncompleteCard` when the task has neither requirements
    /// nor a description to derive a scenario from.
    #[instrument(skip_all, fields(task_id = %task.id))]
    pub fn generate(&self, task: &Task, run: &WorkflowRun) -> DomainResult<(Card, Vec<Scenario>)> {
        let requirements = run.requirements_for(task);
        let description = task.description.trim();
        if requirements.is_empty() && description.is_empty() {
            return Err(DomainError::IncompleteCard(task.id.clone()));
        }

        let scope_in: Vec<String> = if requirements.is_empty() {
            vec![description.to_string()]
        } else {
            requirements.iter().map(|r| r.text.clone()).collect()
        };
        let card = Card {
            id: CardId::for_task(&task.id),
            title: task.title.clone(),
            scope_in,
            scope_out: scope_out(task, run),
            task_id: task.id.clone(),
        };

        let scenarios = ScenarioSet::new(&card, precondition(task)).build(task, &requirements);
        if !scenarios.iter().any(|s| s.kind == ScenarioKind::HappyPath) {
            return Err(DomainError::IncompleteCard(task.id.clone()));
        }

        debug!(scenarios = scenarios.len(), "card generated");
        Ok((card, scenarios))
    }

    /// Cards for every task that belongs to the run's work, in execution
    /// order. Held or rejected scope creep gets no card.
    pub fn generate_all(&self, run: &WorkflowRun) -> DomainResult<Vec<CardReport>> {
        run.ordered_tasks()
            .into_iter()
            .filter(|t| !t.is_held())
            .map(|task| {
                self.generate(task, run)
                    .map(|(card, scenarios)| CardReport { card, scenarios })
            })
            .collect()
    }
}

/// Work a card explicitly leaves to other cards.
fn scope_out(task: &Task, run: &WorkflowRun) -> Vec<String> {
    let mut out: Vec<String> = run
        .direct_dependents(&task.id)
        .into_iter()
        .filter(|t| !t.is_held())
        .map(|t| format!("{}: {}", t.id, t.title))
        .collect();

    if let Some(parent) = &task.parent {
        out.extend(
            run.tasks
                .iter()
                .filter(|t| t.parent.as_ref() == Some(parent) && t.id != task.id)
                .filter(|t| !t.depends_on.contains(&task.id))
                .map(|t| format!("{}: {}", t.id, t.title)),
        );
    }
    out
}

fn precondition(task: &Task) -> String {
    if task.depends_on.is_empty() {
        "a clean working environment".to_string()
    } else {
        let deps: Vec<&str> = task.depends_on.iter().map(|d| d.as_str()).collect();
        format!("{} completed", deps.join(", "))
    }
}

/// Accumulates numbered scenarios for one card.
struct ScenarioSet<'a> {
    card: &'a Card,
    given: String,
    scenarios: Vec<Scenario>,
}

impl<'a> ScenarioSet<'a> {
    fn new(card: &'a Card, given: String) -> Self {
        Self {
            card,
            given,
            scenarios: Vec::new(),
        }
    }

    fn push(&mut self, kind: ScenarioKind, given: Option<String>, when: String, then: String) {
        let id = ScenarioId::for_card(&self.card.id, self.scenarios.len() + 1);
        self.scenarios.push(Scenario {
            id,
            card_id: self.card.id.clone(),
            kind,
            given: given.unwrap_or_else(|| self.given.clone()),
            when,
            then,
        });
    }

    fn build(mut self, task: &Task, requirements: &[&Requirement]) -> Vec<Scenario> {
        let expected = self.card.scope_in.join("; ");
        self.push(
            ScenarioKind::HappyPath,
            None,
            format!("\"{}\" is exercised with valid input", task.title),
            expected,
        );

        for req in requirements.iter().filter(|r| needs_edge_scenarios(r)) {
            self.push(
                ScenarioKind::EdgeCase,
                None,
                format!("input sits at the boundary described by {}", req.id),
                format!("the behaviour stays correct: {}", req.text),
            );
            self.push(
                ScenarioKind::ErrorCase,
                None,
                format!("the condition in {} is violated", req.id),
                "a specific error is reported and no partial state is left behind".to_string(),
            );
        }

        if task.handles_external_input {
            self.push(
                ScenarioKind::Security,
                Some(format!("untrusted input or credentials reach \"{}\"", task.title)),
                "malformed, oversized or unauthorized input is supplied".to_string(),
                "the input is rejected and no secret is exposed in output or logs".to_string(),
            );
        }

        if let Some(req) = requirements
            .iter()
            .find(|r| mentions(&r.text, IDEMPOTENCY))
        {
            self.push(
                ScenarioKind::Idempotency,
                None,
                format!("the operation from {} is repeated", req.id),
                "the outcome matches performing it once".to_string(),
            );
        }

        self.scenarios
    }
}
