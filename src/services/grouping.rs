//! Built-in requirement grouping strategies.

use crate::domain::models::{generate_title, GroupingMode, Requirement, Stage};
use crate::domain::ports::{GroupingStrategy, TaskDraft};

/// One task per requirement.
#[derive(Debug, Clone, Copy, Default)]
pub struct PerRequirement;

impl GroupingStrategy for PerRequirement {
    fn name(&self) -> &'static str {
        "per_requirement"
    }

    fn group(&self, requirements: &[Requirement]) -> Vec<TaskDraft> {
        (0..requirements.len())
            .map(|i| draft_from(requirements, vec![i]))
            .collect()
    }
}

/// Consecutive requirements under the same heading form one task.
///
/// Acceptance requirements never start a group of their own when a preceding
/// group exists in the same section; they ride along with it.
#[derive(Debug, Clone, Copy, Default)]
pub struct BySection;

impl GroupingStrategy for BySection {
    fn name(&self) -> &'static str {
        "by_section"
    }

    fn group(&self, requirements: &[Requirement]) -> Vec<TaskDraft> {
        let mut groups: Vec<Vec<usize>> = Vec::new();
        for (i, req) in requirements.iter().enumerate() {
            let current = groups.last();
            let same_section = current
                .and_then(|g| g.last())
                .is_some_and(|&prev| requirements[prev].section == req.section);
            // Depending on a key declared in the group cannot share its task
            let depends_on_group = current.is_some_and(|g| {
                g.iter().any(|&member| {
                    requirements[member]
                        .tags
                        .key
                        .as_ref()
                        .is_some_and(|key| req.tags.after.contains(key))
                })
            });
            // A requirement declaring its own key is its own artifact
            let starts_new = !same_section || req.tags.key.is_some() || depends_on_group;
            match groups.last_mut() {
                Some(group) if !starts_new => group.push(i),
                _ => groups.push(vec![i]),
            }
        }

        groups
            .into_iter()
            .map(|indices| draft_from(requirements, indices))
            .collect()
    }
}

/// Strategy selected by configuration.
pub fn strategy_for(mode: GroupingMode) -> Box<dyn GroupingStrategy> {
    match mode {
        GroupingMode::PerRequirement => Box::new(PerRequirement),
        GroupingMode::BySection => Box::new(BySection),
    }
}

fn draft_from(requirements: &[Requirement], indices: Vec<usize>) -> TaskDraft {
    let members: Vec<&Requirement> = indices.iter().map(|&i| &requirements[i]).collect();

    let title = match members.as_slice() {
        [only] => generate_title(&only.text),
        [first, ..] if !first.section.is_empty() => {
            format!("{}: {}", first.section, generate_title(&first.text))
        }
        [first, ..] => generate_title(&first.text),
        [] => "Untitled task".to_string(),
    };

    TaskDraft {
        title,
        description: members
            .iter()
            .map(|r| r.text.as_str())
            .collect::<Vec<_>>()
            .join("\n"),
        key: members.iter().find_map(|r| r.tags.key.clone()),
        stage: members
            .iter()
            .filter_map(|r| r.tags.stage)
            .max()
            .unwrap_or(Stage::Core),
        handles_external_input: members.iter().any(|r| r.tags.external_input),
        requirements: indices,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{RequirementCategory, RequirementId, RequirementTags};

    fn req(n: usize, section: &str, text: &str, tags: RequirementTags) -> Requirement {
        Requirement {
            id: RequirementId::numbered(n),
            text: text.to_string(),
            category: RequirementCategory::Functional,
            source_offset: n * 10,
            section: section.to_string(),
            low_confidence: false,
            tags,
        }
    }

    fn sample() -> Vec<Requirement> {
        vec![
            req(1, "Setup", "Create schema", RequirementTags {
                stage: Some(Stage::Setup),
                ..RequirementTags::default()
            }),
            req(2, "Setup", "Seed data", RequirementTags::default()),
            req(3, "Requirements", "Login form", RequirementTags {
                external_input: true,
                ..RequirementTags::default()
            }),
            req(4, "Requirements", "Logout button", RequirementTags {
                key: Some("logout".to_string()),
                ..RequirementTags::default()
            }),
        ]
    }

    #[test]
    fn test_per_requirement_keeps_document_order() {
        let drafts = PerRequirement.group(&sample());
        assert_eq!(drafts.len(), 4);
        assert_eq!(drafts[0].title, "Create schema");
        assert_eq!(drafts[0].stage, Stage::Setup);
        assert_eq!(drafts[1].stage, Stage::Core);
        assert!(drafts[2].handles_external_input);
        assert_eq!(drafts[3].key.as_deref(), Some("logout"));
    }

    #[test]
    fn test_by_section_groups_neighbours() {
        let drafts = BySection.group(&sample());
        let groups: Vec<Vec<usize>> = drafts.iter().map(|d| d.requirements.clone()).collect();
        assert_eq!(groups, vec![vec![0, 1], vec![2], vec![3]]);
        assert_eq!(drafts[0].title, "Setup: Create schema");
        assert_eq!(drafts[0].description, "Create schema\nSeed data");
        assert_eq!(drafts[0].stage, Stage::Setup);
    }

    #[test]
    fn test_by_section_splits_on_dependency_inside_group() {
        let requirements = vec![
            req(1, "Requirements", "Create the store", RequirementTags {
                key: Some("store".to_string()),
                ..RequirementTags::default()
            }),
            req(2, "Requirements", "Read from the store", RequirementTags {
                after: vec!["store".to_string()],
                ..RequirementTags::default()
            }),
            req(3, "Requirements", "Show totals", RequirementTags::default()),
        ];
        let groups: Vec<Vec<usize>> = BySection
            .group(&requirements)
            .iter()
            .map(|d| d.requirements.clone())
            .collect();
        assert_eq!(groups, vec![vec![0], vec![1, 2]]);
    }

    #[test]
    fn test_strategy_for_mode() {
        assert_eq!(strategy_for(GroupingMode::BySection).name(), "by_section");
        assert_eq!(strategy_for(GroupingMode::PerRequirement).name(), "per_requirement");
    }
}
