//! Requirement extraction.
//!
//! A section tokenizer with a fixed grammar of recognised headings. Each
//! list item or paragraph under a heading becomes one `Requirement`,
//! classified by the heading it sits under. Nothing is inferred from the
//! meaning of the text: unrecognised spans are kept as low-confidence
//! functional requirements instead of being dropped.

use tracing::{debug, warn};

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{
    Requirement, RequirementCategory, RequirementId, RequirementTags, Stage,
};

/// What a heading introduces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SectionKind {
    /// Text before the first heading.
    Preamble,
    /// Narrative context; produces no requirements.
    Overview,
    Category(RequirementCategory),
    Unrecognized,
}

impl SectionKind {
    fn classify(heading: &str) -> Self {
        const NON_FUNCTIONAL: &[&str] = &[
            "non-functional",
            "nonfunctional",
            "non functional",
            "performance",
            "security",
            "constraint",
            "quality",
        ];
        const EDGE_CASE: &[&str] = &[
            "edge case",
            "edge-case",
            "boundary",
            "corner case",
            "error handling",
            "failure mode",
        ];
        const ACCEPTANCE: &[&str] = &["acceptance", "definition of done", "success criteria"];
        const OVERVIEW: &[&str] = &[
            "overview",
            "summary",
            "purpose",
            "background",
            "introduction",
            "context",
        ];
        const FUNCTIONAL: &[&str] = &[
            "requirement",
            "feature",
            "functional",
            "scope",
            "user stor",
            "task",
        ];

        let heading = heading.to_lowercase();
        let matches = |keywords: &[&str]| keywords.iter().any(|k| heading.contains(k));

        if matches(NON_FUNCTIONAL) {
            Self::Category(RequirementCategory::NonFunctional)
        } else if matches(EDGE_CASE) {
            Self::Category(RequirementCategory::EdgeCase)
        } else if matches(ACCEPTANCE) {
            Self::Category(RequirementCategory::Acceptance)
        } else if matches(OVERVIEW) {
            Self::Overview
        } else if matches(FUNCTIONAL) {
            Self::Category(RequirementCategory::Functional)
        } else {
            Self::Unrecognized
        }
    }

    fn is_recognized(self) -> bool {
        matches!(self, Self::Overview | Self::Category(_))
    }
}

/// Extracts requirements from a requirements document.
#[derive(Debug, Clone, Copy, Default)]
pub struct RequirementExtractor;

impl RequirementExtractor {
    pub fn new() -> Self {
        Self
    }

    /// Validate the document's structure and return a lazy requirement sequence.
    ///
    /// Fails with `MalformedDocument` when no recognised section heading is
    /// present. The returned iterator borrows the document and can be cloned
    /// to restart; extracting again has no side effects.
    pub fn extract<'a>(&self, document: &'a str) -> DomainResult<Extraction<'a>> {
        let mut in_fence = false;
        let mut recognized = 0usize;
        for line in document.lines() {
            if is_fence(line) {
                in_fence = !in_fence;
                continue;
            }
            if in_fence {
                continue;
            }
            if let Some(heading) = parse_heading(line) {
                if SectionKind::classify(heading).is_recognized() {
                    recognized += 1;
                }
            }
        }

        if recognized == 0 {
            warn!("document has no recognised section headings");
            return Err(DomainError::MalformedDocument(
                "no overview, requirements, acceptance or edge case section found".to_string(),
            ));
        }

        debug!(sections = recognized, "document structure accepted");
        Ok(Extraction {
            document,
            cursor: 0,
            kind: SectionKind::Preamble,
            heading: "",
            in_fence: false,
            next_number: 1,
        })
    }

    /// Convenience wrapper collecting the full sequence.
    pub fn extract_all(&self, document: &str) -> DomainResult<Vec<Requirement>> {
        Ok(self.extract(document)?.collect())
    }

    /// The first level-one heading of the document, if any.
    pub fn document_title(document: &str) -> Option<String> {
        let mut in_fence = false;
        document
            .lines()
            .filter(|line| {
                if is_fence(line) {
                    in_fence = !in_fence;
                    return false;
                }
                !in_fence
            })
            .find_map(|line| line.strip_prefix("# "))
            .map(|title| title.trim().to_string())
            .filter(|title| !title.is_empty())
    }
}

/// Lazy, restartable sequence of requirements over a borrowed document.
#[derive(Debug, Clone)]
pub struct Extraction<'a> {
    document: &'a str,
    cursor: usize,
    kind: SectionKind,
    heading: &'a str,
    in_fence: bool,
    next_number: usize,
}

/// A unit being accumulated: byte offset and raw text.
struct Unit {
    offset: usize,
    text: String,
}

impl Unit {
    fn push_line(&mut self, line: &str) {
        if !self.text.is_empty() {
            self.text.push('\n');
        }
        self.text.push_str(line);
    }
}

impl<'a> Extraction<'a> {
    /// Next line as (byte offset, line without newline, offset after the line).
    fn peek_line(&self) -> Option<(usize, &'a str, usize)> {
        if self.cursor >= self.document.len() {
            return None;
        }
        let rest = &self.document[self.cursor..];
        let (line, consumed) = match rest.find('\n') {
            Some(pos) => (&rest[..pos], pos + 1),
            None => (rest, rest.len()),
        };
        let line = line.strip_suffix('\r').unwrap_or(line);
        Some((self.cursor, line, self.cursor + consumed))
    }

    /// Read the next unit of text in the current section.
    fn next_unit(&mut self) -> Option<Unit> {
        let mut unit: Option<Unit> = None;

        while let Some((offset, line, next_cursor)) = self.peek_line() {
            let indent = line.len() - line.trim_start().len();
            let trimmed = line.trim();

            if self.in_fence || is_fence(line) {
                if is_fence(line) {
                    self.in_fence = !self.in_fence;
                }
                self.cursor = next_cursor;
                unit.get_or_insert_with(|| Unit {
                    offset: offset + indent,
                    text: String::new(),
                })
                .push_line(line);
                continue;
            }

            if let Some(heading) = parse_heading(line) {
                if unit.is_some() {
                    break;
                }
                self.cursor = next_cursor;
                self.kind = SectionKind::classify(heading);
                self.heading = heading;
                continue;
            }

            if trimmed.is_empty() {
                self.cursor = next_cursor;
                if unit.is_some() {
                    break;
                }
                continue;
            }

            if let Some(item) = list_item(trimmed) {
                if unit.is_some() {
                    break;
                }
                self.cursor = next_cursor;
                unit = Some(Unit {
                    offset: offset + indent,
                    text: item.to_string(),
                });
                continue;
            }

            self.cursor = next_cursor;
            unit.get_or_insert_with(|| Unit {
                offset: offset + indent,
                text: String::new(),
            })
            .push_line(trimmed);
        }

        unit
    }
}

impl Iterator for Extraction<'_> {
    type Item = Requirement;

    fn next(&mut self) -> Option<Requirement> {
        loop {
            let unit = self.next_unit()?;
            let (category, low_confidence) = match self.kind {
                SectionKind::Overview => continue,
                SectionKind::Category(category) => (category, false),
                SectionKind::Preamble | SectionKind::Unrecognized => {
                    (RequirementCategory::Functional, true)
                }
            };

            let (text, tags) = parse_tags(&unit.text);
            if text.is_empty() {
                continue;
            }

            let id = RequirementId::numbered(self.next_number);
            self.next_number += 1;
            if low_confidence {
                debug!(requirement_id = %id, section = self.heading, "unclassified span kept as functional");
            }

            return Some(Requirement {
                id,
                text,
                category,
                source_offset: unit.offset,
                section: self.heading.to_string(),
                low_confidence,
                tags,
            });
        }
    }
}

fn is_fence(line: &str) -> bool {
    let trimmed = line.trim_start();
    trimmed.starts_with("```") || trimmed.starts_with("~~~")
}

/// Heading text for ATX headings (`## Title`) or recognised `Label:` lines.
fn parse_heading(line: &str) -> Option<&str> {
    let trimmed = line.trim();
    if trimmed.starts_with('#') {
        let hashes = trimmed.chars().take_while(|c| *c == '#').count();
        let rest = &trimmed[hashes..];
        if hashes <= 6 && (rest.is_empty() || rest.starts_with(' ')) {
            return Some(rest.trim().trim_end_matches('#').trim());
        }
        return None;
    }

    let label = trimmed.strip_suffix(':')?;
    // `- Performance:` is a list item, not a heading
    let plain = !label.is_empty()
        && !label.starts_with('-')
        && label.split_whitespace().count() <= 4
        && label
            .chars()
            .all(|c| c.is_alphabetic() || c == ' ' || c == '-');
    if plain && SectionKind::classify(label).is_recognized() {
        Some(label)
    } else {
        None
    }
}

/// Text of a list item without its marker (and task checkbox), if `trimmed` is one.
fn list_item(trimmed: &str) -> Option<&str> {
    let rest = if let Some(rest) = trimmed
        .strip_prefix("- ")
        .or_else(|| trimmed.strip_prefix("* "))
        .or_else(|| trimmed.strip_prefix("+ "))
    {
        rest
    } else {
        let digits = trimmed.chars().take_while(char::is_ascii_digit).count();
        if digits == 0 {
            return None;
        }
        let after = &trimmed[digits..];
        after
            .strip_prefix(". ")
            .or_else(|| after.strip_prefix(") "))?
    };

    let rest = rest.trim_start();
    let rest = ["[ ] ", "[x] ", "[X] "]
        .iter()
        .find_map(|checkbox| rest.strip_prefix(checkbox))
        .unwrap_or(rest);
    Some(rest.trim())
}

/// Strip structural `[name: value]` / `[flag]` tags from a unit.
///
/// Prose lines are whitespace-normalized; fenced code is kept verbatim and
/// never scanned for tags.
fn parse_tags(raw: &str) -> (String, RequirementTags) {
    let mut tags = RequirementTags::default();
    let mut in_fence = false;
    let mut lines: Vec<String> = Vec::new();

    for line in raw.lines() {
        if is_fence(line) {
            in_fence = !in_fence;
            lines.push(line.to_string());
        } else if in_fence {
            lines.push(line.to_string());
        } else {
            let stripped = strip_tags(line, &mut tags);
            lines.push(stripped.split_whitespace().collect::<Vec<_>>().join(" "));
        }
    }

    let text = lines.join("\n").trim_matches('\n').to_string();
    (text, tags)
}

fn strip_tags(line: &str, tags: &mut RequirementTags) -> String {
    let mut text = String::with_capacity(line.len());
    let mut rest = line;

    while let Some(open) = rest.find('[') {
        let Some(close_rel) = rest[open..].find(']') else {
            break;
        };
        let close = open + close_rel;
        let inner = &rest[open + 1..close];
        text.push_str(&rest[..open]);
        if !apply_tag(inner, tags) {
            text.push_str(&rest[open..=close]);
        }
        rest = &rest[close + 1..];
    }
    text.push_str(rest);
    text
}

/// Apply a single tag body; returns false when it is not a structural tag.
fn apply_tag(inner: &str, tags: &mut RequirementTags) -> bool {
    let inner = inner.trim();
    match inner.to_lowercase().as_str() {
        "input" | "credentials" | "external-input" => {
            tags.external_input = true;
            return true;
        }
        _ => {}
    }

    let Some((name, value)) = inner.split_once(':') else {
        return false;
    };
    let value = value.trim();
    match name.trim().to_lowercase().as_str() {
        "id" if !value.is_empty() => {
            tags.key = Some(value.to_string());
            true
        }
        "after" => {
            tags.after.extend(
                value
                    .split(',')
                    .map(str::trim)
                    .filter(|v| !v.is_empty())
                    .map(str::to_string),
            );
            true
        }
        "stage" => match Stage::from_str(value) {
            Some(stage) => {
                tags.stage = Some(stage);
                true
            }
            None => false,
        },
        "estimate" => match value.parse::<u32>() {
            Ok(points) => {
                tags.estimate = Some(points);
                true
            }
            Err(_) => false,
        },
        _ => false,
    }
}
