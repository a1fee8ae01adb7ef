//! Table output formatting for CLI commands
//!
//! Formats requirements, tasks and stored runs with comfy-table. Status
//! cells are color-coded unless `NO_COLOR` is set or the terminal is dumb,
//! in which case an icon is prefixed instead.

use comfy_table::{presets, Attribute, Cell, Color, ContentArrangement, Table};
use std::env;

use super::truncate;
use crate::domain::models::{Requirement, RunPhase, ScopeApproval, Task, TaskStatus};
use crate::domain::ports::RunSummary;

/// Table formatter for CLI output
pub struct TableFormatter {
    /// Whether to use colors in output
    use_colors: bool,
    /// Maximum width for tables (None = auto)
    max_width: Option<u16>,
}

impl TableFormatter {
    pub fn new() -> Self {
        Self {
            use_colors: supports_color(),
            max_width: None,
        }
    }

    pub fn with_config(use_colors: bool, max_width: Option<u16>) -> Self {
        Self {
            use_colors,
            max_width,
        }
    }

    /// Format extracted requirements
    pub fn format_requirements(&self, requirements: &[Requirement]) -> String {
        let mut table = self.create_base_table();
        table.set_header(header(&["ID", "Category", "Section", "Text"]));

        for req in requirements {
            let category = if req.low_confidence {
                format!("{} (?)", req.category)
            } else {
                req.category.to_string()
            };
            table.add_row(vec![
                Cell::new(req.id.as_str()),
                Cell::new(category),
                Cell::new(truncate(&req.section, 24)),
                Cell::new(truncate(&req.text.replace('\n', " "), 60)),
            ]);
        }

        table.to_string()
    }

    /// Format tasks in the order given
    pub fn format_tasks(&self, tasks: &[&Task]) -> String {
        let mut table = self.create_base_table();
        table.set_header(header(&["ID", "Title", "Status", "Depends on", "Pts"]));

        for task in tasks {
            let deps = if task.depends_on.is_empty() {
                "-".to_string()
            } else {
                task.depends_on
                    .iter()
                    .map(|d| d.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            };

            let mut title = truncate(&task.title, 48);
            if task.scope_creep {
                title = format!("{title} [{}]", approval_label(task.approval));
            }

            table.add_row(vec![
                Cell::new(task.id.as_str()),
                Cell::new(title),
                self.status_cell(task.status),
                Cell::new(deps),
                Cell::new(task.estimate.to_string()),
            ]);
        }

        table.to_string()
    }

    /// Format stored run summaries
    pub fn format_runs(&self, runs: &[RunSummary]) -> String {
        let mut table = self.create_base_table();
        table.set_header(header(&["ID", "Document", "Phase", "Tasks", "Started"]));

        for run in runs {
            let phase = if self.use_colors {
                Cell::new(run.phase.as_str()).fg(phase_color(run.phase))
            } else {
                Cell::new(run.phase.as_str())
            };
            table.add_row(vec![
                Cell::new(run.id.to_string()),
                Cell::new(truncate(run.document_title.as_deref().unwrap_or("-"), 30)),
                phase,
                Cell::new(run.task_count.to_string()),
                Cell::new(run.started_at.format("%Y-%m-%d %H:%M").to_string()),
            ]);
        }

        table.to_string()
    }

    fn status_cell(&self, status: TaskStatus) -> Cell {
        if self.use_colors {
            Cell::new(status.as_str()).fg(status_color(status))
        } else {
            Cell::new(format!("{} {}", status_icon(status), status))
        }
    }

    /// Create a base table with common settings
    fn create_base_table(&self) -> Table {
        let mut table = Table::new();
        table
            .load_preset(presets::UTF8_FULL)
            .set_content_arrangement(ContentArrangement::Dynamic);

        if let Some(width) = self.max_width {
            table.set_width(width);
        }

        table
    }
}

impl Default for TableFormatter {
    fn default() -> Self {
        Self::new()
    }
}

fn header(names: &[&str]) -> Vec<Cell> {
    names
        .iter()
        .map(|name| Cell::new(name).add_attribute(Attribute::Bold))
        .collect()
}

/// Check if color output is supported
fn supports_color() -> bool {
    if env::var("NO_COLOR").is_ok() {
        return false;
    }
    !matches!(env::var("TERM").as_deref(), Ok("dumb"))
}

fn status_color(status: TaskStatus) -> Color {
    match status {
        TaskStatus::Completed => Color::Green,
        TaskStatus::InProgress => Color::Cyan,
        TaskStatus::Failed => Color::Red,
        TaskStatus::Blocked => Color::Magenta,
        TaskStatus::Pending => Color::White,
    }
}

fn status_icon(status: TaskStatus) -> &'static str {
    match status {
        TaskStatus::Completed => "✓",
        TaskStatus::InProgress => "⟳",
        TaskStatus::Failed => "✗",
        TaskStatus::Blocked => "⊗",
        TaskStatus::Pending => "○",
    }
}

fn phase_color(phase: RunPhase) -> Color {
    match phase {
        RunPhase::Analysis | RunPhase::Planning => Color::Yellow,
        RunPhase::Implementation => Color::Cyan,
        RunPhase::Summary => Color::Green,
    }
}

fn approval_label(approval: ScopeApproval) -> &'static str {
    match approval {
        ScopeApproval::NotRequired => "planned",
        ScopeApproval::Pending => "awaiting approval",
        ScopeApproval::Approved => "approved",
        ScopeApproval::Rejected => "rejected",
    }
}
