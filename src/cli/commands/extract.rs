//! Implementation of the `specrun extract` command.

use anyhow::{Context, Result};
use clap::Args;
use std::path::PathBuf;

use crate::cli::commands::read_document;
use crate::cli::output::{output, CommandOutput, TableFormatter};
use crate::domain::models::{Requirement, RequirementCategory};
use crate::services::RequirementExtractor;

#[derive(Args, Debug)]
pub struct ExtractArgs {
    /// Requirements document (`-` reads stdin)
    pub document: PathBuf,

    /// Only show requirements of this category
    /// (functional, non-functional, edge-case, acceptance)
    #[arg(short, long)]
    pub category: Option<String>,
}

#[derive(Debug, serde::Serialize)]
pub struct ExtractOutput {
    pub document_title: Option<String>,
    pub total: usize,
    pub low_confidence: usize,
    pub requirements: Vec<Requirement>,
}

impl CommandOutput for ExtractOutput {
    fn to_human(&self) -> String {
        if self.requirements.is_empty() {
            return "No requirements found.".to_string();
        }

        let mut lines = Vec::new();
        if let Some(title) = &self.document_title {
            lines.push(format!("{title}\n"));
        }
        lines.push(TableFormatter::new().format_requirements(&self.requirements));
        lines.push(format!("\n{} requirement(s)", self.total));
        if self.low_confidence > 0 {
            lines.push(format!(
                "{} classified with low confidence (marked ?)",
                self.low_confidence
            ));
        }
        lines.join("\n")
    }
}

fn parse_category(value: &str) -> Result<RequirementCategory> {
    serde_json::from_value(serde_json::Value::String(value.to_lowercase()))
        .with_context(|| format!("Invalid category: {value}"))
}

pub async fn execute(args: ExtractArgs, json_mode: bool) -> Result<()> {
    let document = read_document(&args.document).await?;
    let filter = args.category.as_deref().map(parse_category).transpose()?;

    let extractor = RequirementExtractor::new();
    let requirements: Vec<Requirement> = extractor
        .extract(&document)
        .context("Failed to extract requirements")?
        .filter(|req| filter.map_or(true, |category| req.category == category))
        .collect();

    let out = ExtractOutput {
        document_title: RequirementExtractor::document_title(&document),
        total: requirements.len(),
        low_confidence: requirements.iter().filter(|r| r.low_confidence).count(),
        requirements,
    };
    output(&out, json_mode);
    Ok(())
}
