//! Short ID prefix resolution for run commands.
//!
//! Allows users to specify any unique prefix of a run UUID instead of the
//! full ID, similar to git short hashes.

use anyhow::{bail, Result};
use uuid::Uuid;

use crate::domain::ports::RunRepository;

/// Resolve a run ID prefix against the active runs.
///
/// A full UUID is returned as-is, so archived runs can still be addressed
/// by their complete ID.
pub async fn resolve_run_id(repo: &dyn RunRepository, prefix: &str) -> Result<Uuid> {
    if let Ok(uuid) = Uuid::parse_str(prefix) {
        return Ok(uuid);
    }

    validate_prefix(prefix)?;

    let needle = prefix.to_lowercase();
    let matches: Vec<Uuid> = repo
        .list()
        .await?
        .into_iter()
        .map(|summary| summary.id)
        .filter(|id| id.to_string().starts_with(&needle))
        .collect();

    match matches.as_slice() {
        [] => bail!("No run found matching '{prefix}'"),
        [id] => Ok(*id),
        _ => {
            let mut msg = format!(
                "Ambiguous prefix '{prefix}': matches {} runs:",
                matches.len()
            );
            for id in &matches {
                msg.push_str(&format!("\n  {id}"));
            }
            bail!("{msg}")
        }
    }
}

/// Resolve an optional prefix, falling back to the most recent active run.
pub async fn resolve_run_or_latest(repo: &dyn RunRepository, prefix: Option<&str>) -> Result<Uuid> {
    match prefix {
        Some(prefix) => resolve_run_id(repo, prefix).await,
        None => match repo.list().await?.last() {
            Some(summary) => Ok(summary.id),
            None => bail!("No active runs. Start one with 'specrun plan <document>'"),
        },
    }
}

fn validate_prefix(prefix: &str) -> Result<()> {
    if prefix.is_empty() {
        bail!("ID prefix must not be empty");
    }
    if !prefix.chars().all(|c| c.is_ascii_hexdigit() || c == '-') {
        bail!("Invalid ID prefix '{prefix}': must contain only hex characters and dashes");
    }
    Ok(())
}
