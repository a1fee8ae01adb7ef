//! Command-line interface for specrun.

pub mod commands;
pub mod id_resolver;
pub mod output;
pub mod types;

pub use types::{Cli, Commands};

use serde_json::json;

/// Print a command error and exit with a non-zero status.
///
/// In JSON mode the error is written to stdout as `{"error": ...}` so
/// scripted callers can parse it; otherwise the full context chain goes
/// to stderr.
pub fn handle_error(err: anyhow::Error, json_mode: bool) -> ! {
    tracing::debug!(error = ?err, "command failed");
    if json_mode {
        let causes: Vec<String> = err.chain().skip(1).map(ToString::to_string).collect();
        let body = json!({ "error": err.to_string(), "causes": causes });
        println!(
            "{}",
            serde_json::to_string_pretty(&body).unwrap_or_default()
        );
    } else {
        eprintln!("Error: {err:#}");
    }
    std::process::exit(1)
}
