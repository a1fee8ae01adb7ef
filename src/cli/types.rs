//! CLI type definitions
//!
//! This module contains the top-level clap structures. Each subcommand's
//! arguments live next to its implementation in `commands`.

use clap::{Parser, Subcommand};

use crate::cli::commands::extract::ExtractArgs;
use crate::cli::commands::init::InitArgs;
use crate::cli::commands::plan::PlanArgs;
use crate::cli::commands::report::ReportArgs;
use crate::cli::commands::run::RunArgs;

#[derive(Parser, Debug)]
#[command(name = "specrun")]
#[command(about = "specrun - requirements-driven task orchestration", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output in JSON format
    #[arg(short, long, global = true)]
    pub json: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Initialize a .specrun project directory
    Init(InitArgs),

    /// Extract and classify requirements from a document
    Extract(ExtractArgs),

    /// Analyze a document, build its task graph and open a run
    Plan(PlanArgs),

    /// Drive a run through implementation
    Run(RunArgs),

    /// Produce the summary report of a finished run
    Report(ReportArgs),
}
