//! specrun CLI entry point.

use clap::Parser;

use specrun::cli::{Cli, Commands};
use specrun::infrastructure::config::ConfigLoader;
use specrun::infrastructure::logging::{LogConfig, LoggerImpl};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // A broken config still lets `init` run; commands that need it report the error.
    let log_config = ConfigLoader::load()
        .map(|config| LogConfig::from(&config.logging))
        .unwrap_or_default();
    let _logger = match LoggerImpl::init(&log_config) {
        Ok(logger) => Some(logger),
        Err(err) => {
            eprintln!("Warning: logging disabled: {err:#}");
            None
        }
    };

    let result = match cli.command {
        Commands::Init(args) => specrun::cli::commands::init::execute(args, cli.json).await,
        Commands::Extract(args) => specrun::cli::commands::extract::execute(args, cli.json).await,
        Commands::Plan(args) => specrun::cli::commands::plan::execute(args, cli.json).await,
        Commands::Run(args) => specrun::cli::commands::run::execute(args, cli.json).await,
        Commands::Report(args) => specrun::cli::commands::report::execute(args, cli.json).await,
    };

    if let Err(err) = result {
        specrun::cli::handle_error(err, cli.json);
    }
}
