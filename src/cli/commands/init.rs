//! Implementation of the `specrun init` command.

use anyhow::{Context, Result};
use clap::Args;
use std::path::PathBuf;
use tokio::fs;

use crate::cli::output::{output, CommandOutput};
use crate::infrastructure::config::{ConfigLoader, PROJECT_DIR};

#[derive(Args, Debug)]
pub struct InitArgs {
    /// Force reinitialization even if already initialized
    #[arg(long, short)]
    pub force: bool,

    /// Target directory (defaults to current directory)
    #[arg(default_value = ".")]
    pub path: PathBuf,
}

#[derive(Debug, serde::Serialize)]
pub struct InitOutput {
    pub success: bool,
    pub message: String,
    pub initialized_path: PathBuf,
    pub directories_created: Vec<String>,
    pub config_written: bool,
}

impl CommandOutput for InitOutput {
    fn to_human(&self) -> String {
        let mut lines = vec![self.message.clone()];
        if !self.directories_created.is_empty() {
            lines.push("\nCreated directories:".to_string());
            for dir in &self.directories_created {
                lines.push(format!("  - {dir}"));
            }
        }
        if self.config_written {
            lines.push(format!("\nDefault configuration written to {PROJECT_DIR}/config.yaml"));
        }
        lines.join("\n")
    }
}

pub async fn execute(args: InitArgs, json_mode: bool) -> Result<()> {
    let target_path = if args.path.is_absolute() {
        args.path.clone()
    } else {
        std::env::current_dir()
            .context("Failed to get current directory")?
            .join(&args.path)
    };

    let project_dir = target_path.join(PROJECT_DIR);

    if project_dir.exists() && !args.force {
        let output_data = InitOutput {
            success: false,
            message: "Project already initialized. Use --force to reinitialize.".to_string(),
            initialized_path: target_path,
            directories_created: vec![],
            config_written: false,
        };
        output(&output_data, json_mode);
        return Ok(());
    }

    // Reinitializing keeps stored runs; only the configuration is rewritten.
    let dirs = [
        project_dir.clone(),
        project_dir.join("runs"),
        project_dir.join("archive"),
        project_dir.join("logs"),
    ];

    let mut directories_created = vec![];
    for dir in &dirs {
        if !dir.exists() {
            fs::create_dir_all(dir)
                .await
                .with_context(|| format!("Failed to create {}", dir.display()))?;
            let relative = dir
                .strip_prefix(&target_path)
                .unwrap_or(dir)
                .to_string_lossy()
                .to_string();
            directories_created.push(relative);
        }
    }

    let config_path = project_dir.join("config.yaml");
    fs::write(&config_path, ConfigLoader::default_yaml()?)
        .await
        .with_context(|| format!("Failed to write {}", config_path.display()))?;

    tracing::info!(path = %target_path.display(), force = args.force, "project initialized");

    let output_data = InitOutput {
        success: true,
        message: if args.force {
            "Project reinitialized successfully.".to_string()
        } else {
            "Project initialized successfully.".to_string()
        },
        initialized_path: target_path,
        directories_created,
        config_written: true,
    };

    output(&output_data, json_mode);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_init_creates_layout_and_config() {
        let dir = TempDir::new().unwrap();
        let args = InitArgs {
            force: false,
            path: dir.path().to_path_buf(),
        };
        execute(args, true).await.unwrap();

        let project = dir.path().join(PROJECT_DIR);
        assert!(project.join("runs").is_dir());
        assert!(project.join("archive").is_dir());
        let yaml = std::fs::read_to_string(project.join("config.yaml")).unwrap();
        assert!(yaml.contains("max_task_points"));
    }

    #[tokio::test]
    async fn test_reinit_without_force_leaves_config_alone() {
        let dir = TempDir::new().unwrap();
        let project = dir.path().join(PROJECT_DIR);
        std::fs::create_dir_all(&project).unwrap();
        std::fs::write(project.join("config.yaml"), "planning:\n  max_task_points: 7\n").unwrap();

        let args = InitArgs {
            force: false,
            path: dir.path().to_path_buf(),
        };
        execute(args, true).await.unwrap();

        let yaml = std::fs::read_to_string(project.join("config.yaml")).unwrap();
        assert!(yaml.contains("max_task_points: 7"));
    }
}
