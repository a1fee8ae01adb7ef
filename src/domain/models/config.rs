use serde::{Deserialize, Serialize};

/// Main configuration structure for specrun
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Config {
    /// Task graph construction policy
    #[serde(default)]
    pub planning: PlanningConfig,

    /// Run storage configuration
    #[serde(default)]
    pub storage: StorageConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// How requirements are grouped into tasks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupingMode {
    /// One task per requirement.
    #[default]
    PerRequirement,
    /// Consecutive requirements under the same heading form one task.
    BySection,
}

/// Task graph construction policy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct PlanningConfig {
    /// Largest task estimate (in points) before a task is split
    #[serde(default = "default_max_task_points")]
    pub max_task_points: u32,

    /// Points assigned to a requirement without an `[estimate]` tag
    #[serde(default = "default_points")]
    pub default_points: u32,

    /// Grouping strategy
    #[serde(default)]
    pub grouping: GroupingMode,
}

const fn default_max_task_points() -> u32 {
    3
}

const fn default_points() -> u32 {
    1
}

impl Default for PlanningConfig {
    fn default() -> Self {
        Self {
            max_task_points: default_max_task_points(),
            default_points: default_points(),
            grouping: GroupingMode::default(),
        }
    }
}

/// Run storage configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct StorageConfig {
    /// Directory holding `runs/` and `archive/`
    #[serde(default = "default_storage_root")]
    pub root: String,
}

fn default_storage_root() -> String {
    ".specrun".to_string()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root: default_storage_root(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: json or pretty
    #[serde(default = "default_log_format")]
    pub format: String,

    /// Directory for rolling log files; stderr only when unset
    #[serde(default)]
    pub log_dir: Option<String>,

    /// Rotation for file output: daily, hourly, never
    #[serde(default = "default_rotation")]
    pub rotation: String,
}

fn default_log_level() -> String {
    "warn".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

fn default_rotation() -> String {
    "daily".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            log_dir: None,
            rotation: default_rotation(),
        }
    }
}
