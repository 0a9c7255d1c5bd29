//! Configuration management for Verso.
//!
//! This module handles loading and merging configuration from multiple sources:
//! - Defaults
//! - Config file (.verso/config.yaml)
//! - Environment variables
//! - Command-line flags
//!
//! The configuration is workspace-centric, with local state stored in `.verso/`.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::error::{AppError, AppResult};

/// Label consulted first by the default resolution chain.
pub const DEFAULT_LABEL: &str = "production";

/// Default page size for prompt listings.
pub const DEFAULT_LIST_LIMIT: usize = 50;

/// Hard cap on the page size for prompt listings.
pub const MAX_LIST_LIMIT: usize = 100;

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Path to the workspace root (contains .verso/)
    pub workspace: PathBuf,

    /// Optional config file path
    pub config_file: Option<PathBuf>,

    /// SQLite database file; defaults to `.verso/prompts.db` in the workspace
    pub database: Option<PathBuf>,

    /// Default project the commands operate on
    pub project: Option<Uuid>,

    /// Default acting user for mutating commands
    pub actor: Option<Uuid>,

    /// Log level override
    pub log_level: Option<String>,

    /// Verbose mode (enables debug logging)
    pub verbose: bool,

    /// Disable colored output
    pub no_color: bool,

    /// Storage tuning
    pub storage: StorageConfig,

    /// Label tried first when neither version nor label is requested
    pub default_label: String,

    /// Page size for prompt listings
    pub list_limit: usize,
}

/// Storage backend settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// How long a storage call waits on a locked database before failing
    #[serde(rename = "busyTimeoutMs", default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,

    /// Enable SQLite write-ahead logging
    #[serde(rename = "walMode", default = "default_true")]
    pub wal_mode: bool,
}

fn default_busy_timeout_ms() -> u64 {
    5_000
}

fn default_true() -> bool {
    true
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            busy_timeout_ms: default_busy_timeout_ms(),
            wal_mode: true,
        }
    }
}

/// Full configuration file structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct ConfigFile {
    workspace: Option<WorkspaceConfig>,
    logging: Option<LoggingConfig>,
    storage: Option<StorageConfig>,
    defaults: Option<DefaultsConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct WorkspaceConfig {
    path: Option<String>,
    database: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct LoggingConfig {
    level: Option<String>,
    color: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct DefaultsConfig {
    project: Option<Uuid>,
    actor: Option<Uuid>,
    #[serde(rename = "defaultLabel")]
    default_label: Option<String>,
    #[serde(rename = "listLimit")]
    list_limit: Option<usize>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            workspace: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            config_file: None,
            database: None,
            project: None,
            actor: None,
            log_level: None,
            verbose: false,
            no_color: false,
            storage: StorageConfig::default(),
            default_label: DEFAULT_LABEL.to_string(),
            list_limit: DEFAULT_LIST_LIMIT,
        }
    }
}

impl AppConfig {
    /// Load configuration from defaults, the YAML config file and environment variables.
    ///
    /// Environment variables:
    /// - `VERSO_WORKSPACE`: Override workspace path
    /// - `VERSO_CONFIG`: Path to config file
    /// - `VERSO_DATABASE`: SQLite database path
    /// - `VERSO_PROJECT`: Default project UUID
    /// - `VERSO_ACTOR`: Default acting-user UUID
    /// - `RUST_LOG`: Log level
    /// - `NO_COLOR`: Disable colored output
    pub fn load() -> AppResult<Self> {
        let mut config = Self::default();

        if let Ok(workspace) = std::env::var("VERSO_WORKSPACE") {
            config.workspace = PathBuf::from(workspace);
        }

        if let Ok(config_file) = std::env::var("VERSO_CONFIG") {
            config.config_file = Some(PathBuf::from(config_file));
        }

        if !config.workspace.exists() {
            return Err(AppError::Config(format!(
                "Workspace directory does not exist: {:?}",
                config.workspace
            )));
        }

        let config_path = match config.config_file {
            Some(ref cf) => cf.clone(),
            None => config.workspace.join(".verso/config.yaml"),
        };

        if config_path.exists() {
            config = config.merge_yaml(&config_path)?;
        }

        // Environment variables override YAML config
        if let Ok(database) = std::env::var("VERSO_DATABASE") {
            config.database = Some(PathBuf::from(database));
        }

        if let Ok(project) = std::env::var("VERSO_PROJECT") {
            config.project = Some(parse_uuid("VERSO_PROJECT", &project)?);
        }

        if let Ok(actor) = std::env::var("VERSO_ACTOR") {
            config.actor = Some(parse_uuid("VERSO_ACTOR", &actor)?);
        }

        if let Ok(level) = std::env::var("RUST_LOG") {
            config.log_level = Some(level);
        }

        if std::env::var("NO_COLOR").is_ok() {
            config.no_color = true;
        }

        Ok(config)
    }

    /// Merge a YAML configuration file into this config.
    pub fn merge_yaml(&self, path: &Path) -> AppResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            AppError::Config(format!("Failed to read config file {:?}: {}", path, e))
        })?;

        let config_file: ConfigFile = serde_yaml::from_str(&contents).map_err(|e| {
            AppError::Config(format!("Failed to parse config file {:?}: {}", path, e))
        })?;

        let mut result = self.clone();

        if let Some(ws) = config_file.workspace {
            if let Some(path) = ws.path {
                result.workspace = PathBuf::from(path);
            }
            if let Some(database) = ws.database {
                result.database = Some(PathBuf::from(database));
            }
        }

        if let Some(logging) = config_file.logging {
            if let Some(level) = logging.level {
                result.log_level = Some(level);
            }
            if let Some(color) = logging.color {
                result.no_color = !color;
            }
        }

        if let Some(storage) = config_file.storage {
            result.storage = storage;
        }

        if let Some(defaults) = config_file.defaults {
            if defaults.project.is_some() {
                result.project = defaults.project;
            }
            if defaults.actor.is_some() {
                result.actor = defaults.actor;
            }
            if let Some(label) = defaults.default_label {
                result.default_label = label;
            }
            if let Some(limit) = defaults.list_limit {
                result.list_limit = limit;
            }
        }

        Ok(result)
    }

    /// Apply CLI overrides to the configuration.
    ///
    /// CLI flags take precedence over environment variables and the config file.
    #[allow(clippy::too_many_arguments)]
    pub fn with_overrides(
        mut self,
        workspace: Option<PathBuf>,
        config_file: Option<PathBuf>,
        database: Option<PathBuf>,
        project: Option<Uuid>,
        actor: Option<Uuid>,
        log_level: Option<String>,
        verbose: bool,
        no_color: bool,
    ) -> Self {
        if let Some(workspace) = workspace {
            self.workspace = workspace;
        }

        if let Some(config_file) = config_file {
            self.config_file = Some(config_file);
        }

        if let Some(database) = database {
            self.database = Some(database);
        }

        if let Some(project) = project {
            self.project = Some(project);
        }

        if let Some(actor) = actor {
            self.actor = Some(actor);
        }

        if let Some(log_level) = log_level {
            self.log_level = Some(log_level);
        }

        if verbose {
            self.verbose = true;
            // Verbose mode implies debug logging
            if self.log_level.is_none() {
                self.log_level = Some("debug".to_string());
            }
        }

        if no_color {
            self.no_color = true;
        }

        self
    }

    /// Get the path to the .verso directory.
    pub fn verso_dir(&self) -> PathBuf {
        self.workspace.join(".verso")
    }

    /// Ensure the .verso directory exists.
    pub fn ensure_verso_dir(&self) -> AppResult<()> {
        let verso_dir = self.verso_dir();
        if !verso_dir.exists() {
            std::fs::create_dir_all(&verso_dir).map_err(|e| {
                AppError::Config(format!("Failed to create .verso directory: {}", e))
            })?;
        }
        Ok(())
    }

    /// Resolved path of the SQLite database.
    pub fn database_path(&self) -> PathBuf {
        match self.database {
            Some(ref path) if path.is_absolute() => path.clone(),
            Some(ref path) => self.workspace.join(path),
            None => self.verso_dir().join("prompts.db"),
        }
    }

    /// Project to operate on, or a configuration error naming how to set one.
    pub fn require_project(&self) -> AppResult<Uuid> {
        self.project.ok_or_else(|| {
            AppError::Config(
                "No project selected; pass --project or set VERSO_PROJECT".to_string(),
            )
        })
    }

    /// Validate configuration values.
    pub fn validate(&self) -> AppResult<()> {
        if self.storage.busy_timeout_ms == 0 {
            return Err(AppError::Config(
                "storage.busyTimeoutMs must be greater than zero".to_string(),
            ));
        }

        if self.default_label.trim().is_empty() {
            return Err(AppError::Config(
                "defaults.defaultLabel cannot be empty".to_string(),
            ));
        }

        if self.list_limit == 0 || self.list_limit > MAX_LIST_LIMIT {
            return Err(AppError::Config(format!(
                "defaults.listLimit must be between 1 and {}, got {}",
                MAX_LIST_LIMIT, self.list_limit
            )));
        }

        Ok(())
    }
}

fn parse_uuid(var: &str, value: &str) -> AppResult<Uuid> {
    Uuid::parse_str(value.trim())
        .map_err(|e| AppError::Config(format!("{} is not a valid UUID: {}", var, e)))
}
