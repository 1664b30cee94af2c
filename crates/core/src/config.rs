//! Configuration management for ragbasics.
//!
//! Configuration is merged from several sources, later ones winning:
//! - Built-in defaults
//! - The workspace config file (`.ragbasics/config.yaml`)
//! - Environment variables
//! - Command-line flags
//!
//! All persistent state lives under the workspace's `.ragbasics/` directory.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{AppError, AppResult};

/// Name of the per-workspace state directory.
pub const STATE_DIR: &str = ".ragbasics";

/// Generation providers the factory knows how to build.
pub const KNOWN_PROVIDERS: &[&str] = &["ollama"];

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Path to the workspace root (contains .ragbasics/)
    pub workspace: PathBuf,

    /// Optional config file path
    pub config_file: Option<PathBuf>,

    /// Generation provider (e.g., "ollama")
    pub provider: String,

    /// Generation model identifier
    pub model: String,

    /// Generation endpoint override
    pub endpoint: Option<String>,

    /// Log level override
    pub log_level: Option<String>,

    /// Verbose mode (enables debug logging)
    pub verbose: bool,

    /// Disable colored output
    pub no_color: bool,
}

/// Full configuration file structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct ConfigFile {
    llm: Option<LlmSection>,
    workspace: Option<WorkspaceSection>,
    logging: Option<LoggingSection>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct LlmSection {
    provider: Option<String>,
    model: Option<String>,
    endpoint: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct WorkspaceSection {
    path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct LoggingSection {
    level: Option<String>,
    color: Option<bool>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            workspace: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            config_file: None,
            provider: "ollama".to_string(),
            model: "llama3.2".to_string(),
            endpoint: None,
            log_level: None,
            verbose: false,
            no_color: false,
        }
    }
}

impl AppConfig {
    /// Load configuration from defaults, the config file, and the environment.
    ///
    /// Environment variables:
    /// - `RAGBASICS_WORKSPACE`: Override workspace path
    /// - `RAGBASICS_CONFIG`: Path to config file
    /// - `RAGBASICS_PROVIDER`: Generation provider
    /// - `RAGBASICS_MODEL`: Generation model identifier
    /// - `RAGBASICS_ENDPOINT`: Generation endpoint
    /// - `RUST_LOG`: Log level
    /// - `NO_COLOR`: Disable colored output
    pub fn load() -> AppResult<Self> {
        let mut config = Self::default();

        if let Ok(workspace) = std::env::var("RAGBASICS_WORKSPACE") {
            config.workspace = PathBuf::from(workspace);
        }

        if let Ok(config_file) = std::env::var("RAGBASICS_CONFIG") {
            config.config_file = Some(PathBuf::from(config_file));
        }

        if !config.workspace.exists() {
            return Err(AppError::Config(format!(
                "Workspace directory does not exist: {:?}",
                config.workspace
            )));
        }

        let config_path = config
            .config_file
            .clone()
            .unwrap_or_else(|| config.state_dir().join("config.yaml"));

        if config_path.exists() {
            config = config.merge_yaml(&config_path)?;
        }

        // Environment variables override YAML config
        if let Ok(provider) = std::env::var("RAGBASICS_PROVIDER") {
            config.provider = provider;
        }

        if let Ok(model) = std::env::var("RAGBASICS_MODEL") {
            config.model = model;
        }

        if let Ok(endpoint) = std::env::var("RAGBASICS_ENDPOINT") {
            config.endpoint = Some(endpoint);
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
    fn merge_yaml(&self, path: &Path) -> AppResult<Self> {
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
        }

        if let Some(logging) = config_file.logging {
            if let Some(level) = logging.level {
                result.log_level = Some(level);
            }
            if let Some(color) = logging.color {
                result.no_color = !color;
            }
        }

        if let Some(llm) = config_file.llm {
            if let Some(provider) = llm.provider {
                result.provider = provider;
            }
            if let Some(model) = llm.model {
                result.model = model;
            }
            if llm.endpoint.is_some() {
                result.endpoint = llm.endpoint;
            }
        }

        Ok(result)
    }

    /// Apply CLI overrides to the configuration.
    ///
    /// Command-line flags take precedence over everything loaded so far.
    #[allow(clippy::too_many_arguments)]
    pub fn with_overrides(
        mut self,
        workspace: Option<PathBuf>,
        config_file: Option<PathBuf>,
        provider: Option<String>,
        model: Option<String>,
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

        if let Some(provider) = provider {
            self.provider = provider;
        }

        if let Some(model) = model {
            self.model = model;
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

    /// Get the path to the .ragbasics directory.
    pub fn state_dir(&self) -> PathBuf {
        self.workspace.join(STATE_DIR)
    }

    /// Ensure the .ragbasics directory exists.
    pub fn ensure_state_dir(&self) -> AppResult<()> {
        let state_dir = self.state_dir();
        if !state_dir.exists() {
            std::fs::create_dir_all(&state_dir).map_err(|e| {
                AppError::Config(format!("Failed to create {} directory: {}", STATE_DIR, e))
            })?;
        }
        Ok(())
    }

    /// Validate configuration for the active provider.
    pub fn validate(&self) -> AppResult<()> {
        if !KNOWN_PROVIDERS.contains(&self.provider.to_lowercase().as_str()) {
            return Err(AppError::Config(format!(
                "Unknown provider: {}. Supported: {}",
                self.provider,
                KNOWN_PROVIDERS.join(", ")
            )));
        }

        if self.model.trim().is_empty() {
            return Err(AppError::Config("Model identifier must not be empty".to_string()));
        }

        Ok(())
    }
}
