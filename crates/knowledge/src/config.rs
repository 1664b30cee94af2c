//! Knowledge base configuration and on-disk layout.
//!
//! Every base lives in `<workspace>/.ragbasics/knowledge/<base>/`.

use crate::types::KnowledgeBaseConfig;
use crate::vector_index::write_atomic;
use ragbasics_core::config::STATE_DIR;
use ragbasics_core::{AppError, AppResult};
use std::fs;
use std::path::{Path, PathBuf};

/// Base used when none is named.
pub const DEFAULT_BASE: &str = "default";

/// Reject names that would escape the knowledge directory.
pub fn validate_base_name(base_name: &str) -> AppResult<()> {
    let valid = !base_name.is_empty()
        && base_name != "."
        && base_name != ".."
        && base_name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));

    if !valid {
        return Err(AppError::Config(format!(
            "Invalid knowledge base name '{}': use letters, digits, '-', '_' or '.'",
            base_name
        )));
    }
    Ok(())
}

/// Load knowledge base configuration.
///
/// Loads from `.ragbasics/knowledge/<base>/config.yaml` if it exists,
/// otherwise returns the defaults with the provided base name.
pub fn load_config(workspace: &Path, base_name: &str) -> AppResult<KnowledgeBaseConfig> {
    validate_base_name(base_name)?;
    let config_path = get_config_path(workspace, base_name);

    let config = if config_path.exists() {
        let content = fs::read_to_string(&config_path).map_err(|e| {
            AppError::Config(format!("Failed to read config at {:?}: {}", config_path, e))
        })?;

        let mut config: KnowledgeBaseConfig = serde_yaml::from_str(&content).map_err(|e| {
            AppError::Config(format!("Failed to parse config at {:?}: {}", config_path, e))
        })?;

        config.name = base_name.to_string();

        tracing::debug!("Loaded knowledge base config for '{}'", base_name);
        config
    } else {
        tracing::debug!(
            "Using default knowledge base config for '{}' (no config file found)",
            base_name
        );
        KnowledgeBaseConfig {
            name: base_name.to_string(),
            ..Default::default()
        }
    };

    config.chunking.validate()?;
    config.embedding.validate()?;
    if config.top_k == 0 {
        return Err(AppError::Config("top_k must be greater than zero".to_string()));
    }

    Ok(config)
}

/// Save knowledge base configuration.
pub fn save_config(workspace: &Path, config: &KnowledgeBaseConfig) -> AppResult<()> {
    validate_base_name(&config.name)?;
    let config_path = get_config_path(workspace, &config.name);

    let yaml = serde_yaml::to_string(config)?;
    write_atomic(&config_path, yaml.as_bytes())?;

    tracing::debug!("Saved knowledge base config for '{}'", config.name);
    Ok(())
}

/// Get the base directory for a knowledge base.
pub fn get_base_dir(workspace: &Path, base_name: &str) -> PathBuf {
    workspace.join(STATE_DIR).join("knowledge").join(base_name)
}

/// Get the path to a base's config file.
pub fn get_config_path(workspace: &Path, base_name: &str) -> PathBuf {
    get_base_dir(workspace, base_name).join("config.yaml")
}

/// Get the vector index path for a base.
pub fn get_index_path(workspace: &Path, base_name: &str) -> PathBuf {
    get_base_dir(workspace, base_name).join("index.bin")
}

/// Get the chunk store path for a base.
pub fn get_chunks_path(workspace: &Path, base_name: &str) -> PathBuf {
    get_base_dir(workspace, base_name).join("chunks.txt")
}

/// Get the sources JSONL path for a base.
pub fn get_sources_path(workspace: &Path, base_name: &str) -> PathBuf {
    get_base_dir(workspace, base_name).join("sources.jsonl")
}
