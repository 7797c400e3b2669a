//! Configuration loader for Cadence.
//!
//! Reads `config.toml` (by default from the data directory, `~/.cadence/`
//! in production) into [`AppConfig`], then applies environment variable
//! overrides. A missing or malformed file falls back to defaults.

use std::path::{Path, PathBuf};

use secrecy::SecretString;

use cadence_types::config::AppConfig;
use cadence_types::error::ConfigError;

pub const API_KEY_VAR: &str = "GOOGLE_API_KEY";

/// `CADENCE_DATA_DIR`, falling back to `~/.cadence`.
pub fn default_data_dir() -> PathBuf {
    match std::env::var("CADENCE_DATA_DIR") {
        Ok(dir) if !dir.is_empty() => PathBuf::from(dir),
        _ => dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".cadence"),
    }
}

/// Load `config_path`.
///
/// - If the file does not exist, returns [`AppConfig::default()`].
/// - If the file exists but fails to parse, logs a warning and returns the default.
pub async fn load_config_file(config_path: &Path) -> AppConfig {
    let content = match tokio::fs::read_to_string(config_path).await {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("No config.toml found at {}, using defaults", config_path.display());
            return AppConfig::default();
        }
        Err(err) => {
            tracing::warn!("Failed to read {}: {err}, using defaults", config_path.display());
            return AppConfig::default();
        }
    };

    match toml::from_str::<AppConfig>(&content) {
        Ok(config) => config,
        Err(err) => {
            tracing::warn!(
                "Failed to parse {}: {err}, using defaults",
                config_path.display()
            );
            AppConfig::default()
        }
    }
}

/// Apply the environment overrides visible through `lookup`.
///
/// Empty values are ignored. `GEMINI_TEMPERATURE` must parse as a float.
pub fn apply_env_overrides(
    config: &mut AppConfig,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<(), ConfigError> {
    let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

    if let Some(url) = get("DATABASE_URL") {
        config.database.url = Some(url);
    }
    if let Some(dir) = get("MEMORY_INDEX_DIR") {
        config.memory.index_dir = Some(PathBuf::from(dir));
    }
    if let Some(dir) = get("KNOWLEDGE_INDEX_DIR") {
        config.knowledge.index_dir = Some(PathBuf::from(dir));
    }
    if let Some(source) = get("KNOWLEDGE_SOURCE") {
        config.knowledge.source = PathBuf::from(source);
    }
    if let Some(model) = get("GEMINI_MODEL") {
        config.model.name = model;
    }
    if let Some(raw) = get("GEMINI_TEMPERATURE") {
        config.model.temperature =
            raw.trim()
                .parse::<f32>()
                .map_err(|e| ConfigError::InvalidValue {
                    key: "GEMINI_TEMPERATURE",
                    message: format!("'{raw}': {e}"),
                })?;
    }
    Ok(())
}

/// `config.toml` plus process environment overrides.
///
/// `config_path` defaults to `{data_dir}/config.toml`.
pub async fn load_config(
    data_dir: &Path,
    config_path: Option<&Path>,
) -> Result<AppConfig, ConfigError> {
    let path = config_path
        .map(Path::to_path_buf)
        .unwrap_or_else(|| data_dir.join("config.toml"));
    let mut config = load_config_file(&path).await;
    apply_env_overrides(&mut config, |key| std::env::var(key).ok())?;
    Ok(config)
}

/// The Gemini API key. Required before the server starts.
pub fn api_key_from(lookup: impl Fn(&str) -> Option<String>) -> Result<SecretString, ConfigError> {
    lookup(API_KEY_VAR)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .map(SecretString::from)
        .ok_or(ConfigError::MissingCredential(API_KEY_VAR))
}

pub fn api_key() -> Result<SecretString, ConfigError> {
    api_key_from(|key| std::env::var(key).ok())
}
