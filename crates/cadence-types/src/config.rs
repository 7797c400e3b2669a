//! Configuration types for Cadence.
//!
//! `AppConfig` represents `config.toml` in the data directory. Every section
//! and field has a default, so an empty file is a valid configuration.
//! Environment variable overrides are applied by the loader in cadence-infra.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub memory: MemoryConfig,
    #[serde(default)]
    pub knowledge: KnowledgeConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub agent: AgentConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8000
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Chat model settings. The API key is not part of the file; it comes from
/// `GOOGLE_API_KEY` only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    #[serde(default = "default_model_name")]
    pub name: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_model_base_url")]
    pub base_url: String,
    #[serde(default = "default_model_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_model_name() -> String {
    "gemini-2.0-flash".to_string()
}

fn default_temperature() -> f32 {
    0.7
}

fn default_model_base_url() -> String {
    "https://generativelanguage.googleapis.com".to_string()
}

fn default_model_timeout_secs() -> u64 {
    120
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            name: default_model_name(),
            temperature: default_temperature(),
            base_url: default_model_base_url(),
            timeout_secs: default_model_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    /// Index directory; relative paths resolve against the data directory.
    #[serde(default)]
    pub index_dir: Option<PathBuf>,
    /// Memories injected into each chat turn.
    #[serde(default = "default_context_top_k")]
    pub context_top_k: usize,
    /// Memories listed by the `memory` shortcut.
    #[serde(default = "default_recall_top_k")]
    pub recall_top_k: usize,
}

fn default_context_top_k() -> usize {
    3
}

fn default_recall_top_k() -> usize {
    10
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            index_dir: None,
            context_top_k: default_context_top_k(),
            recall_top_k: default_recall_top_k(),
        }
    }
}

impl MemoryConfig {
    pub fn resolve_index_dir(&self, data_dir: &Path) -> PathBuf {
        resolve(data_dir, self.index_dir.as_deref(), "memory_index")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeConfig {
    #[serde(default)]
    pub index_dir: Option<PathBuf>,
    /// JSON corpus loaded into an empty index on first use.
    #[serde(default = "default_knowledge_source")]
    pub source: PathBuf,
}

fn default_knowledge_source() -> PathBuf {
    PathBuf::from("data/knowledge_base.json")
}

impl Default for KnowledgeConfig {
    fn default() -> Self {
        Self {
            index_dir: None,
            source: default_knowledge_source(),
        }
    }
}

impl KnowledgeConfig {
    pub fn resolve_index_dir(&self, data_dir: &Path) -> PathBuf {
        resolve(data_dir, self.index_dir.as_deref(), "knowledge_index")
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// sqlx SQLite URL. Defaults to `cadence.db` inside the data directory.
    #[serde(default)]
    pub url: Option<String>,
}

impl DatabaseConfig {
    pub fn resolve_url(&self, data_dir: &Path) -> String {
        match &self.url {
            Some(url) => url.clone(),
            None => format!("sqlite://{}?mode=rwc", data_dir.join("cadence.db").display()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Upper bound on model round-trips per agent invocation.
    #[serde(default = "default_max_steps")]
    pub max_steps: usize,
    /// Character limit of the interaction summary saved to memory.
    #[serde(default = "default_summary_max_chars")]
    pub summary_max_chars: usize,
    #[serde(default)]
    pub system_prompt_path: Option<PathBuf>,
    #[serde(default)]
    pub context_prompt_path: Option<PathBuf>,
}

fn default_max_steps() -> usize {
    8
}

fn default_summary_max_chars() -> usize {
    900
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_steps: default_max_steps(),
            summary_max_chars: default_summary_max_chars(),
            system_prompt_path: None,
            context_prompt_path: None,
        }
    }
}

fn resolve(data_dir: &Path, configured: Option<&Path>, fallback: &str) -> PathBuf {
    match configured {
        Some(path) if path.is_absolute() => path.to_path_buf(),
        Some(path) => data_dir.join(path),
        None => data_dir.join(fallback),
    }
}
