//! Configuration for docmaint

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default configuration file name
pub const CONFIG_FILE: &str = "docmaint.toml";

/// Environment variable consulted when `llm.api_key` is unset
pub const LLM_API_KEY_ENV: &str = "GROQ_API_KEY";

/// Environment variable consulted when `embedding.api_key` is unset
pub const EMBEDDING_API_KEY_ENV: &str = "OPENAI_API_KEY";

/// Top-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Path patterns skipped while walking the source repository
    #[serde(default = "default_ignore_patterns")]
    pub ignore_patterns: Vec<String>,

    /// Where sources, index artifacts and generated docs live
    #[serde(default)]
    pub paths: PathsConfig,

    /// Embedding provider used for ingestion and queries
    #[serde(default)]
    pub embedding: EmbeddingConfig,

    /// Chat-completion endpoint used for writing and judging docs
    #[serde(default)]
    pub llm: LlmSettings,

    /// Retrieval settings
    #[serde(default)]
    pub search: SearchConfig,

    /// Directory relative paths are resolved against
    #[serde(skip)]
    base_dir: PathBuf,
}

/// Data directory layout
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Root of the Python sources to ingest
    #[serde(default = "default_repo_dir")]
    pub repo_dir: PathBuf,

    /// Directory holding `code.index` and `metadata.json`
    #[serde(default = "default_index_dir")]
    pub index_dir: PathBuf,

    /// Directory generated Markdown is written to
    #[serde(default = "default_docs_dir")]
    pub docs_dir: PathBuf,
}

/// Embedding provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// `ollama`, `openai` or `mock`
    #[serde(default = "default_embedding_provider")]
    pub provider: String,

    #[serde(default = "default_embedding_endpoint")]
    pub endpoint: String,

    #[serde(default = "default_embedding_model")]
    pub model: String,

    /// Output width of the model
    #[serde(default = "default_embedding_dimension")]
    pub dimension: usize,

    /// Texts per embedding request during ingestion
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// API key (if required); falls back to `OPENAI_API_KEY`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

/// LLM configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmSettings {
    /// OpenAI-compatible API base URL
    #[serde(default = "default_llm_endpoint")]
    pub endpoint: String,

    /// Model name to use
    #[serde(default = "default_llm_model")]
    pub model: String,

    /// API key; falls back to `GROQ_API_KEY`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Maximum tokens for response
    #[serde(default = "default_max_tokens")]
    pub max_tokens: usize,
}

/// Retrieval configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Number of chunks selected per pipeline run
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

fn default_ignore_patterns() -> Vec<String> {
    vec![
        ".git".to_string(),
        ".venv".to_string(),
        "venv".to_string(),
        "__pycache__".to_string(),
        ".tox".to_string(),
        "node_modules".to_string(),
        "build/**".to_string(),
    ]
}

fn default_repo_dir() -> PathBuf {
    PathBuf::from("data/repo")
}

fn default_index_dir() -> PathBuf {
    PathBuf::from("data/index")
}

fn default_docs_dir() -> PathBuf {
    PathBuf::from("data/docs")
}

fn default_embedding_provider() -> String {
    "ollama".to_string()
}

fn default_embedding_endpoint() -> String {
    "http://localhost:11434".to_string()
}

fn default_embedding_model() -> String {
    "all-minilm".to_string()
}

fn default_embedding_dimension() -> usize {
    384
}

fn default_batch_size() -> usize {
    32
}

fn default_llm_endpoint() -> String {
    "https://api.groq.com/openai".to_string()
}

fn default_llm_model() -> String {
    "llama-3.3-70b-versatile".to_string()
}

fn default_max_tokens() -> usize {
    2048
}

fn default_top_k() -> usize {
    10
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            repo_dir: default_repo_dir(),
            index_dir: default_index_dir(),
            docs_dir: default_docs_dir(),
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_embedding_provider(),
            endpoint: default_embedding_endpoint(),
            model: default_embedding_model(),
            dimension: default_embedding_dimension(),
            batch_size: default_batch_size(),
            api_key: None,
        }
    }
}

impl EmbeddingConfig {
    /// Configured key, or `OPENAI_API_KEY` from the environment
    pub fn resolved_api_key(&self) -> Option<String> {
        non_empty(self.api_key.clone()).or_else(|| non_empty(std::env::var(EMBEDDING_API_KEY_ENV).ok()))
    }
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            endpoint: default_llm_endpoint(),
            model: default_llm_model(),
            api_key: None,
            max_tokens: default_max_tokens(),
        }
    }
}

impl LlmSettings {
    /// Configured key, or `GROQ_API_KEY` from the environment
    pub fn resolved_api_key(&self) -> Option<String> {
        non_empty(self.api_key.clone()).or_else(|| non_empty(std::env::var(LLM_API_KEY_ENV).ok()))
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            ignore_patterns: default_ignore_patterns(),
            paths: PathsConfig::default(),
            embedding: EmbeddingConfig::default(),
            llm: LlmSettings::default(),
            search: SearchConfig::default(),
            base_dir: PathBuf::from("."),
        }
    }
}

impl Config {
    /// Load configuration from `path` or return defaults if it does not exist
    ///
    /// Relative paths in the file resolve against the file's directory.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        let base_dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));

        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)?;
            toml::from_str::<Config>(&content).map_err(|e| Error::Config {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?
        } else {
            tracing::debug!("No config at {:?}, using defaults", path);
            Self::default()
        };

        config.base_dir = base_dir;
        Ok(config)
    }

    /// Save configuration to `path`
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self).map_err(|e| Error::Config {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

        std::fs::write(path, content)?;
        Ok(())
    }

    /// Resolve relative paths against `dir` instead of the config file's directory
    pub fn with_base_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.base_dir = dir.into();
        self
    }

    /// Resolve a configured path against the config file's directory
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir.join(path)
        }
    }

    pub fn repo_dir(&self) -> PathBuf {
        self.resolve(&self.paths.repo_dir)
    }

    pub fn index_dir(&self) -> PathBuf {
        self.resolve(&self.paths.index_dir)
    }

    pub fn docs_dir(&self) -> PathBuf {
        self.resolve(&self.paths.docs_dir)
    }

    /// Check if a repository-relative path should be ignored
    pub fn should_ignore(&self, path: &str) -> bool {
        self.ignore_patterns
            .iter()
            .any(|pattern| glob_match_simple(pattern, path))
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Simple glob matching helper
///
/// Supports `prefix/**`, `*.ext` style single-star patterns, and bare names
/// that match any path component.
fn glob_match_simple(pattern: &str, path: &str) -> bool {
    if pattern.contains("**") {
        let parts: Vec<&str> = pattern.split("**").collect();
        if parts.len() == 2 {
            let prefix = parts[0].trim_end_matches('/');
            let suffix = parts[1].trim_start_matches('/');
            return (prefix.is_empty() || path.starts_with(prefix))
                && (suffix.is_empty() || path.ends_with(suffix));
        }
    }

    if pattern.contains('*') {
        let parts: Vec<&str> = pattern.split('*').collect();
        if parts.len() == 2 {
            return path.starts_with(parts[0]) && path.ends_with(parts[1]);
        }
    }

    if !pattern.contains('/') {
        return path.split('/').any(|component| component == pattern);
    }

    path == pattern || path.ends_with(&format!("/{}", pattern))
}
