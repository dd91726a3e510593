//! Runtime configuration for the diagnose pipeline.
//!
//! Resolution order (highest priority first):
//! 1. Environment variables (`DDX_*`, plus `OPENAI_API_KEY` for the key)
//! 2. Values from the TOML file passed with `--config`
//! 3. Built-in defaults

use std::path::{Path, PathBuf};
use std::time::Duration;

use ddx_coordination::retrieval::SearchParams;
use serde::Deserialize;
use thiserror::Error;

pub const ENV_API_KEY: &str = "OPENAI_API_KEY";
pub const ENV_ORACLE_MODEL: &str = "DDX_ORACLE_MODEL";
pub const ENV_ORACLE_BASE_URL: &str = "DDX_ORACLE_BASE_URL";
pub const ENV_ORACLE_TEMPERATURE: &str = "DDX_ORACLE_TEMPERATURE";
pub const ENV_ORACLE_TIMEOUT_SECS: &str = "DDX_ORACLE_TIMEOUT_SECS";
pub const ENV_EMBED_MODEL: &str = "DDX_EMBED_MODEL";
pub const ENV_EMBED_BASE_URL: &str = "DDX_EMBED_BASE_URL";
pub const ENV_K_DENSE: &str = "DDX_K_DENSE";
pub const ENV_K_SPARSE: &str = "DDX_K_SPARSE";
pub const ENV_K_FINAL: &str = "DDX_K_FINAL";
pub const ENV_SNIPPETS_SHOWN: &str = "DDX_SNIPPETS_SHOWN";
pub const ENV_CASES_SHOWN: &str = "DDX_CASES_SHOWN";
pub const ENV_LITERATURE_DIR: &str = "DDX_LITERATURE_DIR";
pub const ENV_DENSE_INDEX: &str = "DDX_DENSE_INDEX";
pub const ENV_CASES_PATH: &str = "DDX_CASES_PATH";
pub const ENV_GRAPH_PATH: &str = "DDX_GRAPH_PATH";

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_ORACLE_MODEL: &str = "gpt-4o";
pub const DEFAULT_TEMPERATURE: f32 = 0.2;
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_EMBED_MODEL: &str = "text-embedding-3-large";
pub const DEFAULT_SNIPPETS_SHOWN: usize = 8;
pub const DEFAULT_CASES_SHOWN: usize = 5;
pub const DEFAULT_SNIPPET_CHARS: usize = 350;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config TOML: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("invalid value {value:?} for {key}")]
    InvalidValue { key: String, value: String },
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Reasoning oracle endpoint (OpenAI-compatible chat completions).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OracleConfig {
    pub base_url: String,
    pub api_key: String,
    pub model: String,
    pub temperature: f32,
    /// Per-call timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: String::new(),
            model: DEFAULT_ORACLE_MODEL.to_string(),
            temperature: DEFAULT_TEMPERATURE,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl OracleConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Embedding endpoint used by dense and case search.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub base_url: String,
    /// Empty means "reuse the oracle key".
    pub api_key: String,
    pub model: String,
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: String::new(),
            model: DEFAULT_EMBED_MODEL.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    pub k_dense: usize,
    pub k_sparse: usize,
    pub k_final: usize,
    /// Literature snippets shown to a specialist.
    pub snippets_shown: usize,
    /// Prior cases shown to a specialist.
    pub cases_shown: usize,
    /// Characters kept per snippet or case in the prompt.
    pub snippet_chars: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        let params = SearchParams::default();
        Self {
            k_dense: params.k_dense,
            k_sparse: params.k_sparse,
            k_final: params.k_final,
            snippets_shown: DEFAULT_SNIPPETS_SHOWN,
            cases_shown: DEFAULT_CASES_SHOWN,
            snippet_chars: DEFAULT_SNIPPET_CHARS,
        }
    }
}

impl RetrievalConfig {
    pub fn search_params(&self) -> SearchParams {
        SearchParams {
            k_dense: self.k_dense,
            k_sparse: self.k_sparse,
            k_final: self.k_final,
        }
    }
}

/// On-disk locations of the read-only data the core consumes.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DataPaths {
    /// Directory of `*.jsonl` literature files (or a single file).
    pub literature: PathBuf,
    pub dense_index: PathBuf,
    pub cases: PathBuf,
    /// SQLite database, or a `.json` graph snapshot.
    pub graph: PathBuf,
}

impl Default for DataPaths {
    fn default() -> Self {
        Self {
            literature: PathBuf::from("data/literature"),
            dense_index: PathBuf::from("data/index/dense.json"),
            cases: PathBuf::from("data/cases.jsonl"),
            graph: PathBuf::from("data/kg.db"),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DdxConfig {
    pub oracle: OracleConfig,
    pub embedding: EmbeddingConfig,
    pub retrieval: RetrievalConfig,
    pub paths: DataPaths,
}

impl DdxConfig {
    /// Defaults, then `path` if given, then the process environment.
    pub fn load(path: Option<&Path>) -> ConfigResult<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> ConfigResult<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from `lookup` (normally the process environment).
    pub fn apply_overrides<F>(&mut self, lookup: F) -> ConfigResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(key) = lookup(ENV_API_KEY) {
            self.oracle.api_key = key;
        }
        override_string(&lookup, ENV_ORACLE_MODEL, &mut self.oracle.model);
        override_string(&lookup, ENV_ORACLE_BASE_URL, &mut self.oracle.base_url);
        override_parsed(&lookup, ENV_ORACLE_TEMPERATURE, &mut self.oracle.temperature)?;
        override_parsed(&lookup, ENV_ORACLE_TIMEOUT_SECS, &mut self.oracle.timeout_secs)?;
        override_string(&lookup, ENV_EMBED_MODEL, &mut self.embedding.model);
        override_string(&lookup, ENV_EMBED_BASE_URL, &mut self.embedding.base_url);
        override_parsed(&lookup, ENV_K_DENSE, &mut self.retrieval.k_dense)?;
        override_parsed(&lookup, ENV_K_SPARSE, &mut self.retrieval.k_sparse)?;
        override_parsed(&lookup, ENV_K_FINAL, &mut self.retrieval.k_final)?;
        override_parsed(&lookup, ENV_SNIPPETS_SHOWN, &mut self.retrieval.snippets_shown)?;
        override_parsed(&lookup, ENV_CASES_SHOWN, &mut self.retrieval.cases_shown)?;
        override_path(&lookup, ENV_LITERATURE_DIR, &mut self.paths.literature);
        override_path(&lookup, ENV_DENSE_INDEX, &mut self.paths.dense_index);
        override_path(&lookup, ENV_CASES_PATH, &mut self.paths.cases);
        override_path(&lookup, ENV_GRAPH_PATH, &mut self.paths.graph);
        self.validate()
    }

    /// Key used for embeddings: its own, else the oracle's.
    pub fn embedding_api_key(&self) -> &str {
        if self.embedding.api_key.is_empty() {
            &self.oracle.api_key
        } else {
            &self.embedding.api_key
        }
    }

    fn validate(&self) -> ConfigResult<()> {
        if !(0.0..=2.0).contains(&self.oracle.temperature) {
            return Err(invalid("oracle.temperature", self.oracle.temperature));
        }
        if self.oracle.timeout_secs == 0 {
            return Err(invalid("oracle.timeout_secs", self.oracle.timeout_secs));
        }
        if self.retrieval.k_final == 0 {
            return Err(invalid("retrieval.k_final", self.retrieval.k_final));
        }
        Ok(())
    }
}

fn invalid(key: &str, value: impl ToString) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    }
}

fn override_string<F: Fn(&str) -> Option<String>>(lookup: &F, key: &str, slot: &mut String) {
    if let Some(value) = lookup(key).filter(|v| !v.trim().is_empty()) {
        *slot = value;
    }
}

fn override_path<F: Fn(&str) -> Option<String>>(lookup: &F, key: &str, slot: &mut PathBuf) {
    if let Some(value) = lookup(key).filter(|v| !v.trim().is_empty()) {
        *slot = PathBuf::from(value);
    }
}

fn override_parsed<F, T>(lookup: &F, key: &str, slot: &mut T) -> ConfigResult<()>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    if let Some(raw) = lookup(key) {
        *slot = raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
            key: key.to_string(),
            value: raw.clone(),
        })?;
    }
    Ok(())
}
