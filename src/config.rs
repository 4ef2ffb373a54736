//! TOML configuration.
//!
//! Every section is optional; omitted fields fall back to the defaults
//! below, which reproduce the assistant's stock behaviour (1024/100
//! character chunks, top-10 retrieval with a permissive 0.0 threshold,
//! index stored under `chroma_db`).

use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::error::{RagError, Result};

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub llm: LlmConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StoreConfig {
    #[serde(default = "default_store_path")]
    pub path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_store_path(),
        }
    }
}

fn default_store_path() -> PathBuf {
    PathBuf::from("chroma_db")
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
        }
    }
}

fn default_chunk_size() -> usize {
    1024
}
fn default_chunk_overlap() -> usize {
    100
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_k")]
    pub k: usize,
    #[serde(default)]
    pub score_threshold: f32,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            k: default_k(),
            score_threshold: 0.0,
        }
    }
}

fn default_k() -> usize {
    10
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: None,
            dims: None,
            batch_size: default_batch_size(),
            url: None,
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_provider() -> String {
    "local".to_string()
}
fn default_batch_size() -> usize {
    64
}
fn default_max_retries() -> u32 {
    5
}
fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct LlmConfig {
    #[serde(default = "default_model")]
    pub default_model: String,
    #[serde(default = "default_ollama_url")]
    pub url: String,
    /// Executable queried with `list` for installed models.
    #[serde(default = "default_command")]
    pub command: String,
    #[serde(default = "default_llm_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_llm_max_retries")]
    pub max_retries: u32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            default_model: default_model(),
            url: default_ollama_url(),
            command: default_command(),
            timeout_secs: default_llm_timeout_secs(),
            max_retries: default_llm_max_retries(),
        }
    }
}

fn default_model() -> String {
    "mistral:latest".to_string()
}
pub(crate) fn default_ollama_url() -> String {
    "http://localhost:11434".to_string()
}
fn default_command() -> String {
    "ollama".to_string()
}
fn default_llm_timeout_secs() -> u64 {
    300
}
fn default_llm_max_retries() -> u32 {
    2
}

impl Config {
    pub fn validate(&self) -> Result<()> {
        if self.chunking.chunk_size == 0 {
            return Err(invalid("chunking.chunk_size must be > 0"));
        }
        if self.chunking.chunk_overlap >= self.chunking.chunk_size {
            return Err(invalid(
                "chunking.chunk_overlap must be smaller than chunking.chunk_size",
            ));
        }
        if self.retrieval.k == 0 {
            return Err(invalid("retrieval.k must be >= 1"));
        }
        if !self.retrieval.score_threshold.is_finite() {
            return Err(invalid("retrieval.score_threshold must be a finite number"));
        }
        if self.embedding.batch_size == 0 {
            return Err(invalid("embedding.batch_size must be > 0"));
        }
        if self.embedding.dims == Some(0) {
            return Err(invalid("embedding.dims must be > 0"));
        }
        match self.embedding.provider.as_str() {
            "local" | "hash" => {}
            "ollama" => {
                if self.embedding.model.is_none() {
                    return Err(invalid("embedding.model is required when provider is 'ollama'"));
                }
                if self.embedding.dims.is_none() {
                    return Err(invalid("embedding.dims is required when provider is 'ollama'"));
                }
            }
            other => {
                return Err(invalid(&format!(
                    "Unknown embedding provider: '{}'. Must be local, ollama, or hash.",
                    other
                )))
            }
        }
        if self.llm.command.trim().is_empty() {
            return Err(invalid("llm.command must not be empty"));
        }
        Ok(())
    }
}

fn invalid(msg: &str) -> RagError {
    RagError::Configuration(msg.to_string())
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        RagError::Configuration(format!(
            "Failed to read config file {}: {}",
            path.display(),
            e
        ))
    })?;

    let config: Config = toml::from_str(&content)
        .map_err(|e| RagError::Configuration(format!("Failed to parse config file: {}", e)))?;

    config.validate()?;
    Ok(config)
}

/// Loads `path` if it exists, otherwise returns validated defaults.
pub fn load_config_or_default(path: &Path) -> Result<Config> {
    if path.exists() {
        load_config(path)
    } else {
        let config = Config::default();
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(toml_src: &str) -> Result<Config> {
        let config: Config = toml::from_str(toml_src)
            .map_err(|e| RagError::Configuration(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    #[test]
    fn empty_file_uses_defaults() {
        let config = parse("").unwrap();
        assert_eq!(config.store.path, PathBuf::from("chroma_db"));
        assert_eq!(config.chunking.chunk_size, 1024);
        assert_eq!(config.chunking.chunk_overlap, 100);
        assert_eq!(config.retrieval.k, 10);
        assert_eq!(config.retrieval.score_threshold, 0.0);
        assert_eq!(config.embedding.provider, "local");
        assert_eq!(config.llm.default_model, "mistral:latest");
        assert_eq!(config.llm.command, "ollama");
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let config = parse("[retrieval]\nk = 3\n\n[embedding]\nprovider = \"hash\"\n").unwrap();
        assert_eq!(config.retrieval.k, 3);
        assert_eq!(config.retrieval.score_threshold, 0.0);
        assert_eq!(config.embedding.provider, "hash");
        assert_eq!(config.embedding.batch_size, 64);
    }

    #[test]
    fn overlap_must_be_smaller_than_size() {
        let err = parse("[chunking]\nchunk_size = 100\nchunk_overlap = 100\n").unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn unknown_provider_rejected() {
        let err = parse("[embedding]\nprovider = \"word2vec\"\n").unwrap_err();
        assert!(err.to_string().contains("word2vec"));
    }

    #[test]
    fn ollama_embeddings_need_model_and_dims() {
        assert!(parse("[embedding]\nprovider = \"ollama\"\ndims = 768\n").is_err());
        assert!(parse("[embedding]\nprovider = \"ollama\"\nmodel = \"nomic-embed-text\"\n").is_err());
        assert!(parse(
            "[embedding]\nprovider = \"ollama\"\nmodel = \"nomic-embed-text\"\ndims = 768\n"
        )
        .is_ok());
    }

    #[test]
    fn zero_k_rejected() {
        assert!(parse("[retrieval]\nk = 0\n").is_err());
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let tmp = tempfile::TempDir::new().unwrap();
        let config = load_config_or_default(&tmp.path().join("absent.toml")).unwrap();
        assert_eq!(config.retrieval.k, 10);
        assert!(load_config(&tmp.path().join("absent.toml")).is_err());
    }
}
