#[cfg(test)]
mod tests;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;
use url::Url;

use crate::agent::RetrievalConfig;
use crate::chunking::ChunkingConfig;
use crate::http::DEFAULT_TIMEOUT_SECONDS;

pub const OPENAI_API_KEY_VAR: &str = "OPENAI_API_KEY";
pub const PINECONE_API_KEY_VAR: &str = "PINECONE_API_KEY";
pub const PINECONE_ENVIRONMENT_VAR: &str = "PINECONE_ENVIRONMENT";
pub const PINECONE_INDEX_VAR: &str = "PINECONE_INDEX";

const CONFIG_FILE_NAME: &str = "config.toml";
const APP_DIR_NAME: &str = "docs-rag";
const MAX_INDEX_NAME_LENGTH: usize = 45;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    #[serde(default = "default_log_file")]
    pub log_file: PathBuf,
    #[serde(default)]
    pub openai: OpenAiConfig,
    #[serde(default)]
    pub pinecone: PineconeConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(skip)]
    pub base_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct OpenAiConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    pub base_url: String,
    pub embedding_model: String,
    pub embedding_dimension: u32,
    pub chat_model: String,
    pub temperature: f32,
    pub batch_size: u32,
    pub timeout_seconds: u64,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://api.openai.com/v1".to_string(),
            embedding_model: "text-embedding-3-small".to_string(),
            embedding_dimension: 1536,
            chat_model: "gpt-4".to_string(),
            temperature: 0.0,
            batch_size: 100,
            timeout_seconds: DEFAULT_TIMEOUT_SECONDS,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Metric {
    #[default]
    Cosine,
    Euclidean,
    Dotproduct,
}

impl Metric {
    #[inline]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Cosine => "cosine",
            Self::Euclidean => "euclidean",
            Self::Dotproduct => "dotproduct",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PineconeConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    pub controller_url: String,
    /// Region the serverless index lives in
    pub environment: String,
    pub cloud: String,
    pub index_name: String,
    pub metric: Metric,
    pub upsert_batch_size: u32,
    pub ready_poll_attempts: u32,
    pub ready_poll_interval_ms: u64,
    /// Request timeout for control-plane and data-plane calls
    pub timeout_seconds: u64,
}

impl Default for PineconeConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            controller_url: "https://api.pinecone.io".to_string(),
            environment: "us-east-1".to_string(),
            cloud: "aws".to_string(),
            index_name: "rag-documents".to_string(),
            metric: Metric::Cosine,
            upsert_batch_size: 100,
            ready_poll_attempts: 60,
            ready_poll_interval_ms: 1000,
            timeout_seconds: DEFAULT_TIMEOUT_SECONDS,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_file: default_log_file(),
            openai: OpenAiConfig::default(),
            pinecone: PineconeConfig::default(),
            chunking: ChunkingConfig::default(),
            retrieval: RetrievalConfig::default(),
            base_dir: PathBuf::new(),
        }
    }
}

fn default_log_file() -> PathBuf {
    PathBuf::from("app.log")
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration directory not found or could not be created")]
    DirectoryError,
    #[error("Invalid URL format: {0}")]
    InvalidUrl(String),
    #[error("Invalid model name: {0} (cannot be empty)")]
    InvalidModel(String),
    #[error("Invalid embedding dimension: {0} (must be between 64 and 4096)")]
    InvalidEmbeddingDimension(u32),
    #[error("Invalid temperature: {0} (must be between 0.0 and 2.0)")]
    InvalidTemperature(f32),
    #[error("Invalid embedding batch size: {0} (must be between 1 and 2048)")]
    InvalidBatchSize(u32),
    #[error("Invalid upsert batch size: {0} (must be between 1 and 1000)")]
    InvalidUpsertBatchSize(u32),
    #[error("Invalid timeout: {0} (must be between 1 and 600 seconds)")]
    InvalidTimeout(u64),
    #[error(
        "Invalid index name: {0} (lowercase letters, digits and '-', at most 45 characters)"
    )]
    InvalidIndexName(String),
    #[error("Invalid environment: {0} (cannot be empty)")]
    InvalidEnvironment(String),
    #[error("Invalid cloud: {0} (must be 'aws', 'gcp' or 'azure')")]
    InvalidCloud(String),
    #[error("Invalid max length: {0} (must be between 1 and 100000)")]
    InvalidMaxLength(usize),
    #[error("Invalid top_k: {0} (must be between 1 and 1000)")]
    InvalidTopK(usize),
    #[error("Invalid memory window: {0} (must be at least 1)")]
    InvalidMemoryWindow(usize),
    #[error("Invalid context budget: {0} (must be at least 1)")]
    InvalidContextBudget(usize),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parsing error: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

impl Config {
    /// Per-user configuration directory
    #[inline]
    pub fn config_dir() -> Result<PathBuf, ConfigError> {
        dirs::config_dir()
            .map(|dir| dir.join(APP_DIR_NAME))
            .ok_or(ConfigError::DirectoryError)
    }

    /// Load from the per-user configuration directory with environment overrides applied
    #[inline]
    pub fn load_default() -> Result<Self> {
        let config_dir = Self::config_dir().context("Failed to locate configuration directory")?;
        Self::load(config_dir)
    }

    /// Load `config.toml` from `config_dir`, apply environment overrides and validate
    #[inline]
    pub fn load<P: AsRef<Path>>(config_dir: P) -> Result<Self> {
        let mut config = Self::load_file(config_dir)?;
        config.apply_env_overrides();

        config
            .validate()
            .with_context(|| "Configuration validation failed")?;

        Ok(config)
    }

    /// Load `config.toml` without consulting the environment. A missing file yields defaults.
    #[inline]
    pub fn load_file<P: AsRef<Path>>(config_dir: P) -> Result<Self> {
        let config_path = config_dir.as_ref().join(CONFIG_FILE_NAME);

        if !config_path.exists() {
            debug!(
                "No configuration at {}, using defaults",
                config_path.display()
            );
            return Ok(Self {
                base_dir: config_dir.as_ref().to_path_buf(),
                ..Self::default()
            });
        }

        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        let mut config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", config_path.display()))?;
        config.base_dir = config_dir.as_ref().to_path_buf();

        Ok(config)
    }

    #[inline]
    pub fn save(&self) -> Result<()> {
        self.validate()
            .context("Configuration validation failed before saving")?;

        let config_dir = self.get_base_dir();

        fs::create_dir_all(config_dir).with_context(|| {
            format!(
                "Failed to create config directory: {}",
                config_dir.display()
            )
        })?;

        let config_path = self.config_file_path();
        let content = toml::to_string_pretty(self).context("Failed to serialize config to TOML")?;

        fs::write(&config_path, content)
            .with_context(|| format!("Failed to write config file: {}", config_path.display()))?;

        Ok(())
    }

    /// Overlay API keys, region and index name from the process environment
    #[inline]
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|name| std::env::var(name).ok());
    }

    /// Overlay API keys, region and index name from `lookup`; empty values are ignored
    #[inline]
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        if let Some(key) = non_empty(OPENAI_API_KEY_VAR) {
            debug!("Using OpenAI API key from {}", OPENAI_API_KEY_VAR);
            self.openai.api_key = Some(key);
        }
        if let Some(key) = non_empty(PINECONE_API_KEY_VAR) {
            debug!("Using Pinecone API key from {}", PINECONE_API_KEY_VAR);
            self.pinecone.api_key = Some(key);
        }
        if let Some(environment) = non_empty(PINECONE_ENVIRONMENT_VAR) {
            self.pinecone.environment = environment;
        }
        if let Some(index_name) = non_empty(PINECONE_INDEX_VAR) {
            self.pinecone.index_name = index_name;
        }
    }

    /// Get the base directory for the application
    #[inline]
    pub fn get_base_dir(&self) -> &Path {
        &self.base_dir
    }

    #[inline]
    pub fn config_file_path(&self) -> PathBuf {
        self.get_base_dir().join(CONFIG_FILE_NAME)
    }

    #[inline]
    pub fn openai_url(&self) -> Result<Url, ConfigError> {
        Url::parse(&self.openai.base_url)
            .map_err(|_| ConfigError::InvalidUrl(self.openai.base_url.clone()))
    }

    #[inline]
    pub fn controller_url(&self) -> Result<Url, ConfigError> {
        Url::parse(&self.pinecone.controller_url)
            .map_err(|_| ConfigError::InvalidUrl(self.pinecone.controller_url.clone()))
    }

    #[inline]
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.openai.validate()?;
        self.pinecone.validate()?;
        self.validate_chunking_config()?;
        self.validate_retrieval_config()?;
        Ok(())
    }

    fn validate_chunking_config(&self) -> Result<(), ConfigError> {
        // chunk_overlap is clamped at chunking time rather than rejected here
        if !(1..=100_000).contains(&self.chunking.max_length) {
            return Err(ConfigError::InvalidMaxLength(self.chunking.max_length));
        }
        Ok(())
    }

    fn validate_retrieval_config(&self) -> Result<(), ConfigError> {
        let config = &self.retrieval;

        if !(1..=1000).contains(&config.top_k) {
            return Err(ConfigError::InvalidTopK(config.top_k));
        }

        if config.memory_window == 0 {
            return Err(ConfigError::InvalidMemoryWindow(config.memory_window));
        }

        if config.max_context_chars == 0 {
            return Err(ConfigError::InvalidContextBudget(config.max_context_chars));
        }

        Ok(())
    }
}

impl OpenAiConfig {
    #[inline]
    pub fn validate(&self) -> Result<(), ConfigError> {
        let url = Url::parse(&self.base_url)
            .map_err(|_| ConfigError::InvalidUrl(self.base_url.clone()))?;
        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(ConfigError::InvalidUrl(self.base_url.clone()));
        }

        if self.embedding_model.trim().is_empty() {
            return Err(ConfigError::InvalidModel(self.embedding_model.clone()));
        }

        if self.chat_model.trim().is_empty() {
            return Err(ConfigError::InvalidModel(self.chat_model.clone()));
        }

        if !(64..=4096).contains(&self.embedding_dimension) {
            return Err(ConfigError::InvalidEmbeddingDimension(
                self.embedding_dimension,
            ));
        }

        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(ConfigError::InvalidTemperature(self.temperature));
        }

        if self.batch_size == 0 || self.batch_size > 2048 {
            return Err(ConfigError::InvalidBatchSize(self.batch_size));
        }

        if self.timeout_seconds == 0 || self.timeout_seconds > 600 {
            return Err(ConfigError::InvalidTimeout(self.timeout_seconds));
        }

        Ok(())
    }

    #[inline]
    pub fn set_embedding_model(&mut self, model: String) -> Result<(), ConfigError> {
        if model.trim().is_empty() {
            return Err(ConfigError::InvalidModel(model));
        }
        self.embedding_model = model;
        Ok(())
    }

    #[inline]
    pub fn set_chat_model(&mut self, model: String) -> Result<(), ConfigError> {
        if model.trim().is_empty() {
            return Err(ConfigError::InvalidModel(model));
        }
        self.chat_model = model;
        Ok(())
    }

    #[inline]
    pub fn set_embedding_dimension(&mut self, dimension: u32) -> Result<(), ConfigError> {
        if !(64..=4096).contains(&dimension) {
            return Err(ConfigError::InvalidEmbeddingDimension(dimension));
        }
        self.embedding_dimension = dimension;
        Ok(())
    }

    #[inline]
    pub fn set_batch_size(&mut self, batch_size: u32) -> Result<(), ConfigError> {
        if batch_size == 0 || batch_size > 2048 {
            return Err(ConfigError::InvalidBatchSize(batch_size));
        }
        self.batch_size = batch_size;
        Ok(())
    }
}

impl PineconeConfig {
    #[inline]
    pub fn validate(&self) -> Result<(), ConfigError> {
        Url::parse(&self.controller_url)
            .map_err(|_| ConfigError::InvalidUrl(self.controller_url.clone()))?;

        validate_index_name(&self.index_name)?;

        if self.environment.trim().is_empty() {
            return Err(ConfigError::InvalidEnvironment(self.environment.clone()));
        }

        if !["aws", "gcp", "azure"].contains(&self.cloud.as_str()) {
            return Err(ConfigError::InvalidCloud(self.cloud.clone()));
        }

        if self.upsert_batch_size == 0 || self.upsert_batch_size > 1000 {
            return Err(ConfigError::InvalidUpsertBatchSize(self.upsert_batch_size));
        }

        if self.timeout_seconds == 0 || self.timeout_seconds > 600 {
            return Err(ConfigError::InvalidTimeout(self.timeout_seconds));
        }

        Ok(())
    }

    #[inline]
    pub fn set_index_name(&mut self, index_name: String) -> Result<(), ConfigError> {
        validate_index_name(&index_name)?;
        self.index_name = index_name;
        Ok(())
    }

    #[inline]
    pub fn set_environment(&mut self, environment: String) -> Result<(), ConfigError> {
        if environment.trim().is_empty() {
            return Err(ConfigError::InvalidEnvironment(environment));
        }
        self.environment = environment;
        Ok(())
    }

    #[inline]
    pub fn set_cloud(&mut self, cloud: String) -> Result<(), ConfigError> {
        if !["aws", "gcp", "azure"].contains(&cloud.as_str()) {
            return Err(ConfigError::InvalidCloud(cloud));
        }
        self.cloud = cloud;
        Ok(())
    }
}

fn validate_index_name(name: &str) -> Result<(), ConfigError> {
    let valid = !name.is_empty()
        && name.len() <= MAX_INDEX_NAME_LENGTH
        && name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
        && !name.starts_with('-')
        && !name.ends_with('-');

    if valid {
        Ok(())
    } else {
        Err(ConfigError::InvalidIndexName(name.to_string()))
    }
}
