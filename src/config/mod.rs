//! Configuration management for boardgame-rag
//!
//! Handles loading, saving, and validating configuration from TOML files,
//! with environment variable overrides applied on top. The resulting
//! [`Config`] is built once at startup and handed to each component.

mod defaults;

pub use defaults::*;

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// HTTP server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Upload and database locations
    #[serde(default)]
    pub storage: StorageConfig,

    /// Vector index configuration
    #[serde(default)]
    pub vector: VectorConfig,

    /// Embedding model configuration
    #[serde(default)]
    pub embedding: EmbeddingConfig,

    /// Chunking configuration
    #[serde(default)]
    pub chunk: ChunkConfig,

    /// Ingestion pipeline configuration
    #[serde(default)]
    pub ingest: IngestConfig,

    /// Retrieval configuration
    #[serde(default)]
    pub query: QueryConfig,

    /// Paths configuration (internal, not user-editable)
    #[serde(skip)]
    pub paths: PathsConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    #[serde(default = "default_project_name")]
    pub project_name: String,

    /// Prefix for all API routes (e.g. /api/v1)
    #[serde(default = "default_api_prefix")]
    pub api_prefix: String,

    /// Maximum accepted upload size in bytes
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,

    #[serde(default = "default_allowed_content_types")]
    pub allowed_content_types: Vec<String>,

    #[serde(default = "default_cors_allowed_origins")]
    pub cors_allowed_origins: Vec<String>,
}

/// Storage locations; unset values resolve relative to the base directory
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upload_dir: Option<PathBuf>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub db_file: Option<PathBuf>,
}

/// Vector index backend kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VectorBackend {
    Qdrant,
    Memory,
}

impl std::str::FromStr for VectorBackend {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "qdrant" => Ok(VectorBackend::Qdrant),
            "memory" | "in-memory" => Ok(VectorBackend::Memory),
            _ => Err(Error::Config(format!("Unknown vector backend: {}", s))),
        }
    }
}

/// Vector index configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorConfig {
    #[serde(default = "default_vector_backend")]
    pub backend: VectorBackend,

    /// Qdrant connection URL
    #[serde(default = "default_qdrant_url")]
    pub qdrant_url: String,

    /// Environment variable name for Qdrant API key
    #[serde(default = "default_qdrant_api_key_env")]
    pub qdrant_api_key_env: String,

    #[serde(default = "default_collection_name")]
    pub collection_name: String,

    /// Timeout for a single index call in seconds
    #[serde(default = "default_vector_timeout")]
    pub timeout_secs: u64,
}

fn default_vector_backend() -> VectorBackend {
    VectorBackend::Qdrant
}

/// Embedding backend kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingBackend {
    Http,
    Local,
}

/// Embedding configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// Model name/identifier
    #[serde(default = "default_embedding_model")]
    pub model: String,

    /// Embedding dimension (must match model)
    #[serde(default = "default_embedding_dimension")]
    pub dimension: usize,

    /// Batch size for embedding
    #[serde(default = "default_embedding_batch_size")]
    pub batch_size: usize,

    #[serde(default = "default_embedding_backend")]
    pub backend: EmbeddingBackend,

    /// Base URL of the HTTP embedding backend
    #[serde(default = "default_embedding_backend_url")]
    pub backend_url: String,

    /// Timeout for a single embedding call in seconds
    #[serde(default = "default_embedding_timeout")]
    pub timeout_secs: u64,
}

fn default_embedding_backend() -> EmbeddingBackend {
    EmbeddingBackend::Http
}

/// Lookup the expected embedding dimension for a known model
pub fn embedding_dimension_for_model(model: &str) -> Option<usize> {
    match model {
        "BAAI/bge-small-en-v1.5" => Some(384),
        "BAAI/bge-base-en-v1.5" => Some(768),
        "BAAI/bge-large-en-v1.5" => Some(1024),
        "sentence-transformers/all-MiniLM-L6-v2" | "all-MiniLM-L6-v2" => Some(384),
        _ => None,
    }
}

impl EmbeddingConfig {
    /// Resolve the effective embedding dimension based on the configured model
    pub fn resolved_dimension(&self) -> usize {
        if let Some(expected) = embedding_dimension_for_model(&self.model) {
            if expected != self.dimension {
                warn!(
                    "Embedding dimension {} does not match model '{}' ({}); using {}",
                    self.dimension, self.model, expected, expected
                );
            }
            expected
        } else {
            self.dimension
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Chunking configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkConfig {
    /// Target characters per chunk
    #[serde(default = "default_chunk_window")]
    pub window_chars: usize,

    /// Characters shared between neighbouring chunks
    #[serde(default = "default_chunk_overlap")]
    pub overlap_chars: usize,

    /// Minimum chunk size (tiny trailing fragments are merged away)
    #[serde(default = "default_chunk_min_chars")]
    pub min_chars: usize,
}

/// Ingestion pipeline configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestConfig {
    /// Background workers processing uploaded rulebooks
    #[serde(default = "default_ingest_workers")]
    pub workers: usize,

    #[serde(default = "default_ingest_queue_capacity")]
    pub queue_capacity: usize,

    #[serde(default = "default_embed_max_attempts")]
    pub embed_max_attempts: u32,

    #[serde(default = "default_index_max_attempts")]
    pub index_max_attempts: u32,

    /// Points per vector index upsert call
    #[serde(default = "default_index_batch_size")]
    pub index_batch_size: usize,

    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,

    #[serde(default = "default_backoff_max_ms")]
    pub backoff_max_ms: u64,

    /// Upper bound for one whole ingestion job in seconds
    #[serde(default = "default_job_timeout")]
    pub job_timeout_secs: u64,
}

impl IngestConfig {
    pub fn job_timeout(&self) -> Duration {
        Duration::from_secs(self.job_timeout_secs)
    }
}

/// Query configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryConfig {
    /// Default number of results
    #[serde(default = "default_query_k")]
    pub default_k: usize,

    /// Maximum results allowed
    #[serde(default = "default_query_max_k")]
    pub max_k: usize,

    /// Minimum similarity score (0.0 - 1.0)
    #[serde(default = "default_query_min_score")]
    pub min_score: f32,

    /// Neighbours requested from the index per wanted result
    #[serde(default = "default_candidate_factor")]
    pub candidate_factor: usize,

    /// Scores closer than this are ordered by document position
    #[serde(default = "default_tie_epsilon")]
    pub tie_epsilon: f32,
}

/// Internal paths configuration
#[derive(Debug, Clone, Default)]
pub struct PathsConfig {
    /// Base directory for service data
    pub base_dir: PathBuf,

    /// Path to config file
    pub config_file: PathBuf,

    /// Path to SQLite database
    pub db_file: PathBuf,

    /// Directory where raw uploads are persisted
    pub upload_dir: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            project_name: default_project_name(),
            api_prefix: default_api_prefix(),
            max_upload_bytes: default_max_upload_bytes(),
            allowed_content_types: default_allowed_content_types(),
            cors_allowed_origins: default_cors_allowed_origins(),
        }
    }
}

impl Default for VectorConfig {
    fn default() -> Self {
        Self {
            backend: default_vector_backend(),
            qdrant_url: default_qdrant_url(),
            qdrant_api_key_env: default_qdrant_api_key_env(),
            collection_name: default_collection_name(),
            timeout_secs: default_vector_timeout(),
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model: default_embedding_model(),
            dimension: default_embedding_dimension(),
            batch_size: default_embedding_batch_size(),
            backend: default_embedding_backend(),
            backend_url: default_embedding_backend_url(),
            timeout_secs: default_embedding_timeout(),
        }
    }
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            window_chars: default_chunk_window(),
            overlap_chars: default_chunk_overlap(),
            min_chars: default_chunk_min_chars(),
        }
    }
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            workers: default_ingest_workers(),
            queue_capacity: default_ingest_queue_capacity(),
            embed_max_attempts: default_embed_max_attempts(),
            index_max_attempts: default_index_max_attempts(),
            index_batch_size: default_index_batch_size(),
            backoff_base_ms: default_backoff_base_ms(),
            backoff_max_ms: default_backoff_max_ms(),
            job_timeout_secs: default_job_timeout(),
        }
    }
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            default_k: default_query_k(),
            max_k: default_query_max_k(),
            min_score: default_query_min_score(),
            candidate_factor: default_candidate_factor(),
            tie_epsilon: default_tie_epsilon(),
        }
    }
}

impl Config {
    /// Get the default base directory (~/.boardgame-rag)
    pub fn default_base_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".boardgame-rag")
    }

    /// Get the default config file path
    pub fn default_config_path() -> PathBuf {
        Self::default_base_dir().join("config.toml")
    }

    /// Initialize paths configuration from a base directory
    pub fn init_paths(&mut self, base_dir: Option<PathBuf>) {
        let base = base_dir.unwrap_or_else(Self::default_base_dir);
        self.paths = PathsConfig {
            config_file: base.join("config.toml"),
            base_dir: base,
            ..Default::default()
        };
        self.resolve_storage_paths();
    }

    fn resolve_storage_paths(&mut self) {
        let base = self.paths.base_dir.clone();
        self.paths.db_file = self
            .storage
            .db_file
            .clone()
            .unwrap_or_else(|| base.join("metadata.db"));
        self.paths.upload_dir = self
            .storage
            .upload_dir
            .clone()
            .unwrap_or_else(|| base.join("uploads"));
    }

    /// Load configuration from a specific file path
    pub fn load(config_path: &Path) -> Result<Self> {
        debug!("Loading config from {:?}", config_path);

        if !config_path.exists() {
            return Err(Error::Config(format!(
                "Config file not found: {}",
                config_path.display()
            )));
        }

        let content = std::fs::read_to_string(config_path)?;
        let mut config: Config = toml::from_str(&content)?;

        let base = config_path.parent().unwrap_or(Path::new(".")).to_path_buf();
        config.paths = PathsConfig {
            config_file: config_path.to_path_buf(),
            base_dir: base,
            ..Default::default()
        };
        config.resolve_storage_paths();

        Ok(config)
    }

    /// Load configuration from a base directory, falling back to defaults
    pub fn load_from(base_dir: Option<PathBuf>) -> Result<Self> {
        let mut config = Config::default();
        config.init_paths(base_dir);

        if config.paths.config_file.exists() {
            debug!("Loading config from {:?}", config.paths.config_file);
            let content = std::fs::read_to_string(&config.paths.config_file)?;
            let mut loaded: Config = toml::from_str(&content)?;
            loaded.paths = config.paths;
            loaded.resolve_storage_paths();
            config = loaded;
        } else {
            debug!("No config file found, using defaults");
        }

        Ok(config)
    }

    /// Load, apply environment overrides and validate.
    ///
    /// This is the single place the binary builds its configuration.
    pub fn resolve(config_path: Option<&Path>) -> Result<Self> {
        let mut config = match config_path {
            Some(path) => Self::load(path)?,
            None => Self::load_from(None)?,
        };
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.paths.config_file.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(&self.paths.config_file, content)?;
        info!("Saved config to {:?}", self.paths.config_file);
        Ok(())
    }

    /// Apply overrides from the process environment
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| std::env::var(key).ok());
    }

    /// Apply overrides from an arbitrary key lookup.
    ///
    /// Variable names follow the settings of the original web service.
    pub fn apply_overrides_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("DATABASE_URL") {
            self.storage.db_file = Some(db_path_from_url(&url));
        }
        if let Some(folder) = lookup("UPLOAD_FOLDER") {
            self.storage.upload_dir = Some(PathBuf::from(folder));
        }
        if let Some(kind) = lookup("VECTOR_DB_TYPE") {
            match kind.parse() {
                Ok(backend) => self.vector.backend = backend,
                Err(e) => warn!("Ignoring VECTOR_DB_TYPE: {}", e),
            }
        }
        if let Some(url) = lookup("VECTOR_DB_URL") {
            self.vector.qdrant_url = url;
        }
        if let Some(model) = lookup("EMBEDDING_MODEL") {
            self.embedding.model = model;
        }
        if let Some(url) = lookup("EMBEDDING_BACKEND_URL") {
            self.embedding.backend_url = url;
        }
        if let Some(limit) = lookup("MAX_CONTENT_LENGTH") {
            match limit.parse() {
                Ok(bytes) => self.server.max_upload_bytes = bytes,
                Err(_) => warn!("Ignoring non-numeric MAX_CONTENT_LENGTH '{}'", limit),
            }
        }
        if let Some(name) = lookup("PROJECT_NAME") {
            self.server.project_name = name;
        }
        if let Some(prefix) = lookup("API_V1_STR") {
            self.server.api_prefix = prefix;
        }
        if let Some(addr) = lookup("BIND_ADDR") {
            self.server.bind_addr = addr;
        }

        self.resolve_storage_paths();
    }

    /// Get the Qdrant API key from environment
    pub fn qdrant_api_key(&self) -> Option<String> {
        if self.vector.qdrant_api_key_env.is_empty() {
            return None;
        }
        std::env::var(&self.vector.qdrant_api_key_env).ok()
    }

    /// Check if the service is initialized (config and DB exist)
    pub fn is_initialized(&self) -> bool {
        self.paths.config_file.exists() && self.paths.db_file.exists()
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.chunk.window_chars == 0 {
            return Err(Error::Config("chunk.window_chars must be positive".to_string()));
        }

        if self.chunk.overlap_chars >= self.chunk.window_chars {
            return Err(Error::Config(
                "chunk.overlap_chars must be < chunk.window_chars".to_string(),
            ));
        }

        if self.chunk.min_chars > self.chunk.window_chars {
            return Err(Error::Config(
                "chunk.window_chars must be >= chunk.min_chars".to_string(),
            ));
        }

        if self.embedding.batch_size == 0 || self.ingest.index_batch_size == 0 {
            return Err(Error::Config("batch sizes must be positive".to_string()));
        }

        if self.ingest.workers == 0 || self.ingest.queue_capacity == 0 {
            return Err(Error::Config(
                "ingest.workers and ingest.queue_capacity must be positive".to_string(),
            ));
        }

        if self.ingest.embed_max_attempts == 0 || self.ingest.index_max_attempts == 0 {
            return Err(Error::Config(
                "ingest attempt ceilings must be at least 1".to_string(),
            ));
        }

        if self.query.min_score < 0.0 || self.query.min_score > 1.0 {
            return Err(Error::Config(
                "query.min_score must be between 0.0 and 1.0".to_string(),
            ));
        }

        if self.query.default_k == 0 || self.query.default_k > self.query.max_k {
            return Err(Error::Config(
                "query.default_k must be between 1 and query.max_k".to_string(),
            ));
        }

        if !self.server.api_prefix.starts_with('/') || self.server.api_prefix.len() < 2 {
            return Err(Error::Config(format!(
                "server.api_prefix must start with '/' and name a path, got '{}'",
                self.server.api_prefix
            )));
        }

        if self.server.max_upload_bytes == 0 {
            return Err(Error::Config(
                "server.max_upload_bytes must be positive".to_string(),
            ));
        }

        Ok(())
    }
}

/// Turn a database URL (or bare path) into a SQLite file path
pub fn db_path_from_url(url: &str) -> PathBuf {
    let without_query = url.split('?').next().unwrap_or(url);
    let path = ["sqlite+aiosqlite:///", "sqlite:///", "sqlite://", "sqlite:"]
        .iter()
        .find_map(|prefix| without_query.strip_prefix(prefix))
        .unwrap_or(without_query);
    PathBuf::from(path)
}
