//! Property Graph Store
//!
//! A labelled property graph store for retrieval pipelines:
//! - Entity and chunk nodes with properties and embeddings
//! - Relations between them, merged by (source, label, target)
//! - Neo4j backend speaking Cypher over Bolt
//! - In-memory backend with JSON snapshots for offline use
//! - A scripted walkthrough exercising every store operation

pub mod embeddings;
pub mod error;
pub mod graph;
pub mod neo4j;
pub mod walkthrough;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use error::StoreError;

use anyhow::Result;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use embeddings::{EmbeddingProvider, HashEmbeddingProvider};
use graph::{PropertyGraphStore, SimplePropertyGraphStore};
use neo4j::{Neo4jPropertyGraphStore, Neo4jSettings};

// ============================================================================
// YAML config structs (deserialization targets)
// ============================================================================

/// Top-level YAML configuration file structure
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct YamlConfig {
    pub neo4j: Neo4jYamlConfig,
    pub store: StoreYamlConfig,
}

/// Neo4j configuration section
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Neo4jYamlConfig {
    pub uri: String,
    pub user: String,
    pub password: String,
    pub database: String,
    pub use_apoc: bool,
    pub fetch_size: usize,
    pub max_connections: usize,
}

impl Default for Neo4jYamlConfig {
    fn default() -> Self {
        let settings = Neo4jSettings::default();
        Self {
            uri: settings.uri,
            user: settings.user,
            password: settings.password,
            database: settings.database,
            use_apoc: settings.use_apoc,
            fetch_size: settings.fetch_size,
            max_connections: settings.max_connections,
        }
    }
}

/// Store configuration section
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StoreYamlConfig {
    pub backend: Backend,
    /// Snapshot file for the memory backend
    pub persist_path: Option<String>,
    pub embedding_dimensions: usize,
    /// Create a Neo4j vector index sized to `embedding_dimensions`
    pub vector_index: bool,
    pub sanitize_query_output: bool,
}

impl Default for StoreYamlConfig {
    fn default() -> Self {
        Self {
            backend: Backend::Neo4j,
            persist_path: None,
            embedding_dimensions: 64,
            vector_index: false,
            sanitize_query_output: true,
        }
    }
}

/// Which store implementation backs the application
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    #[default]
    Neo4j,
    Memory,
}

impl std::str::FromStr for Backend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "neo4j" => Ok(Self::Neo4j),
            "memory" | "simple" => Ok(Self::Memory),
            other => anyhow::bail!("Unknown backend '{}' (expected neo4j or memory)", other),
        }
    }
}

// ============================================================================
// Runtime config (what the application actually uses)
// ============================================================================

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub backend: Backend,
    pub neo4j: Neo4jSettings,
    pub persist_path: Option<PathBuf>,
    pub embedding_dimensions: usize,
}

impl Config {
    /// Load configuration from environment variables only.
    /// Equivalent to from_yaml_and_env(None).
    pub fn from_env() -> Result<Self> {
        Self::from_yaml_and_env(None)
    }

    /// Load configuration from an optional YAML file, then override with env vars.
    ///
    /// Priority: env var > YAML > default
    ///
    /// If `yaml_path` is None, tries "config.yaml" in CWD. If the file doesn't
    /// exist, falls back to pure env var / defaults.
    pub fn from_yaml_and_env(yaml_path: Option<&Path>) -> Result<Self> {
        // 1. Load YAML config (or defaults if file not found)
        let yaml = Self::load_yaml(yaml_path);

        // 2. Build Config with env var overrides
        let backend = match std::env::var("PGSTORE_BACKEND") {
            Ok(value) => value.parse()?,
            Err(_) => yaml.store.backend,
        };

        Ok(Self {
            backend,
            neo4j: Neo4jSettings {
                uri: std::env::var("NEO4J_URI").unwrap_or(yaml.neo4j.uri),
                user: std::env::var("NEO4J_USER").unwrap_or(yaml.neo4j.user),
                password: std::env::var("NEO4J_PASSWORD").unwrap_or(yaml.neo4j.password),
                database: std::env::var("NEO4J_DATABASE").unwrap_or(yaml.neo4j.database),
                use_apoc: std::env::var("NEO4J_USE_APOC")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(yaml.neo4j.use_apoc),
                fetch_size: yaml.neo4j.fetch_size,
                max_connections: yaml.neo4j.max_connections,
                embedding_dimensions: yaml
                    .store
                    .vector_index
                    .then_some(yaml.store.embedding_dimensions),
                sanitize_query_output: yaml.store.sanitize_query_output,
            },
            persist_path: std::env::var("PGSTORE_PERSIST_PATH")
                .ok()
                .or(yaml.store.persist_path)
                .map(PathBuf::from),
            embedding_dimensions: yaml.store.embedding_dimensions,
        })
    }

    /// Try to load and parse a YAML config file. Returns defaults on any failure.
    fn load_yaml(yaml_path: Option<&Path>) -> YamlConfig {
        let default_path = Path::new("config.yaml");
        let path = yaml_path.unwrap_or(default_path);

        match std::fs::read_to_string(path) {
            Ok(contents) => match serde_yaml::from_str(&contents) {
                Ok(config) => {
                    tracing::info!("Loaded config from {}", path.display());
                    config
                }
                Err(e) => {
                    tracing::warn!("Failed to parse {}: {}. Using defaults.", path.display(), e);
                    YamlConfig::default()
                }
            },
            Err(_) => {
                tracing::debug!(
                    "No config file at {}, using env vars / defaults",
                    path.display()
                );
                YamlConfig::default()
            }
        }
    }
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn PropertyGraphStore>,
    pub embedder: Arc<dyn EmbeddingProvider>,
    pub config: Arc<Config>,
    /// Set for the memory backend so it can be snapshotted
    memory: Option<Arc<SimplePropertyGraphStore>>,
}

impl AppState {
    /// Create new application state with the configured backend connected
    pub async fn new(config: Config) -> Result<Self> {
        let embedder = Arc::new(HashEmbeddingProvider::new(config.embedding_dimensions));

        let mut memory = None;
        let store: Arc<dyn PropertyGraphStore> = match config.backend {
            Backend::Neo4j => Arc::new(Neo4jPropertyGraphStore::connect(&config.neo4j).await?),
            Backend::Memory => {
                let simple = match &config.persist_path {
                    Some(path) if path.exists() => {
                        SimplePropertyGraphStore::from_persist_path(path).await?
                    }
                    _ => SimplePropertyGraphStore::new(),
                };
                let simple = Arc::new(simple);
                memory = Some(simple.clone());
                simple
            }
        };

        Ok(Self {
            store,
            embedder,
            config: Arc::new(config),
            memory,
        })
    }

    /// In-memory state, never touching disk or network
    pub fn in_memory(config: Config) -> Self {
        let simple = Arc::new(SimplePropertyGraphStore::new());
        Self {
            store: simple.clone(),
            embedder: Arc::new(HashEmbeddingProvider::new(config.embedding_dimensions)),
            config: Arc::new(config),
            memory: Some(simple),
        }
    }

    /// Snapshot the memory backend to `persist_path`, if both are configured
    pub async fn persist(&self) -> Result<()> {
        if let (Some(simple), Some(path)) = (&self.memory, &self.config.persist_path) {
            simple.persist(path).await?;
        }
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
