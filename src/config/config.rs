use crate::error::ConfigError;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const ENV_PROJECT: &str = "GOOGLE_CLOUD_PROJECT";
pub const ENV_LOCATION: &str = "GOOGLE_CLOUD_LOCATION";
pub const ENV_ACCESS_TOKEN: &str = "GOOGLE_ACCESS_TOKEN";

/// Top-level application configuration
///
/// Every section falls back to its defaults when omitted from the TOML file,
/// so an empty file is a valid configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub service: ServiceConfig,
    pub rag: RagConfig,
    pub analysis: AnalysisConfig,
    pub agent: AgentConfig,
}

/// Connection settings for the managed retrieval service
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServiceConfig {
    /// Cloud project that owns the corpora
    pub project_id: String,
    /// Region of the RAG engine, e.g. "us-central1"
    pub location: String,
    /// OAuth2 bearer token; usually injected through the environment
    pub access_token: Option<String>,
    /// Override for the API base URL (tests, private endpoints)
    pub endpoint: Option<String>,
    /// Per-request timeout
    pub timeout_seconds: u64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            project_id: String::new(),
            location: "us-central1".to_string(),
            access_token: None,
            endpoint: None,
            timeout_seconds: 60,
        }
    }
}

impl ServiceConfig {
    /// Base URL of the v1 REST API for the configured location
    pub fn base_url(&self) -> String {
        match &self.endpoint {
            Some(endpoint) => endpoint.trim_end_matches('/').to_string(),
            None => format!("https://{}-aiplatform.googleapis.com/v1", self.location),
        }
    }

    /// Resource prefix shared by every corpus in the project
    pub fn parent(&self) -> String {
        format!("projects/{}/locations/{}", self.project_id, self.location)
    }
}

/// Chunking, embedding and retrieval defaults
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RagConfig {
    pub chunk_size: u32,
    pub chunk_overlap: u32,
    pub top_k: u32,
    pub distance_threshold: f64,
    pub embedding_model: String,
    pub embedding_requests_per_min: u32,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            chunk_size: 512,
            chunk_overlap: 100,
            top_k: 3,
            distance_threshold: 0.5,
            embedding_model: "publishers/google/models/text-embedding-005".to_string(),
            embedding_requests_per_min: 1000,
        }
    }
}

/// Where log analysis writes its charts
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AnalysisConfig {
    pub output_dir: PathBuf,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("."),
        }
    }
}

/// Identity the agent advertises to the model runtime
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AgentConfig {
    pub name: String,
    pub model: String,
    pub description: String,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            name: "RagAgent".to_string(),
            model: "gemini-2.5-flash".to_string(),
            description: "Vertex AI RAG Agent".to_string(),
        }
    }
}

impl Config {
    /// Parse and validate a configuration from TOML text
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Read a configuration file
    ///
    /// # Errors
    ///
    /// `ConfigError::ReadError` if the file cannot be read, `TomlError` or
    /// `ValidationError` if its content is invalid.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::ReadError(format!("{}: {}", path.display(), e)))?;
        Self::from_toml_str(&text)
    }

    /// Load configuration from an optional file, then apply environment overrides
    ///
    /// A missing or unreadable file is not fatal: defaults are used instead.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => {
                info!("Loading configuration from: {}", path.display());
                match Self::from_file(path) {
                    Ok(config) => config,
                    Err(ConfigError::ReadError(e)) => {
                        warn!("Configuration file not readable ({}), using defaults", e);
                        Config::default()
                    }
                    Err(e) => return Err(e),
                }
            }
            None => {
                info!("Using default configuration");
                Config::default()
            }
        };

        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from a key lookup (normally the process environment)
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(project) = non_empty(ENV_PROJECT) {
            self.service.project_id = project;
        }
        if let Some(location) = non_empty(ENV_LOCATION) {
            self.service.location = location;
        }
        if let Some(token) = non_empty(ENV_ACCESS_TOKEN) {
            self.service.access_token = Some(token.trim().to_string());
        }
    }

    /// Check value ranges
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.service.location.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "service.location must not be empty".to_string(),
            ));
        }
        if self.service.timeout_seconds == 0 {
            return Err(ConfigError::ValidationError(
                "service.timeout_seconds must be greater than 0".to_string(),
            ));
        }
        if self.rag.chunk_size == 0 {
            return Err(ConfigError::ValidationError(
                "rag.chunk_size must be greater than 0".to_string(),
            ));
        }
        if self.rag.chunk_overlap >= self.rag.chunk_size {
            return Err(ConfigError::ValidationError(format!(
                "rag.chunk_overlap ({}) must be smaller than rag.chunk_size ({})",
                self.rag.chunk_overlap, self.rag.chunk_size
            )));
        }
        if self.rag.top_k == 0 {
            return Err(ConfigError::ValidationError(
                "rag.top_k must be at least 1".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.rag.distance_threshold) {
            return Err(ConfigError::ValidationError(format!(
                "rag.distance_threshold must be within [0, 1], got {}",
                self.rag.distance_threshold
            )));
        }
        Ok(())
    }
}
