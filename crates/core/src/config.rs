//! Configuration management for the RMP chat service.
//!
//! This module handles loading and merging configuration from multiple sources:
//! - Built-in defaults
//! - A YAML config file (`--config`, `RMP_CONFIG`, or `./rmp.yaml`)
//! - Environment variables
//! - Command-line flags
//!
//! The resulting `AppConfig` is built once at process start and passed by
//! reference to every upstream client constructor. API keys are resolved from
//! the environment at load time and never re-read afterwards.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{AppError, AppResult};

/// Default config file looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "rmp.yaml";

const EMBEDDING_PROVIDERS: [&str; 3] = ["openai", "ollama", "mock"];
const INDEX_PROVIDERS: [&str; 2] = ["pinecone", "memory"];
const GENERATION_PROVIDERS: [&str; 2] = ["openai", "ollama"];

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Config file the settings were merged from, if any
    pub config_file: Option<PathBuf>,

    /// Log level override
    pub log_level: Option<String>,

    /// Verbose mode (enables debug logging)
    pub verbose: bool,

    /// Disable colored output
    pub no_color: bool,

    /// Emit logs as JSON lines instead of human-readable text
    pub json_logs: bool,

    /// Embedding service settings
    pub embedding: EmbeddingSettings,

    /// Vector index settings
    pub index: IndexSettings,

    /// Generative chat service settings
    pub generation: GenerationSettings,

    /// System prompt settings
    pub prompt: PromptSettings,

    /// HTTP server settings
    pub server: ServerSettings,

    /// Shared HTTP client settings for all upstream calls
    pub upstream: UpstreamSettings,
}

/// Embedding service configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EmbeddingSettings {
    /// "openai", "ollama" or "mock"
    pub provider: String,

    /// Embedding model identifier
    pub model: String,

    /// Expected vector length; checked against every response when set
    pub dimensions: Option<usize>,

    /// Custom endpoint (base URL)
    pub endpoint: Option<String>,

    /// Environment variable holding the API key
    pub api_key_env: String,

    /// Resolved API key
    #[serde(skip)]
    pub api_key: Option<String>,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            model: "text-embedding-3-small".to_string(),
            dimensions: None,
            endpoint: None,
            api_key_env: "OPENAI_API_KEY".to_string(),
            api_key: None,
        }
    }
}

/// Vector index configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct IndexSettings {
    /// "pinecone" or "memory"
    pub provider: String,

    /// Index name
    pub name: String,

    /// Namespace within the index
    pub namespace: String,

    /// Data-plane host; resolved from the control plane when absent
    pub host: Option<String>,

    /// JSON records file for the memory index
    pub path: Option<PathBuf>,

    /// Number of matches to retrieve per request
    pub top_k: usize,

    /// Environment variable holding the API key
    pub api_key_env: String,

    /// Resolved API key
    #[serde(skip)]
    pub api_key: Option<String>,
}

impl Default for IndexSettings {
    fn default() -> Self {
        Self {
            provider: "pinecone".to_string(),
            name: "rag".to_string(),
            namespace: "ns1".to_string(),
            host: None,
            path: None,
            top_k: 3,
            api_key_env: "PINECONE_API_KEY".to_string(),
            api_key: None,
        }
    }
}

/// Generative chat service configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GenerationSettings {
    /// "openai" or "ollama"
    pub provider: String,

    /// Chat model identifier
    pub model: String,

    /// Custom endpoint (base URL)
    pub endpoint: Option<String>,

    /// Environment variable holding the API key
    pub api_key_env: String,

    /// Sampling temperature
    pub temperature: Option<f32>,

    /// Maximum tokens to generate
    pub max_tokens: Option<u32>,

    /// Resolved API key
    #[serde(skip)]
    pub api_key: Option<String>,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            model: "gpt-4".to_string(),
            endpoint: None,
            api_key_env: "OPENAI_API_KEY".to_string(),
            temperature: None,
            max_tokens: None,
            api_key: None,
        }
    }
}

/// System prompt configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PromptSettings {
    /// YAML prompt definition replacing the built-in system prompt
    pub path: Option<PathBuf>,
}

/// HTTP server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerSettings {
    /// Socket address to listen on
    pub bind: String,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:3000".to_string(),
        }
    }
}

/// Upstream HTTP client configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UpstreamSettings {
    /// Connect timeout for every upstream call, in seconds
    pub connect_timeout_secs: u64,

    /// Whole-request limit for embedding and index calls, in seconds
    pub request_timeout_secs: u64,

    /// Longest silence tolerated between reads of a streamed answer, in seconds
    pub read_timeout_secs: u64,
}

impl Default for UpstreamSettings {
    fn default() -> Self {
        Self {
            connect_timeout_secs: 10,
            request_timeout_secs: 30,
            read_timeout_secs: 60,
        }
    }
}

impl UpstreamSettings {
    /// Timeouts for request/response calls (embedding, index).
    pub fn unary_timeouts(&self) -> HttpTimeouts {
        HttpTimeouts::new(
            Duration::from_secs(self.connect_timeout_secs),
            Duration::from_secs(self.request_timeout_secs),
        )
    }

    /// Timeouts for streamed generation, where the second limit is per read.
    pub fn streaming_timeouts(&self) -> HttpTimeouts {
        HttpTimeouts::new(
            Duration::from_secs(self.connect_timeout_secs),
            Duration::from_secs(self.read_timeout_secs),
        )
    }
}

/// Timeouts handed to one upstream HTTP client.
///
/// Unary clients apply `response` to the whole exchange; streaming clients
/// apply it to each read of the body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HttpTimeouts {
    pub connect: Duration,
    pub response: Duration,
}

impl HttpTimeouts {
    pub fn new(connect: Duration, response: Duration) -> Self {
        Self { connect, response }
    }
}

impl Default for HttpTimeouts {
    fn default() -> Self {
        UpstreamSettings::default().unary_timeouts()
    }
}

/// Full configuration file structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct ConfigFile {
    embedding: Option<EmbeddingSettings>,
    index: Option<IndexSettings>,
    generation: Option<GenerationSettings>,
    prompt: Option<PromptSettings>,
    server: Option<ServerSettings>,
    upstream: Option<UpstreamSettings>,
    logging: Option<LoggingConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct LoggingConfig {
    level: Option<String>,
    color: Option<bool>,
    format: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            config_file: None,
            log_level: None,
            verbose: false,
            no_color: false,
            json_logs: false,
            embedding: EmbeddingSettings::default(),
            index: IndexSettings::default(),
            generation: GenerationSettings::default(),
            prompt: PromptSettings::default(),
            server: ServerSettings::default(),
            upstream: UpstreamSettings::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from defaults, config file and environment.
    ///
    /// The config file is `config_file` when given, otherwise `RMP_CONFIG`,
    /// otherwise `./rmp.yaml` if it exists. An explicitly named file that
    /// does not exist is an error.
    ///
    /// Environment variables:
    /// - `RMP_CONFIG`: Path to config file
    /// - `RMP_TOP_K`: Matches retrieved per request
    /// - `RMP_INDEX`: Index name
    /// - `RMP_NAMESPACE`: Index namespace
    /// - `RMP_CHAT_MODEL`: Generative model identifier
    /// - `RMP_EMBEDDING_MODEL`: Embedding model identifier
    /// - `RMP_BIND`: Server bind address
    /// - `RUST_LOG`: Log level
    /// - `NO_COLOR`: Disable colored output
    ///
    /// API keys are read from the variables named by each section's
    /// `apiKeyEnv` (`OPENAI_API_KEY` and `PINECONE_API_KEY` by default).
    ///
    /// # Example
    /// ```no_run
    /// use rmp_core::config::AppConfig;
    ///
    /// let config = AppConfig::load(None).expect("Failed to load config");
    /// println!("Index: {}/{}", config.index.name, config.index.namespace);
    /// ```
    pub fn load(config_file: Option<&Path>) -> AppResult<Self> {
        let mut config = Self::default();

        let explicit = config_file
            .map(Path::to_path_buf)
            .or_else(|| std::env::var("RMP_CONFIG").ok().map(PathBuf::from));

        let config_path = match explicit {
            Some(path) => {
                if !path.exists() {
                    return Err(AppError::Config(format!(
                        "Config file does not exist: {:?}",
                        path
                    )));
                }
                Some(path)
            }
            None => {
                let fallback = PathBuf::from(DEFAULT_CONFIG_FILE);
                fallback.exists().then_some(fallback)
            }
        };

        if let Some(path) = config_path {
            config = config.merge_yaml(&path)?;
        }

        config.apply_env()?;
        config.resolve_api_keys();

        Ok(config)
    }

    /// Merge YAML configuration file into this config.
    fn merge_yaml(&self, path: &Path) -> AppResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            AppError::Config(format!("Failed to read config file {:?}: {}", path, e))
        })?;

        let mut result = self.merge_str(&contents).map_err(|e| {
            AppError::Config(format!("Failed to parse config file {:?}: {}", path, e))
        })?;
        result.config_file = Some(path.to_path_buf());

        Ok(result)
    }

    /// Merge YAML configuration text into this config.
    fn merge_str(&self, contents: &str) -> AppResult<Self> {
        let config_file: ConfigFile = serde_yaml::from_str(contents)?;

        let mut result = self.clone();

        if let Some(embedding) = config_file.embedding {
            result.embedding = embedding;
        }
        if let Some(index) = config_file.index {
            result.index = index;
        }
        if let Some(generation) = config_file.generation {
            result.generation = generation;
        }
        if let Some(prompt) = config_file.prompt {
            result.prompt = prompt;
        }
        if let Some(server) = config_file.server {
            result.server = server;
        }
        if let Some(upstream) = config_file.upstream {
            result.upstream = upstream;
        }

        if let Some(logging) = config_file.logging {
            if let Some(level) = logging.level {
                result.log_level = Some(level);
            }
            if let Some(color) = logging.color {
                result.no_color = !color;
            }
            if let Some(format) = logging.format {
                result.json_logs = format.eq_ignore_ascii_case("json");
            }
        }

        Ok(result)
    }

    /// Apply environment variable overrides.
    fn apply_env(&mut self) -> AppResult<()> {
        if let Ok(top_k) = std::env::var("RMP_TOP_K") {
            self.index.top_k = top_k.parse().map_err(|_| {
                AppError::Config(format!("RMP_TOP_K must be a positive integer, got '{}'", top_k))
            })?;
        }

        if let Ok(name) = std::env::var("RMP_INDEX") {
            self.index.name = name;
        }

        if let Ok(namespace) = std::env::var("RMP_NAMESPACE") {
            self.index.namespace = namespace;
        }

        if let Ok(model) = std::env::var("RMP_CHAT_MODEL") {
            self.generation.model = model;
        }

        if let Ok(model) = std::env::var("RMP_EMBEDDING_MODEL") {
            self.embedding.model = model;
        }

        if let Ok(bind) = std::env::var("RMP_BIND") {
            self.server.bind = bind;
        }

        if let Ok(level) = std::env::var("RUST_LOG") {
            self.log_level.get_or_insert(level);
        }

        if std::env::var("NO_COLOR").is_ok() {
            self.no_color = true;
        }

        Ok(())
    }

    /// Read every section's API key from its named environment variable.
    fn resolve_api_keys(&mut self) {
        self.embedding.api_key = read_secret(&self.embedding.api_key_env);
        self.index.api_key = read_secret(&self.index.api_key_env);
        self.generation.api_key = read_secret(&self.generation.api_key_env);
    }

    /// Apply CLI overrides to the configuration.
    ///
    /// CLI flags take precedence over the config file and environment.
    pub fn with_overrides(
        mut self,
        log_level: Option<String>,
        verbose: bool,
        no_color: bool,
        top_k: Option<usize>,
        model: Option<String>,
    ) -> Self {
        if let Some(log_level) = log_level {
            self.log_level = Some(log_level);
        }

        if verbose {
            self.verbose = true;
            // Verbose mode implies debug logging
            if self.log_level.is_none() {
                self.log_level = Some("debug".to_string());
            }
        }

        if no_color {
            self.no_color = true;
        }

        if let Some(top_k) = top_k {
            self.index.top_k = top_k;
        }

        if let Some(model) = model {
            self.generation.model = model;
        }

        self
    }

    /// Validate configuration for the selected providers.
    ///
    /// Fails with `AppError::Config` on unknown providers, a zero `topK`,
    /// a memory index without a records file, or a missing API key for a
    /// provider that requires one.
    pub fn validate(&self) -> AppResult<()> {
        check_provider("embedding", &self.embedding.provider, &EMBEDDING_PROVIDERS)?;
        check_provider("index", &self.index.provider, &INDEX_PROVIDERS)?;
        check_provider("generation", &self.generation.provider, &GENERATION_PROVIDERS)?;

        let upstream = &self.upstream;
        if upstream.connect_timeout_secs == 0
            || upstream.request_timeout_secs == 0
            || upstream.read_timeout_secs == 0
        {
            return Err(AppError::Config(
                "upstream timeouts must be at least 1 second".to_string(),
            ));
        }

        if self.index.top_k == 0 {
            return Err(AppError::Config("index.topK must be at least 1".to_string()));
        }

        if self.embedding.model.trim().is_empty() {
            return Err(AppError::Config("embedding.model cannot be empty".to_string()));
        }

        if self.generation.model.trim().is_empty() {
            return Err(AppError::Config("generation.model cannot be empty".to_string()));
        }

        if self.embedding.provider == "openai" && self.embedding.api_key.is_none() {
            return Err(missing_key(&self.embedding.api_key_env));
        }

        if self.generation.provider == "openai" && self.generation.api_key.is_none() {
            return Err(missing_key(&self.generation.api_key_env));
        }

        match self.index.provider.as_str() {
            "pinecone" => {
                if self.index.api_key.is_none() {
                    return Err(missing_key(&self.index.api_key_env));
                }
            }
            "memory" => match self.index.path {
                Some(ref path) if !path.exists() => {
                    return Err(AppError::Config(format!(
                        "Memory index file not found: {:?}",
                        path
                    )));
                }
                Some(_) => {}
                None => {
                    return Err(AppError::Config(
                        "index.path is required for the memory index".to_string(),
                    ));
                }
            },
            _ => {}
        }

        Ok(())
    }
}

fn read_secret(env_var: &str) -> Option<String> {
    std::env::var(env_var)
        .ok()
        .filter(|value| !value.trim().is_empty())
}

fn missing_key(env_var: &str) -> AppError {
    AppError::Config(format!(
        "API key not found in environment variable: {}",
        env_var
    ))
}

fn check_provider(section: &str, provider: &str, known: &[&str]) -> AppResult<()> {
    if known.contains(&provider) {
        Ok(())
    } else {
        Err(AppError::Config(format!(
            "Unknown {} provider: {}. Supported: {}",
            section,
            provider,
            known.join(", ")
        )))
    }
}
