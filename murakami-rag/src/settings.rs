use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;

use crate::actors::rag::{TextSplitter, DEFAULT_EMBEDDING_CACHE_CAPACITY};
use crate::bus::RetryPolicy;
use crate::error::SettingsError;

// ============ Agents ============

/// Where one agent lives: its bus address, the socket it binds when it runs
/// in its own process, and the URL peers post envelopes to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentEndpoint {
    pub address: String,
    pub bind: String,
    pub endpoint: String,
}

impl AgentEndpoint {
    fn local(name: &str, port: u16) -> Self {
        Self {
            address: format!("agent://{}", name),
            bind: format!("127.0.0.1:{}", port),
            endpoint: format!("http://127.0.0.1:{}/submit", port),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentsSettings {
    pub user: AgentEndpoint,
    pub rag: AgentEndpoint,
    pub pdf: AgentEndpoint,
}

impl Default for AgentsSettings {
    fn default() -> Self {
        Self {
            user: AgentEndpoint::local("user", 8000),
            rag: AgentEndpoint::local("rag", 8002),
            pdf: AgentEndpoint::local("pdf", 8003),
        }
    }
}

// ============ Retrieval / Generation / Embedding ============

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalSettings {
    pub top_k: usize,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub embedding_cache_capacity: usize,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self {
            top_k: 4,
            chunk_size: crate::actors::rag::DEFAULT_CHUNK_SIZE,
            chunk_overlap: crate::actors::rag::DEFAULT_CHUNK_OVERLAP,
            embedding_cache_capacity: DEFAULT_EMBEDDING_CACHE_CAPACITY,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationSettings {
    /// OpenAI-compatible base URL, including the `/v1` segment.
    pub api_base: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: Option<u32>,
    pub request_timeout_secs: u64,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            api_base: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o".to_string(),
            temperature: 0.7,
            max_tokens: None,
            request_timeout_secs: 120,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingBackend {
    /// all-MiniLM-L6-v2 running in-process
    Local,
    /// OpenAI-compatible `/embeddings` endpoint
    #[serde(alias = "open_ai")]
    Openai,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingSettings {
    pub backend: EmbeddingBackend,
    /// Model name for the HTTP backend.
    pub model: String,
    /// Base URL for the HTTP backend; falls back to `generation.api_base`.
    pub api_base: Option<String>,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            backend: EmbeddingBackend::Local,
            model: "text-embedding-3-small".to_string(),
            api_base: None,
        }
    }
}

// ============ Delivery / Front end ============

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeliverySettings {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    /// Per-attempt HTTP timeout when agents run in separate processes.
    pub request_timeout_secs: u64,
}

impl Default for DeliverySettings {
    fn default() -> Self {
        Self {
            max_attempts: RetryPolicy::DEFAULT_MAX_ATTEMPTS,
            base_delay_ms: RetryPolicy::DEFAULT_BASE_DELAY.as_millis() as u64,
            request_timeout_secs: 10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FrontEndSettings {
    pub default_document_path: String,
    pub answer_timeout_secs: u64,
}

impl Default for FrontEndSettings {
    fn default() -> Self {
        Self {
            default_document_path: "./norwegian.pdf".to_string(),
            answer_timeout_secs: 120,
        }
    }
}

// ============ Top level ============

/// Application settings. Every section has defaults so partial config files
/// (and files written by older versions) still load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSettings {
    pub agents: AgentsSettings,
    pub retrieval: RetrievalSettings,
    pub generation: GenerationSettings,
    pub embedding: EmbeddingSettings,
    pub delivery: DeliverySettings,
    pub front_end: FrontEndSettings,
    pub session_ttl_secs: u64,
    pub mailbox_capacity: usize,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            agents: AgentsSettings::default(),
            retrieval: RetrievalSettings::default(),
            generation: GenerationSettings::default(),
            embedding: EmbeddingSettings::default(),
            delivery: DeliverySettings::default(),
            front_end: FrontEndSettings::default(),
            session_ttl_secs: 600,
            mailbox_capacity: 64,
        }
    }
}

impl AppSettings {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.delivery.max_attempts,
            Duration::from_millis(self.delivery.base_delay_ms),
        )
    }

    pub fn answer_timeout(&self) -> Duration {
        Duration::from_secs(self.front_end.answer_timeout_secs)
    }

    pub fn session_ttl(&self) -> Duration {
        Duration::from_secs(self.session_ttl_secs)
    }

    pub fn splitter(&self) -> TextSplitter {
        TextSplitter::new(self.retrieval.chunk_size, self.retrieval.chunk_overlap)
    }

    pub fn embedding_api_base(&self) -> &str {
        self.embedding
            .api_base
            .as_deref()
            .unwrap_or(&self.generation.api_base)
    }
}

/// `~/.murakami-rag/config.json`
pub fn default_config_path() -> PathBuf {
    let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
    home.join(".murakami-rag").join("config.json")
}

/// Read and parse a settings file.
pub async fn read_settings(path: &Path) -> Result<AppSettings, SettingsError> {
    let contents = fs::read_to_string(path).await.map_err(|source| SettingsError::Io {
        path: path.display().to_string(),
        source,
    })?;
    serde_json::from_str(&contents).map_err(|source| SettingsError::Parse {
        path: path.display().to_string(),
        source,
    })
}

/// Load settings, falling back to defaults when the file is missing or invalid.
pub async fn load_settings(path: Option<&Path>) -> AppSettings {
    let config_path = path.map(Path::to_path_buf).unwrap_or_else(default_config_path);

    match read_settings(&config_path).await {
        Ok(settings) => {
            tracing::info!("Settings loaded from {:?}", config_path);
            settings
        }
        Err(SettingsError::Io { source, .. }) if source.kind() == std::io::ErrorKind::NotFound => {
            tracing::info!("No config file found at {:?}, using defaults", config_path);
            AppSettings::default()
        }
        Err(e) => {
            tracing::warn!("{}, using defaults", e);
            AppSettings::default()
        }
    }
}

/// Write settings as pretty JSON, creating the parent directory if needed.
pub async fn save_settings(path: &Path, settings: &AppSettings) -> Result<(), SettingsError> {
    let io_error = |source| SettingsError::Io {
        path: path.display().to_string(),
        source,
    };
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await.map_err(io_error)?;
    }
    let contents = serde_json::to_string_pretty(settings).map_err(|source| SettingsError::Parse {
        path: path.display().to_string(),
        source,
    })?;
    fs::write(path, contents).await.map_err(io_error)?;
    tracing::info!("Settings saved to {:?}", path);
    Ok(())
}
