//! Command-line argument parsing and launch configuration.
//!
//! This module handles CLI argument parsing using clap, and applies
//! launch-time overrides to application settings.

use clap::{Parser, ValueEnum};
use std::path::PathBuf;

use crate::settings::{AppSettings, EmbeddingBackend};

/// Which agents this process runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Role {
    /// All three agents in one process on the in-process bus
    All,
    /// Only the front end (console + user agent)
    User,
    /// Only the retrieval-augmented response agent
    Rag,
    /// Only the PDF extraction agent
    Pdf,
}

impl Role {
    pub fn runs_user(self) -> bool {
        matches!(self, Role::All | Role::User)
    }

    pub fn runs_rag(self) -> bool {
        matches!(self, Role::All | Role::Rag)
    }

    pub fn runs_pdf(self) -> bool {
        matches!(self, Role::All | Role::Pdf)
    }
}

/// CLI arguments for murakami-rag
#[derive(Parser, Debug, Clone)]
#[command(
    name = "murakami-rag",
    about = "Ask questions about a PDF and get answers in Haruki Murakami's voice"
)]
pub struct CliArgs {
    /// Agents to run in this process
    #[arg(long, value_enum, default_value_t = Role::All, env = "MURAKAMI_ROLE")]
    pub role: Role,
    /// Settings file (defaults to ~/.murakami-rag/config.json)
    #[arg(long, value_name = "PATH", env = "MURAKAMI_CONFIG")]
    pub config: Option<PathBuf>,
    /// Document offered when the operator leaves the path blank
    #[arg(long, value_name = "PATH", env = "MURAKAMI_DOCUMENT")]
    pub document: Option<String>,
    /// Seconds to wait for an answer before giving up
    #[arg(long, value_name = "SECS", env = "MURAKAMI_ANSWER_TIMEOUT_SECS")]
    pub answer_timeout_secs: Option<u64>,
    /// OpenAI-compatible base URL for generation (e.g. http://127.0.0.1:8089/v1)
    #[arg(long, value_name = "URL", env = "MURAKAMI_GENERATION_API_BASE")]
    pub generation_api_base: Option<String>,
    /// Chat model used for generation
    #[arg(long, value_name = "MODEL", env = "MURAKAMI_GENERATION_MODEL")]
    pub generation_model: Option<String>,
    /// Embedding backend
    #[arg(long, value_enum, env = "MURAKAMI_EMBEDDING_BACKEND")]
    pub embedding_backend: Option<EmbeddingBackend>,
    /// Log filter, e.g. `info` or `murakami_rag_lib=debug` (RUST_LOG is used when absent)
    #[arg(long, value_name = "FILTER", env = "MURAKAMI_LOG_LEVEL")]
    pub log_level: Option<String>,
    /// Write the effective settings to the config file and exit
    #[arg(long, env = "MURAKAMI_SAVE_CONFIG")]
    pub save_config: bool,
}

/// Apply launch-time overrides on top of the loaded settings.
pub fn apply_cli_overrides(args: &CliArgs, settings: &mut AppSettings) {
    if let Some(document) = &args.document {
        settings.front_end.default_document_path = document.clone();
    }
    if let Some(secs) = args.answer_timeout_secs {
        settings.front_end.answer_timeout_secs = secs;
    }
    if let Some(api_base) = &args.generation_api_base {
        settings.generation.api_base = api_base.clone();
    }
    if let Some(model) = &args.generation_model {
        settings.generation.model = model.clone();
    }
    if let Some(backend) = args.embedding_backend {
        settings.embedding.backend = backend;
    }
}
