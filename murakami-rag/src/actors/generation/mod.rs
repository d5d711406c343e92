//! Prose generation for the RAG agent.

mod openai_client;
mod prompt;

use async_trait::async_trait;

use crate::error::GenerationError;

pub use openai_client::OpenAiChatClient;
pub use prompt::{build_murakami_prompt, error_answer, join_passages, NO_RELEVANT_CONTENT_ANSWER};

/// Produces answer text for a fully rendered prompt.
#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, GenerationError>;
}
