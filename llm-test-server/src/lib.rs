//! OpenAI-compatible stub for murakami-rag development.
//!
//! - `POST /v1/chat/completions` answers with a Murakami-flavoured echo of the
//!   last user message
//! - `POST /v1/embeddings` returns deterministic hashed vectors
//! - both reject requests without a bearer token, like the real service

use axum::{
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};
use std::net::SocketAddr;

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 8089;

/// Length of every vector the embeddings route returns.
pub const EMBEDDING_DIMENSION: usize = 64;

// -----------------------------------------------------------------------------
// Request models
// -----------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct ChatRequest {
    #[serde(default)]
    model: String,
    #[serde(default)]
    messages: Vec<ChatMessage>,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    role: String,
    #[serde(default)]
    content: String,
}

#[derive(Debug, Deserialize)]
struct EmbeddingsRequest {
    #[serde(default)]
    model: String,
    input: EmbeddingInput,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum EmbeddingInput {
    One(String),
    Many(Vec<String>),
}

impl EmbeddingInput {
    fn into_texts(self) -> Vec<String> {
        match self {
            EmbeddingInput::One(text) => vec![text],
            EmbeddingInput::Many(texts) => texts,
        }
    }
}

// -----------------------------------------------------------------------------
// Helpers
// -----------------------------------------------------------------------------

fn has_bearer_token(headers: &HeaderMap) -> bool {
    headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer"))
        .map(|token| !token.trim().is_empty())
        .unwrap_or(false)
}

fn unauthorized() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({
            "error": {
                "message": "You didn't provide an API key.",
                "type": "invalid_request_error",
                "code": "missing_api_key"
            }
        })),
    )
        .into_response()
}

/// Deterministic unit vector for `text`: FNV-1a over each word, folded into
/// `EMBEDDING_DIMENSION` buckets.
pub fn hashed_embedding(text: &str) -> Vec<f32> {
    let mut vector = vec![0.0f32; EMBEDDING_DIMENSION];
    for word in text.split_whitespace() {
        let mut hash: u64 = 0xcbf29ce484222325;
        for byte in word.to_lowercase().bytes() {
            hash ^= byte as u64;
            hash = hash.wrapping_mul(0x100000001b3);
        }
        vector[(hash % EMBEDDING_DIMENSION as u64) as usize] += 1.0;
    }
    let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        vector.iter_mut().for_each(|x| *x /= norm);
    }
    vector
}

fn stub_answer(question: &str) -> String {
    format!(
        "I thought about it for a long time, the way you think about a song you heard once \
         in a bar at the edge of town. You asked: {} The answer, like a cat that comes back \
         after the rain, is somewhere between the pages.",
        question
    )
}

// -----------------------------------------------------------------------------
// Handlers
// -----------------------------------------------------------------------------

async fn chat_completions(headers: HeaderMap, Json(request): Json<ChatRequest>) -> Response {
    if !has_bearer_token(&headers) {
        println!("[llm-test-server] chat/completions rejected: missing API key");
        return unauthorized();
    }
    let question = request
        .messages
        .iter()
        .rev()
        .find(|m| m.role == "user")
        .map(|m| m.content.as_str())
        .unwrap_or_default();
    println!(
        "[llm-test-server] chat/completions model={} prompt_chars={}",
        request.model,
        question.len()
    );

    Json(json!({
        "id": format!("chatcmpl-stub-{}", Utc::now().timestamp_millis()),
        "object": "chat.completion",
        "created": Utc::now().timestamp(),
        "model": request.model,
        "choices": [{
            "index": 0,
            "message": { "role": "assistant", "content": stub_answer(question) },
            "finish_reason": "stop"
        }]
    }))
    .into_response()
}

async fn embeddings(headers: HeaderMap, Json(request): Json<EmbeddingsRequest>) -> Response {
    if !has_bearer_token(&headers) {
        println!("[llm-test-server] embeddings rejected: missing API key");
        return unauthorized();
    }
    let texts = request.input.into_texts();
    println!(
        "[llm-test-server] embeddings model={} inputs={}",
        request.model,
        texts.len()
    );

    let data: Vec<Value> = texts
        .iter()
        .enumerate()
        .map(|(index, text)| {
            json!({
                "object": "embedding",
                "index": index,
                "embedding": hashed_embedding(text),
            })
        })
        .collect();

    Json(json!({
        "object": "list",
        "model": request.model,
        "data": data,
    }))
    .into_response()
}

// -----------------------------------------------------------------------------
// Server
// -----------------------------------------------------------------------------

pub fn router() -> Router {
    Router::new()
        .route("/v1/chat/completions", post(chat_completions))
        .route("/v1/embeddings", post(embeddings))
}

pub async fn serve(host: &str, port: u16) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    println!(
        "[llm-test-server] listening at http://{}/v1 (started {})",
        listener.local_addr()?,
        Utc::now().to_rfc3339()
    );
    axum::serve(listener, router()).await?;
    Ok(())
}
