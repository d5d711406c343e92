//! Embedding backends and the LRU cache in front of them.

use async_trait::async_trait;
use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use lru::LruCache;
use serde::Deserialize;
use serde_json::json;
use sha2::{Digest, Sha256};
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::OnceCell;

use crate::error::EmbeddingError;

/// Turns texts into vectors, one per input, in input order.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>, EmbeddingError>;
}

// ============================================================================
// LOCAL (fastembed)
// ============================================================================

/// all-MiniLM-L6-v2 (384 dimensions) through ONNX Runtime.
///
/// The model is loaded on first use, on the blocking pool.
#[derive(Default)]
pub struct FastEmbedder {
    model: OnceCell<Arc<TextEmbedding>>,
}

impl FastEmbedder {
    pub fn new() -> Self {
        Self::default()
    }

    async fn model(&self) -> Result<Arc<TextEmbedding>, EmbeddingError> {
        self.model
            .get_or_try_init(|| async {
                tracing::info!("RagActor: Initializing local embedding model (all-MiniLM-L6-v2)...");
                let model = tokio::task::spawn_blocking(|| {
                    let mut options = InitOptions::default();
                    options.model_name = EmbeddingModel::AllMiniLML6V2;
                    options.show_download_progress = false;
                    TextEmbedding::try_new(options)
                })
                .await
                .map_err(|e| EmbeddingError::Model(format!("initialization task failed: {}", e)))?
                .map_err(|e| EmbeddingError::Model(e.to_string()))?;
                tracing::info!("RagActor: Embedding model loaded");
                Ok::<_, EmbeddingError>(Arc::new(model))
            })
            .await
            .cloned()
    }
}

#[async_trait]
impl Embedder for FastEmbedder {
    async fn embed(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let model = self.model().await?;
        tokio::task::spawn_blocking(move || model.embed(texts, None))
            .await
            .map_err(|e| EmbeddingError::Model(format!("embedding task failed: {}", e)))?
            .map_err(|e| EmbeddingError::Model(e.to_string()))
    }
}

// ============================================================================
// OPENAI-COMPATIBLE HTTP
// ============================================================================

/// Client for an OpenAI-compatible `POST {api_base}/embeddings` endpoint.
pub struct OpenAiEmbedder {
    client: reqwest::Client,
    api_base: String,
    api_key: String,
    model: String,
}

#[derive(Deserialize)]
struct EmbeddingsResponse {
    data: Vec<EmbeddingDatum>,
}

#[derive(Deserialize)]
struct EmbeddingDatum {
    index: usize,
    embedding: Vec<f32>,
}

impl OpenAiEmbedder {
    pub fn new(
        api_base: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
        request_timeout: Duration,
    ) -> Result<Self, EmbeddingError> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| EmbeddingError::Request(e.to_string()))?;
        Ok(Self {
            client,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            model: model.into(),
        })
    }
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    async fn embed(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let expected = texts.len();
        let url = format!("{}/embeddings", self.api_base);
        let body = json!({
            "model": self.model,
            "input": texts,
        });

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| EmbeddingError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(EmbeddingError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let mut parsed: EmbeddingsResponse = response
            .json()
            .await
            .map_err(|e| EmbeddingError::Malformed(e.to_string()))?;
        if parsed.data.len() != expected {
            return Err(EmbeddingError::Malformed(format!(
                "expected {} embeddings, got {}",
                expected,
                parsed.data.len()
            )));
        }
        parsed.data.sort_by_key(|d| d.index);
        Ok(parsed.data.into_iter().map(|d| d.embedding).collect())
    }
}

// ============================================================================
// CACHE
// ============================================================================

/// LRU capacity used when settings do not override it.
pub const DEFAULT_EMBEDDING_CACHE_CAPACITY: usize = 1024;

/// Remembers vectors by SHA-256 of their text so repeated questions about the
/// same document only embed the pages it has not seen.
pub struct CachingEmbedder {
    inner: Arc<dyn Embedder>,
    cache: Mutex<LruCache<String, Vec<f32>>>,
}

impl CachingEmbedder {
    pub fn new(inner: Arc<dyn Embedder>, capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner,
            cache: Mutex::new(LruCache::new(capacity)),
        }
    }

    fn compute_hash(content: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(content.as_bytes());
        format!("{:x}", hasher.finalize())
    }
}

#[async_trait]
impl Embedder for CachingEmbedder {
    async fn embed(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let hashes: Vec<String> = texts.iter().map(|t| Self::compute_hash(t)).collect();

        let mut vectors: Vec<Option<Vec<f32>>> = {
            let mut cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
            hashes.iter().map(|h| cache.get(h).cloned()).collect()
        };

        let missing: Vec<usize> = (0..texts.len()).filter(|&i| vectors[i].is_none()).collect();
        if !missing.is_empty() {
            tracing::debug!(
                "RagActor: Embedding cache hit {}/{}",
                texts.len() - missing.len(),
                texts.len()
            );
            let to_embed: Vec<String> = missing.iter().map(|&i| texts[i].clone()).collect();
            let fresh = self.inner.embed(to_embed).await?;
            if fresh.len() != missing.len() {
                return Err(EmbeddingError::Malformed(format!(
                    "expected {} embeddings, got {}",
                    missing.len(),
                    fresh.len()
                )));
            }

            let mut cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
            for (&i, vector) in missing.iter().zip(fresh) {
                cache.put(hashes[i].clone(), vector.clone());
                vectors[i] = Some(vector);
            }
        }

        Ok(vectors.into_iter().flatten().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::fakes::FakeEmbedder;

    #[tokio::test]
    async fn test_cache_only_embeds_unseen_texts() {
        let inner = Arc::new(FakeEmbedder::new());
        let embedder = CachingEmbedder::new(inner.clone(), 16);

        let first = embedder
            .embed(vec!["the well".to_string(), "the meadow".to_string()])
            .await
            .unwrap();
        let second = embedder
            .embed(vec!["the meadow".to_string(), "the forest".to_string()])
            .await
            .unwrap();

        assert_eq!(first[1], second[0]);
        assert_eq!(inner.embedded_texts(), vec!["the well", "the meadow", "the forest"]);
    }

    #[tokio::test]
    async fn test_cache_evicts_least_recently_used() {
        let inner = Arc::new(FakeEmbedder::new());
        let embedder = CachingEmbedder::new(inner.clone(), 1);

        embedder.embed(vec!["a".to_string()]).await.unwrap();
        embedder.embed(vec!["b".to_string()]).await.unwrap();
        embedder.embed(vec!["a".to_string()]).await.unwrap();

        assert_eq!(inner.embedded_texts(), vec!["a", "b", "a"]);
    }

    #[tokio::test]
    async fn test_openai_embedder_against_stub_server() {
        let base = crate::tests::fakes::spawn_llm_stub().await;
        let embedder =
            OpenAiEmbedder::new(format!("{}/v1", base), "sk-test", "text-embedding-3-small", Duration::from_secs(5))
                .unwrap();

        let vectors = embedder
            .embed(vec!["Kizuki".to_string(), "Naoko".to_string(), "Kizuki".to_string()])
            .await
            .unwrap();

        assert_eq!(vectors.len(), 3);
        assert_eq!(vectors[0].len(), llm_test_server::EMBEDDING_DIMENSION);
        assert_eq!(vectors[0], vectors[2]);
        assert_ne!(vectors[0], vectors[1]);
    }

    #[tokio::test]
    async fn test_openai_embedder_reports_status() {
        let base = crate::tests::fakes::spawn_llm_stub().await;
        let embedder =
            OpenAiEmbedder::new(format!("{}/v1", base), "", "text-embedding-3-small", Duration::from_secs(5))
                .unwrap();

        let err = embedder.embed(vec!["x".to_string()]).await.unwrap_err();
        assert!(matches!(err, EmbeddingError::Status { status: 401, .. }));
    }
}
