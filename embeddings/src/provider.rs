//! Async embedding providers.
//!
//! Encoding is synchronous and may block for as long as the inference engine
//! takes. [`LocalProvider`] moves each call onto tokio's blocking pool and can
//! bound how long the caller waits for it.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::cache::CachedEmbedder;
use crate::encoder::{EncodedText, TextEncoder};
use crate::error::{EmbeddingError, EncodingStage, Result};
use crate::{DEFAULT_DIMENSION, Embedding};

/// Request for generating embeddings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingRequest {
    /// Text to embed.
    pub text: String,
}

impl EmbeddingRequest {
    /// Create a new embedding request.
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

/// Response from embedding generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingResponse {
    /// The generated embedding.
    pub embedding: Embedding,

    /// Model used to generate the embedding.
    pub model: String,

    /// Dimension of the embedding.
    pub dimension: usize,

    /// Token usage (if available).
    pub tokens_used: Option<u64>,
}

/// Trait for embedding providers.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Get the name of this provider.
    fn name(&self) -> &str;

    /// Get the default model for this provider.
    fn default_model(&self) -> &str;

    /// Get the default embedding dimension.
    fn default_dimension(&self) -> usize;

    /// Generate an embedding for the given text.
    async fn embed(&self, request: EmbeddingRequest) -> Result<EmbeddingResponse>;

    /// Generate embeddings for multiple texts.
    async fn embed_batch(&self, requests: Vec<EmbeddingRequest>) -> Result<Vec<EmbeddingResponse>> {
        // Default implementation: process sequentially
        let mut results = Vec::with_capacity(requests.len());
        for request in requests {
            results.push(self.embed(request).await?);
        }
        Ok(results)
    }

    /// Check if the provider is ready to serve requests.
    fn is_available(&self) -> bool;
}

/// Provider backed by a local cached encoder.
pub struct LocalProvider<E> {
    embedder: Arc<CachedEmbedder<E>>,
    model: String,
    dimension: usize,
    timeout: Option<Duration>,
}

impl<E> LocalProvider<E>
where
    E: TextEncoder + 'static,
{
    /// Create a new local provider.
    pub fn new(embedder: Arc<CachedEmbedder<E>>) -> Self {
        Self {
            embedder,
            model: "all-MiniLM-L6-v2".to_string(),
            dimension: DEFAULT_DIMENSION,
            timeout: None,
        }
    }

    /// Set the reported model name.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Set the expected embedding dimension.
    pub fn with_dimension(mut self, dimension: usize) -> Self {
        self.dimension = dimension;
        self
    }

    /// Stop waiting for a call after `timeout`.
    ///
    /// The blocking call keeps running to completion in the background; only
    /// the caller is released.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Get the underlying embedder.
    pub fn embedder(&self) -> &Arc<CachedEmbedder<E>> {
        &self.embedder
    }
}

#[async_trait]
impl<E> EmbeddingProvider for LocalProvider<E>
where
    E: TextEncoder + 'static,
{
    fn name(&self) -> &str {
        "local"
    }

    fn default_model(&self) -> &str {
        &self.model
    }

    fn default_dimension(&self) -> usize {
        self.dimension
    }

    async fn embed(&self, request: EmbeddingRequest) -> Result<EmbeddingResponse> {
        let embedder = Arc::clone(&self.embedder);
        let text = request.text;
        let task = tokio::task::spawn_blocking(move || embedder.encode(&text));

        let joined = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, task).await.map_err(|_| {
                warn!("Local embedding exceeded {}ms", limit.as_millis());
                EmbeddingError::Timeout {
                    timeout_ms: limit.as_millis() as u64,
                }
            })?,
            None => task.await,
        };
        let EncodedText {
            embedding,
            token_count,
        } = joined.map_err(|e| EmbeddingError::encoding(EncodingStage::Inference, e))??;

        if embedding.len() != self.dimension {
            return Err(EmbeddingError::DimensionMismatch {
                expected: self.dimension,
                actual: embedding.len(),
            });
        }

        debug!("Generated embedding with {} dimensions", embedding.len());

        Ok(EmbeddingResponse {
            dimension: embedding.len(),
            embedding,
            model: self.model.clone(),
            tokens_used: Some(token_count as u64),
        })
    }

    fn is_available(&self) -> bool {
        true
    }
}
