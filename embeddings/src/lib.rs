//! # MiniLM Embeddings
//!
//! Local sentence embeddings over a BERT-style model, plus the similarity
//! search built on top of them.
//!
//! ## Features
//!
//! - **Arbitrary-length text**: token sequences longer than the model window
//!   are split on word boundaries and recombined by a weighted average
//! - **Pluggable collaborators**: the tokenizer and inference engine are
//!   traits; an ONNX Runtime backend ships behind the `onnx` feature
//! - **Caching**: an LRU cache keyed by whitespace-normalized text
//! - **Similarity Search**: an append-only store ranked by cosine similarity
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                    Embeddings System                            │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  Tokenizer ──► partition ──► InferenceEngine ──► pooling        │
//! │       │                                              │          │
//! │       └──────────────── BertEncoder ◄────────────────┘          │
//! │                              │                                  │
//! │                              ▼                                  │
//! │  LocalProvider ◄──── CachedEmbedder ────► EmbeddingStore        │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod cache;
pub mod config;
pub mod encoder;
pub mod error;
pub mod inference;
#[cfg(any(test, feature = "test-util"))]
pub mod mock;
#[cfg(feature = "onnx")]
pub mod onnx;
pub mod partition;
pub mod pooling;
pub mod provider;
pub mod similarity;
pub mod store;
pub mod tokenizer;

pub use cache::{CacheStats, CachedEmbedder, EmbeddingCache};
pub use config::{EmbedderConfig, ModelArtifacts};
pub use encoder::{BertEncoder, EncodedText, Embedder, TextEncoder};
pub use error::{BoxError, EmbeddingError, EncodingStage, Result};
pub use inference::{HiddenStates, InferenceEngine, ModelInputs};
#[cfg(feature = "onnx")]
pub use onnx::{HfTokenizer, MiniLm, OnnxEngine, load_embedder};
pub use pooling::PoolingMode;
pub use provider::{EmbeddingProvider, EmbeddingRequest, EmbeddingResponse, LocalProvider};
pub use similarity::{cosine_similarity, relevance_score, top_k};
pub use store::{Embeddable, EmbeddingMatch, EmbeddingStore, TextSegment};
pub use tokenizer::{Token, TokenizedInput, Tokenizer};

/// A dense vector embedding.
pub type Embedding = Vec<f32>;

/// Dimension of embeddings (all-MiniLM-L6-v2).
pub const DEFAULT_DIMENSION: usize = 384;

/// Maximum number of content tokens per model call; two more slots are
/// reserved for the boundary markers.
pub const MAX_SEQUENCE_LENGTH: usize = 510;

/// Default number of cached embeddings.
pub const DEFAULT_CACHE_CAPACITY: usize = 512;
