//! Error types for the classifier.

use thiserror::Error;

/// Result type alias for classifier operations.
pub type Result<T> = std::result::Result<T, ClassifierError>;

/// Errors that can occur while building or running a classifier.
#[derive(Error, Debug)]
pub enum ClassifierError {
    /// Embedding error.
    #[error("embedding error: {0}")]
    Embedding(#[from] minilm_embeddings::EmbeddingError),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// TOML parse error.
    #[error("invalid configuration file: {0}")]
    Toml(#[from] toml::de::Error),
}
