//! Error types for the embeddings system.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for embedding operations.
pub type Result<T> = std::result::Result<T, EmbeddingError>;

/// Boxed error returned by external collaborators (tokenizer, inference engine).
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Stage of the encoding pipeline in which a collaborator failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodingStage {
    Tokenize,
    Detokenize,
    Inference,
}

impl std::fmt::Display for EncodingStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            EncodingStage::Tokenize => "tokenize",
            EncodingStage::Detokenize => "detokenize",
            EncodingStage::Inference => "inference",
        };
        f.write_str(name)
    }
}

/// Errors that can occur in the embeddings system.
#[derive(Error, Debug)]
pub enum EmbeddingError {
    /// Invalid configuration value.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// A model or tokenizer artifact could not be found.
    #[error("missing {kind} artifact: {}", path.display())]
    MissingArtifact { kind: &'static str, path: PathBuf },

    /// Dimension mismatch.
    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// A vector with zero L2 norm cannot be normalized or compared.
    #[error("zero-norm vector in {0}")]
    ZeroNorm(&'static str),

    /// The text produced no tokens between the boundary markers.
    #[error("input has no tokens to encode")]
    EmptyInput,

    /// The token sequence cannot be partitioned without splitting a word.
    #[error("cannot partition token sequence: {0}")]
    Partition(String),

    /// A tokenizer or inference engine call failed.
    #[error("encoding failed during {stage}: {source}")]
    Encoding {
        stage: EncodingStage,
        #[source]
        source: BoxError,
    },

    /// The inference engine returned output of an unexpected shape.
    #[error("invalid model output: {0}")]
    InvalidOutput(String),

    /// The embedding call did not finish in time.
    #[error("embedding timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    /// A lock was poisoned by a panicking holder.
    #[error("lock poisoned: {0}")]
    LockPoisoned(&'static str),

    /// Configuration file parse error.
    #[error("config parse error: {0}")]
    Config(#[from] toml::de::Error),

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl EmbeddingError {
    /// Wrap a collaborator failure.
    pub fn encoding(stage: EncodingStage, source: impl Into<BoxError>) -> Self {
        EmbeddingError::Encoding {
            stage,
            source: source.into(),
        }
    }

    /// Whether this error stems from construction-time configuration
    /// rather than from a runtime operation.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            EmbeddingError::InvalidConfig(_)
                | EmbeddingError::MissingArtifact { .. }
                | EmbeddingError::Config(_)
        )
    }
}
