//! Encoding pipeline: text in, one unit-length vector out.
//!
//! ```text
//! text ─► tokenize ─► partition ─► (rebuild text ─► encode ─► infer ─► pool)*
//!                                                    │
//!                      normalize ◄─ weighted average ◄┘
//! ```

use std::sync::Arc;

use tracing::{debug, warn};

use crate::Embedding;
use crate::config::EmbedderConfig;
use crate::error::{EmbeddingError, EncodingStage, Result};
use crate::inference::{HiddenStates, InferenceEngine, ModelInputs, TOKEN_TYPE_IDS};
use crate::partition::partition;
use crate::pooling::{PoolingMode, aggregate};
use crate::tokenizer::{Token, Tokenizer};
use crate::MAX_SEQUENCE_LENGTH;

/// An embedding together with the token count of the source text.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodedText {
    /// Unit-length embedding.
    pub embedding: Embedding,

    /// Tokens in the original text, boundary markers included.
    pub token_count: usize,
}

/// Something that turns text into an embedding.
pub trait TextEncoder: Send + Sync {
    /// Encode text into a normalized embedding.
    fn encode(&self, text: &str) -> Result<EncodedText>;

    /// Count the tokens of `text` without running inference.
    fn count_tokens(&self, text: &str) -> Result<usize>;
}

/// Text to embedding, as consumed by stores and classifiers.
pub trait Embedder: Send + Sync {
    fn embed(&self, text: &str) -> Result<Embedding>;
}

/// BERT-style sentence encoder over an external tokenizer and model.
pub struct BertEncoder {
    tokenizer: Arc<dyn Tokenizer>,
    engine: Arc<dyn InferenceEngine>,
    pooling: PoolingMode,
    max_sequence_length: usize,
}

impl BertEncoder {
    /// Create an encoder with the default maximum partition length.
    pub fn new(
        tokenizer: Arc<dyn Tokenizer>,
        engine: Arc<dyn InferenceEngine>,
        pooling: PoolingMode,
    ) -> Self {
        Self {
            tokenizer,
            engine,
            pooling,
            max_sequence_length: MAX_SEQUENCE_LENGTH,
        }
    }

    /// Create an encoder from validated configuration.
    pub fn from_config(
        tokenizer: Arc<dyn Tokenizer>,
        engine: Arc<dyn InferenceEngine>,
        config: &EmbedderConfig,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self::new(tokenizer, engine, config.pooling)
            .with_max_sequence_length(config.max_sequence_length))
    }

    /// Set the maximum number of tokens per partition.
    pub fn with_max_sequence_length(mut self, max_sequence_length: usize) -> Self {
        self.max_sequence_length = max_sequence_length;
        self
    }

    pub fn pooling(&self) -> PoolingMode {
        self.pooling
    }

    pub fn max_sequence_length(&self) -> usize {
        self.max_sequence_length
    }

    fn tokenize(&self, text: &str) -> Result<Vec<Token>> {
        self.tokenizer
            .tokenize(text)
            .map_err(|e| EmbeddingError::encoding(EncodingStage::Tokenize, e))
    }

    /// Rebuild surface text for a partition.
    ///
    /// Uses the detokenized text when re-tokenizing it reproduces the
    /// partition exactly; otherwise concatenates the raw token strings,
    /// which may lose whitespace.
    fn partition_text(&self, tokens: &[Token]) -> Result<String> {
        let text = self
            .tokenizer
            .detokenize(tokens)
            .map_err(|e| EmbeddingError::encoding(EncodingStage::Detokenize, e))?;
        let retokenized = self.tokenize(&text)?;
        let inner = match retokenized.len() {
            0 | 1 => &[][..],
            n => &retokenized[1..n - 1],
        };

        if inner.iter().map(|t| &t.text).eq(tokens.iter().map(|t| &t.text)) {
            return Ok(text);
        }

        warn!(
            "Detokenized partition of {} tokens does not round-trip; concatenating raw tokens",
            tokens.len()
        );
        Ok(tokens.iter().map(|t| t.text.as_str()).collect())
    }

    fn infer(&self, text: &str) -> Result<HiddenStates> {
        let encoded = self
            .tokenizer
            .encode(text)
            .map_err(|e| EmbeddingError::encoding(EncodingStage::Tokenize, e))?;
        if encoded.attention_mask.len() != encoded.len() {
            return Err(EmbeddingError::DimensionMismatch {
                expected: encoded.len(),
                actual: encoded.attention_mask.len(),
            });
        }

        let wants_type_ids = self
            .engine
            .input_names()
            .iter()
            .any(|name| name == TOKEN_TYPE_IDS);
        if wants_type_ids && encoded.type_ids.len() != encoded.len() {
            return Err(EmbeddingError::DimensionMismatch {
                expected: encoded.len(),
                actual: encoded.type_ids.len(),
            });
        }
        let inputs = ModelInputs {
            input_ids: encoded.ids,
            attention_mask: encoded.attention_mask,
            token_type_ids: wants_type_ids.then_some(encoded.type_ids),
        };

        self.engine
            .run(&inputs)
            .map_err(|e| EmbeddingError::encoding(EncodingStage::Inference, e))
    }
}

impl TextEncoder for BertEncoder {
    fn encode(&self, text: &str) -> Result<EncodedText> {
        let tokens = self.tokenize(text)?;
        let partitions = partition(&tokens, self.max_sequence_length)?;
        if partitions.is_empty() {
            return Err(EmbeddingError::EmptyInput);
        }

        let mut pooled = Vec::with_capacity(partitions.len());
        let mut weights = Vec::with_capacity(partitions.len());
        for part in &partitions {
            let text = self.partition_text(part)?;
            let states = self.infer(&text)?;
            let rows = states.first_batch_rows()?;
            pooled.push(self.pooling.pool(&rows)?);
            weights.push(part.len());
        }

        let embedding = aggregate(&pooled, &weights)?;
        debug!(
            "Encoded {} tokens in {} partition(s) into {} dimensions",
            tokens.len(),
            partitions.len(),
            embedding.len()
        );

        Ok(EncodedText {
            embedding,
            token_count: tokens.len(),
        })
    }

    fn count_tokens(&self, text: &str) -> Result<usize> {
        Ok(self.tokenize(text)?.len())
    }
}

impl Embedder for BertEncoder {
    fn embed(&self, text: &str) -> Result<Embedding> {
        Ok(self.encode(text)?.embedding)
    }
}
