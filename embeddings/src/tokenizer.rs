//! Tokenizer boundary.
//!
//! The subword tokenizer is an external collaborator. The pipeline only needs
//! token strings (for partitioning), model ids for a piece of text, and a way
//! to turn a run of tokens back into surface text.

use serde::{Deserialize, Serialize};

use crate::error::BoxError;

/// Prefix WordPiece uses to mark a token that continues the previous word.
pub const CONTINUATION_PREFIX: &str = "##";

/// A single subword token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    /// Token text as produced by the tokenizer.
    pub text: String,

    /// Whether this token continues the word started by the previous token.
    pub continuation: bool,
}

impl Token {
    /// Create a token, deriving the continuation flag from the `##` prefix.
    pub fn new(text: impl Into<String>) -> Self {
        let text = text.into();
        let continuation = text.starts_with(CONTINUATION_PREFIX);
        Self { text, continuation }
    }

    /// Whether a partition boundary may not be placed before this token.
    pub fn is_continuation(&self) -> bool {
        self.continuation
    }
}

impl From<&str> for Token {
    fn from(text: &str) -> Self {
        Token::new(text)
    }
}

/// Model-ready encoding of a piece of text, without padding.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TokenizedInput {
    /// Vocabulary ids, boundary markers included.
    pub ids: Vec<i64>,

    /// 1 for every real token.
    pub attention_mask: Vec<i64>,

    /// Segment ids.
    pub type_ids: Vec<i64>,
}

impl TokenizedInput {
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

/// A subword tokenizer.
pub trait Tokenizer: Send + Sync {
    /// Split text into tokens, including the leading and trailing boundary markers.
    fn tokenize(&self, text: &str) -> Result<Vec<Token>, BoxError>;

    /// Encode text with special tokens added and padding disabled.
    fn encode(&self, text: &str) -> Result<TokenizedInput, BoxError>;

    /// Rejoin tokens into surface text.
    fn detokenize(&self, tokens: &[Token]) -> Result<String, BoxError>;
}
