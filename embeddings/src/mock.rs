//! Deterministic collaborators for tests and examples.
//!
//! [`VocabTokenizer`] is a lowercasing word tokenizer that assigns ids on
//! first sight and breaks long words into `##` continuation pieces.
//! [`OneHotEngine`] turns every token id into a one-hot row, so mean pooling
//! yields a bag-of-words vector whose cosine similarity counts shared tokens.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use crate::error::BoxError;
use crate::inference::{
    ATTENTION_MASK, HiddenStates, INPUT_IDS, InferenceEngine, ModelInputs, TOKEN_TYPE_IDS,
};
use crate::tokenizer::{CONTINUATION_PREFIX, Token, TokenizedInput, Tokenizer};

pub const CLS: &str = "[CLS]";
pub const SEP: &str = "[SEP]";

/// Word tokenizer with a growing vocabulary.
pub struct VocabTokenizer {
    vocab: Mutex<HashMap<String, i64>>,
    max_piece_chars: usize,
    lossy_detokenize: bool,
}

impl Default for VocabTokenizer {
    fn default() -> Self {
        Self::new()
    }
}

impl VocabTokenizer {
    pub fn new() -> Self {
        let vocab = HashMap::from([(CLS.to_string(), 1), (SEP.to_string(), 2)]);
        Self {
            vocab: Mutex::new(vocab),
            max_piece_chars: 8,
            lossy_detokenize: false,
        }
    }

    /// Words longer than `chars` are split into continuation pieces.
    pub fn with_max_piece_chars(mut self, chars: usize) -> Self {
        self.max_piece_chars = chars.max(1);
        self
    }

    /// Make `detokenize` drop all whitespace, so the round trip never matches.
    pub fn with_lossy_detokenize(mut self) -> Self {
        self.lossy_detokenize = true;
        self
    }

    /// Number of distinct tokens seen so far, markers included.
    pub fn vocab_size(&self) -> usize {
        self.vocab.lock().map(|v| v.len()).unwrap_or_default()
    }

    fn id_of(&self, token: &str) -> Result<i64, BoxError> {
        let mut vocab = self
            .vocab
            .lock()
            .map_err(|_| BoxError::from("vocabulary lock poisoned"))?;
        let next = vocab.len() as i64 + 1;
        Ok(*vocab.entry(token.to_string()).or_insert(next))
    }

    fn words(text: &str) -> Vec<String> {
        let mut words = Vec::new();
        let mut current = String::new();
        for ch in text.chars() {
            if ch.is_alphanumeric() || ch == '#' {
                current.extend(ch.to_lowercase());
                continue;
            }
            if !current.is_empty() {
                words.push(std::mem::take(&mut current));
            }
            if !ch.is_whitespace() {
                words.push(ch.to_string());
            }
        }
        if !current.is_empty() {
            words.push(current);
        }
        words
    }

    fn pieces(&self, word: &str) -> Vec<Token> {
        let chars: Vec<char> = word.chars().collect();
        chars
            .chunks(self.max_piece_chars)
            .enumerate()
            .map(|(i, chunk)| {
                let piece: String = chunk.iter().collect();
                if i == 0 {
                    Token::new(piece)
                } else {
                    Token::new(format!("{CONTINUATION_PREFIX}{piece}"))
                }
            })
            .collect()
    }
}

impl Tokenizer for VocabTokenizer {
    fn tokenize(&self, text: &str) -> Result<Vec<Token>, BoxError> {
        let mut tokens = vec![Token::new(CLS)];
        for word in Self::words(text) {
            tokens.extend(self.pieces(&word));
        }
        tokens.push(Token::new(SEP));
        Ok(tokens)
    }

    fn encode(&self, text: &str) -> Result<TokenizedInput, BoxError> {
        let tokens = self.tokenize(text)?;
        let ids = tokens
            .iter()
            .map(|t| self.id_of(&t.text))
            .collect::<Result<Vec<_>, _>>()?;
        let len = ids.len();
        Ok(TokenizedInput {
            ids,
            attention_mask: vec![1; len],
            type_ids: vec![0; len],
        })
    }

    fn detokenize(&self, tokens: &[Token]) -> Result<String, BoxError> {
        let mut text = String::new();
        for token in tokens {
            if let Some(rest) = token.text.strip_prefix(CONTINUATION_PREFIX) {
                text.push_str(rest);
            } else {
                if !text.is_empty() && !self.lossy_detokenize {
                    text.push(' ');
                }
                text.push_str(&token.text);
            }
        }
        Ok(text)
    }
}

/// Engine producing one-hot rows indexed by `id % width`.
pub struct OneHotEngine {
    width: usize,
    declares_token_type_ids: bool,
    calls: AtomicUsize,
    failing: AtomicBool,
    delay: Option<Duration>,
    last_inputs: Mutex<Option<ModelInputs>>,
}

impl OneHotEngine {
    pub fn new(width: usize) -> Self {
        Self {
            width: width.max(1),
            declares_token_type_ids: true,
            calls: AtomicUsize::new(0),
            failing: AtomicBool::new(false),
            delay: None,
            last_inputs: Mutex::new(None),
        }
    }

    /// Declare only `input_ids` and `attention_mask`.
    pub fn without_token_type_ids(mut self) -> Self {
        self.declares_token_type_ids = false;
        self
    }

    /// Sleep this long inside every call.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Make subsequent calls fail.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Number of `run` calls so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Inputs of the most recent call.
    pub fn last_inputs(&self) -> Option<ModelInputs> {
        self.last_inputs.lock().ok().and_then(|last| last.clone())
    }
}

impl InferenceEngine for OneHotEngine {
    fn input_names(&self) -> Vec<String> {
        let mut names = vec![INPUT_IDS.to_string(), ATTENTION_MASK.to_string()];
        if self.declares_token_type_ids {
            names.push(TOKEN_TYPE_IDS.to_string());
        }
        names
    }

    fn run(&self, inputs: &ModelInputs) -> Result<HiddenStates, BoxError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            std::thread::sleep(delay);
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err("inference engine unavailable".into());
        }
        if let Ok(mut last) = self.last_inputs.lock() {
            *last = Some(inputs.clone());
        }

        let mut data = vec![0.0f32; inputs.len() * self.width];
        for (row, id) in inputs.input_ids.iter().enumerate() {
            let column = id.rem_euclid(self.width as i64) as usize;
            data[row * self.width + column] = 1.0;
        }
        HiddenStates::new(&[1, inputs.len(), self.width], data).map_err(BoxError::from)
    }
}
