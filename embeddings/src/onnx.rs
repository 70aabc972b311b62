//! ONNX Runtime and HuggingFace tokenizer backends.
//!
//! Artifacts are read once when the backend is built; there is no process
//! wide instance, callers share an [`Arc`] of what they build.

use std::sync::{Arc, Mutex};

use ort::session::{Session, SessionInputValue};
use ort::value::Tensor;
use tracing::info;

use crate::cache::CachedEmbedder;
use crate::config::{EmbedderConfig, ModelArtifacts};
use crate::encoder::BertEncoder;
use crate::error::{BoxError, EmbeddingError, Result};
use crate::inference::{HiddenStates, InferenceEngine, ModelInputs};
use crate::tokenizer::{Token, TokenizedInput, Tokenizer};

/// Inference over an ONNX model session.
pub struct OnnxEngine {
    session: Mutex<Session>,
    input_names: Vec<String>,
}

impl OnnxEngine {
    /// Build a session from serialized model bytes.
    pub fn from_bytes(model: &[u8]) -> std::result::Result<Self, ort::Error> {
        let session = Session::builder()?.commit_from_memory(model)?;
        let input_names = session.inputs.iter().map(|input| input.name.clone()).collect();
        Ok(Self {
            session: Mutex::new(session),
            input_names,
        })
    }
}

impl InferenceEngine for OnnxEngine {
    fn input_names(&self) -> Vec<String> {
        self.input_names.clone()
    }

    fn run(&self, inputs: &ModelInputs) -> std::result::Result<HiddenStates, BoxError> {
        let shape = inputs.shape();
        let mut values: Vec<(String, SessionInputValue<'static>)> = Vec::new();
        for (name, data) in inputs.named() {
            let tensor = Tensor::from_array((shape, data.to_vec()))?;
            values.push((name.to_string(), tensor.into()));
        }

        let mut session = self
            .session
            .lock()
            .map_err(|_| BoxError::from("onnx session lock poisoned"))?;
        let outputs = session.run(values)?;
        let (dims, data) = outputs[0].try_extract_tensor::<f32>()?;

        let dims = dims
            .iter()
            .map(|&d| usize::try_from(d))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(HiddenStates::new(&dims, data.to_vec())?)
    }
}

/// [`Tokenizer`] over a HuggingFace `tokenizer.json`.
pub struct HfTokenizer {
    inner: tokenizers::Tokenizer,
}

impl HfTokenizer {
    /// Load from the bytes of a `tokenizer.json`.
    ///
    /// Padding and truncation are disabled; long inputs are partitioned
    /// before they reach the tokenizer's encode step.
    pub fn from_bytes(bytes: &[u8]) -> std::result::Result<Self, BoxError> {
        let mut inner = tokenizers::Tokenizer::from_bytes(bytes)?;
        inner.with_padding(None);
        inner.with_truncation(None)?;
        Ok(Self { inner })
    }
}

impl Tokenizer for HfTokenizer {
    fn tokenize(&self, text: &str) -> std::result::Result<Vec<Token>, BoxError> {
        let encoding = self.inner.encode(text, true)?;
        Ok(encoding.get_tokens().iter().map(|t| Token::new(t.as_str())).collect())
    }

    fn encode(&self, text: &str) -> std::result::Result<TokenizedInput, BoxError> {
        let encoding = self.inner.encode(text, true)?;
        let widen = |values: &[u32]| values.iter().map(|&v| i64::from(v)).collect();
        Ok(TokenizedInput {
            ids: widen(encoding.get_ids()),
            attention_mask: widen(encoding.get_attention_mask()),
            type_ids: widen(encoding.get_type_ids()),
        })
    }

    fn detokenize(&self, tokens: &[Token]) -> std::result::Result<String, BoxError> {
        let ids: Option<Vec<u32>> = tokens.iter().map(|t| self.inner.token_to_id(&t.text)).collect();
        match ids {
            Some(ids) => Ok(self.inner.decode(&ids, true)?),
            None => Ok(tokens
                .iter()
                .map(|t| t.text.as_str())
                .collect::<Vec<_>>()
                .join(" ")),
        }
    }
}

/// Loading helpers for all-MiniLM-L6-v2 style models.
pub struct MiniLm;

impl MiniLm {
    /// Build an encoder from model files.
    pub fn from_artifacts(artifacts: &ModelArtifacts, config: &EmbedderConfig) -> Result<BertEncoder> {
        artifacts.validate()?;
        let tokenizer = HfTokenizer::from_bytes(&artifacts.read_tokenizer()?)
            .map_err(|e| EmbeddingError::InvalidConfig(format!("unreadable tokenizer: {e}")))?;
        let engine = OnnxEngine::from_bytes(&artifacts.read_model()?)
            .map_err(|e| EmbeddingError::InvalidConfig(format!("unreadable model: {e}")))?;
        info!(
            "Loaded ONNX model {} with inputs {:?}",
            artifacts.model_path.display(),
            engine.input_names
        );

        BertEncoder::from_config(Arc::new(tokenizer), Arc::new(engine), config)
    }
}

/// Build a cached embedder from configuration.
pub fn load_embedder(config: &EmbedderConfig) -> Result<CachedEmbedder<BertEncoder>> {
    config.validate()?;
    let artifacts = config.artifacts.as_ref().ok_or_else(|| {
        EmbeddingError::InvalidConfig("artifacts must be set to load a local model".to_string())
    })?;
    let encoder = MiniLm::from_artifacts(artifacts, config)?;
    CachedEmbedder::from_config(encoder, config)
}
