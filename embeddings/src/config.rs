//! Configuration for building an embedder.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{EmbeddingError, Result};
use crate::pooling::PoolingMode;
use crate::{DEFAULT_CACHE_CAPACITY, MAX_SEQUENCE_LENGTH};

/// Model and tokenizer files loaded once at construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelArtifacts {
    /// ONNX model file.
    pub model_path: PathBuf,

    /// HuggingFace `tokenizer.json`.
    pub tokenizer_path: PathBuf,
}

impl ModelArtifacts {
    pub fn new(model_path: impl Into<PathBuf>, tokenizer_path: impl Into<PathBuf>) -> Self {
        Self {
            model_path: model_path.into(),
            tokenizer_path: tokenizer_path.into(),
        }
    }

    /// Look for `model.onnx` and `tokenizer.json` inside `dir`.
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        Self::new(dir.join("model.onnx"), dir.join("tokenizer.json"))
    }

    /// Fail unless both files exist.
    pub fn validate(&self) -> Result<()> {
        for (kind, path) in [("model", &self.model_path), ("tokenizer", &self.tokenizer_path)] {
            if !path.is_file() {
                return Err(EmbeddingError::MissingArtifact {
                    kind,
                    path: path.clone(),
                });
            }
        }
        Ok(())
    }

    /// Read the model bytes.
    pub fn read_model(&self) -> Result<Vec<u8>> {
        read_artifact("model", &self.model_path)
    }

    /// Read the tokenizer configuration bytes.
    pub fn read_tokenizer(&self) -> Result<Vec<u8>> {
        read_artifact("tokenizer", &self.tokenizer_path)
    }
}

fn read_artifact(kind: &'static str, path: &Path) -> Result<Vec<u8>> {
    match std::fs::read(path) {
        Ok(bytes) => {
            info!("Loaded {kind} artifact {} ({} bytes)", path.display(), bytes.len());
            Ok(bytes)
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(EmbeddingError::MissingArtifact {
            kind,
            path: path.to_path_buf(),
        }),
        Err(e) => Err(e.into()),
    }
}

/// Configuration for the encoder, cache and provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbedderConfig {
    /// Maximum tokens per partition, boundary markers excluded.
    pub max_sequence_length: usize,

    /// Pooling strategy.
    pub pooling: PoolingMode,

    /// Maximum number of cached embeddings.
    pub cache_capacity: usize,

    /// Upper bound on a single provider call, in milliseconds.
    pub inference_timeout_ms: Option<u64>,

    /// Model files, when loading a local model.
    pub artifacts: Option<ModelArtifacts>,
}

impl Default for EmbedderConfig {
    fn default() -> Self {
        Self {
            max_sequence_length: MAX_SEQUENCE_LENGTH,
            pooling: PoolingMode::Mean,
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            inference_timeout_ms: None,
            artifacts: None,
        }
    }
}

impl EmbedderConfig {
    /// Set the model files.
    pub fn with_artifacts(mut self, artifacts: ModelArtifacts) -> Self {
        self.artifacts = Some(artifacts);
        self
    }

    /// Set the pooling strategy.
    pub fn with_pooling(mut self, pooling: PoolingMode) -> Self {
        self.pooling = pooling;
        self
    }

    /// Set the cache capacity.
    pub fn with_cache_capacity(mut self, capacity: usize) -> Self {
        self.cache_capacity = capacity;
        self
    }

    /// Set the provider timeout.
    pub fn with_inference_timeout(mut self, timeout: Duration) -> Self {
        self.inference_timeout_ms = Some(timeout.as_millis() as u64);
        self
    }

    pub fn inference_timeout(&self) -> Option<Duration> {
        self.inference_timeout_ms.map(Duration::from_millis)
    }

    /// Reject values that would only fail later, at first use.
    pub fn validate(&self) -> Result<()> {
        if self.max_sequence_length == 0 {
            return Err(EmbeddingError::InvalidConfig(
                "max_sequence_length must be greater than zero".to_string(),
            ));
        }
        if self.cache_capacity == 0 {
            return Err(EmbeddingError::InvalidConfig(
                "cache_capacity must be greater than zero".to_string(),
            ));
        }
        if self.inference_timeout_ms == Some(0) {
            return Err(EmbeddingError::InvalidConfig(
                "inference_timeout_ms must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Parse and validate a TOML document.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file.
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_defaults() {
        let config = EmbedderConfig::default();
        assert_eq!(config.max_sequence_length, 510);
        assert_eq!(config.cache_capacity, 512);
        assert_eq!(config.pooling, PoolingMode::Mean);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_toml() {
        let config = EmbedderConfig::from_toml_str(
            r#"
            pooling = "first_token"
            cache_capacity = 64
            inference_timeout_ms = 2500

            [artifacts]
            model_path = "models/minilm.onnx"
            tokenizer_path = "models/tokenizer.json"
            "#,
        )
        .unwrap();

        assert_eq!(config.pooling, PoolingMode::FirstToken);
        assert_eq!(config.cache_capacity, 64);
        assert_eq!(config.max_sequence_length, 510);
        assert_eq!(config.inference_timeout(), Some(Duration::from_millis(2500)));
        assert_eq!(
            config.artifacts,
            Some(ModelArtifacts::new("models/minilm.onnx", "models/tokenizer.json"))
        );
    }

    #[test]
    fn test_invalid_values_fail_fast() {
        let err = EmbedderConfig::from_toml_str("cache_capacity = 0").unwrap_err();
        assert!(err.is_configuration());

        let err = EmbedderConfig::from_toml_str("max_sequence_length = 0").unwrap_err();
        assert!(err.is_configuration());

        let err = EmbedderConfig::from_toml_str("pooling = \"max\"").unwrap_err();
        assert!(matches!(err, EmbeddingError::Config(_)));
    }

    #[test]
    fn test_missing_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let artifacts = ModelArtifacts::in_dir(dir.path());
        assert!(matches!(
            artifacts.validate(),
            Err(EmbeddingError::MissingArtifact { kind: "model", .. })
        ));

        std::fs::write(dir.path().join("model.onnx"), b"onnx").unwrap();
        assert!(matches!(
            artifacts.validate(),
            Err(EmbeddingError::MissingArtifact {
                kind: "tokenizer",
                ..
            })
        ));
        assert!(matches!(
            artifacts.read_tokenizer(),
            Err(EmbeddingError::MissingArtifact { .. })
        ));

        std::fs::write(dir.path().join("tokenizer.json"), b"{}").unwrap();
        assert!(artifacts.validate().is_ok());
        assert_eq!(artifacts.read_model().unwrap(), b"onnx".to_vec());
    }

    #[test]
    fn test_from_toml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("embedder.toml");
        std::fs::write(&path, "max_sequence_length = 128\n").unwrap();
        let config = EmbedderConfig::from_toml_file(&path).unwrap();
        assert_eq!(config.max_sequence_length, 128);
    }
}
