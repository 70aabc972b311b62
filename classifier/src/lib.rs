//! # MiniLM Classifier
//!
//! Nearest-prototype text classification on top of `minilm-embeddings`.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use minilm_classifier::{EmbeddingClassifier, TextClassifier};
//!
//! let classifier = EmbeddingClassifier::builder(embedder)
//!     .with_label("weather", ["Will it rain tomorrow?", "Forecast for Paris"])
//!     .with_label("billing", ["My invoice is wrong", "Refund my payment"])
//!     .build()?;
//!
//! let labels = classifier.classify("Is it going to snow?")?;
//! ```

pub mod classifier;
pub mod config;
pub mod error;

pub use classifier::{EmbeddingClassifier, EmbeddingClassifierBuilder, ScoredLabel, TextClassifier};
pub use config::ClassifierConfig;
pub use error::{ClassifierError, Result};
