//! Nearest-prototype classification.
//!
//! Every label owns a handful of example texts. An input is scored against
//! each label by comparing its embedding with the label's example
//! embeddings; the label score blends the mean and the best example score.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use minilm_embeddings::{Embedder, Embedding, cosine_similarity, relevance_score};

use crate::config::ClassifierConfig;
use crate::error::{ClassifierError, Result};

/// A label with its aggregated relevance score in `[0, 1]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredLabel<L> {
    pub label: L,
    pub score: f32,
}

/// Assigns labels to text.
pub trait TextClassifier<L> {
    /// Labels for `text`, most relevant first.
    fn classify(&self, text: &str) -> Result<Vec<L>>;
}

struct LabelExamples<L> {
    label: L,
    embeddings: Vec<Embedding>,
}

/// Classifier comparing inputs with embedded examples of each label.
pub struct EmbeddingClassifier<L> {
    embedder: Arc<dyn Embedder>,
    labels: Vec<LabelExamples<L>>,
    config: ClassifierConfig,
}

impl<L> EmbeddingClassifier<L>
where
    L: Clone,
{
    /// Start building a classifier over `embedder`.
    pub fn builder(embedder: Arc<dyn Embedder>) -> EmbeddingClassifierBuilder<L> {
        EmbeddingClassifierBuilder::new(embedder)
    }

    /// Embed every example and build the classifier.
    ///
    /// Labels keep the order given here, which also breaks score ties.
    pub fn new<S>(
        embedder: Arc<dyn Embedder>,
        examples_by_label: impl IntoIterator<Item = (L, Vec<S>)>,
        config: ClassifierConfig,
    ) -> Result<Self>
    where
        S: AsRef<str>,
    {
        config.validate()?;

        let mut labels = Vec::new();
        for (label, examples) in examples_by_label {
            if examples.is_empty() {
                return Err(ClassifierError::Config(format!(
                    "label #{} has no examples",
                    labels.len()
                )));
            }
            let embeddings = examples
                .iter()
                .map(|example| embedder.embed(example.as_ref()))
                .collect::<minilm_embeddings::Result<Vec<_>>>()?;
            labels.push(LabelExamples { label, embeddings });
        }

        info!("Built embedding classifier with {} labels", labels.len());
        Ok(Self {
            embedder,
            labels,
            config,
        })
    }

    pub fn config(&self) -> &ClassifierConfig {
        &self.config
    }

    /// Number of labels.
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Score every label against `text`.
    ///
    /// Labels under `min_score` are dropped; at most `max_results` remain,
    /// highest score first.
    pub fn classify_with_scores(&self, text: &str) -> Result<Vec<ScoredLabel<L>>> {
        let query = self.embedder.embed(text)?;

        let mut scored = Vec::with_capacity(self.labels.len());
        for entry in &self.labels {
            let score = self.score_label(&query, &entry.embeddings)?;
            if score >= self.config.min_score {
                scored.push(ScoredLabel {
                    label: entry.label.clone(),
                    score,
                });
            }
        }

        scored.sort_by(|a, b| b.score.total_cmp(&a.score));
        scored.truncate(self.config.max_results);
        debug!("Classified text into {} label(s)", scored.len());

        Ok(scored)
    }

    fn score_label(&self, query: &[f32], examples: &[Embedding]) -> Result<f32> {
        let mut sum = 0.0;
        let mut max = 0.0f32;
        for example in examples {
            let score = relevance_score(cosine_similarity(query, example)?);
            sum += score;
            max = max.max(score);
        }
        let mean = sum / examples.len() as f32;
        Ok(self.config.aggregate(mean, max))
    }
}

impl<L> TextClassifier<L> for EmbeddingClassifier<L>
where
    L: Clone,
{
    fn classify(&self, text: &str) -> Result<Vec<L>> {
        Ok(self
            .classify_with_scores(text)?
            .into_iter()
            .map(|scored| scored.label)
            .collect())
    }
}

/// Builder for [`EmbeddingClassifier`].
pub struct EmbeddingClassifierBuilder<L> {
    embedder: Arc<dyn Embedder>,
    examples: Vec<(L, Vec<String>)>,
    config: ClassifierConfig,
}

impl<L> EmbeddingClassifierBuilder<L>
where
    L: Clone,
{
    fn new(embedder: Arc<dyn Embedder>) -> Self {
        Self {
            embedder,
            examples: Vec::new(),
            config: ClassifierConfig::default(),
        }
    }

    /// Add a label with its example texts.
    pub fn with_label<S>(mut self, label: L, examples: impl IntoIterator<Item = S>) -> Self
    where
        S: Into<String>,
    {
        self.examples
            .push((label, examples.into_iter().map(Into::into).collect()));
        self
    }

    pub fn with_config(mut self, config: ClassifierConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> Result<EmbeddingClassifier<L>> {
        EmbeddingClassifier::new(self.embedder, self.examples, self.config)
    }
}
