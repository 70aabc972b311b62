//! Append-only store of items and their embeddings.

use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::Embedding;
use crate::encoder::Embedder;
use crate::error::{EmbeddingError, Result};
use crate::similarity::top_k;

/// An item that can be embedded through its text.
pub trait Embeddable {
    /// Text used to compute the item's embedding.
    fn text(&self) -> &str;
}

impl Embeddable for String {
    fn text(&self) -> &str {
        self
    }
}

impl Embeddable for &str {
    fn text(&self) -> &str {
        self
    }
}

/// A plain piece of text.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TextSegment {
    text: String,
}

impl TextSegment {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

impl Embeddable for TextSegment {
    fn text(&self) -> &str {
        &self.text
    }
}

impl From<&str> for TextSegment {
    fn from(text: &str) -> Self {
        Self::new(text)
    }
}

/// A stored item ranked against a query.
#[derive(Debug)]
pub struct EmbeddingMatch<T> {
    /// The matched item.
    pub item: Arc<T>,

    /// Cosine similarity in `[-1, 1]`.
    pub score: f32,
}

impl<T> Clone for EmbeddingMatch<T> {
    fn clone(&self) -> Self {
        Self {
            item: Arc::clone(&self.item),
            score: self.score,
        }
    }
}

struct Entries<T> {
    items: Vec<Arc<T>>,
    embeddings: Vec<Embedding>,
}

impl<T> Entries<T> {
    fn dimension(&self) -> Option<usize> {
        self.embeddings.first().map(Vec::len)
    }
}

/// Items and their embeddings, kept index-aligned in insertion order.
///
/// Embeddings are computed through the store's [`Embedder`] when an item is
/// added; queries only compare against what is already stored.
pub struct EmbeddingStore<T> {
    embedder: Arc<dyn Embedder>,
    entries: RwLock<Entries<T>>,
}

impl<T> EmbeddingStore<T>
where
    T: Embeddable,
{
    /// Create an empty store.
    pub fn new(embedder: Arc<dyn Embedder>) -> Self {
        Self {
            embedder,
            entries: RwLock::new(Entries {
                items: Vec::new(),
                embeddings: Vec::new(),
            }),
        }
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Entries<T>>> {
        self.entries
            .read()
            .map_err(|_| EmbeddingError::LockPoisoned("embedding store"))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Entries<T>>> {
        self.entries
            .write()
            .map_err(|_| EmbeddingError::LockPoisoned("embedding store"))
    }

    /// Embed `item` and append it.
    ///
    /// On failure the store is left unchanged.
    pub fn add_item(&self, item: T) -> Result<()> {
        let embedding = self.embedder.embed(item.text())?;

        let mut entries = self.write()?;
        if let Some(expected) = entries.dimension() {
            if embedding.len() != expected {
                return Err(EmbeddingError::DimensionMismatch {
                    expected,
                    actual: embedding.len(),
                });
            }
        }

        entries.items.push(Arc::new(item));
        entries.embeddings.push(embedding);
        debug!("Added item to embedding store ({} items)", entries.items.len());

        Ok(())
    }

    /// Add items in order, stopping at the first failure.
    ///
    /// Returns the number of items added.
    pub fn add_items(&self, items: impl IntoIterator<Item = T>) -> Result<usize> {
        let mut added = 0;
        for item in items {
            self.add_item(item)?;
            added += 1;
        }
        Ok(added)
    }

    /// Find the `max_results` stored items most similar to `query`.
    ///
    /// Results are ordered by descending cosine similarity; equal scores
    /// keep insertion order.
    pub fn find_relevant(&self, query: &[f32], max_results: usize) -> Result<Vec<EmbeddingMatch<T>>> {
        let entries = self.read()?;
        let Some(dimension) = entries.dimension() else {
            return Ok(Vec::new());
        };
        if query.len() != dimension {
            return Err(EmbeddingError::DimensionMismatch {
                expected: dimension,
                actual: query.len(),
            });
        }

        let max_results = max_results.min(entries.embeddings.len());
        let ranked = top_k(
            query,
            entries.embeddings.iter().map(Vec::as_slice),
            max_results,
        )?;

        Ok(ranked
            .into_iter()
            .map(|(index, score)| EmbeddingMatch {
                item: Arc::clone(&entries.items[index]),
                score,
            })
            .collect())
    }

    /// Embed `text` and find the stored items most similar to it.
    pub fn find_relevant_to_text(
        &self,
        text: &str,
        max_results: usize,
    ) -> Result<Vec<EmbeddingMatch<T>>> {
        let query = self.embedder.embed(text)?;
        self.find_relevant(&query, max_results)
    }

    /// Snapshot of the stored items in insertion order.
    pub fn items(&self) -> Result<Vec<Arc<T>>> {
        Ok(self.read()?.items.clone())
    }

    /// Dimension of the stored embeddings, if any are stored.
    pub fn dimension(&self) -> Result<Option<usize>> {
        Ok(self.read()?.dimension())
    }

    pub fn len(&self) -> Result<usize> {
        Ok(self.read()?.items.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.read()?.items.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    /// Embedder returning fixed vectors by text.
    struct FixedEmbedder(HashMap<&'static str, Embedding>);

    impl Embedder for FixedEmbedder {
        fn embed(&self, text: &str) -> Result<Embedding> {
            self.0
                .get(text)
                .cloned()
                .ok_or_else(|| EmbeddingError::encoding(crate::EncodingStage::Inference, "unknown text"))
        }
    }

    fn store() -> EmbeddingStore<TextSegment> {
        let vectors = HashMap::from([
            ("east", vec![1.0, 0.0, 0.0]),
            ("north", vec![0.0, 1.0, 0.0]),
            ("north-east", vec![0.7, 0.7, 0.0]),
            ("west", vec![-1.0, 0.0, 0.0]),
            ("flat", vec![1.0, 0.0]),
        ]);
        EmbeddingStore::new(Arc::new(FixedEmbedder(vectors)))
    }

    fn texts(matches: &[EmbeddingMatch<TextSegment>]) -> Vec<&str> {
        matches.iter().map(|m| m.item.text()).collect()
    }

    #[test]
    fn test_find_relevant_ranks_by_similarity() {
        let store = store();
        store
            .add_items(["north", "east", "west", "north-east"].map(TextSegment::from))
            .unwrap();

        let results = store.find_relevant(&[1.0, 0.0, 0.0], 2).unwrap();
        assert_eq!(texts(&results), vec!["east", "north-east"]);
        assert!(results[0].score > results[1].score);
    }

    #[test]
    fn test_find_relevant_caps_at_store_size() {
        let store = store();
        store.add_items(["north", "east"].map(TextSegment::from)).unwrap();

        let results = store.find_relevant(&[1.0, 1.0, 0.0], 10).unwrap();
        assert_eq!(results.len(), 2);
    }

    #[test]
    fn test_empty_store_returns_nothing() {
        let store = store();
        assert!(store.find_relevant(&[1.0, 0.0, 0.0], 3).unwrap().is_empty());
        assert!(store.find_relevant(&[1.0], 3).unwrap().is_empty());
    }

    #[test]
    fn test_query_dimension_mismatch() {
        let store = store();
        store.add_item(TextSegment::new("east")).unwrap();
        assert!(matches!(
            store.find_relevant(&[1.0, 0.0], 1),
            Err(EmbeddingError::DimensionMismatch {
                expected: 3,
                actual: 2
            })
        ));
    }

    #[test]
    fn test_failed_add_leaves_store_unchanged() {
        let store = store();
        store.add_item(TextSegment::new("east")).unwrap();

        assert!(store.add_item(TextSegment::new("unknown")).is_err());
        assert!(store.add_item(TextSegment::new("flat")).is_err());
        assert_eq!(store.len().unwrap(), 1);
        assert_eq!(store.dimension().unwrap(), Some(3));
    }

    #[test]
    fn test_equal_scores_keep_insertion_order() {
        let store = store();
        store
            .add_items(["north", "east", "east", "east"].map(TextSegment::from))
            .unwrap();
        let items = store.items().unwrap();

        let results = store.find_relevant(&[1.0, 0.0, 0.0], 2).unwrap();
        assert!(Arc::ptr_eq(&results[0].item, &items[1]));
        assert!(Arc::ptr_eq(&results[1].item, &items[2]));
    }

    #[test]
    fn test_huge_result_count_returns_everything() {
        let store = store();
        store.add_items(["north", "east"].map(TextSegment::from)).unwrap();

        for max_results in [usize::MAX, 1 << 40] {
            let results = store.find_relevant(&[1.0, 0.0, 0.0], max_results).unwrap();
            assert_eq!(texts(&results), vec!["east", "north"]);
        }
    }

    #[test]
    fn test_concurrent_adds_stay_aligned() {
        let words = ["east", "north", "west", "north-east"];
        let store = Arc::new(store());

        let handles: Vec<_> = (0..32)
            .map(|i| {
                let store = Arc::clone(&store);
                let word = words[i % words.len()];
                std::thread::spawn(move || store.add_item(TextSegment::new(word)).unwrap())
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(store.len().unwrap(), 32);
        let entries = store.read().unwrap();
        assert_eq!(entries.embeddings.len(), entries.items.len());
        for (item, embedding) in entries.items.iter().zip(entries.embeddings.iter()) {
            assert_eq!(&store.embedder.embed(item.text()).unwrap(), embedding);
        }
    }

    #[test]
    fn test_zero_results_requested() {
        let store = store();
        store.add_item(TextSegment::new("east")).unwrap();
        assert!(store.find_relevant(&[1.0, 0.0, 0.0], 0).unwrap().is_empty());
    }

    #[test]
    fn test_plain_strings_are_embeddable() {
        let vectors = HashMap::from([("a", vec![1.0]), ("b", vec![2.0])]);
        let store: EmbeddingStore<String> = EmbeddingStore::new(Arc::new(FixedEmbedder(vectors)));
        store.add_item("a".to_string()).unwrap();
        store.add_item("b".to_string()).unwrap();
        assert_eq!(store.len().unwrap(), 2);
    }
}
