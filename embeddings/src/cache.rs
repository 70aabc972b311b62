//! Embedding cache for efficient retrieval.
//!
//! Keys are whitespace-normalized texts. Entries are kept in recency order
//! and the least recently used one is evicted once the capacity is reached.
//! Every read hands out a copy, so callers can never mutate cached vectors.

use std::num::NonZeroUsize;
use std::sync::{Mutex, MutexGuard, PoisonError};

use lru::LruCache;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::EmbedderConfig;
use crate::encoder::{EncodedText, Embedder, TextEncoder};
use crate::error::{EmbeddingError, Result};
use crate::{DEFAULT_CACHE_CAPACITY, Embedding};

/// Trim the text and collapse interior whitespace runs to one space.
///
/// Case, diacritics and punctuation are left alone.
pub fn normalize_text(text: &str) -> String {
    let mut normalized = String::with_capacity(text.len());
    for word in text.split_whitespace() {
        if !normalized.is_empty() {
            normalized.push(' ');
        }
        normalized.push_str(word);
    }
    normalized
}

/// Statistics about the embedding cache.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    /// Number of entries in cache.
    pub entries: usize,

    /// Maximum cache size.
    pub capacity: usize,

    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
}

/// Bounded, recency-ordered map from normalized text to its encoding.
pub struct EmbeddingCache {
    entries: LruCache<String, EncodedText>,
    hits: u64,
    misses: u64,
    evictions: u64,
}

impl EmbeddingCache {
    /// Create a cache holding at most `capacity` entries.
    pub fn new(capacity: usize) -> Result<Self> {
        let capacity = NonZeroUsize::new(capacity).ok_or_else(|| {
            EmbeddingError::InvalidConfig("cache_capacity must be greater than zero".to_string())
        })?;
        Ok(Self::with_capacity(capacity))
    }

    pub fn with_capacity(capacity: NonZeroUsize) -> Self {
        Self {
            entries: LruCache::new(capacity),
            hits: 0,
            misses: 0,
            evictions: 0,
        }
    }

    /// Look up an encoding, marking it most recently used.
    pub fn get(&mut self, key: &str) -> Option<EncodedText> {
        match self.entries.get(key) {
            Some(encoded) => {
                self.hits += 1;
                Some(encoded.clone())
            }
            None => {
                self.misses += 1;
                None
            }
        }
    }

    /// Insert an encoding, evicting the least recently used entry when full.
    pub fn put(&mut self, key: String, encoded: EncodedText) {
        if let Some((evicted, _)) = self.entries.push(key.clone(), encoded) {
            if evicted != key {
                self.evictions += 1;
                debug!("Evicted least recently used embedding ({} chars)", evicted.len());
            }
        }
    }

    /// Check for a key without touching its recency.
    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.entries.cap().get()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.entries.len(),
            capacity: self.capacity(),
            hits: self.hits,
            misses: self.misses,
            evictions: self.evictions,
        }
    }
}

/// An encoder wrapped with a memoizing cache.
///
/// Lookup, encoding on a miss, and insertion run under one lock, so
/// concurrent callers of the same instance are serialized.
pub struct CachedEmbedder<E> {
    encoder: E,
    cache: Mutex<EmbeddingCache>,
}

impl<E> CachedEmbedder<E>
where
    E: TextEncoder,
{
    /// Wrap `encoder` with a cache of the default capacity.
    pub fn new(encoder: E) -> Self {
        let capacity = NonZeroUsize::MIN.saturating_add(DEFAULT_CACHE_CAPACITY - 1);
        Self {
            encoder,
            cache: Mutex::new(EmbeddingCache::with_capacity(capacity)),
        }
    }

    /// Wrap `encoder` with a cache holding at most `capacity` entries.
    pub fn with_capacity(encoder: E, capacity: usize) -> Result<Self> {
        Ok(Self {
            encoder,
            cache: Mutex::new(EmbeddingCache::new(capacity)?),
        })
    }

    /// Wrap `encoder` using the cache settings from `config`.
    pub fn from_config(encoder: E, config: &EmbedderConfig) -> Result<Self> {
        config.validate()?;
        Self::with_capacity(encoder, config.cache_capacity)
    }

    /// Get the underlying encoder.
    pub fn encoder(&self) -> &E {
        &self.encoder
    }

    /// Entries are only written after a successful encode, so a panic in
    /// the encoder never leaves the map half-updated.
    fn lock(&self) -> MutexGuard<'_, EmbeddingCache> {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Encode the full text, bypassing the cache.
    pub fn encode_uncached(&self, text: &str) -> Result<EncodedText> {
        self.encoder.encode(text)
    }

    /// Encode `text` through the cache.
    ///
    /// The token count is the one recorded when the normalized text was
    /// first encoded.
    pub fn encode(&self, text: &str) -> Result<EncodedText> {
        let key = normalize_text(text);
        let mut cache = self.lock();

        if let Some(encoded) = cache.get(&key) {
            debug!("Cache hit for embedding");
            return Ok(encoded);
        }

        let encoded = self.encoder.encode(&key)?;
        cache.put(key, encoded.clone());
        debug!(
            "Cached embedding for text of {} tokens ({} entries)",
            encoded.token_count,
            cache.len()
        );

        Ok(encoded)
    }

    /// Count tokens; never touches the cache.
    pub fn count_tokens(&self, text: &str) -> Result<usize> {
        self.encoder.count_tokens(text)
    }

    /// Whether the normalized form of `text` is cached.
    pub fn contains(&self, text: &str) -> bool {
        self.lock().contains(&normalize_text(text))
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Get cache statistics.
    pub fn stats(&self) -> CacheStats {
        self.lock().stats()
    }
}

impl<E> Embedder for CachedEmbedder<E>
where
    E: TextEncoder,
{
    fn embed(&self, text: &str) -> Result<Embedding> {
        Ok(self.encode(text)?.embedding)
    }
}
