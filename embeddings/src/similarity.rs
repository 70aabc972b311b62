//! Similarity computation for embeddings.

use std::cmp::Reverse;
use std::collections::BinaryHeap;

use ordered_float::OrderedFloat;

use crate::error::{EmbeddingError, Result};

fn ensure_same_dimension(a: &[f32], b: &[f32]) -> Result<()> {
    if a.len() != b.len() {
        return Err(EmbeddingError::DimensionMismatch {
            expected: a.len(),
            actual: b.len(),
        });
    }
    Ok(())
}

/// Compute the dot product between two embeddings.
pub fn dot_product(a: &[f32], b: &[f32]) -> Result<f32> {
    ensure_same_dimension(a, b)?;
    Ok(a.iter().zip(b.iter()).map(|(x, y)| x * y).sum())
}

/// Compute the L2 norm (magnitude) of an embedding.
pub fn l2_norm(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}

/// Compute the cosine similarity between two embeddings.
///
/// Returns a value between -1.0 and 1.0, where:
/// - 1.0 means identical direction
/// - 0.0 means orthogonal vectors
/// - -1.0 means opposite vectors
///
/// A zero-magnitude operand has no direction and yields
/// [`EmbeddingError::ZeroNorm`] instead of NaN.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Result<f32> {
    let dot = dot_product(a, b)?;
    let magnitude_a = l2_norm(a);
    let magnitude_b = l2_norm(b);

    if magnitude_a == 0.0 || magnitude_b == 0.0 {
        return Err(EmbeddingError::ZeroNorm("cosine similarity"));
    }

    Ok((dot / (magnitude_a * magnitude_b)).clamp(-1.0, 1.0))
}

/// Rescale a cosine similarity from `[-1, 1]` to a relevance score in `[0, 1]`.
pub fn relevance_score(cosine: f32) -> f32 {
    (cosine + 1.0) / 2.0
}

/// Normalize an embedding to unit length.
pub fn normalize(embedding: &mut [f32]) -> Result<()> {
    let magnitude = l2_norm(embedding);
    if !magnitude.is_finite() {
        return Err(EmbeddingError::InvalidOutput(format!(
            "cannot normalize a vector of non-finite magnitude {magnitude}"
        )));
    }
    if magnitude == 0.0 {
        return Err(EmbeddingError::ZeroNorm("normalization"));
    }
    for x in embedding.iter_mut() {
        *x /= magnitude;
    }
    Ok(())
}

/// Find the `k` candidates most similar to `query`.
///
/// Keeps a min-heap of at most `k` entries while scanning the candidates
/// once, so the cost is `O(n log k)`. Returns `(candidate index, score)`
/// pairs ordered by descending score; equal scores keep candidate order.
pub fn top_k<'a, I>(query: &[f32], candidates: I, k: usize) -> Result<Vec<(usize, f32)>>
where
    I: IntoIterator<Item = &'a [f32]>,
{
    if k == 0 {
        return Ok(Vec::new());
    }

    let candidates = candidates.into_iter();
    let capacity = k.min(candidates.size_hint().0).saturating_add(1);

    // Ordering key: higher score wins, then lower index wins.
    let mut heap: BinaryHeap<Reverse<(OrderedFloat<f32>, Reverse<usize>)>> =
        BinaryHeap::with_capacity(capacity);

    for (index, candidate) in candidates.enumerate() {
        let score = cosine_similarity(query, candidate)?;
        let key = (OrderedFloat(score), Reverse(index));

        if heap.len() < k {
            heap.push(Reverse(key));
        } else if heap.peek().is_some_and(|Reverse(worst)| key > *worst) {
            heap.pop();
            heap.push(Reverse(key));
        }
    }

    let mut ranked: Vec<(OrderedFloat<f32>, Reverse<usize>)> =
        heap.into_iter().map(|Reverse(key)| key).collect();
    ranked.sort_unstable_by(|a, b| b.cmp(a));

    Ok(ranked
        .into_iter()
        .map(|(score, Reverse(index))| (index, score.0))
        .collect())
}
