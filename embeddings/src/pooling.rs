//! Pooling of per-token vectors and aggregation across partitions.

use serde::{Deserialize, Serialize};

use crate::Embedding;
use crate::error::{EmbeddingError, Result};
use crate::similarity::normalize;

/// How a matrix of per-token vectors is reduced to one vector.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PoolingMode {
    /// The vector at position 0 (the leading boundary marker, e.g. `[CLS]`).
    #[serde(alias = "cls")]
    FirstToken,
    /// Element-wise mean over all positions.
    #[default]
    Mean,
}

impl PoolingMode {
    /// Reduce `rows` (one vector per token) to a single vector.
    pub fn pool(self, rows: &[&[f32]]) -> Result<Embedding> {
        let first = rows
            .first()
            .ok_or_else(|| EmbeddingError::InvalidOutput("no token vectors to pool".to_string()))?;

        match self {
            PoolingMode::FirstToken => Ok(first.to_vec()),
            PoolingMode::Mean => mean_pool(rows, first.len()),
        }
    }
}

fn mean_pool(rows: &[&[f32]], dimension: usize) -> Result<Embedding> {
    let mut pooled = vec![0.0f32; dimension];
    for row in rows {
        if row.len() != dimension {
            return Err(EmbeddingError::DimensionMismatch {
                expected: dimension,
                actual: row.len(),
            });
        }
        for (acc, value) in pooled.iter_mut().zip(row.iter()) {
            *acc += value;
        }
    }

    let count = rows.len() as f32;
    for value in &mut pooled {
        *value /= count;
    }
    Ok(pooled)
}

/// Weighted element-wise average of partition vectors.
///
/// Each vector is weighted by the number of tokens in its partition.
pub fn weighted_average(embeddings: &[Embedding], weights: &[usize]) -> Result<Embedding> {
    if embeddings.len() != weights.len() {
        return Err(EmbeddingError::DimensionMismatch {
            expected: embeddings.len(),
            actual: weights.len(),
        });
    }
    let first = embeddings.first().ok_or(EmbeddingError::EmptyInput)?;
    let total_weight: usize = weights.iter().sum();
    if total_weight == 0 {
        return Err(EmbeddingError::EmptyInput);
    }

    let dimension = first.len();
    let mut averaged = vec![0.0f32; dimension];
    for (embedding, &weight) in embeddings.iter().zip(weights.iter()) {
        if embedding.len() != dimension {
            return Err(EmbeddingError::DimensionMismatch {
                expected: dimension,
                actual: embedding.len(),
            });
        }
        let weight = weight as f32;
        for (acc, value) in averaged.iter_mut().zip(embedding.iter()) {
            *acc += value * weight;
        }
    }

    let total_weight = total_weight as f32;
    for value in &mut averaged {
        *value /= total_weight;
    }
    Ok(averaged)
}

/// Weighted average followed by L2 normalization.
pub fn aggregate(embeddings: &[Embedding], weights: &[usize]) -> Result<Embedding> {
    let mut combined = weighted_average(embeddings, weights)?;
    normalize(&mut combined)?;
    Ok(combined)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::similarity::l2_norm;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_first_token_pooling() {
        let rows: [&[f32]; 2] = [&[1.0, 2.0], &[3.0, 4.0]];
        assert_eq!(PoolingMode::FirstToken.pool(&rows).unwrap(), vec![1.0, 2.0]);
    }

    #[test]
    fn test_mean_pooling() {
        let rows: [&[f32]; 3] = [&[1.0, 0.0], &[3.0, 4.0], &[2.0, 2.0]];
        assert_eq!(PoolingMode::Mean.pool(&rows).unwrap(), vec![2.0, 2.0]);
    }

    #[test]
    fn test_pooling_empty_matrix_fails() {
        assert!(PoolingMode::Mean.pool(&[]).is_err());
    }

    #[test]
    fn test_weighted_average_favours_longer_partitions() {
        let embeddings = vec![vec![1.0, 0.0], vec![0.0, 1.0]];
        let averaged = weighted_average(&embeddings, &[3, 1]).unwrap();
        assert_eq!(averaged, vec![0.75, 0.25]);
    }

    #[test]
    fn test_aggregate_is_unit_length() {
        let embeddings = vec![vec![3.0, 1.0, 0.5], vec![-2.0, 4.0, 1.0]];
        let combined = aggregate(&embeddings, &[510, 12]).unwrap();
        assert!((l2_norm(&combined) - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_aggregate_zero_vector_fails() {
        let embeddings = vec![vec![0.0, 0.0]];
        assert!(matches!(
            aggregate(&embeddings, &[4]),
            Err(EmbeddingError::ZeroNorm(_))
        ));
    }

    #[test]
    fn test_pooling_mode_serde_names() {
        let mode: PoolingMode = serde_json::from_str("\"first_token\"").unwrap();
        assert_eq!(mode, PoolingMode::FirstToken);
        let mode: PoolingMode = serde_json::from_str("\"cls\"").unwrap();
        assert_eq!(mode, PoolingMode::FirstToken);
        assert_eq!(serde_json::to_string(&PoolingMode::Mean).unwrap(), "\"mean\"");
    }
}
