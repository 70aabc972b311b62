//! Inference engine boundary.
//!
//! The neural network that maps token ids to per-token vectors is opaque to
//! this crate. It receives aligned `[1, n]` integer arrays and returns a
//! `[batch, sequence, width]` float tensor.

use crate::error::{BoxError, EmbeddingError, Result};

pub const INPUT_IDS: &str = "input_ids";
pub const ATTENTION_MASK: &str = "attention_mask";
pub const TOKEN_TYPE_IDS: &str = "token_type_ids";

/// Inputs for one inference call. All arrays have the same length.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelInputs {
    pub input_ids: Vec<i64>,
    pub attention_mask: Vec<i64>,

    /// Present only when the engine declares a `token_type_ids` input.
    pub token_type_ids: Option<Vec<i64>>,
}

impl ModelInputs {
    /// Sequence length of the call.
    pub fn len(&self) -> usize {
        self.input_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.input_ids.is_empty()
    }

    /// Tensor shape shared by every input array.
    pub fn shape(&self) -> [usize; 2] {
        [1, self.len()]
    }

    /// Named inputs in the order they are fed to the engine.
    pub fn named(&self) -> Vec<(&'static str, &[i64])> {
        let mut named = vec![
            (INPUT_IDS, self.input_ids.as_slice()),
            (ATTENTION_MASK, self.attention_mask.as_slice()),
        ];
        if let Some(type_ids) = &self.token_type_ids {
            named.push((TOKEN_TYPE_IDS, type_ids.as_slice()));
        }
        named
    }
}

/// Per-token output of the model.
#[derive(Debug, Clone, PartialEq)]
pub struct HiddenStates {
    shape: [usize; 3],
    data: Vec<f32>,
}

impl HiddenStates {
    /// Build from a dynamic shape, validating rank and element count.
    pub fn new(shape: &[usize], data: Vec<f32>) -> Result<Self> {
        let [batch, sequence, width] = <[usize; 3]>::try_from(shape).map_err(|_| {
            EmbeddingError::InvalidOutput(format!("expected a rank-3 tensor, got shape {shape:?}"))
        })?;
        let elements = batch
            .checked_mul(sequence)
            .and_then(|n| n.checked_mul(width));
        if elements != Some(data.len()) {
            return Err(EmbeddingError::InvalidOutput(format!(
                "shape {shape:?} does not match {} elements",
                data.len()
            )));
        }
        Ok(Self {
            shape: [batch, sequence, width],
            data,
        })
    }

    /// `[batch, sequence, width]`.
    pub fn shape(&self) -> [usize; 3] {
        self.shape
    }

    /// Row-major data.
    pub fn data(&self) -> &[f32] {
        &self.data
    }

    /// Model embedding width.
    pub fn width(&self) -> usize {
        self.shape[2]
    }

    /// Per-token vectors of the first batch entry.
    pub fn first_batch_rows(&self) -> Result<Vec<&[f32]>> {
        let [batch, sequence, width] = self.shape;
        if batch == 0 || sequence == 0 || width == 0 {
            return Err(EmbeddingError::InvalidOutput(format!(
                "empty output tensor {:?}",
                self.shape
            )));
        }
        let rows = sequence
            .checked_mul(width)
            .and_then(|n| self.data.get(..n))
            .ok_or_else(|| {
                EmbeddingError::InvalidOutput(format!(
                    "shape {:?} does not match {} elements",
                    self.shape,
                    self.data.len()
                ))
            })?;
        Ok(rows.chunks_exact(width).collect())
    }
}

/// A model that maps token ids to per-token vectors.
pub trait InferenceEngine: Send + Sync {
    /// Names of the inputs the model declares.
    fn input_names(&self) -> Vec<String>;

    /// Run the model on one sequence.
    fn run(&self, inputs: &ModelInputs) -> std::result::Result<HiddenStates, BoxError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_hidden_states_rows() {
        let states = HiddenStates::new(&[1, 2, 3], vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]).unwrap();
        let rows = states.first_batch_rows().unwrap();
        assert_eq!(rows, vec![&[1.0, 2.0, 3.0][..], &[4.0, 5.0, 6.0][..]]);
        assert_eq!(states.width(), 3);
    }

    #[test]
    fn test_hidden_states_rejects_bad_shapes() {
        assert!(HiddenStates::new(&[2, 3], vec![0.0; 6]).is_err());
        assert!(HiddenStates::new(&[1, 2, 3], vec![0.0; 5]).is_err());
        assert!(HiddenStates::new(&[usize::MAX, 2, 3], vec![0.0; 6]).is_err());
        assert!(HiddenStates::new(&[1, 4, 8], Vec::new()).is_err());
    }

    #[test]
    fn test_hidden_states_accessors() {
        let states = HiddenStates::new(&[2, 1, 2], vec![1.0, 2.0, 3.0, 4.0]).unwrap();
        assert_eq!(states.shape(), [2, 1, 2]);
        assert_eq!(states.data(), &[1.0, 2.0, 3.0, 4.0]);
        assert_eq!(states.first_batch_rows().unwrap(), vec![&[1.0, 2.0][..]]);
    }

    #[test]
    fn test_named_inputs_omit_undeclared_type_ids() {
        let inputs = ModelInputs {
            input_ids: vec![101, 7, 102],
            attention_mask: vec![1, 1, 1],
            token_type_ids: None,
        };
        let names: Vec<&str> = inputs.named().iter().map(|(name, _)| *name).collect();
        assert_eq!(names, vec![INPUT_IDS, ATTENTION_MASK]);
        assert_eq!(inputs.shape(), [1, 3]);
    }
}
