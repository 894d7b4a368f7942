//! Flatten layer: collapses every non-batch dimension.

use crate::error::{NnError, Result};
use crate::layers::state::PassCache;
use crate::layers::{Layer, LayerState};
use crate::tensor::Tensor;

/// Reshapes `[batch, d1, d2, ...]` into `[batch, d1 * d2 * ...]`.
///
/// Used between a convolutional stack and a [`Linear`](crate::layers::Linear) head.
#[derive(Debug, Clone)]
pub struct Flatten {
    name: String,
    cache: PassCache,
}

impl Flatten {
    pub fn new() -> Self {
        Self::named("flatten")
    }

    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            cache: PassCache::new(),
        }
    }
}

impl Default for Flatten {
    fn default() -> Self {
        Self::new()
    }
}

impl Layer for Flatten {
    fn name(&self) -> &str {
        &self.name
    }

    fn forward(&mut self, input: &Tensor) -> Result<Tensor> {
        let shape = self.output_shape(input.shape())?;
        let output = input.reshape(shape)?;
        self.cache.store(input);
        Ok(output)
    }

    fn backward(&mut self, grad_output: &Tensor) -> Result<Tensor> {
        let input = self.cache.input(&self.name)?;
        let expected = self.output_shape(input.shape())?;
        if grad_output.shape() != expected.as_slice() {
            return Err(NnError::shape_mismatch(
                format!("{} output gradient", self.name),
                expected,
                grad_output.shape(),
            ));
        }
        let grad_input = grad_output.reshape(input.shape())?;
        self.cache.mark_backwarded();
        Ok(grad_input)
    }

    fn update_parameters(&mut self, _learning_rate: f64) -> Result<()> {
        self.cache.check_update(&self.name)
    }

    fn output_shape(&self, input_shape: &[usize]) -> Result<Vec<usize>> {
        match input_shape.split_first() {
            Some((&batch, rest)) if !rest.is_empty() => {
                Ok(vec![batch, rest.iter().product()])
            }
            _ => Err(NnError::shape_mismatch(
                format!("{} input", self.name),
                "[batch, d1, ...]",
                input_shape,
            )),
        }
    }

    fn state(&self) -> LayerState {
        self.cache.state()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flatten_round_trip_shapes() {
        let mut layer = Flatten::new();
        let x = Tensor::new(vec![2, 3, 2, 2], (0..24).map(|v| v as f64).collect()).unwrap();
        let y = layer.forward(&x).unwrap();
        assert_eq!(y.shape(), &[2, 12]);
        assert_eq!(y.data(), x.data());

        let dx = layer.backward(&y).unwrap();
        assert_eq!(dx.shape(), &[2, 3, 2, 2]);
    }

    #[test]
    fn test_flatten_rejects_rank_one() {
        let mut layer = Flatten::new();
        assert!(layer.forward(&Tensor::zeros(vec![4])).is_err());
    }

    #[test]
    fn test_flatten_backward_before_forward() {
        let mut layer = Flatten::new();
        let result = layer.backward(&Tensor::zeros(vec![1, 4]));
        assert!(matches!(result, Err(NnError::OrderingViolation { .. })));
    }
}
