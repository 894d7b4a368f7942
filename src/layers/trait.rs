//! Layer trait definition for neural network layers
//!
//! This module defines the core Layer trait that all layer types must implement.
//! The trait provides a common interface for forward propagation, backward propagation,
//! and parameter updates.

use crate::error::Result;
use crate::layers::LayerState;
use crate::tensor::Tensor;

/// Core trait for neural network layers.
///
/// All layer types (Linear, Conv2D, activations, ...) implement this trait so a
/// [`Model`](crate::model::Model) can chain them without knowing their kind.
///
/// Every layer tracks its own [`LayerState`]: `backward` is only accepted
/// directly after a `forward`, and `update_parameters` only after a `backward`.
///
/// # Example
///
/// ```ignore
/// let output = layer.forward(&input)?;
/// let grad_input = layer.backward(&grad_output)?;
/// layer.update_parameters(0.01)?;
/// ```
pub trait Layer {
    /// Name used to qualify this layer's parameter names.
    fn name(&self) -> &str;

    /// Forward propagation through the layer.
    ///
    /// Validates the input shape, caches the input for the backward pass and
    /// returns the output. Parameters are not modified.
    ///
    /// # Errors
    ///
    /// `ShapeMismatch` if the input does not fit the layer's configuration.
    fn forward(&mut self, input: &Tensor) -> Result<Tensor>;

    /// Backward propagation through the layer.
    ///
    /// Given the gradient of the loss with respect to the layer output, this method:
    /// 1. Overwrites the parameter gradient buffers
    /// 2. Returns the gradient with respect to the cached input
    ///
    /// # Errors
    ///
    /// - `OrderingViolation` unless the most recent pass was a forward pass
    /// - `ShapeMismatch` if `grad_output` is not shaped like the last output
    fn backward(&mut self, grad_output: &Tensor) -> Result<Tensor>;

    /// Gradient descent step: `param -= learning_rate * grad` for every parameter.
    ///
    /// Gradients are kept, so calling this twice applies the same step twice.
    ///
    /// # Errors
    ///
    /// `OrderingViolation` unless the most recent pass was a backward pass.
    fn update_parameters(&mut self, learning_rate: f64) -> Result<()>;

    /// Output shape produced for a given input shape (batch dimension included).
    fn output_shape(&self, input_shape: &[usize]) -> Result<Vec<usize>>;

    /// Current position in the forward -> backward -> update cycle.
    fn state(&self) -> LayerState;

    /// Parameters and their gradients under layer-qualified names.
    ///
    /// Layers without parameters return an empty list.
    fn parameters(&self) -> Vec<Parameter<'_>> {
        Vec::new()
    }

    /// Total number of trainable values.
    fn parameter_count(&self) -> usize {
        self.parameters().iter().map(|p| p.value.len()).sum()
    }
}

/// Read-only view of one parameter buffer and its gradient.
#[derive(Debug, Clone)]
pub struct Parameter<'a> {
    /// Qualified name, e.g. `fc1_weight`.
    pub name: String,
    pub value: &'a Tensor,
    pub gradient: &'a Tensor,
}

impl<'a> Parameter<'a> {
    pub fn new(layer: &str, kind: &str, value: &'a Tensor, gradient: &'a Tensor) -> Self {
        Self {
            name: format!("{}_{}", layer, kind),
            value,
            gradient,
        }
    }
}
