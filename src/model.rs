//! Sequential model container
//!
//! A `Model` owns an ordered list of layers. `forward` runs them in order,
//! `backward` runs them in reverse, and `update_parameters` broadcasts one
//! gradient-descent step to every layer.

use std::collections::HashSet;

use log::debug;

use crate::error::{NnError, Result};
use crate::layers::{Layer, Parameter};
use crate::tensor::Tensor;

/// Strictly sequential stack of layers.
///
/// The training step is `forward` → loss → `backward` → `update_parameters`.
/// Each layer rejects calls made out of that order with `OrderingViolation`.
///
/// # Example
///
/// ```ignore
/// let mut model = Model::new(vec![
///     Box::new(Linear::new("fc1", 2, 8, &mut rng)?),
///     Box::new(Activation::relu()),
///     Box::new(Linear::new("fc2", 8, 1, &mut rng)?),
/// ])?;
///
/// let output = model.forward(&x)?;
/// let (loss, grad) = mean_squared_loss(&output, &y)?;
/// model.backward(&grad)?;
/// model.update_parameters(0.01)?;
/// ```
pub struct Model {
    layers: Vec<Box<dyn Layer>>,
}

impl Model {
    /// Build a model from layers in execution order.
    ///
    /// # Errors
    ///
    /// `Configuration` if `layers` is empty or two layers that own parameters
    /// share a name (their qualified parameter names would collide).
    pub fn new(layers: Vec<Box<dyn Layer>>) -> Result<Self> {
        if layers.is_empty() {
            return Err(NnError::config("model must have at least one layer"));
        }

        let mut seen = HashSet::new();
        for layer in layers.iter().filter(|l| !l.parameters().is_empty()) {
            if !seen.insert(layer.name().to_string()) {
                return Err(NnError::config(format!(
                    "duplicate layer name '{}'",
                    layer.name()
                )));
            }
        }

        Ok(Self { layers })
    }

    pub fn layers(&self) -> &[Box<dyn Layer>] {
        &self.layers
    }

    pub fn layer(&self, index: usize) -> Option<&dyn Layer> {
        self.layers.get(index).map(|l| l.as_ref())
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    /// Run `input` through every layer in order.
    pub fn forward(&mut self, input: &Tensor) -> Result<Tensor> {
        debug!("model forward: input shape {:?}", input.shape());
        let mut layers = self.layers.iter_mut();
        let mut x = match layers.next() {
            Some(first) => first.forward(input)?,
            None => return Err(NnError::config("model must have at least one layer")),
        };
        for layer in layers {
            x = layer.forward(&x)?;
        }
        debug!("model forward: output shape {:?}", x.shape());
        Ok(x)
    }

    /// Propagate `grad_output` through every layer in reverse order.
    ///
    /// The gradient with respect to the model input is discarded; the call
    /// exists to fill every layer's gradient buffers.
    pub fn backward(&mut self, grad_output: &Tensor) -> Result<()> {
        debug!("model backward: gradient shape {:?}", grad_output.shape());
        let mut layers = self.layers.iter_mut().rev();
        let mut grad = match layers.next() {
            Some(last) => last.backward(grad_output)?,
            None => return Ok(()),
        };
        for layer in layers {
            grad = layer.backward(&grad)?;
        }
        Ok(())
    }

    /// Apply `param -= learning_rate * grad` in every layer.
    pub fn update_parameters(&mut self, learning_rate: f64) -> Result<()> {
        debug!("model update: learning rate {}", learning_rate);
        for layer in self.layers.iter_mut() {
            layer.update_parameters(learning_rate)?;
        }
        Ok(())
    }

    /// Infer the output shape for `input_shape` without running the model.
    ///
    /// Fails with `ShapeMismatch` at the first layer whose input does not fit,
    /// which is how chaining errors are reported before training starts.
    pub fn output_shape(&self, input_shape: &[usize]) -> Result<Vec<usize>> {
        let mut shape = input_shape.to_vec();
        for layer in &self.layers {
            shape = layer.output_shape(&shape)?;
        }
        Ok(shape)
    }

    /// All parameters of all layers, in layer order.
    pub fn parameters(&self) -> Vec<Parameter<'_>> {
        self.layers.iter().flat_map(|l| l.parameters()).collect()
    }

    pub fn parameter_count(&self) -> usize {
        self.layers.iter().map(|l| l.parameter_count()).sum()
    }
}

impl std::fmt::Debug for Model {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Model")
            .field(
                "layers",
                &self.layers.iter().map(|l| l.name()).collect::<Vec<_>>(),
            )
            .finish()
    }
}
