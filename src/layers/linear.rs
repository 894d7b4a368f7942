//! Linear (fully connected) layer implementation
//!
//! This module provides a Linear layer (also known as Dense or Fully Connected layer)
//! that performs the transformation: output = input × weight + bias

use crate::error::{NnError, Result};
use crate::layers::state::PassCache;
use crate::layers::{Layer, LayerState, Parameter};
use crate::tensor::Tensor;
use crate::utils::SimpleRng;

/// Linear layer with weight and bias.
///
/// Performs the affine transformation: y = xW + b
/// where x is the input (batch_size × input_units),
/// W is the weight matrix (input_units × output_units),
/// and b is the bias vector (output_units).
///
/// Gradients are not averaged over the batch; that is the loss function's job.
///
/// # Example
///
/// ```ignore
/// use sequential_nn::layers::{Layer, Linear};
/// use sequential_nn::utils::SimpleRng;
///
/// let mut rng = SimpleRng::new(42);
/// let layer = Linear::new("fc1", 784, 128, &mut rng)?;
/// assert_eq!(layer.input_units(), 784);
/// assert_eq!(layer.output_units(), 128);
/// ```
#[derive(Debug, Clone)]
pub struct Linear {
    name: String,
    input_units: usize,
    output_units: usize,
    weight: Tensor,
    bias: Tensor,
    grad_weight: Tensor,
    grad_bias: Tensor,
    cache: PassCache,
}

impl Linear {
    /// Create a new Linear layer with Xavier initialization.
    ///
    /// Weights are sampled from the uniform distribution [-limit, limit]
    /// where limit = sqrt(6 / (input_units + output_units)).
    /// Biases are initialized to zero.
    ///
    /// # Errors
    ///
    /// `Configuration` if either unit count is zero.
    pub fn new(
        name: impl Into<String>,
        input_units: usize,
        output_units: usize,
        rng: &mut SimpleRng,
    ) -> Result<Self> {
        let name = name.into();
        if input_units == 0 || output_units == 0 {
            return Err(NnError::config(format!(
                "linear layer '{}' needs positive unit counts, got {} -> {}",
                name, input_units, output_units
            )));
        }

        let limit = (6.0 / (input_units + output_units) as f64).sqrt();
        let weights = (0..input_units * output_units)
            .map(|_| rng.gen_range_f64(-limit, limit))
            .collect();
        let weight = Tensor::new(vec![input_units, output_units], weights)?;
        let bias = Tensor::zeros(vec![output_units]);

        Self::from_parameters(name, weight, bias)
    }

    /// Create a layer from explicit weight `[in, out]` and bias `[out]` tensors.
    pub fn from_parameters(name: impl Into<String>, weight: Tensor, bias: Tensor) -> Result<Self> {
        let name = name.into();
        let (input_units, output_units) = match weight.shape() {
            &[i, o] if i > 0 && o > 0 => (i, o),
            other => {
                return Err(NnError::config(format!(
                    "linear layer '{}' weight must be a non-empty [in, out] matrix, got {:?}",
                    name, other
                )))
            }
        };
        if bias.shape() != [output_units] {
            return Err(NnError::shape_mismatch(
                format!("{} bias", name),
                [output_units],
                bias.shape(),
            ));
        }

        Ok(Self {
            grad_weight: Tensor::zeros(weight.shape()),
            grad_bias: Tensor::zeros(bias.shape()),
            name,
            input_units,
            output_units,
            weight,
            bias,
            cache: PassCache::new(),
        })
    }

    pub fn input_units(&self) -> usize {
        self.input_units
    }

    pub fn output_units(&self) -> usize {
        self.output_units
    }

    pub fn weight(&self) -> &Tensor {
        &self.weight
    }

    /// Weight values for in-place edits; the shape stays fixed.
    pub fn weight_mut(&mut self) -> &mut [f64] {
        self.weight.data_mut()
    }

    pub fn bias(&self) -> &Tensor {
        &self.bias
    }

    pub fn bias_mut(&mut self) -> &mut [f64] {
        self.bias.data_mut()
    }

    pub fn grad_weight(&self) -> &Tensor {
        &self.grad_weight
    }

    pub fn grad_bias(&self) -> &Tensor {
        &self.grad_bias
    }

    fn batch_size(&self, input_shape: &[usize]) -> Result<usize> {
        match input_shape {
            &[batch, features] if features == self.input_units => Ok(batch),
            other => Err(NnError::shape_mismatch(
                format!("{} input", self.name),
                format!("[batch, {}]", self.input_units),
                other,
            )),
        }
    }
}

impl Layer for Linear {
    fn name(&self) -> &str {
        &self.name
    }

    fn forward(&mut self, input: &Tensor) -> Result<Tensor> {
        let batch_size = self.batch_size(input.shape())?;
        let x = input.data();
        let w = self.weight.data();
        let b = self.bias.data();
        let mut output = vec![0.0; batch_size * self.output_units];

        for (row, out_row) in output.chunks_exact_mut(self.output_units).enumerate() {
            let in_row = &x[row * self.input_units..(row + 1) * self.input_units];
            out_row.copy_from_slice(b);
            for (i, &xi) in in_row.iter().enumerate() {
                let w_row = &w[i * self.output_units..(i + 1) * self.output_units];
                for (out, &wij) in out_row.iter_mut().zip(w_row) {
                    *out += xi * wij;
                }
            }
        }

        self.cache.store(input);
        Tensor::new(vec![batch_size, self.output_units], output)
    }

    fn backward(&mut self, grad_output: &Tensor) -> Result<Tensor> {
        let input = self.cache.input(&self.name)?;
        let batch_size = input.shape()[0];
        if grad_output.shape() != [batch_size, self.output_units] {
            return Err(NnError::shape_mismatch(
                format!("{} output gradient", self.name),
                [batch_size, self.output_units],
                grad_output.shape(),
            ));
        }

        let x = input.data();
        let g = grad_output.data();
        let w = self.weight.data();
        let mut grad_w = vec![0.0; self.input_units * self.output_units];
        let mut grad_b = vec![0.0; self.output_units];
        let mut grad_input = vec![0.0; batch_size * self.input_units];

        for b in 0..batch_size {
            let in_offset = b * self.input_units;
            let out_offset = b * self.output_units;

            for j in 0..self.output_units {
                let gj = g[out_offset + j];
                grad_b[j] += gj;

                for i in 0..self.input_units {
                    grad_w[i * self.output_units + j] += x[in_offset + i] * gj;
                    grad_input[in_offset + i] += gj * w[i * self.output_units + j];
                }
            }
        }

        self.grad_weight = Tensor::new(vec![self.input_units, self.output_units], grad_w)?;
        self.grad_bias = Tensor::new(vec![self.output_units], grad_b)?;
        self.cache.mark_backwarded();
        Tensor::new(vec![batch_size, self.input_units], grad_input)
    }

    fn update_parameters(&mut self, learning_rate: f64) -> Result<()> {
        self.cache.check_update(&self.name)?;
        self.weight.scaled_sub_assign(learning_rate, &self.grad_weight)?;
        self.bias.scaled_sub_assign(learning_rate, &self.grad_bias)?;
        Ok(())
    }

    fn output_shape(&self, input_shape: &[usize]) -> Result<Vec<usize>> {
        let batch_size = self.batch_size(input_shape)?;
        Ok(vec![batch_size, self.output_units])
    }

    fn state(&self) -> LayerState {
        self.cache.state()
    }

    fn parameters(&self) -> Vec<Parameter<'_>> {
        vec![
            Parameter::new(&self.name, "weight", &self.weight, &self.grad_weight),
            Parameter::new(&self.name, "bias", &self.bias, &self.grad_bias),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixed_layer() -> Linear {
        let weight = Tensor::from_rows(&[vec![3.0, 7.0, 4.0], vec![5.0, 2.0, 6.0]]).unwrap();
        let bias = Tensor::new(vec![3], vec![2.0, 9.0, 3.0]).unwrap();
        Linear::from_parameters("fc", weight, bias).unwrap()
    }

    #[test]
    fn test_linear_layer_creation() {
        let mut rng = SimpleRng::new(42);
        let layer = Linear::new("fc", 10, 5, &mut rng).unwrap();

        assert_eq!(layer.input_units(), 10);
        assert_eq!(layer.output_units(), 5);
        assert_eq!(layer.weight().shape(), &[10, 5]);
        assert_eq!(layer.bias().shape(), &[5]);
        assert_eq!(layer.grad_weight().shape(), &[10, 5]);
        assert_eq!(layer.grad_bias().shape(), &[5]);
        assert_eq!(layer.state(), LayerState::Fresh);
    }

    #[test]
    fn test_linear_parameter_count() {
        let mut rng = SimpleRng::new(42);
        let layer = Linear::new("fc", 784, 512, &mut rng).unwrap();

        assert_eq!(layer.parameter_count(), 784 * 512 + 512);
    }

    #[test]
    fn test_zero_units_rejected() {
        let mut rng = SimpleRng::new(42);
        assert!(matches!(
            Linear::new("fc", 0, 3, &mut rng),
            Err(NnError::Configuration(_))
        ));
        assert!(matches!(
            Linear::new("fc", 3, 0, &mut rng),
            Err(NnError::Configuration(_))
        ));
    }

    #[test]
    fn test_xavier_initialization() {
        let mut rng = SimpleRng::new(42);
        let layer = Linear::new("fc", 100, 50, &mut rng).unwrap();
        let limit = (6.0f64 / 150.0).sqrt();

        for &weight in layer.weight().data() {
            assert!(
                weight >= -limit && weight <= limit,
                "Weight {} outside Xavier range [{}, {}]",
                weight,
                -limit,
                limit
            );
        }
        assert!(layer.bias().data().iter().all(|&b| b == 0.0));
        // Gradients start at zero and are not aliases of the weights.
        assert!(layer.grad_weight().data().iter().all(|&g| g == 0.0));
    }

    #[test]
    fn test_deterministic_initialization() {
        let mut rng1 = SimpleRng::new(42);
        let layer1 = Linear::new("fc", 10, 5, &mut rng1).unwrap();

        let mut rng2 = SimpleRng::new(42);
        let layer2 = Linear::new("fc", 10, 5, &mut rng2).unwrap();

        assert_eq!(layer1.weight(), layer2.weight());
    }

    #[test]
    fn test_forward_known_values() {
        let mut layer = fixed_layer();
        let x = Tensor::from_rows(&[vec![1.0, 2.0], vec![0.0, 1.0]]).unwrap();
        let y = layer.forward(&x).unwrap();

        assert_eq!(y.shape(), &[2, 3]);
        assert_eq!(y.data(), &[15.0, 20.0, 19.0, 7.0, 11.0, 9.0]);
        assert_eq!(layer.state(), LayerState::Forwarded);
    }

    #[test]
    fn test_backward_known_values() {
        let mut layer = fixed_layer();
        let x = Tensor::from_rows(&[vec![1.0, 2.0], vec![3.0, 4.0]]).unwrap();
        layer.forward(&x).unwrap();

        let g = Tensor::from_rows(&[vec![1.0, 0.0, 1.0], vec![0.0, 2.0, 0.0]]).unwrap();
        let grad_input = layer.backward(&g).unwrap();

        // xᵀ · g
        assert_eq!(layer.grad_weight().data(), &[1.0, 6.0, 1.0, 2.0, 8.0, 2.0]);
        // column sums of g
        assert_eq!(layer.grad_bias().data(), &[1.0, 2.0, 1.0]);
        // g · Wᵀ
        assert_eq!(grad_input.data(), &[7.0, 11.0, 14.0, 4.0]);
        assert_eq!(layer.state(), LayerState::Backwarded);
    }

    #[test]
    fn test_wrong_input_width() {
        let mut layer = fixed_layer();
        let x = Tensor::zeros(vec![1, 3]);
        assert!(matches!(
            layer.forward(&x),
            Err(NnError::ShapeMismatch { .. })
        ));
        // A failed forward leaves the layer untouched.
        assert_eq!(layer.state(), LayerState::Fresh);
    }

    #[test]
    fn test_wrong_gradient_shape() {
        let mut layer = fixed_layer();
        layer.forward(&Tensor::zeros(vec![2, 2])).unwrap();
        let result = layer.backward(&Tensor::zeros(vec![1, 3]));
        assert!(matches!(result, Err(NnError::ShapeMismatch { .. })));
        assert_eq!(layer.state(), LayerState::Forwarded);
    }

    #[test]
    fn test_parameter_names() {
        let layer = fixed_layer();
        let names: Vec<String> = layer.parameters().into_iter().map(|p| p.name).collect();
        assert_eq!(names, vec!["fc_weight", "fc_bias"]);
    }

    #[test]
    fn test_weight_edits_keep_shape() {
        let mut layer = fixed_layer();
        layer.weight_mut()[0] = -1.0;
        layer.bias_mut().fill(0.0);

        assert_eq!(layer.weight().shape(), &[2, 3]);
        assert_eq!(layer.weight().shape(), layer.grad_weight().shape());
        assert_eq!(layer.bias().shape(), layer.grad_bias().shape());

        let y = layer.forward(&Tensor::from_rows(&[vec![1.0, 2.0]]).unwrap()).unwrap();
        assert_eq!(y.data(), &[9.0, 11.0, 16.0]);
    }
}
