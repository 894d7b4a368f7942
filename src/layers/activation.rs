//! Element-wise activation layers
//!
//! One `Activation` type covers every supported function; the kind is a tagged
//! union so a model can hold any of them behind the same `Layer` contract.

use std::fmt;

use crate::error::{NnError, Result};
use crate::layers::state::PassCache;
use crate::layers::{Layer, LayerState};
use crate::tensor::Tensor;

/// Default negative slope for Leaky ReLU.
pub const DEFAULT_LEAKY_RELU_ALPHA: f64 = 0.01;

/// Supported activation functions.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ActivationKind {
    Relu,
    /// Leaky ReLU with the given negative slope.
    LeakyRelu(f64),
    Sigmoid,
    Tanh,
}

impl ActivationKind {
    /// Parse a configuration name such as `"relu"` or `"leaky_relu"`.
    ///
    /// `alpha` is only used by Leaky ReLU and defaults to 0.01.
    pub fn from_name(name: &str, alpha: Option<f64>) -> Result<Self> {
        match name.to_lowercase().as_str() {
            "relu" => Ok(ActivationKind::Relu),
            "leaky_relu" => {
                let alpha = alpha.unwrap_or(DEFAULT_LEAKY_RELU_ALPHA);
                if alpha < 0.0 {
                    return Err(NnError::config("leaky_relu alpha must be non-negative"));
                }
                Ok(ActivationKind::LeakyRelu(alpha))
            }
            "sigmoid" => Ok(ActivationKind::Sigmoid),
            "tanh" => Ok(ActivationKind::Tanh),
            other => Err(NnError::config(format!(
                "unknown activation '{}', expected one of: relu, leaky_relu, sigmoid, tanh",
                other
            ))),
        }
    }

    pub fn apply(self, x: f64) -> f64 {
        match self {
            ActivationKind::Relu => x.max(0.0),
            ActivationKind::LeakyRelu(alpha) => {
                if x > 0.0 {
                    x
                } else {
                    alpha * x
                }
            }
            ActivationKind::Sigmoid => sigmoid(x),
            ActivationKind::Tanh => x.tanh(),
        }
    }

    /// Derivative with respect to the pre-activation input `x`.
    pub fn derivative(self, x: f64) -> f64 {
        match self {
            ActivationKind::Relu => {
                if x > 0.0 {
                    1.0
                } else {
                    0.0
                }
            }
            ActivationKind::LeakyRelu(alpha) => {
                if x > 0.0 {
                    1.0
                } else {
                    alpha
                }
            }
            ActivationKind::Sigmoid => {
                let s = sigmoid(x);
                s * (1.0 - s)
            }
            ActivationKind::Tanh => {
                let t = x.tanh();
                1.0 - t * t
            }
        }
    }
}

impl fmt::Display for ActivationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ActivationKind::Relu => "relu",
            ActivationKind::LeakyRelu(_) => "leaky_relu",
            ActivationKind::Sigmoid => "sigmoid",
            ActivationKind::Tanh => "tanh",
        };
        f.write_str(name)
    }
}

fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

/// Shape-preserving activation layer without parameters.
#[derive(Debug, Clone)]
pub struct Activation {
    name: String,
    kind: ActivationKind,
    cache: PassCache,
}

impl Activation {
    /// Activation named after its kind, e.g. `relu`.
    pub fn new(kind: ActivationKind) -> Self {
        Self::named(kind.to_string(), kind)
    }

    pub fn named(name: impl Into<String>, kind: ActivationKind) -> Self {
        Self {
            name: name.into(),
            kind,
            cache: PassCache::new(),
        }
    }

    pub fn relu() -> Self {
        Self::new(ActivationKind::Relu)
    }

    pub fn sigmoid() -> Self {
        Self::new(ActivationKind::Sigmoid)
    }

    pub fn tanh() -> Self {
        Self::new(ActivationKind::Tanh)
    }

    pub fn kind(&self) -> ActivationKind {
        self.kind
    }
}

impl Layer for Activation {
    fn name(&self) -> &str {
        &self.name
    }

    fn forward(&mut self, input: &Tensor) -> Result<Tensor> {
        let kind = self.kind;
        let output = input.map(|x| kind.apply(x));
        self.cache.store(input);
        Ok(output)
    }

    fn backward(&mut self, grad_output: &Tensor) -> Result<Tensor> {
        let input = self.cache.input(&self.name)?;
        input.expect_same_shape(grad_output, &format!("{} output gradient", self.name))?;

        let data = input
            .data()
            .iter()
            .zip(grad_output.data())
            .map(|(&x, &g)| g * self.kind.derivative(x))
            .collect();
        let grad_input = Tensor::new(input.shape(), data)?;

        self.cache.mark_backwarded();
        Ok(grad_input)
    }

    fn update_parameters(&mut self, _learning_rate: f64) -> Result<()> {
        self.cache.check_update(&self.name)
    }

    fn output_shape(&self, input_shape: &[usize]) -> Result<Vec<usize>> {
        Ok(input_shape.to_vec())
    }

    fn state(&self) -> LayerState {
        self.cache.state()
    }
}
