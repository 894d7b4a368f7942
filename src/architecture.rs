//! Architecture configuration structures
//!
//! This module describes a sequential network in JSON and builds a [`Model`]
//! from it, so architectures can be changed without touching code.

use std::fs;
use std::path::Path;

use log::info;
use serde::Deserialize;

use crate::error::{NnError, Result};
use crate::layers::{Activation, ActivationKind, Conv2D, Conv2DConfig, Flatten, Layer, Linear, MaxPool2D};
use crate::model::Model;
use crate::utils::SimpleRng;

/// Configuration for a single layer in the network.
///
/// Different layer types require different fields:
///
/// - **linear**: `input_units` and `output_units`
/// - **conv2d**: `in_channels`, `out_channels`, optional `kernel_size` (default `[3, 3]`),
///   `padding` (default `[1, 1]`) and `stride` (default `[1, 1]`)
/// - **maxpool2d**: `pool_size`, optional `stride` (default: the pool size)
/// - **flatten**, **relu**, **sigmoid**, **tanh**: no fields
/// - **leaky_relu**: optional `alpha` (default 0.01)
///
/// Every layer accepts an optional `name`; unnamed layers are called
/// `{layer_type}{index}`.
///
/// # Examples
///
/// ```json
/// {
///   "layer_type": "conv2d",
///   "name": "conv1",
///   "in_channels": 1,
///   "out_channels": 4,
///   "kernel_size": [3, 3],
///   "padding": [1, 1],
///   "stride": [1, 1]
/// }
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LayerConfig {
    pub layer_type: String,
    pub name: Option<String>,

    // Linear layer parameters
    pub input_units: Option<usize>,
    pub output_units: Option<usize>,

    // Conv2D layer parameters
    pub in_channels: Option<usize>,
    pub out_channels: Option<usize>,
    pub kernel_size: Option<[usize; 2]>,
    pub padding: Option<[usize; 2]>,

    /// Stride for Conv2D and MaxPool2D layers
    pub stride: Option<[usize; 2]>,

    // MaxPool2D layer parameters
    pub pool_size: Option<[usize; 2]>,

    // LeakyReLU parameter
    pub alpha: Option<f64>,
}

/// Configuration for the whole network.
///
/// `input_shape` is the per-sample shape (no batch dimension); it is used to
/// check that consecutive layers fit together.
///
/// # Example
///
/// ```json
/// {
///   "input_shape": [1, 8, 8],
///   "layers": [
///     { "layer_type": "conv2d", "in_channels": 1, "out_channels": 4 },
///     { "layer_type": "relu" },
///     { "layer_type": "maxpool2d", "pool_size": [2, 2] },
///     { "layer_type": "flatten" },
///     { "layer_type": "linear", "input_units": 64, "output_units": 10 }
///   ]
/// }
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ArchitectureConfig {
    pub input_shape: Vec<usize>,
    pub layers: Vec<LayerConfig>,
}

/// Loads an architecture configuration from a JSON file.
///
/// Performs per-layer validation (required fields, positive sizes). Layer
/// connections are checked by [`build_model`], which knows the layer shapes.
///
/// # Examples
///
/// ```no_run
/// use sequential_nn::architecture::load_architecture;
///
/// let arch = load_architecture("config/architectures/small_cnn.json").unwrap();
/// assert!(!arch.layers.is_empty());
/// ```
pub fn load_architecture(path: impl AsRef<Path>) -> Result<ArchitectureConfig> {
    let contents = fs::read_to_string(path)?;
    let config: ArchitectureConfig = serde_json::from_str(&contents)?;
    validate_architecture(&config)?;
    Ok(config)
}

/// Builds a model from an architecture configuration.
///
/// Weights are drawn from `rng`. After construction the end-to-end shape
/// contract is checked on a batch of one; a mismatch is reported as
/// `ShapeMismatch` naming the offending layer.
pub fn build_model(config: &ArchitectureConfig, rng: &mut SimpleRng) -> Result<Model> {
    validate_architecture(config)?;

    let mut layers: Vec<Box<dyn Layer>> = Vec::with_capacity(config.layers.len());
    for (index, layer) in config.layers.iter().enumerate() {
        layers.push(build_layer(layer, index, rng)?);
    }
    let model = Model::new(layers)?;

    let mut input_shape = vec![1];
    input_shape.extend_from_slice(&config.input_shape);
    let output_shape = model.output_shape(&input_shape)?;

    info!(
        "built model with {} layers, {} parameters, output shape {:?}",
        model.len(),
        model.parameter_count(),
        &output_shape[1..]
    );
    Ok(model)
}

fn missing(index: usize, layer_type: &str, field: &str) -> NnError {
    NnError::config(format!(
        "Layer {}: {} layer requires '{}'",
        index, layer_type, field
    ))
}

fn unknown_type(index: usize, layer_type: &str) -> NnError {
    NnError::config(format!("Layer {}: unknown layer type '{}'", index, layer_type))
}

fn build_layer(layer: &LayerConfig, index: usize, rng: &mut SimpleRng) -> Result<Box<dyn Layer>> {
    let layer_type = layer.layer_type.to_lowercase();
    let name = layer
        .name
        .clone()
        .unwrap_or_else(|| format!("{}{}", layer_type, index));

    let built: Box<dyn Layer> = match layer_type.as_str() {
        "linear" => {
            let input_units = layer
                .input_units
                .ok_or_else(|| missing(index, "linear", "input_units"))?;
            let output_units = layer
                .output_units
                .ok_or_else(|| missing(index, "linear", "output_units"))?;
            Box::new(Linear::new(name, input_units, output_units, rng)?)
        }
        "conv2d" => {
            let in_channels = layer
                .in_channels
                .ok_or_else(|| missing(index, "conv2d", "in_channels"))?;
            let out_channels = layer
                .out_channels
                .ok_or_else(|| missing(index, "conv2d", "out_channels"))?;
            let mut conv = Conv2DConfig::new(in_channels, out_channels);
            if let Some([h, w]) = layer.kernel_size {
                conv = conv.kernel_size(h, w);
            }
            if let Some([h, w]) = layer.padding {
                conv = conv.padding(h, w);
            }
            if let Some([h, w]) = layer.stride {
                conv = conv.stride(h, w);
            }
            Box::new(Conv2D::new(name, conv, rng)?)
        }
        "maxpool2d" => {
            let [ph, pw] = layer
                .pool_size
                .ok_or_else(|| missing(index, "maxpool2d", "pool_size"))?;
            let [sh, sw] = layer.stride.unwrap_or([ph, pw]);
            Box::new(MaxPool2D::with_stride(ph, pw, sh, sw)?.with_name(name))
        }
        "flatten" => Box::new(Flatten::named(name)),
        kind @ ("relu" | "leaky_relu" | "sigmoid" | "tanh") => {
            Box::new(Activation::named(name, ActivationKind::from_name(kind, layer.alpha)?))
        }
        other => return Err(unknown_type(index, other)),
    };
    Ok(built)
}

/// Validates an architecture configuration.
///
/// Checks that:
/// - The input shape and the layer list are non-empty
/// - Each layer has the required fields for its type
/// - Sizes are greater than 0
fn validate_architecture(config: &ArchitectureConfig) -> Result<()> {
    if config.layers.is_empty() {
        return Err(NnError::config("Architecture must have at least one layer"));
    }
    if config.input_shape.is_empty() || config.input_shape.contains(&0) {
        return Err(NnError::config(format!(
            "input_shape must be non-empty with positive dimensions, got {:?}",
            config.input_shape
        )));
    }

    for (index, layer) in config.layers.iter().enumerate() {
        validate_layer(layer, index)?;
    }
    Ok(())
}

fn validate_layer(layer: &LayerConfig, index: usize) -> Result<()> {
    let positive = |field: &str, value: Option<usize>| -> Result<()> {
        match value {
            Some(0) => Err(NnError::config(format!(
                "Layer {}: {} must be greater than 0",
                index, field
            ))),
            _ => Ok(()),
        }
    };
    let positive_pair = |field: &str, value: Option<[usize; 2]>| -> Result<()> {
        match value {
            Some([h, w]) if h == 0 || w == 0 => Err(NnError::config(format!(
                "Layer {}: {} must be greater than 0, got [{}, {}]",
                index, field, h, w
            ))),
            _ => Ok(()),
        }
    };

    match layer.layer_type.to_lowercase().as_str() {
        "linear" => {
            if layer.input_units.is_none() {
                return Err(missing(index, "linear", "input_units"));
            }
            if layer.output_units.is_none() {
                return Err(missing(index, "linear", "output_units"));
            }
            positive("input_units", layer.input_units)?;
            positive("output_units", layer.output_units)?;
        }
        "conv2d" => {
            if layer.in_channels.is_none() {
                return Err(missing(index, "conv2d", "in_channels"));
            }
            if layer.out_channels.is_none() {
                return Err(missing(index, "conv2d", "out_channels"));
            }
            positive("in_channels", layer.in_channels)?;
            positive("out_channels", layer.out_channels)?;
            positive_pair("kernel_size", layer.kernel_size)?;
            positive_pair("stride", layer.stride)?;
        }
        "maxpool2d" => {
            if layer.pool_size.is_none() {
                return Err(missing(index, "maxpool2d", "pool_size"));
            }
            positive_pair("pool_size", layer.pool_size)?;
            positive_pair("stride", layer.stride)?;
        }
        "flatten" => {}
        "relu" | "sigmoid" | "tanh" => {}
        "leaky_relu" => {
            if layer.alpha.is_some_and(|alpha| alpha < 0.0) {
                return Err(NnError::config(format!(
                    "Layer {}: alpha must be non-negative",
                    index
                )));
            }
        }
        other => return Err(unknown_type(index, other)),
    }
    Ok(())
}
