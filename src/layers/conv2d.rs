//! 2D Convolutional layer implementation
//!
//! This module provides a Conv2D layer that performs 2D cross-correlation
//! (the kernel is not flipped) with zero padding and independent strides for
//! height and width.

use crate::error::{NnError, Result};
use crate::layers::state::PassCache;
use crate::layers::{Layer, LayerState, Parameter};
use crate::tensor::Tensor;
use crate::utils::SimpleRng;

/// Construction options for a [`Conv2D`] layer.
///
/// Spatial options are `(height, width)` pairs. Kernel and stride must be
/// positive, padding may be zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Conv2DConfig {
    pub in_channels: usize,
    pub out_channels: usize,
    pub kernel_size: (usize, usize),
    pub padding: (usize, usize),
    pub stride: (usize, usize),
}

fn default_kernel() -> (usize, usize) {
    (3, 3)
}

fn default_padding() -> (usize, usize) {
    (1, 1)
}

fn default_stride() -> (usize, usize) {
    (1, 1)
}

impl Conv2DConfig {
    /// 3×3 kernel, padding 1, stride 1.
    pub fn new(in_channels: usize, out_channels: usize) -> Self {
        Self {
            in_channels,
            out_channels,
            kernel_size: default_kernel(),
            padding: default_padding(),
            stride: default_stride(),
        }
    }

    pub fn kernel_size(mut self, height: usize, width: usize) -> Self {
        self.kernel_size = (height, width);
        self
    }

    pub fn padding(mut self, height: usize, width: usize) -> Self {
        self.padding = (height, width);
        self
    }

    pub fn stride(mut self, height: usize, width: usize) -> Self {
        self.stride = (height, width);
        self
    }

    fn validate(&self, name: &str) -> Result<()> {
        let checks = [
            ("in_channels", self.in_channels),
            ("out_channels", self.out_channels),
            ("kernel height", self.kernel_size.0),
            ("kernel width", self.kernel_size.1),
            ("stride height", self.stride.0),
            ("stride width", self.stride.1),
        ];
        for (field, value) in checks {
            if value == 0 {
                return Err(NnError::config(format!(
                    "conv2d layer '{}': {} must be greater than 0",
                    name, field
                )));
            }
        }
        Ok(())
    }
}

/// Geometry of one forward pass, derived from the input shape.
#[derive(Debug, Clone, Copy)]
struct ConvGeometry {
    batch: usize,
    in_h: usize,
    in_w: usize,
    out_h: usize,
    out_w: usize,
}

/// 2D Convolutional layer with learnable filters.
///
/// Input `[batch, in_channels, H, W]`, weight `[in_channels, out_channels, kH, kW]`,
/// bias `[out_channels]`, output `[batch, out_channels, outH, outW]` with
///
/// `outH = (H + 2*padH - kH) / strideH + 1` (floor division), likewise for width.
///
/// Rows and columns left over when the stride does not divide evenly are never
/// sampled.
///
/// # Example
///
/// ```ignore
/// use sequential_nn::layers::{Conv2D, Conv2DConfig};
/// use sequential_nn::utils::SimpleRng;
///
/// let mut rng = SimpleRng::new(42);
/// let config = Conv2DConfig::new(1, 8).kernel_size(3, 3).padding(1, 1);
/// let layer = Conv2D::new("conv1", config, &mut rng)?;
/// assert_eq!(layer.config().out_channels, 8);
/// ```
#[derive(Debug, Clone)]
pub struct Conv2D {
    name: String,
    config: Conv2DConfig,
    weight: Tensor,
    bias: Tensor,
    grad_weight: Tensor,
    grad_bias: Tensor,
    cache: PassCache,
}

impl Conv2D {
    /// Create a new Conv2D layer with Xavier initialization.
    ///
    /// For convolutions: fan_in = in_channels × kH × kW, fan_out = out_channels × kH × kW,
    /// and weights are sampled from [-limit, limit] with limit = sqrt(6 / (fan_in + fan_out)).
    /// Biases are initialized to zero.
    ///
    /// # Errors
    ///
    /// `Configuration` if a channel count, kernel dimension or stride is zero.
    pub fn new(name: impl Into<String>, config: Conv2DConfig, rng: &mut SimpleRng) -> Result<Self> {
        let name = name.into();
        config.validate(&name)?;

        let (kh, kw) = config.kernel_size;
        let fan_in = (config.in_channels * kh * kw) as f64;
        let fan_out = (config.out_channels * kh * kw) as f64;
        let limit = (6.0 / (fan_in + fan_out)).sqrt();

        let shape = vec![config.in_channels, config.out_channels, kh, kw];
        let count = shape.iter().product();
        let weights = (0..count).map(|_| rng.gen_range_f64(-limit, limit)).collect();
        let weight = Tensor::new(shape, weights)?;
        let bias = Tensor::zeros(vec![config.out_channels]);

        Self::from_parameters(name, config, weight, bias)
    }

    /// Create a layer with explicit weight `[C_in, C_out, kH, kW]` and bias `[C_out]`.
    pub fn from_parameters(
        name: impl Into<String>,
        config: Conv2DConfig,
        weight: Tensor,
        bias: Tensor,
    ) -> Result<Self> {
        let name = name.into();
        config.validate(&name)?;

        let weight_shape = [
            config.in_channels,
            config.out_channels,
            config.kernel_size.0,
            config.kernel_size.1,
        ];
        if weight.shape() != weight_shape {
            return Err(NnError::shape_mismatch(
                format!("{} weight", name),
                weight_shape,
                weight.shape(),
            ));
        }
        if bias.shape() != [config.out_channels] {
            return Err(NnError::shape_mismatch(
                format!("{} bias", name),
                [config.out_channels],
                bias.shape(),
            ));
        }

        Ok(Self {
            grad_weight: Tensor::zeros(weight.shape()),
            grad_bias: Tensor::zeros(bias.shape()),
            name,
            config,
            weight,
            bias,
            cache: PassCache::new(),
        })
    }

    pub fn config(&self) -> &Conv2DConfig {
        &self.config
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

    fn geometry(&self, input_shape: &[usize]) -> Result<ConvGeometry> {
        let (batch, in_h, in_w) = match input_shape {
            &[batch, channels, h, w] if channels == self.config.in_channels => (batch, h, w),
            other => {
                return Err(NnError::shape_mismatch(
                    format!("{} input", self.name),
                    format!("[batch, {}, H, W]", self.config.in_channels),
                    other,
                ))
            }
        };

        let (kh, kw) = self.config.kernel_size;
        let (ph, pw) = self.config.padding;
        let (sh, sw) = self.config.stride;
        let padded_h = in_h + 2 * ph;
        let padded_w = in_w + 2 * pw;
        if padded_h < kh || padded_w < kw {
            return Err(NnError::shape_mismatch(
                format!("{} input", self.name),
                format!("padded spatial size of at least {}x{}", kh, kw),
                format!("{}x{} after padding", padded_h, padded_w),
            ));
        }

        Ok(ConvGeometry {
            batch,
            in_h,
            in_w,
            out_h: (padded_h - kh) / sh + 1,
            out_w: (padded_w - kw) / sw + 1,
        })
    }

    /// Index into the unpadded input for padded coordinates, or `None` on the zero border.
    #[inline]
    fn unpadded(&self, geo: &ConvGeometry, py: usize, px: usize) -> Option<(usize, usize)> {
        let (ph, pw) = self.config.padding;
        let iy = py.checked_sub(ph).filter(|&y| y < geo.in_h)?;
        let ix = px.checked_sub(pw).filter(|&x| x < geo.in_w)?;
        Some((iy, ix))
    }
}

impl Layer for Conv2D {
    fn name(&self) -> &str {
        &self.name
    }

    fn forward(&mut self, input: &Tensor) -> Result<Tensor> {
        let geo = self.geometry(input.shape())?;
        let Conv2DConfig {
            in_channels,
            out_channels,
            kernel_size: (kh, kw),
            stride: (sh, sw),
            ..
        } = self.config;

        let x = input.data();
        let w = self.weight.data();
        let in_spatial = geo.in_h * geo.in_w;
        let out_spatial = geo.out_h * geo.out_w;
        let mut output = vec![0.0; geo.batch * out_channels * out_spatial];

        for b in 0..geo.batch {
            for oc in 0..out_channels {
                let out_base = (b * out_channels + oc) * out_spatial;
                let bias = self.bias.data()[oc];

                for oy in 0..geo.out_h {
                    for ox in 0..geo.out_w {
                        let mut sum = bias;

                        for ic in 0..in_channels {
                            let in_base = (b * in_channels + ic) * in_spatial;
                            let w_base = (ic * out_channels + oc) * kh * kw;

                            for ky in 0..kh {
                                for kx in 0..kw {
                                    if let Some((iy, ix)) =
                                        self.unpadded(&geo, oy * sh + ky, ox * sw + kx)
                                    {
                                        sum += x[in_base + iy * geo.in_w + ix]
                                            * w[w_base + ky * kw + kx];
                                    }
                                }
                            }
                        }

                        output[out_base + oy * geo.out_w + ox] = sum;
                    }
                }
            }
        }

        self.cache.store(input);
        Tensor::new(vec![geo.batch, out_channels, geo.out_h, geo.out_w], output)
    }

    fn backward(&mut self, grad_output: &Tensor) -> Result<Tensor> {
        let input = self.cache.input(&self.name)?;
        let geo = self.geometry(input.shape())?;
        let Conv2DConfig {
            in_channels,
            out_channels,
            kernel_size: (kh, kw),
            stride: (sh, sw),
            ..
        } = self.config;

        let expected = [geo.batch, out_channels, geo.out_h, geo.out_w];
        if grad_output.shape() != expected {
            return Err(NnError::shape_mismatch(
                format!("{} output gradient", self.name),
                expected,
                grad_output.shape(),
            ));
        }

        let x = input.data();
        let g = grad_output.data();
        let w = self.weight.data();
        let in_spatial = geo.in_h * geo.in_w;
        let out_spatial = geo.out_h * geo.out_w;

        let mut grad_w = vec![0.0; w.len()];
        let mut grad_b = vec![0.0; out_channels];
        // Cells on the padding border are dropped here, which is the crop.
        let mut grad_input = vec![0.0; x.len()];

        for b in 0..geo.batch {
            for oc in 0..out_channels {
                let g_base = (b * out_channels + oc) * out_spatial;

                for oy in 0..geo.out_h {
                    for ox in 0..geo.out_w {
                        let go = g[g_base + oy * geo.out_w + ox];
                        grad_b[oc] += go;

                        for ic in 0..in_channels {
                            let in_base = (b * in_channels + ic) * in_spatial;
                            let w_base = (ic * out_channels + oc) * kh * kw;

                            for ky in 0..kh {
                                for kx in 0..kw {
                                    if let Some((iy, ix)) =
                                        self.unpadded(&geo, oy * sh + ky, ox * sw + kx)
                                    {
                                        let in_idx = in_base + iy * geo.in_w + ix;
                                        let w_idx = w_base + ky * kw + kx;
                                        grad_w[w_idx] += x[in_idx] * go;
                                        // Overlapping receptive fields accumulate.
                                        grad_input[in_idx] += go * w[w_idx];
                                    }
                                }
                            }
                        }
                    }
                }
            }
        }

        let input_shape = input.shape().to_vec();
        self.grad_weight = Tensor::new(self.weight.shape(), grad_w)?;
        self.grad_bias = Tensor::new(vec![out_channels], grad_b)?;
        self.cache.mark_backwarded();
        Tensor::new(input_shape, grad_input)
    }

    fn update_parameters(&mut self, learning_rate: f64) -> Result<()> {
        self.cache.check_update(&self.name)?;
        self.weight.scaled_sub_assign(learning_rate, &self.grad_weight)?;
        self.bias.scaled_sub_assign(learning_rate, &self.grad_bias)?;
        Ok(())
    }

    fn output_shape(&self, input_shape: &[usize]) -> Result<Vec<usize>> {
        let geo = self.geometry(input_shape)?;
        Ok(vec![geo.batch, self.config.out_channels, geo.out_h, geo.out_w])
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
