//! 2D max pooling layer

use crate::error::{NnError, Result};
use crate::layers::state::PassCache;
use crate::layers::{Layer, LayerState};
use crate::tensor::Tensor;

/// Max pooling over `[batch, channels, H, W]` without padding.
///
/// Output size follows the convolution formula `(H - poolH) / strideH + 1`.
/// In the backward pass each output gradient goes to the first maximal cell
/// of its window; overlapping windows accumulate.
#[derive(Debug, Clone)]
pub struct MaxPool2D {
    name: String,
    pool_size: (usize, usize),
    stride: (usize, usize),
    cache: PassCache,
}

impl MaxPool2D {
    /// Non-overlapping pooling: the stride equals the window size.
    pub fn new(pool_h: usize, pool_w: usize) -> Result<Self> {
        Self::with_stride(pool_h, pool_w, pool_h, pool_w)
    }

    pub fn with_stride(pool_h: usize, pool_w: usize, stride_h: usize, stride_w: usize) -> Result<Self> {
        if pool_h == 0 || pool_w == 0 || stride_h == 0 || stride_w == 0 {
            return Err(NnError::config(format!(
                "maxpool2d needs positive window and stride, got {}x{} / {}x{}",
                pool_h, pool_w, stride_h, stride_w
            )));
        }
        Ok(Self {
            name: "maxpool".to_string(),
            pool_size: (pool_h, pool_w),
            stride: (stride_h, stride_w),
            cache: PassCache::new(),
        })
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn pool_size(&self) -> (usize, usize) {
        self.pool_size
    }

    pub fn stride(&self) -> (usize, usize) {
        self.stride
    }

    /// Flat input index of the maximum in window `(oy, ox)` of plane `plane`.
    fn argmax(&self, x: &[f64], shape: &[usize], plane: usize, oy: usize, ox: usize) -> usize {
        let (in_h, in_w) = (shape[2], shape[3]);
        let base = plane * in_h * in_w;
        let mut best = base + oy * self.stride.0 * in_w + ox * self.stride.1;
        for ky in 0..self.pool_size.0 {
            for kx in 0..self.pool_size.1 {
                let idx = base + (oy * self.stride.0 + ky) * in_w + ox * self.stride.1 + kx;
                if x[idx] > x[best] {
                    best = idx;
                }
            }
        }
        best
    }
}

impl Layer for MaxPool2D {
    fn name(&self) -> &str {
        &self.name
    }

    fn forward(&mut self, input: &Tensor) -> Result<Tensor> {
        let out_shape = self.output_shape(input.shape())?;
        let planes = out_shape[0] * out_shape[1];
        let (out_h, out_w) = (out_shape[2], out_shape[3]);
        let x = input.data();

        let mut output = Vec::with_capacity(planes * out_h * out_w);
        for plane in 0..planes {
            for oy in 0..out_h {
                for ox in 0..out_w {
                    output.push(x[self.argmax(x, input.shape(), plane, oy, ox)]);
                }
            }
        }

        self.cache.store(input);
        Tensor::new(out_shape, output)
    }

    fn backward(&mut self, grad_output: &Tensor) -> Result<Tensor> {
        let input = self.cache.input(&self.name)?;
        let out_shape = self.output_shape(input.shape())?;
        if grad_output.shape() != out_shape.as_slice() {
            return Err(NnError::shape_mismatch(
                format!("{} output gradient", self.name),
                out_shape,
                grad_output.shape(),
            ));
        }

        let planes = out_shape[0] * out_shape[1];
        let (out_h, out_w) = (out_shape[2], out_shape[3]);
        let x = input.data();
        let g = grad_output.data();
        let mut grad_input = vec![0.0; x.len()];

        for plane in 0..planes {
            for oy in 0..out_h {
                for ox in 0..out_w {
                    let idx = self.argmax(x, input.shape(), plane, oy, ox);
                    grad_input[idx] += g[(plane * out_h + oy) * out_w + ox];
                }
            }
        }

        let grad_input = Tensor::new(input.shape(), grad_input)?;
        self.cache.mark_backwarded();
        Ok(grad_input)
    }

    fn update_parameters(&mut self, _learning_rate: f64) -> Result<()> {
        self.cache.check_update(&self.name)
    }

    fn output_shape(&self, input_shape: &[usize]) -> Result<Vec<usize>> {
        let (ph, pw) = self.pool_size;
        let (sh, sw) = self.stride;
        match input_shape {
            &[batch, channels, h, w] if h >= ph && w >= pw => {
                Ok(vec![batch, channels, (h - ph) / sh + 1, (w - pw) / sw + 1])
            }
            other => Err(NnError::shape_mismatch(
                format!("{} input", self.name),
                format!("[batch, channels, H >= {}, W >= {}]", ph, pw),
                other,
            )),
        }
    }

    fn state(&self) -> LayerState {
        self.cache.state()
    }
}
