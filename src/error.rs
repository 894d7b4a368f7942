//! Error type shared by every module of the crate
//!
//! All failures are programming or configuration errors: nothing here is
//! transient, so callers are expected to surface them rather than retry.

use std::fmt;
use thiserror::Error;

use crate::layers::LayerState;

/// Errors raised while building or running a model.
#[derive(Debug, Error)]
pub enum NnError {
    /// A tensor's shape does not fit what a layer, loss or model expects.
    #[error("shape mismatch in {context}: expected {expected}, got {actual}")]
    ShapeMismatch {
        context: String,
        expected: ShapeDesc,
        actual: ShapeDesc,
    },

    /// A pass was called out of the forward -> backward -> update order.
    #[error("layer '{layer}': {operation} called while layer is {state}")]
    OrderingViolation {
        layer: String,
        operation: &'static str,
        state: LayerState,
    },

    /// Invalid construction parameters or configuration values.
    #[error("invalid configuration: {0}")]
    Configuration(String),

    #[error("failed to read configuration: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse configuration: {0}")]
    Json(#[from] serde_json::Error),
}

impl NnError {
    pub fn shape_mismatch(
        context: impl Into<String>,
        expected: impl Into<ShapeDesc>,
        actual: impl Into<ShapeDesc>,
    ) -> Self {
        NnError::ShapeMismatch {
            context: context.into(),
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        NnError::Configuration(message.into())
    }

    pub fn ordering(layer: &str, operation: &'static str, state: LayerState) -> Self {
        NnError::OrderingViolation {
            layer: layer.to_string(),
            operation,
            state,
        }
    }
}

/// Human-readable description of an expected or actual shape.
///
/// Expected shapes are not always concrete (e.g. "any batch of 3 channels"),
/// so the description is kept as text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShapeDesc(String);

impl fmt::Display for ShapeDesc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&[usize]> for ShapeDesc {
    fn from(shape: &[usize]) -> Self {
        ShapeDesc(format!("{:?}", shape))
    }
}

impl From<Vec<usize>> for ShapeDesc {
    fn from(shape: Vec<usize>) -> Self {
        ShapeDesc::from(shape.as_slice())
    }
}

impl<const N: usize> From<[usize; N]> for ShapeDesc {
    fn from(shape: [usize; N]) -> Self {
        ShapeDesc::from(&shape[..])
    }
}

impl From<&str> for ShapeDesc {
    fn from(text: &str) -> Self {
        ShapeDesc(text.to_string())
    }
}

impl From<String> for ShapeDesc {
    fn from(text: String) -> Self {
        ShapeDesc(text)
    }
}

pub type Result<T> = std::result::Result<T, NnError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shape_mismatch_message() {
        let err = NnError::shape_mismatch("conv1 input", "[B, 3, H, W]", vec![2, 1, 5, 5]);
        assert_eq!(
            err.to_string(),
            "shape mismatch in conv1 input: expected [B, 3, H, W], got [2, 1, 5, 5]"
        );
    }

    #[test]
    fn test_ordering_message() {
        let err = NnError::ordering("fc1", "backward", LayerState::Fresh);
        assert_eq!(
            err.to_string(),
            "layer 'fc1': backward called while layer is fresh"
        );
    }
}
