//! Layer abstractions for neural networks
//!
//! This module provides the Layer trait and the layer types a sequential
//! model is built from: Linear, Conv2D, activations, Flatten and MaxPool2D.

mod r#trait;
pub(crate) mod state;
pub mod activation;
pub mod conv2d;
pub mod flatten;
pub mod linear;
pub mod pooling;

// Re-export the Layer trait for convenience
pub use r#trait::{Layer, Parameter};
pub use state::LayerState;
pub use activation::{Activation, ActivationKind};
pub use conv2d::{Conv2D, Conv2DConfig};
pub use flatten::Flatten;
pub use linear::Linear;
pub use pooling::MaxPool2D;
