//! Sequential Neural Network Library
//!
//! A small training engine built from layers with hand-derived gradients.
//! A [`Model`](model::Model) chains layers; each training step is
//! `forward` → loss → `backward` → `update_parameters`.
//!
//! # Modules
//!
//! - `tensor`: dense row-major `f64` tensor
//! - `layers`: Layer trait and implementations (Linear, Conv2D, activations, ...)
//! - `model`: sequential model container
//! - `loss`: loss functions producing the seed gradient for `backward`
//! - `architecture`: JSON architecture configuration and model building
//! - `config`: training configuration
//! - `train`: training step and loop helpers
//! - `utils`: shared utilities (seedable RNG)
//! - `error`: crate error type

pub mod architecture;
pub mod config;
pub mod error;
pub mod layers;
pub mod loss;
pub mod model;
pub mod tensor;
pub mod train;
pub mod utils;

pub use error::{NnError, Result};
pub use model::Model;
pub use tensor::Tensor;
