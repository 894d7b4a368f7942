//! Shared utilities for neural network implementations
//!
//! This module provides the seedable random number generator used for weight
//! initialisation and data generation.

pub mod rng;

pub use rng::SimpleRng;
