//! Configuration structures for training
//!
//! This module provides the hyper-parameters of the training loop, parsed from
//! JSON files.

use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::error::{NnError, Result};
use crate::loss::LossKind;

/// Configuration for a training run.
///
/// # Example
///
/// ```json
/// {
///   "learning_rate": 0.01,
///   "max_iterations": 20000,
///   "batch_size": 2,
///   "seed": 42,
///   "loss_tolerance": 1e-12,
///   "log_every": 1000,
///   "loss": "mean_squared"
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TrainingConfig {
    /// Step size of the gradient-descent update.
    pub learning_rate: f64,

    /// Upper bound on the number of forward/backward/update steps.
    pub max_iterations: usize,

    /// Number of samples per step.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Seed for weight initialisation and batch sampling.
    #[serde(default = "default_seed")]
    pub seed: u64,

    /// Stop as soon as a step's loss is at or below this value.
    #[serde(default)]
    pub loss_tolerance: Option<f64>,

    /// Log progress every this many iterations.
    #[serde(default = "default_log_every")]
    pub log_every: usize,

    #[serde(default)]
    pub loss: LossKind,
}

fn default_batch_size() -> usize {
    1
}

fn default_seed() -> u64 {
    42
}

fn default_log_every() -> usize {
    1000
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            learning_rate: 0.01,
            max_iterations: 10_000,
            batch_size: default_batch_size(),
            seed: default_seed(),
            loss_tolerance: None,
            log_every: default_log_every(),
            loss: LossKind::default(),
        }
    }
}

impl TrainingConfig {
    /// Check value ranges; called by [`load_config`].
    pub fn validate(&self) -> Result<()> {
        if !(self.learning_rate > 0.0 && self.learning_rate.is_finite()) {
            return Err(NnError::config("learning_rate must be a positive number"));
        }
        if self.max_iterations == 0 {
            return Err(NnError::config("max_iterations must be greater than 0"));
        }
        if self.batch_size == 0 {
            return Err(NnError::config("batch_size must be greater than 0"));
        }
        if self.log_every == 0 {
            return Err(NnError::config("log_every must be greater than 0"));
        }
        if let Some(tolerance) = self.loss_tolerance {
            if tolerance < 0.0 {
                return Err(NnError::config("loss_tolerance must be non-negative"));
            }
        }
        Ok(())
    }
}

/// Loads a training configuration from a JSON file.
///
/// Reads the file at `path`, deserializes it into a `TrainingConfig` and validates it.
///
/// # Examples
///
/// ```no_run
/// use sequential_nn::config::load_config;
///
/// let cfg = load_config("config/linear_regression.json").unwrap();
/// assert!(cfg.learning_rate > 0.0);
/// ```
pub fn load_config(path: impl AsRef<Path>) -> Result<TrainingConfig> {
    let contents = fs::read_to_string(path)?;
    let config: TrainingConfig = serde_json::from_str(&contents)?;
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_json_uses_defaults() {
        let config: TrainingConfig =
            serde_json::from_str(r#"{"learning_rate": 0.1, "max_iterations": 5}"#).unwrap();
        assert_eq!(config.batch_size, 1);
        assert_eq!(config.seed, 42);
        assert_eq!(config.log_every, 1000);
        assert_eq!(config.loss, LossKind::MeanSquared);
        assert!(config.loss_tolerance.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_loss_kind_names() {
        let config: TrainingConfig = serde_json::from_str(
            r#"{"learning_rate": 0.1, "max_iterations": 5, "loss": "softmax_cross_entropy"}"#,
        )
        .unwrap();
        assert_eq!(config.loss, LossKind::SoftmaxCrossEntropy);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let base = TrainingConfig::default();
        assert!(base.validate().is_ok());

        let cases = [
            TrainingConfig { learning_rate: 0.0, ..base.clone() },
            TrainingConfig { learning_rate: f64::NAN, ..base.clone() },
            TrainingConfig { max_iterations: 0, ..base.clone() },
            TrainingConfig { batch_size: 0, ..base.clone() },
            TrainingConfig { log_every: 0, ..base.clone() },
            TrainingConfig { loss_tolerance: Some(-1.0), ..base.clone() },
        ];
        for config in cases {
            assert!(matches!(config.validate(), Err(NnError::Configuration(_))));
        }
    }
}
