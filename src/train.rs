//! Training loop helpers
//!
//! One training step is forward → loss → backward → update. [`fit`] repeats
//! it with batches pulled from a caller-supplied closure.

use log::{debug, info};

use crate::config::TrainingConfig;
use crate::error::{NnError, Result};
use crate::loss::LossKind;
use crate::model::Model;
use crate::tensor::Tensor;
use crate::utils::SimpleRng;

/// Summary of a finished [`fit`] call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrainingReport {
    /// Number of steps actually run.
    pub iterations: usize,
    /// Loss of the last step.
    pub final_loss: f64,
    /// Whether the run stopped because the loss reached `loss_tolerance`.
    pub converged: bool,
}

/// Run one full training step and return the loss measured before the update.
pub fn train_step(
    model: &mut Model,
    input: &Tensor,
    target: &Tensor,
    loss: LossKind,
    learning_rate: f64,
) -> Result<f64> {
    let output = model.forward(input)?;
    let (value, grad) = loss.compute(&output, target)?;
    if !value.is_finite() {
        return Err(NnError::config(format!(
            "loss diverged to {}; lower the learning rate",
            value
        )));
    }
    model.backward(&grad)?;
    model.update_parameters(learning_rate)?;
    Ok(value)
}

/// Train `model` for up to `config.max_iterations` steps.
///
/// `next_batch` receives the run's RNG (seeded from `config.seed`) and the
/// configured batch size, and returns an `(input, target)` pair.
/// Training stops early once a step's loss is at or below `config.loss_tolerance`.
pub fn fit<F>(model: &mut Model, config: &TrainingConfig, mut next_batch: F) -> Result<TrainingReport>
where
    F: FnMut(&mut SimpleRng, usize) -> Result<(Tensor, Tensor)>,
{
    config.validate()?;
    let mut rng = SimpleRng::new(config.seed);

    info!(
        "training: lr={} max_iterations={} batch_size={} loss={:?}",
        config.learning_rate, config.max_iterations, config.batch_size, config.loss
    );

    let mut report = TrainingReport {
        iterations: 0,
        final_loss: f64::INFINITY,
        converged: false,
    };

    for iteration in 1..=config.max_iterations {
        let (input, target) = next_batch(&mut rng, config.batch_size)?;
        let loss = train_step(model, &input, &target, config.loss, config.learning_rate)?;
        report.iterations = iteration;
        report.final_loss = loss;

        if iteration % config.log_every == 0 {
            info!("iteration {} | loss={:.6e}", iteration, loss);
        } else {
            debug!("iteration {} | loss={:.6e}", iteration, loss);
        }

        if config.loss_tolerance.is_some_and(|tolerance| loss <= tolerance) {
            report.converged = true;
            info!("loss {:.3e} reached tolerance after {} iterations", loss, iteration);
            break;
        }
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layers::Linear;

    fn identity_model() -> Model {
        let weight = Tensor::from_rows(&[vec![1.0]]).unwrap();
        let bias = Tensor::zeros(vec![1]);
        Model::new(vec![Box::new(Linear::from_parameters("fc", weight, bias).unwrap())]).unwrap()
    }

    #[test]
    fn test_train_step_reduces_loss() {
        let mut model = identity_model();
        let x = Tensor::from_rows(&[vec![1.0], vec![2.0]]).unwrap();
        let y = Tensor::from_rows(&[vec![3.0], vec![6.0]]).unwrap();

        let first = train_step(&mut model, &x, &y, LossKind::MeanSquared, 0.05).unwrap();
        let second = train_step(&mut model, &x, &y, LossKind::MeanSquared, 0.05).unwrap();
        assert!(second < first);
    }

    #[test]
    fn test_fit_stops_at_tolerance() {
        let mut model = identity_model();
        let config = TrainingConfig {
            learning_rate: 0.1,
            max_iterations: 10_000,
            batch_size: 4,
            loss_tolerance: Some(1e-10),
            ..TrainingConfig::default()
        };

        let report = fit(&mut model, &config, |rng, batch| {
            let xs: Vec<f64> = (0..batch).map(|_| rng.gen_range_f64(-1.0, 1.0)).collect();
            let ys: Vec<f64> = xs.iter().map(|x| 2.0 * x - 1.0).collect();
            Ok((Tensor::new(vec![batch, 1], xs)?, Tensor::new(vec![batch, 1], ys)?))
        })
        .unwrap();

        assert!(report.converged);
        assert!(report.iterations < config.max_iterations);
        assert!(report.final_loss <= 1e-10);
    }

    #[test]
    fn test_fit_propagates_batch_errors() {
        let mut model = identity_model();
        let config = TrainingConfig::default();
        let result = fit(&mut model, &config, |_, _| {
            Ok((Tensor::zeros(vec![1, 2]), Tensor::zeros(vec![1, 1])))
        });
        assert!(matches!(result, Err(NnError::ShapeMismatch { .. })));
    }
}
