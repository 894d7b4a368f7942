//! Loss functions
//!
//! Each loss returns the scalar loss and the gradient of that loss with
//! respect to the model output, which seeds `Model::backward`. Averaging over
//! the batch happens here, never inside the layers.

use serde::Deserialize;

use crate::error::{NnError, Result};
use crate::tensor::Tensor;

/// Loss selector used by training configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LossKind {
    #[default]
    MeanSquared,
    SoftmaxCrossEntropy,
}

impl LossKind {
    pub fn compute(self, prediction: &Tensor, target: &Tensor) -> Result<(f64, Tensor)> {
        match self {
            LossKind::MeanSquared => mean_squared_loss(prediction, target),
            LossKind::SoftmaxCrossEntropy => softmax_cross_entropy_loss(prediction, target),
        }
    }
}

fn batch_size(prediction: &Tensor, target: &Tensor, context: &str) -> Result<usize> {
    prediction.expect_same_shape(target, context)?;
    match prediction.shape().first() {
        Some(&batch) if batch > 0 => Ok(batch),
        _ => Err(NnError::shape_mismatch(
            context,
            "non-empty batch",
            prediction.shape(),
        )),
    }
}

/// Mean squared error: `loss = Σ (y - t)² / (2B)`, `grad = (y - t) / B`.
pub fn mean_squared_loss(prediction: &Tensor, target: &Tensor) -> Result<(f64, Tensor)> {
    let batch = batch_size(prediction, target, "mean squared loss")? as f64;

    let diff: Vec<f64> = prediction
        .data()
        .iter()
        .zip(target.data())
        .map(|(y, t)| y - t)
        .collect();
    let loss = diff.iter().map(|d| d * d).sum::<f64>() / (2.0 * batch);
    let grad = Tensor::new(prediction.shape(), diff.iter().map(|d| d / batch).collect())?;

    Ok((loss, grad))
}

/// Softmax followed by cross-entropy against one-hot (or soft) targets `[B, K]`.
///
/// `loss = -Σ t·log(softmax(y)) / B`, `grad = (softmax(y) - t) / B`.
pub fn softmax_cross_entropy_loss(logits: &Tensor, target: &Tensor) -> Result<(f64, Tensor)> {
    let batch = batch_size(logits, target, "softmax cross-entropy loss")?;
    if logits.rank() != 2 {
        return Err(NnError::shape_mismatch(
            "softmax cross-entropy loss",
            "[batch, classes]",
            logits.shape(),
        ));
    }
    let classes = logits.shape()[1];
    let scale = 1.0 / batch as f64;

    let mut loss = 0.0;
    let mut grad = Vec::with_capacity(logits.len());
    for (row, t_row) in logits
        .data()
        .chunks_exact(classes)
        .zip(target.data().chunks_exact(classes))
    {
        // Max-subtraction keeps exp() from overflowing.
        let max = row.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let exps: Vec<f64> = row.iter().map(|v| (v - max).exp()).collect();
        let sum: f64 = exps.iter().sum();

        for (e, &t) in exps.iter().zip(t_row) {
            let p = e / sum;
            if t != 0.0 {
                loss -= t * p.max(f64::MIN_POSITIVE).ln();
            }
            grad.push((p - t) * scale);
        }
    }

    Ok((loss * scale, Tensor::new(logits.shape(), grad)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_mean_squared_loss_values() {
        let y = Tensor::from_rows(&[vec![1.0, 2.0], vec![3.0, 4.0]]).unwrap();
        let t = Tensor::from_rows(&[vec![0.0, 2.0], vec![3.0, 6.0]]).unwrap();
        let (loss, grad) = mean_squared_loss(&y, &t).unwrap();

        // (1 + 0 + 0 + 4) / (2 * 2)
        assert_relative_eq!(loss, 1.25);
        assert_eq!(grad.data(), &[0.5, 0.0, 0.0, -1.0]);
    }

    #[test]
    fn test_mean_squared_loss_shape_mismatch() {
        let y = Tensor::zeros(vec![2, 3]);
        let t = Tensor::zeros(vec![2, 2]);
        assert!(matches!(
            mean_squared_loss(&y, &t),
            Err(NnError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn test_cross_entropy_uniform_logits() {
        let logits = Tensor::zeros(vec![1, 4]);
        let target = Tensor::new(vec![1, 4], vec![0.0, 1.0, 0.0, 0.0]).unwrap();
        let (loss, grad) = softmax_cross_entropy_loss(&logits, &target).unwrap();

        assert_relative_eq!(loss, (4.0f64).ln(), epsilon = 1e-12);
        assert_relative_eq!(grad.data()[0], 0.25, epsilon = 1e-12);
        assert_relative_eq!(grad.data()[1], -0.75, epsilon = 1e-12);
    }

    #[test]
    fn test_cross_entropy_large_logits_stable() {
        let logits = Tensor::new(vec![1, 2], vec![1000.0, 0.0]).unwrap();
        let target = Tensor::new(vec![1, 2], vec![1.0, 0.0]).unwrap();
        let (loss, grad) = softmax_cross_entropy_loss(&logits, &target).unwrap();

        assert!(loss.is_finite());
        assert!(loss < 1e-10);
        assert!(grad.data().iter().all(|g| g.is_finite()));
    }

    #[test]
    fn test_cross_entropy_gradient_rows_sum_to_zero() {
        let logits = Tensor::from_rows(&[vec![0.3, -1.2, 2.0], vec![1.0, 1.0, -0.5]]).unwrap();
        let target = Tensor::from_rows(&[vec![0.0, 0.0, 1.0], vec![1.0, 0.0, 0.0]]).unwrap();
        let (_, grad) = softmax_cross_entropy_loss(&logits, &target).unwrap();

        for row in grad.data().chunks(3) {
            assert_relative_eq!(row.iter().sum::<f64>(), 0.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_loss_kind_dispatch() {
        let y = Tensor::filled(vec![1, 2], 1.0);
        let t = Tensor::zeros(vec![1, 2]);
        let (loss, _) = LossKind::MeanSquared.compute(&y, &t).unwrap();
        assert_relative_eq!(loss, 1.0);
        assert_eq!(LossKind::default(), LossKind::MeanSquared);
    }
}
