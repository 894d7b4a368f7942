// End-to-end training tests: full steps through the public API.

use approx::assert_relative_eq;
use sequential_nn::config::TrainingConfig;
use sequential_nn::layers::{Activation, Conv2D, Conv2DConfig, Flatten, Linear, MaxPool2D};
use sequential_nn::loss::LossKind;
use sequential_nn::train::{fit, train_step};
use sequential_nn::utils::SimpleRng;
use sequential_nn::{Model, NnError, Tensor};

const TRUE_WEIGHT: [[f64; 3]; 2] = [[3.0, 7.0, 4.0], [5.0, 2.0, 6.0]];
const TRUE_BIAS: [f64; 3] = [2.0, 9.0, 3.0];

fn regression_batch(rng: &mut SimpleRng, batch: usize) -> (Tensor, Tensor) {
    let mut xs = Vec::with_capacity(batch * 2);
    let mut ys = Vec::with_capacity(batch * 3);
    for _ in 0..batch {
        let x = [rng.gen_range_f64(-1.0, 1.0), rng.gen_range_f64(-1.0, 1.0)];
        xs.extend_from_slice(&x);
        for o in 0..3 {
            ys.push(TRUE_BIAS[o] + x[0] * TRUE_WEIGHT[0][o] + x[1] * TRUE_WEIGHT[1][o]);
        }
    }
    (
        Tensor::new(vec![batch, 2], xs).unwrap(),
        Tensor::new(vec![batch, 3], ys).unwrap(),
    )
}

fn linear_model(rng: &mut SimpleRng) -> Model {
    Model::new(vec![Box::new(Linear::new("linear", 2, 3, rng).unwrap())]).unwrap()
}

#[test]
fn test_linear_regression_recovers_true_parameters() {
    let mut rng = SimpleRng::new(2024);
    let (x, y) = regression_batch(&mut rng, 64);
    let mut model = linear_model(&mut rng);

    let mut loss = f64::INFINITY;
    for _ in 0..3000 {
        loss = train_step(&mut model, &x, &y, LossKind::MeanSquared, 0.1).unwrap();
    }
    assert!(loss < 1e-12, "loss {}", loss);

    let params = model.parameters();
    let weight = params[0].value.data();
    let bias = params[1].value.data();
    for i in 0..2 {
        for o in 0..3 {
            assert_relative_eq!(weight[i * 3 + o], TRUE_WEIGHT[i][o], epsilon = 1e-6);
        }
    }
    for o in 0..3 {
        assert_relative_eq!(bias[o], TRUE_BIAS[o], epsilon = 1e-6);
    }
}

#[test]
fn test_fit_converges_with_fresh_batches() {
    let mut rng = SimpleRng::new(7);
    let mut model = linear_model(&mut rng);
    let config = TrainingConfig {
        learning_rate: 0.1,
        max_iterations: 20_000,
        batch_size: 8,
        loss_tolerance: Some(1e-10),
        ..TrainingConfig::default()
    };

    let report = fit(&mut model, &config, |rng, batch| Ok(regression_batch(rng, batch))).unwrap();
    assert!(report.converged);
    assert!(report.final_loss <= 1e-10);
}

#[test]
fn test_fit_is_reproducible() {
    let config = TrainingConfig {
        learning_rate: 0.05,
        max_iterations: 50,
        batch_size: 4,
        seed: 99,
        ..TrainingConfig::default()
    };
    let run = || {
        let mut rng = SimpleRng::new(1);
        let mut model = linear_model(&mut rng);
        fit(&mut model, &config, |rng, batch| Ok(regression_batch(rng, batch))).unwrap()
    };
    assert_eq!(run(), run());
}

#[test]
fn test_small_cnn_classifier_learns() {
    // Two classes of 4x4 images: bright top half vs bright bottom half.
    let mut rng = SimpleRng::new(31);
    let mut model = Model::new(vec![
        Box::new(Conv2D::new("conv1", Conv2DConfig::new(1, 2), &mut rng).unwrap()),
        Box::new(Activation::tanh()),
        Box::new(MaxPool2D::new(2, 2).unwrap()),
        Box::new(Flatten::new()),
        Box::new(Linear::new("fc", 8, 2, &mut rng).unwrap()),
    ])
    .unwrap();

    let mut images = Vec::new();
    let mut labels = Vec::new();
    for sample in 0..8 {
        let top = sample % 2 == 0;
        for row in 0..4 {
            for _ in 0..4 {
                let bright = (row < 2) == top;
                let noise = rng.gen_range_f64(-0.1, 0.1);
                images.push(if bright { 1.0 + noise } else { noise });
            }
        }
        labels.extend_from_slice(if top { &[1.0, 0.0] } else { &[0.0, 1.0] });
    }
    let x = Tensor::new(vec![8, 1, 4, 4], images).unwrap();
    let y = Tensor::new(vec![8, 2], labels).unwrap();

    let first = train_step(&mut model, &x, &y, LossKind::SoftmaxCrossEntropy, 0.1).unwrap();
    let mut last = first;
    for _ in 0..200 {
        last = train_step(&mut model, &x, &y, LossKind::SoftmaxCrossEntropy, 0.1).unwrap();
    }
    assert!(last < first, "loss went from {} to {}", first, last);
}

#[test]
fn test_divergence_is_reported() {
    let mut rng = SimpleRng::new(3);
    let mut model = linear_model(&mut rng);
    let (x, y) = regression_batch(&mut rng, 16);

    let mut result = Ok(0.0);
    for _ in 0..500 {
        result = train_step(&mut model, &x, &y, LossKind::MeanSquared, 1e3);
        if result.is_err() {
            break;
        }
    }
    assert!(matches!(result, Err(NnError::Configuration(_))));
}
