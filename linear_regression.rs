use std::env;
use std::process;

use log::{error, info};
use sequential_nn::config::{load_config, TrainingConfig};
use sequential_nn::layers::{Layer, Linear};
use sequential_nn::train::fit;
use sequential_nn::utils::SimpleRng;
use sequential_nn::{Model, Result, Tensor};

// Learns a known affine map y = xW + b with a single Linear layer.
const NUM_INPUTS: usize = 2;
const NUM_OUTPUTS: usize = 3;
const NUM_SAMPLES: usize = 500;
// Inputs are integers in [0, MAX_INPUT).
const MAX_INPUT: usize = 10;

const TRUE_WEIGHT: [[f64; NUM_OUTPUTS]; NUM_INPUTS] = [[3.0, 7.0, 4.0], [5.0, 2.0, 6.0]];
const TRUE_BIAS: [f64; NUM_OUTPUTS] = [2.0, 9.0, 3.0];

// Defaults when no config file is given.
fn default_config() -> TrainingConfig {
    TrainingConfig {
        learning_rate: 0.01,
        max_iterations: 200_000,
        batch_size: 2,
        seed: 42,
        loss_tolerance: Some(1e-15),
        log_every: 1000,
        ..TrainingConfig::default()
    }
}

// Apply the true map to one sample.
fn affine(x: &[f64]) -> Vec<f64> {
    (0..NUM_OUTPUTS)
        .map(|o| TRUE_BIAS[o] + (0..NUM_INPUTS).map(|i| x[i] * TRUE_WEIGHT[i][o]).sum::<f64>())
        .collect()
}

// Fixed dataset of integer inputs and their exact targets.
fn generate_dataset(rng: &mut SimpleRng) -> (Vec<Vec<f64>>, Vec<Vec<f64>>) {
    let inputs: Vec<Vec<f64>> = (0..NUM_SAMPLES)
        .map(|_| (0..NUM_INPUTS).map(|_| rng.gen_usize(MAX_INPUT) as f64).collect())
        .collect();
    let targets = inputs.iter().map(|x| affine(x)).collect();
    (inputs, targets)
}

fn run(config: TrainingConfig) -> Result<()> {
    let mut rng = SimpleRng::new(config.seed);
    let (inputs, targets) = generate_dataset(&mut rng);

    let layer = Linear::new("linear", NUM_INPUTS, NUM_OUTPUTS, &mut rng)?;
    let mut model = Model::new(vec![Box::new(layer)])?;

    // Batches are drawn from a shuffled order, reshuffled after every pass.
    let mut order: Vec<usize> = (0..NUM_SAMPLES).collect();
    let mut cursor = NUM_SAMPLES;

    let report = fit(&mut model, &config, |rng, batch_size| {
        let mut xs = Vec::with_capacity(batch_size * NUM_INPUTS);
        let mut ys = Vec::with_capacity(batch_size * NUM_OUTPUTS);
        for _ in 0..batch_size {
            if cursor == NUM_SAMPLES {
                rng.shuffle_usize(&mut order);
                cursor = 0;
            }
            xs.extend_from_slice(&inputs[order[cursor]]);
            ys.extend_from_slice(&targets[order[cursor]]);
            cursor += 1;
        }
        Ok((
            Tensor::new(vec![batch_size, NUM_INPUTS], xs)?,
            Tensor::new(vec![batch_size, NUM_OUTPUTS], ys)?,
        ))
    })?;

    info!(
        "finished after {} iterations, loss={:.3e}, converged={}",
        report.iterations, report.final_loss, report.converged
    );
    for parameter in model.parameters() {
        info!("{} = {:?}", parameter.name, parameter.value.data());
    }
    if let Some(layer) = model.layer(0) {
        info!("{} parameters in layer '{}'", layer.parameter_count(), layer.name());
    }
    info!("expected weight = {:?}, bias = {:?}", TRUE_WEIGHT, TRUE_BIAS);
    Ok(())
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = match env::args().nth(1) {
        Some(path) => match load_config(&path) {
            Ok(config) => config,
            Err(err) => {
                error!("could not load config {}: {}", path, err);
                process::exit(1);
            }
        },
        None => default_config(),
    };

    if let Err(err) = run(config) {
        error!("training failed: {}", err);
        process::exit(1);
    }
}
