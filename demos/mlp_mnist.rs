//! Two-layer MLP classifier on MNIST-in-CSV.
//!
//! Dataset: https://www.kaggle.com/datasets/oddrationale/mnist-in-csv
//!
//! Run with: `cargo run --release --example mlp_mnist -- <mnist_train.csv>`

use derivar::autograd::ops::relu_graph;
use derivar::autograd::{backward, AutogradAllocators};
use derivar::data::{CsvDataset, IndexPermutation};
use derivar::io::{save_model, ModelState};
use derivar::nn::Linear;
use derivar::optim::{Optimizer, SGD};
use derivar::train::{cross_entropy_loss_graph, ModelParams};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::process::ExitCode;

const OUTPUT_ITERATION_FREQ: usize = 25;

fn main() -> ExitCode {
    let Some(dataset_path) = std::env::args().nth(1) else {
        eprintln!("Usage: mlp_mnist <mnist_train_dataset_path>");
        return ExitCode::FAILURE;
    };

    match train(&dataset_path) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("training failed: {e}");
            ExitCode::FAILURE
        }
    }
}

fn train(dataset_path: &str) -> derivar::Result<()> {
    let mut rng = StdRng::seed_from_u64(42);
    let allocators = AutogradAllocators::new();

    let batch_size = 64;
    let input_dim = 784;
    let hidden_dim = 512;
    let num_classes = 10;

    let mut train_set = CsvDataset::open(dataset_path)?;
    train_set.standard_scale();

    let linear1 = Linear::new(input_dim, hidden_dim, &allocators)?;
    linear1.xavier_init(&mut rng);
    let linear2 = Linear::new(hidden_dim, num_classes, &allocators)?;
    linear2.xavier_init(&mut rng);

    let mut params = ModelParams::new();
    params.register(linear1.weights());
    params.register(linear1.biases());
    params.register(linear2.weights());
    params.register(linear2.biases());

    let mut optimizer = SGD::new(3e-4, 0.9);

    let epochs = 1;
    for epoch in 0..epochs {
        let mut permutation = IndexPermutation::new(train_set.rows(), &mut rng);
        let mut iteration = 0usize;

        while !permutation.is_exhausted() {
            let indexes = permutation.take(batch_size).to_vec();
            let iter_batch_size = indexes.len();

            let x = allocators.alloc(&[iter_batch_size, input_dim])?;
            let y = allocators.alloc(&[iter_batch_size, 1])?;
            train_set.sample_batch(&indexes, &x, &y)?;

            // ------------- Forward -------------
            let h1 = allocators.alloc(&[iter_batch_size, hidden_dim])?;
            linear1.forward_graph(&x, &h1, &allocators)?;

            let h2 = allocators.alloc(&[iter_batch_size, hidden_dim])?;
            relu_graph(&h1, &h2, &allocators)?;

            let h3 = allocators.alloc(&[iter_batch_size, num_classes])?;
            linear2.forward_graph(&h2, &h3, &allocators)?;

            let z = allocators.alloc(&[1, 1])?;
            cross_entropy_loss_graph(&h3, &y, &z, &allocators)?;

            if iteration % OUTPUT_ITERATION_FREQ == 0 {
                println!("epoch {epoch:02}, iteration {iteration:04} - loss: {:.6}", z.data()[0]);
            }

            // ------------- Backward -------------
            params.zero_grad();
            backward(&z, &allocators)?;
            optimizer.step(params.tensors());

            // Clear iteration allocations
            allocators.free(&x);
            allocators.free(&y);
            allocators.free(&h1);
            allocators.free(&h2);
            allocators.free(&h3);
            allocators.free(&z);

            iteration += 1;
        }
    }

    let state = ModelState::capture(
        "mlp_mnist",
        &[
            ("linear1.weights", linear1.weights()),
            ("linear1.biases", linear1.biases()),
            ("linear2.weights", linear2.weights()),
            ("linear2.biases", linear2.biases()),
        ],
    );
    save_model(&state, "mlp_mnist.json")?;
    println!("saved parameters to mlp_mnist.json");

    linear1.release(&allocators);
    linear2.release(&allocators);
    Ok(())
}
