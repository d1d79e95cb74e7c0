//! Trains the small digit CNN on MNIST and reports held-out accuracy.
//!
//! Street-view house-number crops (SVHN, 3×32×32) are the target digits,
//! but this trains on MNIST (1×28×28) because burn ships a loader for it.
//! `DigitNet::new(&device, 3, 32)` builds the SVHN-shaped variant.

mod data;
mod model;
mod training;

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;

use training::{train, TrainConfig};

#[derive(Parser, Debug)]
#[command(
    name = "train-digits",
    about = "Train a LeNet-style digit classifier (Burn + NdArray)",
    long_about = "Train a LeNet-style digit classifier (Burn + NdArray).\n\n\
                  Uses MNIST (1x28x28 grayscale) in place of SVHN street-number \
                  crops (3x32x32), since burn bundles an MNIST downloader."
)]
struct Args {
    /// Passes over the training set
    #[arg(long, default_value_t = 2)]
    epochs: usize,

    #[arg(long, default_value_t = 4)]
    batch_size: usize,

    /// SGD learning rate
    #[arg(long, default_value_t = 0.01)]
    learning_rate: f64,

    /// Report the running loss every N batches
    #[arg(long, default_value_t = 2000)]
    log_every: usize,

    /// Shuffle seed
    #[arg(long, default_value_t = 42)]
    seed: u64,

    #[arg(long, default_value_t = 1)]
    num_workers: usize,

    /// Checkpoint path; `.mpk` is appended
    #[arg(long, default_value = "net")]
    output: PathBuf,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let config = TrainConfig {
        epochs: args.epochs,
        batch_size: args.batch_size,
        learning_rate: args.learning_rate,
        log_every: args.log_every,
        seed: args.seed,
        num_workers: args.num_workers,
        output: args.output,
    };

    let report = train(&config)?;
    println!(
        "Accuracy of the network on the {} test images: {:.1} %",
        report.total,
        100.0 * report.accuracy()
    );
    println!("Checkpoint: {}", report.checkpoint.display());

    Ok(())
}
