use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use burn::{
    backend::{ndarray::NdArray, Autodiff},
    data::{
        dataloader::{DataLoader, DataLoaderBuilder},
        dataset::{
            vision::{MnistDataset, MnistItem},
            Dataset,
        },
    },
    module::{AutodiffModule, Module},
    nn::loss::{CrossEntropyLoss, CrossEntropyLossConfig},
    optim::{GradientsParams, Optimizer, SgdConfig},
    record::{DefaultFileRecorder, FullPrecisionSettings},
    tensor::{backend::Backend, ElementConversion, Int, Tensor},
};

use crate::data::{DigitBatch, DigitBatcher, SIDE};
use crate::model::DigitNet;

type InnerBackend = NdArray<f32>;
type TrainBackend = Autodiff<InnerBackend>;

#[derive(Clone, Debug)]
pub struct TrainConfig {
    pub epochs: usize,
    pub batch_size: usize,
    pub learning_rate: f64,
    /// Batches between running-loss reports.
    pub log_every: usize,
    pub seed: u64,
    pub num_workers: usize,
    /// Checkpoint path without extension.
    pub output: PathBuf,
}

#[derive(Clone, Debug)]
pub struct TrainReport {
    pub checkpoint: PathBuf,
    pub correct: usize,
    pub total: usize,
}

impl TrainReport {
    pub fn accuracy(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.correct as f64 / self.total as f64
        }
    }
}

/// Average loss over a window of batches, reset after each report.
#[derive(Default)]
struct RunningLoss {
    sum: f32,
    batches: usize,
}

impl RunningLoss {
    fn record(&mut self, loss: f32) {
        self.sum += loss;
        self.batches += 1;
    }

    fn take_average(&mut self) -> f32 {
        let avg = if self.batches == 0 {
            0.0
        } else {
            self.sum / self.batches as f32
        };
        *self = Self::default();
        avg
    }
}

pub fn train(config: &TrainConfig) -> Result<TrainReport> {
    train_on(config, MnistDataset::train(), MnistDataset::test())
}

/// Trains on `train_set`, saves the checkpoint and scores it on `test_set`.
pub fn train_on<D, T>(config: &TrainConfig, train_set: D, test_set: T) -> Result<TrainReport>
where
    D: Dataset<MnistItem> + 'static,
    T: Dataset<MnistItem> + 'static,
{
    let device = <TrainBackend as Backend>::Device::default();

    let train_loader = DataLoaderBuilder::<TrainBackend, MnistItem, DigitBatch<TrainBackend>>::new(
        DigitBatcher,
    )
    .batch_size(config.batch_size)
    .shuffle(config.seed)
    .num_workers(config.num_workers)
    .build(train_set);

    let mut model = DigitNet::<TrainBackend>::new(&device, 1, SIDE)?;
    let loss_fn = CrossEntropyLossConfig::new().init(&device);
    let mut optimizer = SgdConfig::new().init();

    log::info!(
        "Training for {} epochs on {} images (batch size {})",
        config.epochs,
        train_loader.num_items(),
        config.batch_size
    );

    for epoch in 1..=config.epochs {
        model = run_epoch(model, train_loader.as_ref(), &loss_fn, &mut optimizer, config, epoch);
    }
    log::info!("Finished training");

    let model = model.valid();
    let checkpoint = save(&model, &config.output)?;

    let (correct, total) = evaluate(&model, test_set, config.batch_size, config.num_workers);
    Ok(TrainReport {
        checkpoint,
        correct,
        total,
    })
}

/// One pass over `loader` with a gradient step per batch.
fn run_epoch<O>(
    mut model: DigitNet<TrainBackend>,
    loader: &dyn DataLoader<TrainBackend, DigitBatch<TrainBackend>>,
    loss_fn: &CrossEntropyLoss<TrainBackend>,
    optimizer: &mut O,
    config: &TrainConfig,
    epoch: usize,
) -> DigitNet<TrainBackend>
where
    O: Optimizer<DigitNet<TrainBackend>, TrainBackend>,
{
    let mut running = RunningLoss::default();

    for (step, batch) in loader.iter().enumerate() {
        let logits = model.forward(batch.images);
        let loss = loss_fn.forward(logits, batch.targets);
        running.record(loss.clone().into_scalar().elem::<f32>());

        let grads = GradientsParams::from_grads(loss.backward(), &model);
        model = optimizer.step(config.learning_rate, model, grads);

        if config.log_every > 0 && (step + 1) % config.log_every == 0 {
            log::info!(
                "[{epoch}, {:5}] loss: {:.3}",
                step + 1,
                running.take_average()
            );
        }
    }
    model
}

fn save(model: &DigitNet<InnerBackend>, output: &Path) -> Result<PathBuf> {
    if let Some(dir) = output.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("creating output directory {}", dir.display()))?;
    }
    let recorder = DefaultFileRecorder::<FullPrecisionSettings>::new();
    model
        .clone()
        .save_file(output, &recorder)
        .with_context(|| format!("saving checkpoint {}", output.display()))?;

    let written = output.with_extension("mpk");
    log::info!("Saved checkpoint to {}", written.display());
    Ok(written)
}

fn evaluate<T>(
    model: &DigitNet<InnerBackend>,
    test_set: T,
    batch_size: usize,
    num_workers: usize,
) -> (usize, usize)
where
    T: Dataset<MnistItem> + 'static,
{
    let test_loader = DataLoaderBuilder::<InnerBackend, MnistItem, DigitBatch<InnerBackend>>::new(
        DigitBatcher,
    )
    .batch_size(batch_size)
    .num_workers(num_workers)
    .build(test_set);

    let mut correct = 0;
    let mut total = 0;
    for batch in test_loader.iter() {
        total += batch.targets.dims()[0];
        correct += count_correct(model.forward(batch.images), batch.targets);
    }
    (correct, total)
}

/// Number of rows whose argmax matches the target label.
fn count_correct<B: Backend>(logits: Tensor<B, 2>, targets: Tensor<B, 1, Int>) -> usize {
    let [n] = targets.dims();
    let predicted = logits.argmax(1).reshape([n]);
    let hits = predicted.equal(targets).int().sum().into_scalar().elem::<i64>();
    hits as usize
}

#[cfg(test)]
mod tests {
    use burn::{data::dataset::InMemDataset, tensor::TensorData};

    use super::*;

    type B = InnerBackend;

    /// Digits drawn as a bright row whose position encodes the label.
    fn striped_digits(count: usize) -> InMemDataset<MnistItem> {
        let items = (0..count)
            .map(|i| {
                let label = (i % 10) as u8;
                let mut image = [[0.0f32; SIDE]; SIDE];
                image[2 + 2 * label as usize] = [255.0; SIDE];
                MnistItem { image, label }
            })
            .collect();
        InMemDataset::new(items)
    }

    fn config(output: PathBuf) -> TrainConfig {
        TrainConfig {
            epochs: 1,
            batch_size: 4,
            learning_rate: 0.05,
            log_every: 2,
            seed: 7,
            num_workers: 1,
            output,
        }
    }

    #[test]
    fn one_epoch_updates_parameters() {
        let device = Default::default();
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path().join("net"));

        let loader = DataLoaderBuilder::<TrainBackend, MnistItem, DigitBatch<TrainBackend>>::new(
            DigitBatcher,
        )
        .batch_size(config.batch_size)
        .shuffle(config.seed)
        .build(striped_digits(16));

        let model = DigitNet::<TrainBackend>::new(&device, 1, SIDE).unwrap();
        let loss_fn = CrossEntropyLossConfig::new().init(&device);
        let mut optimizer = SgdConfig::new().init();

        let input = Tensor::<B, 4>::ones([1, 1, SIDE, SIDE], &device);
        let before = model.valid().forward(input.clone()).into_data();

        let model = run_epoch(model, loader.as_ref(), &loss_fn, &mut optimizer, &config, 1);
        let after = model.valid().forward(input).into_data();

        assert_ne!(
            before.to_vec::<f32>().unwrap(),
            after.to_vec::<f32>().unwrap()
        );
    }

    #[test]
    fn training_writes_checkpoint_and_scores_every_test_item() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path().join("nested").join("net"));

        let report = train_on(&config, striped_digits(12), striped_digits(7)).unwrap();

        assert_eq!(report.checkpoint, dir.path().join("nested").join("net.mpk"));
        assert!(report.checkpoint.is_file());
        assert_eq!(report.total, 7);
        assert!(report.correct <= report.total);
    }

    #[test]
    fn counts_matching_argmax() {
        let device = Default::default();
        let logits = Tensor::<B, 2>::from_data(
            TensorData::new(
                vec![
                    0.1f32, 0.9, 0.0, //
                    0.8, 0.1, 0.1, //
                    0.2, 0.3, 0.5,
                ],
                [3, 3],
            ),
            &device,
        );
        let targets = Tensor::<B, 1, Int>::from_data(TensorData::new(vec![1i64, 2, 2], [3]), &device);

        assert_eq!(count_correct(logits, targets), 2);
    }

    #[test]
    fn running_loss_resets_after_report() {
        let mut running = RunningLoss::default();
        running.record(1.0);
        running.record(3.0);
        assert_eq!(running.take_average(), 2.0);
        assert_eq!(running.take_average(), 0.0);
    }

    #[test]
    fn empty_report_has_zero_accuracy() {
        let report = TrainReport {
            checkpoint: PathBuf::from("net.mpk"),
            correct: 0,
            total: 0,
        };
        assert_eq!(report.accuracy(), 0.0);
    }
}
