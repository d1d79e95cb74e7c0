use std::collections::BTreeMap;
use std::fs::File;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use burn::tensor::{activation::softmax, backend::Backend};
use image::DynamicImage;

use super::nets::Network;
use super::preprocess::image_tensor;
use super::{Classify, ClassifyError, ModelKind};
use crate::data::prediction::Prediction;

/// CPU backend, no GPU setup needed.
type InferenceBackend = burn::backend::ndarray::NdArray<f32>;

pub const LABELS_FILE: &str = "labels.json";
/// Extension appended by burn's default file recorder.
pub const WEIGHTS_EXTENSION: &str = "mpk";
/// PyTorch state dicts as published by torchvision and timm.
pub const PYTORCH_EXTENSION: &str = "pth";

/// The pretrained networks found in a models directory, loaded once and
/// shared read-only by every update.
pub struct BurnClassifier {
    device: <InferenceBackend as Backend>::Device,
    labels: Vec<String>,
    networks: BTreeMap<ModelKind, Network<InferenceBackend>>,
}

impl BurnClassifier {
    /// Load `labels.json` and, per model, `<model id>.mpk` or else
    /// `<model id>.pth` from `models_dir`.
    ///
    /// A missing weight file only disables that model; a weight file that
    /// fails to load is an error.
    pub fn load(models_dir: &Path) -> Result<Self> {
        let device = <InferenceBackend as Backend>::Device::default();
        let labels = read_labels(&models_dir.join(LABELS_FILE))?;

        let mut networks = BTreeMap::new();
        for kind in ModelKind::ALL {
            let stem = weights_stem(models_dir, kind);
            let native = stem.with_extension(WEIGHTS_EXTENSION);
            let pytorch = stem.with_extension(PYTORCH_EXTENSION);

            let (file, from_pytorch) = if native.exists() {
                (native, false)
            } else if pytorch.exists() {
                (pytorch, true)
            } else {
                log::warn!(
                    "No weights for {kind} at {} or {}; model disabled",
                    native.display(),
                    pytorch.display()
                );
                continue;
            };

            let untrained = Network::new(kind, labels.len(), &device);
            let network = if from_pytorch {
                untrained.load_pytorch(file.clone(), &device)
            } else {
                untrained.load(stem, &device)
            };
            let network = network
                .with_context(|| format!("loading {kind} weights from {}", file.display()))?;
            log::info!("Loaded {kind} from {}", file.display());
            networks.insert(kind, network);
        }

        if networks.is_empty() {
            log::warn!(
                "No model weights found in {}; every classification will fail",
                models_dir.display()
            );
        }

        Ok(Self {
            device,
            labels,
            networks,
        })
    }

    pub fn available(&self) -> impl Iterator<Item = ModelKind> + '_ {
        self.networks.keys().copied()
    }
}

impl Classify for BurnClassifier {
    fn predict(
        &self,
        image: &DynamicImage,
        model: ModelKind,
    ) -> Result<Vec<Prediction>, ClassifyError> {
        let network = self
            .networks
            .get(&model)
            .ok_or(ClassifyError::ModelUnavailable(model))?;

        let input = image_tensor::<InferenceBackend>(image, model, &self.device);
        let probabilities: Vec<f32> = softmax(network.forward(input), 1)
            .into_data()
            .iter::<f32>()
            .collect();

        if probabilities.len() != self.labels.len() {
            return Err(ClassifyError::LabelMismatch {
                model,
                expected: self.labels.len(),
                got: probabilities.len(),
            });
        }

        Ok(self
            .labels
            .iter()
            .zip(probabilities)
            .map(|(label, probability)| Prediction {
                label: label.clone(),
                probability,
            })
            .collect())
    }
}

/// Weight file path without extension, as burn's recorders expect it.
pub fn weights_stem(models_dir: &Path, model: ModelKind) -> PathBuf {
    models_dir.join(model.id())
}

fn read_labels(path: &Path) -> Result<Vec<String>> {
    let file =
        File::open(path).with_context(|| format!("opening label file {}", path.display()))?;
    let labels: Vec<String> = serde_json::from_reader(file)
        .with_context(|| format!("parsing label file {}", path.display()))?;
    if labels.is_empty() {
        bail!("label file {} is empty", path.display());
    }
    Ok(labels)
}
