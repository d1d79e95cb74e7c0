/// Classification layer: model selection, the `Classify` seam and the burn
/// implementation behind it.
///
/// Architecture:
/// ```text
///   DynamicImage + ModelKind
///        │
///        ▼
///   ┌────────────┐
///   │ preprocess │  resize, normalise → [1, 3, H, W]
///   └────────────┘
///        │
///        ▼
///   ┌────────────┐
///   │    nets    │  Xception / VGG16 / ResNet50 → logits
///   └────────────┘
///        │
///        ▼
///   softmax → Vec<Prediction> → top-K Chart
/// ```

pub mod engine;
pub mod nets;
pub mod preprocess;

use std::fmt;
use std::str::FromStr;

use image::DynamicImage;
use serde::{Deserialize, Serialize};

use crate::data::prediction::{Chart, Prediction};

// ---------------------------------------------------------------------------
// ModelKind – the supported pretrained architectures
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelKind {
    Xception,
    Vgg16,
    ResNet50,
}

impl ModelKind {
    pub const ALL: [ModelKind; 3] = [ModelKind::Xception, ModelKind::Vgg16, ModelKind::ResNet50];

    /// Stable identifier used in config files and weight file names.
    pub fn id(self) -> &'static str {
        match self {
            ModelKind::Xception => "xception",
            ModelKind::Vgg16 => "vgg16",
            ModelKind::ResNet50 => "resnet50",
        }
    }

    /// Human readable name for the model selector.
    pub fn label(self) -> &'static str {
        match self {
            ModelKind::Xception => "Xception",
            ModelKind::Vgg16 => "VGG 16",
            ModelKind::ResNet50 => "ResNet 50",
        }
    }

    /// Square input resolution the network was trained on.
    pub fn input_size(self) -> u32 {
        match self {
            ModelKind::Xception => 299,
            ModelKind::Vgg16 | ModelKind::ResNet50 => 224,
        }
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

impl FromStr for ModelKind {
    type Err = ClassifyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ModelKind::ALL
            .into_iter()
            .find(|kind| kind.id().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ClassifyError::UnknownModel(s.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum ClassifyError {
    #[error("unknown model '{0}' (expected one of: xception, vgg16, resnet50)")]
    UnknownModel(String),
    #[error("model {0} has no weights loaded")]
    ModelUnavailable(ModelKind),
    #[error("model {model} produced {got} scores for {expected} labels")]
    LabelMismatch {
        model: ModelKind,
        expected: usize,
        got: usize,
    },
}

// ---------------------------------------------------------------------------
// Classify – image + model → full probability distribution
// ---------------------------------------------------------------------------

/// A pretrained classifier, seen from the dashboard as an opaque capability.
pub trait Classify {
    /// Probability for every known class, in class-index order.
    fn predict(&self, image: &DynamicImage, model: ModelKind)
        -> Result<Vec<Prediction>, ClassifyError>;
}

/// Run one inference and keep the `k` most probable classes.
pub fn classification_chart<C: Classify + ?Sized>(
    classifier: &C,
    image: &DynamicImage,
    model: ModelKind,
    k: usize,
) -> Result<Chart, ClassifyError> {
    let predictions = classifier.predict(image, model)?;
    Ok(Chart::top_k(model, predictions, k))
}
