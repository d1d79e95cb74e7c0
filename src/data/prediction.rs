use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::classify::ModelKind;

// ---------------------------------------------------------------------------
// Prediction – one class of a model's output distribution
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    pub label: String,
    pub probability: f32,
}

// ---------------------------------------------------------------------------
// TopKRange – slider bounds
// ---------------------------------------------------------------------------

/// Configured bounds of the top-K slider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TopKRange {
    pub min: usize,
    pub max: usize,
    pub initial: usize,
}

impl Default for TopKRange {
    fn default() -> Self {
        Self {
            min: 3,
            max: 20,
            initial: 5,
        }
    }
}

impl TopKRange {
    pub fn clamp(&self, k: usize) -> usize {
        k.clamp(self.min, self.max)
    }

    pub fn is_valid(&self) -> bool {
        self.min >= 1 && self.min <= self.initial && self.initial <= self.max
    }
}

// ---------------------------------------------------------------------------
// Chart – what the bar plot renders
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct ChartBar {
    pub label: String,
    pub probability: f32,
}

/// The `k` most probable classes of one inference, highest first.
#[derive(Debug, Clone, PartialEq)]
pub struct Chart {
    pub model: ModelKind,
    pub bars: Vec<ChartBar>,
}

impl Chart {
    /// Keep the `k` highest probabilities. Equal probabilities keep class order.
    pub fn top_k(model: ModelKind, predictions: Vec<Prediction>, k: usize) -> Self {
        let mut ranked: Vec<(usize, Prediction)> = predictions.into_iter().enumerate().collect();
        ranked.sort_by(|(ia, a), (ib, b)| {
            b.probability
                .partial_cmp(&a.probability)
                .unwrap_or(Ordering::Equal)
                .then(ia.cmp(ib))
        });

        let bars = ranked
            .into_iter()
            .take(k)
            .map(|(_, p)| ChartBar {
                label: p.label,
                probability: p.probability,
            })
            .collect();

        Chart { model, bars }
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }
}
