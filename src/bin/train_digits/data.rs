use burn::{
    data::{dataloader::batcher::Batcher, dataset::vision::MnistItem},
    tensor::{backend::Backend, Int, Tensor, TensorData},
};

pub const SIDE: usize = 28;

const MEAN: f32 = 0.5;
const STD: f32 = 0.5;

/// Stacked images `[n, 1, 28, 28]` and their digit labels `[n]`.
#[derive(Clone, Debug)]
pub struct DigitBatch<B: Backend> {
    pub images: Tensor<B, 4>,
    pub targets: Tensor<B, 1, Int>,
}

/// Scales raw 0..=255 pixels into [-1, 1].
#[derive(Clone, Debug, Default)]
pub struct DigitBatcher;

fn normalize(pixel: f32) -> f32 {
    (pixel / 255.0 - MEAN) / STD
}

impl<B: Backend> Batcher<B, MnistItem, DigitBatch<B>> for DigitBatcher {
    fn batch(&self, items: Vec<MnistItem>, device: &B::Device) -> DigitBatch<B> {
        let n = items.len();
        let mut pixels = Vec::with_capacity(n * SIDE * SIDE);
        let mut labels: Vec<i64> = Vec::with_capacity(n);

        for item in items {
            pixels.extend(item.image.iter().flatten().map(|&p| normalize(p)));
            labels.push(item.label as i64);
        }

        let images =
            Tensor::<B, 4>::from_data(TensorData::new(pixels, [n, 1, SIDE, SIDE]), device);
        let targets = Tensor::<B, 1, Int>::from_data(TensorData::new(labels, [n]), device);

        DigitBatch { images, targets }
    }
}

#[cfg(test)]
mod tests {
    use burn::backend::ndarray::NdArray;

    use super::*;

    type B = NdArray<f32>;

    fn item(fill: f32, label: u8) -> MnistItem {
        MnistItem {
            image: [[fill; SIDE]; SIDE],
            label,
        }
    }

    #[test]
    fn stacks_items_into_single_channel_batch() {
        let device = Default::default();
        let batch: DigitBatch<B> =
            DigitBatcher.batch(vec![item(0.0, 3), item(255.0, 7)], &device);

        assert_eq!(batch.images.dims(), [2, 1, SIDE, SIDE]);
        assert_eq!(batch.targets.dims(), [2]);

        let targets: Vec<i64> = batch.targets.into_data().iter::<i64>().collect();
        assert_eq!(targets, vec![3, 7]);
    }

    #[test]
    fn pixels_map_to_symmetric_range() {
        assert_eq!(normalize(0.0), -1.0);
        assert_eq!(normalize(255.0), 1.0);
        assert!(normalize(127.5).abs() < 1e-6);
    }
}
