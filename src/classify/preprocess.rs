use burn::tensor::{backend::Backend, Tensor, TensorData};
use image::{imageops::FilterType, DynamicImage};

use super::ModelKind;

const CHANNELS: usize = 3;
const IMAGENET_MEAN: [f32; 3] = [0.485, 0.456, 0.406];
const IMAGENET_STD: [f32; 3] = [0.229, 0.224, 0.225];

/// How raw 0..=255 pixel values are mapped before the first convolution.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Normalization {
    /// `x / 127.5 - 1`, i.e. [-1, 1].
    Symmetric,
    /// `(x / 255 - mean) / std` per channel.
    ImageNet,
}

impl Normalization {
    pub fn for_model(model: ModelKind) -> Self {
        match model {
            ModelKind::Xception => Normalization::Symmetric,
            ModelKind::Vgg16 | ModelKind::ResNet50 => Normalization::ImageNet,
        }
    }

    fn apply(self, channel: usize, value: u8) -> f32 {
        let value = value as f32;
        match self {
            Normalization::Symmetric => value / 127.5 - 1.0,
            Normalization::ImageNet => {
                (value / 255.0 - IMAGENET_MEAN[channel]) / IMAGENET_STD[channel]
            }
        }
    }
}

/// Resize to `size`×`size` and lay the pixels out as CHW floats.
pub fn image_to_chw(image: &DynamicImage, size: u32, normalization: Normalization) -> Vec<f32> {
    let mut rgb = image.to_rgb8();
    if rgb.width() != size || rgb.height() != size {
        rgb = image::imageops::resize(&rgb, size, size, FilterType::Lanczos3);
    }

    let side = size as usize;
    let plane = side * side;
    let mut data = vec![0.0f32; CHANNELS * plane];

    for (x, y, pixel) in rgb.enumerate_pixels() {
        let offset = y as usize * side + x as usize;
        for c in 0..CHANNELS {
            data[c * plane + offset] = normalization.apply(c, pixel[c]);
        }
    }

    data
}

/// A single-image batch `[1, 3, size, size]` ready for `model`.
pub fn image_tensor<B: Backend>(
    image: &DynamicImage,
    model: ModelKind,
    device: &B::Device,
) -> Tensor<B, 4> {
    let size = model.input_size();
    let side = size as usize;
    let data = image_to_chw(image, size, Normalization::for_model(model));
    Tensor::<B, 4>::from_data(TensorData::new(data, [1, CHANNELS, side, side]), device)
}
