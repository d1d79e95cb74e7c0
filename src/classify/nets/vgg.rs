use burn::{
    module::Module,
    nn::{
        conv::Conv2d,
        pool::{MaxPool2d, MaxPool2dConfig},
        Linear, LinearConfig,
    },
    tensor::{activation::relu, backend::Backend, Tensor},
};

use super::{conv, KeyRemaps};

/// Output channels of the 3×3 convolutions, one slice per pooling stage.
const STAGES: [&[usize]; 5] = [
    &[64, 64],
    &[128, 128],
    &[256, 256, 256],
    &[512, 512, 512],
    &[512, 512, 512],
];

/// Spatial side after five 2×2 poolings of a 224×224 input.
const FEATURE_SIDE: usize = 7;
const HIDDEN: usize = 4096;

/// VGG16: thirteen 3×3 convolutions in five pooled stages and three dense
/// layers. Expects 224×224 input.
#[derive(Module, Debug)]
pub struct Vgg16<B: Backend> {
    convs: Vec<Conv2d<B>>,
    pool: MaxPool2d,
    fc1: Linear<B>,
    fc2: Linear<B>,
    fc3: Linear<B>,
}

impl<B: Backend> Vgg16<B> {
    pub fn new(device: &B::Device, num_classes: usize) -> Self {
        let mut in_channels = 3;
        let convs = STAGES
            .iter()
            .flat_map(|stage| stage.iter())
            .map(|&out| {
                let layer = conv(device, [in_channels, out], 3, 1, 1, true);
                in_channels = out;
                layer
            })
            .collect();

        Self {
            convs,
            pool: MaxPool2dConfig::new([2, 2]).with_strides([2, 2]).init(),
            fc1: LinearConfig::new(512 * FEATURE_SIDE * FEATURE_SIDE, HIDDEN).init(device),
            fc2: LinearConfig::new(HIDDEN, HIDDEN).init(device),
            fc3: LinearConfig::new(HIDDEN, num_classes).init(device),
        }
    }

    pub fn forward(&self, input: Tensor<B, 4>) -> Tensor<B, 2> {
        let mut layers = self.convs.iter();
        let mut x = input;
        for stage in STAGES {
            for layer in layers.by_ref().take(stage.len()) {
                x = relu(layer.forward(x));
            }
            x = self.pool.forward(x);
        }

        let x = x.flatten::<2>(1, 3);
        let x = relu(self.fc1.forward(x));
        let x = relu(self.fc2.forward(x));
        self.fc3.forward(x)
    }
}

/// torchvision keeps convolutions, ReLUs and pools in one `features`
/// sequence and the dense layers in `classifier`.
pub fn pytorch_key_remaps() -> KeyRemaps {
    let mut remaps = Vec::new();
    let mut torch_index = 0;
    let mut position = 0;
    for stage in STAGES {
        for _ in stage.iter() {
            remaps.push((
                format!(r"^features\.{torch_index}\."),
                format!("convs.{position}."),
            ));
            // conv, relu
            torch_index += 2;
            position += 1;
        }
        // pool
        torch_index += 1;
    }
    for (torch, fc) in [(0, "fc1"), (3, "fc2"), (6, "fc3")] {
        remaps.push((format!(r"^classifier\.{torch}\."), format!("{fc}.")));
    }
    remaps
}
