use burn::{
    module::Module,
    nn::{
        conv::Conv2d,
        pool::{AdaptiveAvgPool2d, AdaptiveAvgPool2dConfig, MaxPool2d, MaxPool2dConfig},
        BatchNorm, Linear, LinearConfig, PaddingConfig2d,
    },
    tensor::{activation::relu, backend::Backend, Tensor},
};

use super::{batch_norm, conv, KeyRemaps, Projection};

const EXPANSION: usize = 4;
/// (bottleneck width, block count, stride of the first block)
const LAYERS: [(usize, usize, usize); 4] = [(64, 3, 1), (128, 4, 2), (256, 6, 2), (512, 3, 2)];

/// 1×1 reduce, 3×3, 1×1 expand, plus the shortcut.
#[derive(Module, Debug)]
pub struct Bottleneck<B: Backend> {
    conv1: Conv2d<B>,
    bn1: BatchNorm<B>,
    conv2: Conv2d<B>,
    bn2: BatchNorm<B>,
    conv3: Conv2d<B>,
    bn3: BatchNorm<B>,
    downsample: Option<Projection<B>>,
}

impl<B: Backend> Bottleneck<B> {
    fn new(device: &B::Device, in_channels: usize, width: usize, stride: usize) -> Self {
        let out_channels = width * EXPANSION;
        let downsample = (stride != 1 || in_channels != out_channels)
            .then(|| Projection::new(device, [in_channels, out_channels], stride));

        Self {
            conv1: conv(device, [in_channels, width], 1, 1, 0, false),
            bn1: batch_norm(device, width),
            conv2: conv(device, [width, width], 3, stride, 1, false),
            bn2: batch_norm(device, width),
            conv3: conv(device, [width, out_channels], 1, 1, 0, false),
            bn3: batch_norm(device, out_channels),
            downsample,
        }
    }

    fn forward(&self, input: Tensor<B, 4>) -> Tensor<B, 4> {
        let identity = match &self.downsample {
            Some(projection) => projection.forward(input.clone()),
            None => input.clone(),
        };

        let x = relu(self.bn1.forward(self.conv1.forward(input)));
        let x = relu(self.bn2.forward(self.conv2.forward(x)));
        let x = self.bn3.forward(self.conv3.forward(x));
        relu(x + identity)
    }
}

/// ResNet-50 with bottleneck layers [3, 4, 6, 3]. Expects 224×224 input.
#[derive(Module, Debug)]
pub struct ResNet50<B: Backend> {
    conv1: Conv2d<B>,
    bn1: BatchNorm<B>,
    maxpool: MaxPool2d,
    layer1: Vec<Bottleneck<B>>,
    layer2: Vec<Bottleneck<B>>,
    layer3: Vec<Bottleneck<B>>,
    layer4: Vec<Bottleneck<B>>,
    avgpool: AdaptiveAvgPool2d,
    fc: Linear<B>,
}

impl<B: Backend> ResNet50<B> {
    pub fn new(device: &B::Device, num_classes: usize) -> Self {
        let mut in_channels = 64;
        let [layer1, layer2, layer3, layer4] = LAYERS.map(|(width, blocks, stride)| {
            (0..blocks)
                .map(|i| {
                    let stride = if i == 0 { stride } else { 1 };
                    let block = Bottleneck::new(device, in_channels, width, stride);
                    in_channels = width * EXPANSION;
                    block
                })
                .collect::<Vec<_>>()
        });

        Self {
            conv1: conv(device, [3, 64], 7, 2, 3, false),
            bn1: batch_norm(device, 64),
            maxpool: MaxPool2dConfig::new([3, 3])
                .with_strides([2, 2])
                .with_padding(PaddingConfig2d::Explicit(1, 1))
                .init(),
            layer1,
            layer2,
            layer3,
            layer4,
            avgpool: AdaptiveAvgPool2dConfig::new([1, 1]).init(),
            fc: LinearConfig::new(512 * EXPANSION, num_classes).init(device),
        }
    }

    pub fn forward(&self, input: Tensor<B, 4>) -> Tensor<B, 2> {
        let x = relu(self.bn1.forward(self.conv1.forward(input)));
        let mut x = self.maxpool.forward(x);
        for layer in [&self.layer1, &self.layer2, &self.layer3, &self.layer4] {
            for block in layer {
                x = block.forward(x);
            }
        }

        let x = self.avgpool.forward(x).flatten::<2>(1, 3);
        self.fc.forward(x)
    }
}

/// torchvision names the shortcut `downsample.0` (conv) and `downsample.1`
/// (batch norm); everything else already lines up.
pub fn pytorch_key_remaps() -> KeyRemaps {
    vec![
        (r"\.downsample\.0\.".into(), ".downsample.conv.".into()),
        (r"\.downsample\.1\.".into(), ".downsample.bn.".into()),
    ]
}
