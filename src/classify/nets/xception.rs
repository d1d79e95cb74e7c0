use burn::{
    module::Module,
    nn::{
        conv::{Conv2d, Conv2dConfig},
        pool::{AdaptiveAvgPool2d, AdaptiveAvgPool2dConfig, MaxPool2d, MaxPool2dConfig},
        BatchNorm, Linear, LinearConfig, PaddingConfig2d,
    },
    tensor::{activation::relu, backend::Backend, Tensor},
};

use super::{batch_norm, conv, KeyRemaps, Projection};

/// Shape of one residual block of the entry, middle or exit flow.
#[derive(Debug, Clone, Copy)]
struct BlockSpec {
    in_channels: usize,
    out_channels: usize,
    reps: usize,
    stride: usize,
    /// Widen in the first separable conv rather than the last.
    grow_first: bool,
}

const fn spec(in_channels: usize, out_channels: usize, reps: usize, stride: usize, grow_first: bool) -> BlockSpec {
    BlockSpec {
        in_channels,
        out_channels,
        reps,
        stride,
        grow_first,
    }
}

const BLOCKS: [BlockSpec; 12] = [
    spec(64, 128, 2, 2, true),
    spec(128, 256, 2, 2, true),
    spec(256, 728, 2, 2, true),
    spec(728, 728, 3, 1, true),
    spec(728, 728, 3, 1, true),
    spec(728, 728, 3, 1, true),
    spec(728, 728, 3, 1, true),
    spec(728, 728, 3, 1, true),
    spec(728, 728, 3, 1, true),
    spec(728, 728, 3, 1, true),
    spec(728, 728, 3, 1, true),
    spec(728, 1024, 2, 2, false),
];

impl BlockSpec {
    /// `[in, out]` of each separable convolution, in order.
    fn separables(self) -> Vec<[usize; 2]> {
        let (input, output) = (self.in_channels, self.out_channels);
        let mut layers = Vec::with_capacity(self.reps);
        if self.grow_first {
            layers.push([input, output]);
            layers.extend((1..self.reps).map(|_| [output, output]));
        } else {
            layers.extend((1..self.reps).map(|_| [input, input]));
            layers.push([input, output]);
        }
        layers
    }
}

/// Depthwise 3×3 followed by a pointwise 1×1, both without bias.
#[derive(Module, Debug)]
pub struct SeparableConv2d<B: Backend> {
    conv1: Conv2d<B>,
    pointwise: Conv2d<B>,
}

impl<B: Backend> SeparableConv2d<B> {
    fn new(device: &B::Device, [in_channels, out_channels]: [usize; 2]) -> Self {
        let depthwise = Conv2dConfig::new([in_channels, in_channels], [3, 3])
            .with_groups(in_channels)
            .with_padding(PaddingConfig2d::Explicit(1, 1))
            .with_bias(false)
            .init(device);

        Self {
            conv1: depthwise,
            pointwise: conv(device, [in_channels, out_channels], 1, 1, 0, false),
        }
    }

    fn forward(&self, input: Tensor<B, 4>) -> Tensor<B, 4> {
        self.pointwise.forward(self.conv1.forward(input))
    }
}

/// ReLU, separable conv and batch norm, repeated, with a residual connection.
/// Strided blocks end in a max-pool and project the shortcut.
#[derive(Module, Debug)]
pub struct Block<B: Backend> {
    separables: Vec<SeparableConv2d<B>>,
    norms: Vec<BatchNorm<B>>,
    pool: Option<MaxPool2d>,
    skip: Option<Projection<B>>,
}

impl<B: Backend> Block<B> {
    fn new(device: &B::Device, spec: BlockSpec) -> Self {
        let layers = spec.separables();
        let norms = layers.iter().map(|&[_, out]| batch_norm(device, out)).collect();
        let separables = layers
            .into_iter()
            .map(|channels| SeparableConv2d::new(device, channels))
            .collect();

        let pool = (spec.stride != 1).then(|| {
            MaxPool2dConfig::new([3, 3])
                .with_strides([spec.stride, spec.stride])
                .with_padding(PaddingConfig2d::Explicit(1, 1))
                .init()
        });
        let skip = (spec.stride != 1 || spec.in_channels != spec.out_channels).then(|| {
            Projection::new(device, [spec.in_channels, spec.out_channels], spec.stride)
        });

        Self {
            separables,
            norms,
            pool,
            skip,
        }
    }

    /// The first entry-flow block skips the leading ReLU.
    fn forward(&self, input: Tensor<B, 4>, start_with_relu: bool) -> Tensor<B, 4> {
        let residual = match &self.skip {
            Some(projection) => projection.forward(input.clone()),
            None => input.clone(),
        };

        let mut x = input;
        for (i, (separable, norm)) in self.separables.iter().zip(&self.norms).enumerate() {
            if i > 0 || start_with_relu {
                x = relu(x);
            }
            x = norm.forward(separable.forward(x));
        }
        if let Some(pool) = &self.pool {
            x = pool.forward(x);
        }
        x + residual
    }
}

/// Xception: entry flow, eight middle blocks at 728 channels, exit flow.
/// Expects 299×299 input.
#[derive(Module, Debug)]
pub struct Xception<B: Backend> {
    conv1: Conv2d<B>,
    bn1: BatchNorm<B>,
    conv2: Conv2d<B>,
    bn2: BatchNorm<B>,
    blocks: Vec<Block<B>>,
    conv3: SeparableConv2d<B>,
    bn3: BatchNorm<B>,
    conv4: SeparableConv2d<B>,
    bn4: BatchNorm<B>,
    avgpool: AdaptiveAvgPool2d,
    fc: Linear<B>,
}

impl<B: Backend> Xception<B> {
    pub fn new(device: &B::Device, num_classes: usize) -> Self {
        Self {
            conv1: conv(device, [3, 32], 3, 2, 0, false),
            bn1: batch_norm(device, 32),
            conv2: conv(device, [32, 64], 3, 1, 0, false),
            bn2: batch_norm(device, 64),
            blocks: BLOCKS.iter().map(|&spec| Block::new(device, spec)).collect(),
            conv3: SeparableConv2d::new(device, [1024, 1536]),
            bn3: batch_norm(device, 1536),
            conv4: SeparableConv2d::new(device, [1536, 2048]),
            bn4: batch_norm(device, 2048),
            avgpool: AdaptiveAvgPool2dConfig::new([1, 1]).init(),
            fc: LinearConfig::new(2048, num_classes).init(device),
        }
    }

    pub fn forward(&self, input: Tensor<B, 4>) -> Tensor<B, 2> {
        let x = relu(self.bn1.forward(self.conv1.forward(input)));
        let mut x = relu(self.bn2.forward(self.conv2.forward(x)));
        for (i, block) in self.blocks.iter().enumerate() {
            x = block.forward(x, i > 0);
        }
        let x = relu(self.bn3.forward(self.conv3.forward(x)));
        let x = relu(self.bn4.forward(self.conv4.forward(x)));

        let x = self.avgpool.forward(x).flatten::<2>(1, 3);
        self.fc.forward(x)
    }
}

/// timm keeps each block's layers in one `rep` sequence of
/// `[ReLU,] SeparableConv2d, BatchNorm2d, ...` and names the shortcut
/// `skip` / `skipbn`. Older exports call the head `last_linear`.
pub fn pytorch_key_remaps() -> KeyRemaps {
    let mut remaps = Vec::new();
    for (index, spec) in BLOCKS.iter().enumerate() {
        let block = index + 1;
        let target = format!("blocks.{index}");
        // The first block has no leading ReLU in its sequence.
        let offset = usize::from(index > 0);
        for layer in 0..spec.reps {
            let separable = 3 * layer + offset;
            remaps.push((
                format!(r"^block{block}\.rep\.{separable}\."),
                format!("{target}.separables.{layer}."),
            ));
            remaps.push((
                format!(r"^block{block}\.rep\.{}\.", separable + 1),
                format!("{target}.norms.{layer}."),
            ));
        }
        remaps.push((format!(r"^block{block}\.skip\."), format!("{target}.skip.conv.")));
        remaps.push((format!(r"^block{block}\.skipbn\."), format!("{target}.skip.bn.")));
    }
    remaps.push((r"^last_linear\.".into(), "fc.".into()));
    remaps
}
