use anyhow::{anyhow, Result};
use burn::{
    module::Module,
    nn::{
        conv::{Conv2d, Conv2dConfig},
        pool::{MaxPool2d, MaxPool2dConfig},
        Linear, LinearConfig,
    },
    tensor::{activation::relu, backend::Backend, Tensor},
};

pub const NUM_CLASSES: usize = 10;

/// Small LeNet-style CNN for single-channel digit images.
#[derive(Module, Debug)]
pub struct DigitNet<B: Backend> {
    conv1: Conv2d<B>,
    conv2: Conv2d<B>,
    pool: MaxPool2d,
    fc1: Linear<B>,
    fc2: Linear<B>,
    fc3: Linear<B>,
}

impl<B: Backend> DigitNet<B> {
    /// `side` is the height and width of the (square) input.
    pub fn new(device: &B::Device, channels: usize, side: usize) -> Result<Self> {
        let after = feature_side(side)
            .ok_or_else(|| anyhow!("input side {side} is too small for DigitNet"))?;

        Ok(Self {
            conv1: Conv2dConfig::new([channels, 6], [3, 3]).init(device),
            conv2: Conv2dConfig::new([6, 16], [4, 4]).init(device),
            pool: MaxPool2dConfig::new([2, 2]).with_strides([2, 2]).init(),
            fc1: LinearConfig::new(16 * after * after, 120).init(device),
            fc2: LinearConfig::new(120, 84).init(device),
            fc3: LinearConfig::new(84, NUM_CLASSES).init(device),
        })
    }

    /// Logits `[batch, 10]`.
    pub fn forward(&self, input: Tensor<B, 4>) -> Tensor<B, 2> {
        let x = self.pool.forward(relu(self.conv1.forward(input)));
        let x = self.pool.forward(relu(self.conv2.forward(x)));

        let x = x.flatten::<2>(1, 3);
        let x = relu(self.fc1.forward(x));
        let x = relu(self.fc2.forward(x));
        self.fc3.forward(x)
    }
}

/// Side of the last feature map: valid 3×3 conv, pool /2, valid 4×4 conv,
/// pool /2. `None` when the input is too small to survive.
fn feature_side(side: usize) -> Option<usize> {
    let after = (side.checked_sub(2)? / 2).checked_sub(3)? / 2;
    (after > 0).then_some(after)
}
