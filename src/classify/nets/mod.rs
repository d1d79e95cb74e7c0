//! ImageNet classifiers as burn modules.
//!
//! Field names follow the published PyTorch checkpoints (torchvision VGG16
//! and ResNet50, timm's `legacy_xception`), so a `.pth` state dict loads with
//! a handful of key remaps. Native `.mpk` records load directly.

pub mod resnet;
pub mod vgg;
pub mod xception;

use std::path::PathBuf;

use burn::{
    module::Module,
    nn::{
        conv::{Conv2d, Conv2dConfig},
        BatchNorm, BatchNormConfig, PaddingConfig2d,
    },
    record::{DefaultFileRecorder, FullPrecisionSettings, Recorder, RecorderError},
    tensor::{backend::Backend, Tensor},
};
use burn_import::pytorch::{LoadArgs, PyTorchFileRecorder};

pub use resnet::ResNet50;
pub use vgg::Vgg16;
pub use xception::Xception;

use super::ModelKind;

/// Ordered `(pattern, replacement)` regex pairs turning checkpoint keys into
/// module paths.
pub type KeyRemaps = Vec<(String, String)>;

/// `k`×`k` convolution with symmetric zero padding.
pub(crate) fn conv<B: Backend>(
    device: &B::Device,
    channels: [usize; 2],
    kernel: usize,
    stride: usize,
    padding: usize,
    bias: bool,
) -> Conv2d<B> {
    Conv2dConfig::new(channels, [kernel, kernel])
        .with_stride([stride, stride])
        .with_padding(PaddingConfig2d::Explicit(padding, padding))
        .with_bias(bias)
        .init(device)
}

pub(crate) fn batch_norm<B: Backend>(device: &B::Device, features: usize) -> BatchNorm<B> {
    BatchNormConfig::new(features).init(device)
}

/// Strided 1×1 convolution plus batch norm on a residual shortcut.
#[derive(Module, Debug)]
pub struct Projection<B: Backend> {
    conv: Conv2d<B>,
    bn: BatchNorm<B>,
}

impl<B: Backend> Projection<B> {
    pub(crate) fn new(device: &B::Device, channels: [usize; 2], stride: usize) -> Self {
        Self {
            conv: conv(device, channels, 1, stride, 0, false),
            bn: batch_norm(device, channels[1]),
        }
    }

    pub(crate) fn forward(&self, input: Tensor<B, 4>) -> Tensor<B, 4> {
        self.bn.forward(self.conv.forward(input))
    }
}

// ---------------------------------------------------------------------------
// Network – one of the supported architectures
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub enum Network<B: Backend> {
    Xception(Xception<B>),
    Vgg16(Vgg16<B>),
    ResNet50(ResNet50<B>),
}

impl<B: Backend> Network<B> {
    /// Randomly initialised network; weights come from [`Network::load`] or
    /// [`Network::load_pytorch`].
    pub fn new(kind: ModelKind, num_classes: usize, device: &B::Device) -> Self {
        match kind {
            ModelKind::Xception => Network::Xception(Xception::new(device, num_classes)),
            ModelKind::Vgg16 => Network::Vgg16(Vgg16::new(device, num_classes)),
            ModelKind::ResNet50 => Network::ResNet50(ResNet50::new(device, num_classes)),
        }
    }

    /// Replace the parameters with a record written by burn's default file
    /// recorder. `path` is given without the `.mpk` extension.
    pub fn load(self, path: PathBuf, device: &B::Device) -> Result<Self, RecorderError> {
        let recorder = DefaultFileRecorder::<FullPrecisionSettings>::new();
        Ok(match self {
            Network::Xception(net) => Network::Xception(net.load_file(path, &recorder, device)?),
            Network::Vgg16(net) => Network::Vgg16(net.load_file(path, &recorder, device)?),
            Network::ResNet50(net) => Network::ResNet50(net.load_file(path, &recorder, device)?),
        })
    }

    /// Replace the parameters with a PyTorch state dict (`.pth`).
    pub fn load_pytorch(self, path: PathBuf, device: &B::Device) -> Result<Self, RecorderError> {
        Ok(match self {
            Network::Xception(net) => Network::Xception(load_state_dict(
                net,
                path,
                xception::pytorch_key_remaps(),
                device,
            )?),
            Network::Vgg16(net) => {
                Network::Vgg16(load_state_dict(net, path, vgg::pytorch_key_remaps(), device)?)
            }
            Network::ResNet50(net) => Network::ResNet50(load_state_dict(
                net,
                path,
                resnet::pytorch_key_remaps(),
                device,
            )?),
        })
    }

    /// Logits `[batch, num_classes]`.
    pub fn forward(&self, input: Tensor<B, 4>) -> Tensor<B, 2> {
        match self {
            Network::Xception(net) => net.forward(input),
            Network::Vgg16(net) => net.forward(input),
            Network::ResNet50(net) => net.forward(input),
        }
    }
}

fn load_state_dict<B: Backend, M: Module<B>>(
    module: M,
    path: PathBuf,
    remaps: KeyRemaps,
    device: &B::Device,
) -> Result<M, RecorderError> {
    let args = remaps
        .iter()
        .fold(LoadArgs::new(path), |args, (from, to)| args.with_key_remap(from, to));
    let record: M::Record = PyTorchFileRecorder::<FullPrecisionSettings>::default().load(args, device)?;
    Ok(module.load_record(record))
}

/// Applies remaps the way the PyTorch recorder does: every matching pattern
/// in order, each on the output of the previous one.
#[cfg(test)]
pub(crate) fn remap_key(remaps: &[(String, String)], key: &str) -> String {
    remaps.iter().fold(key.to_string(), |key, (from, to)| {
        regex::Regex::new(from)
            .unwrap()
            .replace_all(&key, to.as_str())
            .into_owned()
    })
}
