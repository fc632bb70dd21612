use core::f64::consts::SQRT_2;

use burn::{
    config::Config,
    module::Module,
    nn::{
        pool::{MaxPool2d, MaxPool2dConfig},
        Initializer,
    },
    tensor::{backend::Backend, Device, Tensor},
};

use crate::{
    conv2drelu::{Conv2dReLU, Conv2dReLUConfig},
    encoder::Encoder,
};

/// VGG feature extractor.
/// Derived from [torchvision.models.vgg.VGG](https://github.com/pytorch/vision/blob/main/torchvision/models/vgg.py)
///
/// The classifier is dropped and a feature is tapped at the end of every stage, right
/// before the following max pooling layer. A five stage VGG therefore yields features at
/// strides 1, 2, 4, 8 and 16, and the last pooling layer of the torchvision model is
/// never applied.
#[derive(Module, Debug)]
pub struct Vgg<B: Backend> {
    stages: Vec<VggStage<B>>,
    maxpool: MaxPool2d,
}

impl<B: Backend> Encoder for Vgg<B> {
    type Backend = B;
    fn forward(&self, x: Tensor<Self::Backend, 4>) -> Vec<Tensor<Self::Backend, 4>> {
        let mut features = Vec::with_capacity(self.stages.len());

        let mut x = x;
        for (i, stage) in self.stages.iter().enumerate() {
            if i > 0 {
                x = self.maxpool.forward(x);
            }
            x = stage.forward(x);
            features.push(x.clone());
        }

        features
    }
}

/// Consecutive 3x3 convolutions sharing one resolution.
#[derive(Module, Debug)]
pub struct VggStage<B: Backend> {
    convs: Vec<Conv2dReLU<B>>,
}

impl<B: Backend> VggStage<B> {
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        self.convs.iter().fold(x, |x, conv| conv.forward(x))
    }
}

/// [Vgg](Vgg) configuration.
#[derive(Config, Debug)]
pub struct VggConfig {
    /// Output channels of every convolution, grouped by stage.
    pub stages: Vec<Vec<usize>>,
    pub batch_norm: bool,
    #[config(default = 3)]
    pub in_channels: usize,
}

impl VggConfig {
    /// Configuration "D" of the VGG paper, i.e. VGG-16.
    pub fn vgg16(batch_norm: bool) -> Self {
        Self::new(
            vec![
                vec![64, 64],
                vec![128, 128],
                vec![256, 256, 256],
                vec![512, 512, 512],
                vec![512, 512, 512],
            ],
            batch_norm,
        )
    }

    /// Channels of the feature returned for every stage.
    pub fn out_channels(&self) -> Vec<usize> {
        self.stages
            .iter()
            .map(|stage| stage.last().copied().unwrap_or(0))
            .collect()
    }

    /// Initialize a new [Vgg](Vgg) module.
    pub fn init<B: Backend>(&self, device: &Device<B>) -> Vgg<B> {
        // Conv initializer
        let initializer = Initializer::KaimingNormal {
            gain: SQRT_2, // recommended value for ReLU
            fan_out_only: true,
        };

        let mut in_channels = self.in_channels;
        let stages = self
            .stages
            .iter()
            .map(|stage| {
                let convs = stage
                    .iter()
                    .map(|&out_channels| {
                        let conv = Conv2dReLUConfig::same_3x3(in_channels, out_channels)
                            .with_use_batchnorm(self.batch_norm)
                            .with_initializer(Some(initializer.clone()))
                            .init(device);
                        in_channels = out_channels;
                        conv
                    })
                    .collect();
                VggStage { convs }
            })
            .collect();

        Vgg {
            stages,
            maxpool: MaxPool2dConfig::new([2, 2]).with_strides([2, 2]).init(),
        }
    }
}
