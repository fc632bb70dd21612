use burn::{
    config::Config,
    module::{Ignored, Module},
    nn::{
        conv::{Conv2d, Conv2dConfig},
        PaddingConfig2d,
    },
    tensor::{backend::Backend, Tensor},
};

use crate::activation::Activation;

#[derive(Module, Debug)]
pub struct SegmentationHead<B: Backend> {
    conv: Conv2d<B>,
    activation: Ignored<Activation>,
}

impl<B: Backend> SegmentationHead<B> {
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let x = self.conv.forward(x);
        self.activation.forward(x)
    }
}

#[derive(Config, Debug)]
pub struct SegmentationHeadConfig {
    in_channels: usize,
    out_channels: usize,
    #[config(default = "[1, 1]")]
    kernel_size: [usize; 2],
    #[config(default = "Activation::Identity")]
    activation: Activation,
}

impl SegmentationHeadConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> SegmentationHead<B> {
        SegmentationHead {
            conv: Conv2dConfig::new([self.in_channels, self.out_channels], self.kernel_size)
                .with_padding(PaddingConfig2d::Same)
                .init(device),
            activation: Ignored(self.activation),
        }
    }
}
