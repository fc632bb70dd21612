use burn::{
    prelude::*,
    tensor::ops::{InterpolateMode, InterpolateOptions},
};

use crate::conv2drelu::{Conv2dReLU, Conv2dReLUConfig};

/// Two 3x3 conv-bn-relu layers followed by bilinear upsampling.
#[derive(Module, Debug)]
pub struct UpBlock<B: Backend> {
    conv1: Conv2dReLU<B>,
    conv2: Conv2dReLU<B>,
    scale: usize,
}

impl<B: Backend> UpBlock<B> {
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let x = self.conv1.forward(x);
        let x = self.conv2.forward(x);
        self.upsample(x)
    }

    fn upsample(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let [_, _, height, width] = x.dims();
        burn::tensor::module::interpolate(
            x,
            [height * self.scale, width * self.scale],
            InterpolateOptions::new(InterpolateMode::Bilinear),
        )
    }
}

#[derive(Config, Debug)]
pub struct UpBlockConfig {
    in_channels: usize,
    out_channels: usize,
    #[config(default = 2)]
    scale: usize,
}

impl UpBlockConfig {
    /// Returns the initialized model.
    pub fn init<B: Backend>(&self, device: &B::Device) -> UpBlock<B> {
        UpBlock {
            conv1: Conv2dReLUConfig::same_3x3(self.in_channels, self.out_channels).init(device),
            conv2: Conv2dReLUConfig::same_3x3(self.out_channels, self.out_channels).init(device),
            scale: self.scale,
        }
    }
}

#[cfg(test)]
mod tests {
    use burn::{backend::NdArray, tensor::Distribution};

    use super::*;

    type TestBackend = NdArray<f32>;

    #[test]
    fn doubles_resolution() {
        let device = Default::default();
        let block = UpBlockConfig::new(12, 6).init::<TestBackend>(&device);

        let x = Tensor::<TestBackend, 4>::random([2, 12, 5, 7], Distribution::Default, &device);
        assert_eq!(block.forward(x).dims(), [2, 6, 10, 14]);
    }

    #[test]
    fn upsampling_aligns_corners() {
        let device = Default::default();
        let block = UpBlockConfig::new(1, 1).init::<TestBackend>(&device);

        let x = Tensor::<TestBackend, 4>::from_floats([[[[0.0, 1.0]]]], &device);
        let y = block.upsample(x);
        assert_eq!(y.dims(), [1, 1, 2, 4]);

        let expected = Tensor::<TestBackend, 4>::from_floats(
            [[[
                [0.0, 1.0 / 3.0, 2.0 / 3.0, 1.0],
                [0.0, 1.0 / 3.0, 2.0 / 3.0, 1.0],
            ]]],
            &device,
        );
        let diff = (y - expected).abs().max().into_scalar();
        assert!(diff < 1e-5);
    }

    #[test]
    fn custom_scale() {
        let device = Default::default();
        let block = UpBlockConfig::new(2, 2)
            .with_scale(4)
            .init::<TestBackend>(&device);

        let x = Tensor::<TestBackend, 4>::random([1, 2, 3, 3], Distribution::Default, &device);
        assert_eq!(block.forward(x).dims(), [1, 2, 12, 12]);
    }
}
