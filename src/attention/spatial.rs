use burn::{
    nn::{
        conv::{Conv2d, Conv2dConfig},
        PaddingConfig2d,
    },
    prelude::*,
    tensor::activation::sigmoid,
};

/// Spatial attention: per-pixel importance from the channel-wise mean and max.
///
/// - input: `[batch_size, channels, height, width]`
/// - output: `[batch_size, 1, height, width]`, values in `[0, 1]`
#[derive(Module, Debug)]
pub struct SpatialAttention<B: Backend> {
    conv: Conv2d<B>,
}

impl<B: Backend> SpatialAttention<B> {
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let avg = x.clone().mean_dim(1);
        let max = x.max_dim(1);
        let x = Tensor::cat(vec![avg, max], 1);

        sigmoid(self.conv.forward(x))
    }
}

#[derive(Config, Debug)]
pub struct SpatialAttentionConfig {
    /// Odd kernel size, padded to keep the spatial size.
    #[config(default = 7)]
    kernel_size: usize,
}

impl SpatialAttentionConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> SpatialAttention<B> {
        let padding = self.kernel_size / 2;
        SpatialAttention {
            conv: Conv2dConfig::new([2, 1], [self.kernel_size, self.kernel_size])
                .with_padding(PaddingConfig2d::Explicit(padding, padding))
                .init(device),
        }
    }
}
