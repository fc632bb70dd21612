use burn::{
    nn::{
        conv::{Conv2d, Conv2dConfig},
        pool::{AdaptiveAvgPool2d, AdaptiveAvgPool2dConfig},
        Relu,
    },
    prelude::*,
    tensor::activation::sigmoid,
};

/// Channel attention: per-channel importance from globally pooled statistics.
///
/// - input: `[batch_size, channels, height, width]`
/// - output: `[batch_size, channels, 1, 1]`, values in `[0, 1]`
#[derive(Module, Debug)]
pub struct ChannelAttention<B: Backend> {
    avg_pool: AdaptiveAvgPool2d,
    fc1: Conv2d<B>,
    relu: Relu,
    fc2: Conv2d<B>,
}

impl<B: Backend> ChannelAttention<B> {
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let avg = self.avg_pool.forward(x.clone());
        let max = x.max_dim(3).max_dim(2);

        sigmoid(self.shared_mlp(avg) + self.shared_mlp(max))
    }

    fn shared_mlp(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let x = self.fc1.forward(x);
        let x = self.relu.forward(x);
        self.fc2.forward(x)
    }
}

#[derive(Config, Debug)]
pub struct ChannelAttentionConfig {
    channels: usize,
    #[config(default = 16)]
    ratio: usize,
}

impl ChannelAttentionConfig {
    /// Width of the bottleneck, never below one channel.
    pub fn hidden_channels(&self) -> usize {
        (self.channels / self.ratio.max(1)).max(1)
    }

    pub fn init<B: Backend>(&self, device: &B::Device) -> ChannelAttention<B> {
        let hidden = self.hidden_channels();
        ChannelAttention {
            avg_pool: AdaptiveAvgPool2dConfig::new([1, 1]).init(),
            fc1: Conv2dConfig::new([self.channels, hidden], [1, 1])
                .with_bias(false)
                .init(device),
            relu: Relu::new(),
            fc2: Conv2dConfig::new([hidden, self.channels], [1, 1])
                .with_bias(false)
                .init(device),
        }
    }
}
