use burn::{
    nn::{
        conv::{Conv2d, Conv2dConfig},
        pool::{MaxPool2d, MaxPool2dConfig},
        PaddingConfig2d,
    },
    prelude::*,
};

use super::{
    ChannelAttention, ChannelAttentionConfig, SpatialAttention, SpatialAttentionConfig,
};

/// Reweights one encoder feature with masks derived from the guide signal.
///
/// The guide is max-pooled down to the feature's resolution, embedded to the feature's
/// width by a 3x3 conv, and turned into a channel mask and a spatial mask. The feature is
/// multiplied by both.
#[derive(Module, Debug)]
pub struct AttentionGate<B: Backend> {
    pool: Option<MaxPool2d>,
    embed: Conv2d<B>,
    channel: ChannelAttention<B>,
    spatial: SpatialAttention<B>,
}

impl<B: Backend> AttentionGate<B> {
    /// Gate `feature` of shape `[batch, channels, h, w]` with a full resolution `guide`.
    pub fn forward(&self, feature: Tensor<B, 4>, guide: Tensor<B, 4>) -> Tensor<B, 4> {
        let (channel, spatial) = self.masks(guide);
        feature * channel * spatial
    }

    /// Channel mask `[batch, channels, 1, 1]` and spatial mask `[batch, 1, h, w]`.
    pub fn masks(&self, guide: Tensor<B, 4>) -> (Tensor<B, 4>, Tensor<B, 4>) {
        let embedded = self.embed.forward(self.pool_guide(guide));

        (
            self.channel.forward(embedded.clone()),
            self.spatial.forward(embedded),
        )
    }

    fn pool_guide(&self, guide: Tensor<B, 4>) -> Tensor<B, 4> {
        match &self.pool {
            Some(pool) => pool.forward(guide),
            None => guide,
        }
    }
}

#[derive(Config, Debug)]
pub struct AttentionGateConfig {
    /// Width of the gated feature.
    channels: usize,
    /// Stride of the gated feature relative to the guide.
    reduction: usize,
    #[config(default = 1)]
    guide_channels: usize,
    #[config(default = 16)]
    ratio: usize,
    #[config(default = 7)]
    spatial_kernel_size: usize,
}

impl AttentionGateConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> AttentionGate<B> {
        let pool = (self.reduction > 1).then(|| {
            MaxPool2dConfig::new([self.reduction, self.reduction])
                .with_strides([self.reduction, self.reduction])
                .init()
        });

        AttentionGate {
            pool,
            embed: Conv2dConfig::new([self.guide_channels, self.channels], [3, 3])
                .with_padding(PaddingConfig2d::Explicit(1, 1))
                .init(device),
            channel: ChannelAttentionConfig::new(self.channels)
                .with_ratio(self.ratio)
                .init(device),
            spatial: SpatialAttentionConfig::new()
                .with_kernel_size(self.spatial_kernel_size)
                .init(device),
        }
    }
}

#[cfg(test)]
mod tests {
    use burn::{backend::NdArray, tensor::Distribution};

    use super::*;

    type TestBackend = NdArray<f32>;

    #[test]
    fn full_resolution_gate_skips_pooling() {
        let device = Default::default();
        let gate = AttentionGateConfig::new(16, 1).init::<TestBackend>(&device);
        assert!(gate.pool.is_none());

        let feature =
            Tensor::<TestBackend, 4>::random([2, 16, 8, 8], Distribution::Default, &device);
        let guide = Tensor::<TestBackend, 4>::random([2, 1, 8, 8], Distribution::Default, &device);

        assert_eq!(gate.forward(feature, guide).dims(), [2, 16, 8, 8]);
    }

    #[test]
    fn guide_is_pooled_to_feature_resolution() {
        let device = Default::default();
        let gate = AttentionGateConfig::new(32, 4).init::<TestBackend>(&device);

        let guide =
            Tensor::<TestBackend, 4>::random([1, 1, 16, 16], Distribution::Default, &device);
        let (channel, spatial) = gate.masks(guide.clone());
        assert_eq!(channel.dims(), [1, 32, 1, 1]);
        assert_eq!(spatial.dims(), [1, 1, 4, 4]);

        let feature =
            Tensor::<TestBackend, 4>::random([1, 32, 4, 4], Distribution::Default, &device);
        assert_eq!(gate.forward(feature, guide).dims(), [1, 32, 4, 4]);
    }

    #[test]
    fn guide_is_max_pooled() {
        let device = Default::default();
        let gate = AttentionGateConfig::new(4, 2).init::<TestBackend>(&device);

        let guide = Tensor::<TestBackend, 4>::from_floats(
            [[[
                [1.0, 5.0, -2.0, 0.0],
                [3.0, 2.0, -1.0, -4.0],
                [0.5, 0.0, 7.0, 6.0],
                [0.0, -3.0, 2.0, 9.0],
            ]]],
            &device,
        );
        let pooled = Tensor::<TestBackend, 4>::from_floats([[[[5.0, 0.0], [0.5, 9.0]]]], &device);

        let diff = (gate.pool_guide(guide.clone()) - pooled.clone())
            .abs()
            .max()
            .into_scalar();
        assert_eq!(diff, 0.0);

        // Same weights at full resolution, fed the pooled guide by hand.
        let unpooled = AttentionGate {
            pool: None,
            ..gate.clone()
        };
        let (channel, spatial) = gate.masks(guide);
        let (expected_channel, expected_spatial) = unpooled.masks(pooled);

        let diff = (channel - expected_channel).abs().max().into_scalar();
        assert!(diff < 1e-6);
        let diff = (spatial - expected_spatial).abs().max().into_scalar();
        assert!(diff < 1e-6);
    }

    #[test]
    fn gating_never_amplifies() {
        let device = Default::default();
        let gate = AttentionGateConfig::new(8, 2)
            .with_ratio(2)
            .init::<TestBackend>(&device);

        let feature = Tensor::<TestBackend, 4>::ones([1, 8, 4, 4], &device);
        let guide = Tensor::<TestBackend, 4>::random(
            [1, 1, 8, 8],
            Distribution::Normal(0.0, 1.0),
            &device,
        );
        let gated = gate.forward(feature, guide);

        assert!(gated.clone().min().into_scalar() >= 0.0);
        assert!(gated.max().into_scalar() <= 1.0);
    }

    #[test]
    fn multi_channel_guide() {
        let device = Default::default();
        let gate = AttentionGateConfig::new(4, 2)
            .with_guide_channels(3)
            .init::<TestBackend>(&device);

        let guide = Tensor::<TestBackend, 4>::random([1, 3, 6, 6], Distribution::Default, &device);
        let feature =
            Tensor::<TestBackend, 4>::random([1, 4, 3, 3], Distribution::Default, &device);
        assert_eq!(gate.forward(feature, guide).dims(), [1, 4, 3, 3]);
    }
}
