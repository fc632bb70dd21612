use burn::prelude::*;

use super::block::{UpBlock, UpBlockConfig};

/// U-Net style decoder over five encoder scales.
///
/// The first block upsamples the deepest feature. Every following block consumes the
/// concatenation of the next shallower skip feature and the running decoder feature.
/// The shallowest skip is not decoded: it is concatenated with the last block's output
/// and handed to the head as is.
#[derive(Module, Debug)]
pub struct UnetDecoder<B: Backend> {
    blocks: Vec<UpBlock<B>>,
}

impl<B: Backend> UnetDecoder<B> {
    /// `skips` are ordered shallowest first and must hold one tensor per block.
    pub fn forward(&self, deepest: Tensor<B, 4>, skips: Vec<Tensor<B, 4>>) -> Tensor<B, 4> {
        let mut skips = skips.into_iter().rev();
        let mut blocks = self.blocks.iter();

        let mut x = match blocks.next() {
            Some(block) => block.forward(deepest),
            None => deepest,
        };
        for (block, skip) in blocks.zip(skips.by_ref()) {
            x = block.forward(Tensor::cat(vec![skip, x], 1));
        }

        match skips.next() {
            Some(skip) => Tensor::cat(vec![skip, x], 1),
            None => x,
        }
    }
}

#[derive(Config, Debug)]
pub struct UnetDecoderConfig {
    /// Channels of the encoder features, shallowest first.
    encoder_channels: Vec<usize>,
    #[config(default = "vec![512, 512, 256, 128]")]
    decoder_channels: Vec<usize>,
}

impl UnetDecoderConfig {
    /// Channels of the tensor handed to the head.
    pub fn out_channels(&self) -> usize {
        let skip = self.encoder_channels.first().copied().unwrap_or(0);
        let decoded = self.decoder_channels.last().copied().unwrap_or(0);
        skip + decoded
    }

    /// Input channels of every block, deepest first.
    pub fn block_in_channels(&self) -> Vec<usize> {
        let mut encoder = self.encoder_channels.iter().rev();
        let deepest = encoder.next().copied().unwrap_or(0);

        std::iter::once(deepest)
            .chain(
                encoder
                    .zip(&self.decoder_channels)
                    .map(|(skip, decoded)| skip + decoded),
            )
            .take(self.decoder_channels.len())
            .collect()
    }

    pub fn init<B: Backend>(&self, device: &B::Device) -> UnetDecoder<B> {
        let blocks = self
            .block_in_channels()
            .into_iter()
            .zip(&self.decoder_channels)
            .map(|(in_channels, &out_channels)| {
                UpBlockConfig::new(in_channels, out_channels).init(device)
            })
            .collect();

        UnetDecoder { blocks }
    }
}

#[cfg(test)]
mod tests {
    use burn::{backend::NdArray, tensor::Distribution};

    use super::*;

    type TestBackend = NdArray<f32>;

    #[test]
    fn vgg_channel_plan() {
        let config = UnetDecoderConfig::new(vec![64, 128, 256, 512, 512]);

        assert_eq!(config.block_in_channels(), vec![512, 1024, 768, 384]);
        assert_eq!(config.out_channels(), 192);
    }

    #[test]
    fn forward_fuses_every_scale() {
        let device = Default::default();
        let config =
            UnetDecoderConfig::new(vec![2, 3, 4, 5, 6]).with_decoder_channels(vec![8, 7, 6, 5]);
        let decoder = config.init::<TestBackend>(&device);

        let skips = vec![
            Tensor::<TestBackend, 4>::random([1, 2, 32, 32], Distribution::Default, &device),
            Tensor::<TestBackend, 4>::random([1, 3, 16, 16], Distribution::Default, &device),
            Tensor::<TestBackend, 4>::random([1, 4, 8, 8], Distribution::Default, &device),
            Tensor::<TestBackend, 4>::random([1, 5, 4, 4], Distribution::Default, &device),
        ];
        let deepest =
            Tensor::<TestBackend, 4>::random([1, 6, 2, 2], Distribution::Default, &device);

        let out = decoder.forward(deepest, skips);
        assert_eq!(out.dims(), [1, config.out_channels(), 32, 32]);
        assert_eq!(config.out_channels(), 7);
    }
}
