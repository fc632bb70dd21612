use std::path::Path;

use burn::{
    config::Config,
    module::Module,
    record::{FullPrecisionSettings, Recorder},
    tensor::{backend::Backend, Device},
};
use burn_import::pytorch::{LoadArgs, PyTorchFileRecorder};

use crate::{encoder::EncoderConfig, LumNetError, LumNetResult};

use super::{weights::*, Vgg, VggConfig, VggRecord};

#[derive(Debug, Config)]
pub enum VggConfigPreset {
    Vgg16(Vgg16),
    Vgg16Bn(Vgg16Bn),
}

impl VggConfigPreset {
    pub fn vgg_pretrained<B: Backend>(&self, device: &Device<B>) -> LumNetResult<Vgg<B>> {
        let structure = self.structure();
        let config = structure.to_config();
        let model = config.init(device);

        let Some(url) = structure.url else {
            return Ok(model);
        };

        let weight = fetch(structure.name, url)?;
        let record = self.load_weights_record(&config, weight, device)?;
        tracing::debug!(model = structure.name, "loaded pretrained backbone");
        Ok(model.load_record(record))
    }

    fn structure(&self) -> VggStructure {
        match self {
            Self::Vgg16(vgg16) => vgg16.weights(),
            Self::Vgg16Bn(vgg16_bn) => vgg16_bn.weights(),
        }
    }

    /// Load specified pre-trained PyTorch weights as a record.
    fn load_weights_record<B: Backend, P: AsRef<Path>>(
        &self,
        config: &VggConfig,
        torch_weights: P,
        device: &Device<B>,
    ) -> LumNetResult<VggRecord<B>> {
        let load_args = torchvision_key_remap(config)
            .into_iter()
            .fold(
                LoadArgs::new(torch_weights.as_ref().into()),
                |args, (pattern, replacement)| args.with_key_remap(&pattern, &replacement),
            );
        let record = PyTorchFileRecorder::<FullPrecisionSettings>::new().load(load_args, device)?;

        Ok(record)
    }
}

#[cfg(feature = "pretrained")]
fn fetch(name: &'static str, url: &str) -> LumNetResult<std::path::PathBuf> {
    crate::download("vgg", url).map_err(|err| {
        tracing::warn!(model = name, %err, "weights download failed");
        LumNetError::from(err)
    })
}

#[cfg(not(feature = "pretrained"))]
fn fetch(name: &'static str, _url: &str) -> LumNetResult<std::path::PathBuf> {
    Err(LumNetError::PretrainedUnavailable { model: name })
}

/// Key remaps from torchvision's flat `features.{i}` sequence onto the staged layout.
///
/// torchvision lays every stage out as `conv, [bn], relu` repeated, followed by one max
/// pool, all in a single `nn.Sequential`.
fn torchvision_key_remap(config: &VggConfig) -> Vec<(String, String)> {
    let mut remaps = Vec::new();
    let mut index = 0;

    for (s, stage) in config.stages.iter().enumerate() {
        for j in 0..stage.len() {
            remaps.push((
                format!("^features\\.{index}\\.(.+)$"),
                format!("stages.{s}.convs.{j}.conv.$1"),
            ));
            index += 1;

            if config.batch_norm {
                remaps.push((
                    format!("^features\\.{index}\\.(.+)$"),
                    format!("stages.{s}.convs.{j}.batchnorm.$1"),
                ));
                index += 1;
            }

            // relu
            index += 1;
        }

        // maxpool
        index += 1;
    }

    remaps
}

impl<B: Backend> EncoderConfig<B> for VggConfigPreset {
    type Encoder = Vgg<B>;
    fn init(&self, device: &B::Device) -> LumNetResult<Self::Encoder> {
        self.vgg_pretrained(device)
    }
    fn in_channels(&self) -> usize {
        self.structure().to_config().in_channels
    }
    fn out_channels(&self) -> Vec<usize> {
        self.structure().to_config().out_channels()
    }
    fn reductions(&self) -> Vec<usize> {
        let stages = self.structure().to_config().stages.len();
        (0..stages).map(|i| 1 << i).collect()
    }
}

#[cfg(test)]
mod tests {
    use burn::backend::NdArray;

    use super::*;

    type TestBackend = NdArray<f32>;

    fn remap_for<'a>(remaps: &'a [(String, String)], index: usize) -> Vec<&'a str> {
        let pattern = format!("^features\\.{index}\\.(.+)$");
        remaps
            .iter()
            .filter(|(p, _)| *p == pattern)
            .map(|(_, r)| r.as_str())
            .collect()
    }

    #[test]
    fn vgg16_bn_remap_follows_torchvision_indices() {
        let remaps = torchvision_key_remap(&VggConfig::vgg16(true));

        // 13 convs, each with its batch norm
        assert_eq!(remaps.len(), 26);
        assert_eq!(remap_for(&remaps, 0), ["stages.0.convs.0.conv.$1"]);
        assert_eq!(remap_for(&remaps, 1), ["stages.0.convs.0.batchnorm.$1"]);
        assert_eq!(remap_for(&remaps, 7), ["stages.1.convs.0.conv.$1"]);
        assert_eq!(remap_for(&remaps, 24), ["stages.3.convs.0.conv.$1"]);
        assert_eq!(remap_for(&remaps, 41), ["stages.4.convs.2.batchnorm.$1"]);
        // relu and maxpool carry no parameters
        assert!(remap_for(&remaps, 2).is_empty());
        assert!(remap_for(&remaps, 43).is_empty());
    }

    #[test]
    fn vgg16_remap_follows_torchvision_indices() {
        let remaps = torchvision_key_remap(&VggConfig::vgg16(false));

        assert_eq!(remaps.len(), 13);
        assert_eq!(remap_for(&remaps, 2), ["stages.0.convs.1.conv.$1"]);
        assert_eq!(remap_for(&remaps, 5), ["stages.1.convs.0.conv.$1"]);
        assert_eq!(remap_for(&remaps, 28), ["stages.4.convs.2.conv.$1"]);
        assert!(remap_for(&remaps, 4).is_empty());
    }

    #[test]
    fn preset_describes_five_scales() {
        let preset = VggConfigPreset::Vgg16Bn(Vgg16Bn::Random);

        assert_eq!(
            EncoderConfig::<TestBackend>::out_channels(&preset),
            vec![64, 128, 256, 512, 512]
        );
        assert_eq!(
            EncoderConfig::<TestBackend>::reductions(&preset),
            vec![1, 2, 4, 8, 16]
        );
        assert_eq!(EncoderConfig::<TestBackend>::in_channels(&preset), 3);
    }

    #[test]
    fn random_weights_need_no_download() {
        let device = Default::default();
        let model = VggConfigPreset::Vgg16(Vgg16::Random).vgg_pretrained::<TestBackend>(&device);

        assert!(model.is_ok());
    }
}
