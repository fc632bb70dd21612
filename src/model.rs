use burn::{
    module::{AutodiffModule, Devices, ModuleMapper, ModuleVisitor},
    prelude::*,
    record::Record,
    tensor::backend::AutodiffBackend,
};

use crate::{
    activation::Activation,
    aspp::{DenseAspp, DenseAsppConfig},
    attention::{AttentionGate, AttentionGateConfig},
    decoder::{UnetDecoder, UnetDecoderConfig},
    encoder::{
        vgg::{Vgg16, Vgg16Bn, VggConfigPreset},
        Encoder, EncoderConfig,
    },
    segmentation_head::{SegmentationHead, SegmentationHeadConfig},
    LumNetError, LumNetResult,
};

/// Number of encoder stages the network is wired for.
pub const NUM_STAGES: usize = 5;

/// LUMNet: an attention gated U-Net over a pretrained backbone.
///
/// The four shallower encoder features are gated by masks computed from the guide
/// signal, the deepest one goes through a dense ASPP bridge, and a U-Net decoder fuses
/// everything back to the input resolution.
#[derive(Debug, Clone)]
pub struct LumNet<B: Backend, E> {
    pub encoder: E,
    pub gates: Vec<AttentionGate<B>>,
    pub aspp: DenseAspp<B>,
    pub decoder: UnetDecoder<B>,
    pub head: SegmentationHead<B>,
    pub in_channels: usize,
    pub guide_channels: usize,
    pub stride: usize,
}

impl<B: Backend, E: Encoder<Backend = B>> LumNet<B, E> {
    /// Segments `image` (`[batch, in_channels, h, w]`) guided by `guide`
    /// (`[batch, guide_channels, h, w]`), returning `[batch, classes, h, w]`.
    pub fn forward(&self, image: Tensor<B, 4>, guide: Tensor<B, 4>) -> LumNetResult<Tensor<B, 4>> {
        self.check_inputs(&image, &guide)?;

        let mut features = self.encoder.forward(image);
        let produced = features.len();
        let (deepest, features) = match features.pop() {
            Some(deepest) if features.len() == self.gates.len() => (deepest, features),
            _ => {
                return Err(LumNetError::invalid_config(format!(
                    "encoder produced {produced} features, expected {}",
                    self.gates.len() + 1
                )))
            }
        };

        let skips = self
            .gates
            .iter()
            .zip(features)
            .map(|(gate, feature)| gate.forward(feature, guide.clone()))
            .collect();
        let deepest = self.aspp.forward(deepest);

        let x = self.decoder.forward(deepest, skips);
        Ok(self.head.forward(x))
    }

    fn check_inputs(&self, image: &Tensor<B, 4>, guide: &Tensor<B, 4>) -> LumNetResult<()> {
        let image_dims = image.dims();
        let [batch, channels, height, width] = image_dims;

        if channels != self.in_channels
            || height == 0
            || width == 0
            || height % self.stride != 0
            || width % self.stride != 0
        {
            return Err(LumNetError::InvalidTensorShape {
                input: "image",
                expected: format!(
                    "[batch, {}, h, w] with h and w non-zero multiples of {}",
                    self.in_channels, self.stride
                ),
                actual: image_dims,
            });
        }

        let guide_dims = guide.dims();
        if guide_dims != [batch, self.guide_channels, height, width] {
            return Err(LumNetError::InvalidTensorShape {
                input: "guide",
                expected: format!("[{batch}, {}, {height}, {width}]", self.guide_channels),
                actual: guide_dims,
            });
        }

        Ok(())
    }
}

// Implemented manually, because the [`Module`] proc-macro implementation adds an
// unnecessary trait bound for AutodiffModule.
#[derive(Record)]
pub struct LumNetRecord<B: Backend, E>
where
    E: burn::module::Module<B>,
{
    pub encoder: <E as burn::module::Module<B>>::Record,
    pub gates: <Vec<AttentionGate<B>> as burn::module::Module<B>>::Record,
    pub aspp: <DenseAspp<B> as burn::module::Module<B>>::Record,
    pub decoder: <UnetDecoder<B> as burn::module::Module<B>>::Record,
    pub head: <SegmentationHead<B> as burn::module::Module<B>>::Record,
    pub in_channels: <usize as burn::module::Module<B>>::Record,
    pub guide_channels: <usize as burn::module::Module<B>>::Record,
    pub stride: <usize as burn::module::Module<B>>::Record,
}

impl<B: Backend, E: Module<B>> Module<B> for LumNet<B, E> {
    type Record = LumNetRecord<B, E>;
    fn load_record(self, record: Self::Record) -> Self {
        Self {
            encoder: Module::<B>::load_record(self.encoder, record.encoder),
            gates: Module::<B>::load_record(self.gates, record.gates),
            aspp: Module::<B>::load_record(self.aspp, record.aspp),
            decoder: Module::<B>::load_record(self.decoder, record.decoder),
            head: Module::<B>::load_record(self.head, record.head),
            in_channels: Module::<B>::load_record(self.in_channels, record.in_channels),
            guide_channels: Module::<B>::load_record(self.guide_channels, record.guide_channels),
            stride: Module::<B>::load_record(self.stride, record.stride),
        }
    }
    fn into_record(self) -> Self::Record {
        Self::Record {
            encoder: Module::<B>::into_record(self.encoder),
            gates: Module::<B>::into_record(self.gates),
            aspp: Module::<B>::into_record(self.aspp),
            decoder: Module::<B>::into_record(self.decoder),
            head: Module::<B>::into_record(self.head),
            in_channels: Module::<B>::into_record(self.in_channels),
            guide_channels: Module::<B>::into_record(self.guide_channels),
            stride: Module::<B>::into_record(self.stride),
        }
    }
    fn num_params(&self) -> usize {
        Module::<B>::num_params(&self.encoder)
            + Module::<B>::num_params(&self.gates)
            + Module::<B>::num_params(&self.aspp)
            + Module::<B>::num_params(&self.decoder)
            + Module::<B>::num_params(&self.head)
    }
    fn visit<Visitor: ModuleVisitor<B>>(&self, visitor: &mut Visitor) {
        Module::visit(&self.encoder, visitor);
        Module::visit(&self.gates, visitor);
        Module::visit(&self.aspp, visitor);
        Module::visit(&self.decoder, visitor);
        Module::visit(&self.head, visitor);
    }
    fn map<Mapper: ModuleMapper<B>>(self, mapper: &mut Mapper) -> Self {
        Self {
            encoder: Module::<B>::map(self.encoder, mapper),
            gates: Module::<B>::map(self.gates, mapper),
            aspp: Module::<B>::map(self.aspp, mapper),
            decoder: Module::<B>::map(self.decoder, mapper),
            head: Module::<B>::map(self.head, mapper),
            in_channels: self.in_channels,
            guide_channels: self.guide_channels,
            stride: self.stride,
        }
    }
    fn collect_devices(&self, devices: Devices<B>) -> Devices<B> {
        let devices = Module::<B>::collect_devices(&self.encoder, devices);
        let devices = Module::<B>::collect_devices(&self.gates, devices);
        let devices = Module::<B>::collect_devices(&self.aspp, devices);
        let devices = Module::<B>::collect_devices(&self.decoder, devices);
        Module::<B>::collect_devices(&self.head, devices)
    }
    fn to_device(self, device: &B::Device) -> Self {
        Self {
            encoder: Module::<B>::to_device(self.encoder, device),
            gates: Module::<B>::to_device(self.gates, device),
            aspp: Module::<B>::to_device(self.aspp, device),
            decoder: Module::<B>::to_device(self.decoder, device),
            head: Module::<B>::to_device(self.head, device),
            in_channels: self.in_channels,
            guide_channels: self.guide_channels,
            stride: self.stride,
        }
    }
    fn fork(self, device: &B::Device) -> Self {
        Self {
            encoder: Module::<B>::fork(self.encoder, device),
            gates: Module::<B>::fork(self.gates, device),
            aspp: Module::<B>::fork(self.aspp, device),
            decoder: Module::<B>::fork(self.decoder, device),
            head: Module::<B>::fork(self.head, device),
            in_channels: self.in_channels,
            guide_channels: self.guide_channels,
            stride: self.stride,
        }
    }
}

impl<B: AutodiffBackend, E: AutodiffModule<B>> AutodiffModule<B> for LumNet<B, E> {
    type InnerModule = LumNet<B::InnerBackend, <E as AutodiffModule<B>>::InnerModule>;
    fn valid(&self) -> Self::InnerModule {
        LumNet {
            encoder: AutodiffModule::<B>::valid(&self.encoder),
            gates: AutodiffModule::<B>::valid(&self.gates),
            aspp: AutodiffModule::<B>::valid(&self.aspp),
            decoder: AutodiffModule::<B>::valid(&self.decoder),
            head: AutodiffModule::<B>::valid(&self.head),
            in_channels: self.in_channels,
            guide_channels: self.guide_channels,
            stride: self.stride,
        }
    }
}

impl<B: Backend, E: Module<B>> core::fmt::Display for LumNet<B, E> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_fmt(format_args!(
            "{0}[num_params={1}]",
            "LumNet",
            self.num_params()
        ))
    }
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct LumNetConfig<EC> {
    encoder: EC,
    guide_channels: usize,
    classes: usize,
    attention_ratio: usize,
    spatial_kernel_size: usize,
    aspp_inter_channels: [usize; 2],
    aspp_dilations: Vec<usize>,
    aspp_dropout: f64,
    decoder_channels: Vec<usize>,
    activation: Activation,
}

impl LumNetConfig<VggConfigPreset> {
    /// The reference LUMNet: a VGG16-BN backbone, optionally with ImageNet weights.
    pub fn vgg16_bn(pretrained: bool) -> Self {
        let weights = if pretrained {
            Vgg16Bn::ImageNet1kV1
        } else {
            Vgg16Bn::Random
        };
        Self::new(VggConfigPreset::Vgg16Bn(weights))
    }

    /// Same network on a VGG16 backbone without batch normalization.
    pub fn vgg16(pretrained: bool) -> Self {
        let weights = if pretrained {
            Vgg16::ImageNet1kV1
        } else {
            Vgg16::Random
        };
        Self::new(VggConfigPreset::Vgg16(weights))
    }
}

impl<EC> LumNetConfig<EC> {
    pub fn new(encoder: EC) -> Self {
        Self {
            encoder,
            guide_channels: 1,
            classes: 1,
            attention_ratio: 16,
            spatial_kernel_size: 7,
            aspp_inter_channels: [128, 128],
            aspp_dilations: vec![3, 6, 12, 18, 24],
            aspp_dropout: 0.1,
            decoder_channels: vec![512, 512, 256, 128],
            activation: Activation::Identity,
        }
    }

    pub fn with_guide_channels(mut self, guide_channels: usize) -> Self {
        self.guide_channels = guide_channels;
        self
    }

    pub fn with_classes(mut self, classes: usize) -> Self {
        self.classes = classes;
        self
    }

    pub fn with_attention_ratio(mut self, attention_ratio: usize) -> Self {
        self.attention_ratio = attention_ratio;
        self
    }

    pub fn with_spatial_kernel_size(mut self, spatial_kernel_size: usize) -> Self {
        self.spatial_kernel_size = spatial_kernel_size;
        self
    }

    pub fn with_aspp_inter_channels(mut self, aspp_inter_channels: [usize; 2]) -> Self {
        self.aspp_inter_channels = aspp_inter_channels;
        self
    }

    pub fn with_aspp_dilations(mut self, aspp_dilations: Vec<usize>) -> Self {
        self.aspp_dilations = aspp_dilations;
        self
    }

    pub fn with_aspp_dropout(mut self, aspp_dropout: f64) -> Self {
        self.aspp_dropout = aspp_dropout;
        self
    }

    pub fn with_decoder_channels(mut self, decoder_channels: Vec<usize>) -> Self {
        self.decoder_channels = decoder_channels;
        self
    }

    pub fn with_activation(mut self, activation: Activation) -> Self {
        self.activation = activation;
        self
    }

    /// Checks everything that can be checked without allocating parameters.
    pub fn validate<B: Backend>(&self) -> LumNetResult<()>
    where
        EC: EncoderConfig<B>,
    {
        let out_channels = self.encoder.out_channels();
        let reductions = self.encoder.reductions();

        if out_channels.len() != NUM_STAGES || reductions.len() != NUM_STAGES {
            return Err(LumNetError::invalid_config(format!(
                "encoder must provide {NUM_STAGES} stages, got {} channels and {} reductions",
                out_channels.len(),
                reductions.len()
            )));
        }
        // Every decoder block upsamples by exactly 2.
        if reductions[0] != 1 || reductions.windows(2).any(|w| w[1] != 2 * w[0]) {
            return Err(LumNetError::invalid_config(format!(
                "encoder reductions must start at 1 and double per stage, got {reductions:?}"
            )));
        }
        if self.decoder_channels.len() != NUM_STAGES - 1 {
            return Err(LumNetError::invalid_config(format!(
                "decoder needs {} channel counts, got {}",
                NUM_STAGES - 1,
                self.decoder_channels.len()
            )));
        }
        if self.aspp_dilations.is_empty() {
            return Err(LumNetError::invalid_config("dense ASPP needs at least one dilation"));
        }
        if self.spatial_kernel_size % 2 == 0 {
            return Err(LumNetError::invalid_config(format!(
                "spatial attention kernel must be odd, got {}",
                self.spatial_kernel_size
            )));
        }
        if !(0.0..1.0).contains(&self.aspp_dropout) {
            return Err(LumNetError::invalid_config(format!(
                "dense ASPP dropout must lie in [0, 1), got {}",
                self.aspp_dropout
            )));
        }

        let widths = [
            ("encoder", out_channels.as_slice()),
            ("decoder", self.decoder_channels.as_slice()),
            ("dense ASPP", self.aspp_inter_channels.as_slice()),
            ("dense ASPP dilation", self.aspp_dilations.as_slice()),
        ];
        for (name, values) in widths {
            if values.contains(&0) {
                return Err(LumNetError::invalid_config(format!(
                    "{name} values must be non-zero, got {values:?}"
                )));
            }
        }
        if self.encoder.in_channels() == 0
            || self.guide_channels == 0
            || self.classes == 0
            || self.attention_ratio == 0
        {
            return Err(LumNetError::invalid_config(
                "input, guide, class and attention ratio counts must be non-zero",
            ));
        }

        Ok(())
    }

    pub fn init<B: Backend>(&self, device: &B::Device) -> LumNetResult<LumNet<B, EC::Encoder>>
    where
        EC: EncoderConfig<B>,
    {
        self.validate::<B>()?;

        let out_channels = self.encoder.out_channels();
        let reductions = self.encoder.reductions();
        let encoder = self.encoder.init(device)?;

        let gates = out_channels
            .iter()
            .zip(&reductions)
            .take(NUM_STAGES - 1)
            .map(|(&channels, &reduction)| {
                AttentionGateConfig::new(channels, reduction)
                    .with_guide_channels(self.guide_channels)
                    .with_ratio(self.attention_ratio)
                    .with_spatial_kernel_size(self.spatial_kernel_size)
                    .init(device)
            })
            .collect();

        let [inter_channels1, inter_channels2] = self.aspp_inter_channels;
        let aspp = DenseAsppConfig::new(out_channels[NUM_STAGES - 1])
            .with_inter_channels1(inter_channels1)
            .with_inter_channels2(inter_channels2)
            .with_dilations(self.aspp_dilations.clone())
            .with_dropout(self.aspp_dropout)
            .init(device);

        let decoder_config = UnetDecoderConfig::new(out_channels)
            .with_decoder_channels(self.decoder_channels.clone());
        let decoder = decoder_config.init(device);

        let head = SegmentationHeadConfig::new(decoder_config.out_channels(), self.classes)
            .with_activation(self.activation)
            .init(device);

        let model = LumNet {
            encoder,
            gates,
            aspp,
            decoder,
            head,
            in_channels: self.encoder.in_channels(),
            guide_channels: self.guide_channels,
            stride: reductions[NUM_STAGES - 1],
        };
        tracing::debug!(%model, stride = model.stride, "initialized LUMNet");

        Ok(model)
    }
}
