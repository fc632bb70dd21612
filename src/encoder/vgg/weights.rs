use super::VggConfig;

/// VGG structure metadata.
pub struct VggStructure {
    pub(super) batch_norm: bool,
    pub(super) url: Option<&'static str>,
    pub(super) name: &'static str,
}

impl VggStructure {
    pub fn to_config(&self) -> VggConfig {
        VggConfig::vgg16(self.batch_norm)
    }
}

pub trait WeightsMeta {
    fn weights(&self) -> VggStructure;
}

/// VGG-16 pre-trained weights.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum Vgg16 {
    Random,
    /// These weights were trained from scratch by using a simplified training recipe.
    /// Top-1 accuracy: 71.592%.
    /// Top-5 accuracy: 90.382%.
    ImageNet1kV1,
}
impl WeightsMeta for Vgg16 {
    fn weights(&self) -> VggStructure {
        let url = match *self {
            Vgg16::Random => None,
            Vgg16::ImageNet1kV1 => Some("https://download.pytorch.org/models/vgg16-397923af.pth"),
        };
        VggStructure {
            batch_norm: false,
            url,
            name: "vgg16",
        }
    }
}

/// VGG-16 with batch normalization pre-trained weights.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum Vgg16Bn {
    Random,
    /// These weights were trained from scratch by using a simplified training recipe.
    /// Top-1 accuracy: 73.360%.
    /// Top-5 accuracy: 91.516%.
    ImageNet1kV1,
}
impl WeightsMeta for Vgg16Bn {
    fn weights(&self) -> VggStructure {
        let url = match *self {
            Vgg16Bn::Random => None,
            Vgg16Bn::ImageNet1kV1 => {
                Some("https://download.pytorch.org/models/vgg16_bn-6c64b313.pth")
            }
        };
        VggStructure {
            batch_norm: true,
            url,
            name: "vgg16_bn",
        }
    }
}
