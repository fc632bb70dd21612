use burn::{
    nn::{
        conv::{Conv2d, Conv2dConfig},
        Dropout, DropoutConfig, PaddingConfig2d,
    },
    prelude::*,
};

use crate::conv2drelu::{Conv2dReLU, Conv2dReLUConfig};

/// One branch of the dense pyramid: a 1x1 bottleneck followed by a dilated 3x3 conv.
#[derive(Module, Debug)]
pub struct DenseAsppConv<B: Backend> {
    reduce: Conv2dReLU<B>,
    atrous: Conv2dReLU<B>,
    dropout: Dropout,
}

impl<B: Backend> DenseAsppConv<B> {
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let x = self.reduce.forward(x);
        let x = self.atrous.forward(x);
        // Dropout is a no-op unless the backend tracks gradients.
        self.dropout.forward(x)
    }
}

#[derive(Config, Debug)]
pub struct DenseAsppConvConfig {
    in_channels: usize,
    inter_channels: usize,
    out_channels: usize,
    dilation: usize,
    #[config(default = 0.1)]
    dropout: f64,
}

impl DenseAsppConvConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> DenseAsppConv<B> {
        DenseAsppConv {
            reduce: Conv2dReLUConfig::new(self.in_channels, self.inter_channels, [1, 1])
                .init(device),
            atrous: Conv2dReLUConfig::new(self.inter_channels, self.out_channels, [3, 3])
                .with_dilation([self.dilation, self.dilation])
                .with_padding(PaddingConfig2d::Explicit(self.dilation, self.dilation))
                .init(device),
            dropout: DropoutConfig::new(self.dropout).init(),
        }
    }
}

/// Dense atrous spatial pyramid pooling.
///
/// Branches run with growing dilation rates. Every branch sees the input together with the
/// outputs of all previous branches, stacked in front of it along the channel axis, and a
/// final 1x1 conv projects the stack back to the input width. Shape is preserved:
///
/// - input: `[batch_size, in_channels, height, width]`
/// - output: `[batch_size, in_channels, height, width]`
#[derive(Module, Debug)]
pub struct DenseAspp<B: Backend> {
    branches: Vec<DenseAsppConv<B>>,
    project: Conv2d<B>,
}

impl<B: Backend> DenseAspp<B> {
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let x = self.branches.iter().fold(x, |x, branch| {
            let out = branch.forward(x.clone());
            Tensor::cat(vec![out, x], 1)
        });

        self.project.forward(x)
    }
}

#[derive(Config, Debug)]
pub struct DenseAsppConfig {
    in_channels: usize,
    #[config(default = 128)]
    inter_channels1: usize,
    #[config(default = 128)]
    inter_channels2: usize,
    #[config(default = "vec![3, 6, 12, 18, 24]")]
    dilations: Vec<usize>,
    #[config(default = 0.1)]
    dropout: f64,
}

impl DenseAsppConfig {
    /// Channels entering the final projection.
    pub fn stacked_channels(&self) -> usize {
        self.in_channels + self.inter_channels2 * self.dilations.len()
    }

    pub fn init<B: Backend>(&self, device: &B::Device) -> DenseAspp<B> {
        let branches = self
            .dilations
            .iter()
            .enumerate()
            .map(|(i, &dilation)| {
                DenseAsppConvConfig::new(
                    self.in_channels + self.inter_channels2 * i,
                    self.inter_channels1,
                    self.inter_channels2,
                    dilation,
                )
                .with_dropout(self.dropout)
                .init(device)
            })
            .collect();

        DenseAspp {
            branches,
            project: Conv2dConfig::new([self.stacked_channels(), self.in_channels], [1, 1])
                .init(device),
        }
    }
}

#[cfg(test)]
mod tests {
    use burn::{
        backend::{Autodiff, NdArray},
        tensor::Distribution,
    };

    use super::*;

    type TestBackend = NdArray<f32>;

    #[test]
    fn default_pyramid_matches_lumnet_bridge() {
        let config = DenseAsppConfig::new(512);

        assert_eq!(config.dilations, vec![3, 6, 12, 18, 24]);
        assert_eq!(config.stacked_channels(), 512 + 128 * 5);
    }

    #[test]
    fn branches_grow_their_input_width() {
        let device = Default::default();
        let aspp = DenseAsppConfig::new(16)
            .with_inter_channels1(8)
            .with_inter_channels2(4)
            .init::<TestBackend>(&device);

        let x = Tensor::<TestBackend, 4>::random([1, 16, 4, 4], Distribution::Default, &device);
        let mut x = x;
        for (i, branch) in aspp.branches.iter().enumerate() {
            assert_eq!(x.dims()[1], 16 + 4 * i);
            let out = branch.forward(x.clone());
            assert_eq!(out.dims(), [1, 4, 4, 4]);
            x = Tensor::cat(vec![out, x], 1);
        }
        assert_eq!(x.dims(), [1, 36, 4, 4]);
    }

    #[test]
    fn forward_preserves_shape() {
        let device = Default::default();
        let aspp = DenseAsppConfig::new(16)
            .with_inter_channels1(8)
            .with_inter_channels2(8)
            .init::<TestBackend>(&device);

        let x = Tensor::<TestBackend, 4>::random([2, 16, 3, 5], Distribution::Default, &device);
        assert_eq!(aspp.forward(x).dims(), [2, 16, 3, 5]);
    }

    #[test]
    fn custom_dilations_change_branch_count() {
        let device = Default::default();
        let aspp = DenseAsppConfig::new(8)
            .with_inter_channels1(4)
            .with_inter_channels2(4)
            .with_dilations(vec![1, 2])
            .init::<TestBackend>(&device);

        assert_eq!(aspp.branches.len(), 2);
        let x = Tensor::<TestBackend, 4>::random([1, 8, 6, 6], Distribution::Default, &device);
        assert_eq!(aspp.forward(x).dims(), [1, 8, 6, 6]);
    }

    #[test]
    fn dropout_only_applies_while_training() {
        let device = Default::default();
        let config = DenseAsppConvConfig::new(4, 4, 4, 1).with_dropout(0.9);

        let eval = config.init::<TestBackend>(&device);
        let x = Tensor::<TestBackend, 4>::ones([1, 4, 4, 4], &device);
        let first = eval.forward(x.clone());
        let second = eval.forward(x);
        first.into_data().assert_eq(&second.into_data(), true);

        let train = config.init::<Autodiff<TestBackend>>(&device);
        let x = Tensor::<Autodiff<TestBackend>, 4>::ones([1, 4, 4, 4], &device);
        assert_eq!(train.forward(x).dims(), [1, 4, 4, 4]);
    }
}
