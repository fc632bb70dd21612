use burn::{
    nn::{
        conv::{Conv2d, Conv2dConfig},
        BatchNorm, BatchNormConfig, Initializer, PaddingConfig2d, Relu,
    },
    prelude::*,
};

/// `Conv2d -> [BatchNorm] -> ReLU`, the unit every stage of the network is built from.
#[derive(Module, Debug)]
pub struct Conv2dReLU<B: Backend> {
    conv: Conv2d<B>,
    batchnorm: Option<BatchNorm<B, 2>>,
    relu: Relu,
}

impl<B: Backend> Conv2dReLU<B> {
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let mut x = self.conv.forward(x);

        if let Some(ref batchnorm) = self.batchnorm {
            x = batchnorm.forward(x);
        }

        self.relu.forward(x)
    }
}

#[derive(Config, Debug)]
pub struct Conv2dReLUConfig {
    in_channels: usize,
    out_channels: usize,
    kernel_size: [usize; 2],
    #[config(default = "PaddingConfig2d::Valid")]
    padding: PaddingConfig2d,
    #[config(default = "[1, 1]")]
    stride: [usize; 2],
    #[config(default = "[1, 1]")]
    dilation: [usize; 2],
    #[config(default = true)]
    use_batchnorm: bool,
    #[config(default = true)]
    bias: bool,
    #[config(default = "None")]
    initializer: Option<Initializer>,
}

impl Conv2dReLUConfig {
    /// 3x3 convolution that keeps the spatial size.
    pub fn same_3x3(in_channels: usize, out_channels: usize) -> Self {
        Self::new(in_channels, out_channels, [3, 3]).with_padding(PaddingConfig2d::Explicit(1, 1))
    }

    pub fn init<B: Backend>(&self, device: &B::Device) -> Conv2dReLU<B> {
        let mut conv = Conv2dConfig::new([self.in_channels, self.out_channels], self.kernel_size)
            .with_stride(self.stride)
            .with_dilation(self.dilation)
            .with_padding(self.padding.clone())
            .with_bias(self.bias);
        if let Some(initializer) = self.initializer.clone() {
            conv = conv.with_initializer(initializer);
        }

        Conv2dReLU {
            conv: conv.init(device),
            batchnorm: self
                .use_batchnorm
                .then(|| BatchNormConfig::new(self.out_channels).init(device)),
            relu: Relu::new(),
        }
    }
}
