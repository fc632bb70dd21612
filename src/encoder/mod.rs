pub mod vgg;

use burn::{
    module::Module,
    tensor::{backend::Backend, Tensor},
};

use crate::LumNetResult;

pub trait Encoder: Module<Self::Backend> {
    type Backend: Backend;
    /// Feature maps of every stage, shallowest first.
    fn forward(&self, x: Tensor<Self::Backend, 4>) -> Vec<Tensor<Self::Backend, 4>>;
}

pub trait EncoderConfig<B: Backend> {
    type Encoder: Encoder<Backend = B>;
    fn init(&self, device: &B::Device) -> LumNetResult<Self::Encoder>;
    fn in_channels(&self) -> usize;
    fn out_channels(&self) -> Vec<usize>;
    /// Downsampling factor of every stage relative to the input.
    fn reductions(&self) -> Vec<usize>;
}
