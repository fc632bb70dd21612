#[cfg(feature = "pretrained")]
mod download;
#[cfg(feature = "pretrained")]
pub(crate) use download::download;

mod error;
pub use error::{LumNetError, LumNetResult};

pub mod activation;
pub mod aspp;
pub mod attention;
pub mod conv2drelu;
pub mod decoder;
pub mod encoder;
pub mod segmentation_head;

mod model;
pub use model::*;
