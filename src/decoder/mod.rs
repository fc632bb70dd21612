mod block;
mod unet;

pub use block::*;
pub use unet::*;
