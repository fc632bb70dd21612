mod presets;
pub mod vgg;
pub mod weights;

pub use presets::VggConfigPreset;
pub use vgg::*;
pub use weights::*;
