mod channel;
mod gate;
mod spatial;

pub use channel::*;
pub use gate::*;
pub use spatial::*;
