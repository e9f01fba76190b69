mod chunk;
mod files;
mod throughput;

pub use chunk::*;
pub use files::*;
pub use throughput::*;
