//! Convolution problem descriptors and target capability probes.

pub mod capability;
pub mod descriptor;
pub mod types;

pub use capability::*;
pub use descriptor::*;
pub use types::*;
