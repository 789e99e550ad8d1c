//! Prior-tuning records for convolution solver selection.

pub mod cache;

pub use cache::*;
