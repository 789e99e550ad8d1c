//! Convolution solvers: applicability predicates, workspace sizing and
//! kernel configuration generation, plus the registry tying them together.

pub mod asm_5x10u2v2f1;
pub mod implicit_gemm_bwd_data_xdlops;
pub mod params;
pub mod registry;
pub mod solution;
pub mod solver;
pub mod utils;

pub use asm_5x10u2v2f1::*;
pub use implicit_gemm_bwd_data_xdlops::*;
pub use params::*;
pub use registry::*;
pub use solution::*;
pub use solver::*;
