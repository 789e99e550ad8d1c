//! Convolution dispatch: picks a solver for a problem, reports when none
//! applies, and plans workspace and launch configuration.

pub mod options;
pub mod planner;

pub use options::*;
pub use planner::*;
