//! Convolution solver selection and kernel configuration.
//!
//! Given a [`ProblemDescriptor`] and the [`CapabilityProbe`] of the target,
//! the [`SolverRegistry`] reports which kernel families can compute the
//! convolution, and the chosen [`Solver`] emits the [`KernelConfiguration`]
//! (artifact, launch geometry, compile-time parameters, workspace size) the
//! build and launch steps consume. [`Dispatcher`] wraps the registry with
//! tuning records and the "no suitable implementation" report.

pub use convdispatch_dispatch as dispatch;
pub use convdispatch_problem as problem;
pub use convdispatch_solvers as solvers;
pub use convdispatch_tuning as tuning;

pub use convdispatch_dispatch::{DispatchError, DispatchOptions, DispatchPlan, Dispatcher};
pub use convdispatch_problem::{
    CapabilityProbe, DataType, Direction, FeatureToggles, IsaExtension, MetadataVersion,
    ProblemBuilder, ProblemDescriptor, ProblemError, TensorLayout,
};
pub use convdispatch_solvers::{
    CompileParams, DynSolver, KernelArtifact, KernelConfiguration, KernelLanguage, ParamValue,
    RegistryError, Solver, SolverRegistry, TuningHint,
};
pub use convdispatch_tuning::{TuningCache, TuningRecord};
