//! The solver interface every kernel family implements.

use crate::solution::KernelConfiguration;
use convdispatch_problem::{CapabilityProbe, ProblemDescriptor};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Performance parameters recorded by a previous tuning run.
///
/// Opaque to the dispatcher; a tunable solver reads the names it knows and
/// ignores the rest. Neither built-in solver is tunable, so both ignore it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TuningHint {
    values: BTreeMap<String, i64>,
}

impl TuningHint {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: &str, value: i64) -> Self {
        self.values.insert(name.to_string(), value);
        self
    }

    pub fn get(&self, name: &str) -> Option<i64> {
        self.values.get(name).copied()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Stateless strategy for one kernel family.
pub trait Solver: Send + Sync {
    /// Unique, stable identifier; tuning records refer to solvers by it.
    fn name(&self) -> &'static str;

    /// Whether this kernel family computes `problem` correctly on `probe`.
    ///
    /// Pure and deterministic. Ordinary ineligibility is `false`; the only
    /// fault is a problem whose output geometry is non-positive.
    fn is_applicable(&self, problem: &ProblemDescriptor, probe: &CapabilityProbe) -> bool;

    /// Scratch bytes needed beyond the primary buffers.
    fn workspace_size(&self, _problem: &ProblemDescriptor) -> usize {
        0
    }

    /// Build and launch description for `problem`.
    ///
    /// Callers must have seen `is_applicable` return true for the same
    /// problem and probe; the result is meaningless otherwise.
    fn get_solution(
        &self,
        problem: &ProblemDescriptor,
        probe: &CapabilityProbe,
        hint: Option<&TuningHint>,
    ) -> KernelConfiguration;
}

pub type DynSolver = Arc<dyn Solver>;
