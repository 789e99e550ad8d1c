//! Ordered solver catalog for lookup and applicability filtering.

use crate::asm_5x10u2v2f1::ConvAsm5x10u2v2f1;
use crate::implicit_gemm_bwd_data_xdlops::ConvHipImplicitGemmBwdDataV1R1Xdlops;
use crate::solution::KernelConfiguration;
use crate::solver::{DynSolver, Solver, TuningHint};
use convdispatch_problem::{CapabilityProbe, ProblemDescriptor};
use std::collections::HashSet;
use std::fmt;
use std::sync::{Arc, OnceLock};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("solver {0} is registered twice")]
    DuplicateSolver(String),

    #[error("no solver named {0} is registered")]
    UnknownSolver(String),

    #[error("solver {solver} is not applicable to problem {problem}")]
    NotApplicable { solver: String, problem: String },
}

/// Collects solvers in registration order before freezing them.
#[derive(Default)]
pub struct RegistryBuilder {
    solvers: Vec<DynSolver>,
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<S>(mut self, solver: S) -> Self
    where
        S: Solver + 'static,
    {
        self.solvers.push(Arc::new(solver));
        self
    }

    pub fn build(self) -> Result<SolverRegistry, RegistryError> {
        let mut seen = HashSet::new();
        for solver in &self.solvers {
            if !seen.insert(solver.name()) {
                return Err(RegistryError::DuplicateSolver(solver.name().to_string()));
            }
        }
        Ok(SolverRegistry {
            solvers: self.solvers,
        })
    }
}

/// Immutable, ordered set of solvers.
///
/// Registration order is the tie-break order: when several solvers apply,
/// they are reported in the order they were registered.
#[derive(Clone)]
pub struct SolverRegistry {
    solvers: Vec<DynSolver>,
}

impl fmt::Debug for SolverRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.solvers.iter().map(|solver| solver.name()))
            .finish()
    }
}

impl SolverRegistry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::new()
    }

    pub fn with_default_solvers() -> Self {
        Self {
            solvers: vec![
                Arc::new(ConvAsm5x10u2v2f1::new()),
                Arc::new(ConvHipImplicitGemmBwdDataV1R1Xdlops::new()),
            ],
        }
    }

    /// Process-wide default catalog, built on first use.
    pub fn global() -> &'static SolverRegistry {
        static GLOBAL: OnceLock<SolverRegistry> = OnceLock::new();
        GLOBAL.get_or_init(Self::with_default_solvers)
    }

    pub fn solvers(&self) -> &[DynSolver] {
        &self.solvers
    }

    pub fn len(&self) -> usize {
        self.solvers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.solvers.is_empty()
    }

    pub fn find(&self, name: &str) -> Option<DynSolver> {
        self.solvers
            .iter()
            .find(|solver| solver.name() == name)
            .map(Arc::clone)
    }

    /// Solvers whose predicate holds, in registration order.
    ///
    /// # Panics
    ///
    /// Panics when `problem` has a non-positive output extent, whatever the
    /// probe or direction.
    pub fn enumerate_applicable(
        &self,
        problem: &ProblemDescriptor,
        probe: &CapabilityProbe,
    ) -> Vec<DynSolver> {
        problem.check_geometry();
        self.solvers
            .iter()
            .filter(|solver| {
                let applicable = solver.is_applicable(problem, probe);
                if !applicable {
                    debug!(solver = solver.name(), arch = probe.arch(), "solver not applicable");
                }
                applicable
            })
            .map(Arc::clone)
            .collect()
    }

    /// Configuration from `solver` for `problem`.
    ///
    /// Re-checks the predicate so a caller contract violation surfaces as
    /// [`RegistryError::NotApplicable`] instead of a configuration for a
    /// kernel that would compute the wrong result.
    pub fn get_solution(
        &self,
        solver: &dyn Solver,
        problem: &ProblemDescriptor,
        probe: &CapabilityProbe,
        hint: Option<&TuningHint>,
    ) -> Result<KernelConfiguration, RegistryError> {
        problem.check_geometry();
        if !solver.is_applicable(problem, probe) {
            return Err(RegistryError::NotApplicable {
                solver: solver.name().to_string(),
                problem: problem.signature(),
            });
        }
        Ok(solver.get_solution(problem, probe, hint))
    }

    pub fn get_solution_by_name(
        &self,
        name: &str,
        problem: &ProblemDescriptor,
        probe: &CapabilityProbe,
        hint: Option<&TuningHint>,
    ) -> Result<KernelConfiguration, RegistryError> {
        let solver = self
            .find(name)
            .ok_or_else(|| RegistryError::UnknownSolver(name.to_string()))?;
        self.get_solution(solver.as_ref(), problem, probe, hint)
    }
}
