//! Solver selection and kernel planning.

use crate::options::DispatchOptions;
use anyhow::Result;
use convdispatch_problem::{CapabilityProbe, ProblemDescriptor};
use convdispatch_solvers::{
    DynSolver, KernelConfiguration, RegistryError, Solver, SolverRegistry, TuningHint,
};
use convdispatch_tuning::{TuningCache, TuningRecord};
use rayon::prelude::*;
use serde::Serialize;
use std::fs;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchError {
    #[error("no suitable implementation for problem {problem} on {arch}")]
    NoSuitableImplementation { problem: String, arch: String },

    #[error(transparent)]
    Registry(#[from] RegistryError),
}

/// The chosen solver and everything needed to build and launch its kernel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DispatchPlan {
    pub solver: &'static str,
    pub configuration: KernelConfiguration,
    pub workspace_bytes: usize,
    /// True when the solver came from a tuning record rather than catalog order.
    pub from_cache: bool,
}

pub struct Dispatcher {
    registry: SolverRegistry,
    cache: TuningCache,
    options: DispatchOptions,
}

impl Dispatcher {
    pub fn new(registry: SolverRegistry) -> Self {
        Self::with_cache(registry, TuningCache::new())
    }

    pub fn with_cache(registry: SolverRegistry, cache: TuningCache) -> Self {
        Self {
            registry,
            cache,
            options: DispatchOptions::default(),
        }
    }

    pub fn with_options(registry: SolverRegistry, options: DispatchOptions) -> Result<Self> {
        if let Some(path) = &options.tuning_cache {
            if options.clear_tuning_cache && path.exists() {
                fs::remove_file(path)?;
            }
        }

        let cache = match &options.tuning_cache {
            Some(path) => TuningCache::load_from_file(path)?,
            None => TuningCache::new(),
        };

        Ok(Self {
            registry,
            cache,
            options,
        })
    }

    pub fn registry(&self) -> &SolverRegistry {
        &self.registry
    }

    pub fn cache(&self) -> &TuningCache {
        &self.cache
    }

    pub fn options(&self) -> &DispatchOptions {
        &self.options
    }

    pub fn applicable(&self, problem: &ProblemDescriptor, probe: &CapabilityProbe) -> Vec<DynSolver> {
        self.registry.enumerate_applicable(problem, probe)
    }

    /// Picks a solver for `problem` and generates its configuration.
    ///
    /// A tuning record naming an applicable solver wins; otherwise the first
    /// applicable solver in registration order is used.
    pub fn plan(
        &self,
        problem: &ProblemDescriptor,
        probe: &CapabilityProbe,
    ) -> Result<DispatchPlan, DispatchError> {
        let applicable = self.applicable(problem, probe);
        if applicable.is_empty() {
            return Err(self.no_suitable(problem, probe));
        }

        if self.options.honor_tuning_cache {
            if let Some(record) = self.cache.get(problem) {
                match applicable.iter().find(|solver| solver.name() == record.solver) {
                    Some(solver) => {
                        return Ok(self.build_plan(
                            solver.as_ref(),
                            problem,
                            probe,
                            Some(&record.hint),
                            true,
                        ));
                    }
                    None => warn!(
                        solver = %record.solver,
                        problem = %problem.signature(),
                        "tuned solver is not applicable, using catalog order"
                    ),
                }
            }
        }

        Ok(self.build_plan(applicable[0].as_ref(), problem, probe, None, false))
    }

    /// Plans with a solver chosen by an external ranking.
    pub fn plan_for(
        &self,
        name: &str,
        problem: &ProblemDescriptor,
        probe: &CapabilityProbe,
    ) -> Result<DispatchPlan, DispatchError> {
        let solver = self
            .registry
            .find(name)
            .ok_or_else(|| RegistryError::UnknownSolver(name.to_string()))?;
        problem.check_geometry();
        if !solver.is_applicable(problem, probe) {
            return Err(RegistryError::NotApplicable {
                solver: name.to_string(),
                problem: problem.signature(),
            }
            .into());
        }

        let hint = self
            .cache
            .get(problem)
            .filter(|record| record.solver == name)
            .map(|record| &record.hint);
        Ok(self.build_plan(solver.as_ref(), problem, probe, hint, hint.is_some()))
    }

    /// Largest workspace any applicable solver would need, for allocating
    /// scratch memory before the final choice is made.
    pub fn max_workspace(&self, problem: &ProblemDescriptor, probe: &CapabilityProbe) -> usize {
        self.applicable(problem, probe)
            .iter()
            .map(|solver| solver.workspace_size(problem))
            .max()
            .unwrap_or(0)
    }

    /// Plans every problem in parallel; results keep the input order.
    pub fn plan_batch(
        &self,
        problems: &[ProblemDescriptor],
        probe: &CapabilityProbe,
    ) -> Vec<Result<DispatchPlan, DispatchError>> {
        problems
            .par_iter()
            .map(|problem| self.plan(problem, probe))
            .collect()
    }

    /// Stores the external tuner's choice for `problem`.
    pub fn record_choice(
        &mut self,
        problem: &ProblemDescriptor,
        solver: &str,
        hint: TuningHint,
    ) -> Result<(), DispatchError> {
        if self.registry.find(solver).is_none() {
            return Err(RegistryError::UnknownSolver(solver.to_string()).into());
        }
        self.cache.insert(problem, TuningRecord::new(solver, hint));
        Ok(())
    }

    pub fn persist(&self) -> Result<()> {
        if let Some(path) = &self.options.tuning_cache {
            self.cache.save_to_file(path)?;
        }
        Ok(())
    }

    fn build_plan(
        &self,
        solver: &dyn Solver,
        problem: &ProblemDescriptor,
        probe: &CapabilityProbe,
        hint: Option<&TuningHint>,
        from_cache: bool,
    ) -> DispatchPlan {
        let configuration = solver.get_solution(problem, probe, hint);
        let workspace_bytes = solver.workspace_size(problem);
        info!(
            solver = solver.name(),
            kernel = %configuration.artifact.entry,
            workspace_bytes,
            from_cache,
            "planned convolution"
        );
        DispatchPlan {
            solver: solver.name(),
            configuration,
            workspace_bytes,
            from_cache,
        }
    }

    fn no_suitable(&self, problem: &ProblemDescriptor, probe: &CapabilityProbe) -> DispatchError {
        DispatchError::NoSuitableImplementation {
            problem: problem.signature(),
            arch: probe.arch().to_string(),
        }
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new(SolverRegistry::global().clone())
    }
}
