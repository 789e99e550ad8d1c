//! Persisted results of prior tuning runs.
//!
//! The autotuner that measures candidates lives outside this workspace; it
//! writes which solver won for a problem and the performance parameters it
//! settled on. Dispatch reads the record back and never ranks on its own.

use anyhow::Result;
use convdispatch_problem::ProblemDescriptor;
use convdispatch_solvers::TuningHint;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TuningRecord {
    pub solver: String,
    #[serde(default, skip_serializing_if = "TuningHint::is_empty")]
    pub hint: TuningHint,
}

impl TuningRecord {
    pub fn new(solver: &str, hint: TuningHint) -> Self {
        Self {
            solver: solver.to_string(),
            hint,
        }
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct TuningCache {
    records: HashMap<String, TuningRecord>,
}

impl TuningCache {
    pub fn new() -> Self {
        Self {
            records: HashMap::new(),
        }
    }

    pub fn get(&self, problem: &ProblemDescriptor) -> Option<&TuningRecord> {
        self.records.get(&problem.signature())
    }

    pub fn insert(&mut self, problem: &ProblemDescriptor, record: TuningRecord) {
        self.records.insert(problem.signature(), record);
    }

    pub fn remove(&mut self, problem: &ProblemDescriptor) -> Option<TuningRecord> {
        self.records.remove(&problem.signature())
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn load_from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::new());
        }
        let data = fs::read(path)?;
        let cache = serde_json::from_slice(&data)?;
        Ok(cache)
    }

    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let blob = serde_json::to_vec_pretty(self)?;
        fs::write(path, blob)?;
        Ok(())
    }
}
