//! Dispatcher configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchOptions {
    /// JSON file holding prior-tuning records; loaded at construction and
    /// written back by [`crate::Dispatcher::persist`].
    pub tuning_cache: Option<PathBuf>,
    /// Prefer the recorded solver when it is still applicable.
    pub honor_tuning_cache: bool,
    /// Delete the cache file before loading it.
    pub clear_tuning_cache: bool,
}

impl Default for DispatchOptions {
    fn default() -> Self {
        Self {
            tuning_cache: None,
            honor_tuning_cache: true,
            clear_tuning_cache: false,
        }
    }
}

impl DispatchOptions {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}
