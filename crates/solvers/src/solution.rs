//! Kernel configuration emitted by a solver.

use crate::params::{CompileParams, ParamSyntax};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KernelLanguage {
    /// Hand-written GCN assembly, parameterized through assembler symbols.
    Assembly,
    /// HIP C++ template kernel, parameterized through preprocessor defines.
    Hip,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct KernelArtifact {
    pub file: String,
    pub entry: String,
    pub language: KernelLanguage,
}

impl KernelArtifact {
    pub fn new(file: &str, entry: &str, language: KernelLanguage) -> Self {
        Self {
            file: file.to_string(),
            entry: entry.to_string(),
            language,
        }
    }
}

/// Everything the build and launch collaborators need to run one kernel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KernelConfiguration {
    pub artifact: KernelArtifact,
    /// Work-group size per axis, 1 to 3 axes.
    pub local_size: Vec<usize>,
    /// Total work-item count per axis; a multiple of `local_size` on every axis.
    pub global_size: Vec<usize>,
    pub params: CompileParams,
    /// Scratch bytes beyond the input, output and weight buffers.
    pub workspace_bytes: usize,
}

impl KernelConfiguration {
    pub fn new(
        artifact: KernelArtifact,
        local_size: Vec<usize>,
        global_size: Vec<usize>,
        params: CompileParams,
    ) -> Self {
        debug_assert!((1..=3).contains(&local_size.len()));
        debug_assert_eq!(local_size.len(), global_size.len());
        Self {
            artifact,
            local_size,
            global_size,
            params,
            workspace_bytes: 0,
        }
    }

    pub fn with_workspace(mut self, bytes: usize) -> Self {
        self.workspace_bytes = bytes;
        self
    }

    /// Number of work-groups per axis.
    pub fn group_counts(&self) -> Vec<usize> {
        self.global_size
            .iter()
            .zip(&self.local_size)
            .map(|(global, local)| global / local)
            .collect()
    }

    pub fn is_evenly_tiled(&self) -> bool {
        self.local_size.len() == self.global_size.len()
            && self
                .global_size
                .iter()
                .zip(&self.local_size)
                .all(|(global, local)| *local > 0 && global % local == 0)
    }

    /// Compiler flags in the textual form the build collaborator consumes.
    pub fn build_options(&self) -> String {
        match self.artifact.language {
            KernelLanguage::Assembly => self.params.render(ParamSyntax::AssemblerDefsym),
            KernelLanguage::Hip => format!(
                "-std=c++14 {} -D__HIP_PLATFORM_HCC__=1",
                self.params.render(ParamSyntax::PreprocessorDefine)
            ),
        }
    }
}
