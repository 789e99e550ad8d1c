//! Read-only facts about the execution target.
//!
//! A probe is captured once per execution context and passed by reference to
//! every solver evaluation. Nothing here queries the device or the
//! environment; the hardware-query collaborator fills it in (directly or as
//! JSON) before selection starts.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Instruction-set extensions a kernel family may depend on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum IsaExtension {
    /// Matrix-core (MFMA) instructions.
    Xdlops,
    /// Buffer atomic add on 32-bit floats.
    BufferAtomicAdd,
    /// Retry-on-fault memory mode; hand-written assembly kernels assume it is off.
    Xnack,
}

/// Code-object metadata format the assembler must emit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MetadataVersion {
    V1,
    V2,
    #[default]
    V3,
}

impl MetadataVersion {
    pub fn code(&self) -> i64 {
        match self {
            MetadataVersion::V1 => 1,
            MetadataVersion::V2 => 2,
            MetadataVersion::V3 => 3,
        }
    }
}

/// Debug switches that alter code generation without changing the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureToggles {
    /// Treat the target as XDLOPS-capable and let kernels emulate the instructions.
    pub xdlops_emulate: bool,
    /// Emit XDLOPS through inline assembly instead of compiler intrinsics.
    pub xdlops_inline_asm: bool,
    /// Allow inline assembly in the non-XDLOPS threadwise GEMM.
    pub non_xdlops_inline_asm: bool,
}

impl Default for FeatureToggles {
    fn default() -> Self {
        Self {
            xdlops_emulate: false,
            xdlops_inline_asm: false,
            non_xdlops_inline_asm: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilityProbe {
    arch: String,
    #[serde(default)]
    assembler_available: bool,
    #[serde(default)]
    extensions: BTreeSet<IsaExtension>,
    #[serde(default)]
    metadata_version: MetadataVersion,
    #[serde(default)]
    toggles: FeatureToggles,
}

impl CapabilityProbe {
    /// Probe for `arch` with the extensions that architecture ships with and
    /// an available assembler.
    pub fn for_arch(arch: impl Into<String>) -> Self {
        let arch = arch.into();
        let extensions = default_extensions(&arch);
        Self {
            arch,
            assembler_available: true,
            extensions,
            metadata_version: MetadataVersion::default(),
            toggles: FeatureToggles::default(),
        }
    }

    pub fn with_assembler(mut self, available: bool) -> Self {
        self.assembler_available = available;
        self
    }

    pub fn with_extension(mut self, extension: IsaExtension) -> Self {
        self.extensions.insert(extension);
        self
    }

    pub fn without_extension(mut self, extension: IsaExtension) -> Self {
        self.extensions.remove(&extension);
        self
    }

    pub fn with_metadata_version(mut self, version: MetadataVersion) -> Self {
        self.metadata_version = version;
        self
    }

    pub fn with_toggles(mut self, toggles: FeatureToggles) -> Self {
        self.toggles = toggles;
        self
    }

    pub fn arch(&self) -> &str {
        &self.arch
    }

    pub fn assembler_available(&self) -> bool {
        self.assembler_available
    }

    /// True when the target's architecture name is one of `names`.
    pub fn arch_in(&self, names: &[&str]) -> bool {
        names.iter().any(|name| *name == self.arch)
    }

    pub fn arch_starts_with(&self, prefix: &str) -> bool {
        self.arch.starts_with(prefix)
    }

    pub fn supports(&self, extension: IsaExtension) -> bool {
        self.extensions.contains(&extension)
    }

    pub fn metadata_version(&self) -> MetadataVersion {
        self.metadata_version
    }

    pub fn toggles(&self) -> &FeatureToggles {
        &self.toggles
    }
}

fn default_extensions(arch: &str) -> BTreeSet<IsaExtension> {
    let mut extensions = BTreeSet::new();
    if arch.starts_with("gfx908") || arch.starts_with("gfx90a") {
        extensions.insert(IsaExtension::Xdlops);
        extensions.insert(IsaExtension::BufferAtomicAdd);
    }
    if arch.contains("xnack+") {
        extensions.insert(IsaExtension::Xnack);
    }
    extensions
}
