//! Shared arithmetic and capability helpers for solver implementations.

use convdispatch_problem::{CapabilityProbe, DataType, IsaExtension, ProblemDescriptor};

/// Rounds `value` up to the next multiple of `step`.
pub fn align_up(value: usize, step: usize) -> usize {
    debug_assert!(step > 0);
    value.div_ceil(step) * step
}

/// Matrix-core kernels may run natively or under emulation.
pub fn xdlops_supported(probe: &CapabilityProbe) -> bool {
    probe.supports(IsaExtension::Xdlops) || probe.toggles().xdlops_emulate
}

/// Inline assembly in the threadwise GEMM miscompiles on gfx8.
pub fn use_amd_inline_asm(probe: &CapabilityProbe) -> bool {
    !probe.arch_starts_with("gfx8") && probe.toggles().non_xdlops_inline_asm
}

/// Buffer atomic add exists for 32-bit floats only.
pub fn use_buffer_atomic_add(probe: &CapabilityProbe, dtype: DataType) -> bool {
    probe.supports(IsaExtension::BufferAtomicAdd) && dtype == DataType::F32
}

/// Number of reduced-precision elements packed along the reduction dimension.
pub fn epack_length(problem: &ProblemDescriptor, probe: &CapabilityProbe) -> usize {
    match problem.dtype() {
        DataType::F32 => 1,
        DataType::F16 if xdlops_supported(probe) => 4,
        DataType::F16 | DataType::BF16 => 2,
    }
}
