//! Backward-data convolution as an implicit GEMM on matrix cores (v1r1).
//!
//! The data gradient is computed as a GEMM with `M = C * Y * X` and
//! `N = N * Ho * Wo`, reduced over `K`. Each 256-thread block owns one
//! 128x128 tile of the GEMM output, so both GEMM extents must be exact
//! multiples of 128 (the kernel has no tail handling). Reduced-precision
//! inputs pack `K` in groups of [`epack_length`] and accumulate through an
//! fp32 workspace because the target has no 16-bit atomic add.

use crate::params::CompileParams;
use crate::solution::{KernelArtifact, KernelConfiguration, KernelLanguage};
use crate::solver::{Solver, TuningHint};
use crate::utils::{epack_length, use_amd_inline_asm, use_buffer_atomic_add, xdlops_supported};
use convdispatch_problem::{CapabilityProbe, DataType, ProblemDescriptor, TensorLayout};

const GEMM_M_PER_BLOCK: usize = 128;
const GEMM_N_PER_BLOCK: usize = 128;
const GEMM_K_PER_BLOCK: usize = 16;
const GEMM_M_PER_WAVE: usize = 64;
const GEMM_N_PER_WAVE: usize = 64;
const BLOCK_SIZE: usize = 256;
const K_TILE: usize = 16;

const UNGROUPED_KERNEL: &str =
    "gridwise_convolution_backward_data_implicit_gemm_v1r1_xdlops_nchw_kcyx_nkhw";
const GROUPED_KERNEL: &str =
    "gridwise_convolution_backward_data_implicit_gemm_v1r1_xdlops_gnchw_gkcyx_gnkhw";

#[derive(Debug, Default, Clone, Copy)]
pub struct ConvHipImplicitGemmBwdDataV1R1Xdlops;

impl ConvHipImplicitGemmBwdDataV1R1Xdlops {
    pub const NAME: &'static str = "ConvHipImplicitGemmBwdDataV1R1Xdlops";

    pub fn new() -> Self {
        Self
    }

    fn artifact(groups: usize) -> KernelArtifact {
        let entry = if groups > 1 {
            GROUPED_KERNEL
        } else {
            UNGROUPED_KERNEL
        };
        KernelArtifact::new(&format!("{entry}.cpp"), entry, KernelLanguage::Hip)
    }
}

impl Solver for ConvHipImplicitGemmBwdDataV1R1Xdlops {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn is_applicable(&self, problem: &ProblemDescriptor, probe: &CapabilityProbe) -> bool {
        if !problem.direction().is_backward_data() {
            return false;
        }
        if !problem.is_2d() || problem.layout() != TensorLayout::Nchw {
            return false;
        }
        if !xdlops_supported(probe) {
            return false;
        }

        let n = problem.batch();
        let k = problem.out_channels_per_group();
        let c = problem.in_channels_per_group();
        let y = problem.filter_height();
        let x = problem.filter_width();
        let ho = problem.out_height();
        let wo = problem.out_width();

        // K is split into packs of 2 or 4 reduced-precision values.
        let epack = epack_length(problem, probe);
        if k % epack != 0 {
            return false;
        }

        (n * ho * wo) % GEMM_N_PER_BLOCK == 0
            && (c * y * x) % GEMM_M_PER_BLOCK == 0
            && (k / epack) % K_TILE == 0
    }

    fn workspace_size(&self, problem: &ProblemDescriptor) -> usize {
        match problem.dtype() {
            DataType::F32 => 0,
            // fp16/bf16 gradients are reduced in fp32, then cast by a second kernel.
            DataType::F16 | DataType::BF16 => {
                problem.batch()
                    * problem.in_channels()
                    * problem.in_height()
                    * problem.in_width()
                    * DataType::F32.element_size_bytes()
            }
        }
    }

    fn get_solution(
        &self,
        problem: &ProblemDescriptor,
        probe: &CapabilityProbe,
        _hint: Option<&TuningHint>,
    ) -> KernelConfiguration {
        let n = problem.batch();
        let k = problem.out_channels();
        let c = problem.in_channels();
        let y = problem.filter_height();
        let x = problem.filter_width();
        let ho = problem.out_height();
        let wo = problem.out_width();

        let gemm_m = c * y * x;
        let gemm_n = n * ho * wo;
        let grid_size = (gemm_m / GEMM_M_PER_BLOCK) * (gemm_n / GEMM_N_PER_BLOCK);

        let mut params = CompileParams::new();
        params
            .define("CK_PARAM_PROBLEM_N", n)
            .define("CK_PARAM_PROBLEM_K", k)
            .define("CK_PARAM_PROBLEM_C", c)
            .define("CK_PARAM_PROBLEM_HI", problem.in_height())
            .define("CK_PARAM_PROBLEM_WI", problem.in_width())
            .define("CK_PARAM_PROBLEM_HO", ho)
            .define("CK_PARAM_PROBLEM_WO", wo)
            .define("CK_PARAM_PROBLEM_Y", y)
            .define("CK_PARAM_PROBLEM_X", x)
            .define("CK_PARAM_PROBLEM_CONV_STRIDE_H", problem.stride_h())
            .define("CK_PARAM_PROBLEM_CONV_STRIDE_W", problem.stride_w())
            .define("CK_PARAM_PROBLEM_CONV_DILATION_H", problem.dilation_h())
            .define("CK_PARAM_PROBLEM_CONV_DILATION_W", problem.dilation_w())
            .define("CK_PARAM_PROBLEM_IN_LEFT_PAD_H", problem.left_pad_h())
            .define("CK_PARAM_PROBLEM_IN_LEFT_PAD_W", problem.left_pad_w())
            .define("CK_PARAM_PROBLEM_IN_RIGHT_PAD_H", problem.adjusted_right_pad_h())
            .define("CK_PARAM_PROBLEM_IN_RIGHT_PAD_W", problem.adjusted_right_pad_w())
            .define("CK_PARAM_PROBLEM_CONV_GROUP_COUNTS", problem.groups())
            .define("CK_PARAM_TUNABLE_BLOCK_SIZE", BLOCK_SIZE)
            .define("CK_PARAM_TUNABLE_GEMM_M_PER_BLOCK", GEMM_M_PER_BLOCK)
            .define("CK_PARAM_TUNABLE_GEMM_N_PER_BLOCK", GEMM_N_PER_BLOCK)
            .define("CK_PARAM_TUNABLE_GEMM_K_PER_BLOCK", GEMM_K_PER_BLOCK)
            .define("CK_PARAM_GEMM_M_PER_WAVE", GEMM_M_PER_WAVE)
            .define("CK_PARAM_GEMM_N_PER_WAVE", GEMM_N_PER_WAVE)
            .define("CK_PARAM_TUNABLE_GEMM_A_BLOCK_COPY_CLUSTER_LENGTHS_GEMM_K", 4usize)
            .define("CK_PARAM_TUNABLE_GEMM_A_BLOCK_COPY_CLUSTER_LENGTHS_GEMM_M", 64usize)
            .define("CK_PARAM_TUNABLE_GEMM_A_BLOCK_COPY_SRC_DATA_PER_READ_GEMM_M", 1usize)
            .define("CK_PARAM_TUNABLE_GEMM_B_BLOCK_COPY_CLUSTER_LENGTHS_GEMM_K", 8usize)
            .define("CK_PARAM_TUNABLE_GEMM_B_BLOCK_COPY_CLUSTER_LENGTHS_GEMM_N", 32usize)
            .define("CK_PARAM_TUNABLE_GEMM_B_BLOCK_COPY_SRC_DATA_PER_READ_GEMM_N", 1usize)
            .define("CK_PARAM_DEPENDENT_GRID_SIZE", grid_size)
            .define("CK_THREADWISE_GEMM_USE_AMD_INLINE_ASM", use_amd_inline_asm(probe))
            .define(
                "CK_USE_AMD_BUFFER_ATOMIC_ADD",
                use_buffer_atomic_add(probe, problem.dtype()),
            )
            .define("CK_USE_AMD_XDLOPS", xdlops_supported(probe))
            .define("CK_USE_AMD_XDLOPS_INLINE_ASM", probe.toggles().xdlops_inline_asm)
            .define("CK_USE_AMD_XDLOPS_EMULATE", probe.toggles().xdlops_emulate);

        if problem.dtype() == DataType::F32 {
            params
                .define("CK_PARAM_TUNABLE_GEMM_A_BLOCK_COPY_DST_DATA_PER_WRITE_GEMM_M", 1usize)
                .define("CK_PARAM_TUNABLE_GEMM_B_BLOCK_COPY_DST_DATA_PER_WRITE_GEMM_N", 1usize);
        } else {
            params
                .define("CK_PARAM_KPACK_LENGTH", epack_length(problem, probe))
                .define("CK_PARAM_TUNABLE_GEMM_A_BLOCK_COPY_DST_DATA_PER_WRITE_GEMM_KPACK", 1usize)
                .define("CK_PARAM_TUNABLE_GEMM_B_BLOCK_COPY_DST_DATA_PER_WRITE_GEMM_KPACK", 1usize);
        }

        KernelConfiguration::new(
            Self::artifact(problem.groups()),
            vec![BLOCK_SIZE, 1, 1],
            vec![BLOCK_SIZE * grid_size, 1, 1],
            params,
        )
        .with_workspace(self.workspace_size(problem))
    }
}
