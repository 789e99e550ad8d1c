//! Forward 5x10 convolution, stride 2, in hand-written GCN assembly.
//!
//! The kernel hard-codes the filter (Y=5, X=10), the stride (2, 2), the
//! NCHW/KCHW layouts and a single group. Every other dimension reaches it
//! through assembler symbols. Each work-group covers 64 output columns, four
//! output rows per work-item row and two output channels per work-item.

use crate::params::CompileParams;
use crate::solution::{KernelArtifact, KernelConfiguration, KernelLanguage};
use crate::solver::{Solver, TuningHint};
use crate::utils::align_up;
use convdispatch_problem::{
    CapabilityProbe, DataType, IsaExtension, ProblemDescriptor, TensorLayout,
};

/// gfx8 and gfx9 targets without XNACK.
const SUPPORTED_ARCHS: &[&str] = &["gfx800", "gfx802", "gfx803", "gfx804", "gfx900"];

const FILTER_H: usize = 5;
const FILTER_W: usize = 10;
const STRIDE: usize = 2;
const MAX_PAD: usize = 5;
const OUT_CHANNEL_TILE: usize = 16;
// Found experimentally.
const MAX_IN_WIDTH: usize = 8192 - 1;
const MAX_IN_HEIGHT: usize = 131077 - 1;

const LOCAL_SIZE: [usize; 3] = [64, 8, 1];
const ROWS_PER_ITEM: usize = 4;

#[derive(Debug, Default, Clone, Copy)]
pub struct ConvAsm5x10u2v2f1;

impl ConvAsm5x10u2v2f1 {
    pub const NAME: &'static str = "ConvAsm5x10u2v2f1";

    pub fn new() -> Self {
        Self
    }
}

impl Solver for ConvAsm5x10u2v2f1 {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn is_applicable(&self, problem: &ProblemDescriptor, probe: &CapabilityProbe) -> bool {
        if !probe.assembler_available() {
            return false;
        }
        if !probe.arch_in(SUPPORTED_ARCHS) || probe.supports(IsaExtension::Xnack) {
            return false;
        }
        if !problem.direction().is_forward() {
            return false;
        }
        if !problem.is_2d()
            || problem.layout() != TensorLayout::Nchw
            || problem.dtype() != DataType::F32
            || problem.groups() != 1
        {
            return false;
        }
        // One pad per axis and an undilated window are baked into the kernel.
        if !problem.has_symmetric_padding() || problem.dilation_h() != 1 || problem.dilation_w() != 1
        {
            return false;
        }

        let pad_h = problem.left_pad_h();
        let pad_w = problem.left_pad_w();

        // Padded image must be at least as large as the filter.
        let min_in_width = FILTER_W.saturating_sub(2 * pad_w);
        let min_in_height = FILTER_H.saturating_sub(2 * pad_h);

        pad_w <= MAX_PAD
            && pad_h <= MAX_PAD
            && problem.stride_w() == STRIDE
            && problem.stride_h() == STRIDE
            && problem.filter_width() == FILTER_W
            && problem.filter_height() == FILTER_H
            && problem.out_channels() % OUT_CHANNEL_TILE == 0
            && (min_in_width..=MAX_IN_WIDTH).contains(&problem.in_width())
            && (min_in_height..=MAX_IN_HEIGHT).contains(&problem.in_height())
    }

    fn get_solution(
        &self,
        problem: &ProblemDescriptor,
        probe: &CapabilityProbe,
        _hint: Option<&TuningHint>,
    ) -> KernelConfiguration {
        let out_w = problem.out_width();
        let out_h = problem.out_height();
        let k = problem.out_channels();

        let mut params = CompileParams::new();
        params
            .define("inp_h", problem.in_height())
            .define("inp_w", problem.in_width())
            .define("wei_c", problem.in_channels())
            .define("wei_k", k)
            // 0: KCHW, 1: CKHW
            .define("wei_layout", 0usize)
            .define("pad_w", problem.left_pad_w())
            .define("pad_h", problem.left_pad_h())
            .define("ROCM_METADATA_VERSION", probe.metadata_version().code());

        let global_size = vec![
            align_up(out_w, LOCAL_SIZE[0]),
            align_up(out_h, ROWS_PER_ITEM) / ROWS_PER_ITEM * align_up(k / 2, LOCAL_SIZE[1]),
            problem.batch(),
        ];

        KernelConfiguration::new(
            KernelArtifact::new("conv5x10u2v2f1.s", "conv5x10u2v2f1", KernelLanguage::Assembly),
            LOCAL_SIZE.to_vec(),
            global_size,
            params,
        )
    }
}
