//! Normalized convolution problem descriptor and its builder.
//!
//! The descriptor always describes the forward geometry of the convolution:
//! input `x` is `N x C x (D) x H x W`, weights are `K x C/G x (Z) x Y x X` and
//! output `y` is `N x K x (Do) x Ho x Wo`. The direction only says which of the
//! three tensors a kernel computes, so solvers for every direction read the
//! same fields.
//!
//! Output extents are derived on demand and never stored. A descriptor whose
//! parameters produce a non-positive output extent can be built; the defect
//! surfaces when a solver predicate asks for the output geometry.

use crate::types::{DataType, Direction, TensorLayout};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProblemError {
    #[error("{field} must be at least 1")]
    ZeroExtent { field: &'static str },

    #[error("only 2-D and 3-D convolutions are described, got {0} spatial axes")]
    UnsupportedSpatialDims(usize),

    #[error("{field} has {found} axes but the input has {expected}")]
    SpatialArity {
        field: &'static str,
        expected: usize,
        found: usize,
    },

    #[error("group count {groups} does not divide channels C={in_channels} K={out_channels}")]
    GroupCount {
        groups: usize,
        in_channels: usize,
        out_channels: usize,
    },

    #[error("layout {layout} expects {expected} spatial axes, got {found}")]
    LayoutMismatch {
        layout: TensorLayout,
        expected: usize,
        found: usize,
    },
}

/// Immutable view of one convolution operation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "ProblemBuilder", into = "ProblemBuilder")]
pub struct ProblemDescriptor {
    batch: usize,
    in_channels: usize,
    out_channels: usize,
    input: Vec<usize>,
    filter: Vec<usize>,
    strides: Vec<usize>,
    dilations: Vec<usize>,
    left_pads: Vec<usize>,
    right_pads: Vec<usize>,
    groups: usize,
    dtype: DataType,
    direction: Direction,
    layout: TensorLayout,
}

impl ProblemDescriptor {
    pub fn builder() -> ProblemBuilder {
        ProblemBuilder::new()
    }

    pub fn batch(&self) -> usize {
        self.batch
    }

    /// Total input channel count `C`.
    pub fn in_channels(&self) -> usize {
        self.in_channels
    }

    /// Total output channel count `K`.
    pub fn out_channels(&self) -> usize {
        self.out_channels
    }

    pub fn in_channels_per_group(&self) -> usize {
        self.in_channels / self.groups
    }

    pub fn out_channels_per_group(&self) -> usize {
        self.out_channels / self.groups
    }

    pub fn groups(&self) -> usize {
        self.groups
    }

    pub fn dtype(&self) -> DataType {
        self.dtype
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn layout(&self) -> TensorLayout {
        self.layout
    }

    pub fn spatial_dims(&self) -> usize {
        self.input.len()
    }

    pub fn is_2d(&self) -> bool {
        self.spatial_dims() == 2
    }

    pub fn is_3d(&self) -> bool {
        self.spatial_dims() == 3
    }

    pub fn input(&self) -> &[usize] {
        &self.input
    }

    pub fn filter(&self) -> &[usize] {
        &self.filter
    }

    pub fn strides(&self) -> &[usize] {
        &self.strides
    }

    pub fn dilations(&self) -> &[usize] {
        &self.dilations
    }

    pub fn left_pads(&self) -> &[usize] {
        &self.left_pads
    }

    pub fn right_pads(&self) -> &[usize] {
        &self.right_pads
    }

    /// True when every axis is padded by the same amount on both sides.
    pub fn has_symmetric_padding(&self) -> bool {
        self.left_pads == self.right_pads
    }

    /// Output extent along `axis`, or `None` when the window does not fit.
    ///
    /// `floor((in + left + right - (dilation * (filter - 1) + 1)) / stride) + 1`,
    /// with floor division so a negative numerator rounds toward -inf.
    /// Extents too large for `i64` also yield `None`.
    pub fn try_output_extent(&self, axis: usize) -> Option<usize> {
        let padded = self.input[axis]
            .checked_add(self.left_pads[axis])?
            .checked_add(self.right_pads[axis])?;
        let window = self.dilations[axis]
            .checked_mul(self.filter[axis] - 1)?
            .checked_add(1)?;
        let padded = i64::try_from(padded).ok()?;
        let window = i64::try_from(window).ok()?;
        let stride = i64::try_from(self.strides[axis]).ok()?;
        let extent = (padded - window).div_euclid(stride) + 1;
        usize::try_from(extent).ok().filter(|&e| e >= 1)
    }

    /// Output extent along `axis`.
    ///
    /// # Panics
    ///
    /// Panics when the geometry yields a non-positive extent. Solver
    /// predicates reach this before any configuration is generated, so a
    /// malformed problem faults during selection instead of producing a
    /// launch geometry for a kernel that would read out of bounds.
    pub fn output_extent(&self, axis: usize) -> usize {
        match self.try_output_extent(axis) {
            Some(extent) => extent,
            None => panic!(
                "convolution geometry defect on axis {axis}: input {} + pads ({}, {}) does not \
                 cover the dilated filter window (filter {}, dilation {}, stride {})",
                self.input[axis],
                self.left_pads[axis],
                self.right_pads[axis],
                self.filter[axis],
                self.dilations[axis],
                self.strides[axis],
            ),
        }
    }

    /// Faults the same way as [`Self::output_extent`] when any axis has a
    /// non-positive output extent.
    pub fn check_geometry(&self) {
        for axis in 0..self.spatial_dims() {
            self.output_extent(axis);
        }
    }

    pub fn output_extents(&self) -> Vec<usize> {
        (0..self.spatial_dims())
            .map(|axis| self.output_extent(axis))
            .collect()
    }

    /// Right padding actually consumed by the last output window.
    ///
    /// The user's right pad may exceed what the strided window reaches;
    /// implicit-GEMM kernels expect the trimmed value.
    pub fn adjusted_right_pad(&self, axis: usize) -> usize {
        let out = self.output_extent(axis);
        let padded_needed = 1
            + (self.filter[axis] - 1) * self.dilations[axis]
            + (out - 1) * self.strides[axis];
        padded_needed.saturating_sub(self.left_pads[axis] + self.input[axis])
    }

    fn h_axis(&self) -> usize {
        self.spatial_dims() - 2
    }

    fn w_axis(&self) -> usize {
        self.spatial_dims() - 1
    }

    pub fn in_height(&self) -> usize {
        self.input[self.h_axis()]
    }

    pub fn in_width(&self) -> usize {
        self.input[self.w_axis()]
    }

    pub fn filter_height(&self) -> usize {
        self.filter[self.h_axis()]
    }

    pub fn filter_width(&self) -> usize {
        self.filter[self.w_axis()]
    }

    pub fn stride_h(&self) -> usize {
        self.strides[self.h_axis()]
    }

    pub fn stride_w(&self) -> usize {
        self.strides[self.w_axis()]
    }

    pub fn dilation_h(&self) -> usize {
        self.dilations[self.h_axis()]
    }

    pub fn dilation_w(&self) -> usize {
        self.dilations[self.w_axis()]
    }

    pub fn left_pad_h(&self) -> usize {
        self.left_pads[self.h_axis()]
    }

    pub fn left_pad_w(&self) -> usize {
        self.left_pads[self.w_axis()]
    }

    pub fn right_pad_h(&self) -> usize {
        self.right_pads[self.h_axis()]
    }

    pub fn right_pad_w(&self) -> usize {
        self.right_pads[self.w_axis()]
    }

    pub fn out_height(&self) -> usize {
        self.output_extent(self.h_axis())
    }

    pub fn out_width(&self) -> usize {
        self.output_extent(self.w_axis())
    }

    pub fn adjusted_right_pad_h(&self) -> usize {
        self.adjusted_right_pad(self.h_axis())
    }

    pub fn adjusted_right_pad_w(&self) -> usize {
        self.adjusted_right_pad(self.w_axis())
    }

    /// Stable key covering every field that influences solver selection.
    pub fn signature(&self) -> String {
        let dims = |values: &[usize]| {
            values
                .iter()
                .map(|v| v.to_string())
                .collect::<Vec<_>>()
                .join("x")
        };
        format!(
            "n{}-c{}-k{}-g{}-in{}-f{}-s{}-d{}-pl{}-pr{}-{}-{}-{}",
            self.batch,
            self.in_channels,
            self.out_channels,
            self.groups,
            dims(&self.input),
            dims(&self.filter),
            dims(&self.strides),
            dims(&self.dilations),
            dims(&self.left_pads),
            dims(&self.right_pads),
            self.dtype,
            self.direction,
            self.layout,
        )
    }
}

/// Chained builder for [`ProblemDescriptor`]; also its serialized form.
///
/// Strides and dilations default to 1, padding to 0, one group, `f32`,
/// forward, NCHW.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProblemBuilder {
    #[serde(default = "one")]
    batch: usize,
    in_channels: usize,
    out_channels: usize,
    input: Vec<usize>,
    filter: Vec<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    strides: Option<Vec<usize>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    dilations: Option<Vec<usize>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    left_pads: Option<Vec<usize>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    right_pads: Option<Vec<usize>>,
    #[serde(default = "one")]
    groups: usize,
    #[serde(default = "default_dtype")]
    dtype: DataType,
    #[serde(default = "default_direction")]
    direction: Direction,
    #[serde(default)]
    layout: TensorLayout,
}

fn one() -> usize {
    1
}

fn default_dtype() -> DataType {
    DataType::F32
}

fn default_direction() -> Direction {
    Direction::Forward
}

impl Default for ProblemBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ProblemBuilder {
    pub fn new() -> Self {
        Self {
            batch: 1,
            in_channels: 1,
            out_channels: 1,
            input: Vec::new(),
            filter: Vec::new(),
            strides: None,
            dilations: None,
            left_pads: None,
            right_pads: None,
            groups: 1,
            dtype: DataType::F32,
            direction: Direction::Forward,
            layout: TensorLayout::Nchw,
        }
    }

    pub fn batch(mut self, batch: usize) -> Self {
        self.batch = batch;
        self
    }

    /// Total input (`C`) and output (`K`) channel counts.
    pub fn channels(mut self, in_channels: usize, out_channels: usize) -> Self {
        self.in_channels = in_channels;
        self.out_channels = out_channels;
        self
    }

    /// Input spatial extents, outermost axis first (`[H, W]`).
    pub fn input(mut self, extents: &[usize]) -> Self {
        self.input = extents.to_vec();
        self
    }

    /// Filter spatial extents, outermost axis first (`[Y, X]`).
    pub fn filter(mut self, extents: &[usize]) -> Self {
        self.filter = extents.to_vec();
        self
    }

    pub fn strides(mut self, strides: &[usize]) -> Self {
        self.strides = Some(strides.to_vec());
        self
    }

    pub fn dilations(mut self, dilations: &[usize]) -> Self {
        self.dilations = Some(dilations.to_vec());
        self
    }

    /// Same padding on both sides of every axis.
    pub fn padding(mut self, pads: &[usize]) -> Self {
        self.left_pads = Some(pads.to_vec());
        self.right_pads = Some(pads.to_vec());
        self
    }

    pub fn asymmetric_padding(mut self, left: &[usize], right: &[usize]) -> Self {
        self.left_pads = Some(left.to_vec());
        self.right_pads = Some(right.to_vec());
        self
    }

    pub fn groups(mut self, groups: usize) -> Self {
        self.groups = groups;
        self
    }

    pub fn dtype(mut self, dtype: DataType) -> Self {
        self.dtype = dtype;
        self
    }

    pub fn direction(mut self, direction: Direction) -> Self {
        self.direction = direction;
        self
    }

    pub fn layout(mut self, layout: TensorLayout) -> Self {
        self.layout = layout;
        self
    }

    pub fn build(self) -> Result<ProblemDescriptor, ProblemError> {
        let dims = self.input.len();
        if dims != 2 && dims != 3 {
            return Err(ProblemError::UnsupportedSpatialDims(dims));
        }
        if self.layout.spatial_dims() != dims {
            return Err(ProblemError::LayoutMismatch {
                layout: self.layout,
                expected: self.layout.spatial_dims(),
                found: dims,
            });
        }

        let strides = self.strides.unwrap_or_else(|| vec![1; dims]);
        let dilations = self.dilations.unwrap_or_else(|| vec![1; dims]);
        let left_pads = self.left_pads.unwrap_or_else(|| vec![0; dims]);
        let right_pads = self.right_pads.unwrap_or_else(|| vec![0; dims]);

        for (field, values) in [
            ("filter", &self.filter),
            ("strides", &strides),
            ("dilations", &dilations),
            ("left_pads", &left_pads),
            ("right_pads", &right_pads),
        ] {
            if values.len() != dims {
                return Err(ProblemError::SpatialArity {
                    field,
                    expected: dims,
                    found: values.len(),
                });
            }
        }

        for (field, values) in [
            ("input", &self.input),
            ("filter", &self.filter),
            ("strides", &strides),
            ("dilations", &dilations),
        ] {
            if values.iter().any(|&v| v == 0) {
                return Err(ProblemError::ZeroExtent { field });
            }
        }

        for (field, value) in [
            ("batch", self.batch),
            ("in_channels", self.in_channels),
            ("out_channels", self.out_channels),
            ("groups", self.groups),
        ] {
            if value == 0 {
                return Err(ProblemError::ZeroExtent { field });
            }
        }

        if self.in_channels % self.groups != 0 || self.out_channels % self.groups != 0 {
            return Err(ProblemError::GroupCount {
                groups: self.groups,
                in_channels: self.in_channels,
                out_channels: self.out_channels,
            });
        }

        Ok(ProblemDescriptor {
            batch: self.batch,
            in_channels: self.in_channels,
            out_channels: self.out_channels,
            input: self.input,
            filter: self.filter,
            strides,
            dilations,
            left_pads,
            right_pads,
            groups: self.groups,
            dtype: self.dtype,
            direction: self.direction,
            layout: self.layout,
        })
    }
}

impl TryFrom<ProblemBuilder> for ProblemDescriptor {
    type Error = ProblemError;

    fn try_from(builder: ProblemBuilder) -> Result<Self, Self::Error> {
        builder.build()
    }
}

impl From<ProblemDescriptor> for ProblemBuilder {
    fn from(problem: ProblemDescriptor) -> Self {
        Self {
            batch: problem.batch,
            in_channels: problem.in_channels,
            out_channels: problem.out_channels,
            input: problem.input,
            filter: problem.filter,
            strides: Some(problem.strides),
            dilations: Some(problem.dilations),
            left_pads: Some(problem.left_pads),
            right_pads: Some(problem.right_pads),
            groups: problem.groups,
            dtype: problem.dtype,
            direction: problem.direction,
            layout: problem.layout,
        }
    }
}
