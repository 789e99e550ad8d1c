//! Element types, directions and layout tags shared by descriptors and solvers.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataType {
    F32,
    F16,
    BF16,
}

impl DataType {
    pub fn element_size_bytes(&self) -> usize {
        match self {
            DataType::F32 => 4,
            DataType::F16 | DataType::BF16 => 2,
        }
    }

    /// True for the 16-bit types that lack a native atomic-add on most targets.
    pub fn is_reduced_precision(&self) -> bool {
        matches!(self, DataType::F16 | DataType::BF16)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DataType::F32 => "f32",
            DataType::F16 => "f16",
            DataType::BF16 => "bf16",
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    Forward,
    BackwardData,
    BackwardWeights,
}

impl Direction {
    pub fn is_forward(&self) -> bool {
        matches!(self, Direction::Forward)
    }

    pub fn is_backward_data(&self) -> bool {
        matches!(self, Direction::BackwardData)
    }

    pub fn is_backward_weights(&self) -> bool {
        matches!(self, Direction::BackwardWeights)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Forward => "fwd",
            Direction::BackwardData => "bwd",
            Direction::BackwardWeights => "wrw",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Memory layout of the activation tensors.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TensorLayout {
    #[default]
    Nchw,
    Nhwc,
    Ncdhw,
    Ndhwc,
}

impl TensorLayout {
    pub fn spatial_dims(&self) -> usize {
        match self {
            TensorLayout::Nchw | TensorLayout::Nhwc => 2,
            TensorLayout::Ncdhw | TensorLayout::Ndhwc => 3,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TensorLayout::Nchw => "NCHW",
            TensorLayout::Nhwc => "NHWC",
            TensorLayout::Ncdhw => "NCDHW",
            TensorLayout::Ndhwc => "NDHWC",
        }
    }
}

impl fmt::Display for TensorLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
