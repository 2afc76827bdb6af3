//! Rank-4 layout transposition
//!
//! External backends read raw bytes assuming row-major contiguity in their
//! own channel ordering, so reordering axes is not enough: the permuted
//! tensor is always materialized into a fresh contiguous buffer. Tensors of
//! any rank other than 4 pass through unchanged.
//!
//! The two permutations are exact inverses of each other: to channel-first
//! is (0,3,1,2), to channel-last is (0,2,3,1).

use crate::error::Result;
use crate::tensor::{Tensor, TensorData};

/// Channel ordering convention for rank-4 tensors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataFormat {
    /// Channel-first: (batch, channel, height, width)
    Nchw,
    /// Channel-last: (batch, height, width, channel)
    Nhwc,
}

impl DataFormat {
    /// Axis permutation that converts the other convention into this one
    #[must_use]
    pub fn permutation(self) -> [usize; 4] {
        match self {
            DataFormat::Nchw => [0, 3, 1, 2],
            DataFormat::Nhwc => [0, 2, 3, 1],
        }
    }
}

/// Convert a tensor to the given channel ordering
///
/// Rank-4 tensors are permuted and copied into a contiguous buffer; tensors
/// of any other rank are returned unchanged.
///
/// # Errors
///
/// Shape validation errors from tensor construction (cannot occur for
/// tensors that were valid on the way in).
pub fn to_data_format(tensor: &Tensor, format: DataFormat) -> Result<Tensor> {
    if tensor.ndim() != 4 {
        return Ok(tensor.clone());
    }
    permute4(tensor, format.permutation())
}

fn permute4(tensor: &Tensor, perm: [usize; 4]) -> Result<Tensor> {
    let shape = tensor.shape();
    let new_shape: Vec<usize> = perm.iter().map(|&p| shape[p]).collect();
    let data = match tensor.data() {
        TensorData::F32(v) => TensorData::F32(permute4_vec(v, shape, perm)),
        TensorData::F64(v) => TensorData::F64(permute4_vec(v, shape, perm)),
        TensorData::I8(v) => TensorData::I8(permute4_vec(v, shape, perm)),
        TensorData::I16(v) => TensorData::I16(permute4_vec(v, shape, perm)),
        TensorData::I32(v) => TensorData::I32(permute4_vec(v, shape, perm)),
        TensorData::U8(v) => TensorData::U8(permute4_vec(v, shape, perm)),
        TensorData::Bool(v) => TensorData::Bool(permute4_vec(v, shape, perm)),
    };
    Tensor::new(new_shape, data)
}

fn permute4_vec<T: Copy>(data: &[T], shape: &[usize], perm: [usize; 4]) -> Vec<T> {
    let strides = [
        shape[1] * shape[2] * shape[3],
        shape[2] * shape[3],
        shape[3],
        1,
    ];
    let new_shape = [
        shape[perm[0]],
        shape[perm[1]],
        shape[perm[2]],
        shape[perm[3]],
    ];

    let mut out = Vec::with_capacity(data.len());
    for a0 in 0..new_shape[0] {
        for a1 in 0..new_shape[1] {
            for a2 in 0..new_shape[2] {
                for a3 in 0..new_shape[3] {
                    // New axis k reads old axis perm[k]
                    let old = a0 * strides[perm[0]]
                        + a1 * strides[perm[1]]
                        + a2 * strides[perm[2]]
                        + a3 * strides[perm[3]];
                    out.push(data[old]);
                }
            }
        }
    }
    out
}
