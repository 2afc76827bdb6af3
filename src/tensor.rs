//! Tensor implementation
//!
//! This module provides the core `Tensor` type used to exchange data with
//! external backends: an N-dimensional array with a runtime element-type tag
//! and flat row-major storage. The runtime tag (rather than a generic
//! parameter) is what the harness needs, because output element types are
//! only known after decoding files produced by external tools.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Result, VerificarError};

/// Element type tag for tensor storage
///
/// Covers the types that cross the file boundary: float inputs/outputs,
/// quantized integer payloads, and boolean outputs from comparison ops.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DType {
    /// 32-bit IEEE 754 float
    F32,
    /// 64-bit IEEE 754 float
    F64,
    /// Signed 8-bit integer
    I8,
    /// Signed 16-bit integer
    I16,
    /// Signed 32-bit integer
    I32,
    /// Unsigned 8-bit integer
    U8,
    /// Boolean (stored as one byte per element on disk)
    Bool,
}

impl DType {
    /// Size of one element in bytes
    #[must_use]
    pub fn size_of(self) -> usize {
        match self {
            DType::I8 | DType::U8 | DType::Bool => 1,
            DType::I16 => 2,
            DType::F32 | DType::I32 => 4,
            DType::F64 => 8,
        }
    }

    /// NumPy descr string for the `.npy` header
    #[must_use]
    pub fn numpy_descr(self) -> &'static str {
        match self {
            DType::F32 => "<f4",
            DType::F64 => "<f8",
            DType::I8 => "|i1",
            DType::I16 => "<i2",
            DType::I32 => "<i4",
            DType::U8 => "|u1",
            DType::Bool => "|b1",
        }
    }

    /// Parse a NumPy descr string
    ///
    /// Accepts both little-endian (`<`) and byte-order-agnostic (`|`, `=`)
    /// prefixes; big-endian payloads are not supported.
    #[must_use]
    pub fn from_numpy_descr(descr: &str) -> Option<Self> {
        let stripped = descr
            .strip_prefix(['<', '|', '='])
            .unwrap_or(descr);
        match stripped {
            "f4" => Some(DType::F32),
            "f8" => Some(DType::F64),
            "i1" => Some(DType::I8),
            "i2" => Some(DType::I16),
            "i4" => Some(DType::I32),
            "u1" => Some(DType::U8),
            "b1" => Some(DType::Bool),
            _ => None,
        }
    }

    /// Whether this is a floating-point type
    #[must_use]
    pub fn is_float(self) -> bool {
        matches!(self, DType::F32 | DType::F64)
    }

    /// Whether this is a (signed or unsigned) integer type
    #[must_use]
    pub fn is_integer(self) -> bool {
        matches!(self, DType::I8 | DType::I16 | DType::I32 | DType::U8)
    }
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DType::F32 => "f32",
            DType::F64 => "f64",
            DType::I8 => "i8",
            DType::I16 => "i16",
            DType::I32 => "i32",
            DType::U8 => "u8",
            DType::Bool => "bool",
        };
        write!(f, "{name}")
    }
}

/// Typed flat storage backing a [`Tensor`]
#[derive(Debug, Clone, PartialEq)]
pub enum TensorData {
    /// 32-bit float elements
    F32(Vec<f32>),
    /// 64-bit float elements
    F64(Vec<f64>),
    /// Signed 8-bit elements
    I8(Vec<i8>),
    /// Signed 16-bit elements
    I16(Vec<i16>),
    /// Signed 32-bit elements
    I32(Vec<i32>),
    /// Unsigned 8-bit elements
    U8(Vec<u8>),
    /// Boolean elements
    Bool(Vec<bool>),
}

impl TensorData {
    /// Number of elements
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            TensorData::F32(v) => v.len(),
            TensorData::F64(v) => v.len(),
            TensorData::I8(v) => v.len(),
            TensorData::I16(v) => v.len(),
            TensorData::I32(v) => v.len(),
            TensorData::U8(v) => v.len(),
            TensorData::Bool(v) => v.len(),
        }
    }

    /// Whether the storage holds no elements
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Element type tag of the storage
    #[must_use]
    pub fn dtype(&self) -> DType {
        match self {
            TensorData::F32(_) => DType::F32,
            TensorData::F64(_) => DType::F64,
            TensorData::I8(_) => DType::I8,
            TensorData::I16(_) => DType::I16,
            TensorData::I32(_) => DType::I32,
            TensorData::U8(_) => DType::U8,
            TensorData::Bool(_) => DType::Bool,
        }
    }
}

/// N-dimensional tensor with runtime element type and row-major storage
///
/// # Examples
///
/// ```
/// use verificar::Tensor;
///
/// let t = Tensor::from_f32(vec![2, 3], vec![
///     1.0, 2.0, 3.0,
///     4.0, 5.0, 6.0,
/// ]).unwrap();
///
/// assert_eq!(t.shape(), &[2, 3]);
/// assert_eq!(t.ndim(), 2);
/// assert_eq!(t.size(), 6);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Tensor {
    /// Shape of the tensor
    shape: Vec<usize>,
    /// Flattened data in row-major order
    data: TensorData,
}

impl Tensor {
    /// Create a new tensor from typed storage and a shape
    ///
    /// # Errors
    ///
    /// Returns `Err` if:
    /// - Shape is empty
    /// - Shape contains zero
    /// - Data size doesn't match shape
    pub fn new(shape: Vec<usize>, data: TensorData) -> Result<Self> {
        if shape.is_empty() {
            return Err(VerificarError::InvalidShape {
                reason: "Shape cannot be empty".to_string(),
            });
        }

        if shape.contains(&0) {
            return Err(VerificarError::InvalidShape {
                reason: "Shape dimensions cannot be zero".to_string(),
            });
        }

        let expected_size = shape.iter().product();
        if data.len() != expected_size {
            return Err(VerificarError::DataShapeMismatch {
                data_size: data.len(),
                shape: shape.clone(),
                expected: expected_size,
            });
        }

        Ok(Self { shape, data })
    }

    /// Create an f32 tensor from a flat vector
    ///
    /// # Errors
    ///
    /// Same validation as [`Tensor::new`].
    pub fn from_f32(shape: Vec<usize>, data: Vec<f32>) -> Result<Self> {
        Self::new(shape, TensorData::F32(data))
    }

    /// Get the shape of the tensor
    #[must_use]
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// Get the number of dimensions
    #[must_use]
    pub fn ndim(&self) -> usize {
        self.shape.len()
    }

    /// Get the total number of elements
    #[must_use]
    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// Get the element type tag
    #[must_use]
    pub fn dtype(&self) -> DType {
        self.data.dtype()
    }

    /// Get a reference to the typed storage
    #[must_use]
    pub fn data(&self) -> &TensorData {
        &self.data
    }

    /// Consume the tensor, returning shape and storage
    #[must_use]
    pub fn into_parts(self) -> (Vec<usize>, TensorData) {
        (self.shape, self.data)
    }

    /// View the data as an f32 slice, if the tensor is f32-typed
    #[must_use]
    pub fn as_f32(&self) -> Option<&[f32]> {
        match &self.data {
            TensorData::F32(v) => Some(v),
            _ => None,
        }
    }

    /// Convert numeric elements to f32, widening or narrowing as needed
    ///
    /// # Errors
    ///
    /// Returns `ContractViolation` for boolean tensors; they carry no
    /// numeric interpretation in this harness and must be compared as-is.
    pub fn to_f32(&self) -> Result<Vec<f32>> {
        match &self.data {
            TensorData::F32(v) => Ok(v.clone()),
            TensorData::F64(v) => Ok(v.iter().map(|&x| x as f32).collect()),
            TensorData::I8(v) => Ok(v.iter().map(|&x| f32::from(x)).collect()),
            TensorData::I16(v) => Ok(v.iter().map(|&x| f32::from(x)).collect()),
            TensorData::I32(v) => Ok(v.iter().map(|&x| x as f32).collect()),
            TensorData::U8(v) => Ok(v.iter().map(|&x| f32::from(x)).collect()),
            TensorData::Bool(_) => Err(VerificarError::ContractViolation {
                reason: "Boolean tensor has no f32 interpretation".to_string(),
            }),
        }
    }

    /// Reinterpret the tensor with a new shape of the same total size
    ///
    /// # Errors
    ///
    /// Returns `Err` if the new shape is invalid or its element count
    /// differs from the current one.
    pub fn reshape(self, new_shape: Vec<usize>) -> Result<Self> {
        Self::new(new_shape, self.data)
    }

    /// Serialize the elements as a flat little-endian byte dump (no header)
    #[must_use]
    pub fn to_le_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.size() * self.dtype().size_of());
        match &self.data {
            TensorData::F32(v) => {
                for x in v {
                    bytes.extend_from_slice(&x.to_le_bytes());
                }
            }
            TensorData::F64(v) => {
                for x in v {
                    bytes.extend_from_slice(&x.to_le_bytes());
                }
            }
            TensorData::I8(v) => {
                for x in v {
                    bytes.extend_from_slice(&x.to_le_bytes());
                }
            }
            TensorData::I16(v) => {
                for x in v {
                    bytes.extend_from_slice(&x.to_le_bytes());
                }
            }
            TensorData::I32(v) => {
                for x in v {
                    bytes.extend_from_slice(&x.to_le_bytes());
                }
            }
            TensorData::U8(v) => bytes.extend_from_slice(v),
            TensorData::Bool(v) => bytes.extend(v.iter().map(|&b| u8::from(b))),
        }
        bytes
    }

    /// Deserialize a flat little-endian byte dump into a typed tensor
    ///
    /// # Errors
    ///
    /// Returns `FormatError` if the byte length is not a whole number of
    /// elements for the shape, and shape validation errors from
    /// [`Tensor::new`].
    pub fn from_le_bytes(shape: Vec<usize>, dtype: DType, bytes: &[u8]) -> Result<Self> {
        let elem = dtype.size_of();
        let expected: usize = shape.iter().product::<usize>() * elem;
        if bytes.len() != expected {
            return Err(VerificarError::FormatError {
                reason: format!(
                    "Byte dump is {} bytes, shape {:?} of {} requires {}",
                    bytes.len(),
                    shape,
                    dtype,
                    expected
                ),
            });
        }

        let data = match dtype {
            DType::F32 => TensorData::F32(
                bytes
                    .chunks_exact(4)
                    .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
                    .collect(),
            ),
            DType::F64 => TensorData::F64(
                bytes
                    .chunks_exact(8)
                    .map(|c| {
                        f64::from_le_bytes([c[0], c[1], c[2], c[3], c[4], c[5], c[6], c[7]])
                    })
                    .collect(),
            ),
            DType::I8 => TensorData::I8(bytes.iter().map(|&b| b as i8).collect()),
            DType::I16 => TensorData::I16(
                bytes
                    .chunks_exact(2)
                    .map(|c| i16::from_le_bytes([c[0], c[1]]))
                    .collect(),
            ),
            DType::I32 => TensorData::I32(
                bytes
                    .chunks_exact(4)
                    .map(|c| i32::from_le_bytes([c[0], c[1], c[2], c[3]]))
                    .collect(),
            ),
            DType::U8 => TensorData::U8(bytes.to_vec()),
            DType::Bool => TensorData::Bool(bytes.iter().map(|&b| b != 0).collect()),
        };

        Self::new(shape, data)
    }
}

impl fmt::Display for Tensor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Tensor(dtype={}, shape={:?}, size={})",
            self.dtype(),
            self.shape,
            self.size()
        )
    }
}
