//! Tensor file codec
//!
//! Converts in-memory tensors to and from the two on-disk representations
//! the external backends consume: self-describing NumPy `.npy` files (v1.0
//! header) for the file-based reference model, and headerless little-endian
//! `.bin` dumps for the hardware simulator. Quantization is applied on the
//! way out when the run is quantized; the decode path dequantizes and
//! normalizes element types for comparison against the reference.

use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use num_traits::NumCast;

use crate::error::{Result, VerificarError};
use crate::quantize::QuantizationParams;
use crate::tensor::{DType, Tensor, TensorData};

const NUMPY_MAGIC: &[u8; 6] = b"\x93NUMPY";

/// Prepare a tensor for saving: contiguous row-major copy, quantized to the
/// record's element type when `quant` is present
///
/// # Errors
///
/// Returns `ContractViolation` if the quantization record is bound to a
/// different tensor than `name` (the record's tensor name must be a
/// substring of the target name), or if a quantized value does not fit the
/// record's element type.
pub fn prep_for_save(
    tensor: &Tensor,
    quant: Option<&QuantizationParams>,
    name: &str,
) -> Result<Tensor> {
    let Some(qp) = quant else {
        return Ok(tensor.clone());
    };

    if !name.contains(qp.node_name.as_str()) {
        return Err(VerificarError::ContractViolation {
            reason: format!(
                "Quantization params name '{}' does not match input tensor name '{name}'",
                qp.node_name
            ),
        });
    }

    let values = tensor.to_f32()?;
    let shape = tensor.shape().to_vec();
    let data = match qp.dtype {
        DType::I8 => TensorData::I8(quantize_slice(&values, qp)?),
        DType::I16 => TensorData::I16(quantize_slice(&values, qp)?),
        DType::I32 => TensorData::I32(quantize_slice(&values, qp)?),
        DType::U8 => TensorData::U8(quantize_slice(&values, qp)?),
        other => {
            return Err(VerificarError::ContractViolation {
                reason: format!("Quantization to non-integer element type {other}"),
            })
        }
    };
    Tensor::new(shape, data)
}

fn quantize_slice<T: NumCast>(values: &[f32], qp: &QuantizationParams) -> Result<Vec<T>> {
    values
        .iter()
        .map(|&v| {
            let q = qp.quantize_value(v);
            NumCast::from(q).ok_or_else(|| VerificarError::ContractViolation {
                reason: format!("Quantized value {q} does not fit element type {}", qp.dtype),
            })
        })
        .collect()
}

/// Save a tensor as `<dir>/<name>.npy`, quantizing first when configured
///
/// # Errors
///
/// Propagates [`prep_for_save`] errors and I/O failures.
pub fn save_npy(
    dir: &Path,
    tensor: &Tensor,
    quant: Option<&QuantizationParams>,
    name: &str,
) -> Result<PathBuf> {
    let prepared = prep_for_save(tensor, quant, name)?;
    let path = dir.join(format!("{name}.npy"));
    write_npy(&path, &prepared)?;
    Ok(path)
}

/// Save a tensor as `<dir>/<name>.bin`, a flat little-endian byte dump with
/// no header, quantizing first when configured
///
/// # Errors
///
/// Propagates [`prep_for_save`] errors and I/O failures.
pub fn save_bytes(
    dir: &Path,
    tensor: &Tensor,
    quant: Option<&QuantizationParams>,
    name: &str,
) -> Result<PathBuf> {
    let prepared = prep_for_save(tensor, quant, name)?;
    let path = dir.join(format!("{name}.bin"));
    let mut file = File::create(&path).map_err(|e| VerificarError::IoError {
        message: format!("Failed to create '{}': {e}", path.display()),
    })?;
    file.write_all(&prepared.to_le_bytes())
        .map_err(|e| VerificarError::IoError {
            message: format!("Failed to write '{}': {e}", path.display()),
        })?;
    Ok(path)
}

/// Write a tensor as a NumPy `.npy` v1.0 file
///
/// Layout: `\x93NUMPY` | major(1) | minor(1) | header_len(u16 LE) | header
/// dict | data. The header is padded so the data starts 64-byte aligned.
///
/// # Errors
///
/// Returns `IoError` on write failure.
pub fn write_npy(path: &Path, tensor: &Tensor) -> Result<()> {
    let shape_str = if tensor.shape().len() == 1 {
        format!("({},)", tensor.shape()[0])
    } else {
        let dims: Vec<String> = tensor.shape().iter().map(ToString::to_string).collect();
        format!("({})", dims.join(", "))
    };
    let header_dict = format!(
        "{{'descr': '{}', 'fortran_order': False, 'shape': {shape_str}, }}",
        tensor.dtype().numpy_descr()
    );

    // magic + major + minor + header_len prefix, then pad to 64 bytes
    let prefix_len = 6 + 1 + 1 + 2;
    let unpadded = prefix_len + header_dict.len() + 1;
    let padding = (64 - (unpadded % 64)) % 64;
    let padded_header = format!("{header_dict}{}\n", " ".repeat(padding));

    let mut file = File::create(path).map_err(|e| VerificarError::IoError {
        message: format!("Failed to create '{}': {e}", path.display()),
    })?;
    let write = |file: &mut File, bytes: &[u8]| {
        file.write_all(bytes).map_err(|e| VerificarError::IoError {
            message: format!("Failed to write '{}': {e}", path.display()),
        })
    };
    write(&mut file, NUMPY_MAGIC)?;
    write(&mut file, &[1u8, 0u8])?;
    write(&mut file, &(padded_header.len() as u16).to_le_bytes())?;
    write(&mut file, padded_header.as_bytes())?;
    write(&mut file, &tensor.to_le_bytes())?;
    Ok(())
}

/// Read a NumPy `.npy` file into a typed tensor
///
/// Supports v1.0 and v2.0 headers, little-endian payloads only.
///
/// # Errors
///
/// Returns `IoError` on read failure and `FormatError` on a malformed or
/// unsupported header.
pub fn read_npy(path: &Path) -> Result<Tensor> {
    let mut file = File::open(path).map_err(|e| VerificarError::IoError {
        message: format!("Failed to open '{}': {e}", path.display()),
    })?;
    let mut bytes = Vec::new();
    file.read_to_end(&mut bytes)
        .map_err(|e| VerificarError::IoError {
            message: format!("Failed to read '{}': {e}", path.display()),
        })?;

    fn format_err(path: &Path, reason: String) -> VerificarError {
        VerificarError::FormatError {
            reason: format!("{}: {reason}", path.display()),
        }
    }

    if bytes.len() < 10 || &bytes[..6] != NUMPY_MAGIC {
        return Err(format_err(path, "not an npy file (bad magic)".to_string()));
    }
    let (major, minor) = (bytes[6], bytes[7]);
    let (header_len, header_start) = match major {
        1 => (u16::from_le_bytes([bytes[8], bytes[9]]) as usize, 10),
        2 => {
            if bytes.len() < 12 {
                return Err(format_err(path, "truncated v2 header".to_string()));
            }
            (
                u32::from_le_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]) as usize,
                12,
            )
        }
        _ => return Err(format_err(path, format!("unsupported npy version {major}.{minor}"))),
    };

    let data_start = header_start + header_len;
    if bytes.len() < data_start {
        return Err(format_err(path, "truncated header".to_string()));
    }
    let header = std::str::from_utf8(&bytes[header_start..data_start])
        .map_err(|e| format_err(path, format!("header is not UTF-8: {e}")))?;

    let descr = parse_header_descr(header).map_err(|r| format_err(path, r))?;
    let dtype = DType::from_numpy_descr(&descr)
        .ok_or_else(|| format_err(path, format!("unsupported descr '{descr}'")))?;
    let mut shape = parse_header_shape(header).map_err(|r| format_err(path, r))?;
    if shape.is_empty() {
        // 0-d array: one element
        shape = vec![1];
    }

    Tensor::from_le_bytes(shape, dtype, &bytes[data_start..])
}

fn parse_header_descr(header: &str) -> std::result::Result<String, String> {
    let key_start = header.find("'descr'").ok_or("missing descr")?;
    let after = &header[key_start + "'descr'".len()..];
    let open = after.find('\'').ok_or("bad descr format")?;
    let rest = &after[open + 1..];
    let close = rest.find('\'').ok_or("unterminated descr")?;
    Ok(rest[..close].to_string())
}

fn parse_header_shape(header: &str) -> std::result::Result<Vec<usize>, String> {
    let key_start = header.find("'shape'").ok_or("missing shape")?;
    let after = &header[key_start..];
    let open = after.find('(').ok_or("bad shape format")?;
    let close = after.find(')').ok_or("unterminated shape")?;
    after[open + 1..close]
        .split(',')
        .filter(|s| !s.trim().is_empty())
        .map(|s| {
            s.trim()
                .parse::<usize>()
                .map_err(|e| format!("bad shape dimension '{}': {e}", s.trim()))
        })
        .collect()
}

/// Decode one backend output for comparison against the reference
///
/// Boolean outputs pass through verbatim. With quantization parameters,
/// integer payloads are widened to i32 and dequantized to f32. Double
/// precision results are narrowed to single precision.
///
/// # Errors
///
/// Returns `ContractViolation` if quantization parameters are supplied for
/// a payload that cannot be dequantized.
pub fn decode_output(tensor: Tensor, quant: Option<&QuantizationParams>) -> Result<Tensor> {
    if tensor.dtype() == DType::Bool {
        // Bool outputs survive quantized models (comparison ops); keep them.
        return Ok(tensor);
    }

    if let Some(qp) = quant {
        if tensor.dtype().is_integer() {
            let shape = tensor.shape().to_vec();
            let widened: Vec<i64> = match tensor.data() {
                TensorData::I8(v) => v.iter().map(|&x| <i64 as From<_>>::from(x)).collect(),
                TensorData::I16(v) => v.iter().map(|&x| <i64 as From<_>>::from(x)).collect(),
                TensorData::I32(v) => v.iter().map(|&x| <i64 as From<_>>::from(x)).collect(),
                TensorData::U8(v) => v.iter().map(|&x| <i64 as From<_>>::from(x)).collect(),
                _ => unreachable!("is_integer covers exactly these variants"),
            };
            let values: Vec<f32> = widened.iter().map(|&q| qp.dequantize_value(q)).collect();
            return Tensor::new(shape, TensorData::F32(values));
        }
    }

    if tensor.dtype() == DType::F64 {
        let shape = tensor.shape().to_vec();
        let values = tensor.to_f32()?;
        return Tensor::new(shape, TensorData::F32(values));
    }

    Ok(tensor)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn qp(name: &str) -> QuantizationParams {
        QuantizationParams {
            node_name: name.to_string(),
            zero_point: 2,
            scale: 0.5,
            qmin: -128,
            qmax: 127,
            dtype: DType::I8,
        }
    }

    #[test]
    fn test_prep_without_quantization_is_copy() {
        let t = Tensor::from_f32(vec![2], vec![1.0, 2.0]).unwrap();
        let prepared = prep_for_save(&t, None, "x0").unwrap();
        assert_eq!(prepared, t);
    }

    #[test]
    fn test_prep_quantizes_to_record_dtype() {
        let t = Tensor::from_f32(vec![3], vec![0.0, 1.0, -1.0]).unwrap();
        let prepared = prep_for_save(&t, Some(&qp("x0")), "x0").unwrap();
        assert_eq!(prepared.dtype(), DType::I8);
        // 0.0/0.5 + 2 = 2, 1.0/0.5 + 2 = 4, -1.0/0.5 + 2 = 0
        assert_eq!(
            prepared.data(),
            &TensorData::I8(vec![2, 4, 0])
        );
    }

    #[test]
    fn test_prep_name_mismatch_fails() {
        let t = Tensor::from_f32(vec![1], vec![0.0]).unwrap();
        let err = prep_for_save(&t, Some(&qp("other")), "x0").unwrap_err();
        assert!(matches!(err, VerificarError::ContractViolation { .. }));
    }

    #[test]
    fn test_prep_accepts_name_substring() {
        let t = Tensor::from_f32(vec![1], vec![0.0]).unwrap();
        assert!(prep_for_save(&t, Some(&qp("x0")), "model_x0_input").is_ok());
    }

    #[test]
    fn test_npy_roundtrip_f32() {
        let dir = tempdir().unwrap();
        let t = Tensor::from_f32(vec![2, 3], vec![1.0, -2.5, 3.0, 0.0, 5.5, -6.0]).unwrap();
        let path = save_npy(dir.path(), &t, None, "x0").unwrap();
        assert!(path.ends_with("x0.npy"));
        let back = read_npy(&path).unwrap();
        assert_eq!(back, t);
    }

    #[test]
    fn test_npy_roundtrip_quantized_i8() {
        let dir = tempdir().unwrap();
        let t = Tensor::from_f32(vec![4], vec![0.5, 1.0, -0.5, 2.0]).unwrap();
        let path = save_npy(dir.path(), &t, Some(&qp("x0")), "x0").unwrap();
        let back = read_npy(&path).unwrap();
        assert_eq!(back.dtype(), DType::I8);
        assert_eq!(back.shape(), &[4]);
    }

    #[test]
    fn test_npy_header_is_aligned() {
        let dir = tempdir().unwrap();
        let t = Tensor::from_f32(vec![1], vec![1.0]).unwrap();
        let path = save_npy(dir.path(), &t, None, "x0").unwrap();
        let bytes = std::fs::read(&path).unwrap();
        // Data section starts at a 64-byte boundary
        let header_len = u16::from_le_bytes([bytes[8], bytes[9]]) as usize;
        assert_eq!((10 + header_len) % 64, 0);
    }

    #[test]
    fn test_save_bytes_is_headerless() {
        let dir = tempdir().unwrap();
        let t = Tensor::from_f32(vec![2], vec![1.0, 2.0]).unwrap();
        let path = save_bytes(dir.path(), &t, None, "x0").unwrap();
        assert!(path.ends_with("x0.bin"));
        let bytes = std::fs::read(&path).unwrap();
        assert_eq!(bytes.len(), 8);
        assert_eq!(&bytes[..4], &1.0f32.to_le_bytes());
    }

    #[test]
    fn test_read_npy_rejects_bad_magic() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bad.npy");
        std::fs::write(&path, b"not an npy file at all").unwrap();
        assert!(matches!(
            read_npy(&path).unwrap_err(),
            VerificarError::FormatError { .. }
        ));
    }

    #[test]
    fn test_decode_output_dequantizes_i8() {
        let t = Tensor::new(vec![2], TensorData::I8(vec![4, 0])).unwrap();
        let decoded = decode_output(t, Some(&qp("out"))).unwrap();
        assert_eq!(decoded.dtype(), DType::F32);
        // (4 - 2) * 0.5 = 1.0, (0 - 2) * 0.5 = -1.0
        assert_eq!(decoded.as_f32().unwrap(), &[1.0, -1.0]);
    }

    #[test]
    fn test_decode_output_narrows_f64() {
        let t = Tensor::new(vec![2], TensorData::F64(vec![1.5, -2.5])).unwrap();
        let decoded = decode_output(t, None).unwrap();
        assert_eq!(decoded.dtype(), DType::F32);
    }

    #[test]
    fn test_decode_output_keeps_bool_verbatim() {
        let t = Tensor::new(vec![2], TensorData::Bool(vec![true, false])).unwrap();
        let decoded = decode_output(t.clone(), Some(&qp("out"))).unwrap();
        assert_eq!(decoded, t);
    }

    #[test]
    fn test_decode_output_passes_f32_through() {
        let t = Tensor::from_f32(vec![2], vec![1.0, 2.0]).unwrap();
        let decoded = decode_output(t.clone(), None).unwrap();
        assert_eq!(decoded, t);
    }
}
