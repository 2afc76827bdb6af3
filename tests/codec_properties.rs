//! Property-based tests for the tensor codec and layout transposer
//!
//! These tests use proptest to pin the quantization round-trip error bound,
//! the transpose round-trip law, and the npy file format.

use proptest::prelude::*;

use verificar::codec::{read_npy, save_npy, write_npy};
use verificar::layout::{to_data_format, DataFormat};
use verificar::{DType, QuantizationParams, Tensor, TensorData};

fn params(scale: f64, zero_point: i64) -> QuantizationParams {
    QuantizationParams {
        node_name: "x0".to_string(),
        zero_point,
        scale,
        qmin: -128,
        qmax: 127,
        dtype: DType::I8,
    }
}

/// Strategy for rank-4 tensors with small dims and arbitrary finite values
fn rank4_strategy() -> impl Strategy<Value = Tensor> {
    (1usize..=3, 1usize..=3, 1usize..=4, 1usize..=4).prop_flat_map(|(n, c, h, w)| {
        let size = n * c * h * w;
        prop::collection::vec(-1000.0f32..1000.0, size..=size)
            .prop_map(move |data| Tensor::from_f32(vec![n, c, h, w], data).unwrap())
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    /// Quantize-then-dequantize stays within one quantization step of the
    /// original whenever the value is inside the representable range
    #[test]
    fn quantization_roundtrip_is_bounded(
        value in -100.0f32..100.0,
        scale in 0.01f64..2.0,
        zero_point in -32i64..32,
    ) {
        let qp = params(scale, zero_point);
        let q = qp.quantize_value(value);
        // Skip values that clamp; the law only holds inside the range
        prop_assume!(q > qp.qmin && q < qp.qmax);
        let back = qp.dequantize_value(q);
        let half_step = (scale / 2.0) as f32;
        prop_assert!(
            (back - value).abs() <= half_step * 1.001,
            "value {value} -> {q} -> {back}, step {scale}"
        );
    }

    /// Dequantized values always land on the affine lattice
    #[test]
    fn dequantize_is_affine(q in -128i64..=127, scale in 0.01f64..2.0, zp in -32i64..32) {
        let qp = params(scale, zp);
        let expected = ((q - zp) as f64 * scale) as f32;
        prop_assert_eq!(qp.dequantize_value(q), expected);
    }

    /// Channel-last then channel-first recovers the original rank-4 tensor
    #[test]
    fn transpose_roundtrip_is_identity(t in rank4_strategy()) {
        let nhwc = to_data_format(&t, DataFormat::Nhwc).unwrap();
        let back = to_data_format(&nhwc, DataFormat::Nchw).unwrap();
        prop_assert_eq!(back, t);
    }

    /// The opposite composition round-trips as well (the permutations are
    /// true inverses)
    #[test]
    fn transpose_roundtrip_other_direction(t in rank4_strategy()) {
        let nchw = to_data_format(&t, DataFormat::Nchw).unwrap();
        let back = to_data_format(&nchw, DataFormat::Nhwc).unwrap();
        prop_assert_eq!(back, t);
    }

    /// Transposition only permutes: the multiset of values is unchanged
    #[test]
    fn transpose_preserves_values(t in rank4_strategy()) {
        let nhwc = to_data_format(&t, DataFormat::Nhwc).unwrap();
        let mut before = t.as_f32().unwrap().to_vec();
        let mut after = nhwc.as_f32().unwrap().to_vec();
        before.sort_by(f32::total_cmp);
        after.sort_by(f32::total_cmp);
        prop_assert_eq!(before, after);
    }

    /// Tensors of any rank other than 4 pass through unchanged
    #[test]
    fn non_rank4_is_identity(
        dims in prop::collection::vec(1usize..=4, 1..=3),
    ) {
        let size: usize = dims.iter().product();
        let t = Tensor::from_f32(dims, (0..size).map(|i| i as f32).collect()).unwrap();
        let out = to_data_format(&t, DataFormat::Nhwc).unwrap();
        prop_assert_eq!(out, t);
    }

    /// npy write-then-read round-trips shape and payload
    #[test]
    fn npy_roundtrip_f32(
        dims in prop::collection::vec(1usize..=5, 1..=3),
    ) {
        let size: usize = dims.iter().product();
        let data: Vec<f32> = (0..size).map(|i| i as f32 * 0.5 - 3.0).collect();
        let t = Tensor::from_f32(dims, data).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t.npy");
        write_npy(&path, &t).unwrap();
        let back = read_npy(&path).unwrap();
        prop_assert_eq!(back, t);
    }

    /// Quantized saves honor the clamp range
    #[test]
    fn saved_quantized_values_are_clamped(
        values in prop::collection::vec(-10_000.0f32..10_000.0, 1..=16),
        scale in 0.01f64..1.0,
    ) {
        let qp = params(scale, 0);
        let len = values.len();
        let t = Tensor::from_f32(vec![len], values).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = save_npy(dir.path(), &t, Some(&qp), "x0").unwrap();
        let back = read_npy(&path).unwrap();
        prop_assert_eq!(back.dtype(), DType::I8);
        if let TensorData::I8(q) = back.data() {
            for &v in q {
                prop_assert!(i64::from(v) >= qp.qmin && i64::from(v) <= qp.qmax);
            }
        }
    }
}

#[test]
fn npy_roundtrip_every_dtype() {
    let dir = tempfile::tempdir().unwrap();
    let cases = vec![
        Tensor::new(vec![2], TensorData::F32(vec![1.5, -2.0])).unwrap(),
        Tensor::new(vec![2], TensorData::F64(vec![1.5, -2.0])).unwrap(),
        Tensor::new(vec![3], TensorData::I8(vec![-128, 0, 127])).unwrap(),
        Tensor::new(vec![2], TensorData::I16(vec![-300, 300])).unwrap(),
        Tensor::new(vec![2], TensorData::I32(vec![-70_000, 70_000])).unwrap(),
        Tensor::new(vec![2], TensorData::U8(vec![0, 255])).unwrap(),
        Tensor::new(vec![2], TensorData::Bool(vec![true, false])).unwrap(),
    ];
    for (i, t) in cases.into_iter().enumerate() {
        let path = dir.path().join(format!("t{i}.npy"));
        write_npy(&path, &t).unwrap();
        assert_eq!(read_npy(&path).unwrap(), t, "dtype {}", t.dtype());
    }
}
