//! Diagnostic graph dumper
//!
//! Renders a binary graph blob as a structured JSON document for debugging,
//! by shelling out to the flatbuffers schema compiler. The FP32
//! reinterpretation pass is best effort: tensor payloads arrive as raw byte
//! lists, and turning them back into floats is nice to have but never worth
//! failing a dump over. A failed pass downgrades the report to `Partial`
//! instead of raising.

use std::path::Path;

use serde_json::Value;

use crate::error::{Result, VerificarError};
use crate::runner;

/// Result of a diagnostic dump
///
/// Always carries a document; `Partial` means the FP32 reinterpretation
/// pass did not complete and byte lists were left as-is.
#[derive(Debug)]
pub enum DumpReport {
    /// Document with FP32 tensor payloads decoded to floats
    Full(Value),
    /// Document with raw byte payloads and the reason decoding stopped
    Partial {
        /// The rendered document
        document: Value,
        /// Why the reinterpretation pass gave up
        reason: String,
    },
}

impl DumpReport {
    /// The rendered document, regardless of completeness
    #[must_use]
    pub fn document(&self) -> &Value {
        match self {
            DumpReport::Full(document) | DumpReport::Partial { document, .. } => document,
        }
    }
}

/// Render a binary graph blob as JSON using the external schema compiler
///
/// # Errors
///
/// - `Precondition`: the schema file does not exist.
/// - `ToolNotFound`: `flatc` is not on PATH.
/// - `SubprocessFailure`: `flatc` exited nonzero.
/// - `IoError` / `FormatError`: scratch-file or JSON handling failed.
///
/// The FP32 reinterpretation step never fails the call; see [`DumpReport`].
pub fn dump_graph_json(graph: &[u8], schema: &Path) -> Result<DumpReport> {
    if !schema.is_file() {
        return Err(VerificarError::Precondition {
            reason: format!("Schema file '{}' does not exist", schema.display()),
        });
    }
    let flatc = runner::resolve_tool("flatc").ok_or_else(|| VerificarError::ToolNotFound {
        tool: "flatc".to_string(),
        hint: "install the flatbuffers schema compiler".to_string(),
    })?;

    let scratch = tempfile::tempdir().map_err(|e| VerificarError::IoError {
        message: format!("Failed to create scratch directory: {e}"),
    })?;
    let blob_path = scratch.path().join("output.tosa");
    std::fs::write(&blob_path, graph).map_err(|e| VerificarError::IoError {
        message: format!("Failed to write '{}': {e}", blob_path.display()),
    })?;

    let argv = vec![
        flatc.display().to_string(),
        "--json".to_string(),
        "--strict-json".to_string(),
        "-o".to_string(),
        scratch.path().display().to_string(),
        "--raw-binary".to_string(),
        "-t".to_string(),
        schema.display().to_string(),
        "--".to_string(),
        blob_path.display().to_string(),
    ];
    runner::run_cmd(&argv, true)?;

    let json_path = scratch.path().join("output.json");
    let contents = std::fs::read_to_string(&json_path).map_err(|e| VerificarError::IoError {
        message: format!("Failed to read '{}': {e}", json_path.display()),
    })?;
    let mut document: Value =
        serde_json::from_str(&contents).map_err(|e| VerificarError::FormatError {
            reason: format!("Schema compiler produced invalid JSON: {e}"),
        })?;

    match reinterpret_fp32_tensors(&mut document) {
        Ok(()) => Ok(DumpReport::Full(document)),
        Err(reason) => Ok(DumpReport::Partial { document, reason }),
    }
}

/// Decode every FP32 tensor's byte list into floats, in place
///
/// The schema compiler renders constant payloads as lists of bytes; for
/// FP32 tensors those are little-endian f32 values.
fn reinterpret_fp32_tensors(document: &mut Value) -> std::result::Result<(), String> {
    let regions = document
        .get_mut("regions")
        .and_then(Value::as_array_mut)
        .ok_or("no regions array")?;

    for region in regions {
        let blocks = region
            .get_mut("blocks")
            .and_then(Value::as_array_mut)
            .ok_or("region without blocks array")?;
        for block in blocks {
            let tensors = block
                .get_mut("tensors")
                .and_then(Value::as_array_mut)
                .ok_or("block without tensors array")?;
            for tensor in tensors {
                if tensor.get("type").and_then(Value::as_str) != Some("FP32") {
                    continue;
                }
                let Some(data) = tensor.get("data").and_then(Value::as_array) else {
                    continue;
                };
                let bytes: Vec<u8> = data
                    .iter()
                    .map(|v| {
                        v.as_i64()
                            .map(|x| x as u8)
                            .ok_or("non-numeric byte in tensor data")
                    })
                    .collect::<std::result::Result<_, _>>()?;
                if bytes.len() % 4 != 0 {
                    return Err(format!(
                        "FP32 tensor byte count {} is not a multiple of 4",
                        bytes.len()
                    ));
                }
                let floats: Vec<Value> = bytes
                    .chunks_exact(4)
                    .map(|c| {
                        Value::from(f64::from(f32::from_le_bytes([c[0], c[1], c[2], c[3]])))
                    })
                    .collect();
                tensor["data"] = Value::Array(floats);
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_reinterpret_decodes_fp32_bytes() {
        let one = 1.0f32.to_le_bytes();
        let mut document = json!({
            "regions": [{
                "blocks": [{
                    "tensors": [{
                        "type": "FP32",
                        "shape": [1],
                        "data": [one[0], one[1], one[2], one[3]]
                    }]
                }]
            }]
        });
        reinterpret_fp32_tensors(&mut document).unwrap();
        let data = &document["regions"][0]["blocks"][0]["tensors"][0]["data"];
        assert!((data[0].as_f64().unwrap() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_reinterpret_skips_non_fp32_tensors() {
        let mut document = json!({
            "regions": [{
                "blocks": [{
                    "tensors": [{ "type": "INT8", "data": [1, 2, 3] }]
                }]
            }]
        });
        reinterpret_fp32_tensors(&mut document).unwrap();
        assert_eq!(
            document["regions"][0]["blocks"][0]["tensors"][0]["data"],
            json!([1, 2, 3])
        );
    }

    #[test]
    fn test_reinterpret_skips_tensors_without_data() {
        let mut document = json!({
            "regions": [{ "blocks": [{ "tensors": [{ "type": "FP32", "shape": [4] }] }] }]
        });
        assert!(reinterpret_fp32_tensors(&mut document).is_ok());
    }

    #[test]
    fn test_reinterpret_reports_ragged_byte_count() {
        let mut document = json!({
            "regions": [{
                "blocks": [{ "tensors": [{ "type": "FP32", "data": [0, 0, 128] }] }]
            }]
        });
        let reason = reinterpret_fp32_tensors(&mut document).unwrap_err();
        assert!(reason.contains("multiple of 4"));
    }

    #[test]
    fn test_reinterpret_without_regions_is_partial() {
        let mut document = json!({ "version": { "_major": 0, "_minor": 80 } });
        assert!(reinterpret_fp32_tensors(&mut document).is_err());
    }

    #[test]
    fn test_missing_schema_is_precondition() {
        let err = dump_graph_json(&[0u8; 4], Path::new("/nonexistent/schema.fbs")).unwrap_err();
        assert!(matches!(err, VerificarError::Precondition { .. }));
    }

    #[test]
    fn test_report_exposes_document_in_both_variants() {
        let doc = json!({"a": 1});
        assert_eq!(DumpReport::Full(doc.clone()).document(), &doc);
        let partial = DumpReport::Partial {
            document: doc.clone(),
            reason: "x".to_string(),
        };
        assert_eq!(partial.document(), &doc);
    }
}
