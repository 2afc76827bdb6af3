//! Quantization parameter extraction
//!
//! Scans an exported graph for the per-tensor affine quantization parameters
//! attached to its declared inputs and outputs. The scan is pure: it walks
//! the node list once and never mutates the program.
//!
//! The affine mapping is the usual one: `q = round(v/scale + zp)` clamped to
//! `[qmin, qmax]`, and back via `v = (q - zp) * scale`.

use crate::error::{Result, VerificarError};
use crate::graph::{ExportedProgram, Node, OpKind};
use crate::tensor::DType;

/// Per-tensor affine quantization parameters
///
/// One record per quantized input or output. Created once per test run from
/// the exported graph and never mutated.
#[derive(Debug, Clone, PartialEq)]
pub struct QuantizationParams {
    /// Name of the tensor this record quantizes
    pub node_name: String,
    /// Zero point
    pub zero_point: i64,
    /// Scale
    pub scale: f64,
    /// Inclusive clamp minimum
    pub qmin: i64,
    /// Inclusive clamp maximum
    pub qmax: i64,
    /// Element type of the quantized representation
    pub dtype: DType,
}

impl QuantizationParams {
    /// Quantize one value: `clamp(round(v/scale + zp), qmin, qmax)`
    #[must_use]
    pub fn quantize_value(&self, value: f32) -> i64 {
        let q = (f64::from(value) / self.scale + self.zero_point as f64).round() as i64;
        q.clamp(self.qmin, self.qmax)
    }

    /// Dequantize one value: `(q - zp) * scale`
    #[must_use]
    pub fn dequantize_value(&self, quantized: i64) -> f32 {
        ((quantized - self.zero_point) as f64 * self.scale) as f32
    }

    pub(crate) fn from_node(node: &Node) -> Result<Self> {
        Ok(Self {
            node_name: node.arg_node(0)?.to_string(),
            scale: node.arg_float(1)?,
            zero_point: node.arg_int(2)?,
            qmin: node.arg_int(3)?,
            qmax: node.arg_int(4)?,
            dtype: node.arg_dtype(5)?,
        })
    }
}

/// Names of the program's user inputs, in graph traversal order
///
/// Placeholders also cover weights and biases; only those listed in the
/// program's user-input set are returned.
#[must_use]
pub fn input_names(program: &ExportedProgram) -> Vec<String> {
    program
        .nodes()
        .iter()
        .filter(|node| {
            node.op == OpKind::Placeholder && program.user_inputs().contains(&node.name)
        })
        .map(|node| node.name.clone())
        .collect()
}

/// Input quantization parameters, at most one per declared input
///
/// Scans for quantize operations applied directly to a user input and stops
/// early once every input has a record.
///
/// # Errors
///
/// Returns `Extraction` if no parameters are found: the model was expected
/// to be quantized but no quantization was discovered.
pub fn input_quantization_params(program: &ExportedProgram) -> Result<Vec<QuantizationParams>> {
    let names = input_names(program);
    let mut params = Vec::new();

    for node in program.nodes() {
        if node.op != OpKind::Quantize {
            continue;
        }
        let quantized_input = node.arg_node(0)?;
        if names.iter().any(|n| n == quantized_input) {
            params.push(QuantizationParams::from_node(node)?);
            if params.len() == names.len() {
                break;
            }
        }
    }

    if params.is_empty() {
        return Err(VerificarError::Extraction {
            reason: "No quantization parameters found in exported model".to_string(),
        });
    }
    Ok(params)
}

/// Nodes referenced by the program's designated output node
///
/// # Errors
///
/// Returns `Extraction` if the program has no output node or it references
/// nothing.
pub fn output_nodes(program: &ExportedProgram) -> Result<Vec<Node>> {
    let mut outputs = Vec::new();
    for node in program.nodes() {
        if node.op != OpKind::Output {
            continue;
        }
        for idx in 0..node.args.len() {
            let name = node.arg_node(idx)?;
            let referenced = program
                .node(name)
                .ok_or_else(|| VerificarError::Extraction {
                    reason: format!("Output references unknown node '{name}'"),
                })?;
            outputs.push(referenced.clone());
        }
    }

    if outputs.is_empty() {
        return Err(VerificarError::Extraction {
            reason: "No output nodes found".to_string(),
        });
    }
    Ok(outputs)
}

/// Output quantization parameters, one per dequantize output node
///
/// # Errors
///
/// Returns `Extraction` if no output carries dequantization parameters.
pub fn output_quantization_params(outputs: &[Node]) -> Result<Vec<QuantizationParams>> {
    let mut params = Vec::new();
    for node in outputs {
        if node.op == OpKind::Dequantize {
            params.push(QuantizationParams::from_node(node)?);
        }
    }

    if params.is_empty() {
        return Err(VerificarError::Extraction {
            reason: "No output quantization parameters found in exported model".to_string(),
        });
    }
    Ok(params)
}
