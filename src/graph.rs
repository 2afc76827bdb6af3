//! Exported-program graph model
//!
//! A minimal representation of the computation graph an export/lowering
//! pipeline hands to the harness: typed operation nodes with positional
//! arguments, the set of user-visible inputs, and per-node output metadata.
//! The harness only scans this structure; it never mutates or executes it.

use crate::error::{Result, VerificarError};
use crate::tensor::DType;

/// Operation tag of a graph node
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OpKind {
    /// A graph input slot (covers user inputs as well as weight/bias
    /// constants; the program's user-input set disambiguates).
    Placeholder,
    /// Affine quantization of one tensor (float to integer)
    Quantize,
    /// Affine dequantization of one tensor (integer to float)
    Dequantize,
    /// The designated output node; its arguments reference the nodes whose
    /// values the program returns.
    Output,
    /// Any other operation, carried by name and otherwise opaque
    Other(String),
}

/// Positional argument of a graph node
#[derive(Debug, Clone, PartialEq)]
pub enum Arg {
    /// Reference to another node by name
    Node(String),
    /// Integer literal (zero points, clamp bounds)
    Int(i64),
    /// Float literal (scales)
    Float(f64),
    /// Element type literal
    Type(DType),
}

/// Per-node metadata recorded by the export pipeline
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NodeMeta {
    /// Shape of the value this node produces
    pub shape: Vec<usize>,
}

/// One node of the exported graph
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    /// Unique node name within the graph
    pub name: String,
    /// Operation tag
    pub op: OpKind,
    /// Positional arguments
    pub args: Vec<Arg>,
    /// Export-time metadata
    pub meta: NodeMeta,
}

impl Node {
    /// Create a placeholder node producing a value of the given shape
    #[must_use]
    pub fn placeholder(name: impl Into<String>, shape: Vec<usize>) -> Self {
        Self {
            name: name.into(),
            op: OpKind::Placeholder,
            args: Vec::new(),
            meta: NodeMeta { shape },
        }
    }

    /// Create a quantize node
    ///
    /// Argument layout follows the exporter's convention:
    /// `[input, scale, zero_point, qmin, qmax, dtype]`.
    #[must_use]
    pub fn quantize(
        name: impl Into<String>,
        input: impl Into<String>,
        scale: f64,
        zero_point: i64,
        qmin: i64,
        qmax: i64,
        dtype: DType,
    ) -> Self {
        Self {
            name: name.into(),
            op: OpKind::Quantize,
            args: vec![
                Arg::Node(input.into()),
                Arg::Float(scale),
                Arg::Int(zero_point),
                Arg::Int(qmin),
                Arg::Int(qmax),
                Arg::Type(dtype),
            ],
            meta: NodeMeta::default(),
        }
    }

    /// Create a dequantize node (same argument layout as quantize)
    #[must_use]
    pub fn dequantize(
        name: impl Into<String>,
        input: impl Into<String>,
        scale: f64,
        zero_point: i64,
        qmin: i64,
        qmax: i64,
        dtype: DType,
    ) -> Self {
        let mut node = Self::quantize(name, input, scale, zero_point, qmin, qmax, dtype);
        node.op = OpKind::Dequantize;
        node
    }

    /// Create the designated output node referencing `returns`
    #[must_use]
    pub fn output(name: impl Into<String>, returns: Vec<String>) -> Self {
        Self {
            name: name.into(),
            op: OpKind::Output,
            args: returns.into_iter().map(Arg::Node).collect(),
            meta: NodeMeta::default(),
        }
    }

    /// Positional argument as a node reference
    ///
    /// # Errors
    ///
    /// Returns `Extraction` if the argument is missing or not a reference.
    pub fn arg_node(&self, idx: usize) -> Result<&str> {
        match self.args.get(idx) {
            Some(Arg::Node(name)) => Ok(name),
            other => Err(self.arg_error(idx, "node reference", other)),
        }
    }

    /// Positional argument as a float literal
    ///
    /// # Errors
    ///
    /// Returns `Extraction` if the argument is missing or not a float.
    pub fn arg_float(&self, idx: usize) -> Result<f64> {
        match self.args.get(idx) {
            Some(Arg::Float(v)) => Ok(*v),
            other => Err(self.arg_error(idx, "float literal", other)),
        }
    }

    /// Positional argument as an integer literal
    ///
    /// # Errors
    ///
    /// Returns `Extraction` if the argument is missing or not an integer.
    pub fn arg_int(&self, idx: usize) -> Result<i64> {
        match self.args.get(idx) {
            Some(Arg::Int(v)) => Ok(*v),
            other => Err(self.arg_error(idx, "integer literal", other)),
        }
    }

    /// Positional argument as an element type literal
    ///
    /// # Errors
    ///
    /// Returns `Extraction` if the argument is missing or not a type.
    pub fn arg_dtype(&self, idx: usize) -> Result<DType> {
        match self.args.get(idx) {
            Some(Arg::Type(t)) => Ok(*t),
            other => Err(self.arg_error(idx, "element type", other)),
        }
    }

    fn arg_error(&self, idx: usize, expected: &str, found: Option<&Arg>) -> VerificarError {
        VerificarError::Extraction {
            reason: format!(
                "Node '{}' argument {idx}: expected {expected}, found {found:?}",
                self.name
            ),
        }
    }
}

/// An exported program: ordered graph nodes plus its user-input set
///
/// Two variants of the same model typically exist side by side (the exported
/// graph carrying quantization ops, and a lowered variant whose declared
/// input order is authoritative); both are instances of this type.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportedProgram {
    nodes: Vec<Node>,
    user_inputs: Vec<String>,
}

impl ExportedProgram {
    /// Create a program from nodes in traversal order and its user inputs
    #[must_use]
    pub fn new(nodes: Vec<Node>, user_inputs: Vec<String>) -> Self {
        Self { nodes, user_inputs }
    }

    /// Graph nodes in traversal order
    #[must_use]
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// Names of the user-visible inputs (excludes weight/bias placeholders)
    #[must_use]
    pub fn user_inputs(&self) -> &[String] {
        &self.user_inputs
    }

    /// Look up a node by name
    #[must_use]
    pub fn node(&self, name: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.name == name)
    }
}
