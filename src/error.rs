//! Error types for verificar operations
//!
//! One crate-wide error enum covering the full failure taxonomy of the
//! harness: precondition violations, graph extraction failures, missing
//! external tools, subprocess failures, caller contract violations and
//! unsupported graph layouts. No failure is retried; every error carries
//! enough context to diagnose the run from the message alone.

use thiserror::Error;

/// Main error type for verificar operations
#[derive(Debug, Error)]
pub enum VerificarError {
    /// A runner was used before its preconditions held (uninitialized
    /// session, unknown target, missing build artifact).
    #[error("Precondition failed: {reason}")]
    Precondition {
        /// What was expected and what was found
        reason: String,
    },

    /// Scanning the exported graph found none of the expected nodes
    /// (no quantization parameters, no output nodes). Signals a malformed
    /// or mis-exported model.
    #[error("Extraction failed: {reason}")]
    Extraction {
        /// Which scan failed and over what
        reason: String,
    },

    /// An external executable could not be resolved.
    #[error("Tool '{tool}' not found: {hint}")]
    ToolNotFound {
        /// The executable that was looked up
        tool: String,
        /// The setup step the user should run
        hint: String,
    },

    /// An external tool exited nonzero or its output matched a fault
    /// pattern. Carries the full command line and captured output.
    #[error("Subprocess failed: {command}\nstdout:\n{stdout}\nstderr:\n{stderr}")]
    SubprocessFailure {
        /// The command line that was executed
        command: String,
        /// Captured standard output
        stdout: String,
        /// Captured standard error
        stderr: String,
    },

    /// Positional lists that must zip exactly did not, or a quantization
    /// record was bound to the wrong tensor. Caller programming error,
    /// never recoverable.
    #[error("Contract violation: {reason}")]
    ContractViolation {
        /// The mismatched contract
        reason: String,
    },

    /// The artifact directory describes a graph shape the harness does not
    /// support (e.g. multi-partition graphs with several manifests).
    #[error("Unsupported graph: {reason}")]
    UnsupportedGraph {
        /// Why the graph cannot be run
        reason: String,
    },

    /// Tensor shape is structurally invalid.
    #[error("Invalid shape: {reason}")]
    InvalidShape {
        /// Reason the shape is invalid
        reason: String,
    },

    /// Tensor data length does not match its shape.
    #[error("Data size {data_size} does not match shape {shape:?} (expected {expected})")]
    DataShapeMismatch {
        /// Number of elements provided
        data_size: usize,
        /// Shape requested
        shape: Vec<usize>,
        /// Number of elements the shape requires
        expected: usize,
    },

    /// A file did not parse as the expected format (npy header, manifest
    /// JSON, flatc output).
    #[error("Format error: {reason}")]
    FormatError {
        /// What failed to parse
        reason: String,
    },

    /// Underlying I/O failure with context.
    #[error("I/O error: {message}")]
    IoError {
        /// Description including the path involved
        message: String,
    },
}

/// Result type alias for verificar operations
pub type Result<T> = std::result::Result<T, VerificarError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subprocess_failure_includes_command_and_output() {
        let err = VerificarError::SubprocessFailure {
            command: "sim -m program.pte".to_string(),
            stdout: "E: memory fault".to_string(),
            stderr: String::new(),
        };
        let msg = err.to_string();
        assert!(msg.contains("sim -m program.pte"));
        assert!(msg.contains("E: memory fault"));
    }

    #[test]
    fn test_tool_not_found_names_setup_step() {
        let err = VerificarError::ToolNotFound {
            tool: "flatc".to_string(),
            hint: "install the flatbuffers compiler".to_string(),
        };
        assert!(err.to_string().contains("flatc"));
        assert!(err.to_string().contains("install"));
    }

    #[test]
    fn test_data_shape_mismatch_display() {
        let err = VerificarError::DataShapeMismatch {
            data_size: 5,
            shape: vec![2, 3],
            expected: 6,
        };
        let msg = err.to_string();
        assert!(msg.contains('5'));
        assert!(msg.contains('6'));
    }
}
