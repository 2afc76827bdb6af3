//! Reference-model manifest handling
//!
//! The compiler stage drops a small JSON sidecar (`desc*.json`) into the
//! artifact directory describing the serialized graph and its input/output
//! file bindings. The harness consumes it read-only and requires exactly one
//! per directory; several manifests mean a multi-partition graph, which the
//! file-based runner does not support.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Result, VerificarError};

/// On-disk manifest for one reference-model invocation
///
/// ```json
/// {
///     "tosa_file": "output.tosa",
///     "ifm_name": ["arg0_1"],
///     "ifm_file": ["arg0_1.npy"],
///     "ofm_name": ["dequantize_default_1"],
///     "ofm_file": ["ref-dequantize_default_1.npy"],
///     "expected_return_code": 0,
///     "expected_failure": false
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Manifest {
    /// Serialized-graph file name, relative to the artifact directory
    pub tosa_file: String,
    /// Input tensor names, in declaration order
    pub ifm_name: Vec<String>,
    /// Input file names the tool will read, zipped with `ifm_name`
    pub ifm_file: Vec<String>,
    /// Output tensor names
    pub ofm_name: Vec<String>,
    /// Output file names the tool will write, zipped with `ofm_name`
    pub ofm_file: Vec<String>,
    /// Process exit code the compiler stage expects
    pub expected_return_code: i32,
    /// Whether the compiler stage expects the run to fail
    pub expected_failure: bool,
}

impl Manifest {
    /// Load and parse a manifest file
    ///
    /// # Errors
    ///
    /// Returns `IoError` on read failure and `FormatError` on invalid JSON.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path).map_err(|e| VerificarError::IoError {
            message: format!("Failed to read manifest '{}': {e}", path.display()),
        })?;
        serde_json::from_str(&contents).map_err(|e| VerificarError::FormatError {
            reason: format!("Invalid manifest '{}': {e}", path.display()),
        })
    }
}

/// Locate the single `desc*.json` manifest in an artifact directory
///
/// # Errors
///
/// Returns `UnsupportedGraph` when no manifest is found, or when more than
/// one is (multi-partition graphs are currently not supported).
pub fn find_manifest(dir: &Path) -> Result<PathBuf> {
    let entries = fs::read_dir(dir).map_err(|e| VerificarError::IoError {
        message: format!("Failed to list '{}': {e}", dir.display()),
    })?;

    let mut matches: Vec<PathBuf> = entries
        .filter_map(std::result::Result::ok)
        .map(|entry| entry.path())
        .filter(|path| {
            path.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|name| name.starts_with("desc") && name.ends_with(".json"))
        })
        .collect();
    matches.sort();

    match matches.len() {
        0 => Err(VerificarError::UnsupportedGraph {
            reason: format!("No graph description file found in '{}'", dir.display()),
        }),
        1 => Ok(matches.remove(0)),
        n => Err(VerificarError::UnsupportedGraph {
            reason: format!(
                "Found {n} description files in '{}': graphs with more than one partition \
                 are currently not supported",
                dir.display()
            ),
        }),
    }
}
