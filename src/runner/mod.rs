//! External runner orchestration
//!
//! Drives one of three backends behind a single `run(inputs) -> outputs`
//! entry point: a cycle-accurate hardware simulator consuming raw binary
//! tensor files, a file-based reference-model interpreter consuming a
//! manifest plus `.npy` files, or an embedded in-process graph interpreter.
//! The backend is selected from the target identifier at construction time;
//! there is no per-call branching on target strings.
//!
//! A [`RunnerSession`] binds one artifact directory to one exported program
//! for one or more run invocations. Sessions are single-threaded and assume
//! exclusive ownership of the artifact directory; artifact files deliberately
//! persist after failures for post-mortem inspection.

pub mod graph_exec;
pub mod manifest;
pub mod ref_model;
pub mod simulator;

use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::str::FromStr;

use crate::error::{Result, VerificarError};
use crate::graph::{ExportedProgram, Node, OpKind};
use crate::quantize::{self, QuantizationParams};
use crate::tensor::Tensor;

pub use graph_exec::{GraphInterpreter, GraphStatus, InProcessBackend, Profile};
pub use manifest::{find_manifest, Manifest};
pub use ref_model::RefModelBackend;
pub use simulator::SimulatorBackend;

/// Default wall-clock limit for simulator runs, in seconds
pub const DEFAULT_TIMEOUT_SECS: u64 = 480;

/// Explicit verbosity for runner calls
///
/// Passed as a parameter instead of reading process-wide logger state, and
/// mapped onto the reference model's own level vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Verbosity {
    /// Maximum detail
    Trace,
    /// Debug detail
    Debug,
    /// Informational
    Info,
    /// Warnings only (default)
    #[default]
    Warn,
    /// Errors only
    Error,
}

impl Verbosity {
    /// The reference model's `-l` level for this verbosity
    #[must_use]
    pub fn ref_model_level(self) -> &'static str {
        match self {
            Verbosity::Trace | Verbosity::Debug => "HIGH",
            Verbosity::Info => "INFO",
            Verbosity::Warn => "MED",
            Verbosity::Error => "LOW",
        }
    }

    /// Whether backend debug instrumentation should be enabled
    #[must_use]
    pub fn debug_enabled(self) -> bool {
        matches!(self, Verbosity::Trace | Verbosity::Debug)
    }
}

/// Supported hardware simulator profiles
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    /// Corstone SSE-300 with Ethos-U55
    Corstone300,
    /// Corstone SSE-320 with Ethos-U85
    Corstone320,
}

impl FromStr for Target {
    type Err = VerificarError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "corstone-300" => Ok(Target::Corstone300),
            "corstone-320" => Ok(Target::Corstone320),
            other => Err(VerificarError::Precondition {
                reason: format!("Unknown target board: {other}"),
            }),
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::Corstone300 => write!(f, "corstone-300"),
            Target::Corstone320 => write!(f, "corstone-320"),
        }
    }
}

/// Captured result of a finished subprocess
#[derive(Debug)]
pub(crate) struct CmdOutput {
    /// Exit code, if the process terminated normally
    pub exit_code: Option<i32>,
    /// Decoded standard output
    pub stdout: String,
    /// Decoded standard error
    pub stderr: String,
}

impl CmdOutput {
    pub(crate) fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// Run a command, capturing output
///
/// With `check`, a nonzero exit becomes a `SubprocessFailure` carrying the
/// full command line and both output streams. Without it the caller decides
/// (the simulator path inspects stdout before judging the exit code).
pub(crate) fn run_cmd(argv: &[String], check: bool) -> Result<CmdOutput> {
    let (program, args) = argv.split_first().ok_or_else(|| VerificarError::ContractViolation {
        reason: "Empty command line".to_string(),
    })?;

    let output = Command::new(program)
        .args(args)
        .output()
        .map_err(|e| VerificarError::IoError {
            message: format!("Failed to execute '{program}': {e}"),
        })?;

    let result = CmdOutput {
        exit_code: output.status.code(),
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    };

    if check && !output.status.success() {
        return Err(VerificarError::SubprocessFailure {
            command: argv.join(" "),
            stdout: result.stdout,
            stderr: result.stderr,
        });
    }
    Ok(result)
}

/// Resolve an executable name against PATH, or verify an explicit path
pub(crate) fn resolve_tool(name: &str) -> Option<PathBuf> {
    let candidate = Path::new(name);
    if candidate.components().count() > 1 {
        return candidate.is_file().then(|| candidate.to_path_buf());
    }
    let path_var = std::env::var_os("PATH")?;
    std::env::split_paths(&path_var)
        .map(|dir| dir.join(name))
        .find(|p| p.is_file())
}

/// Check the positional zip contract between input names, quantization
/// parameters and caller-supplied tensors
pub(crate) fn check_input_arity(names: usize, params: usize, tensors: usize) -> Result<()> {
    if names != params || names != tensors {
        return Err(VerificarError::ContractViolation {
            reason: format!(
                "Input lists must zip exactly: {names} input names, {params} quantization \
                 records, {tensors} tensors"
            ),
        });
    }
    Ok(())
}

/// Session state for running one exported program against a backend
///
/// Constructed with an artifact directory, populated once via
/// [`RunnerSession::init_run`], then used for one or more run invocations.
/// The directory is caller-owned; nothing is cleaned up on drop.
#[derive(Debug)]
pub struct RunnerSession {
    pub(crate) artifact_dir: PathBuf,
    pub(crate) ref_model_exe: String,
    pub(crate) input_names: Vec<String>,
    pub(crate) output_nodes: Vec<Node>,
    pub(crate) quantized: bool,
    pub(crate) qp_inputs: Vec<Option<QuantizationParams>>,
    pub(crate) qp_outputs: Vec<Option<QuantizationParams>>,
    pub(crate) timeout_secs: u64,
    pub(crate) fast_simulation: bool,
    initialized: bool,
}

impl RunnerSession {
    /// Create a session over an existing artifact directory
    ///
    /// # Errors
    ///
    /// Returns `Precondition` if the directory does not exist.
    pub fn new(artifact_dir: impl Into<PathBuf>) -> Result<Self> {
        let artifact_dir = artifact_dir.into();
        if !artifact_dir.is_dir() {
            return Err(VerificarError::Precondition {
                reason: format!(
                    "Artifact directory '{}' does not exist",
                    artifact_dir.display()
                ),
            });
        }
        Ok(Self {
            artifact_dir,
            ref_model_exe: "tosa_reference_model".to_string(),
            input_names: Vec::new(),
            output_nodes: Vec::new(),
            quantized: false,
            qp_inputs: Vec::new(),
            qp_outputs: Vec::new(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            fast_simulation: false,
            initialized: false,
        })
    }

    /// Override the reference-model executable (name or explicit path)
    #[must_use]
    pub fn with_ref_model_exe(mut self, exe: impl Into<String>) -> Self {
        self.ref_model_exe = exe.into();
        self
    }

    /// Set the simulator wall-clock limit in seconds
    pub fn set_timeout(&mut self, timeout_secs: u64) {
        self.timeout_secs = timeout_secs;
    }

    /// Enable the simulator's fast acceleration mode
    pub fn set_fast_simulation(&mut self, fast: bool) {
        self.fast_simulation = fast;
    }

    /// Bind the session to an exported program
    ///
    /// Input order comes from the lowered `edge` variant; output nodes and
    /// quantization parameters come from the `exported` graph. For quantized
    /// runs both input and output parameters must be discoverable.
    ///
    /// # Errors
    ///
    /// Returns `Extraction` errors from the graph scans.
    pub fn init_run(
        &mut self,
        exported: &ExportedProgram,
        edge: &ExportedProgram,
        quantized: bool,
    ) -> Result<()> {
        self.input_names = quantize::input_names(edge);
        self.output_nodes = quantize::output_nodes(exported)?;
        self.quantized = quantized;

        if quantized {
            let input_params = quantize::input_quantization_params(exported)?;
            self.qp_inputs = self
                .input_names
                .iter()
                .map(|name| {
                    input_params
                        .iter()
                        .find(|qp| &qp.node_name == name)
                        .cloned()
                })
                .collect();
            // Validate discoverability as a whole even though individual
            // outputs (e.g. bool comparisons) may carry no parameters.
            quantize::output_quantization_params(&self.output_nodes)?;
            self.qp_outputs = self
                .output_nodes
                .iter()
                .map(|node| {
                    (node.op == OpKind::Dequantize)
                        .then(|| QuantizationParams::from_node(node))
                        .transpose()
                })
                .collect::<Result<Vec<_>>>()?;
        } else {
            self.qp_inputs = vec![None; self.input_names.len()];
            self.qp_outputs = vec![None; self.output_nodes.len()];
        }

        self.initialized = true;
        Ok(())
    }

    /// Artifact directory this session owns for the run
    #[must_use]
    pub fn artifact_dir(&self) -> &Path {
        &self.artifact_dir
    }

    /// Declared input names, in program order
    #[must_use]
    pub fn input_names(&self) -> &[String] {
        &self.input_names
    }

    /// Whether the bound program is quantized
    #[must_use]
    pub fn is_quantized(&self) -> bool {
        self.quantized
    }

    pub(crate) fn require_init(&self, backend: &str) -> Result<()> {
        if !self.initialized {
            return Err(VerificarError::Precondition {
                reason: format!(
                    "RunnerSession must be initialized with init_run() before running {backend}"
                ),
            });
        }
        Ok(())
    }
}

/// Closed set of runnable backends
///
/// Selected once at construction; every variant exposes the same
/// `run(session, inputs, verbosity) -> outputs` contract.
pub enum Backend {
    /// Hardware simulator over raw binary tensor files
    Simulator(SimulatorBackend),
    /// File-based reference-model interpreter over a manifest plus `.npy`
    RefModelFile(RefModelBackend),
    /// Embedded in-process graph interpreter
    InProcess(InProcessBackend),
}

impl Backend {
    /// Select a backend from a target identifier
    ///
    /// Hardware profile names select the simulator; `"ref_model"` selects
    /// the file-based interpreter.
    ///
    /// # Errors
    ///
    /// Returns `Precondition` for unknown identifiers.
    pub fn for_target(spec: &str) -> Result<Self> {
        if spec == "ref_model" {
            return Ok(Backend::RefModelFile(RefModelBackend::new()));
        }
        let target = Target::from_str(spec)?;
        Ok(Backend::Simulator(SimulatorBackend::new(target)))
    }

    /// Construct the in-process backend over an embedded interpreter
    #[must_use]
    pub fn in_process(interpreter: Box<dyn GraphInterpreter>, graph: Vec<u8>) -> Self {
        Backend::InProcess(InProcessBackend::new(interpreter, graph))
    }

    /// Run the bound program on `inputs`, returning decoded output tensors
    ///
    /// # Errors
    ///
    /// See the backend modules for the per-backend failure modes; all of
    /// them require an initialized session.
    pub fn run(
        &self,
        session: &RunnerSession,
        inputs: &[Tensor],
        verbosity: Verbosity,
    ) -> Result<Vec<Tensor>> {
        match self {
            Backend::Simulator(backend) => backend.run(session, inputs),
            Backend::RefModelFile(backend) => backend.run(session, inputs, verbosity),
            Backend::InProcess(backend) => backend.run(session, inputs, verbosity),
        }
    }
}
