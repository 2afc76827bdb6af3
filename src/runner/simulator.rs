//! Hardware simulator backend
//!
//! Runs a previously-lowered program binary on a semihosted fixed virtual
//! platform. Inputs cross the boundary as headerless `.bin` dumps; the
//! on-device runner quantizes internally, so inputs are exported in their
//! float form. The simulator reports success through both its exit code and
//! its UART log, so stdout is scanned for fault patterns even on exit 0.

use std::path::{Path, PathBuf};

use crate::codec;
use crate::error::{Result, VerificarError};
use crate::tensor::{DType, Tensor};

use super::{check_input_arity, run_cmd, RunnerSession, Target};

/// Name of the lowered program binary inside the artifact directory
const PROGRAM_FILE: &str = "program.pte";

/// Relative path of the semihosted runner ELF built by the setup step
fn runner_elf_path(target: Target) -> PathBuf {
    Path::new("cmake-out")
        .join(format!("arm_semihosting_executor_runner_{target}"))
        .join("arm_executor_runner")
}

/// Backend A: cycle-accurate hardware simulator
pub struct SimulatorBackend {
    target: Target,
}

impl SimulatorBackend {
    /// Create a simulator backend for a hardware profile
    #[must_use]
    pub fn new(target: Target) -> Self {
        Self { target }
    }

    /// The hardware profile this backend simulates
    #[must_use]
    pub fn target(&self) -> Target {
        self.target
    }

    /// Run the lowered program on the simulator
    ///
    /// # Errors
    ///
    /// - `Precondition`: session not initialized, program binary or runner
    ///   ELF missing.
    /// - `ContractViolation`: input lists do not zip exactly.
    /// - `SubprocessFailure`: nonzero exit, or a fault pattern in the
    ///   simulator log.
    pub fn run(&self, session: &RunnerSession, inputs: &[Tensor]) -> Result<Vec<Tensor>> {
        session.require_init("the hardware simulator")?;

        let program_path = session.artifact_dir.join(PROGRAM_FILE);
        if !program_path.is_file() {
            return Err(VerificarError::Precondition {
                reason: format!("Program binary '{}' not found", program_path.display()),
            });
        }

        let elf_path = runner_elf_path(self.target);
        if !elf_path.is_file() {
            return Err(VerificarError::Precondition {
                reason: format!(
                    "Runner ELF '{}' not found, did you run setup_testing.sh?",
                    elf_path.display()
                ),
            });
        }

        check_input_arity(
            session.input_names.len(),
            session.qp_inputs.len(),
            inputs.len(),
        )?;

        // The on-device runner consumes float inputs and quantizes
        // internally, so inputs are exported unquantized.
        let mut input_paths = Vec::with_capacity(inputs.len());
        for (name, tensor) in session.input_names.iter().zip(inputs) {
            input_paths.push(codec::save_bytes(&session.artifact_dir, tensor, None, name)?);
        }

        let out_prefix = session.artifact_dir.join("out");
        let mut cmd_line = format!(
            "executor_runner -m {} -o {}",
            program_path.display(),
            out_prefix.display()
        );
        for path in &input_paths {
            cmd_line.push_str(&format!(" -i {}", path.display()));
        }

        let argv = self.simulator_argv(session, &cmd_line, &elf_path);
        let output = run_cmd(&argv, false)?;

        if !output.success() {
            return Err(VerificarError::SubprocessFailure {
                command: argv.join(" "),
                stdout: output.stdout,
                stderr: output.stderr,
            });
        }
        if stdout_indicates_fault(&output.stdout) {
            return Err(VerificarError::SubprocessFailure {
                command: argv.join(" "),
                stdout: output.stdout,
                stderr: output.stderr,
            });
        }

        self.read_outputs(session)
    }

    /// Simulator command line for the configured hardware profile
    fn simulator_argv(
        &self,
        session: &RunnerSession,
        cmd_line: &str,
        elf_path: &Path,
    ) -> Vec<String> {
        let extra_args = if session.fast_simulation { "--fast" } else { "" };
        let config = |key: &str, value: &str| [String::from("-C"), format!("{key}={value}")];

        let mut argv: Vec<String> = Vec::new();
        match self.target {
            Target::Corstone300 => {
                argv.push("FVP_Corstone_SSE-300_Ethos-U55".to_string());
                argv.extend(config("ethosu.num_macs", "128"));
                argv.extend(config("mps3_board.visualisation.disable-visualisation", "1"));
                argv.extend(config("mps3_board.telnetterminal0.start_telnet", "0"));
                argv.extend(config("mps3_board.uart0.out_file", "'-'"));
                argv.extend(config("cpu0.semihosting-enable", "1"));
                argv.extend(config("cpu0.semihosting-stack_base", "0"));
                argv.extend(config("ethosu.extra_args", &format!("'{extra_args}'")));
                argv.extend(config("cpu0.semihosting-heap_limit", "0"));
                argv.extend(config("cpu0.semihosting-cmd_line", &format!("'{cmd_line}'")));
            }
            Target::Corstone320 => {
                argv.push("FVP_Corstone_SSE-320".to_string());
                argv.extend(config("mps4_board.subsystem.ethosu.num_macs", "128"));
                argv.extend(config("mps4_board.visualisation.disable-visualisation", "1"));
                argv.extend(config("vis_hdlcd.disable_visualisation", "1"));
                argv.extend(config("mps4_board.telnetterminal0.start_telnet", "0"));
                argv.extend(config("mps4_board.uart0.out_file", "'-'"));
                argv.extend(config("mps4_board.uart0.unbuffered_output", "1"));
                argv.extend(config("mps4_board.uart0.shutdown_on_eot", "1"));
                argv.extend(config("mps4_board.subsystem.cpu0.semihosting-enable", "1"));
                argv.extend(config("mps4_board.subsystem.cpu0.semihosting-stack_base", "0"));
                argv.extend(config("mps4_board.subsystem.cpu0.semihosting-heap_limit", "0"));
                argv.extend(config(
                    "mps4_board.subsystem.ethosu.extra_args",
                    &format!("'{extra_args}'"),
                ));
                argv.extend(config(
                    "mps4_board.subsystem.cpu0.semihosting-cmd_line",
                    &format!("'{cmd_line}'"),
                ));
            }
        }
        argv.push("-a".to_string());
        argv.push(elf_path.display().to_string());
        argv.push("--timelimit".to_string());
        argv.push(session.timeout_secs.to_string());
        argv
    }

    /// Read `out-<i>.bin` per output node, reshaped to the node's metadata
    fn read_outputs(&self, session: &RunnerSession) -> Result<Vec<Tensor>> {
        let mut outputs = Vec::with_capacity(session.output_nodes.len());
        for (i, node) in session.output_nodes.iter().enumerate() {
            let path = session.artifact_dir.join(format!("out-{i}.bin"));
            let bytes = std::fs::read(&path).map_err(|e| VerificarError::IoError {
                message: format!("Failed to read simulator output '{}': {e}", path.display()),
            })?;
            outputs.push(Tensor::from_le_bytes(
                node.meta.shape.clone(),
                DType::F32,
                &bytes,
            )?);
        }
        Ok(outputs)
    }
}

/// Scan a simulator log for fault patterns, line by line
///
/// A line is a fault if it begins with `E` or `F` followed by `:` or a
/// space, or contains "Hard fault" or "Assertion".
pub(crate) fn stdout_indicates_fault(stdout: &str) -> bool {
    stdout.lines().any(|line| {
        let mut chars = line.chars();
        let leading_fault = matches!(
            (chars.next(), chars.next()),
            (Some('E' | 'F'), Some(':' | ' '))
        );
        leading_fault || line.contains("Hard fault") || line.contains("Assertion")
    })
}
