//! File-based reference-model backend
//!
//! Drives the reference-model interpreter through its file conventions: a
//! `desc*.json` manifest names the serialized graph and the input/output
//! array files, inputs are exported as `.npy` next to it, and the tool is
//! invoked with the manifest plus a verbosity level. Outputs come back as
//! `.npy` files named by the manifest and are dequantized for comparison.

use crate::codec;
use crate::error::{Result, VerificarError};
use crate::tensor::Tensor;

use super::manifest::{find_manifest, Manifest};
use super::{check_input_arity, resolve_tool, run_cmd, RunnerSession, Verbosity};

/// Backend B: reference-model interpreter over manifest plus `.npy` files
#[derive(Debug, Default)]
pub struct RefModelBackend;

impl RefModelBackend {
    /// Create the file-based reference-model backend
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Run the serialized graph through the reference model
    ///
    /// # Errors
    ///
    /// - `Precondition`: session not initialized.
    /// - `UnsupportedGraph`: zero or several manifests in the artifact
    ///   directory (checked before anything is written or spawned).
    /// - `ContractViolation`: input lists do not zip exactly.
    /// - `ToolNotFound`: the interpreter executable is not resolvable.
    /// - `SubprocessFailure`: the interpreter exited nonzero.
    pub fn run(
        &self,
        session: &RunnerSession,
        inputs: &[Tensor],
        verbosity: Verbosity,
    ) -> Result<Vec<Tensor>> {
        session.require_init("the reference model")?;

        let manifest_path = find_manifest(&session.artifact_dir)?;

        check_input_arity(
            session.input_names.len(),
            session.qp_inputs.len(),
            inputs.len(),
        )?;

        // File names must match the manifest's bindings: tensor name + .npy.
        for ((name, quant), tensor) in session
            .input_names
            .iter()
            .zip(&session.qp_inputs)
            .zip(inputs)
        {
            codec::save_npy(&session.artifact_dir, tensor, quant.as_ref(), name)?;
        }

        let tool = resolve_tool(&session.ref_model_exe).ok_or_else(|| {
            VerificarError::ToolNotFound {
                tool: session.ref_model_exe.clone(),
                hint: "did you run setup.sh?".to_string(),
            }
        })?;

        let argv = vec![
            tool.display().to_string(),
            "--test_desc".to_string(),
            manifest_path.display().to_string(),
            "-l".to_string(),
            verbosity.ref_model_level().to_string(),
        ];
        run_cmd(&argv, true)?;

        // Re-read the manifest to discover the output file names.
        let manifest = Manifest::load(&manifest_path)?;
        let mut outputs = Vec::with_capacity(manifest.ofm_file.len());
        for (i, ofm_file) in manifest.ofm_file.iter().enumerate() {
            let path = session.artifact_dir.join(ofm_file);
            let raw = codec::read_npy(&path)?;
            let quant = session.qp_outputs.get(i).and_then(Option::as_ref);
            outputs.push(codec::decode_output(raw, quant)?);
        }
        Ok(outputs)
    }
}
