//! In-process graph interpreter backend
//!
//! Runs a serialized graph through an embedded interpreter library with no
//! subprocess. The interpreter expects channel-last data, so rank-4 inputs
//! are converted before the call and outputs converted back after it.
//! Dequantization is applied per output positionally, matching the
//! file-based backend.

use crate::codec;
use crate::error::{Result, VerificarError};
use crate::layout::{self, DataFormat};
use crate::tensor::Tensor;

use super::{check_input_arity, RunnerSession, Verbosity};

/// Status reported by the embedded interpreter for a submitted graph
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GraphStatus {
    /// Graph validated and executed
    Valid,
    /// Graph failed validation
    Invalid,
}

/// Interpreter inference profile
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Profile {
    /// Integer-only base inference (quantized models)
    BaseInference,
    /// Float main inference
    MainInference,
}

/// Seam for the embedded interpreter library
///
/// The real implementation wraps the vendored interpreter; tests substitute
/// their own.
pub trait GraphInterpreter {
    /// Execute `graph` on `inputs`, returning outputs and a graph status
    ///
    /// # Errors
    ///
    /// Implementation-defined failures (the embedded library's own errors).
    fn run(
        &self,
        graph: &[u8],
        inputs: &[Tensor],
        verbosity: &str,
        profile: Profile,
        debug: bool,
    ) -> Result<(Vec<Tensor>, GraphStatus)>;
}

/// Backend C: embedded in-process graph interpreter
pub struct InProcessBackend {
    interpreter: Box<dyn GraphInterpreter>,
    graph: Vec<u8>,
}

impl InProcessBackend {
    /// Create the in-process backend over an interpreter and a serialized
    /// graph blob
    #[must_use]
    pub fn new(interpreter: Box<dyn GraphInterpreter>, graph: Vec<u8>) -> Self {
        Self { interpreter, graph }
    }

    /// Run the graph in process
    ///
    /// # Errors
    ///
    /// - `Precondition`: session not initialized.
    /// - `ContractViolation`: input lists do not zip exactly.
    /// - `UnsupportedGraph`: the interpreter rejected the graph.
    pub fn run(
        &self,
        session: &RunnerSession,
        inputs: &[Tensor],
        verbosity: Verbosity,
    ) -> Result<Vec<Tensor>> {
        session.require_init("the in-process interpreter")?;

        check_input_arity(
            session.input_names.len(),
            session.qp_inputs.len(),
            inputs.len(),
        )?;

        let mut prepared = Vec::with_capacity(inputs.len());
        for ((name, quant), tensor) in session
            .input_names
            .iter()
            .zip(&session.qp_inputs)
            .zip(inputs)
        {
            let quantized = codec::prep_for_save(tensor, quant.as_ref(), name)?;
            prepared.push(layout::to_data_format(&quantized, DataFormat::Nhwc)?);
        }

        let profile = if session.quantized {
            Profile::BaseInference
        } else {
            Profile::MainInference
        };

        let (raw_outputs, status) = self.interpreter.run(
            &self.graph,
            &prepared,
            verbosity.ref_model_level(),
            profile,
            verbosity.debug_enabled(),
        )?;

        if status != GraphStatus::Valid {
            return Err(VerificarError::UnsupportedGraph {
                reason: "Non-valid graph given to the embedded interpreter".to_string(),
            });
        }

        let mut outputs = Vec::with_capacity(raw_outputs.len());
        for (i, raw) in raw_outputs.into_iter().enumerate() {
            let channel_first = layout::to_data_format(&raw, DataFormat::Nchw)?;
            let quant = session.qp_outputs.get(i).and_then(Option::as_ref);
            outputs.push(codec::decode_output(channel_first, quant)?);
        }
        Ok(outputs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{ExportedProgram, Node};
    use crate::tensor::{DType, TensorData};
    use tempfile::tempdir;

    /// Passes inputs straight through and records what it saw
    struct EchoInterpreter {
        expect_profile: Profile,
    }

    impl GraphInterpreter for EchoInterpreter {
        fn run(
            &self,
            _graph: &[u8],
            inputs: &[Tensor],
            verbosity: &str,
            profile: Profile,
            _debug: bool,
        ) -> Result<(Vec<Tensor>, GraphStatus)> {
            assert_eq!(profile, self.expect_profile);
            assert!(["LOW", "MED", "HIGH", "INFO"].contains(&verbosity));
            Ok((inputs.to_vec(), GraphStatus::Valid))
        }
    }

    struct RejectingInterpreter;

    impl GraphInterpreter for RejectingInterpreter {
        fn run(
            &self,
            _graph: &[u8],
            _inputs: &[Tensor],
            _verbosity: &str,
            _profile: Profile,
            _debug: bool,
        ) -> Result<(Vec<Tensor>, GraphStatus)> {
            Ok((Vec::new(), GraphStatus::Invalid))
        }
    }

    fn session(dir: &std::path::Path, quantized: bool) -> RunnerSession {
        let mut dq = Node::dequantize("dq0", "add0", 0.5, 2, -128, 127, DType::I8);
        dq.meta.shape = vec![1, 2, 2, 2];
        let program = ExportedProgram::new(
            vec![
                Node::placeholder("x0", vec![1, 2, 2, 2]),
                Node::quantize("q0", "x0", 0.5, 2, -128, 127, DType::I8),
                dq,
                Node::output("out", vec!["dq0".to_string()]),
            ],
            vec!["x0".to_string()],
        );
        let mut s = RunnerSession::new(dir).unwrap();
        s.init_run(&program, &program, quantized).unwrap();
        s
    }

    #[test]
    fn test_unquantized_run_roundtrips_layout() {
        let dir = tempdir().unwrap();
        let s = session(dir.path(), false);
        let backend = InProcessBackend::new(
            Box::new(EchoInterpreter {
                expect_profile: Profile::MainInference,
            }),
            vec![0u8; 4],
        );
        let input =
            Tensor::from_f32(vec![1, 2, 2, 2], (0..8).map(|i| i as f32).collect()).unwrap();
        let outputs = backend.run(&s, &[input.clone()], Verbosity::Warn).unwrap();
        assert_eq!(outputs.len(), 1);
        // NHWC on the way in, NCHW on the way out: identity end to end
        assert_eq!(outputs[0], input);
    }

    #[test]
    fn test_quantized_run_uses_base_profile_and_dequantizes() {
        let dir = tempdir().unwrap();
        let s = session(dir.path(), true);
        let backend = InProcessBackend::new(
            Box::new(EchoInterpreter {
                expect_profile: Profile::BaseInference,
            }),
            Vec::new(),
        );
        let input = Tensor::from_f32(vec![1, 2, 2, 2], vec![1.0; 8]).unwrap();
        let outputs = backend.run(&s, &[input], Verbosity::Warn).unwrap();
        // Input quantized with scale 0.5, zp 2: 1.0 -> 4; echoed back and
        // dequantized with the output params (0.5, 2): back to 1.0.
        assert_eq!(outputs[0].dtype(), DType::F32);
        assert_eq!(outputs[0].as_f32().unwrap(), &[1.0; 8]);
    }

    #[test]
    fn test_invalid_graph_status_fails() {
        let dir = tempdir().unwrap();
        let s = session(dir.path(), false);
        let backend = InProcessBackend::new(Box::new(RejectingInterpreter), Vec::new());
        let input = Tensor::from_f32(vec![1, 2, 2, 2], vec![0.0; 8]).unwrap();
        let err = backend.run(&s, &[input], Verbosity::Warn).unwrap_err();
        assert!(matches!(err, VerificarError::UnsupportedGraph { .. }));
    }

    #[test]
    fn test_arity_mismatch_fails() {
        let dir = tempdir().unwrap();
        let s = session(dir.path(), false);
        let backend = InProcessBackend::new(
            Box::new(EchoInterpreter {
                expect_profile: Profile::MainInference,
            }),
            Vec::new(),
        );
        let err = backend.run(&s, &[], Verbosity::Warn).unwrap_err();
        assert!(matches!(err, VerificarError::ContractViolation { .. }));
    }

    #[test]
    fn test_bool_outputs_survive_quantized_run() {
        struct BoolInterpreter;
        impl GraphInterpreter for BoolInterpreter {
            fn run(
                &self,
                _graph: &[u8],
                _inputs: &[Tensor],
                _verbosity: &str,
                _profile: Profile,
                _debug: bool,
            ) -> Result<(Vec<Tensor>, GraphStatus)> {
                let t = Tensor::new(vec![2], TensorData::Bool(vec![true, false]))?;
                Ok((vec![t], GraphStatus::Valid))
            }
        }
        let dir = tempdir().unwrap();
        let s = session(dir.path(), true);
        let backend = InProcessBackend::new(Box::new(BoolInterpreter), Vec::new());
        let input = Tensor::from_f32(vec![1, 2, 2, 2], vec![0.0; 8]).unwrap();
        let outputs = backend.run(&s, &[input], Verbosity::Warn).unwrap();
        assert_eq!(
            outputs[0].data(),
            &TensorData::Bool(vec![true, false])
        );
    }
}
