//! # Verificar
//!
//! Test harness for validating ML compiler backends against reference
//! implementations.
//!
//! Verificar (Spanish: "to verify") marshals tensors between an in-memory
//! exported-graph representation and the file conventions of external
//! reference tools: a file-based reference-model interpreter, a
//! cycle-accurate hardware simulator, and an embedded in-process graph
//! interpreter. It extracts per-tensor quantization parameters from the
//! exported graph, encodes inputs to disk, drives the external tool, and
//! decodes/dequantizes outputs for comparison against the reference.
//!
//! ## Example
//!
//! ```rust,no_run
//! use verificar::{Backend, RunnerSession, Tensor, Verbosity};
//! # use verificar::graph::{ExportedProgram, Node};
//! # fn programs() -> (ExportedProgram, ExportedProgram) { unimplemented!() }
//!
//! # fn main() -> verificar::Result<()> {
//! let (exported, edge) = programs();
//!
//! let mut session = RunnerSession::new("artifacts")?;
//! session.init_run(&exported, &edge, true)?;
//!
//! let backend = Backend::for_target("corstone-300")?;
//! let input = Tensor::from_f32(vec![1, 3, 8, 8], vec![0.0; 192])?;
//! let outputs = backend.run(&session, &[input], Verbosity::Warn)?;
//! # let _ = outputs;
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - [`quantize`]: scans the exported graph for affine quantization
//!   parameters attached to declared inputs and outputs
//! - [`codec`]: converts tensors to/from `.npy` array files and headerless
//!   `.bin` dumps, quantizing/dequantizing as configured
//! - [`layout`]: rank-4 channel-order transposition for backends that read
//!   raw bytes in a different convention
//! - [`runner`]: the three backends behind one `run(inputs) -> outputs`
//!   contract, selected from the target identifier at construction
//! - [`dump`]: best-effort diagnostic rendering of binary graph blobs
//!
//! The harness is single-threaded and synchronous; every external tool
//! invocation blocks until the subprocess exits. Artifact directories are
//! caller-owned and deliberately left intact after failures for post-mortem
//! debugging.

#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::cast_possible_truncation)] // i64 -> element casts are range-checked
#![allow(clippy::cast_precision_loss)] // i64/f64 -> f32 in dequantization is intended
#![allow(clippy::cast_sign_loss)] // byte reinterpretation in the dumper
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::uninlined_format_args)]

pub mod codec;
pub mod dump;
pub mod error;
pub mod graph;
pub mod layout;
pub mod quantize;
pub mod runner;
pub mod tensor;

pub use dump::DumpReport;
pub use error::{Result, VerificarError};
pub use layout::DataFormat;
pub use quantize::QuantizationParams;
pub use runner::{Backend, GraphInterpreter, RunnerSession, Target, Verbosity};
pub use tensor::{DType, Tensor, TensorData};
