//! Crash-to-reproducer synthesis engine.
//!
//! Turns the raw crash logs produced by a mutation-fuzzing campaign against
//! a framework's native kernels into small, deterministic, deduplicated
//! reproduction programs that trigger the same crash through the public API.
//!
//! The pipeline, leaf to root: [`decoder`] parses one captured argument
//! encoding into a typed value, [`binder`] reconciles the crashed
//! implementation's signature with the public entry point reaching it,
//! [`emitter`] renders deterministic source text, [`persist`] deduplicates
//! by content hash, and [`driver`] runs the batch and accounts for every
//! occurrence in a fixed outcome taxonomy.

use std::path::PathBuf;

pub mod binder;
pub mod config;
pub mod crashlog;
pub mod decoder;
pub mod driver;
pub mod emitter;
pub mod persist;
pub mod registry;
pub mod value;

pub use binder::{bind, resolve_entry_points, BindError, BoundCall, Resolution};
pub use config::CampaignConfig;
pub use crashlog::{parse_occurrence, split_occurrences, CrashOccurrence};
pub use decoder::{classify, decode, repair_numeric, Category, DecodeFailure};
pub use driver::{run_batch, BatchReport, Outcome, OutputMode, ReportSummary};
pub use emitter::{emit_expression, emit_statement, EmitContext, EmitFailure};
pub use persist::{content_hash, persist, PersistMode, PersistOutcome};
pub use registry::{ApiSignature, BindingTables, ParamRole, ParamSpec, SignatureRegistry};
pub use value::{CompositeValue, Placement, Precision, TypedValue};

#[derive(Debug)]
pub enum ReproError {
    Io(std::io::Error),
    /// Destination-side I/O failure; aborts the batch.
    Persistence {
        path: PathBuf,
        source: std::io::Error,
    },
    InvalidTable {
        path: PathBuf,
        line: usize,
        message: String,
    },
    InvalidRegistry {
        path: PathBuf,
        message: String,
    },
    InvalidConfig {
        path: PathBuf,
        message: String,
    },
    Usage(String),
}

impl std::fmt::Display for ReproError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReproError::Io(err) => write!(f, "IO error: {err}"),
            ReproError::Persistence { path, source } => {
                write!(f, "cannot persist to {}: {source}", path.display())
            }
            ReproError::InvalidTable {
                path,
                line,
                message,
            } => {
                write!(f, "invalid table {} (line {line}): {message}", path.display())
            }
            ReproError::InvalidRegistry { path, message } => {
                write!(f, "invalid signature registry {}: {message}", path.display())
            }
            ReproError::InvalidConfig { path, message } => {
                write!(f, "invalid config {}: {message}", path.display())
            }
            ReproError::Usage(message) => write!(f, "{message}"),
        }
    }
}

impl std::error::Error for ReproError {}

impl From<std::io::Error> for ReproError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}
