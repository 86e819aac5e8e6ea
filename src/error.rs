//! Error types shared by code generation, simulation and the EF-SMT loop

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for the crate
pub type SimResult<T> = std::result::Result<T, SimError>;

/// Errors raised while compiling a formula to a native evaluator or running it
#[derive(Debug, Error)]
pub enum SimError {
    /// A node's sort has no native representation
    #[error("cannot resolve a native type for sort {sort}: {reason}")]
    TypeResolution { sort: String, reason: String },

    /// An operator the generator refuses to approximate
    #[error("operator not supported: {op}")]
    OperatorNotSupported { op: &'static str },

    /// Two distinct symbols sanitize to the same identifier
    #[error("symbols '{first}' and '{second}' both map to identifier '{ident}'")]
    IdentifierCollision {
        first: String,
        second: String,
        ident: String,
    },

    /// The external compiler failed or produced no artifact
    #[error("compilation failed: {diagnostics}")]
    Compilation { diagnostics: String },

    /// The compiled evaluator could not run or produced unusable output
    #[error("execution failed: {0}")]
    Execution(String),

    /// A pattern row has no usable value for a declared argument
    #[error("pattern row {row} has no usable value for argument '{name}': {reason}")]
    UnboundArgument {
        row: usize,
        name: String,
        reason: String,
    },

    /// The exists-forall loop hit its iteration bound
    #[error("no result after {iterations} iterations")]
    UnknownResult { iterations: usize },

    /// The exact solver gave up on a query
    #[error("solver returned unknown: {0}")]
    Solver(String),

    /// A serialized graph violates the arena invariants
    #[error("malformed formula graph: {0}")]
    MalformedGraph(String),

    /// Filesystem failure outside the execution boundary
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl SimError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        SimError::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn unsupported(op: &'static str) -> Self {
        SimError::OperatorNotSupported { op }
    }
}
