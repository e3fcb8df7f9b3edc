//! Error types for resource estimation.

use thiserror::Error;

use qirt_hal::{HalError, QubitId, ResultId};
use qirt_rt::{ConfigError, RuntimeError};

use crate::layer::OpId;

/// Errors that can occur while tracing a program.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum TracerError {
    /// Qubit handle was not issued by this tracer.
    #[error("Unknown qubit {0}")]
    UnknownQubit(QubitId),

    /// Result handle does not refer to a traced measurement.
    #[error("Result {0} does not refer to a traced measurement")]
    UnknownMeasurement(ResultId),

    /// Operation was traced without any target qubit.
    #[error("Operation {0} has no target qubits")]
    NoTargets(OpId),

    /// Operation durations cannot be negative.
    #[error("Operation {op} has negative duration {duration}")]
    NegativeDuration { op: OpId, duration: i32 },

    /// The active driver is not a tracer.
    #[error("Driver '{0}' does not trace operations")]
    NotTracing(String),

    /// Driver error.
    #[error(transparent)]
    Hal(#[from] HalError),

    /// Runtime error raised while reading arrays or invoking callables.
    #[error(transparent)]
    Runtime(#[from] RuntimeError),

    /// Configuration error.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Writing a report failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for tracing operations.
pub type TracerResult<T> = Result<T, TracerError>;

impl From<TracerError> for HalError {
    fn from(err: TracerError) -> Self {
        match err {
            TracerError::Hal(e) => e,
            TracerError::UnknownQubit(q) => HalError::UnknownQubit(q),
            other => HalError::Driver(other.to_string()),
        }
    }
}
