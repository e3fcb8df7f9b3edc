//! Error types for the driver abstraction layer.

use thiserror::Error;

use crate::handle::QubitId;

/// Errors that can occur in driver operations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum HalError {
    /// Driver is not available.
    #[error("Driver not available: {0}")]
    DriverUnavailable(String),

    /// Qubit handle was never issued by this driver.
    #[error("Unknown qubit {0}")]
    UnknownQubit(QubitId),

    /// Result values cannot be observed on this driver.
    #[error("Results unavailable: {0}")]
    ResultsUnavailable(String),

    /// Byte does not encode a Pauli operator.
    #[error("Invalid Pauli encoding: {0}")]
    InvalidPauli(u8),

    /// Unsupported feature.
    #[error("Unsupported feature: {0}")]
    Unsupported(String),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Generic driver error.
    #[error("Driver error: {0}")]
    Driver(String),
}

/// Result type for driver operations.
pub type HalResult<T> = Result<T, HalError>;
