//! Opaque handle types issued by drivers.
//!
//! Qubits and measurement results are owned by the active driver; the
//! runtime only moves their handles around. Handles are stored inside
//! array and tuple payloads as fixed-width little-endian words.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::HalError;

/// Width in bytes of a handle stored in an array or tuple payload.
pub const HANDLE_SIZE: usize = 8;

/// Conversion between a handle and its raw payload encoding.
pub trait RawHandle: Copy {
    /// Rebuild the handle from its raw value.
    fn from_raw(raw: u64) -> Self;

    /// The raw value of the handle.
    fn into_raw(self) -> u64;

    /// Encode the handle as payload bytes.
    fn to_bytes(self) -> [u8; HANDLE_SIZE] {
        self.into_raw().to_le_bytes()
    }

    /// Decode a handle from the first [`HANDLE_SIZE`] bytes of `bytes`.
    fn from_bytes(bytes: &[u8]) -> Option<Self> {
        let word: [u8; HANDLE_SIZE] = bytes.get(..HANDLE_SIZE)?.try_into().ok()?;
        Some(Self::from_raw(u64::from_le_bytes(word)))
    }
}

/// Driver-issued qubit handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct QubitId(pub u64);

impl fmt::Display for QubitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "q{}", self.0)
    }
}

impl From<u64> for QubitId {
    fn from(id: u64) -> Self {
        QubitId(id)
    }
}

impl From<usize> for QubitId {
    fn from(id: usize) -> Self {
        QubitId(id as u64)
    }
}

impl RawHandle for QubitId {
    fn from_raw(raw: u64) -> Self {
        QubitId(raw)
    }

    fn into_raw(self) -> u64 {
        self.0
    }
}

/// Driver-issued measurement result handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ResultId(pub u64);

impl ResultId {
    /// Handle that refers to no result.
    pub const INVALID: ResultId = ResultId(u64::MAX);

    /// Whether this handle refers to a result.
    #[inline]
    pub fn is_valid(self) -> bool {
        self != Self::INVALID
    }
}

impl fmt::Display for ResultId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_valid() {
            write!(f, "r{}", self.0)
        } else {
            write!(f, "r<invalid>")
        }
    }
}

impl RawHandle for ResultId {
    fn from_raw(raw: u64) -> Self {
        ResultId(raw)
    }

    fn into_raw(self) -> u64 {
        self.0
    }
}

/// Single-qubit Pauli operator, in the IR's two-bit encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Pauli {
    I = 0,
    X = 1,
    Z = 2,
    Y = 3,
}

impl TryFrom<u8> for Pauli {
    type Error = HalError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Pauli::I),
            1 => Ok(Pauli::X),
            2 => Ok(Pauli::Z),
            3 => Ok(Pauli::Y),
            other => Err(HalError::InvalidPauli(other)),
        }
    }
}

impl fmt::Display for Pauli {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Pauli::I => "PauliI",
            Pauli::X => "PauliX",
            Pauli::Y => "PauliY",
            Pauli::Z => "PauliZ",
        };
        f.write_str(name)
    }
}

/// Observed value of a measurement result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResultValue {
    Zero,
    One,
    /// The driver has not resolved the result yet.
    Pending,
}
