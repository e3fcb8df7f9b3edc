//! Layers of the traced schedule and per-qubit scheduling state.

use rustc_hash::FxHashMap;
use serde::Serialize;

/// Caller-chosen operation identifier.
pub type OpId = i32;

/// Duration of an operation, in abstract time units.
pub type Duration = i32;

/// Point on the schedule's time axis.
pub type Time = i64;

/// Index of a layer in the schedule.
pub type LayerId = usize;

/// A time slot holding a batch of operations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Layer {
    /// Start time of the layer.
    pub start_time: Time,
    /// Width of the layer on the time axis.
    pub duration: Duration,
    /// Number of occurrences of each operation in the layer.
    pub operations: FxHashMap<OpId, usize>,
    /// Set when the layer is a global barrier.
    pub barrier: Option<OpId>,
}

impl Layer {
    pub(crate) fn new(start_time: Time, duration: Duration) -> Self {
        Self {
            start_time,
            duration,
            operations: FxHashMap::default(),
            barrier: None,
        }
    }

    #[inline]
    pub fn end_time(&self) -> Time {
        self.start_time + Time::from(self.duration)
    }

    /// Occurrences of `op` in this layer.
    pub fn count(&self, op: OpId) -> usize {
        self.operations.get(&op).copied().unwrap_or(0)
    }

    pub fn contains(&self, op: OpId) -> bool {
        self.operations.contains_key(&op)
    }
}

/// Scheduling state of one qubit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QubitState {
    /// Last layer the qubit was used in by an operation of non-zero
    /// duration, or by any operation placed into a layer.
    pub layer: Option<LayerId>,
    /// End time of the last operation on the qubit. May fall short of the
    /// end of its layer, which lets short operations share a layer.
    pub last_used_time: Time,
    /// Zero-duration operations waiting for the qubit's next placement.
    pub pending: Vec<OpId>,
}

/// Outcome of the layer search for an operation.
///
/// Orders every existing layer before a new one, so the latest placement
/// across several qubits is their maximum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) enum Placement {
    Layer(LayerId),
    New,
}
