//! Circuit width estimation.
//!
//! Two estimates of how many qubits a traced program really needs:
//!
//! - With a depth-optimal schedule every qubit occupies a fixed interval of
//!   circuit depth, and qubits whose intervals never overlap can share a
//!   register ([`min_coloring_size`]).
//! - Without preserving depth, qubits can share a register unless they
//!   interfere through the operation dependency graph
//!   ([`QubitInterferences`]).

pub mod estimator;
pub mod interference;
pub mod interval_coloring;

pub use estimator::{OptimizeFor, ResourceStatistics, WidthEstimator};
pub use interference::QubitInterferences;
pub use interval_coloring::{Interval, min_coloring_size};
