//! qirt Driver Abstraction Layer
//!
//! This crate defines the boundary between the qirt value runtime and the
//! backend that actually owns qubits and measurement results.
//!
//! # Overview
//!
//! - A common [`Driver`] trait for qubit and result lifetime management
//! - The [`GateSet`] and [`Diagnostics`] sub-interfaces for drivers that
//!   execute gates or can inspect their state
//! - Opaque handle types ([`QubitId`], [`ResultId`]) and the [`Pauli`] and
//!   [`ResultValue`] enums shared with compiled programs
//! - A [`DriverRegistry`] for creating drivers by name from a
//!   [`DriverConfig`]
//!
//! # Implementing a Driver
//!
//! ```ignore
//! use qirt_hal::{Driver, HalResult, QubitId, ResultId, ResultValue};
//!
//! #[derive(Default)]
//! struct Counting {
//!     next: u64,
//! }
//!
//! impl Driver for Counting {
//!     fn name(&self) -> &str { "counting" }
//!
//!     fn allocate_qubit(&mut self) -> HalResult<QubitId> {
//!         self.next += 1;
//!         Ok(QubitId(self.next - 1))
//!     }
//!
//!     fn release_qubit(&mut self, _qubit: QubitId) -> HalResult<()> { Ok(()) }
//!     fn qubit_to_string(&self, qubit: QubitId) -> String { qubit.to_string() }
//!     fn release_result(&mut self, _result: ResultId) -> HalResult<()> { Ok(()) }
//!
//!     fn are_equal_results(&self, r1: ResultId, r2: ResultId) -> HalResult<bool> {
//!         Ok(r1 == r2)
//!     }
//!
//!     fn result_value(&self, result: ResultId) -> HalResult<ResultValue> {
//!         Ok(if result == self.use_zero() { ResultValue::Zero } else { ResultValue::One })
//!     }
//!
//!     fn use_zero(&self) -> ResultId { ResultId(0) }
//!     fn use_one(&self) -> ResultId { ResultId(1) }
//! }
//! ```

pub mod driver;
pub mod error;
pub mod handle;
pub mod registry;

pub use driver::{AsAny, Diagnostics, Driver, DriverConfig, DriverFactory, GateSet};
pub use error::{HalError, HalResult};
pub use handle::{HANDLE_SIZE, Pauli, QubitId, RawHandle, ResultId, ResultValue};
pub use registry::DriverRegistry;
