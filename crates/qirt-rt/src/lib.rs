//! qirt Value Runtime
//!
//! This crate implements the runtime objects that compiled QIR programs
//! manipulate: arrays, tuples, callables, strings and measurement results.
//! Everything lives inside an explicit execution context, the [`Runtime`],
//! which owns the active [`Driver`](qirt_hal::Driver).
//!
//! # Overview
//!
//! - **Context**: [`Runtime`] with optional allocation tracking and leak
//!   reports at teardown ([`Runtime::deinit`], [`Runtime::scoped`])
//! - **Arrays**: multi-dimensional, row-major arrays with slicing
//!   ([`Range`], [`CheckedRange`]), projection and concatenation
//! - **Tuples**: opaque byte payloads with copy-on-alias semantics
//! - **Callables**: [`FunctionTable`] entries selected by the applied
//!   functors, with nested control arrays flattened on invocation
//! - **Strings**: an intern table; equal content means equal handles
//! - **Results and qubits**: reference counting on top of the driver
//! - **Output**: redirectable message sink and user-level failure
//! - **Intrinsics**: [`qis`] bridges gate calls to the driver's gate set
//!
//! # Example: Slicing an Array
//!
//! ```ignore
//! use qirt_rt::{Range, Runtime, RuntimeConfig};
//!
//! let mut rt = Runtime::new(Box::new(driver), RuntimeConfig::tracked());
//! let digits = rt.array_create_1d(1, 5)?;
//! for i in 0..5 {
//!     rt.array_get_element_mut(digits, i)?[0] = b'0' + i as u8;
//! }
//!
//! // 4, 2, 0
//! let reversed = rt.array_slice_1d(digits, Range::new(4, -2, 0))?;
//! assert_eq!(rt.array_buffer(reversed)?, Some(&b"420"[..]));
//!
//! rt.array_update_reference_count(reversed, -1)?;
//! rt.array_update_reference_count(digits, -1)?;
//! rt.deinit()?;
//! ```

pub mod array;
pub mod callable;
pub mod config;
pub mod context;
pub mod error;
pub mod object;
pub mod output;
pub mod qis;
pub mod range;
pub mod result;
pub mod string;
pub mod tuple;

pub use array::element_stride;
pub use callable::{CallableEntry, CaptureCallback, CaptureCallbacks, FunctionTable, Functor};
pub use config::{ConfigError, RuntimeConfig};
pub use context::{AllocationTracker, Runtime};
pub use error::{RtResult, RuntimeError};
pub use object::{ArrayId, CallableId, ObjectKey, ObjectKind, StringId, TupleId};
pub use output::{CapturedOutput, OutputRedirect};
pub use range::{CheckedRange, Range};
pub use string::format_double;
