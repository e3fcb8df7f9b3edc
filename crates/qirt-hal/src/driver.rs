//! Driver trait and configuration.
//!
//! A [`Driver`] is the pluggable backend a runtime executes against: a
//! simulator, a resource estimator, or real hardware. The runtime never
//! invents qubit or result identity itself; it asks the driver.
//!
//! ## Method table
//!
//! | Method | Required | Returns |
//! |--------|----------|---------|
//! | `name()` | yes | `&str` |
//! | `allocate_qubit()` | yes | `HalResult<QubitId>` |
//! | `release_qubit()` | yes | `HalResult<()>` |
//! | `qubit_to_string()` | yes | `String` |
//! | `release_result()` | yes | `HalResult<()>` |
//! | `are_equal_results()` | yes | `HalResult<bool>` |
//! | `result_value()` | yes | `HalResult<ResultValue>` |
//! | `use_zero()` / `use_one()` | yes | `ResultId` |
//! | `gate_set()` | provided | `Option<&mut dyn GateSet>` |
//! | `diagnostics()` | provided | `Option<&mut dyn Diagnostics>` |
//!
//! Results handed out by `use_zero()`/`use_one()` are canonical and never
//! owned by the caller.

use std::any::Any;
use std::io::Write;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{HalError, HalResult};
use crate::handle::{Pauli, QubitId, ResultId, ResultValue};

/// Upcast to [`Any`] so hosts can recover the concrete driver type.
pub trait AsAny: Any {
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Trait for execution drivers.
///
/// # Contract
///
/// - Qubit and result handles are issued by the driver and stay valid until
///   the driver is asked to release them.
/// - `release_result()` is called exactly once per owned result, when the
///   runtime's reference count for it drops to zero.
/// - Drivers that cannot observe measurement outcomes (e.g. resource
///   estimators) return [`HalError::ResultsUnavailable`] from
///   `are_equal_results()` and `result_value()`.
pub trait Driver: AsAny {
    /// Get the name of this driver.
    fn name(&self) -> &str;

    /// Allocate a fresh qubit.
    fn allocate_qubit(&mut self) -> HalResult<QubitId>;

    /// Return a qubit to the driver.
    fn release_qubit(&mut self, qubit: QubitId) -> HalResult<()>;

    /// Human-readable description of a qubit.
    fn qubit_to_string(&self, qubit: QubitId) -> String;

    /// Release a measurement result the runtime no longer references.
    fn release_result(&mut self, result: ResultId) -> HalResult<()>;

    /// Compare two measurement results by value.
    fn are_equal_results(&self, r1: ResultId, r2: ResultId) -> HalResult<bool>;

    /// Observed value of a measurement result.
    fn result_value(&self, result: ResultId) -> HalResult<ResultValue>;

    /// Canonical `Zero` result.
    fn use_zero(&self) -> ResultId;

    /// Canonical `One` result.
    fn use_one(&self) -> ResultId;

    /// Gate-set sub-interface, if the driver executes gates.
    fn gate_set(&mut self) -> Option<&mut dyn GateSet> {
        None
    }

    /// Diagnostics sub-interface, if the driver can inspect its state.
    fn diagnostics(&mut self) -> Option<&mut dyn Diagnostics> {
        None
    }
}

/// Intrinsic gate set.
///
/// Controlled variants take an arbitrary number of control qubits; an
/// empty control list is equivalent to the uncontrolled gate.
pub trait GateSet {
    fn x(&mut self, target: QubitId) -> HalResult<()>;
    fn y(&mut self, target: QubitId) -> HalResult<()>;
    fn z(&mut self, target: QubitId) -> HalResult<()>;
    fn h(&mut self, target: QubitId) -> HalResult<()>;
    fn s(&mut self, target: QubitId) -> HalResult<()>;
    fn t(&mut self, target: QubitId) -> HalResult<()>;
    fn r(&mut self, axis: Pauli, target: QubitId, theta: f64) -> HalResult<()>;
    fn exp(&mut self, paulis: &[Pauli], targets: &[QubitId], theta: f64) -> HalResult<()>;

    fn controlled_x(&mut self, controls: &[QubitId], target: QubitId) -> HalResult<()>;
    fn controlled_y(&mut self, controls: &[QubitId], target: QubitId) -> HalResult<()>;
    fn controlled_z(&mut self, controls: &[QubitId], target: QubitId) -> HalResult<()>;
    fn controlled_h(&mut self, controls: &[QubitId], target: QubitId) -> HalResult<()>;
    fn controlled_s(&mut self, controls: &[QubitId], target: QubitId) -> HalResult<()>;
    fn controlled_t(&mut self, controls: &[QubitId], target: QubitId) -> HalResult<()>;
    fn controlled_r(
        &mut self,
        controls: &[QubitId],
        axis: Pauli,
        target: QubitId,
        theta: f64,
    ) -> HalResult<()>;
    fn controlled_exp(
        &mut self,
        controls: &[QubitId],
        paulis: &[Pauli],
        targets: &[QubitId],
        theta: f64,
    ) -> HalResult<()>;

    fn adjoint_s(&mut self, target: QubitId) -> HalResult<()>;
    fn adjoint_t(&mut self, target: QubitId) -> HalResult<()>;
    fn controlled_adjoint_s(&mut self, controls: &[QubitId], target: QubitId) -> HalResult<()>;
    fn controlled_adjoint_t(&mut self, controls: &[QubitId], target: QubitId) -> HalResult<()>;

    /// Joint measurement of `targets` in the given Pauli `bases`.
    fn measure(&mut self, bases: &[Pauli], targets: &[QubitId]) -> HalResult<ResultId>;
}

/// Optional state inspection.
pub trait Diagnostics {
    /// Visit basis states in little-endian order until `callback` returns `false`.
    fn get_state(&mut self, callback: &mut dyn FnMut(usize, f64, f64) -> bool) -> HalResult<()>;

    /// Dump the whole machine state.
    fn dump_machine(&mut self, out: &mut dyn Write) -> HalResult<()>;

    /// Dump the state of a register.
    fn dump_register(&mut self, out: &mut dyn Write, qubits: &[QubitId]) -> HalResult<()>;

    /// Whether measuring `targets` in `bases` is certain to yield `result`.
    fn assert_measurement(
        &mut self,
        bases: &[Pauli],
        targets: &[QubitId],
        result: ResultId,
    ) -> HalResult<bool>;

    /// Whether measuring `targets` in `bases` yields Zero with the given
    /// probability, within `precision`.
    fn assert_probability(
        &mut self,
        bases: &[Pauli],
        targets: &[QubitId],
        probability_of_zero: f64,
        precision: f64,
    ) -> HalResult<bool>;
}

/// Configuration for a driver instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriverConfig {
    /// Name of the driver.
    pub name: String,
    /// Driver-specific settings.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl DriverConfig {
    /// Create a new driver configuration.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            extra: serde_json::Map::new(),
        }
    }

    /// Add extra configuration.
    pub fn with_extra(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }

    /// Read a typed setting from the extra configuration.
    ///
    /// Returns `Ok(None)` when the key is absent.
    pub fn extra_value<T: DeserializeOwned>(&self, key: &str) -> HalResult<Option<T>> {
        match self.extra.get(key) {
            Some(value) => serde_json::from_value(value.clone())
                .map(Some)
                .map_err(|e| HalError::Configuration(format!("'{key}': {e}"))),
            None => Ok(None),
        }
    }
}

/// Trait for creating drivers from configuration.
pub trait DriverFactory: Driver + Sized {
    /// Create a driver from configuration.
    fn from_config(config: DriverConfig) -> HalResult<Self>;
}
