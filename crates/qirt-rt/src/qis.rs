//! Intrinsic gates over runtime arrays.
//!
//! Bridges compiled gate calls to the active driver's [`GateSet`]. Control
//! and target registers arrive as qubit arrays, Pauli bases as arrays of
//! one-byte items.

use qirt_hal::{GateSet, HalError, Pauli, QubitId, ResultId};

use crate::context::Runtime;
use crate::error::{RtResult, RuntimeError};
use crate::object::{ArrayId, StringId};

fn gates(rt: &mut Runtime) -> RtResult<&mut dyn GateSet> {
    let name = rt.driver().name().to_owned();
    rt.driver_mut()
        .gate_set()
        .ok_or_else(|| HalError::Unsupported(format!("driver '{name}' has no gate set")).into())
}

/// Decode a Pauli array.
pub fn paulis(rt: &Runtime, array: ArrayId) -> RtResult<Vec<Pauli>> {
    let item_size = rt.array_item_size(array)?;
    if item_size != 1 {
        return Err(RuntimeError::ItemSizeMismatch {
            expected: 1,
            got: item_size,
        });
    }
    match rt.array_buffer(array)? {
        Some(bytes) => Ok(bytes
            .iter()
            .map(|&b| Pauli::try_from(b))
            .collect::<Result<_, _>>()?),
        None => Ok(Vec::new()),
    }
}

/// Decode a qubit array.
pub fn qubits(rt: &Runtime, array: ArrayId) -> RtResult<Vec<QubitId>> {
    rt.array_handles(array)
}

fn bases_and_targets(
    rt: &Runtime,
    bases: ArrayId,
    targets: ArrayId,
) -> RtResult<(Vec<Pauli>, Vec<QubitId>)> {
    let bases = paulis(rt, bases)?;
    let targets = qubits(rt, targets)?;
    if bases.len() != targets.len() {
        return Err(RuntimeError::DimensionMismatch(format!(
            "{} bases for {} qubits",
            bases.len(),
            targets.len()
        )));
    }
    Ok((bases, targets))
}

macro_rules! single_qubit_gate {
    ($body:ident, $ctl:ident, $gate:ident, $controlled:ident) => {
        pub fn $body(rt: &mut Runtime, qubit: QubitId) -> RtResult<()> {
            Ok(gates(rt)?.$gate(qubit)?)
        }

        pub fn $ctl(rt: &mut Runtime, controls: ArrayId, qubit: QubitId) -> RtResult<()> {
            let controls = qubits(rt, controls)?;
            Ok(gates(rt)?.$controlled(&controls, qubit)?)
        }
    };
}

single_qubit_gate!(x, x_ctl, x, controlled_x);
single_qubit_gate!(y, y_ctl, y, controlled_y);
single_qubit_gate!(z, z_ctl, z, controlled_z);
single_qubit_gate!(h, h_ctl, h, controlled_h);
single_qubit_gate!(s, s_ctl, s, controlled_s);
single_qubit_gate!(s_adj, s_ctl_adj, adjoint_s, controlled_adjoint_s);
single_qubit_gate!(t, t_ctl, t, controlled_t);
single_qubit_gate!(t_adj, t_ctl_adj, adjoint_t, controlled_adjoint_t);

pub fn r(rt: &mut Runtime, axis: Pauli, theta: f64, qubit: QubitId) -> RtResult<()> {
    Ok(gates(rt)?.r(axis, qubit, theta)?)
}

pub fn r_adj(rt: &mut Runtime, axis: Pauli, theta: f64, qubit: QubitId) -> RtResult<()> {
    r(rt, axis, -theta, qubit)
}

pub fn r_ctl(
    rt: &mut Runtime,
    controls: ArrayId,
    axis: Pauli,
    theta: f64,
    qubit: QubitId,
) -> RtResult<()> {
    let controls = qubits(rt, controls)?;
    Ok(gates(rt)?.controlled_r(&controls, axis, qubit, theta)?)
}

pub fn r_ctl_adj(
    rt: &mut Runtime,
    controls: ArrayId,
    axis: Pauli,
    theta: f64,
    qubit: QubitId,
) -> RtResult<()> {
    r_ctl(rt, controls, axis, -theta, qubit)
}

pub fn exp(rt: &mut Runtime, bases: ArrayId, theta: f64, targets: ArrayId) -> RtResult<()> {
    let (bases, targets) = bases_and_targets(rt, bases, targets)?;
    Ok(gates(rt)?.exp(&bases, &targets, theta)?)
}

pub fn exp_adj(rt: &mut Runtime, bases: ArrayId, theta: f64, targets: ArrayId) -> RtResult<()> {
    exp(rt, bases, -theta, targets)
}

pub fn exp_ctl(
    rt: &mut Runtime,
    controls: ArrayId,
    bases: ArrayId,
    theta: f64,
    targets: ArrayId,
) -> RtResult<()> {
    let controls = qubits(rt, controls)?;
    let (bases, targets) = bases_and_targets(rt, bases, targets)?;
    Ok(gates(rt)?.controlled_exp(&controls, &bases, &targets, theta)?)
}

pub fn exp_ctl_adj(
    rt: &mut Runtime,
    controls: ArrayId,
    bases: ArrayId,
    theta: f64,
    targets: ArrayId,
) -> RtResult<()> {
    exp_ctl(rt, controls, bases, -theta, targets)
}

/// Joint measurement of `targets` in `bases`.
pub fn measure(rt: &mut Runtime, bases: ArrayId, targets: ArrayId) -> RtResult<ResultId> {
    let (bases, targets) = bases_and_targets(rt, bases, targets)?;
    Ok(gates(rt)?.measure(&bases, &targets)?)
}

/// Fail with `message` unless the driver confirms the expected
/// probability of a Zero outcome, within `tolerance`.
///
/// `probability` is flipped to `1 - probability` when `result` is Zero
/// before being handed to the driver as the probability of Zero.
pub fn assert_measurement_probability(
    rt: &mut Runtime,
    bases: ArrayId,
    targets: ArrayId,
    result: ResultId,
    probability: f64,
    message: StringId,
    tolerance: f64,
) -> RtResult<()> {
    let (bases, targets) = bases_and_targets(rt, bases, targets)?;
    let zero = rt.result_get_zero();
    let probability_of_zero = if rt.result_equal(result, zero)? {
        1.0 - probability
    } else {
        probability
    };

    let name = rt.driver().name().to_owned();
    let diagnostics = rt.driver_mut().diagnostics().ok_or_else(|| {
        RuntimeError::from(HalError::Unsupported(format!(
            "driver '{name}' has no diagnostics"
        )))
    })?;
    if diagnostics.assert_probability(&bases, &targets, probability_of_zero, tolerance)? {
        Ok(())
    } else {
        rt.fail(message)
    }
}
