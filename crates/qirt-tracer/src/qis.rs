//! Tracing intrinsics over runtime arrays.
//!
//! Compiled programs targeting the tracer call these instead of the gate
//! intrinsics. Each call forwards to the [`Tracer`] installed as the
//! runtime's driver; any other driver is [`TracerError::NotTracing`].

use tracing::trace;

use qirt_hal::{QubitId, ResultId};
use qirt_rt::{ArrayId, CallableId, RtResult, Runtime};

use crate::error::{TracerError, TracerResult};
use crate::layer::{Duration, OpId};
use crate::tracer::Tracer;

fn tracer(rt: &mut Runtime) -> TracerResult<&mut Tracer> {
    let name = rt.driver().name().to_owned();
    rt.driver_as_mut::<Tracer>()
        .ok_or(TracerError::NotTracing(name))
}

pub fn single_qubit_op(
    rt: &mut Runtime,
    op: OpId,
    duration: Duration,
    target: QubitId,
) -> TracerResult<()> {
    tracer(rt)?.trace_single_qubit_op(op, duration, target)?;
    Ok(())
}

pub fn single_qubit_op_ctl(
    rt: &mut Runtime,
    op: OpId,
    duration: Duration,
    controls: ArrayId,
    target: QubitId,
) -> TracerResult<()> {
    let controls: Vec<QubitId> = rt.array_handles(controls)?;
    tracer(rt)?.trace_multi_qubit_op(op, duration, &controls, &[target])?;
    Ok(())
}

pub fn multi_qubit_op(
    rt: &mut Runtime,
    op: OpId,
    duration: Duration,
    targets: ArrayId,
) -> TracerResult<()> {
    let targets: Vec<QubitId> = rt.array_handles(targets)?;
    tracer(rt)?.trace_multi_qubit_op(op, duration, &[], &targets)?;
    Ok(())
}

pub fn multi_qubit_op_ctl(
    rt: &mut Runtime,
    op: OpId,
    duration: Duration,
    controls: ArrayId,
    targets: ArrayId,
) -> TracerResult<()> {
    let controls: Vec<QubitId> = rt.array_handles(controls)?;
    let targets: Vec<QubitId> = rt.array_handles(targets)?;
    tracer(rt)?.trace_multi_qubit_op(op, duration, &controls, &targets)?;
    Ok(())
}

pub fn inject_barrier(rt: &mut Runtime, op: OpId, duration: Duration) -> TracerResult<()> {
    tracer(rt)?.inject_global_barrier(op, duration)?;
    Ok(())
}

pub fn single_qubit_measure(
    rt: &mut Runtime,
    op: OpId,
    duration: Duration,
    target: QubitId,
) -> TracerResult<ResultId> {
    tracer(rt)?.trace_single_qubit_measurement(op, duration, target)
}

pub fn joint_measure(
    rt: &mut Runtime,
    op: OpId,
    duration: Duration,
    targets: ArrayId,
) -> TracerResult<ResultId> {
    let targets: Vec<QubitId> = rt.array_handles(targets)?;
    tracer(rt)?.trace_multi_qubit_measurement(op, duration, &targets)
}

/// Trace both branches of a measurement-conditioned operation.
///
/// Result values are not available while tracing, so both callables are
/// invoked, inside a fence at the layers that measured `results1` and
/// `results2`. The fence is popped on every exit path.
pub fn apply_conditionally(
    rt: &mut Runtime,
    results1: ArrayId,
    results2: ArrayId,
    on_equal: CallableId,
    on_different: CallableId,
) -> TracerResult<()> {
    let results1: Vec<ResultId> = rt.array_handles(results1)?;
    let results2: Vec<ResultId> = rt.array_handles(results2)?;
    let fence = tracer(rt)?.push_fence(&results1, &results2)?;

    let outcome = invoke_both(rt, on_equal, on_different);
    tracer(rt)?.pop_fence(fence);
    Ok(outcome?)
}

fn invoke_both(rt: &mut Runtime, first: CallableId, second: CallableId) -> RtResult<()> {
    rt.callable_invoke(first, None, None)?;
    rt.callable_invoke(second, None, None)
}

/// Swaps are free while tracing.
pub fn swap(_rt: &mut Runtime, q1: QubitId, q2: QubitId) {
    trace!(%q1, %q2, "Ignoring swap");
}

pub fn on_operation_start(_rt: &mut Runtime, _op: i64) {}

pub fn on_operation_end(_rt: &mut Runtime, _op: i64) {}
