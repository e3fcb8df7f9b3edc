//! Tests for callables: dispatch by functor, copies, capture callbacks and
//! flattening of nested control arrays.

mod common;

use common::tracked_runtime;
use qirt_hal::{HANDLE_SIZE, QubitId};
use qirt_rt::{
    ArrayId, CallableId, FunctionTable, RtResult, Runtime, RuntimeError, TupleId,
};

fn write_marker(rt: &mut Runtime, result: Option<TupleId>, marker: u8) -> RtResult<()> {
    if let Some(result) = result {
        rt.tuple_data_mut(result)?[0] = marker;
    }
    Ok(())
}

fn body(rt: &mut Runtime, _: Option<TupleId>, _: Option<TupleId>, r: Option<TupleId>) -> RtResult<()> {
    write_marker(rt, r, b'B')
}

fn adjoint(rt: &mut Runtime, _: Option<TupleId>, _: Option<TupleId>, r: Option<TupleId>) -> RtResult<()> {
    write_marker(rt, r, b'A')
}

fn controlled(rt: &mut Runtime, _: Option<TupleId>, _: Option<TupleId>, r: Option<TupleId>) -> RtResult<()> {
    write_marker(rt, r, b'C')
}

fn controlled_adjoint(
    rt: &mut Runtime,
    _: Option<TupleId>,
    _: Option<TupleId>,
    r: Option<TupleId>,
) -> RtResult<()> {
    write_marker(rt, r, b'D')
}

/// Writes the first byte of the capture plus the first byte of the args
/// into the result.
fn add_capture(
    rt: &mut Runtime,
    capture: Option<TupleId>,
    args: Option<TupleId>,
    result: Option<TupleId>,
) -> RtResult<()> {
    let captured = match capture {
        Some(c) => rt.tuple_data(c)?[0],
        None => 0,
    };
    let arg = match args {
        Some(a) => rt.tuple_data(a)?[0],
        None => 0,
    };
    write_marker(rt, result, captured + arg)
}

/// Controlled entry that records the flattened controls and the target.
fn record_controls(
    rt: &mut Runtime,
    _: Option<TupleId>,
    args: Option<TupleId>,
    result: Option<TupleId>,
) -> RtResult<()> {
    let (Some(args), Some(result)) = (args, result) else {
        return Err(RuntimeError::InvalidTuple("missing tuples".into()));
    };
    let controls: ArrayId = rt.tuple_read_handle(args, 0)?;
    let target: QubitId = rt.tuple_read_handle(args, HANDLE_SIZE)?;
    let qubits: Vec<QubitId> = rt.array_handles(controls)?;
    let data = rt.tuple_data_mut(result)?;
    data[0] = qubits.len() as u8;
    for (i, q) in qubits.iter().enumerate() {
        data[1 + i] = q.0 as u8;
    }
    data[15] = target.0 as u8;
    Ok(())
}

fn capture_rc(rt: &mut Runtime, capture: Option<TupleId>, count: i32) -> RtResult<()> {
    rt.tuple_update_reference_count(capture, count)
}

fn capture_alias(rt: &mut Runtime, capture: Option<TupleId>, count: i32) -> RtResult<()> {
    rt.tuple_update_alias_count(capture, count)
}

fn full_table() -> FunctionTable {
    FunctionTable::new(body)
        .with_adjoint(adjoint)
        .with_controlled(controlled)
        .with_controlled_adjoint(controlled_adjoint)
}

fn invoke_marker(rt: &mut Runtime, callable: CallableId, args: Option<TupleId>) -> u8 {
    let result = rt.tuple_create(16).unwrap();
    rt.callable_invoke(callable, args, Some(result)).unwrap();
    let marker = rt.tuple_data(result).unwrap()[0];
    rt.tuple_update_reference_count(result, -1).unwrap();
    marker
}

/// `{ controls, qubit }` with the given control qubits.
fn controlled_args(rt: &mut Runtime, controls: &[u64], inner: impl FnOnce(&mut Runtime, TupleId)) -> (TupleId, ArrayId) {
    let array = rt.array_create_1d(HANDLE_SIZE, controls.len()).unwrap();
    for (i, &q) in controls.iter().enumerate() {
        rt.array_write_handle(array, i, QubitId(q)).unwrap();
    }
    let tuple = rt.tuple_create(2 * HANDLE_SIZE).unwrap();
    rt.tuple_write_handle(tuple, 0, array).unwrap();
    inner(rt, tuple);
    (tuple, array)
}

// ---------------------------------------------------------------------------
// Creation and dispatch
// ---------------------------------------------------------------------------

#[test]
fn body_is_required() {
    let mut rt = tracked_runtime();
    let table = FunctionTable::from_entries([None, Some(adjoint), None, None]);
    assert!(matches!(
        rt.callable_create(table, None, None),
        Err(RuntimeError::MissingFunctor { functor: "body" })
    ));
    rt.deinit().unwrap();
}

#[test]
fn invoke_passes_capture_and_args() {
    let mut rt = tracked_runtime();
    let capture = rt.tuple_create(1).unwrap();
    rt.tuple_data_mut(capture).unwrap()[0] = 40;
    let args = rt.tuple_create(1).unwrap();
    rt.tuple_data_mut(args).unwrap()[0] = 2;

    let callable = rt
        .callable_create(FunctionTable::new(add_capture), None, Some(capture))
        .unwrap();
    assert_eq!(invoke_marker(&mut rt, callable, Some(args)), 42);

    rt.callable_update_reference_count(callable, -1).unwrap();
    rt.tuple_update_reference_count(args, -1).unwrap();
    rt.tuple_update_reference_count(capture, -1).unwrap();
    rt.deinit().unwrap();
}

#[test]
fn functors_select_entries() {
    let mut rt = tracked_runtime();
    let callable = rt.callable_create(full_table(), None, None).unwrap();
    assert_eq!(invoke_marker(&mut rt, callable, None), b'B');

    rt.callable_make_adjoint(callable).unwrap();
    assert_eq!(invoke_marker(&mut rt, callable, None), b'A');

    rt.callable_make_controlled(callable).unwrap();
    assert_eq!(rt.callable_functor_bits(callable).unwrap(), 3);
    let args = rt.tuple_create(2 * HANDLE_SIZE).unwrap();
    assert_eq!(invoke_marker(&mut rt, callable, Some(args)), b'D');

    rt.callable_make_adjoint(callable).unwrap();
    assert_eq!(invoke_marker(&mut rt, callable, Some(args)), b'C');

    rt.tuple_update_reference_count(args, -1).unwrap();
    rt.callable_update_reference_count(callable, -1).unwrap();
    rt.deinit().unwrap();
}

#[test]
fn missing_specializations_roll_back() {
    let mut rt = tracked_runtime();
    let callable = rt
        .callable_create(FunctionTable::new(body), None, None)
        .unwrap();
    assert!(matches!(
        rt.callable_make_adjoint(callable),
        Err(RuntimeError::MissingFunctor { functor: "adjoint" })
    ));
    assert!(matches!(
        rt.callable_make_controlled(callable),
        Err(RuntimeError::MissingFunctor { functor: "controlled" })
    ));
    assert_eq!(rt.callable_functor_bits(callable).unwrap(), 0);
    assert_eq!(rt.callable_controlled_depth(callable).unwrap(), 0);
    assert_eq!(invoke_marker(&mut rt, callable, None), b'B');
    rt.callable_update_reference_count(callable, -1).unwrap();
    rt.deinit().unwrap();
}

#[test]
fn controlled_invoke_requires_args() {
    let mut rt = tracked_runtime();
    let callable = rt.callable_create(full_table(), None, None).unwrap();
    rt.callable_make_controlled(callable).unwrap();
    assert!(matches!(
        rt.callable_invoke(callable, None, None),
        Err(RuntimeError::InvalidTuple(_))
    ));
    rt.callable_update_reference_count(callable, -1).unwrap();
    rt.deinit().unwrap();
}

// ---------------------------------------------------------------------------
// Copies
// ---------------------------------------------------------------------------

#[test]
fn copy_carries_functor_state() {
    let mut rt = tracked_runtime();
    let callable = rt.callable_create(full_table(), None, None).unwrap();
    rt.callable_make_adjoint(callable).unwrap();

    let shared = rt.callable_copy(callable, false).unwrap();
    assert_eq!(shared, callable);

    let copy = rt.callable_copy(callable, true).unwrap();
    assert_ne!(copy, callable);
    assert_eq!(rt.callable_functor_bits(copy).unwrap(), 1);

    // the copy evolves independently
    rt.callable_make_adjoint(copy).unwrap();
    assert_eq!(invoke_marker(&mut rt, copy, None), b'B');
    assert_eq!(invoke_marker(&mut rt, callable, None), b'A');

    rt.callable_update_alias_count(callable, 1).unwrap();
    let aliased = rt.callable_copy(callable, false).unwrap();
    assert_ne!(aliased, callable);
    rt.callable_update_alias_count(callable, -1).unwrap();

    for c in [callable, callable, copy, aliased] {
        rt.callable_update_reference_count(c, -1).unwrap();
    }
    rt.deinit().unwrap();
}

// ---------------------------------------------------------------------------
// Capture callbacks
// ---------------------------------------------------------------------------

#[test]
fn capture_callbacks_manage_capture() {
    let mut rt = tracked_runtime();
    let capture = rt.tuple_create(8).unwrap();
    let callable = rt
        .callable_create(
            FunctionTable::new(body),
            Some([Some(capture_rc), Some(capture_alias)]),
            Some(capture),
        )
        .unwrap();

    rt.capture_update_reference_count(callable, 1).unwrap();
    rt.capture_update_alias_count(callable, 1).unwrap();
    assert_eq!(rt.tuple_alias_count(capture).unwrap(), 1);
    rt.callable_memory_management(1, callable, -1).unwrap();
    assert_eq!(rt.tuple_alias_count(capture).unwrap(), 0);

    assert!(matches!(
        rt.callable_memory_management(2, callable, 1),
        Err(RuntimeError::IndexOutOfBounds { index: 2, bound: 2 })
    ));

    rt.capture_update_reference_count(callable, -1).unwrap();
    rt.callable_update_reference_count(callable, -1).unwrap();
    rt.tuple_update_reference_count(capture, -1).unwrap();
    rt.deinit().unwrap();
}

#[test]
fn absent_callbacks_are_skipped() {
    let mut rt = tracked_runtime();
    let callable = rt
        .callable_create(FunctionTable::new(body), None, None)
        .unwrap();
    rt.capture_update_reference_count(callable, 1).unwrap();
    rt.callable_update_reference_count(callable, -1).unwrap();
    rt.deinit().unwrap();
}

// ---------------------------------------------------------------------------
// Nested control flattening
// ---------------------------------------------------------------------------

#[test]
fn nested_controls_are_flattened() {
    let mut rt = tracked_runtime();
    let callable = rt
        .callable_create(
            FunctionTable::new(body).with_controlled(record_controls),
            None,
            None,
        )
        .unwrap();
    rt.callable_make_controlled(callable).unwrap();
    rt.callable_make_controlled(callable).unwrap();
    assert_eq!(rt.callable_controlled_depth(callable).unwrap(), 2);

    // { [1, 2], { [3], q7 } }
    let (inner, inner_controls) = controlled_args(&mut rt, &[3], |rt, t| {
        rt.tuple_write_handle(t, HANDLE_SIZE, QubitId(7)).unwrap();
    });
    let (outer, outer_controls) = controlled_args(&mut rt, &[1, 2], |rt, t| {
        rt.tuple_write_handle(t, HANDLE_SIZE, inner).unwrap();
    });

    let result = rt.tuple_create(16).unwrap();
    rt.callable_invoke(callable, Some(outer), Some(result)).unwrap();
    let data = rt.tuple_data(result).unwrap();
    assert_eq!(data[0], 3);
    assert_eq!(&data[1..4], &[1, 2, 3]);
    assert_eq!(data[15], 7);

    // the inner tuple itself is untouched
    let first: ArrayId = rt.tuple_read_handle(inner, 0).unwrap();
    assert_eq!(first, inner_controls);

    for tuple in [result, outer, inner] {
        rt.tuple_update_reference_count(tuple, -1).unwrap();
    }
    for array in [inner_controls, outer_controls] {
        rt.array_update_reference_count(array, -1).unwrap();
    }
    rt.callable_update_reference_count(callable, -1).unwrap();
    // the flattened tuple and array were released by the invocation
    rt.deinit().unwrap();
}

#[test]
fn malformed_control_tuple_is_rejected() {
    let mut rt = tracked_runtime();
    let callable = rt
        .callable_create(
            FunctionTable::new(body).with_controlled(record_controls),
            None,
            None,
        )
        .unwrap();
    rt.callable_make_controlled(callable).unwrap();
    rt.callable_make_controlled(callable).unwrap();

    // outer level is three words instead of two
    let controls = rt.array_create_1d(HANDLE_SIZE, 1).unwrap();
    let args = rt.tuple_create(3 * HANDLE_SIZE).unwrap();
    rt.tuple_write_handle(args, 0, controls).unwrap();
    assert!(matches!(
        rt.callable_invoke(callable, Some(args), None),
        Err(RuntimeError::InvalidTuple(_))
    ));

    // controls must be handle-sized
    let bytes = rt.array_create_1d(1, 2).unwrap();
    let bad = rt.tuple_create(2 * HANDLE_SIZE).unwrap();
    rt.tuple_write_handle(bad, 0, bytes).unwrap();
    assert!(matches!(
        rt.callable_invoke(callable, Some(bad), None),
        Err(RuntimeError::InvalidTuple(_))
    ));

    for tuple in [args, bad] {
        rt.tuple_update_reference_count(tuple, -1).unwrap();
    }
    for array in [controls, bytes] {
        rt.array_update_reference_count(array, -1).unwrap();
    }
    rt.callable_update_reference_count(callable, -1).unwrap();
    rt.deinit().unwrap();
}

#[test]
fn failed_flattening_leaves_no_objects() {
    let mut rt = tracked_runtime();
    let callable = rt
        .callable_create(
            FunctionTable::new(body).with_controlled(record_controls),
            None,
            None,
        )
        .unwrap();
    rt.callable_make_controlled(callable).unwrap();
    rt.callable_make_controlled(callable).unwrap();

    // the inner level is gone before the call
    let (inner, inner_controls) = controlled_args(&mut rt, &[3], |_, _| {});
    let (outer, outer_controls) = controlled_args(&mut rt, &[1, 2], |rt, t| {
        rt.tuple_write_handle(t, HANDLE_SIZE, inner).unwrap();
    });
    rt.tuple_update_reference_count(inner, -1).unwrap();
    assert!(matches!(
        rt.callable_invoke(callable, Some(outer), None),
        Err(RuntimeError::ReleasedObject(_))
    ));

    rt.tuple_update_reference_count(outer, -1).unwrap();
    for array in [inner_controls, outer_controls] {
        rt.array_update_reference_count(array, -1).unwrap();
    }
    rt.callable_update_reference_count(callable, -1).unwrap();
    rt.deinit().unwrap();
}
