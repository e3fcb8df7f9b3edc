//! Callables: function tables with functor state and an optional capture.
//!
//! A callable carries four entries, indexed by the applied functor bits
//! (`0` body, `1` adjoint, `2` controlled, `3` controlled adjoint). Applying
//! `Adjoint` toggles bit 0; applying `Controlled` sets bit 1 and deepens the
//! control nesting by one.

use std::fmt;

use tracing::{instrument, trace};

use qirt_hal::{HANDLE_SIZE, RawHandle};

use crate::context::Runtime;
use crate::error::{RtResult, RuntimeError};
use crate::object::{ArrayId, CallableId, Counted, RefCounts, TupleId};

/// Implementation of one specialization: `(runtime, capture, args, result)`.
pub type CallableEntry =
    fn(&mut Runtime, Option<TupleId>, Option<TupleId>, Option<TupleId>) -> RtResult<()>;

/// Memory-management hook for a capture tuple: `(runtime, capture, count)`.
pub type CaptureCallback = fn(&mut Runtime, Option<TupleId>, i32) -> RtResult<()>;

/// Functor applicable to a callable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Functor {
    Adjoint,
    Controlled,
}

impl Functor {
    #[inline]
    pub const fn bit(self) -> u8 {
        match self {
            Functor::Adjoint => 1,
            Functor::Controlled => 2,
        }
    }
}

impl fmt::Display for Functor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Functor::Adjoint => f.write_str("adjoint"),
            Functor::Controlled => f.write_str("controlled"),
        }
    }
}

fn specialization_name(index: u8) -> &'static str {
    match index {
        0 => "body",
        1 => "adjoint",
        2 => "controlled",
        _ => "controlled adjoint",
    }
}

/// Specializations of a callable, indexed by functor bits.
#[derive(Clone, Copy, Default)]
pub struct FunctionTable {
    entries: [Option<CallableEntry>; 4],
}

impl FunctionTable {
    pub fn new(body: CallableEntry) -> Self {
        Self {
            entries: [Some(body), None, None, None],
        }
    }

    pub fn from_entries(entries: [Option<CallableEntry>; 4]) -> Self {
        Self { entries }
    }

    pub fn with_adjoint(mut self, entry: CallableEntry) -> Self {
        self.entries[1] = Some(entry);
        self
    }

    pub fn with_controlled(mut self, entry: CallableEntry) -> Self {
        self.entries[2] = Some(entry);
        self
    }

    pub fn with_controlled_adjoint(mut self, entry: CallableEntry) -> Self {
        self.entries[3] = Some(entry);
        self
    }

    #[inline]
    pub fn get(&self, index: u8) -> Option<CallableEntry> {
        self.entries.get(usize::from(index)).copied().flatten()
    }
}

impl fmt::Debug for FunctionTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let present: Vec<_> = (0..4u8)
            .filter(|&i| self.get(i).is_some())
            .map(specialization_name)
            .collect();
        f.debug_tuple("FunctionTable").field(&present).finish()
    }
}

/// Capture callbacks: index 0 updates reference counts, index 1 alias counts.
pub type CaptureCallbacks = [Option<CaptureCallback>; 2];

#[derive(Clone)]
pub(crate) struct Callable {
    pub(crate) counts: RefCounts,
    table: FunctionTable,
    callbacks: CaptureCallbacks,
    capture: Option<TupleId>,
    applied: u8,
    controlled_depth: u32,
}

impl Counted for Callable {
    fn counts(&self) -> &RefCounts {
        &self.counts
    }

    fn counts_mut(&mut self) -> &mut RefCounts {
        &mut self.counts
    }
}

impl Callable {
    fn apply(&mut self, functor: Functor) -> RtResult<()> {
        match functor {
            Functor::Adjoint => {
                self.applied ^= Functor::Adjoint.bit();
                if self.table.get(self.applied).is_none() {
                    self.applied ^= Functor::Adjoint.bit();
                    return Err(RuntimeError::MissingFunctor {
                        functor: "adjoint",
                    });
                }
            }
            Functor::Controlled => {
                self.applied |= Functor::Controlled.bit();
                if self.table.get(self.applied).is_none() {
                    if self.controlled_depth == 0 {
                        self.applied ^= Functor::Controlled.bit();
                    }
                    return Err(RuntimeError::MissingFunctor {
                        functor: "controlled",
                    });
                }
                self.controlled_depth += 1;
            }
        }
        Ok(())
    }
}

impl Runtime {
    fn insert_callable(&mut self, callable: Callable) -> RtResult<CallableId> {
        let id = CallableId(self.next_id());
        self.track_allocation(id.key())?;
        self.callables.insert(id.0, callable);
        Ok(id)
    }

    /// Create a callable. The body entry is required.
    pub fn callable_create(
        &mut self,
        table: FunctionTable,
        callbacks: Option<CaptureCallbacks>,
        capture: Option<TupleId>,
    ) -> RtResult<CallableId> {
        if table.get(0).is_none() {
            return Err(RuntimeError::MissingFunctor { functor: "body" });
        }
        self.insert_callable(Callable {
            counts: RefCounts::new(),
            table,
            callbacks: callbacks.unwrap_or_default(),
            capture,
            applied: 0,
            controlled_depth: 0,
        })
    }

    /// Invoke the specialization selected by the applied functors.
    ///
    /// With two or more nested `Controlled` applications, the nested
    /// control arrays in `args` are flattened into one array first.
    pub fn callable_invoke(
        &mut self,
        callable: CallableId,
        args: Option<TupleId>,
        result: Option<TupleId>,
    ) -> RtResult<()> {
        let (entry, capture, depth) = {
            let c = self.callables.get(callable.0)?;
            let entry = c.table.get(c.applied).ok_or(RuntimeError::MissingFunctor {
                functor: specialization_name(c.applied),
            })?;
            (entry, c.capture, c.controlled_depth)
        };
        trace!(%callable, depth, "Invoking callable");

        if depth == 0 {
            return entry(self, capture, args, result);
        }
        let args = args.ok_or_else(|| {
            RuntimeError::InvalidTuple("controlled callable invoked without arguments".into())
        })?;
        if depth == 1 {
            return entry(self, capture, Some(args), result);
        }

        let flat = self.flatten_control_arrays(args, depth)?;
        let outcome = entry(self, capture, Some(flat), result);
        let controls: ArrayId = self.tuple_read_handle(flat, 0)?;
        self.array_update_reference_count(controls, -1)?;
        self.tuple_update_reference_count(flat, -1)?;
        outcome
    }

    /// Merge `depth` levels of `{ controls, inner }` tuples into a copy of the
    /// innermost tuple whose first field is the combined controls array.
    ///
    /// The caller releases both the returned tuple and its controls array.
    #[instrument(skip(self))]
    fn flatten_control_arrays(&mut self, args: TupleId, depth: u32) -> RtResult<TupleId> {
        let mut levels = Vec::with_capacity(depth as usize);
        let mut current = args;
        for level in 0..depth {
            let is_last = level + 1 == depth;
            let size = self.tuple_size(current)?;
            if (!is_last && size != 2 * HANDLE_SIZE) || size < HANDLE_SIZE {
                return Err(RuntimeError::InvalidTuple(format!(
                    "level {level} of a controlled argument tuple has {size} bytes"
                )));
            }
            let controls: ArrayId = self.tuple_read_handle(current, 0)?;
            let item_size = self.array_item_size(controls)?;
            if item_size != HANDLE_SIZE {
                return Err(RuntimeError::InvalidTuple(format!(
                    "controls array at level {level} has item size {item_size}"
                )));
            }
            levels.push(controls);
            if !is_last {
                current = self.tuple_read_handle(current, HANDLE_SIZE)?;
            }
        }

        let mut combined = Vec::new();
        for &controls in &levels {
            if let Some(buffer) = self.array_buffer(controls)? {
                combined.extend_from_slice(buffer);
            }
        }
        let count = combined.len() / HANDLE_SIZE;
        let controls = self.array_create_1d(HANDLE_SIZE, count)?;
        self.arrays
            .get_mut(controls.0)?
            .buffer
            .copy_from_slice(&combined);

        // nothing created here may outlive a failure
        let flat = match self.tuple_copy(current, true) {
            Ok(flat) => flat,
            Err(err) => {
                self.array_update_reference_count(controls, -1)?;
                return Err(err);
            }
        };
        if let Err(err) = self.tuple_write_handle(flat, 0, controls) {
            self.tuple_update_reference_count(flat, -1)?;
            self.array_update_reference_count(controls, -1)?;
            return Err(err);
        }
        trace!(controls = count, "Flattened control arrays");
        Ok(flat)
    }

    /// Copy a callable unless the copy can be elided.
    pub fn callable_copy(&mut self, callable: CallableId, force: bool) -> RtResult<CallableId> {
        let source = self.callables.get(callable.0)?;
        if !force && source.counts.aliases == 0 {
            self.callable_update_reference_count(callable, 1)?;
            return Ok(callable);
        }
        let mut copy = source.clone();
        copy.counts = RefCounts::new();
        self.insert_callable(copy)
    }

    pub fn callable_make_adjoint(&mut self, callable: CallableId) -> RtResult<()> {
        self.callables.get_mut(callable.0)?.apply(Functor::Adjoint)
    }

    pub fn callable_make_controlled(&mut self, callable: CallableId) -> RtResult<()> {
        self.callables.get_mut(callable.0)?.apply(Functor::Controlled)
    }

    /// Applied functor bits: 1 adjoint, 2 controlled.
    pub fn callable_functor_bits(&self, callable: CallableId) -> RtResult<u8> {
        Ok(self.callables.get(callable.0)?.applied)
    }

    pub fn callable_controlled_depth(&self, callable: CallableId) -> RtResult<u32> {
        Ok(self.callables.get(callable.0)?.controlled_depth)
    }

    pub fn callable_update_reference_count(
        &mut self,
        callable: impl Into<Option<CallableId>>,
        increment: i32,
    ) -> RtResult<()> {
        let Some(callable) = callable.into() else {
            return Ok(());
        };
        if increment >= 0 {
            self.callables
                .add_refs(callable.0, increment, &mut self.tracker)
        } else {
            self.callables
                .release(callable.0, -increment, &mut self.tracker)
                .map(drop)
        }
    }

    pub fn callable_update_alias_count(
        &mut self,
        callable: impl Into<Option<CallableId>>,
        increment: i32,
    ) -> RtResult<()> {
        match callable.into() {
            Some(callable) => self.callables.update_aliases(callable.0, increment),
            None => Ok(()),
        }
    }

    /// Run capture callback `index` with `parameter`; absent callbacks are
    /// skipped.
    pub fn callable_memory_management(
        &mut self,
        index: usize,
        callable: CallableId,
        parameter: i32,
    ) -> RtResult<()> {
        let c = self.callables.get(callable.0)?;
        let callback = *c
            .callbacks
            .get(index)
            .ok_or(RuntimeError::IndexOutOfBounds {
                index,
                bound: c.callbacks.len(),
            })?;
        let capture = c.capture;
        match callback {
            Some(callback) => callback(self, capture, parameter),
            None => Ok(()),
        }
    }

    pub fn capture_update_reference_count(
        &mut self,
        callable: CallableId,
        increment: i32,
    ) -> RtResult<()> {
        self.callable_memory_management(0, callable, increment)
    }

    pub fn capture_update_alias_count(
        &mut self,
        callable: CallableId,
        increment: i32,
    ) -> RtResult<()> {
        self.callable_memory_management(1, callable, increment)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop(
        _: &mut Runtime,
        _: Option<TupleId>,
        _: Option<TupleId>,
        _: Option<TupleId>,
    ) -> RtResult<()> {
        Ok(())
    }

    fn callable(table: FunctionTable) -> Callable {
        Callable {
            counts: RefCounts::new(),
            table,
            callbacks: [None, None],
            capture: None,
            applied: 0,
            controlled_depth: 0,
        }
    }

    #[test]
    fn test_functor_algebra() {
        let table = FunctionTable::new(noop)
            .with_adjoint(noop)
            .with_controlled(noop)
            .with_controlled_adjoint(noop);
        let mut c = callable(table);

        c.apply(Functor::Adjoint).unwrap();
        assert_eq!(c.applied, 1);
        c.apply(Functor::Adjoint).unwrap();
        assert_eq!(c.applied, 0);

        c.apply(Functor::Controlled).unwrap();
        c.apply(Functor::Adjoint).unwrap();
        assert_eq!(c.applied, 3);
        c.apply(Functor::Controlled).unwrap();
        assert_eq!(c.applied, 3);
        assert_eq!(c.controlled_depth, 2);
        c.apply(Functor::Adjoint).unwrap();
        assert_eq!(c.applied, 2);
    }

    #[test]
    fn test_missing_adjoint_rolls_back() {
        let mut c = callable(FunctionTable::new(noop));
        assert!(matches!(
            c.apply(Functor::Adjoint),
            Err(RuntimeError::MissingFunctor { functor: "adjoint" })
        ));
        assert_eq!(c.applied, 0);
    }

    #[test]
    fn test_missing_controlled_rolls_back_at_depth_zero() {
        let mut c = callable(FunctionTable::new(noop).with_adjoint(noop));
        c.apply(Functor::Adjoint).unwrap();
        assert!(c.apply(Functor::Controlled).is_err());
        assert_eq!(c.applied, 1);
        assert_eq!(c.controlled_depth, 0);
    }

    #[test]
    fn test_function_table_debug() {
        let table = FunctionTable::new(noop).with_controlled(noop);
        assert_eq!(
            format!("{table:?}"),
            r#"FunctionTable(["body", "controlled"])"#
        );
    }
}
