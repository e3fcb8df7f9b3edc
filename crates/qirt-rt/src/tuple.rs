//! Fixed-size byte tuples.
//!
//! A tuple is an opaque, zero-initialized payload whose layout is decided
//! by the compiled program. Handle-typed fields are 8-byte words.

use qirt_hal::{HANDLE_SIZE, RawHandle};

use crate::context::Runtime;
use crate::error::{RtResult, RuntimeError};
use crate::object::{Counted, RefCounts, TupleId};

pub(crate) struct Tuple {
    pub(crate) counts: RefCounts,
    pub(crate) data: Vec<u8>,
}

impl Counted for Tuple {
    fn counts(&self) -> &RefCounts {
        &self.counts
    }

    fn counts_mut(&mut self) -> &mut RefCounts {
        &mut self.counts
    }
}

impl Tuple {
    fn field(&self, offset: usize) -> RtResult<&[u8]> {
        self.data
            .get(offset..offset + HANDLE_SIZE)
            .ok_or(RuntimeError::IndexOutOfBounds {
                index: offset,
                bound: self.data.len().saturating_sub(HANDLE_SIZE - 1),
            })
    }
}

impl Runtime {
    fn insert_tuple(&mut self, data: Vec<u8>) -> RtResult<TupleId> {
        let id = TupleId(self.next_id());
        self.track_allocation(id.key())?;
        self.tuples.insert(
            id.0,
            Tuple {
                counts: RefCounts::new(),
                data,
            },
        );
        Ok(id)
    }

    /// Create a zeroed tuple of `size` bytes.
    pub fn tuple_create(&mut self, size: usize) -> RtResult<TupleId> {
        self.insert_tuple(vec![0; size])
    }

    /// Copy a tuple unless the copy can be elided.
    pub fn tuple_copy(&mut self, tuple: TupleId, force: bool) -> RtResult<TupleId> {
        let source = self.tuples.get(tuple.0)?;
        if !force && source.counts.aliases == 0 {
            self.tuple_update_reference_count(tuple, 1)?;
            return Ok(tuple);
        }
        let data = source.data.clone();
        self.insert_tuple(data)
    }

    pub fn tuple_update_reference_count(
        &mut self,
        tuple: impl Into<Option<TupleId>>,
        increment: i32,
    ) -> RtResult<()> {
        let Some(tuple) = tuple.into() else {
            return Ok(());
        };
        if increment >= 0 {
            self.tuples.add_refs(tuple.0, increment, &mut self.tracker)
        } else {
            self.tuples
                .release(tuple.0, -increment, &mut self.tracker)
                .map(drop)
        }
    }

    pub fn tuple_update_alias_count(
        &mut self,
        tuple: impl Into<Option<TupleId>>,
        increment: i32,
    ) -> RtResult<()> {
        match tuple.into() {
            Some(tuple) => self.tuples.update_aliases(tuple.0, increment),
            None => Ok(()),
        }
    }

    pub fn tuple_size(&self, tuple: TupleId) -> RtResult<usize> {
        Ok(self.tuples.get(tuple.0)?.data.len())
    }

    pub fn tuple_data(&self, tuple: TupleId) -> RtResult<&[u8]> {
        Ok(&self.tuples.get(tuple.0)?.data)
    }

    pub fn tuple_data_mut(&mut self, tuple: TupleId) -> RtResult<&mut [u8]> {
        Ok(&mut self.tuples.get_mut(tuple.0)?.data)
    }

    /// Read the handle stored at byte `offset`.
    pub fn tuple_read_handle<H: RawHandle>(&self, tuple: TupleId, offset: usize) -> RtResult<H> {
        let field = self.tuples.get(tuple.0)?.field(offset)?;
        H::from_bytes(field).ok_or(RuntimeError::IndexOutOfBounds {
            index: offset,
            bound: field.len(),
        })
    }

    /// Store `handle` at byte `offset`.
    pub fn tuple_write_handle<H: RawHandle>(
        &mut self,
        tuple: TupleId,
        offset: usize,
        handle: H,
    ) -> RtResult<()> {
        let entry = self.tuples.get_mut(tuple.0)?;
        entry.field(offset)?;
        entry.data[offset..offset + HANDLE_SIZE].copy_from_slice(&handle.to_bytes());
        Ok(())
    }

    /// Alias count of a tuple.
    pub fn tuple_alias_count(&self, tuple: TupleId) -> RtResult<i64> {
        Ok(self.tuples.get(tuple.0)?.counts.aliases)
    }
}
