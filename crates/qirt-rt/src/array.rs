//! Multi-dimensional arrays of fixed-size items.
//!
//! Arrays are stored row-major: the last dimension varies fastest. Items
//! are placed at a stride equal to the item size rounded up to its natural
//! alignment (the next power of two, at most 8 bytes).

use tracing::{debug, instrument};

use qirt_hal::{HANDLE_SIZE, QubitId, RawHandle};

use crate::context::Runtime;
use crate::error::{RtResult, RuntimeError};
use crate::object::{ArrayId, Counted, RefCounts};
use crate::range::{CheckedRange, Range};

/// Distance in bytes between consecutive items of `item_size` bytes.
pub fn element_stride(item_size: usize) -> usize {
    let align = item_size.next_power_of_two().min(8);
    item_size.div_ceil(align) * align
}

/// Byte length of an array buffer, or `None` when it cannot be allocated.
fn buffer_len(item_size: usize, dims: &[usize]) -> Option<usize> {
    let align = item_size.checked_next_power_of_two()?.min(8);
    let stride = item_size.checked_next_multiple_of(align)?;
    dims.iter()
        .try_fold(stride, |len, &extent| len.checked_mul(extent))
        .filter(|&len| len <= isize::MAX as usize)
}

fn check_buffer_len(item_size: usize, dims: &[usize]) -> RtResult<()> {
    match buffer_len(item_size, dims) {
        Some(_) => Ok(()),
        None => Err(RuntimeError::ArrayTooLarge {
            item_size,
            dims: dims.to_vec(),
        }),
    }
}

pub(crate) struct Array {
    pub(crate) counts: RefCounts,
    pub(crate) item_size: usize,
    pub(crate) stride: usize,
    pub(crate) dims: Vec<usize>,
    pub(crate) count: usize,
    pub(crate) owns_qubits: bool,
    pub(crate) buffer: Vec<u8>,
}

impl Counted for Array {
    fn counts(&self) -> &RefCounts {
        &self.counts
    }

    fn counts_mut(&mut self) -> &mut RefCounts {
        &mut self.counts
    }
}

impl Array {
    pub(crate) fn new(item_size: usize, dims: Vec<usize>) -> Self {
        let stride = element_stride(item_size);
        let count = dims.iter().product();
        Self {
            counts: RefCounts::new(),
            item_size,
            stride,
            dims,
            count,
            owns_qubits: false,
            buffer: vec![0; count * stride],
        }
    }

    /// Element-wise copy. The copy never owns qubits.
    pub(crate) fn copy_of(&self) -> Self {
        Self {
            counts: RefCounts::new(),
            item_size: self.item_size,
            stride: self.stride,
            dims: self.dims.clone(),
            count: self.count,
            owns_qubits: false,
            buffer: self.buffer.clone(),
        }
    }

    #[inline]
    fn item_range(&self, index: usize) -> std::ops::Range<usize> {
        let offset = index * self.stride;
        offset..offset + self.item_size
    }

    #[inline]
    fn items(&self, first: usize, len: usize) -> &[u8] {
        &self.buffer[first * self.stride..(first + len) * self.stride]
    }

    pub(crate) fn element(&self, index: usize) -> RtResult<&[u8]> {
        if index >= self.count {
            return Err(RuntimeError::IndexOutOfBounds {
                index,
                bound: self.count,
            });
        }
        Ok(&self.buffer[self.item_range(index)])
    }

    pub(crate) fn element_mut(&mut self, index: usize) -> RtResult<&mut [u8]> {
        if index >= self.count {
            return Err(RuntimeError::IndexOutOfBounds {
                index,
                bound: self.count,
            });
        }
        let range = self.item_range(index);
        Ok(&mut self.buffer[range])
    }

    /// Row-major linear index of a multi-dimensional position.
    pub(crate) fn linear_index(&self, indices: &[usize]) -> RtResult<usize> {
        if indices.len() != self.dims.len() {
            return Err(RuntimeError::DimensionMismatch(format!(
                "{} indices for an array of rank {}",
                indices.len(),
                self.dims.len()
            )));
        }
        let mut linear = 0;
        for (&index, &extent) in indices.iter().zip(&self.dims) {
            if index >= extent {
                return Err(RuntimeError::IndexOutOfBounds {
                    index,
                    bound: extent,
                });
            }
            linear = linear * extent + index;
        }
        Ok(linear)
    }

    pub(crate) fn check_dim(&self, dim: usize) -> RtResult<()> {
        if dim >= self.dims.len() {
            return Err(RuntimeError::DimensionOutOfBounds {
                dim,
                rank: self.dims.len(),
            });
        }
        Ok(())
    }

    /// Number of consecutive items that share one index in dimension `dim`.
    fn run_count(&self, dim: usize) -> usize {
        self.dims[dim + 1..].iter().product()
    }

    /// Copy of the elements selected by `range` along `dim`.
    pub(crate) fn slice(&self, dim: usize, range: &CheckedRange) -> Self {
        let mut dims = self.dims.clone();
        dims[dim] = range.width as usize;
        let mut slice = Array::new(self.item_size, dims);
        if slice.count == 0 {
            return slice;
        }

        let run = self.run_count(dim);
        let row = run * self.dims[dim];
        let rows = self.count / row;
        let mut dst = 0;

        if range.step == 1 {
            let chunk = run * range.width as usize;
            for r in 0..rows {
                let src = r * row + range.start as usize * run;
                slice.buffer[dst * self.stride..(dst + chunk) * self.stride]
                    .copy_from_slice(self.items(src, chunk));
                dst += chunk;
            }
        } else {
            for r in 0..rows {
                for index in range.indices() {
                    let src = r * row + index as usize * run;
                    slice.buffer[dst * self.stride..(dst + run) * self.stride]
                        .copy_from_slice(self.items(src, run));
                    dst += run;
                }
            }
        }
        slice
    }

    /// Copy of the hyperplane `index` along `dim`, with `dim` removed.
    pub(crate) fn project(&self, dim: usize, index: usize) -> Self {
        let mut dims = self.dims.clone();
        dims.remove(dim);
        let mut projection = Array::new(self.item_size, dims);
        if projection.count == 0 {
            return projection;
        }

        let run = self.run_count(dim);
        let row = run * self.dims[dim];
        for r in 0..self.count / row {
            let src = r * row + index * run;
            let dst = r * run;
            projection.buffer[dst * self.stride..(dst + run) * self.stride]
                .copy_from_slice(self.items(src, run));
        }
        projection
    }

    pub(crate) fn append(&mut self, other: &Array) {
        self.buffer.extend_from_slice(&other.buffer);
        self.count += other.count;
        self.dims[0] = self.count;
    }
}

impl Runtime {
    pub(crate) fn insert_array(&mut self, array: Array) -> RtResult<ArrayId> {
        let id = ArrayId(self.next_id());
        self.track_allocation(id.key())?;
        self.arrays.insert(id.0, array);
        Ok(id)
    }

    /// Create a one-dimensional array of `count` zeroed items.
    pub fn array_create_1d(&mut self, item_size: usize, count: usize) -> RtResult<ArrayId> {
        self.array_create(item_size, &[count])
    }

    /// Create an array with the given shape.
    pub fn array_create(&mut self, item_size: usize, dims: &[usize]) -> RtResult<ArrayId> {
        if item_size == 0 {
            return Err(RuntimeError::InvalidItemSize(item_size));
        }
        if dims.is_empty() {
            return Err(RuntimeError::DimensionMismatch(
                "an array needs at least one dimension".into(),
            ));
        }
        check_buffer_len(item_size, dims)?;
        self.insert_array(Array::new(item_size, dims.to_vec()))
    }

    pub fn array_get_dim(&self, array: ArrayId) -> RtResult<usize> {
        Ok(self.arrays.get(array.0)?.dims.len())
    }

    /// Extent of dimension `dim`.
    pub fn array_get_size(&self, array: ArrayId, dim: usize) -> RtResult<usize> {
        let array = self.arrays.get(array.0)?;
        array.check_dim(dim)?;
        Ok(array.dims[dim])
    }

    /// Length of a one-dimensional array.
    pub fn array_get_size_1d(&self, array: ArrayId) -> RtResult<usize> {
        let array = self.arrays.get(array.0)?;
        if array.dims.len() != 1 {
            return Err(RuntimeError::DimensionMismatch(format!(
                "expected a 1-D array, got rank {}",
                array.dims.len()
            )));
        }
        Ok(array.count)
    }

    pub fn array_item_size(&self, array: ArrayId) -> RtResult<usize> {
        Ok(self.arrays.get(array.0)?.item_size)
    }

    pub fn array_owns_qubits(&self, array: ArrayId) -> RtResult<bool> {
        Ok(self.arrays.get(array.0)?.owns_qubits)
    }

    /// Raw storage, `None` for an empty array.
    pub fn array_buffer(&self, array: ArrayId) -> RtResult<Option<&[u8]>> {
        let array = self.arrays.get(array.0)?;
        Ok((array.count > 0).then_some(array.buffer.as_slice()))
    }

    pub fn array_get_element(&self, array: ArrayId, index: usize) -> RtResult<&[u8]> {
        self.arrays.get(array.0)?.element(index)
    }

    pub fn array_get_element_mut(&mut self, array: ArrayId, index: usize) -> RtResult<&mut [u8]> {
        self.arrays.get_mut(array.0)?.element_mut(index)
    }

    pub fn array_get_element_nd(&self, array: ArrayId, indices: &[usize]) -> RtResult<&[u8]> {
        let array = self.arrays.get(array.0)?;
        array.element(array.linear_index(indices)?)
    }

    pub fn array_get_element_nd_mut(
        &mut self,
        array: ArrayId,
        indices: &[usize],
    ) -> RtResult<&mut [u8]> {
        let array = self.arrays.get_mut(array.0)?;
        let index = array.linear_index(indices)?;
        array.element_mut(index)
    }

    pub fn array_read_handle<H: RawHandle>(&self, array: ArrayId, index: usize) -> RtResult<H> {
        let element = self.array_get_element(array, index)?;
        H::from_bytes(element).ok_or(RuntimeError::ItemSizeMismatch {
            expected: HANDLE_SIZE,
            got: element.len(),
        })
    }

    pub fn array_write_handle<H: RawHandle>(
        &mut self,
        array: ArrayId,
        index: usize,
        handle: H,
    ) -> RtResult<()> {
        let element = self.array_get_element_mut(array, index)?;
        if element.len() != HANDLE_SIZE {
            return Err(RuntimeError::ItemSizeMismatch {
                expected: HANDLE_SIZE,
                got: element.len(),
            });
        }
        element.copy_from_slice(&handle.to_bytes());
        Ok(())
    }

    /// All items of a handle array, in order.
    pub fn array_handles<H: RawHandle>(&self, array: ArrayId) -> RtResult<Vec<H>> {
        let array = self.arrays.get(array.0)?;
        if array.item_size != HANDLE_SIZE {
            return Err(RuntimeError::ItemSizeMismatch {
                expected: HANDLE_SIZE,
                got: array.item_size,
            });
        }
        Ok(array
            .buffer
            .chunks_exact(array.stride)
            .filter_map(H::from_bytes)
            .collect())
    }

    pub fn array_update_reference_count(
        &mut self,
        array: impl Into<Option<ArrayId>>,
        increment: i32,
    ) -> RtResult<()> {
        let Some(array) = array.into() else {
            return Ok(());
        };
        if increment >= 0 {
            return self.arrays.add_refs(array.0, increment, &mut self.tracker);
        }
        if let Some(released) = self.arrays.release(array.0, -increment, &mut self.tracker)? {
            if released.owns_qubits {
                self.release_owned_qubits(&released)?;
            }
        }
        Ok(())
    }

    pub fn array_update_alias_count(
        &mut self,
        array: impl Into<Option<ArrayId>>,
        increment: i32,
    ) -> RtResult<()> {
        match array.into() {
            Some(array) => self.arrays.update_aliases(array.0, increment),
            None => Ok(()),
        }
    }

    /// Copy an array unless the copy can be elided.
    ///
    /// Without `force`, a copy is only made while the array is aliased;
    /// otherwise the same handle comes back with one more reference.
    pub fn array_copy(&mut self, array: ArrayId, force: bool) -> RtResult<ArrayId> {
        let source = self.arrays.get(array.0)?;
        if !force && source.counts.aliases == 0 {
            self.array_update_reference_count(array, 1)?;
            return Ok(array);
        }
        if source.owns_qubits {
            return Err(RuntimeError::OwnsQubits(array.key()));
        }
        let copy = source.copy_of();
        self.insert_array(copy)
    }

    /// New array holding the items of `head` followed by those of `tail`.
    /// The result never owns qubits, whoever owns the sources.
    pub fn array_concatenate(&mut self, head: ArrayId, tail: ArrayId) -> RtResult<ArrayId> {
        let first = self.arrays.get(head.0)?;
        let second = self.arrays.get(tail.0)?;
        if first.dims.len() != 1 || second.dims.len() != 1 {
            return Err(RuntimeError::DimensionMismatch(
                "only 1-D arrays can be concatenated".into(),
            ));
        }
        if first.item_size != second.item_size {
            return Err(RuntimeError::ItemSizeMismatch {
                expected: first.item_size,
                got: second.item_size,
            });
        }
        let mut joined = first.copy_of();
        joined.append(second);
        self.insert_array(joined)
    }

    /// New array with the elements selected by `range` along `dim`.
    #[instrument(skip(self))]
    pub fn array_slice(&mut self, array: ArrayId, dim: usize, range: Range) -> RtResult<ArrayId> {
        let source = self.arrays.get(array.0)?;
        source.check_dim(dim)?;
        let extent = source.dims[dim];
        let checked = CheckedRange::new(range, extent as i64)?;

        let slice = if checked.step == 1 && checked.start == 0 && checked.width == extent as i64 {
            source.copy_of()
        } else {
            source.slice(dim, &checked)
        };
        debug!(width = checked.width, "Sliced array");
        self.insert_array(slice)
    }

    pub fn array_slice_1d(&mut self, array: ArrayId, range: Range) -> RtResult<ArrayId> {
        self.array_slice(array, 0, range)
    }

    /// New array of rank one lower: the hyperplane at `index` along `dim`.
    pub fn array_project(&mut self, array: ArrayId, dim: usize, index: usize) -> RtResult<ArrayId> {
        let source = self.arrays.get(array.0)?;
        if source.dims.len() < 2 {
            return Err(RuntimeError::DimensionMismatch(
                "cannot project a 1-D array".into(),
            ));
        }
        source.check_dim(dim)?;
        if index >= source.dims[dim] {
            return Err(RuntimeError::IndexOutOfBounds {
                index,
                bound: source.dims[dim],
            });
        }
        let projection = source.project(dim, index);
        self.insert_array(projection)
    }

    /// Allocate `count` qubits into a new array that owns them.
    #[instrument(skip(self))]
    pub fn qubit_allocate_array(&mut self, count: usize) -> RtResult<ArrayId> {
        check_buffer_len(HANDLE_SIZE, &[count])?;
        let mut array = Array::new(HANDLE_SIZE, vec![count]);
        for index in 0..count {
            let qubit = self.driver.allocate_qubit()?;
            array.element_mut(index)?.copy_from_slice(&qubit.to_bytes());
        }
        array.owns_qubits = true;
        self.insert_array(array)
    }

    /// Release the qubits of an owning array and drop one reference to it.
    pub fn qubit_release_array(&mut self, array: ArrayId) -> RtResult<()> {
        let owner = self.arrays.get_mut(array.0)?;
        if !owner.owns_qubits {
            return Err(RuntimeError::NotQubitOwner(array.key()));
        }
        owner.owns_qubits = false;
        let qubits: Vec<QubitId> = owner
            .buffer
            .chunks_exact(owner.stride)
            .filter_map(QubitId::from_bytes)
            .collect();
        for qubit in qubits {
            self.driver.release_qubit(qubit)?;
        }
        self.array_update_reference_count(array, -1)
    }

    fn release_owned_qubits(&mut self, array: &Array) -> RtResult<()> {
        for qubit in array.buffer.chunks_exact(array.stride).filter_map(QubitId::from_bytes) {
            self.driver.release_qubit(qubit)?;
        }
        Ok(())
    }
}
