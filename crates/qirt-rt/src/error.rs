//! Error types for the value runtime.

use qirt_hal::HalError;
use thiserror::Error;

use crate::config::ConfigError;
use crate::object::ObjectKey;
use crate::range::Range;

/// Errors that can occur in runtime operations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum RuntimeError {
    /// The object was already destroyed (double release, use after release).
    #[error("{0} has already been released")]
    ReleasedObject(ObjectKey),

    /// AddRef on an object whose tracked reference count reached zero.
    #[error("Cannot resurrect released {0}")]
    Resurrection(ObjectKey),

    /// The allocation tracker never saw this object being allocated.
    #[error("{0} is not tracked")]
    UntrackedObject(ObjectKey),

    /// The tracker saw an allocation over a live object.
    #[error("{0} is allocated over a live object")]
    AllocatedOverLive(ObjectKey),

    /// A release would drop the reference count below zero.
    #[error("Reference count of {object} would become {count}")]
    NegativeReferenceCount {
        /// The object being released.
        object: ObjectKey,
        /// The count the update would have produced.
        count: i64,
    },

    /// An alias update would make the alias count negative.
    #[error("Alias count cannot be negative for {0}")]
    NegativeAliasCount(ObjectKey),

    /// The callable has no entry for the requested functor specialization.
    #[error("The callable doesn't provide the {functor} specialization")]
    MissingFunctor {
        /// Name of the missing specialization.
        functor: &'static str,
    },

    /// Range with a zero step.
    #[error("Invalid range {0}: the step must be nonzero")]
    InvalidRange(Range),

    /// Range selects elements outside of the dimension.
    #[error("Range {range} is out of bounds for a dimension of size {bound}")]
    RangeOutOfBounds {
        /// The offending range.
        range: Range,
        /// Extent of the sliced dimension.
        bound: i64,
    },

    /// Index outside of its valid bounds.
    #[error("Index {index} is out of bounds (size {bound})")]
    IndexOutOfBounds {
        /// The offending index.
        index: usize,
        /// Number of valid positions.
        bound: usize,
    },

    /// Dimension index outside of the array rank.
    #[error("Dimension {dim} is out of bounds for an array of rank {rank}")]
    DimensionOutOfBounds {
        /// The offending dimension.
        dim: usize,
        /// Rank of the array.
        rank: usize,
    },

    /// Shapes or ranks do not agree.
    #[error("Dimension mismatch: {0}")]
    DimensionMismatch(String),

    /// Item sizes of two arrays (or of an array and a handle) disagree.
    #[error("Item size mismatch: expected {expected}, got {got}")]
    ItemSizeMismatch {
        /// Expected item size in bytes.
        expected: usize,
        /// Actual item size in bytes.
        got: usize,
    },

    /// Arrays need a nonzero item size.
    #[error("Invalid item size {0}")]
    InvalidItemSize(usize),

    /// The shape and item size need more memory than can be addressed.
    #[error("An array of {item_size}-byte items with shape {dims:?} is too large")]
    ArrayTooLarge {
        /// Requested item size in bytes.
        item_size: usize,
        /// Requested extents.
        dims: Vec<usize>,
    },

    /// Output redirections restored out of nesting order.
    #[error("Output redirect: {0}")]
    OutputRedirect(String),

    /// Qubit ownership cannot be duplicated.
    #[error("{0} owns its qubits")]
    OwnsQubits(ObjectKey),

    /// Qubits can only be released through the array that owns them.
    #[error("{0} does not own its qubits")]
    NotQubitOwner(ObjectKey),

    /// Malformed controlled-argument tuple.
    #[error("Invalid tuple: {0}")]
    InvalidTuple(String),

    /// The result has no observed value yet.
    #[error("Result value is pending")]
    ResultPending,

    /// Tracked objects were still alive at teardown.
    #[error("Found {} potentially leaked objects", .objects.len())]
    Leaks {
        /// Keys of the leaked objects.
        objects: Vec<ObjectKey>,
    },

    /// User-level failure raised by the compiled program.
    #[error("{0}")]
    Failure(String),

    /// Driver error.
    #[error(transparent)]
    Hal(#[from] HalError),

    /// Configuration error.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Output sink error.
    #[error("Output error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for runtime operations.
pub type RtResult<T> = Result<T, RuntimeError>;
