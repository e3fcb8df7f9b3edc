//! Runtime object handles and the reference-counted object tables.
//!
//! Every array, tuple, callable and string lives in a table owned by the
//! [`Runtime`](crate::Runtime) and is addressed by a `Copy` handle. Handle
//! values are never reused, so a handle compares equal to another exactly
//! when both refer to the same object.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::fmt;

use qirt_hal::RawHandle;

use crate::context::AllocationTracker;
use crate::error::{RtResult, RuntimeError};

/// Kind of a runtime object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ObjectKind {
    Array,
    Tuple,
    Callable,
    String,
    Result,
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ObjectKind::Array => "array",
            ObjectKind::Tuple => "tuple",
            ObjectKind::Callable => "callable",
            ObjectKind::String => "string",
            ObjectKind::Result => "result",
        };
        f.write_str(name)
    }
}

/// Identity of a runtime object, used in diagnostics and by the
/// allocation tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectKey {
    pub kind: ObjectKind,
    pub id: u64,
}

impl ObjectKey {
    pub fn new(kind: ObjectKind, id: u64) -> Self {
        Self { kind, id }
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.kind, self.id)
    }
}

macro_rules! object_handle {
    ($(#[$meta:meta])* $name:ident, $kind:expr) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(pub(crate) u64);

        impl $name {
            /// Object key of the referenced object.
            #[inline]
            pub fn key(self) -> ObjectKey {
                ObjectKey::new($kind, self.0)
            }
        }

        impl RawHandle for $name {
            fn from_raw(raw: u64) -> Self {
                $name(raw)
            }

            fn into_raw(self) -> u64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.key())
            }
        }
    };
}

object_handle!(
    /// Handle to a runtime array.
    ArrayId,
    ObjectKind::Array
);
object_handle!(
    /// Handle to a runtime tuple.
    TupleId,
    ObjectKind::Tuple
);
object_handle!(
    /// Handle to a runtime callable.
    CallableId,
    ObjectKind::Callable
);
object_handle!(
    /// Handle to an interned string.
    StringId,
    ObjectKind::String
);

/// Strong reference count plus the count of live read-only aliases.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct RefCounts {
    pub(crate) refs: i64,
    pub(crate) aliases: i64,
}

impl RefCounts {
    pub(crate) fn new() -> Self {
        Self {
            refs: 1,
            aliases: 0,
        }
    }
}

/// Objects that carry [`RefCounts`].
pub(crate) trait Counted {
    fn counts(&self) -> &RefCounts;
    fn counts_mut(&mut self) -> &mut RefCounts;
}

/// Table of live objects of one kind.
pub(crate) struct ObjectTable<T> {
    kind: ObjectKind,
    objects: FxHashMap<u64, T>,
}

impl<T: Counted> ObjectTable<T> {
    pub(crate) fn new(kind: ObjectKind) -> Self {
        Self {
            kind,
            objects: FxHashMap::default(),
        }
    }

    #[inline]
    pub(crate) fn key(&self, id: u64) -> ObjectKey {
        ObjectKey::new(self.kind, id)
    }

    pub(crate) fn insert(&mut self, id: u64, object: T) {
        self.objects.insert(id, object);
    }

    pub(crate) fn get(&self, id: u64) -> RtResult<&T> {
        self.objects
            .get(&id)
            .ok_or(RuntimeError::ReleasedObject(self.key(id)))
    }

    pub(crate) fn get_mut(&mut self, id: u64) -> RtResult<&mut T> {
        let key = self.key(id);
        self.objects
            .get_mut(&id)
            .ok_or(RuntimeError::ReleasedObject(key))
    }

    pub(crate) fn len(&self) -> usize {
        self.objects.len()
    }

    /// Apply `increment` unit steps of AddRef.
    pub(crate) fn add_refs(
        &mut self,
        id: u64,
        increment: i32,
        tracker: &mut Option<AllocationTracker>,
    ) -> RtResult<()> {
        let key = self.key(id);
        for _ in 0..increment {
            if let Some(tracker) = tracker.as_mut() {
                tracker.on_add_ref(key)?;
            }
            self.get_mut(id)?.counts_mut().refs += 1;
        }
        Ok(())
    }

    /// Apply `decrement` unit steps of Release.
    ///
    /// Returns the object once its reference count reaches zero; the caller
    /// owns its teardown.
    pub(crate) fn release(
        &mut self,
        id: u64,
        decrement: i32,
        tracker: &mut Option<AllocationTracker>,
    ) -> RtResult<Option<T>> {
        let key = self.key(id);
        let decrement = i64::from(decrement);
        if let Some(object) = self.objects.get(&id) {
            let refs = object.counts().refs;
            if decrement > refs {
                return Err(RuntimeError::NegativeReferenceCount {
                    object: key,
                    count: refs - decrement,
                });
            }
        }

        for _ in 0..decrement {
            if let Some(tracker) = tracker.as_mut() {
                tracker.on_release(key)?;
            }
            let counts = self.get_mut(id)?.counts_mut();
            counts.refs -= 1;
            if counts.refs == 0 {
                return Ok(self.objects.remove(&id));
            }
        }
        Ok(None)
    }

    /// Shift the alias count; a negative result is rejected and not applied.
    pub(crate) fn update_aliases(&mut self, id: u64, increment: i32) -> RtResult<()> {
        let key = self.key(id);
        let counts = self.get_mut(id)?.counts_mut();
        let aliases = counts.aliases + i64::from(increment);
        if aliases < 0 {
            return Err(RuntimeError::NegativeAliasCount(key));
        }
        counts.aliases = aliases;
        Ok(())
    }
}
