//! Execution context and allocation tracking.

use rustc_hash::FxHashMap;
use tracing::{debug, instrument, warn};

use qirt_hal::{Driver, ResultId};

use crate::array::Array;
use crate::callable::Callable;
use crate::config::RuntimeConfig;
use crate::error::{RtResult, RuntimeError};
use crate::object::{ObjectKey, ObjectKind, ObjectTable};
use crate::output::OutputSink;
use crate::string::StringTable;
use crate::tuple::Tuple;

/// Per-object reference counts mirrored outside of the objects themselves.
///
/// Entries stay in the map after their count reaches zero, which is what
/// makes double release and resurrection detectable.
#[derive(Debug, Default)]
pub struct AllocationTracker {
    allocated: FxHashMap<ObjectKey, i64>,
    checked: bool,
}

impl AllocationTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_allocate(&mut self, key: ObjectKey) -> RtResult<()> {
        if self.allocated.get(&key).is_some_and(|&refs| refs > 0) {
            return Err(RuntimeError::AllocatedOverLive(key));
        }
        self.allocated.insert(key, 1);
        Ok(())
    }

    pub fn on_add_ref(&mut self, key: ObjectKey) -> RtResult<()> {
        match self.allocated.get_mut(&key) {
            None => Err(RuntimeError::UntrackedObject(key)),
            Some(0) => Err(RuntimeError::Resurrection(key)),
            Some(refs) => {
                *refs += 1;
                Ok(())
            }
        }
    }

    pub fn on_release(&mut self, key: ObjectKey) -> RtResult<()> {
        match self.allocated.get_mut(&key) {
            None => Err(RuntimeError::UntrackedObject(key)),
            Some(0) => Err(RuntimeError::ReleasedObject(key)),
            Some(refs) => {
                *refs -= 1;
                Ok(())
            }
        }
    }

    /// Keys of all objects that are still referenced, sorted.
    pub fn live_objects(&self) -> Vec<ObjectKey> {
        let mut live: Vec<_> = self
            .allocated
            .iter()
            .filter(|&(_, &refs)| refs > 0)
            .map(|(&key, _)| key)
            .collect();
        live.sort_unstable();
        live
    }

    /// Check for leaked objects.
    pub fn check_for_leaks(&mut self) -> RtResult<()> {
        self.checked = true;
        let leaks = self.live_objects();
        if leaks.is_empty() {
            return Ok(());
        }
        warn!(count = leaks.len(), "Found potentially leaked objects");
        for key in &leaks {
            debug!(object = %key, "Leaked object");
        }
        Err(RuntimeError::Leaks { objects: leaks })
    }
}

impl Drop for AllocationTracker {
    fn drop(&mut self) {
        if !self.checked {
            let live = self.live_objects().len();
            if live > 0 {
                warn!(live, "Runtime dropped without deinit while objects are alive");
            }
        }
    }
}

/// Execution context of a compiled program.
///
/// Owns the active driver and every runtime object. All runtime entry
/// points are methods on this type.
pub struct Runtime {
    pub(crate) driver: Box<dyn Driver>,
    pub(crate) tracker: Option<AllocationTracker>,
    next_id: u64,
    pub(crate) arrays: ObjectTable<Array>,
    pub(crate) tuples: ObjectTable<Tuple>,
    pub(crate) callables: ObjectTable<Callable>,
    pub(crate) strings: StringTable,
    pub(crate) results: FxHashMap<ResultId, i64>,
    pub(crate) output: OutputSink,
}

impl Runtime {
    /// Create an execution context around `driver`.
    #[instrument(skip(driver), fields(driver = driver.name()))]
    pub fn new(driver: Box<dyn Driver>, config: RuntimeConfig) -> Self {
        debug!(track_allocations = config.track_allocations, "Initializing runtime");
        Self {
            driver,
            tracker: config.track_allocations.then(AllocationTracker::new),
            next_id: 1,
            arrays: ObjectTable::new(ObjectKind::Array),
            tuples: ObjectTable::new(ObjectKind::Tuple),
            callables: ObjectTable::new(ObjectKind::Callable),
            strings: StringTable::default(),
            results: FxHashMap::default(),
            output: OutputSink::default(),
        }
    }

    /// Tear the context down and hand the driver back.
    ///
    /// With allocation tracking enabled, live objects are reported as
    /// [`RuntimeError::Leaks`].
    #[instrument(skip(self), fields(driver = self.driver.name()))]
    pub fn deinit(mut self) -> RtResult<Box<dyn Driver>> {
        self.output.flush()?;
        if let Some(mut tracker) = self.tracker.take() {
            tracker.check_for_leaks()?;
        }
        debug!("Runtime torn down");
        Ok(self.driver)
    }

    /// Run `f` inside a fresh context and tear it down afterwards.
    ///
    /// An error from `f` takes precedence over a leak report.
    pub fn scoped<R>(
        driver: Box<dyn Driver>,
        config: RuntimeConfig,
        f: impl FnOnce(&mut Runtime) -> RtResult<R>,
    ) -> RtResult<R> {
        let mut runtime = Runtime::new(driver, config);
        let result = f(&mut runtime);
        let teardown = runtime.deinit();
        let value = result?;
        teardown?;
        Ok(value)
    }

    /// The active driver.
    pub fn driver(&self) -> &dyn Driver {
        &*self.driver
    }

    pub fn driver_mut(&mut self) -> &mut dyn Driver {
        &mut *self.driver
    }

    /// The active driver as its concrete type.
    pub fn driver_as<T: Driver>(&self) -> Option<&T> {
        let driver: &dyn Driver = &*self.driver;
        driver.as_any().downcast_ref::<T>()
    }

    pub fn driver_as_mut<T: Driver>(&mut self) -> Option<&mut T> {
        let driver: &mut dyn Driver = &mut *self.driver;
        driver.as_any_mut().downcast_mut::<T>()
    }

    pub fn is_tracking_allocations(&self) -> bool {
        self.tracker.is_some()
    }

    /// Keys of all live tracked objects, empty when tracking is off.
    pub fn live_objects(&self) -> Vec<ObjectKey> {
        self.tracker
            .as_ref()
            .map(AllocationTracker::live_objects)
            .unwrap_or_default()
    }

    pub(crate) fn next_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// Announce a freshly allocated object to the tracker.
    pub(crate) fn track_allocation(&mut self, key: ObjectKey) -> RtResult<()> {
        match self.tracker.as_mut() {
            Some(tracker) => tracker.on_allocate(key),
            None => Ok(()),
        }
    }
}

impl std::fmt::Debug for Runtime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runtime")
            .field("driver", &self.driver.name())
            .field("track_allocations", &self.tracker.is_some())
            .field("arrays", &self.arrays.len())
            .field("tuples", &self.tuples.len())
            .field("callables", &self.callables.len())
            .field("strings", &self.strings.len())
            .field("results", &self.results.len())
            .finish()
    }
}
