//! Layering scheduler for resource estimation.
//!
//! The tracer stands in for a quantum driver. Instead of executing gates it
//! receives operation traces (an id, a duration and the qubits involved)
//! and packs them into layers: consecutive time slots whose duration is at
//! least the preferred layer duration. An operation lands in the earliest
//! layer that is not before any of its qubits' previous operations, not
//! before the active barrier or fence, and still has room for it.
//!
//! Zero-duration operations on a qubit that has no placement yet (or whose
//! last placement lies before the active fence) are held as pending and
//! flushed into whichever layer the qubit's next operation lands in.

use std::collections::{BTreeMap, BTreeSet};
use std::ops::{Deref, DerefMut};

use tracing::{debug, trace};

use qirt_hal::{
    Driver, DriverConfig, DriverFactory, HalError, HalResult, QubitId, ResultId, ResultValue,
};

use crate::config::TracerConfig;
use crate::error::{TracerError, TracerResult};
use crate::layer::{Duration, Layer, LayerId, OpId, Placement, QubitState, Time};

/// Resource-estimation driver that schedules traced operations into layers.
#[derive(Debug, Clone, Default)]
pub struct Tracer {
    /// Indexed by qubit id. Qubits are never reused.
    qubits: Vec<QubitState>,
    preferred_layer_duration: Duration,
    /// Indexed by layer id.
    layers: Vec<Layer>,
    /// No operation can be placed into or before this layer.
    global_barrier: Option<LayerId>,
    /// Stack of the conditional fences in effect.
    fences: Vec<LayerId>,
    latest_fence: Option<LayerId>,
    op_names: BTreeMap<OpId, String>,
    seen_ops: BTreeSet<OpId>,
}

impl Tracer {
    /// Create a tracer with the given preferred layer duration.
    pub fn new(preferred_layer_duration: Duration) -> Self {
        Self {
            preferred_layer_duration,
            ..Self::default()
        }
    }

    /// Create a tracer from its configuration.
    pub fn with_config(config: &TracerConfig) -> Self {
        Self::new(config.preferred_layer_duration).with_op_names(config.op_names.clone())
    }

    /// Use `names` for operations in the metrics report.
    pub fn with_op_names(mut self, names: BTreeMap<OpId, String>) -> Self {
        self.op_names = names;
        self
    }

    pub fn preferred_layer_duration(&self) -> Duration {
        self.preferred_layer_duration
    }

    /// Layers of the schedule, in time order.
    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    pub fn layer_count(&self) -> usize {
        self.layers.len()
    }

    /// The last injected global barrier.
    pub fn global_barrier(&self) -> Option<LayerId> {
        self.global_barrier
    }

    /// The latest conditional fence currently in effect.
    pub fn latest_fence(&self) -> Option<LayerId> {
        self.latest_fence
    }

    /// Ids of every operation traced so far, in ascending order.
    pub fn seen_operations(&self) -> impl Iterator<Item = OpId> + '_ {
        self.seen_ops.iter().copied()
    }

    /// Report name of `op`: its configured name, or the id itself.
    pub fn op_name(&self, op: OpId) -> String {
        self.op_names
            .get(&op)
            .cloned()
            .unwrap_or_else(|| op.to_string())
    }

    pub fn qubit_state(&self, qubit: QubitId) -> TracerResult<&QubitState> {
        usize::try_from(qubit.0)
            .ok()
            .and_then(|index| self.qubits.get(index))
            .ok_or(TracerError::UnknownQubit(qubit))
    }

    fn qubit_state_mut(&mut self, qubit: QubitId) -> TracerResult<&mut QubitState> {
        usize::try_from(qubit.0)
            .ok()
            .and_then(|index| self.qubits.get_mut(index))
            .ok_or(TracerError::UnknownQubit(qubit))
    }

    /// The later of the global barrier and the latest conditional fence.
    fn effective_fence(&self) -> Option<LayerId> {
        self.global_barrier.max(self.latest_fence)
    }

    fn find_layer(&self, qubit: QubitId, duration: Duration) -> TracerResult<Placement> {
        let state = self.qubit_state(qubit)?;

        let first_after_fence = match self.effective_fence() {
            None if self.layers.is_empty() => Placement::New,
            None => Placement::Layer(0),
            Some(fence) if fence + 1 == self.layers.len() => Placement::New,
            Some(fence) => Placement::Layer(fence + 1),
        };
        let candidate = match state.layer {
            Some(layer) => Placement::Layer(layer).max(first_after_fence),
            None => first_after_fence,
        };
        let Placement::Layer(candidate) = candidate else {
            return Ok(Placement::New);
        };

        let layer = &self.layers[candidate];
        let last_used = state.last_used_time.max(layer.start_time);
        if last_used + Time::from(duration) <= layer.end_time() {
            return Ok(Placement::Layer(candidate));
        }

        let later = candidate + 1;
        Ok(self.layers[later..]
            .iter()
            .position(|layer| duration <= layer.duration)
            .map_or(Placement::New, |offset| Placement::Layer(later + offset)))
    }

    fn create_layer(&mut self, min_duration: Duration) -> LayerId {
        let start_time = self.layers.last().map_or(0, Layer::end_time);
        let duration = self.preferred_layer_duration.max(min_duration);
        self.layers.push(Layer::new(start_time, duration));
        let id = self.layers.len() - 1;
        debug!(layer = id, start_time, duration, "Opened layer");
        id
    }

    fn place(&mut self, placement: Placement, duration: Duration) -> LayerId {
        match placement {
            Placement::Layer(layer) => layer,
            Placement::New => self.create_layer(duration),
        }
    }

    fn add_operation(&mut self, op: OpId, layer: LayerId) {
        let layer = &mut self.layers[layer];
        debug_assert!(layer.barrier.is_none(), "operations never land in barriers");
        *layer.operations.entry(op).or_default() += 1;
    }

    /// Move the qubit into `layer`, flushing its pending operations there.
    fn update_qubit(
        &mut self,
        qubit: QubitId,
        layer: LayerId,
        duration: Duration,
    ) -> TracerResult<()> {
        let layer_start = self.layers[layer].start_time;
        let state = self.qubit_state_mut(qubit)?;
        let pending = std::mem::take(&mut state.pending);
        state.layer = Some(layer);
        state.last_used_time = state.last_used_time.max(layer_start) + Time::from(duration);

        for op in pending {
            self.add_operation(op, layer);
        }
        Ok(())
    }

    fn check_duration(op: OpId, duration: Duration) -> TracerResult<()> {
        if duration < 0 {
            return Err(TracerError::NegativeDuration { op, duration });
        }
        Ok(())
    }

    /// Trace an operation on one qubit.
    ///
    /// Returns the layer the operation was placed into, or `None` when it
    /// was held as a pending zero-duration operation.
    pub fn trace_single_qubit_op(
        &mut self,
        op: OpId,
        duration: Duration,
        target: QubitId,
    ) -> TracerResult<Option<LayerId>> {
        Self::check_duration(op, duration)?;
        self.qubit_state(target)?;
        self.seen_ops.insert(op);

        let fence = self.effective_fence();
        let state = self.qubit_state_mut(target)?;

        let unplaced = match (state.layer, fence) {
            (None, _) => true,
            (Some(layer), Some(fence)) => layer < fence,
            (Some(_), None) => false,
        };
        if duration == 0 && unplaced {
            state.pending.push(op);
            trace!(op, %target, "Held zero-duration operation");
            return Ok(None);
        }

        let placement = self.find_layer(target, duration)?;
        let layer = self.place(placement, duration);
        self.add_operation(op, layer);
        self.update_qubit(target, layer, duration)?;
        Ok(Some(layer))
    }

    /// Trace an operation on several qubits.
    ///
    /// Controls and targets are scheduled alike; the operation lands in the
    /// latest layer any of its qubits can accept it in. A zero-duration
    /// operation on a single target without controls is traced as a
    /// single-qubit operation.
    pub fn trace_multi_qubit_op(
        &mut self,
        op: OpId,
        duration: Duration,
        controls: &[QubitId],
        targets: &[QubitId],
    ) -> TracerResult<Option<LayerId>> {
        Self::check_duration(op, duration)?;
        let Some((&first, rest)) = targets.split_first() else {
            return Err(TracerError::NoTargets(op));
        };
        if duration == 0 && controls.is_empty() && rest.is_empty() {
            return self.trace_single_qubit_op(op, duration, first);
        }

        let mut placement = self.find_layer(first, duration)?;
        for &qubit in rest.iter().chain(controls) {
            placement = placement.max(self.find_layer(qubit, duration)?);
        }
        self.seen_ops.insert(op);

        let layer = self.place(placement, duration);
        self.add_operation(op, layer);
        for &qubit in controls.iter().chain(targets) {
            self.update_qubit(qubit, layer, duration)?;
        }
        Ok(Some(layer))
    }

    /// Trace a measurement of one qubit.
    ///
    /// The returned result encodes the layer of the measurement, and is
    /// [`ResultId::INVALID`] when the measurement is still pending.
    pub fn trace_single_qubit_measurement(
        &mut self,
        op: OpId,
        duration: Duration,
        target: QubitId,
    ) -> TracerResult<ResultId> {
        let layer = self.trace_single_qubit_op(op, duration, target)?;
        Ok(measurement_result(layer))
    }

    /// Trace a joint measurement of several qubits.
    pub fn trace_multi_qubit_measurement(
        &mut self,
        op: OpId,
        duration: Duration,
        targets: &[QubitId],
    ) -> TracerResult<ResultId> {
        let layer = self.trace_multi_qubit_op(op, duration, &[], targets)?;
        Ok(measurement_result(layer))
    }

    /// Layer of the measurement that produced `result`.
    pub fn layer_of_measurement(&self, result: ResultId) -> Option<LayerId> {
        if result.is_valid() {
            usize::try_from(result.0).ok()
        } else {
            None
        }
    }

    /// Open a barrier layer. Nothing traced afterwards is placed into or
    /// before it.
    pub fn inject_global_barrier(&mut self, op: OpId, duration: Duration) -> TracerResult<LayerId> {
        Self::check_duration(op, duration)?;
        let layer = self.create_layer(duration);
        self.layers[layer].barrier = Some(op);
        self.global_barrier = Some(layer);
        debug!(op, layer, "Injected global barrier");
        Ok(layer)
    }

    fn latest_measurement_layer(&self, results: &[ResultId]) -> TracerResult<Option<LayerId>> {
        let mut latest = None;
        for &result in results {
            let layer = self.layer_of_measurement(result);
            if layer.is_some_and(|l| l >= self.layers.len()) {
                return Err(TracerError::UnknownMeasurement(result));
            }
            latest = latest.max(layer);
        }
        Ok(latest)
    }

    /// Push a fence at the latest layer that measured any of `results1` or
    /// `results2`.
    ///
    /// Returns the fence, or `None` when no result refers to a placed
    /// measurement, in which case nothing is pushed. Every pushed fence
    /// must be popped with [`pop_fence`](Self::pop_fence), in stack order.
    /// Prefer [`fence`](Self::fence) where the tracer can stay borrowed.
    pub fn push_fence(
        &mut self,
        results1: &[ResultId],
        results2: &[ResultId],
    ) -> TracerResult<Option<LayerId>> {
        let fence = self
            .latest_measurement_layer(results1)?
            .max(self.latest_measurement_layer(results2)?);
        if let Some(layer) = fence {
            self.fences.push(layer);
            self.latest_fence = self.latest_fence.max(fence);
            trace!(layer, depth = self.fences.len(), "Pushed fence");
        }
        Ok(fence)
    }

    /// Pop a fence returned by [`push_fence`](Self::push_fence).
    pub fn pop_fence(&mut self, fence: Option<LayerId>) {
        if fence.is_none() {
            return;
        }
        let popped = self.fences.pop();
        debug_assert_eq!(popped, fence, "fences are popped in stack order");
        self.latest_fence = self.fences.iter().copied().max();
    }

    /// Scope in which nothing is placed before the layers that measured
    /// `results1` and `results2`.
    pub fn fence(
        &mut self,
        results1: &[ResultId],
        results2: &[ResultId],
    ) -> TracerResult<FenceScope<'_>> {
        let fence = self.push_fence(results1, results2)?;
        Ok(FenceScope {
            tracer: self,
            fence,
        })
    }
}

fn measurement_result(layer: Option<LayerId>) -> ResultId {
    layer.map_or(ResultId::INVALID, |layer| ResultId(layer as u64))
}

/// Conditional fence held for the lifetime of the guard.
///
/// Dereferences to the tracer so operations can be traced inside the
/// scope. The fence is popped when the guard is dropped.
#[derive(Debug)]
pub struct FenceScope<'a> {
    tracer: &'a mut Tracer,
    fence: Option<LayerId>,
}

impl FenceScope<'_> {
    /// The fence layer, `None` when the scope has no effect.
    pub fn layer(&self) -> Option<LayerId> {
        self.fence
    }
}

impl Deref for FenceScope<'_> {
    type Target = Tracer;

    fn deref(&self) -> &Tracer {
        self.tracer
    }
}

impl DerefMut for FenceScope<'_> {
    fn deref_mut(&mut self) -> &mut Tracer {
        self.tracer
    }
}

impl Drop for FenceScope<'_> {
    fn drop(&mut self) {
        self.tracer.pop_fence(self.fence);
    }
}

impl Driver for Tracer {
    fn name(&self) -> &str {
        "tracer"
    }

    fn allocate_qubit(&mut self) -> HalResult<QubitId> {
        let qubit = QubitId::from(self.qubits.len());
        self.qubits.push(QubitState::default());
        Ok(qubit)
    }

    fn release_qubit(&mut self, _qubit: QubitId) -> HalResult<()> {
        Ok(())
    }

    fn qubit_to_string(&self, qubit: QubitId) -> String {
        match self.qubit_state(qubit) {
            Ok(state) => {
                let layer = state
                    .layer
                    .map_or_else(|| "none".to_string(), |l| l.to_string());
                format!(
                    "{} last used in layer {} (pending zero ops: {})",
                    qubit.0,
                    layer,
                    state.pending.len()
                )
            }
            Err(_) => format!("{} (unknown)", qubit.0),
        }
    }

    fn release_result(&mut self, _result: ResultId) -> HalResult<()> {
        Ok(())
    }

    fn are_equal_results(&self, _r1: ResultId, _r2: ResultId) -> HalResult<bool> {
        Err(HalError::ResultsUnavailable(
            "cannot compare results while tracing".into(),
        ))
    }

    fn result_value(&self, _result: ResultId) -> HalResult<ResultValue> {
        Err(HalError::ResultsUnavailable(
            "result values aren't available while tracing".into(),
        ))
    }

    fn use_zero(&self) -> ResultId {
        ResultId::INVALID
    }

    fn use_one(&self) -> ResultId {
        ResultId::INVALID
    }
}

impl DriverFactory for Tracer {
    fn from_config(config: DriverConfig) -> HalResult<Self> {
        let duration: Duration = config
            .extra_value("preferred_layer_duration")?
            .unwrap_or_default();
        if duration < 0 {
            return Err(HalError::Configuration(format!(
                "'preferred_layer_duration' must not be negative, got {duration}"
            )));
        }
        let names: BTreeMap<OpId, String> = config.extra_value("op_names")?.unwrap_or_default();
        Ok(Self::new(duration).with_op_names(names))
    }
}
