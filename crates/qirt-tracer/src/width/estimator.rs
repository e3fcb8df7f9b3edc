//! Gate-counting driver that estimates circuit depth and width.
//!
//! Every gate advances its qubits to one past the deepest of them, so the
//! depth of the circuit is the depth of an as-soon-as-possible schedule.
//! Qubit ids are never reused; how many registers the circuit actually
//! needs is worked out in [`WidthEstimator::finalize`].

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use qirt_hal::{
    Driver, DriverConfig, DriverFactory, GateSet, HalError, HalResult, Pauli, QubitId, ResultId,
    ResultValue,
};

use super::interference::QubitInterferences;
use super::interval_coloring::{Interval, min_coloring_size};

/// What the width estimate is optimized for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OptimizeFor {
    /// Keep the depth-optimal schedule and count the registers it needs.
    #[default]
    CircuitDepth,
    /// Estimate the fewest registers any schedule could use.
    QubitWidth,
}

/// Statistics reported by [`WidthEstimator::finalize`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceStatistics {
    pub qubit_width: u64,
    /// Absent when optimizing for width.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub circuit_depth: Option<u64>,
    /// Calls per gate, keyed by gate name.
    pub gate_counts: BTreeMap<String, u64>,
}

impl ResourceStatistics {
    /// Count of `gate`, zero when it was never applied.
    pub fn count(&self, gate: &str) -> u64 {
        self.gate_counts.get(gate).copied().unwrap_or(0)
    }

    /// Serialize to JSON.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct QubitDepth {
    start_depth: u64,
    end_depth: u64,
    /// Id of the last operation on this qubit, 0 before the first one.
    last_operation: u64,
}

/// Resource-estimation driver counting gates and tracking qubit depths.
#[derive(Debug, Clone, Default)]
pub struct WidthEstimator {
    optimize_for: OptimizeFor,
    /// Indexed by qubit id.
    qubits: Vec<QubitDepth>,
    /// Operations applied so far; also the id of the latest one.
    time: u64,
    circuit_depth: u64,
    live_qubits: u64,
    peak_qubits: u64,
    gate_counts: BTreeMap<String, u64>,
    interferences: QubitInterferences,
}

const ZERO: ResultId = ResultId(0xface_0000);
const ONE: ResultId = ResultId(0xface_1000);

impl WidthEstimator {
    pub fn new(optimize_for: OptimizeFor) -> Self {
        Self {
            optimize_for,
            ..Self::default()
        }
    }

    pub fn optimize_for(&self) -> OptimizeFor {
        self.optimize_for
    }

    /// Most qubits allocated at the same time.
    pub fn peak_qubits(&self) -> u64 {
        self.peak_qubits
    }

    fn qubit(&self, qubit: QubitId) -> HalResult<&QubitDepth> {
        usize::try_from(qubit.0)
            .ok()
            .and_then(|index| self.qubits.get(index))
            .ok_or(HalError::UnknownQubit(qubit))
    }

    fn record(&mut self, gate: &str, controls: &[QubitId], targets: &[QubitId]) -> HalResult<()> {
        let mut participants: Vec<u64> = Vec::with_capacity(controls.len() + targets.len());
        let mut previous = Vec::new();
        let mut depth = 0;
        for &qubit in controls.iter().chain(targets) {
            let state = self.qubit(qubit)?;
            depth = depth.max(state.end_depth);
            if state.last_operation > 0 {
                previous.push(state.last_operation);
            }
            if !participants.contains(&qubit.0) {
                participants.push(qubit.0);
            }
        }
        let depth = depth + 1;

        self.time += 1;
        let op = self.time;
        self.circuit_depth = self.circuit_depth.max(depth);
        self.interferences.add_operation(op, &previous, &participants);

        for &id in &participants {
            let state = &mut self.qubits[id as usize];
            state.last_operation = op;
            if state.start_depth == 0 {
                state.start_depth = depth;
            }
            state.end_depth = depth;
        }
        *self.gate_counts.entry(gate.to_owned()).or_default() += 1;
        Ok(())
    }

    /// Compute the final statistics.
    ///
    /// When optimizing for depth, qubits whose depth intervals never
    /// overlap share a register. When optimizing for width, the register
    /// count comes from the interference graph and no depth is reported.
    #[instrument(skip(self), fields(optimize_for = ?self.optimize_for))]
    pub fn finalize(&self) -> ResourceStatistics {
        let (qubit_width, circuit_depth) = match self.optimize_for {
            OptimizeFor::CircuitDepth => {
                let intervals: Vec<Interval> = self
                    .qubits
                    .iter()
                    .map(|q| Interval::new(q.start_depth, q.end_depth))
                    .collect();
                (min_coloring_size(&intervals) as u64, Some(self.circuit_depth))
            }
            OptimizeFor::QubitWidth => (self.interferences.estimate_circuit_width() as u64, None),
        };
        debug!(qubit_width, ?circuit_depth, "Finalized resource statistics");

        ResourceStatistics {
            qubit_width,
            circuit_depth,
            gate_counts: self.gate_counts.clone(),
        }
    }
}

impl Driver for WidthEstimator {
    fn name(&self) -> &str {
        "width"
    }

    fn allocate_qubit(&mut self) -> HalResult<QubitId> {
        let qubit = QubitId::from(self.qubits.len());
        self.qubits.push(QubitDepth::default());
        self.live_qubits += 1;
        self.peak_qubits = self.peak_qubits.max(self.live_qubits);
        Ok(qubit)
    }

    fn release_qubit(&mut self, qubit: QubitId) -> HalResult<()> {
        self.qubit(qubit)?;
        self.live_qubits = self.live_qubits.saturating_sub(1);
        Ok(())
    }

    fn qubit_to_string(&self, qubit: QubitId) -> String {
        match self.qubit(qubit) {
            Ok(state) => format!(
                "{} depth [{}, {}]",
                qubit.0, state.start_depth, state.end_depth
            ),
            Err(_) => format!("{} (unknown)", qubit.0),
        }
    }

    fn release_result(&mut self, _result: ResultId) -> HalResult<()> {
        Ok(())
    }

    fn are_equal_results(&self, r1: ResultId, r2: ResultId) -> HalResult<bool> {
        Ok(r1 == r2)
    }

    fn result_value(&self, result: ResultId) -> HalResult<ResultValue> {
        Ok(if result == ONE {
            ResultValue::One
        } else {
            ResultValue::Zero
        })
    }

    fn use_zero(&self) -> ResultId {
        ZERO
    }

    fn use_one(&self) -> ResultId {
        ONE
    }

    fn gate_set(&mut self) -> Option<&mut dyn GateSet> {
        Some(self)
    }
}

impl GateSet for WidthEstimator {
    fn x(&mut self, target: QubitId) -> HalResult<()> {
        self.record("x", &[], &[target])
    }

    fn y(&mut self, target: QubitId) -> HalResult<()> {
        self.record("y", &[], &[target])
    }

    fn z(&mut self, target: QubitId) -> HalResult<()> {
        self.record("z", &[], &[target])
    }

    fn h(&mut self, target: QubitId) -> HalResult<()> {
        self.record("h", &[], &[target])
    }

    fn s(&mut self, target: QubitId) -> HalResult<()> {
        self.record("s", &[], &[target])
    }

    fn t(&mut self, target: QubitId) -> HalResult<()> {
        self.record("t", &[], &[target])
    }

    fn r(&mut self, _axis: Pauli, target: QubitId, _theta: f64) -> HalResult<()> {
        self.record("r", &[], &[target])
    }

    fn exp(&mut self, _paulis: &[Pauli], targets: &[QubitId], _theta: f64) -> HalResult<()> {
        self.record("exp", &[], targets)
    }

    fn controlled_x(&mut self, controls: &[QubitId], target: QubitId) -> HalResult<()> {
        self.record("cx", controls, &[target])
    }

    fn controlled_y(&mut self, controls: &[QubitId], target: QubitId) -> HalResult<()> {
        self.record("cy", controls, &[target])
    }

    fn controlled_z(&mut self, controls: &[QubitId], target: QubitId) -> HalResult<()> {
        self.record("cz", controls, &[target])
    }

    fn controlled_h(&mut self, controls: &[QubitId], target: QubitId) -> HalResult<()> {
        self.record("ch", controls, &[target])
    }

    fn controlled_s(&mut self, controls: &[QubitId], target: QubitId) -> HalResult<()> {
        self.record("cs", controls, &[target])
    }

    fn controlled_t(&mut self, controls: &[QubitId], target: QubitId) -> HalResult<()> {
        self.record("ct", controls, &[target])
    }

    fn controlled_r(
        &mut self,
        controls: &[QubitId],
        _axis: Pauli,
        target: QubitId,
        _theta: f64,
    ) -> HalResult<()> {
        self.record("cr", controls, &[target])
    }

    fn controlled_exp(
        &mut self,
        controls: &[QubitId],
        _paulis: &[Pauli],
        targets: &[QubitId],
        _theta: f64,
    ) -> HalResult<()> {
        self.record("cexp", controls, targets)
    }

    fn adjoint_s(&mut self, target: QubitId) -> HalResult<()> {
        self.record("s_adj", &[], &[target])
    }

    fn adjoint_t(&mut self, target: QubitId) -> HalResult<()> {
        self.record("t_adj", &[], &[target])
    }

    fn controlled_adjoint_s(&mut self, controls: &[QubitId], target: QubitId) -> HalResult<()> {
        self.record("cs_adj", controls, &[target])
    }

    fn controlled_adjoint_t(&mut self, controls: &[QubitId], target: QubitId) -> HalResult<()> {
        self.record("ct_adj", controls, &[target])
    }

    /// Measurements always yield the canonical `Zero`.
    fn measure(&mut self, _bases: &[Pauli], targets: &[QubitId]) -> HalResult<ResultId> {
        if targets.is_empty() {
            return Err(HalError::Driver("measurement without targets".into()));
        }
        self.record("m", &[], targets)?;
        Ok(ZERO)
    }
}

impl DriverFactory for WidthEstimator {
    fn from_config(config: DriverConfig) -> HalResult<Self> {
        let optimize_for = config.extra_value("optimize_for")?.unwrap_or_default();
        Ok(Self::new(optimize_for))
    }
}
