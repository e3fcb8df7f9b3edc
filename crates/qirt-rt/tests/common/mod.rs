//! Driver doubles shared by the integration tests.

#![allow(dead_code)]

use std::io::Write;

use qirt_hal::{
    Diagnostics, Driver, GateSet, HalError, HalResult, Pauli, QubitId, ResultId, ResultValue,
};
use qirt_rt::{Runtime, RuntimeConfig};

/// Result handle whose value is never observed.
pub const PENDING_RESULT: ResultId = ResultId(1000);

/// Driver that hands out sequential qubits and records every gate.
///
/// Even result handles read as Zero and odd ones as One.
#[derive(Debug, Default)]
pub struct RecordingDriver {
    next_qubit: u64,
    next_result: u64,
    pub live_qubits: Vec<QubitId>,
    pub released_qubits: Vec<QubitId>,
    pub released_results: Vec<ResultId>,
    pub gates: Vec<String>,
    pub probability_of_zero: Option<f64>,
    pub probability_holds: bool,
}

impl RecordingDriver {
    pub fn new() -> Self {
        Self {
            next_result: 2,
            probability_holds: true,
            ..Self::default()
        }
    }

    fn record(&mut self, gate: String) -> HalResult<()> {
        self.gates.push(gate);
        Ok(())
    }
}

fn list(qubits: &[QubitId]) -> String {
    let names: Vec<_> = qubits.iter().map(ToString::to_string).collect();
    format!("[{}]", names.join(","))
}

impl Driver for RecordingDriver {
    fn name(&self) -> &str {
        "recording"
    }

    fn allocate_qubit(&mut self) -> HalResult<QubitId> {
        let qubit = QubitId(self.next_qubit);
        self.next_qubit += 1;
        self.live_qubits.push(qubit);
        Ok(qubit)
    }

    fn release_qubit(&mut self, qubit: QubitId) -> HalResult<()> {
        let position = self
            .live_qubits
            .iter()
            .position(|&q| q == qubit)
            .ok_or(HalError::UnknownQubit(qubit))?;
        self.live_qubits.remove(position);
        self.released_qubits.push(qubit);
        Ok(())
    }

    fn qubit_to_string(&self, qubit: QubitId) -> String {
        format!("qubit {}", qubit.0)
    }

    fn release_result(&mut self, result: ResultId) -> HalResult<()> {
        self.released_results.push(result);
        Ok(())
    }

    fn are_equal_results(&self, r1: ResultId, r2: ResultId) -> HalResult<bool> {
        Ok(self.result_value(r1)? == self.result_value(r2)?)
    }

    fn result_value(&self, result: ResultId) -> HalResult<ResultValue> {
        Ok(match result {
            PENDING_RESULT => ResultValue::Pending,
            ResultId(id) if id % 2 == 0 => ResultValue::Zero,
            _ => ResultValue::One,
        })
    }

    fn use_zero(&self) -> ResultId {
        ResultId(0)
    }

    fn use_one(&self) -> ResultId {
        ResultId(1)
    }

    fn gate_set(&mut self) -> Option<&mut dyn GateSet> {
        Some(self)
    }

    fn diagnostics(&mut self) -> Option<&mut dyn Diagnostics> {
        Some(self)
    }
}

impl GateSet for RecordingDriver {
    fn x(&mut self, target: QubitId) -> HalResult<()> {
        self.record(format!("x {target}"))
    }

    fn y(&mut self, target: QubitId) -> HalResult<()> {
        self.record(format!("y {target}"))
    }

    fn z(&mut self, target: QubitId) -> HalResult<()> {
        self.record(format!("z {target}"))
    }

    fn h(&mut self, target: QubitId) -> HalResult<()> {
        self.record(format!("h {target}"))
    }

    fn s(&mut self, target: QubitId) -> HalResult<()> {
        self.record(format!("s {target}"))
    }

    fn t(&mut self, target: QubitId) -> HalResult<()> {
        self.record(format!("t {target}"))
    }

    fn r(&mut self, axis: Pauli, target: QubitId, theta: f64) -> HalResult<()> {
        self.record(format!("r {axis} {target} {theta}"))
    }

    fn exp(&mut self, paulis: &[Pauli], targets: &[QubitId], theta: f64) -> HalResult<()> {
        self.record(format!("exp {paulis:?} {} {theta}", list(targets)))
    }

    fn controlled_x(&mut self, controls: &[QubitId], target: QubitId) -> HalResult<()> {
        self.record(format!("cx {} {target}", list(controls)))
    }

    fn controlled_y(&mut self, controls: &[QubitId], target: QubitId) -> HalResult<()> {
        self.record(format!("cy {} {target}", list(controls)))
    }

    fn controlled_z(&mut self, controls: &[QubitId], target: QubitId) -> HalResult<()> {
        self.record(format!("cz {} {target}", list(controls)))
    }

    fn controlled_h(&mut self, controls: &[QubitId], target: QubitId) -> HalResult<()> {
        self.record(format!("ch {} {target}", list(controls)))
    }

    fn controlled_s(&mut self, controls: &[QubitId], target: QubitId) -> HalResult<()> {
        self.record(format!("cs {} {target}", list(controls)))
    }

    fn controlled_t(&mut self, controls: &[QubitId], target: QubitId) -> HalResult<()> {
        self.record(format!("ct {} {target}", list(controls)))
    }

    fn controlled_r(
        &mut self,
        controls: &[QubitId],
        axis: Pauli,
        target: QubitId,
        theta: f64,
    ) -> HalResult<()> {
        self.record(format!("cr {} {axis} {target} {theta}", list(controls)))
    }

    fn controlled_exp(
        &mut self,
        controls: &[QubitId],
        paulis: &[Pauli],
        targets: &[QubitId],
        theta: f64,
    ) -> HalResult<()> {
        self.record(format!(
            "cexp {} {paulis:?} {} {theta}",
            list(controls),
            list(targets)
        ))
    }

    fn adjoint_s(&mut self, target: QubitId) -> HalResult<()> {
        self.record(format!("sdg {target}"))
    }

    fn adjoint_t(&mut self, target: QubitId) -> HalResult<()> {
        self.record(format!("tdg {target}"))
    }

    fn controlled_adjoint_s(&mut self, controls: &[QubitId], target: QubitId) -> HalResult<()> {
        self.record(format!("csdg {} {target}", list(controls)))
    }

    fn controlled_adjoint_t(&mut self, controls: &[QubitId], target: QubitId) -> HalResult<()> {
        self.record(format!("ctdg {} {target}", list(controls)))
    }

    fn measure(&mut self, bases: &[Pauli], targets: &[QubitId]) -> HalResult<ResultId> {
        self.record(format!("measure {bases:?} {}", list(targets)))?;
        let result = ResultId(self.next_result);
        self.next_result += 1;
        Ok(result)
    }
}

impl Diagnostics for RecordingDriver {
    fn get_state(&mut self, _callback: &mut dyn FnMut(usize, f64, f64) -> bool) -> HalResult<()> {
        Ok(())
    }

    fn dump_machine(&mut self, out: &mut dyn Write) -> HalResult<()> {
        writeln!(out, "{} qubits", self.live_qubits.len())
            .map_err(|e| HalError::Driver(e.to_string()))
    }

    fn dump_register(&mut self, out: &mut dyn Write, qubits: &[QubitId]) -> HalResult<()> {
        writeln!(out, "{}", list(qubits)).map_err(|e| HalError::Driver(e.to_string()))
    }

    fn assert_measurement(
        &mut self,
        _bases: &[Pauli],
        _targets: &[QubitId],
        _result: ResultId,
    ) -> HalResult<bool> {
        Ok(self.probability_holds)
    }

    fn assert_probability(
        &mut self,
        _bases: &[Pauli],
        _targets: &[QubitId],
        probability_of_zero: f64,
        _precision: f64,
    ) -> HalResult<bool> {
        self.probability_of_zero = Some(probability_of_zero);
        Ok(self.probability_holds)
    }
}

/// Runtime over a fresh [`RecordingDriver`], with allocation tracking.
pub fn tracked_runtime() -> Runtime {
    Runtime::new(Box::new(RecordingDriver::new()), RuntimeConfig::tracked())
}

pub fn recording(rt: &Runtime) -> &RecordingDriver {
    rt.driver_as::<RecordingDriver>()
        .expect("runtime is backed by a RecordingDriver")
}

pub fn recording_mut(rt: &mut Runtime) -> &mut RecordingDriver {
    rt.driver_as_mut::<RecordingDriver>()
        .expect("runtime is backed by a RecordingDriver")
}

/// 1-D array of one-byte items holding `text`.
pub fn byte_array(rt: &mut Runtime, text: &[u8]) -> qirt_rt::ArrayId {
    let array = rt.array_create_1d(1, text.len()).unwrap();
    for (i, &b) in text.iter().enumerate() {
        rt.array_get_element_mut(array, i).unwrap()[0] = b;
    }
    array
}

/// Contents of a 1-D array of one-byte items.
pub fn bytes_of(rt: &Runtime, array: qirt_rt::ArrayId) -> Vec<u8> {
    rt.array_buffer(array).unwrap().map(<[u8]>::to_vec).unwrap_or_default()
}
