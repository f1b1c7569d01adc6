//! Checks that a chunk's circuit implements its declared flows, one Pauli operator at a time.
//!
//! Each flow is propagated backward, from its `end` towards its `start`, conjugating by the inverse
//! of every gate on the way. Measurements the flow consumes multiply their observable into the
//! tracked operator; every other measurement must commute with it. A reset in basis `B` absorbs a
//! `B` component and records that the flow relies on it; any other component reaching a reset means
//! the flow does not exist. Whatever survives to the top of the circuit must equal the `start`.

use paulimap::{Basis, Coord, PauliMap, PauliString};
use std::collections::{BTreeMap, BTreeSet};

use crate::chunk::Chunk;
use crate::circuit::{Circuit, Instruction, MeasurementId, QubitId, Target};
use crate::error::{ChunkError, Result};
use crate::flow::Flow;
use crate::gate::{Gate, GateKind};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Knobs for [`FlowStabilizerVerifier::verify_with`].
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct VerifyOptions {
    /// Fail on resets no flow relies on and on measurements no flow consumes.
    pub forbid_dangling: bool,
}

/// The outcome of a successful verification: which physical collapse events each flow depends on.
///
/// Reset events are numbered in the order the backward walk meets them, so the last reset target of
/// the circuit is reset `0`. Measure-reset targets count as resets.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FlowStabilizerVerifier {
    reset_to_flow_indices: BTreeMap<usize, Vec<usize>>,
    measurement_to_flow_indices: BTreeMap<MeasurementId, Vec<usize>>,
    flow_to_reset_indices: Vec<Vec<usize>>,
    surviving_measurements: BTreeSet<MeasurementId>,
    num_resets: usize,
    num_measurements: usize,
}

/// What one flow needed from the circuit.
#[derive(Debug, Default)]
struct FlowTrace {
    relied_resets: Vec<usize>,
    surviving_measurements: Vec<MeasurementId>,
}

struct Propagation<'a> {
    flow_index: usize,
    consumed: &'a [MeasurementId],
    i2q: &'a BTreeMap<QubitId, Coord>,
    tracked: PauliMap<QubitId>,
    trace: FlowTrace,
}

impl Propagation<'_> {
    fn coord_of(&self, qubit: QubitId) -> Result<Coord> {
        self.i2q.get(&qubit).copied().ok_or(ChunkError::UnmappedQubit { qubit })
    }

    fn conjugate(&mut self, gate: Gate, qubit: QubitId) {
        if let Some(basis) = self.tracked.get(&qubit) {
            self.tracked.set(qubit, gate.conjugate(basis));
        }
    }

    fn conjugate_pair(&mut self, gate: Gate, a: QubitId, b: QubitId) {
        let (pa, pb) = (self.tracked.get(&a), self.tracked.get(&b));
        if pa.is_none() && pb.is_none() {
            return;
        }
        if let Some((na, nb)) = gate.conjugate_pair(pa, pb) {
            self.tracked.set(a, na);
            self.tracked.set(b, nb);
        }
    }

    fn reset(&mut self, qubit: QubitId, basis: Basis, reset_id: usize) -> Result<()> {
        match self.tracked.get(&qubit) {
            None => Ok(()),
            Some(tracked) if tracked == basis => {
                self.tracked.remove(&qubit);
                self.trace.relied_resets.push(reset_id);
                Ok(())
            }
            Some(_) => Err(ChunkError::AnticommutedWithReset {
                flow: self.flow_index,
                qubit: self.coord_of(qubit)?,
                basis,
            }),
        }
    }

    fn is_consumed(&self, measurement: MeasurementId) -> bool {
        self.consumed.binary_search(&measurement).is_ok()
    }

    fn measure(&mut self, qubit: QubitId, basis: Basis, measurement: MeasurementId) -> Result<()> {
        if let Some(tracked) = self.tracked.get(&qubit) {
            if tracked.anticommutes_with(basis) {
                return Err(ChunkError::AnticommutedWithMeasurement {
                    flow: self.flow_index,
                    qubit: self.coord_of(qubit)?,
                    basis,
                    measurement,
                });
            }
            self.trace.surviving_measurements.push(measurement);
        }
        if self.is_consumed(measurement) {
            self.tracked.mul_assign_at(qubit, basis);
        }
        Ok(())
    }

    fn measure_product(&mut self, product: &PauliMap<QubitId>, measurement: MeasurementId) -> Result<()> {
        if self.tracked.anticommutes_with(product) {
            let product = product
                .try_map_keys(|q| self.i2q.get(q).copied())
                .map_err(|q| ChunkError::UnmappedQubit { qubit: *q })?;
            return Err(ChunkError::AnticommutedWithMpp {
                flow: self.flow_index,
                product,
                measurement,
            });
        }
        if self.is_consumed(measurement) {
            self.tracked *= product;
        }
        Ok(())
    }

    /// Walks the instructions from last to first.
    fn run(&mut self, instructions: &[&Instruction], num_measurements: usize) -> Result<()> {
        let mut measurement = num_measurements;
        let mut reset_id = 0;
        for instruction in instructions.iter().rev() {
            let gate = instruction.gate();
            match gate.kind() {
                GateKind::Annotation | GateKind::Noise1 | GateKind::Noise2 => {}
                GateKind::SingleQubitClifford => {
                    for qubit in instruction.qubits().rev() {
                        self.conjugate(gate.inverse(), qubit);
                    }
                }
                GateKind::TwoQubitClifford => {
                    for pair in instruction.target_groups().into_iter().rev() {
                        if let [Target::Qubit(a), Target::Qubit(b)] = pair {
                            self.conjugate_pair(gate.inverse(), *a, *b);
                        }
                    }
                }
                GateKind::Reset(basis) => {
                    for qubit in instruction.qubits().rev() {
                        self.reset(qubit, basis, reset_id)?;
                        reset_id += 1;
                    }
                }
                GateKind::Measure(basis) => {
                    for qubit in instruction.qubits().rev() {
                        measurement -= 1;
                        self.measure(qubit, basis, measurement)?;
                    }
                }
                GateKind::MeasureReset(basis) => {
                    for qubit in instruction.qubits().rev() {
                        measurement -= 1;
                        self.reset(qubit, basis, reset_id)?;
                        reset_id += 1;
                        self.measure(qubit, basis, measurement)?;
                    }
                }
                GateKind::PauliProduct => {
                    for product in instruction.pauli_products().iter().rev() {
                        measurement -= 1;
                        self.measure_product(product, measurement)?;
                    }
                }
            }
        }
        Ok(())
    }
}

fn to_indices(flow_index: usize, pauli: Option<&PauliString>, q2i: &BTreeMap<Coord, QubitId>) -> Result<PauliMap<QubitId>> {
    match pauli {
        None => Ok(PauliMap::new()),
        Some(pauli) => pauli
            .try_map_keys(|q| q2i.get(q).copied())
            .map_err(|qubit| ChunkError::UnknownQubit {
                flow: flow_index,
                qubit: *qubit,
            }),
    }
}

fn to_coords(pauli: &PauliMap<QubitId>, i2q: &BTreeMap<QubitId, Coord>) -> Result<PauliString> {
    pauli
        .try_map_keys(|q| i2q.get(q).copied())
        .map_err(|q| ChunkError::UnmappedQubit { qubit: *q })
}

fn propagate_flow(
    flow_index: usize,
    flow: &Flow,
    chunk: &Chunk,
    i2q: &BTreeMap<QubitId, Coord>,
    instructions: &[&Instruction],
    num_measurements: usize,
) -> Result<FlowTrace> {
    if let Some(&measurement) = flow.measurement_indices().iter().find(|m| **m >= num_measurements) {
        return Err(ChunkError::MeasurementOutOfRange {
            flow: flow_index,
            measurement,
            count: num_measurements,
        });
    }
    let start = to_indices(flow_index, flow.start(), chunk.q2i())?;
    let end = to_indices(flow_index, flow.end(), chunk.q2i())?;
    let mut propagation = Propagation {
        flow_index,
        consumed: flow.measurement_indices(),
        i2q,
        tracked: end,
        trace: FlowTrace::default(),
    };
    propagation.run(instructions, num_measurements)?;
    if propagation.tracked != start {
        return Err(ChunkError::FlowMismatch {
            flow: flow_index,
            center: flow.center(),
            expected: flow.start().cloned().unwrap_or_default(),
            actual: to_coords(&propagation.tracked, i2q)?,
        });
    }
    tracing::trace!(flow = flow_index, resets = ?propagation.trace.relied_resets, "flow verified");
    Ok(propagation.trace)
}

/// Reset targets in backward walk order.
fn reset_events(instructions: &[&Instruction]) -> Vec<(Gate, QubitId)> {
    let mut events = Vec::new();
    for instruction in instructions.iter().rev() {
        if matches!(instruction.gate().kind(), GateKind::Reset(_) | GateKind::MeasureReset(_)) {
            events.extend(instruction.qubits().rev().map(|q| (instruction.gate(), q)));
        }
    }
    events
}

impl FlowStabilizerVerifier {
    /// Verifies every flow of `chunk` with default options.
    pub fn verify(chunk: &Chunk) -> Result<FlowStabilizerVerifier> {
        Self::verify_with(chunk, &VerifyOptions::default())
    }

    pub fn verify_with(chunk: &Chunk, options: &VerifyOptions) -> Result<FlowStabilizerVerifier> {
        let flattened = chunk.circuit().flattened();
        let instructions: Vec<&Instruction> = flattened.instructions().collect();
        let num_measurements = flattened.num_measurements();
        let i2q: BTreeMap<QubitId, Coord> = chunk.q2i().iter().map(|(q, i)| (*i, *q)).collect();
        let events = reset_events(&instructions);

        #[cfg(feature = "parallel")]
        let traces: Vec<Result<FlowTrace>> = chunk
            .flows()
            .par_iter()
            .enumerate()
            .map(|(index, flow)| propagate_flow(index, flow, chunk, &i2q, &instructions, num_measurements))
            .collect();
        #[cfg(not(feature = "parallel"))]
        let traces: Vec<Result<FlowTrace>> = chunk
            .flows()
            .iter()
            .enumerate()
            .map(|(index, flow)| propagate_flow(index, flow, chunk, &i2q, &instructions, num_measurements))
            .collect();
        let traces = traces.into_iter().collect::<Result<Vec<_>>>()?;

        let mut verifier = FlowStabilizerVerifier {
            num_resets: events.len(),
            num_measurements,
            ..FlowStabilizerVerifier::default()
        };
        for (index, (flow, trace)) in chunk.flows().iter().zip(traces).enumerate() {
            for reset in &trace.relied_resets {
                verifier.reset_to_flow_indices.entry(*reset).or_default().push(index);
            }
            for measurement in flow.measurement_indices() {
                verifier.measurement_to_flow_indices.entry(*measurement).or_default().push(index);
            }
            verifier.surviving_measurements.extend(trace.surviving_measurements);
            verifier.flow_to_reset_indices.push(trace.relied_resets);
        }

        if options.forbid_dangling {
            verifier.check_dangling(&events, &i2q)?;
        }
        tracing::debug!(
            flows = chunk.flows().len(),
            measurements = num_measurements,
            resets = events.len(),
            "chunk verified"
        );
        Ok(verifier)
    }

    fn check_dangling(&self, events: &[(Gate, QubitId)], i2q: &BTreeMap<QubitId, Coord>) -> Result<()> {
        if let Some((reset, (gate, qubit))) = events
            .iter()
            .enumerate()
            .find(|(reset, _)| !self.reset_to_flow_indices.contains_key(reset))
        {
            let location = i2q.get(qubit).map_or_else(|| qubit.to_string(), ToString::to_string);
            return Err(ChunkError::DanglingOperation(format!(
                "no flow relies on reset {reset} ({gate} of qubit {location})"
            )));
        }
        if let Some(measurement) =
            (0..self.num_measurements).find(|m| !self.measurement_to_flow_indices.contains_key(m))
        {
            return Err(ChunkError::DanglingOperation(format!(
                "no flow consumes measurement {measurement}"
            )));
        }
        Ok(())
    }

    /// Flow indices relying on each reset event.
    #[must_use]
    pub fn reset_to_flow_indices(&self) -> &BTreeMap<usize, Vec<usize>> {
        &self.reset_to_flow_indices
    }

    /// Flow indices consuming each measurement.
    #[must_use]
    pub fn measurement_to_flow_indices(&self) -> &BTreeMap<MeasurementId, Vec<usize>> {
        &self.measurement_to_flow_indices
    }

    /// Measurements some flow passes through, i.e. that leave a flow component behind on their qubit.
    #[must_use]
    pub fn surviving_measurements(&self) -> &BTreeSet<MeasurementId> {
        &self.surviving_measurements
    }

    #[must_use]
    pub fn num_resets(&self) -> usize {
        self.num_resets
    }

    /// Builds the chunk that runs `chunk` backwards.
    ///
    /// Gates are reversed and replaced by their inverses. Resets become measurements in the same
    /// basis; measurements become resets unless some flow passes through them. Measure-resets and
    /// Pauli product measurements stay. Detectors, observables and qubit coordinates are dropped.
    pub fn invert(chunk: &Chunk) -> Result<Chunk> {
        let verifier = Self::verify(chunk)?;
        let flattened = chunk.circuit().flattened();

        let mut circuit = Circuit::new();
        let mut reset_to_new: BTreeMap<usize, MeasurementId> = BTreeMap::new();
        let mut old_to_new: BTreeMap<MeasurementId, MeasurementId> = BTreeMap::new();
        let mut old_measurement = verifier.num_measurements;
        let mut new_measurement = 0;
        let mut reset_id = 0;

        let instructions: Vec<&Instruction> = flattened.instructions().collect();
        for instruction in instructions.into_iter().rev() {
            let gate = instruction.gate();
            let groups = instruction.target_groups();
            match gate.kind() {
                GateKind::Annotation => {
                    if gate == Gate::Tick {
                        circuit.tick();
                    }
                }
                GateKind::Noise1 | GateKind::Noise2 => {
                    circuit.push(instruction.with_target_groups(gate, groups.into_iter().rev()));
                }
                GateKind::SingleQubitClifford | GateKind::TwoQubitClifford => {
                    circuit.push(instruction.with_target_groups(gate.inverse(), groups.into_iter().rev()));
                }
                GateKind::Reset(basis) => {
                    for _ in &groups {
                        reset_to_new.insert(reset_id, new_measurement);
                        reset_id += 1;
                        new_measurement += 1;
                    }
                    circuit.push(instruction.with_target_groups(Gate::measure(basis), groups.into_iter().rev()));
                }
                GateKind::Measure(basis) => {
                    for group in groups.into_iter().rev() {
                        old_measurement -= 1;
                        if verifier.surviving_measurements.contains(&old_measurement) {
                            old_to_new.insert(old_measurement, new_measurement);
                            new_measurement += 1;
                            circuit.push(instruction.with_target_groups(gate, [group]));
                        } else {
                            circuit.push(instruction.with_target_groups(Gate::reset(basis), [group]));
                        }
                    }
                }
                GateKind::MeasureReset(_) => {
                    for _ in &groups {
                        old_measurement -= 1;
                        reset_to_new.insert(reset_id, new_measurement);
                        reset_id += 1;
                        new_measurement += 1;
                    }
                    circuit.push(instruction.with_target_groups(gate, groups.into_iter().rev()));
                }
                GateKind::PauliProduct => {
                    for _ in &groups {
                        old_measurement -= 1;
                        old_to_new.insert(old_measurement, new_measurement);
                        new_measurement += 1;
                    }
                    circuit.push(instruction.with_target_groups(gate, groups.into_iter().rev()));
                }
            }
        }

        let flows = chunk
            .flows()
            .iter()
            .zip(&verifier.flow_to_reset_indices)
            .map(|(flow, resets)| {
                let measurements = resets
                    .iter()
                    .filter_map(|reset| reset_to_new.get(reset))
                    .chain(flow.measurement_indices().iter().filter_map(|m| old_to_new.get(m)))
                    .copied()
                    .collect();
                flow.reversed(measurements)
            })
            .collect();

        Ok(Chunk::new(circuit, chunk.q2i().clone(), flows)
            .with_discarded_inputs(chunk.discarded_outputs().iter().cloned())
            .with_discarded_outputs(chunk.discarded_inputs().iter().cloned())
            .with_magic(chunk.is_magic()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(circuit: &str, flows: Vec<Flow>) -> Chunk {
        let circuit: Circuit = circuit.parse().unwrap();
        let q2i = circuit
            .qubits()
            .into_iter()
            .map(|i| {
                #[allow(clippy::cast_precision_loss)]
                let coord = Coord::new(i as f64, 0.0);
                (coord, i)
            })
            .collect();
        Chunk::new(circuit, q2i, flows)
    }

    fn z(i: u32) -> PauliString {
        PauliString::from([(Coord::new(f64::from(i), 0.0), Basis::Z)])
    }

    #[test]
    fn reset_dependencies_are_reported_in_backward_order() {
        let flow = Flow::builder(Coord::ORIGIN).end(z(1)).measurements([0]).build().unwrap();
        let chunk = chunk("R 0 1 2 3 4\nCX 2 0\nM 0", vec![flow]);
        let verifier = FlowStabilizerVerifier::verify(&chunk).unwrap();
        let expected: BTreeMap<usize, Vec<usize>> = [(2, vec![0]), (3, vec![0]), (4, vec![0])].into();
        assert_eq!(verifier.reset_to_flow_indices(), &expected);
        assert_eq!(verifier.num_resets(), 5);

        let inverted = FlowStabilizerVerifier::invert(&chunk).unwrap();
        assert_eq!(inverted.circuit().to_string(), "R 0\nCX 2 0\nM 4 3 2 1 0\n");
        assert_eq!(inverted.flows()[0].start(), Some(&z(1)));
        assert_eq!(inverted.flows()[0].end(), None);
        assert_eq!(inverted.flows()[0].measurement_indices(), &[2, 3, 4]);
        FlowStabilizerVerifier::verify(&inverted).unwrap();
    }

    #[test]
    fn dangling_operations_are_opt_in_errors() {
        let flow = Flow::builder(Coord::ORIGIN).end(z(0)).build().unwrap();
        let chunk = chunk("R 0 1\nM 1", vec![flow]);
        FlowStabilizerVerifier::verify(&chunk).unwrap();
        let strict = VerifyOptions { forbid_dangling: true };
        assert!(matches!(
            FlowStabilizerVerifier::verify_with(&chunk, &strict),
            Err(ChunkError::DanglingOperation(_))
        ));
    }

    #[test]
    fn measurements_beyond_the_chunk_are_rejected() {
        let flow = Flow::builder(Coord::ORIGIN).measurements([1]).build().unwrap();
        let chunk = chunk("R 0\nM 0", vec![flow]);
        assert!(matches!(
            FlowStabilizerVerifier::verify(&chunk),
            Err(ChunkError::MeasurementOutOfRange { measurement: 1, count: 1, .. })
        ));
    }

    #[test]
    fn flows_must_name_known_qubits() {
        let flow = Flow::builder(Coord::ORIGIN).start(z(7)).end(z(7)).build().unwrap();
        let chunk = chunk("H 0", vec![flow]);
        assert!(matches!(
            FlowStabilizerVerifier::verify(&chunk),
            Err(ChunkError::UnknownQubit { flow: 0, .. })
        ));
    }
}
