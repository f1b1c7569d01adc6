//! Circuit-level Pauli noise.
//!
//! A [`NoiseModel`] rewrites a noiseless circuit into a noisy one by inserting
//! noise channels after gates, flipping measurement results, and depolarizing
//! qubits that were measured or left idle during a moment. Moments are delimited
//! by `TICK`.

use std::collections::BTreeSet;

use paulimap::Basis;

use crate::circuit::{Circuit, Instruction, Operation, QubitId, Target};
use crate::error::Result;
use crate::gate::{Gate, GateKind};

/// Error probabilities of a circuit-level noise model.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct NoiseModel {
    /// `DEPOLARIZE1` strength after every single qubit Clifford.
    pub single_qubit_depolarization: f64,
    /// `DEPOLARIZE2` strength after every two qubit Clifford.
    pub two_qubit_depolarization: f64,
    /// `DEPOLARIZE1` strength on qubits no instruction touched during a moment.
    pub idle_depolarization: f64,
    /// Probability a measurement reports the wrong result.
    pub measurement_flip: f64,
    /// `DEPOLARIZE1` strength on single qubit measurement targets, applied when the moment closes.
    pub post_measurement_depolarization: f64,
    /// Probability a reset prepares the orthogonal state.
    pub reset_flip: f64,
}

impl NoiseModel {
    /// Every error mechanism with the same probability `p`.
    #[must_use]
    pub fn uniform_depolarizing(p: f64) -> Self {
        NoiseModel {
            single_qubit_depolarization: p,
            two_qubit_depolarization: p,
            idle_depolarization: p,
            measurement_flip: p,
            post_measurement_depolarization: p,
            reset_flip: p,
        }
    }

    #[must_use]
    pub fn is_noiseless(&self) -> bool {
        [
            self.single_qubit_depolarization,
            self.two_qubit_depolarization,
            self.idle_depolarization,
            self.measurement_flip,
            self.post_measurement_depolarization,
            self.reset_flip,
        ]
        .iter()
        .all(|p| *p == 0.0)
    }

    /// The same circuit with this model's noise inserted.
    ///
    /// Annotations and existing noise channels are copied unchanged. `REPEAT` bodies are rewritten
    /// recursively, each body iteration starting a fresh moment.
    pub fn noisy_circuit(&self, circuit: &Circuit) -> Result<Circuit> {
        let qubits = circuit.qubits();
        let mut result = Circuit::new();
        self.add_noise(circuit, &qubits, &mut result)?;
        tracing::debug!(
            qubits = qubits.len(),
            operations = result.len(),
            "inserted noise into circuit"
        );
        Ok(result)
    }

    fn add_noise(&self, circuit: &Circuit, qubits: &BTreeSet<QubitId>, out: &mut Circuit) -> Result<()> {
        let mut moment = Moment::default();
        for operation in circuit.operations() {
            match operation {
                Operation::Instruction(instruction) if instruction.gate() == Gate::Tick => {
                    self.close_moment(&mut moment, qubits, out)?;
                    out.tick();
                }
                Operation::Instruction(instruction) => self.add_instruction(instruction, &mut moment, out)?,
                Operation::Repeat { repetitions, body } => {
                    self.close_moment(&mut moment, qubits, out)?;
                    let mut noisy_body = Circuit::new();
                    self.add_noise(body, qubits, &mut noisy_body)?;
                    out.append_repeat(*repetitions, noisy_body);
                }
            }
        }
        self.close_moment(&mut moment, qubits, out)
    }

    fn add_instruction(&self, instruction: &Instruction, moment: &mut Moment, out: &mut Circuit) -> Result<()> {
        let targets = instruction.targets().to_vec();
        match instruction.gate().kind() {
            GateKind::Annotation | GateKind::Noise1 | GateKind::Noise2 => {
                out.push(instruction.clone());
                return Ok(());
            }
            GateKind::SingleQubitClifford => {
                out.push(instruction.clone());
                append_channel(out, Gate::Depolarize1, targets, self.single_qubit_depolarization)?;
            }
            GateKind::TwoQubitClifford => {
                out.push(instruction.clone());
                append_channel(out, Gate::Depolarize2, targets, self.two_qubit_depolarization)?;
            }
            GateKind::Reset(basis) => {
                out.push(instruction.clone());
                append_channel(out, flip_error(basis), targets, self.reset_flip)?;
            }
            GateKind::Measure(_) => {
                out.push(with_flip_probability(instruction, self.measurement_flip)?);
                moment.measured.extend(instruction.qubits());
            }
            GateKind::PauliProduct => {
                out.push(with_flip_probability(instruction, self.measurement_flip)?);
            }
            GateKind::MeasureReset(basis) => {
                out.push(with_flip_probability(instruction, self.measurement_flip)?);
                append_channel(out, flip_error(basis), targets, self.reset_flip)?;
            }
        }
        moment.touched.extend(instruction.qubits());
        Ok(())
    }

    /// Depolarizes the moment's measured qubits, then its idle ones. Both land after any
    /// detectors the moment declared.
    fn close_moment(&self, moment: &mut Moment, qubits: &BTreeSet<QubitId>, out: &mut Circuit) -> Result<()> {
        let Moment { touched, measured } = std::mem::take(moment);
        if touched.is_empty() {
            return Ok(());
        }
        let measured = measured.into_iter().map(Target::Qubit);
        append_channel(out, Gate::Depolarize1, measured, self.post_measurement_depolarization)?;
        let idle = qubits.difference(&touched).copied().map(Target::Qubit);
        append_channel(out, Gate::Depolarize1, idle, self.idle_depolarization)
    }
}

#[derive(Default)]
struct Moment {
    touched: BTreeSet<QubitId>,
    measured: Vec<QubitId>,
}

/// The single qubit error that flips a state prepared in `basis`.
fn flip_error(basis: Basis) -> Gate {
    match basis {
        Basis::X => Gate::ZError,
        Basis::Y | Basis::Z => Gate::XError,
    }
}

fn append_channel(out: &mut Circuit, gate: Gate, targets: impl IntoIterator<Item = Target>, p: f64) -> Result<()> {
    let targets: Vec<Target> = targets.into_iter().collect();
    if p == 0.0 || targets.is_empty() {
        return Ok(());
    }
    out.append(gate, targets, [p])
}

fn with_flip_probability(instruction: &Instruction, p: f64) -> Result<Instruction> {
    if p == 0.0 || !instruction.args().is_empty() {
        return Ok(instruction.clone());
    }
    Instruction::new(instruction.gate(), instruction.targets().to_vec(), vec![p])
}
