//! Rewriting circuits into the gate set of CZ hardware: every controlled Pauli becomes a `CZ`
//! between single qubit basis changes, and every reset and measurement happens in the Z basis.
//!
//! Basis changes left over at the end of a moment are merged with the ones the next moment needs,
//! so back to back interactions on a qubit don't pay for two Hadamards that cancel.

use paulimap::Basis;
use std::collections::{BTreeMap, BTreeSet};

use crate::circuit::{Circuit, Instruction, Operation, QubitId};
use crate::error::{ChunkError, Result};
use crate::gate::{Gate, GateKind};

/// Self-inverse single qubit Clifford exchanging Z with `basis`.
fn basis_change(basis: Basis) -> Option<Gate> {
    match basis {
        Basis::X => Some(Gate::H),
        Basis::Y => Some(Gate::Hyz),
        Basis::Z => None,
    }
}

/// The single qubit Clifford applying `first` then `second`, up to Pauli frame. `None` is identity.
fn compose(first: Option<Gate>, second: Option<Gate>) -> Option<Gate> {
    let (Some(first), Some(second)) = (first, second) else {
        return first.or(second);
    };
    let image = |pauli: Basis| first.conjugate(pauli).and_then(|p| second.conjugate(p));
    let (x, z) = (image(Basis::X), image(Basis::Z));
    if x == Some(Basis::X) && z == Some(Basis::Z) {
        return None;
    }
    Gate::all().find(|gate| {
        gate.kind() == GateKind::SingleQubitClifford && gate.conjugate(Basis::X) == x && gate.conjugate(Basis::Z) == z
    })
}

/// Instructions between two `TICK`s, split around their Z basis form.
#[derive(Default)]
struct Moment {
    before: BTreeMap<QubitId, Gate>,
    core: Vec<Instruction>,
    after: BTreeMap<QubitId, Gate>,
    touched: BTreeSet<QubitId>,
    changed: BTreeSet<QubitId>,
}

impl Moment {
    fn claim(&mut self, gate: Gate, qubit: QubitId, change: Option<Gate>) -> Result<()> {
        if self.changed.contains(&qubit) || (change.is_some() && self.touched.contains(&qubit)) {
            return Err(ChunkError::ConversionConflict { gate, qubit });
        }
        self.touched.insert(qubit);
        if change.is_some() {
            self.changed.insert(qubit);
        }
        Ok(())
    }

    fn change_basis(&mut self, gate: Gate, basis: Basis, qubits: &[QubitId], before: bool, after: bool) -> Result<()> {
        let change = basis_change(basis);
        for &qubit in qubits {
            self.claim(gate, qubit, change)?;
            if let Some(change) = change {
                if before {
                    self.before.insert(qubit, change);
                }
                if after {
                    self.after.insert(qubit, change);
                }
            }
        }
        Ok(())
    }

    fn add(&mut self, instruction: &Instruction) -> Result<()> {
        let gate = instruction.gate();
        let qubits: Vec<QubitId> = instruction.qubits().collect();
        let args = instruction.args().to_vec();
        match (gate.kind(), gate.controlled_bases()) {
            (GateKind::Annotation | GateKind::Noise1 | GateKind::Noise2, _) => self.core.push(instruction.clone()),
            (_, Some((control, target))) => {
                for pair in qubits.chunks(2) {
                    let &[a, b] = pair else {
                        return Err(ChunkError::InvalidInstruction {
                            gate,
                            reason: "odd number of targets",
                        });
                    };
                    self.change_basis(gate, control, &[a], true, true)?;
                    self.change_basis(gate, target, &[b], true, true)?;
                    self.core.push(Instruction::on_qubits(Gate::Cz, [a, b], Vec::new())?);
                }
            }
            (GateKind::Reset(basis), _) => {
                self.change_basis(gate, basis, &qubits, false, true)?;
                self.core.push(Instruction::on_qubits(Gate::R, qubits, args)?);
            }
            (GateKind::Measure(basis), _) => {
                self.change_basis(gate, basis, &qubits, true, false)?;
                self.core.push(Instruction::on_qubits(Gate::M, qubits, args)?);
            }
            (GateKind::MeasureReset(basis), _) => {
                self.change_basis(gate, basis, &qubits, true, true)?;
                self.core.push(Instruction::on_qubits(Gate::Mr, qubits, args)?);
            }
            (GateKind::SingleQubitClifford | GateKind::TwoQubitClifford | GateKind::PauliProduct, None) => {
                for qubit in qubits {
                    self.claim(gate, qubit, None)?;
                }
                self.core.push(instruction.clone());
            }
        }
        Ok(())
    }
}

#[derive(Default)]
struct Converter {
    out: Circuit,
    /// Basis changes owed by the last moment and not yet emitted.
    pending: BTreeMap<QubitId, Gate>,
}

impl Converter {
    fn convert(&mut self, circuit: &Circuit) -> Result<()> {
        let mut moment = Moment::default();
        for operation in circuit.operations() {
            match operation {
                Operation::Instruction(instruction) if instruction.gate() == Gate::Tick => {
                    self.close_moment(std::mem::take(&mut moment))?;
                    self.out.tick();
                }
                Operation::Instruction(instruction) => moment.add(instruction)?,
                Operation::Repeat { repetitions, body } => {
                    self.close_moment(std::mem::take(&mut moment))?;
                    self.flush_pending()?;
                    let mut inner = Converter::default();
                    inner.convert(body)?;
                    self.out.append_repeat(*repetitions, inner.out);
                }
            }
        }
        self.close_moment(moment)?;
        self.flush_pending()
    }

    /// Emits one layer of single qubit gates, grouped by gate. Returns whether anything was emitted.
    fn emit_layer(&mut self, layer: BTreeMap<QubitId, Gate>) -> Result<bool> {
        let mut groups: BTreeMap<Gate, Vec<QubitId>> = BTreeMap::new();
        for (qubit, gate) in layer {
            groups.entry(gate).or_default().push(qubit);
        }
        for (gate, qubits) in &groups {
            self.out.push(Instruction::on_qubits(*gate, qubits.iter().copied(), Vec::new())?);
        }
        Ok(!groups.is_empty())
    }

    fn close_moment(&mut self, moment: Moment) -> Result<()> {
        if moment.core.is_empty() {
            return Ok(());
        }
        let mut layer = std::mem::take(&mut self.pending);
        for (qubit, gate) in moment.before {
            if let Some(merged) = compose(layer.remove(&qubit), Some(gate)) {
                layer.insert(qubit, merged);
            }
        }
        if self.emit_layer(layer)? {
            self.out.tick();
        }
        for instruction in moment.core {
            self.out.push(instruction);
        }
        self.pending = moment.after;
        Ok(())
    }

    /// Emits owed basis changes in a moment of their own.
    fn flush_pending(&mut self) -> Result<()> {
        let layer = std::mem::take(&mut self.pending);
        if layer.is_empty() {
            return Ok(());
        }
        let ends_with_tick =
            matches!(self.out.operations().last(), Some(Operation::Instruction(i)) if i.gate() == Gate::Tick);
        if ends_with_tick {
            self.emit_layer(layer)?;
            self.out.tick();
        } else {
            self.out.tick();
            self.emit_layer(layer)?;
        }
        Ok(())
    }
}

/// Rewrites `circuit` so its only two qubit gates are `CZ`s and its resets and measurements are
/// in the Z basis, leaving its measurement order and stabilizer flows unchanged.
///
/// Controlled Pauli gates turn into `CZ` conjugated by `H` or `H_YZ` on the operands whose
/// control or target basis isn't Z. Other two qubit gates and `MPP` are kept as they are. Fails
/// when a qubit needing a basis change shares its moment with another operation on it.
pub fn to_z_basis_interaction_circuit(circuit: &Circuit) -> Result<Circuit> {
    let mut converter = Converter::default();
    converter.convert(circuit)?;
    tracing::debug!(operations = converter.out.len(), "converted circuit to cz interactions");
    Ok(converter.out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::Chunk;
    use crate::surface_code::{standard_surface_code_chunk, surface_code_patch, DataBasis};

    fn converted(text: &str) -> String {
        let circuit: Circuit = text.parse().unwrap();
        to_z_basis_interaction_circuit(&circuit).unwrap().to_string()
    }

    #[test]
    fn basis_changes_share_moments() {
        assert_eq!(
            converted("RX 0\nTICK\nCX 0 1\nTICK\nMX 0\n"),
            "R 0\nTICK\nH 0 1\nTICK\nCZ 0 1\nTICK\nH 0 1\nTICK\nM 0\n"
        );
    }

    #[test]
    fn back_to_back_changes_cancel() {
        assert_eq!(
            converted("CX 0 1\nTICK\nCX 2 1\n"),
            "H 1\nTICK\nCZ 0 1\nTICK\nCZ 2 1\nTICK\nH 1\n"
        );
        assert_eq!(converted("RY 0\nTICK\nMY 0\n"), "R 0\nTICK\nM 0\n");
        assert_eq!(converted("MRX(0.25) 0\nTICK\n"), "H 0\nTICK\nMR(0.25) 0\nTICK\nH 0\nTICK\n");
    }

    #[test]
    fn y_controls_use_h_yz() {
        assert_eq!(converted("YCZ 0 1\n"), "H_YZ 0\nTICK\nCZ 0 1\nTICK\nH_YZ 0\n");
        assert_eq!(converted("CZ 0 1\nSWAP 2 3\n"), "CZ 0 1\nSWAP 2 3\n");
    }

    #[test]
    fn repeat_bodies_are_converted_on_their_own() {
        let circuit: Circuit = "RX 0\nTICK\nREPEAT 2 {\n    MX 0\n    TICK\n}\n".parse().unwrap();
        let result = to_z_basis_interaction_circuit(&circuit).unwrap();
        assert_eq!(
            result.to_string(),
            "R 0\nTICK\nH 0\nTICK\nREPEAT 2 {\n    H 0\n    TICK\n    M 0\n    TICK\n}\n"
        );
    }

    #[test]
    fn shared_moment_is_rejected() {
        let circuit: Circuit = "CX 0 1\nM 1\n".parse().unwrap();
        assert_eq!(
            to_z_basis_interaction_circuit(&circuit),
            Err(ChunkError::ConversionConflict { gate: Gate::M, qubit: 1 })
        );
    }

    #[test]
    fn converted_rounds_keep_their_flows() {
        let patch = surface_code_patch(3).unwrap();
        for (init, measure) in [
            (DataBasis::Uniform(Basis::X), DataBasis::None),
            (DataBasis::None, DataBasis::None),
            (DataBasis::None, DataBasis::Uniform(Basis::Z)),
        ] {
            let chunk = standard_surface_code_chunk(&patch, &init, &measure, None).unwrap();
            let circuit = to_z_basis_interaction_circuit(chunk.circuit()).unwrap();
            assert!(circuit.instructions().all(|i| !matches!(i.gate(), Gate::Cx | Gate::Rx | Gate::Mx)));
            assert_eq!(circuit.num_measurements(), chunk.circuit().num_measurements());
            Chunk::new(circuit, chunk.q2i().clone(), chunk.flows().to_vec()).verify().unwrap();
        }
    }
}
