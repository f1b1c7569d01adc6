use paulimap::{Basis, Coord, PauliString};
use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::circuit::{Circuit, Instruction, MeasurementId, QubitId, Target};
use crate::error::{ChunkError, Result};
use crate::gate::{Gate, GateKind};

/// Reference to the measurement of a qubit in a named layer.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct AtLayer {
    pub qubit: Coord,
    pub layer: String,
}

impl AtLayer {
    #[must_use]
    pub fn new(qubit: Coord, layer: impl Into<String>) -> Self {
        AtLayer {
            qubit,
            layer: layer.into(),
        }
    }
}

/// Remembers which measurement indices each `(qubit, layer)` pair produced.
#[derive(Clone, Debug, Default)]
pub struct MeasurementTracker {
    recorded: HashMap<AtLayer, Vec<MeasurementId>>,
    next_measurement_id: MeasurementId,
}

impl MeasurementTracker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocates the next measurement index under `key`.
    pub fn record(&mut self, key: AtLayer) -> MeasurementId {
        let id = self.next_measurement_id;
        self.recorded.entry(key).or_default().push(id);
        self.next_measurement_id += 1;
        id
    }

    /// Number of measurements recorded so far.
    #[must_use]
    pub fn measurement_count(&self) -> usize {
        self.next_measurement_id
    }

    /// Resolves layer references into measurement indices, in the order given.
    pub fn measurement_indices<'a>(&self, keys: impl IntoIterator<Item = &'a AtLayer>) -> Result<Vec<MeasurementId>> {
        let mut indices = Vec::new();
        for key in keys {
            let recorded = self.recorded.get(key).ok_or_else(|| ChunkError::UnknownMeasurement {
                qubit: key.qubit,
                layer: key.layer.clone(),
            })?;
            indices.extend_from_slice(recorded);
        }
        Ok(indices)
    }
}

/// Accumulates a chunk's circuit over lattice coordinates, assigning qubit indices on first use and
/// tracking measurement indices by layer.
#[derive(Clone, Debug, Default)]
pub struct Builder {
    q2i: BTreeMap<Coord, QubitId>,
    circuit: Circuit,
    tracker: MeasurementTracker,
    moment: BTreeSet<Coord>,
}

impl Builder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder with the given qubits registered up front in coordinate order.
    #[must_use]
    pub fn for_qubits(qubits: impl IntoIterator<Item = Coord>) -> Self {
        let mut builder = Builder::new();
        let sorted: BTreeSet<Coord> = qubits.into_iter().collect();
        for qubit in sorted {
            builder.index_of(qubit);
        }
        builder
    }

    /// Builder reusing an existing qubit numbering.
    #[must_use]
    pub fn with_q2i(q2i: BTreeMap<Coord, QubitId>) -> Self {
        Builder {
            q2i,
            ..Builder::default()
        }
    }

    #[must_use]
    pub fn q2i(&self) -> &BTreeMap<Coord, QubitId> {
        &self.q2i
    }

    #[must_use]
    pub fn circuit(&self) -> &Circuit {
        &self.circuit
    }

    #[must_use]
    pub fn tracker(&self) -> &MeasurementTracker {
        &self.tracker
    }

    #[must_use]
    pub fn into_parts(self) -> (Circuit, BTreeMap<Coord, QubitId>) {
        (self.circuit, self.q2i)
    }

    fn index_of(&mut self, qubit: Coord) -> QubitId {
        let next = self.q2i.len();
        *self.q2i.entry(qubit).or_insert(next)
    }

    fn claim(&mut self, gate: Gate, qubit: Coord) -> Result<()> {
        if self.moment.insert(qubit) {
            Ok(())
        } else {
            Err(ChunkError::OverlappingOperands { gate, qubit })
        }
    }

    /// Applies a single qubit gate, reset or noise channel to each qubit, in coordinate order.
    pub fn gate(&mut self, gate: Gate, qubits: impl IntoIterator<Item = Coord>) -> Result<()> {
        if !matches!(
            gate.kind(),
            GateKind::SingleQubitClifford | GateKind::Reset(_) | GateKind::Noise1
        ) {
            return Err(ChunkError::InvalidInstruction {
                gate,
                reason: "expected a single qubit gate",
            });
        }
        let mut qubits: Vec<Coord> = qubits.into_iter().collect();
        if qubits.is_empty() {
            return Ok(());
        }
        qubits.sort();
        for qubit in &qubits {
            self.claim(gate, *qubit)?;
        }
        let indices: Vec<QubitId> = qubits.into_iter().map(|q| self.index_of(q)).collect();
        self.circuit.push(Instruction::on_qubits(gate, indices, Vec::new())?);
        Ok(())
    }

    /// Applies a two qubit gate to each pair, pairs sorted by coordinates.
    pub fn gate2(&mut self, gate: Gate, pairs: impl IntoIterator<Item = (Coord, Coord)>) -> Result<()> {
        if gate.kind() != GateKind::TwoQubitClifford {
            return Err(ChunkError::InvalidInstruction {
                gate,
                reason: "expected a two qubit gate",
            });
        }
        let mut pairs: Vec<(Coord, Coord)> = pairs.into_iter().collect();
        if pairs.is_empty() {
            return Ok(());
        }
        pairs.sort();
        for (a, b) in &pairs {
            self.claim(gate, *a)?;
            self.claim(gate, *b)?;
        }
        let mut indices = Vec::with_capacity(2 * pairs.len());
        for (a, b) in pairs {
            indices.push(self.index_of(a));
            indices.push(self.index_of(b));
        }
        self.circuit.push(Instruction::on_qubits(gate, indices, Vec::new())?);
        Ok(())
    }

    /// Measures each qubit in `basis`, recording the results under `save_layer`.
    pub fn measure(&mut self, qubits: impl IntoIterator<Item = Coord>, basis: Basis, save_layer: &str) -> Result<()> {
        let gate = Gate::measure(basis);
        let mut qubits: Vec<Coord> = qubits.into_iter().collect();
        if qubits.is_empty() {
            return Ok(());
        }
        qubits.sort();
        for qubit in &qubits {
            self.claim(gate, *qubit)?;
        }
        let mut indices = Vec::with_capacity(qubits.len());
        for qubit in qubits {
            indices.push(self.index_of(qubit));
            self.tracker.record(AtLayer::new(qubit, save_layer));
        }
        self.circuit.push(Instruction::on_qubits(gate, indices, Vec::new())?);
        Ok(())
    }

    /// Measures one Pauli product, recording the result under `key`.
    ///
    /// Products are not checked against the current moment: several commuting products may share
    /// qubits within one `MPP` layer.
    pub fn measure_pauli_product(&mut self, product: &PauliString, key: AtLayer) -> Result<MeasurementId> {
        if product.is_identity() {
            return Err(ChunkError::InvalidInstruction {
                gate: Gate::Mpp,
                reason: "can't measure the identity",
            });
        }
        let mut targets = Vec::with_capacity(2 * product.weight());
        for (qubit, basis) in product.iter() {
            if !targets.is_empty() {
                targets.push(Target::Combiner);
            }
            targets.push(Target::Pauli(basis, self.index_of(*qubit)));
        }
        self.circuit.push(Instruction::new(Gate::Mpp, targets, Vec::new())?);
        Ok(self.tracker.record(key))
    }

    /// Starts a new moment.
    pub fn tick(&mut self) {
        self.circuit.tick();
        self.moment.clear();
    }
}
