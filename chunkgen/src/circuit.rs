//! A stabilizer circuit in the instruction-list form used by stim-style toolchains.

use derive_more::From;
use paulimap::{setwise, Basis, PauliMap};
use std::collections::{BTreeMap, BTreeSet};

use crate::error::{ChunkError, Result};
use crate::gate::{Gate, GateKind};

mod text;

pub type QubitId = usize;
pub type MeasurementId = usize;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Target {
    Qubit(QubitId),
    /// Pauli target of a product measurement, e.g. `X3`.
    Pauli(Basis, QubitId),
    /// The `*` joining Pauli targets into one product.
    Combiner,
    /// Measurement record lookback, `Record(k)` is `rec[-k]`.
    Record(usize),
}

impl Target {
    #[must_use]
    pub fn qubit(&self) -> Option<QubitId> {
        match self {
            Target::Qubit(qubit) | Target::Pauli(_, qubit) => Some(*qubit),
            Target::Combiner | Target::Record(_) => None,
        }
    }

    fn with_qubit(self, qubit: QubitId) -> Target {
        match self {
            Target::Qubit(_) => Target::Qubit(qubit),
            Target::Pauli(basis, _) => Target::Pauli(basis, qubit),
            other => other,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Instruction {
    gate: Gate,
    targets: Vec<Target>,
    args: Vec<f64>,
}

impl Instruction {
    /// Checks that the targets make sense for the gate.
    pub fn new(gate: Gate, targets: Vec<Target>, args: Vec<f64>) -> Result<Self> {
        let invalid = |reason| Err(ChunkError::InvalidInstruction { gate, reason });
        let all_qubits = targets.iter().all(|t| matches!(t, Target::Qubit(_)));
        match gate.kind() {
            GateKind::Annotation => match gate {
                Gate::Tick | Gate::ShiftCoords if !targets.is_empty() => return invalid("takes no targets"),
                Gate::QubitCoords if !all_qubits => return invalid("targets must be qubits"),
                Gate::Detector | Gate::ObservableInclude
                    if !targets.iter().all(|t| matches!(t, Target::Record(k) if *k > 0)) =>
                {
                    return invalid("targets must be measurement records");
                }
                _ => {}
            },
            GateKind::PauliProduct => {
                if !is_well_formed_product_list(&targets) {
                    return invalid("targets must be Pauli products joined by '*'");
                }
            }
            GateKind::TwoQubitClifford | GateKind::Noise2 => {
                if !all_qubits || targets.len() % 2 != 0 {
                    return invalid("targets must be an even number of qubits");
                }
                if targets.chunks(2).any(|pair| pair[0] == pair[1]) {
                    return invalid("a qubit can't interact with itself");
                }
            }
            GateKind::Noise1
            | GateKind::Reset(_)
            | GateKind::Measure(_)
            | GateKind::MeasureReset(_)
            | GateKind::SingleQubitClifford => {
                if !all_qubits {
                    return invalid("targets must be qubits");
                }
            }
        }
        Ok(Instruction { gate, targets, args })
    }

    /// Instruction applying `gate` to plain qubit targets.
    pub fn on_qubits(gate: Gate, qubits: impl IntoIterator<Item = QubitId>, args: Vec<f64>) -> Result<Self> {
        Instruction::new(gate, qubits.into_iter().map(Target::Qubit).collect(), args)
    }

    #[must_use]
    pub fn gate(&self) -> Gate {
        self.gate
    }

    #[must_use]
    pub fn targets(&self) -> &[Target] {
        &self.targets
    }

    #[must_use]
    pub fn args(&self) -> &[f64] {
        &self.args
    }

    pub fn qubits(&self) -> impl DoubleEndedIterator<Item = QubitId> + '_ {
        self.targets.iter().filter_map(Target::qubit)
    }

    /// Measurement record lookbacks of a `DETECTOR` or `OBSERVABLE_INCLUDE`.
    pub fn records(&self) -> impl Iterator<Item = usize> + '_ {
        self.targets.iter().filter_map(|t| match t {
            Target::Record(lookback) => Some(*lookback),
            _ => None,
        })
    }

    /// Targets grouped the way the gate consumes them: pairs for two qubit gates, whole products
    /// (combiners included) for `MPP`, single targets otherwise.
    #[must_use]
    pub fn target_groups(&self) -> Vec<&[Target]> {
        match self.gate.kind() {
            GateKind::PauliProduct => {
                let mut groups = Vec::new();
                let mut start = 0;
                for end in 1..=self.targets.len() {
                    let closes_group = end == self.targets.len()
                        || (self.targets[end] != Target::Combiner && self.targets[end - 1] != Target::Combiner);
                    if closes_group {
                        groups.push(&self.targets[start..end]);
                        start = end;
                    }
                }
                groups
            }
            GateKind::TwoQubitClifford | GateKind::Noise2 => self.targets.chunks(2).collect(),
            _ => self.targets.chunks(1).collect(),
        }
    }

    /// The measured products of an `MPP` instruction.
    #[must_use]
    pub fn pauli_products(&self) -> Vec<PauliMap<QubitId>> {
        if self.gate != Gate::Mpp {
            return Vec::new();
        }
        self.target_groups()
            .into_iter()
            .map(|group| {
                group
                    .iter()
                    .filter_map(|t| match t {
                        Target::Pauli(basis, qubit) => Some((*qubit, *basis)),
                        _ => None,
                    })
                    .collect()
            })
            .collect()
    }

    #[must_use]
    pub fn measurement_count(&self) -> usize {
        match self.gate.kind() {
            GateKind::Measure(_) | GateKind::MeasureReset(_) => self.targets.len(),
            GateKind::PauliProduct => self.target_groups().len(),
            _ => 0,
        }
    }

    /// Same instruction acting on the given target groups, in that order.
    pub(crate) fn with_target_groups<'a>(&self, gate: Gate, groups: impl IntoIterator<Item = &'a [Target]>) -> Self {
        let mut targets = Vec::with_capacity(self.targets.len());
        for group in groups {
            targets.extend_from_slice(group);
        }
        Instruction {
            gate,
            targets,
            args: self.args.clone(),
        }
    }

    fn can_absorb(&self, other: &Instruction) -> bool {
        self.gate == other.gate && self.gate.is_fusable() && self.args == other.args
    }
}

fn is_well_formed_product_list(targets: &[Target]) -> bool {
    let mut expect_pauli = true;
    for target in targets {
        match (target, expect_pauli) {
            (Target::Pauli(..), _) => expect_pauli = false,
            (Target::Combiner, false) => expect_pauli = true,
            _ => return false,
        }
    }
    !targets.is_empty() && !expect_pauli
}

#[derive(Clone, Debug, PartialEq, From)]
pub enum Operation {
    Instruction(Instruction),
    Repeat { repetitions: u64, body: Circuit },
}

/// A detector of a circuit with coordinate shifts applied and lookbacks resolved.
#[derive(Clone, Debug, PartialEq)]
pub struct DetectorRecord {
    pub coords: Vec<f64>,
    /// Absolute measurement indices, ascending.
    pub measurements: Vec<MeasurementId>,
}

#[derive(Clone, Debug, Default, PartialEq)]
#[must_use]
pub struct Circuit {
    operations: Vec<Operation>,
}

impl Circuit {
    pub fn new() -> Self {
        Circuit::default()
    }

    #[must_use]
    pub fn operations(&self) -> &[Operation] {
        &self.operations
    }

    pub fn from_operations(operations: impl IntoIterator<Item = Operation>) -> Self {
        let mut circuit = Circuit::new();
        for operation in operations {
            circuit.push_operation(operation);
        }
        circuit
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.operations.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    /// Top level instructions, `REPEAT` blocks skipped.
    pub fn instructions(&self) -> impl Iterator<Item = &Instruction> {
        self.operations.iter().filter_map(|operation| match operation {
            Operation::Instruction(instruction) => Some(instruction),
            Operation::Repeat { .. } => None,
        })
    }

    /// Appends an instruction, merging it into the previous one when they can be fused.
    pub fn push(&mut self, instruction: Instruction) {
        if let Some(Operation::Instruction(last)) = self.operations.last_mut() {
            if last.can_absorb(&instruction) {
                last.targets.extend(instruction.targets);
                return;
            }
        }
        self.operations.push(Operation::Instruction(instruction));
    }

    pub fn push_operation(&mut self, operation: Operation) {
        match operation {
            Operation::Instruction(instruction) => self.push(instruction),
            repeat @ Operation::Repeat { .. } => self.operations.push(repeat),
        }
    }

    pub fn append(
        &mut self,
        gate: Gate,
        targets: impl IntoIterator<Item = Target>,
        args: impl IntoIterator<Item = f64>,
    ) -> Result<()> {
        let instruction = Instruction::new(gate, targets.into_iter().collect(), args.into_iter().collect())?;
        self.push(instruction);
        Ok(())
    }

    pub fn append_repeat(&mut self, repetitions: u64, body: Circuit) {
        self.operations.push(Operation::Repeat { repetitions, body });
    }

    pub fn tick(&mut self) {
        self.operations.push(Operation::Instruction(Instruction {
            gate: Gate::Tick,
            targets: Vec::new(),
            args: Vec::new(),
        }));
    }

    pub fn extend_from(&mut self, other: &Circuit) {
        for operation in &other.operations {
            self.push_operation(operation.clone());
        }
    }

    #[must_use]
    pub fn num_measurements(&self) -> usize {
        self.operations
            .iter()
            .map(|operation| match operation {
                Operation::Instruction(instruction) => instruction.measurement_count(),
                Operation::Repeat { repetitions, body } => {
                    body.num_measurements().saturating_mul(usize::try_from(*repetitions).unwrap_or(usize::MAX))
                }
            })
            .sum()
    }

    #[must_use]
    pub fn num_detectors(&self) -> usize {
        self.operations
            .iter()
            .map(|operation| match operation {
                Operation::Instruction(instruction) => usize::from(instruction.gate == Gate::Detector),
                Operation::Repeat { repetitions, body } => {
                    body.num_detectors().saturating_mul(usize::try_from(*repetitions).unwrap_or(usize::MAX))
                }
            })
            .sum()
    }

    /// Every qubit any instruction touches.
    #[must_use]
    pub fn qubits(&self) -> BTreeSet<QubitId> {
        let mut qubits = BTreeSet::new();
        for operation in &self.operations {
            match operation {
                Operation::Instruction(instruction) => qubits.extend(instruction.qubits()),
                Operation::Repeat { body, .. } => qubits.extend(body.qubits()),
            }
        }
        qubits
    }

    /// Unrolls `REPEAT` blocks and folds `SHIFT_COORDS` into detector and qubit coordinates.
    pub fn flattened(&self) -> Circuit {
        let mut result = Circuit::new();
        let mut shift = Vec::new();
        self.flatten_into(&mut result, &mut shift);
        result
    }

    fn flatten_into(&self, out: &mut Circuit, shift: &mut Vec<f64>) {
        for operation in &self.operations {
            match operation {
                Operation::Instruction(instruction) => match instruction.gate {
                    Gate::ShiftCoords => {
                        if shift.len() < instruction.args.len() {
                            shift.resize(instruction.args.len(), 0.0);
                        }
                        for (total, delta) in shift.iter_mut().zip(&instruction.args) {
                            *total += delta;
                        }
                    }
                    Gate::Detector | Gate::QubitCoords => {
                        let mut shifted = instruction.clone();
                        for (arg, delta) in shifted.args.iter_mut().zip(shift.iter()) {
                            *arg += delta;
                        }
                        out.push(shifted);
                    }
                    _ => out.push(instruction.clone()),
                },
                Operation::Repeat { repetitions, body } => {
                    for _ in 0..*repetitions {
                        body.flatten_into(out, shift);
                    }
                }
            }
        }
    }

    /// Renumbers qubit targets through `old2new`.
    pub fn reindexed(&self, old2new: &BTreeMap<QubitId, QubitId>, discard_qubit_coords: bool) -> Result<Circuit> {
        let mut result = Circuit::new();
        for operation in &self.operations {
            match operation {
                Operation::Instruction(instruction) => {
                    if discard_qubit_coords && instruction.gate == Gate::QubitCoords {
                        continue;
                    }
                    let targets = instruction
                        .targets
                        .iter()
                        .map(|target| match target.qubit() {
                            Some(qubit) => old2new
                                .get(&qubit)
                                .map(|new| target.with_qubit(*new))
                                .ok_or(ChunkError::UnmappedQubit { qubit }),
                            None => Ok(*target),
                        })
                        .collect::<Result<Vec<_>>>()?;
                    result.push(Instruction {
                        gate: instruction.gate,
                        targets,
                        args: instruction.args.clone(),
                    });
                }
                Operation::Repeat { repetitions, body } => {
                    result.append_repeat(*repetitions, body.reindexed(old2new, discard_qubit_coords)?);
                }
            }
        }
        Ok(result)
    }

    /// All detectors in execution order.
    #[must_use]
    pub fn detectors(&self) -> Vec<DetectorRecord> {
        let mut detectors = Vec::new();
        let mut measured = 0usize;
        for instruction in self.flattened().instructions() {
            if instruction.gate == Gate::Detector {
                detectors.push(DetectorRecord {
                    coords: instruction.args.clone(),
                    measurements: setwise::parity_set(instruction.records().filter_map(|k| measured.checked_sub(k))),
                });
            }
            measured += instruction.measurement_count();
        }
        detectors
    }

    /// Measurements included in each logical observable.
    #[must_use]
    pub fn observables(&self) -> BTreeMap<usize, Vec<MeasurementId>> {
        let mut observables: BTreeMap<usize, Vec<MeasurementId>> = BTreeMap::new();
        let mut measured = 0usize;
        for instruction in self.flattened().instructions() {
            if instruction.gate == Gate::ObservableInclude {
                #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
                let index = instruction.args.first().copied().unwrap_or(0.0) as usize;
                observables.entry(index).or_default().extend(instruction.records().filter_map(|k| measured.checked_sub(k)));
            }
            measured += instruction.measurement_count();
        }
        observables
            .into_iter()
            .map(|(index, measurements)| (index, setwise::parity_set(measurements)))
            .collect()
    }
}

impl std::ops::AddAssign<&Circuit> for Circuit {
    fn add_assign(&mut self, rhs: &Circuit) {
        self.extend_from(rhs);
    }
}
