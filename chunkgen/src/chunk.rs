use paulimap::{Coord, PauliString};
use std::collections::{BTreeMap, BTreeSet};

use crate::builder::{AtLayer, Builder};
use crate::circuit::{Circuit, QubitId};
use crate::error::{ChunkError, Result};
use crate::flow::{Flow, FlowBuilder};
use crate::patch::Patch;
use crate::tile::Tile;
use crate::verifier::{FlowStabilizerVerifier, VerifyOptions};

const MAGIC_LAYER: &str = "magic";

/// A circuit fragment together with the stabilizer flows it claims to implement.
///
/// Flow measurement indices are local: index `k` is the `k`-th measurement of `circuit`.
///
/// A chunk made by [`Chunk::with_repetitions`] remembers the chunk it repeats, so compilation can
/// emit a `REPEAT` block instead of unrolled copies.
#[derive(Clone, Debug, PartialEq)]
pub struct Chunk {
    circuit: Circuit,
    q2i: BTreeMap<Coord, QubitId>,
    flows: Vec<Flow>,
    discarded_inputs: Vec<PauliString>,
    discarded_outputs: Vec<PauliString>,
    magic: bool,
    repeated: Option<(Box<Chunk>, usize)>,
}

impl Chunk {
    #[must_use]
    pub fn new(circuit: Circuit, q2i: BTreeMap<Coord, QubitId>, flows: Vec<Flow>) -> Self {
        Chunk {
            circuit,
            q2i,
            flows,
            discarded_inputs: Vec::new(),
            discarded_outputs: Vec::new(),
            magic: false,
            repeated: None,
        }
    }

    /// Takes the circuit and qubit numbering accumulated by `builder`.
    #[must_use]
    pub fn from_builder(builder: Builder, flows: Vec<Flow>) -> Self {
        let (circuit, q2i) = builder.into_parts();
        Chunk::new(circuit, q2i, flows)
    }

    /// Incoming stabilizers this chunk deliberately does not continue.
    #[must_use]
    pub fn with_discarded_inputs(mut self, inputs: impl IntoIterator<Item = PauliString>) -> Self {
        let inputs: Vec<PauliString> = inputs.into_iter().collect();
        if let Some((body, repetitions)) = self.repeated.take() {
            self.repeated = Some((Box::new(body.with_discarded_inputs(inputs.clone())), repetitions));
        }
        self.discarded_inputs.extend(inputs);
        self
    }

    /// Outgoing stabilizers this chunk deliberately does not provide.
    #[must_use]
    pub fn with_discarded_outputs(mut self, outputs: impl IntoIterator<Item = PauliString>) -> Self {
        let outputs: Vec<PauliString> = outputs.into_iter().collect();
        if let Some((body, repetitions)) = self.repeated.take() {
            self.repeated = Some((Box::new(body.with_discarded_outputs(outputs.clone())), repetitions));
        }
        self.discarded_outputs.extend(outputs);
        self
    }

    #[must_use]
    pub fn with_magic(mut self, magic: bool) -> Self {
        self.magic = magic;
        self
    }

    #[must_use]
    pub fn circuit(&self) -> &Circuit {
        &self.circuit
    }

    #[must_use]
    pub fn q2i(&self) -> &BTreeMap<Coord, QubitId> {
        &self.q2i
    }

    #[must_use]
    pub fn flows(&self) -> &[Flow] {
        &self.flows
    }

    #[must_use]
    pub fn discarded_inputs(&self) -> &[PauliString] {
        &self.discarded_inputs
    }

    #[must_use]
    pub fn discarded_outputs(&self) -> &[PauliString] {
        &self.discarded_outputs
    }

    /// Whether the chunk is an idealized boundary made of noiseless product measurements.
    #[must_use]
    pub fn is_magic(&self) -> bool {
        self.magic
    }

    /// The repeated chunk and its repetition count, for chunks made by [`Chunk::with_repetitions`].
    #[must_use]
    pub fn repeated_body(&self) -> Option<(&Chunk, usize)> {
        self.repeated.as_ref().map(|(body, repetitions)| (body.as_ref(), *repetitions))
    }

    pub fn verify(&self) -> Result<FlowStabilizerVerifier> {
        FlowStabilizerVerifier::verify(self)
    }

    pub fn verify_with(&self, options: &VerifyOptions) -> Result<FlowStabilizerVerifier> {
        FlowStabilizerVerifier::verify_with(self, options)
    }

    /// The chunk running this one backwards. See [`FlowStabilizerVerifier::invert`].
    ///
    /// A repeated chunk inverts into the repetition of its inverted body.
    pub fn inverted(&self) -> Result<Chunk> {
        match &self.repeated {
            Some((body, repetitions)) => body.inverted()?.with_repetitions(*repetitions),
            None => FlowStabilizerVerifier::invert(self),
        }
    }

    /// Marks every flow matching `predicate` as postselected.
    #[must_use]
    pub fn with_flows_postselected(&self, mut predicate: impl FnMut(&Flow) -> bool) -> Chunk {
        self.postselected(&mut predicate)
    }

    fn postselected(&self, predicate: &mut dyn FnMut(&Flow) -> bool) -> Chunk {
        let flows = self
            .flows
            .iter()
            .map(|flow| if predicate(flow) { flow.with_postselect(true) } else { flow.clone() })
            .collect();
        let repeated = self
            .repeated
            .as_ref()
            .map(|(body, repetitions)| (Box::new(body.postselected(predicate)), *repetitions));
        Chunk {
            flows,
            repeated,
            ..self.clone()
        }
    }

    /// Chunk doing nothing, passing every distinct incoming stabilizer straight through.
    fn identity(&self) -> Result<Chunk> {
        let mut seen = BTreeSet::new();
        let mut flows = Vec::new();
        for flow in &self.flows {
            let Some(start) = flow.start() else { continue };
            if !seen.insert((start.clone(), flow.obs_index())) {
                continue;
            }
            let mut builder = Flow::builder(flow.center()).start(start.clone()).end(start.clone());
            if let Some(obs_index) = flow.obs_index() {
                builder = builder.obs_index(obs_index);
            }
            flows.push(builder.build()?);
        }
        Ok(Chunk::new(Circuit::new(), self.q2i.clone(), flows))
    }

    /// The chunk repeated `repetitions` times, with outgoing flows of each repetition joined to the
    /// incoming flows of the next.
    ///
    /// From two repetitions on, the circuit is a `REPEAT` block of the chunk followed by `TICK`,
    /// and the flows are those of the whole loop.
    pub fn with_repetitions(&self, repetitions: usize) -> Result<Chunk> {
        if repetitions == 0 {
            return self.identity();
        }
        let per_repetition = self.circuit.num_measurements();
        let mut flows = Vec::new();
        let mut outgoing: Vec<Flow> = Vec::new();
        for repetition in 0..repetitions {
            let mut next_outgoing: Vec<Flow> = Vec::new();
            for flow in &self.flows {
                let mut flow = flow.with_measurement_offset(repetition * per_repetition);
                let incoming = if repetition > 0 { flow.start().cloned() } else { None };
                if let Some(start) = incoming {
                    let position = outgoing
                        .iter()
                        .position(|prev| prev.end() == Some(&start) && prev.obs_index() == flow.obs_index());
                    flow = match position {
                        Some(position) => outgoing.remove(position).concat(&flow, 0)?,
                        None if self.discarded_outputs.contains(&start) => continue,
                        None => {
                            return Err(ChunkError::UnmatchedFlow {
                                chunk: repetition,
                                start,
                                obs_index: flow.obs_index(),
                            })
                        }
                    };
                }
                if let Some(end) = flow.end() {
                    if next_outgoing
                        .iter()
                        .any(|other| other.end() == Some(end) && other.obs_index() == flow.obs_index())
                    {
                        return Err(ChunkError::AmbiguousFlow {
                            chunk: repetition,
                            end: end.clone(),
                            obs_index: flow.obs_index(),
                        });
                    }
                    next_outgoing.push(flow);
                } else {
                    flows.push(flow);
                }
            }
            if let Some(leftover) = outgoing
                .iter()
                .find(|prev| !prev.end().is_some_and(|end| self.discarded_inputs.contains(end)))
            {
                return Err(ChunkError::UnconsumedFlow {
                    chunk: repetition - 1,
                    end: leftover.end().cloned().unwrap_or_default(),
                    obs_index: leftover.obs_index(),
                });
            }
            outgoing = next_outgoing;
        }
        flows.extend(outgoing);
        tracing::debug!(repetitions, flows = flows.len(), "repeated chunk");
        if repetitions == 1 {
            return Ok(Chunk { flows, ..self.clone() });
        }
        let mut body = self.circuit.clone();
        body.tick();
        let mut circuit = Circuit::new();
        circuit.append_repeat(u64::try_from(repetitions).unwrap_or(u64::MAX), body);
        Ok(Chunk {
            circuit,
            q2i: self.q2i.clone(),
            flows,
            discarded_inputs: self.discarded_inputs.clone(),
            discarded_outputs: self.discarded_outputs.clone(),
            magic: self.magic,
            repeated: Some((Box::new(self.clone()), repetitions)),
        })
    }

    /// Replaces the chunk with an idealized preparation of its incoming stabilizers: one Pauli
    /// product measurement per incoming flow.
    pub fn magic_init_chunk(&self) -> Result<Chunk> {
        self.magic_boundary(Flow::start, |builder, pauli| builder.end(pauli))
    }

    /// Replaces the chunk with an idealized measurement of its outgoing stabilizers.
    pub fn magic_end_chunk(&self) -> Result<Chunk> {
        self.magic_boundary(Flow::end, |builder, pauli| builder.start(pauli))
    }

    fn magic_boundary(
        &self,
        side: impl Fn(&Flow) -> Option<&PauliString>,
        attach: impl Fn(FlowBuilder, PauliString) -> FlowBuilder,
    ) -> Result<Chunk> {
        let mut builder = Builder::with_q2i(self.q2i.clone());
        let mut flows = Vec::new();
        for flow in &self.flows {
            let Some(pauli) = side(flow) else { continue };
            let key = AtLayer::new(flow.center(), format!("{MAGIC_LAYER}{}", flows.len()));
            let measurement = builder.measure_pauli_product(pauli, key)?;
            let mut magic = attach(Flow::builder(flow.center()), pauli.clone()).measurements([measurement]);
            if let Some(obs_index) = flow.obs_index() {
                magic = magic.obs_index(obs_index);
            }
            flows.push(magic.build()?);
        }
        Ok(Chunk::from_builder(builder, flows).with_magic(true))
    }

    /// Tiles of the stabilizers this chunk hands to the next one.
    #[must_use]
    pub fn end_patch(&self) -> Patch {
        self.boundary_patch(Flow::end)
    }

    /// Tiles of the stabilizers this chunk expects from the previous one.
    #[must_use]
    pub fn start_patch(&self) -> Patch {
        self.boundary_patch(Flow::start)
    }

    fn boundary_patch(&self, side: impl Fn(&Flow) -> Option<&PauliString>) -> Patch {
        Patch::new(
            self.flows
                .iter()
                .filter(|flow| flow.obs_index().is_none())
                .filter_map(|flow| side(flow).map(|pauli| Tile::from_stabilizer(pauli, flow.center()))),
        )
    }
}
