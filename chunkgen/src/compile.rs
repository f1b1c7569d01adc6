//! Stitching a sequence of chunks into one annotated circuit.

use paulimap::{Coord, PauliString};
use std::collections::{BTreeMap, BTreeSet};

use crate::chunk::Chunk;
use crate::circuit::{Circuit, MeasurementId, QubitId, Target};
use crate::error::{ChunkError, Result};
use crate::flow::Flow;
use crate::gate::Gate;

/// Fourth detector coordinate marking a detector whose firing discards the shot.
pub const POSTSELECTION_MARKER: f64 = 999.0;

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CompileOptions {
    /// Log stitching errors and skip the offending flow instead of failing.
    pub ignore_errors: bool,
}

type FlowKey = (PauliString, Option<usize>);

struct ChunkCompiler<'a> {
    options: &'a CompileOptions,
    circuit: Circuit,
    q2i: BTreeMap<Coord, QubitId>,
    num_measurements: usize,
    outgoing: BTreeMap<FlowKey, Flow>,
    discarded_outputs: BTreeSet<PauliString>,
}

impl ChunkCompiler<'_> {
    fn fail(&self, error: ChunkError) -> Result<()> {
        if self.options.ignore_errors {
            tracing::warn!(%error, "skipping flow that failed to stitch");
            Ok(())
        } else {
            Err(error)
        }
    }

    fn record_targets(&self, measurements: &[MeasurementId]) -> Vec<Target> {
        measurements.iter().map(|m| Target::Record(self.num_measurements.saturating_sub(*m))).collect()
    }

    fn store_outgoing(&self, outgoing: &mut BTreeMap<FlowKey, Flow>, chunk: usize, flow: Flow) -> Result<()> {
        let Some(end) = flow.end().cloned() else {
            return Ok(());
        };
        let key = (end, flow.obs_index());
        if outgoing.contains_key(&key) {
            let (end, obs_index) = key;
            return self.fail(ChunkError::AmbiguousFlow { chunk, end, obs_index });
        }
        outgoing.insert(key, flow);
        Ok(())
    }

    /// Outgoing flows with measurements as lookbacks from the current measurement count.
    fn relative_state(&self) -> (Vec<Flow>, BTreeSet<PauliString>) {
        let flows = self
            .outgoing
            .values()
            .map(|flow| {
                let lookbacks = flow.measurement_indices().iter().map(|m| self.num_measurements.saturating_sub(*m));
                flow.with_measurement_indices(lookbacks)
            })
            .collect();
        (flows, self.discarded_outputs.clone())
    }

    /// Compiles `repetitions` iterations of `body`. Once an iteration compiles to the same
    /// instructions and leaves the same relative state as the one before it, every later iteration
    /// would too, so the rest are emitted as one `REPEAT` block.
    fn append_loop(&mut self, index: usize, body: &Chunk, repetitions: usize) -> Result<()> {
        let per_iteration = body.circuit().num_measurements();
        let mut previous: Option<(Circuit, (Vec<Flow>, BTreeSet<PauliString>))> = None;
        for iteration in 0..repetitions {
            let outer = std::mem::take(&mut self.circuit);
            let appended = self.append_chunk(index, body);
            let segment = std::mem::replace(&mut self.circuit, outer);
            appended?;
            let current = (segment, self.relative_state());
            if previous.as_ref() == Some(&current) {
                let skipped = repetitions - iteration - 1;
                let shift = skipped * per_iteration;
                self.num_measurements += shift;
                self.outgoing = std::mem::take(&mut self.outgoing)
                    .into_iter()
                    .map(|(key, flow)| (key, flow.with_measurement_offset(shift)))
                    .collect();
                let count = repetitions - iteration + 1;
                tracing::debug!(chunk = index, iteration, count, "loop reached a steady state");
                let (segment, _) = current;
                self.circuit.append_repeat(u64::try_from(count).unwrap_or(u64::MAX), segment);
                return Ok(());
            }
            if let Some((segment, _)) = previous.replace(current) {
                self.circuit += &segment;
            }
        }
        if let Some((segment, _)) = previous {
            self.circuit += &segment;
        }
        Ok(())
    }

    fn append_chunk(&mut self, index: usize, chunk: &Chunk) -> Result<()> {
        if let Some((body, repetitions)) = chunk.repeated_body() {
            return self.append_loop(index, body, repetitions);
        }
        let old2new: BTreeMap<QubitId, QubitId> = chunk
            .q2i()
            .iter()
            .filter_map(|(q, local)| self.q2i.get(q).map(|global| (*local, *global)))
            .collect();
        self.circuit += &chunk.circuit().reindexed(&old2new, true)?;
        let offset = self.num_measurements;
        self.num_measurements += chunk.circuit().num_measurements();

        let mut incoming = std::mem::take(&mut self.outgoing);
        let previously_discarded = std::mem::take(&mut self.discarded_outputs);
        let mut discarded: BTreeSet<PauliString> = chunk.discarded_outputs().iter().cloned().collect();
        let mut outgoing = BTreeMap::new();
        let mut detectors: Vec<Flow> = Vec::new();
        let mut observables: Vec<(usize, Vec<MeasurementId>)> = Vec::new();

        let with_start = chunk.flows().iter().filter(|flow| flow.start().is_some());
        let without_start = chunk.flows().iter().filter(|flow| flow.start().is_none());
        for flow in with_start.chain(without_start) {
            let local = flow.with_measurement_offset(offset);
            let flow = match local.start().cloned() {
                None => local,
                Some(start) => match incoming.remove(&(start.clone(), local.obs_index())) {
                    Some(previous) => previous.concat(&local, 0)?,
                    None if previously_discarded.contains(&start) => {
                        discarded.extend(local.end().cloned());
                        continue;
                    }
                    None => {
                        self.fail(ChunkError::UnmatchedFlow {
                            chunk: index,
                            start,
                            obs_index: local.obs_index(),
                        })?;
                        continue;
                    }
                },
            };

            if let Some(obs_index) = flow.obs_index() {
                if !flow.measurement_indices().is_empty() {
                    observables.push((obs_index, flow.measurement_indices().to_vec()));
                }
                self.store_outgoing(&mut outgoing, index, flow.with_measurement_indices([]))?;
            } else if flow.end().is_some() {
                self.store_outgoing(&mut outgoing, index, flow)?;
            } else if !flow.measurement_indices().is_empty() {
                detectors.push(flow);
            }
        }

        for ((end, obs_index), _) in incoming {
            if !chunk.discarded_inputs().contains(&end) {
                self.fail(ChunkError::UnconsumedFlow {
                    chunk: index.saturating_sub(1),
                    end,
                    obs_index,
                })?;
            }
        }

        for detector in &detectors {
            let center = detector.center();
            let mut coords = vec![center.x(), center.y(), 0.0];
            if detector.postselect() {
                coords.push(POSTSELECTION_MARKER);
            }
            let targets = self.record_targets(detector.measurement_indices());
            self.circuit.append(Gate::Detector, targets, coords)?;
        }
        for (obs_index, measurements) in &observables {
            let targets = self.record_targets(measurements);
            #[allow(clippy::cast_precision_loss)]
            let obs_index = *obs_index as f64;
            self.circuit.append(Gate::ObservableInclude, targets, [obs_index])?;
        }
        if !detectors.is_empty() {
            self.circuit.append(Gate::ShiftCoords, [], [0.0, 0.0, 1.0])?;
        }
        self.circuit.tick();

        tracing::debug!(
            chunk = index,
            detectors = detectors.len(),
            observables = observables.len(),
            outgoing = outgoing.len(),
            "compiled chunk"
        );
        self.outgoing = outgoing;
        self.discarded_outputs = discarded;
        Ok(())
    }
}

/// Compiles chunks into one circuit, failing on any flow that can't be stitched.
pub fn compile_chunks_into_circuit(chunks: &[Chunk]) -> Result<Circuit> {
    compile_chunks_with(chunks, &CompileOptions::default())
}

/// Compiles chunks into one circuit.
///
/// Qubits of all chunks get one global numbering, sorted by coordinate, announced with
/// `QUBIT_COORDS`. Each chunk's incoming flows are matched against the previous chunk's outgoing
/// flows by Pauli string and observable index. Joined flows that end inside a chunk become
/// `DETECTOR`s and observable flows contribute `OBSERVABLE_INCLUDE`s for their measurements. A chunk
/// that emitted detectors is followed by `SHIFT_COORDS(0, 0, 1)`, and every chunk by `TICK`.
/// Repeated chunks compile iteration by iteration until they settle into a `REPEAT` block.
pub fn compile_chunks_with(chunks: &[Chunk], options: &CompileOptions) -> Result<Circuit> {
    let qubits: BTreeSet<Coord> = chunks.iter().flat_map(|chunk| chunk.q2i().keys().copied()).collect();
    let q2i: BTreeMap<Coord, QubitId> = qubits.into_iter().enumerate().map(|(i, q)| (q, i)).collect();

    let mut circuit = Circuit::new();
    for (qubit, index) in &q2i {
        circuit.append(Gate::QubitCoords, [Target::Qubit(*index)], [qubit.x(), qubit.y()])?;
    }
    let mut compiler = ChunkCompiler {
        options,
        circuit,
        q2i,
        num_measurements: 0,
        outgoing: BTreeMap::new(),
        discarded_outputs: BTreeSet::new(),
    };
    for (index, chunk) in chunks.iter().enumerate() {
        compiler.append_chunk(index, chunk)?;
    }
    tracing::debug!(
        chunks = chunks.len(),
        measurements = compiler.num_measurements,
        final_outputs = compiler.outgoing.len(),
        "compiled circuit"
    );
    Ok(compiler.circuit)
}
