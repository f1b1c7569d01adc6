//! Named chunk constructions and turning them into complete, optionally noisy, experiments.

use paulimap::Basis;
use std::collections::BTreeMap;
use std::fmt;

use crate::chunk::Chunk;
use crate::circuit::{Circuit, Operation};
use crate::compile::compile_chunks_into_circuit;
use crate::error::{ChunkError, Result};
use crate::gate::Gate;
use crate::interaction::to_z_basis_interaction_circuit;
use crate::noise::NoiseModel;
use crate::surface_code::memory_experiment_chunks;

/// Parameters handed to every construction.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Params {
    /// Name of the construction to run.
    pub basis: String,
    pub distance: usize,
    pub memory_rounds: usize,
    pub postselected_rounds: usize,
    pub postselected_diameter: usize,
}

impl Params {
    /// Rejects parameters asking for postselection from a construction that has none.
    pub fn no_postselection(&self) -> Result<&Self> {
        if self.postselected_rounds != 0 || self.postselected_diameter != 0 {
            return Err(ChunkError::Construction(format!(
                "{} doesn't postselect, but got {} postselected rounds with diameter {}",
                self.basis, self.postselected_rounds, self.postselected_diameter
            )));
        }
        Ok(self)
    }
}

pub type Construction = Box<dyn Fn(&Params) -> Result<Vec<Chunk>> + Send + Sync>;

/// Registry of chunk constructions by name.
#[derive(Default)]
pub struct Constructions {
    table: BTreeMap<String, Construction>,
}

impl Constructions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// `X` and `Z` basis surface code memory experiments.
    #[must_use]
    pub fn memory_experiments() -> Self {
        let mut constructions = Constructions::new();
        for basis in [Basis::X, Basis::Z] {
            constructions.register(basis.to_string(), move |params: &Params| {
                let params = params.no_postselection()?;
                memory_experiment_chunks(params.distance, basis, params.memory_rounds)
            });
        }
        constructions
    }

    /// Adds or replaces the construction called `name`.
    pub fn register(
        &mut self,
        name: impl Into<String>,
        construction: impl Fn(&Params) -> Result<Vec<Chunk>> + Send + Sync + 'static,
    ) {
        self.table.insert(name.into(), Box::new(construction));
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Construction> {
        self.table.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> + '_ {
        self.table.keys().map(String::as_str)
    }
}

impl fmt::Debug for Constructions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.names()).finish()
    }
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MakeCircuitOptions {
    /// Noise applied to the compiled circuit, magic boundaries excepted.
    pub noise: Option<NoiseModel>,
    /// Verify every chunk's flows before compiling.
    pub verify_chunks: bool,
    /// Rewrite everything outside the magic boundaries into `CZ` interactions and Z basis resets
    /// and measurements, before noise is added. See [`to_z_basis_interaction_circuit`].
    pub convert_to_cz: bool,
}

impl Default for MakeCircuitOptions {
    fn default() -> Self {
        MakeCircuitOptions {
            noise: None,
            verify_chunks: false,
            convert_to_cz: true,
        }
    }
}

/// Runs the construction named by `params.basis` and compiles its chunks into one circuit.
///
/// Only constructions whose name mentions `magic` may use magic chunks. Those must sit at the ends
/// of the chunk list, where their product measurements are kept out of the CZ conversion and
/// noiseless.
pub fn make_circuit(constructions: &Constructions, params: &Params, options: &MakeCircuitOptions) -> Result<Circuit> {
    let construction = constructions
        .get(&params.basis)
        .ok_or_else(|| ChunkError::Construction(format!("no construction named {:?}", params.basis)))?;
    let chunks = construction(params)?;
    if chunks.len() < 2 {
        return Err(ChunkError::Construction(format!(
            "{} produced {} chunks, at least 2 are needed",
            params.basis,
            chunks.len()
        )));
    }
    if !params.basis.contains("magic") && chunks.iter().any(Chunk::is_magic) {
        return Err(ChunkError::Construction(format!(
            "{} isn't a magic construction but produced magic chunks",
            params.basis
        )));
    }
    if options.verify_chunks {
        for chunk in &chunks {
            chunk.verify()?;
        }
    }

    let ideal = compile_chunks_into_circuit(&chunks)?;
    if options.noise.is_none() && !options.convert_to_cz {
        return Ok(ideal);
    }
    let operations = ideal.operations();
    let is_mpp = |operation: &Operation| matches!(operation, Operation::Instruction(i) if i.gate() == Gate::Mpp);
    let is_tick = |operation: &Operation| matches!(operation, Operation::Instruction(i) if i.gate() == Gate::Tick);

    let mut body_start = 0;
    if chunks[0].is_magic() {
        if let Some(first_mpp) = operations.iter().position(is_mpp) {
            body_start = operations[first_mpp..]
                .iter()
                .position(is_tick)
                .map_or(operations.len(), |tick| first_mpp + tick + 1);
        }
    }
    let mut body_end = operations.len();
    if chunks[chunks.len() - 1].is_magic() {
        if let Some(last_mpp) = operations.iter().rposition(is_mpp) {
            body_end = last_mpp.max(body_start);
        }
    }

    let mut body = Circuit::from_operations(operations[body_start..body_end].iter().cloned());
    if options.convert_to_cz {
        body = to_z_basis_interaction_circuit(&body)?;
    }
    if let Some(noise) = &options.noise {
        body = noise.noisy_circuit(&body)?;
    }
    let mut circuit = Circuit::from_operations(operations[..body_start].iter().cloned());
    circuit += &body;
    circuit += &Circuit::from_operations(operations[body_end..].iter().cloned());
    tracing::debug!(
        construction = %params.basis,
        chunks = chunks.len(),
        convert_to_cz = options.convert_to_cz,
        noisy = options.noise.is_some(),
        untouched_head = body_start,
        untouched_tail = operations.len() - body_end,
        "made circuit"
    );
    Ok(circuit)
}
