//! Rotated surface code layouts and the standard stabilizer measurement round over them.

use paulimap::{Basis, Coord, PauliString};
use std::collections::{BTreeMap, BTreeSet};

use crate::builder::{AtLayer, Builder};
use crate::chunk::Chunk;
use crate::error::{ChunkError, Result};
use crate::flow::Flow;
use crate::gate::Gate;
use crate::patch::Patch;
use crate::tile::Tile;

const ROUND_LAYER: &str = "round";

/// Interaction order of X tiles, as offsets from the measurement qubit.
const X_ORDER: [(f64, f64); 4] = [(0.5, -0.5), (-0.5, -0.5), (0.5, 0.5), (-0.5, 0.5)];
/// Interaction order of Z tiles.
const Z_ORDER: [(f64, f64); 4] = [(0.5, -0.5), (0.5, 0.5), (-0.5, -0.5), (-0.5, 0.5)];

/// X for measurement qubits where `trunc(x + y)` is even, Z elsewhere.
#[must_use]
pub fn checkerboard_basis(qubit: Coord) -> Basis {
    #[allow(clippy::cast_possible_truncation)]
    let parity = ((qubit.x() + qubit.y()).trunc() as i64).rem_euclid(2);
    if parity == 0 {
        Basis::X
    } else {
        Basis::Z
    }
}

/// Which data qubits are reset (or measured) by a round, and in which basis.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum DataBasis {
    #[default]
    None,
    Uniform(Basis),
    PerQubit(BTreeMap<Coord, Basis>),
}

impl DataBasis {
    #[must_use]
    pub fn basis_of(&self, qubit: Coord) -> Option<Basis> {
        match self {
            DataBasis::None => None,
            DataBasis::Uniform(basis) => Some(*basis),
            DataBasis::PerQubit(bases) => bases.get(&qubit).copied(),
        }
    }

    /// Whether every qubit of `tile` that this assignment touches uses the tile's basis.
    fn agrees_with(&self, tile: &Tile, basis: Basis) -> bool {
        tile.data_qubits().all(|q| self.basis_of(q).is_none_or(|b| b == basis))
    }
}

impl From<Basis> for DataBasis {
    fn from(basis: Basis) -> Self {
        DataBasis::Uniform(basis)
    }
}

impl From<Option<Basis>> for DataBasis {
    fn from(basis: Option<Basis>) -> Self {
        basis.map_or(DataBasis::None, DataBasis::Uniform)
    }
}

impl From<BTreeMap<Coord, Basis>> for DataBasis {
    fn from(bases: BTreeMap<Coord, Basis>) -> Self {
        DataBasis::PerQubit(bases)
    }
}

/// A `distance` × `distance` rotated surface code patch with data qubits at integer coordinates
/// `0..distance`, X type boundaries on the top and bottom and Z type boundaries on the sides.
pub fn surface_code_patch(distance: usize) -> Result<Patch> {
    if distance < 2 {
        return Err(ChunkError::Construction(format!(
            "surface code patch needs distance at least 2, got {distance}"
        )));
    }
    #[allow(clippy::cast_precision_loss)]
    let size = distance as f64;
    let is_data = |q: Coord| (0.0..size).contains(&q.x()) && (0.0..size).contains(&q.y());
    let mut tiles = Vec::new();
    for i in 0..=distance {
        for j in 0..=distance {
            #[allow(clippy::cast_precision_loss)]
            let m = Coord::new(i as f64 - 0.5, j as f64 - 0.5);
            let basis = checkerboard_basis(m);
            let order = if basis == Basis::X { X_ORDER } else { Z_ORDER };
            let slots: Vec<Option<Coord>> = order
                .iter()
                .map(|(dx, dy)| Some(m + Coord::new(*dx, *dy)).filter(|q| is_data(*q)))
                .collect();
            let on_side = m.x() < 0.0 || m.x() > size - 1.0;
            let on_top_or_bottom = m.y() < 0.0 || m.y() > size - 1.0;
            if slots.iter().flatten().count() < 2
                || (on_side && basis != Basis::Z)
                || (on_top_or_bottom && basis != Basis::X)
            {
                continue;
            }
            tiles.push(Tile::uniform(slots, basis, m));
        }
    }
    Ok(Patch::new(tiles))
}

fn tile_basis(tile: &Tile) -> Result<Basis> {
    match tile.basis() {
        Some(basis @ (Basis::X | Basis::Z)) => Ok(basis),
        _ => Err(ChunkError::Construction(format!(
            "tile at {} isn't a uniform X or Z tile",
            tile.measurement_qubit()
        ))),
    }
}

/// Appends one round of stabilizer measurements of `patch` to `builder`.
///
/// Data qubits are optionally reset before the round and measured after it. Results are recorded
/// under `save_layer` for both measurement and data qubits.
pub fn build_surface_code_round_circuit(
    patch: &Patch,
    init_data_basis: &DataBasis,
    measure_data_basis: &DataBasis,
    save_layer: &str,
    builder: &mut Builder,
) -> Result<()> {
    let mut x_tiles = Vec::new();
    let mut z_tiles = Vec::new();
    for tile in patch.tiles() {
        match tile_basis(tile)? {
            Basis::X => x_tiles.push(tile),
            _ => z_tiles.push(tile),
        }
    }
    let measure_qubits = |basis: Basis| -> Vec<Coord> {
        match basis {
            Basis::X => x_tiles.iter().map(|t| t.measurement_qubit()).collect(),
            Basis::Y => Vec::new(),
            Basis::Z => z_tiles.iter().map(|t| t.measurement_qubit()).collect(),
        }
    };
    let data_in = |bases: &DataBasis, basis: Basis| -> Vec<Coord> {
        patch
            .data_set()
            .iter()
            .copied()
            .filter(|q| bases.basis_of(*q) == Some(basis))
            .collect()
    };

    for basis in Basis::ALL {
        let reset = Gate::reset(basis);
        builder.gate(reset, measure_qubits(basis))?;
        builder.gate(reset, data_in(init_data_basis, basis))?;
    }
    builder.tick();

    let layers = patch.tiles().iter().map(|t| t.ordered_data_qubits().len()).max().unwrap_or(0);
    for k in 0..layers {
        let mut pairs = Vec::new();
        for tile in &x_tiles {
            if let Some(Some(data)) = tile.ordered_data_qubits().get(k) {
                pairs.push((tile.measurement_qubit(), *data));
            }
        }
        for tile in &z_tiles {
            if let Some(Some(data)) = tile.ordered_data_qubits().get(k) {
                pairs.push((*data, tile.measurement_qubit()));
            }
        }
        builder.gate2(Gate::Cx, pairs)?;
        builder.tick();
    }

    for basis in Basis::ALL {
        builder.measure(measure_qubits(basis), basis, save_layer)?;
        builder.measure(data_in(measure_data_basis, basis), basis, save_layer)?;
    }
    Ok(())
}

fn measured_keys(measure_data_basis: &DataBasis, qubits: impl Iterator<Item = Coord>) -> Vec<AtLayer> {
    qubits
        .filter(|q| measure_data_basis.basis_of(*q).is_some())
        .map(|q| AtLayer::new(q, ROUND_LAYER))
        .collect()
}

/// One surface code round over `patch` as a chunk.
///
/// Each tile gets an incoming flow comparing its measurement to the previous round and an outgoing
/// flow handing the stabilizer to the next round. A tile whose data qubits are initialized (or
/// measured) in the other basis has no incoming (or outgoing) flow; the part of its stabilizer that
/// still crosses the boundary is recorded as discarded instead. `obs`, when given, flows through as
/// observable 0.
pub fn standard_surface_code_chunk(
    patch: &Patch,
    init_data_basis: &DataBasis,
    measure_data_basis: &DataBasis,
    obs: Option<&PauliString>,
) -> Result<Chunk> {
    let obs_qubits: BTreeSet<Coord> = obs.into_iter().flat_map(|o| o.support().copied()).collect();
    let mut builder = Builder::for_qubits(patch.used_set().union(&obs_qubits).copied());
    build_surface_code_round_circuit(patch, init_data_basis, measure_data_basis, ROUND_LAYER, &mut builder)?;
    let tracker = builder.tracker();
    let initialized = |q: &Coord| init_data_basis.basis_of(*q).is_some();
    let measured = |q: &Coord| measure_data_basis.basis_of(*q).is_some();

    let mut flows = Vec::new();
    let mut discarded_inputs = Vec::new();
    let mut discarded_outputs = Vec::new();
    for tile in patch.tiles() {
        let basis = tile_basis(tile)?;
        let center = tile.measurement_qubit();
        let stabilizer = tile.stabilizer();
        let key = AtLayer::new(center, ROUND_LAYER);

        let from_previous = stabilizer.restricted(|q| !initialized(q));
        if init_data_basis.agrees_with(tile, basis) {
            flows.push(
                Flow::builder(center)
                    .start(from_previous)
                    .measurements(tracker.measurement_indices([&key])?)
                    .build()?,
            );
        } else if !from_previous.is_identity() {
            discarded_inputs.push(from_previous);
        }

        let to_next = stabilizer.restricted(|q| !measured(q));
        if measure_data_basis.agrees_with(tile, basis) {
            let mut keys = vec![key];
            keys.extend(measured_keys(measure_data_basis, tile.data_qubits()));
            flows.push(
                Flow::builder(center)
                    .end(to_next)
                    .measurements(tracker.measurement_indices(&keys)?)
                    .build()?,
            );
        } else if !to_next.is_identity() {
            discarded_outputs.push(to_next);
        }
    }

    if let Some(obs) = obs {
        let keys = measured_keys(measure_data_basis, obs.support().copied());
        flows.push(
            Flow::builder(Coord::ORIGIN)
                .start(obs.restricted(|q| !initialized(q)))
                .end(obs.restricted(|q| !measured(q)))
                .measurements(tracker.measurement_indices(&keys)?)
                .obs_index(0)
                .allow_vacuous()
                .build()?,
        );
    }

    Ok(Chunk::from_builder(builder, flows)
        .with_discarded_inputs(discarded_inputs)
        .with_discarded_outputs(discarded_outputs))
}

/// Chunks of an X or Z basis memory experiment: initialize, `memory_rounds` rounds, measure.
///
/// The observable runs along the left column for X and along the bottom row for Z.
pub fn memory_experiment_chunks(distance: usize, basis: Basis, memory_rounds: usize) -> Result<Vec<Chunk>> {
    if basis == Basis::Y {
        return Err(ChunkError::Construction("Y basis memory isn't supported".to_owned()));
    }
    if memory_rounds == 0 {
        return Err(ChunkError::Construction("memory experiment needs at least one round".to_owned()));
    }
    let patch = surface_code_patch(distance)?;
    let obs: PauliString = patch
        .data_set()
        .iter()
        .filter(|q| if basis == Basis::X { q.x() == 0.0 } else { q.y() == 0.0 })
        .map(|q| (*q, basis))
        .collect();
    let uniform = DataBasis::Uniform(basis);
    if memory_rounds == 1 {
        return Ok(vec![standard_surface_code_chunk(&patch, &uniform, &uniform, Some(&obs))?]);
    }
    Ok(vec![
        standard_surface_code_chunk(&patch, &uniform, &DataBasis::None, Some(&obs))?,
        standard_surface_code_chunk(&patch, &DataBasis::None, &DataBasis::None, Some(&obs))?
            .with_repetitions(memory_rounds - 2)?,
        standard_surface_code_chunk(&patch, &DataBasis::None, &uniform, Some(&obs))?,
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checkerboard() {
        assert_eq!(checkerboard_basis(Coord::new(0.5, 1.5)), Basis::X);
        assert_eq!(checkerboard_basis(Coord::new(0.5, 0.5)), Basis::Z);
        assert_eq!(checkerboard_basis(Coord::new(0.5, -0.5)), Basis::X);
        assert_eq!(checkerboard_basis(Coord::new(-0.5, 1.5)), Basis::Z);
    }

    #[test]
    fn distance_three_patch() {
        let patch = surface_code_patch(3).unwrap();
        assert_eq!(patch.tiles().len(), 8);
        assert_eq!(patch.data_set().len(), 9);
        assert_eq!(patch.tiles_with_basis(Basis::X).count(), 4);
        let corner = &patch.tiles()[1];
        assert_eq!(corner.measurement_qubit(), Coord::new(0.5, -0.5));
        assert_eq!(
            corner.ordered_data_qubits(),
            &[None, None, Some(Coord::new(1.0, 0.0)), Some(Coord::new(0.0, 0.0))]
        );
        assert!(surface_code_patch(1).is_err());
    }

    #[test]
    fn round_circuit_layers() {
        let patch = surface_code_patch(2).unwrap();
        let mut builder = Builder::for_qubits(patch.used_set().iter().copied());
        build_surface_code_round_circuit(&patch, &DataBasis::None, &Basis::Z.into(), "r", &mut builder).unwrap();
        let text = builder.circuit().to_string();
        assert_eq!(text.matches("TICK").count(), 5);
        assert_eq!(builder.tracker().measurement_count(), patch.tiles().len() + 4);
    }

    #[test]
    fn mismatched_data_basis_discards_stabilizers() {
        let patch = surface_code_patch(3).unwrap();
        let chunk = standard_surface_code_chunk(&patch, &DataBasis::None, &Basis::X.into(), None).unwrap();
        assert!(chunk.discarded_outputs().is_empty());
        assert_eq!(chunk.flows().len(), 12);
        chunk.verify().unwrap();

        let half: BTreeMap<Coord, Basis> = [(Coord::new(0.0, 0.0), Basis::X)].into();
        let chunk = standard_surface_code_chunk(&patch, &half.into(), &DataBasis::None, None).unwrap();
        assert_eq!(chunk.discarded_inputs().len(), 1);
        chunk.verify().unwrap();
    }

    #[test]
    fn memory_experiment_shapes() {
        let chunks = memory_experiment_chunks(3, Basis::Z, 5).unwrap();
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[1].circuit().num_measurements(), 3 * 8);
        assert!(memory_experiment_chunks(3, Basis::Y, 5).is_err());
        assert!(memory_experiment_chunks(3, Basis::X, 0).is_err());
        assert_eq!(memory_experiment_chunks(3, Basis::X, 1).unwrap().len(), 1);
    }
}
