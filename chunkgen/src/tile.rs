use paulimap::{Basis, Coord, PauliString};
use smallvec::SmallVec;

use crate::error::{ChunkError, Result};

/// Data qubit slots of a tile. Surface code tiles have at most four.
pub type DataSlots = SmallVec<[Option<Coord>; 4]>;

/// One stabilizer measurement: which data qubits it touches in which order, with which bases, and
/// the qubit used to measure it.
///
/// Slots may be empty on boundaries so that every tile of a patch keeps the same interaction order.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Tile {
    ordered_data_qubits: DataSlots,
    bases: SmallVec<[Basis; 4]>,
    measurement_qubit: Coord,
}

impl Tile {
    pub fn new(
        ordered_data_qubits: impl IntoIterator<Item = Option<Coord>>,
        bases: impl IntoIterator<Item = Basis>,
        measurement_qubit: Coord,
    ) -> Result<Self> {
        let ordered_data_qubits: DataSlots = ordered_data_qubits.into_iter().collect();
        let bases: SmallVec<[Basis; 4]> = bases.into_iter().collect();
        if ordered_data_qubits.len() != bases.len() {
            return Err(ChunkError::TileShape {
                measurement_qubit,
                data_qubits: ordered_data_qubits.len(),
                bases: bases.len(),
            });
        }
        Ok(Tile {
            ordered_data_qubits,
            bases,
            measurement_qubit,
        })
    }

    /// A tile measuring the same basis on every data qubit.
    #[must_use]
    pub fn uniform(
        ordered_data_qubits: impl IntoIterator<Item = Option<Coord>>,
        basis: Basis,
        measurement_qubit: Coord,
    ) -> Self {
        let ordered_data_qubits: DataSlots = ordered_data_qubits.into_iter().collect();
        let bases = std::iter::repeat(basis).take(ordered_data_qubits.len()).collect();
        Tile {
            ordered_data_qubits,
            bases,
            measurement_qubit,
        }
    }

    /// A tile measuring `stabilizer`, its data qubits in coordinate order.
    #[must_use]
    pub fn from_stabilizer(stabilizer: &PauliString, measurement_qubit: Coord) -> Self {
        Tile {
            ordered_data_qubits: stabilizer.support().map(|q| Some(*q)).collect(),
            bases: stabilizer.bases().collect(),
            measurement_qubit,
        }
    }

    #[must_use]
    pub fn ordered_data_qubits(&self) -> &[Option<Coord>] {
        &self.ordered_data_qubits
    }

    #[must_use]
    pub fn bases(&self) -> &[Basis] {
        &self.bases
    }

    #[must_use]
    pub fn measurement_qubit(&self) -> Coord {
        self.measurement_qubit
    }

    /// The data qubits that are present, in slot order.
    pub fn data_qubits(&self) -> impl Iterator<Item = Coord> + '_ {
        self.ordered_data_qubits.iter().flatten().copied()
    }

    /// Present data qubits paired with their basis.
    pub fn data_with_bases(&self) -> impl Iterator<Item = (Coord, Basis)> + '_ {
        self.ordered_data_qubits
            .iter()
            .zip(&self.bases)
            .filter_map(|(qubit, basis)| qubit.map(|q| (q, *basis)))
    }

    /// Data qubits plus the measurement qubit.
    pub fn used_qubits(&self) -> impl Iterator<Item = Coord> + '_ {
        self.data_qubits().chain(std::iter::once(self.measurement_qubit))
    }

    /// The common basis of all slots, if there is one.
    #[must_use]
    pub fn basis(&self) -> Option<Basis> {
        let first = *self.bases.first()?;
        self.bases.iter().all(|b| *b == first).then_some(first)
    }

    /// The stabilizer this tile measures.
    #[must_use]
    pub fn stabilizer(&self) -> PauliString {
        PauliString::from_tile(self)
    }

    #[must_use]
    pub fn after_coordinate_transform(&self, mut transform: impl FnMut(Coord) -> Coord) -> Tile {
        Tile {
            ordered_data_qubits: self.ordered_data_qubits.iter().map(|q| q.map(&mut transform)).collect(),
            bases: self.bases.clone(),
            measurement_qubit: transform(self.measurement_qubit),
        }
    }

    #[must_use]
    pub fn after_basis_transform(&self, transform: impl FnMut(Basis) -> Basis) -> Tile {
        Tile {
            ordered_data_qubits: self.ordered_data_qubits.clone(),
            bases: self.bases.iter().copied().map(transform).collect(),
            measurement_qubit: self.measurement_qubit,
        }
    }

    /// Same tile with the interaction order reversed.
    #[must_use]
    pub fn with_opposite_order(&self) -> Tile {
        Tile {
            ordered_data_qubits: self.ordered_data_qubits.iter().rev().copied().collect(),
            bases: self.bases.iter().rev().copied().collect(),
            measurement_qubit: self.measurement_qubit,
        }
    }
}

/// Building stabilizers out of tiles.
pub trait FromTile {
    fn from_tile(tile: &Tile) -> Self;
}

impl FromTile for PauliString {
    fn from_tile(tile: &Tile) -> Self {
        tile.data_with_bases().collect()
    }
}
