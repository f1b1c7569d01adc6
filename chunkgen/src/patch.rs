use paulimap::{Basis, Coord};
use std::collections::BTreeSet;

use crate::tile::Tile;

/// A layer of stabilizer tiles, kept sorted by measurement qubit so equal layouts compare equal
/// regardless of construction order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Patch {
    tiles: Vec<Tile>,
    used_set: BTreeSet<Coord>,
    data_set: BTreeSet<Coord>,
    measure_set: BTreeSet<Coord>,
}

impl Patch {
    #[must_use]
    pub fn new(tiles: impl IntoIterator<Item = Tile>) -> Self {
        let mut tiles: Vec<Tile> = tiles.into_iter().collect();
        tiles.sort_by_key(Tile::measurement_qubit);
        let data_set: BTreeSet<Coord> = tiles.iter().flat_map(Tile::data_qubits).collect();
        let measure_set: BTreeSet<Coord> = tiles.iter().map(Tile::measurement_qubit).collect();
        let used_set = data_set.union(&measure_set).copied().collect();
        Patch {
            tiles,
            used_set,
            data_set,
            measure_set,
        }
    }

    #[must_use]
    pub fn tiles(&self) -> &[Tile] {
        &self.tiles
    }

    #[must_use]
    pub fn used_set(&self) -> &BTreeSet<Coord> {
        &self.used_set
    }

    #[must_use]
    pub fn data_set(&self) -> &BTreeSet<Coord> {
        &self.data_set
    }

    #[must_use]
    pub fn measure_set(&self) -> &BTreeSet<Coord> {
        &self.measure_set
    }

    /// Tiles whose data qubits all use `basis`.
    pub fn tiles_with_basis(&self, basis: Basis) -> impl Iterator<Item = &Tile> + '_ {
        self.tiles.iter().filter(move |tile| tile.basis() == Some(basis))
    }

    #[must_use]
    pub fn after_coordinate_transform(&self, mut transform: impl FnMut(Coord) -> Coord) -> Patch {
        Patch::new(self.tiles.iter().map(|tile| tile.after_coordinate_transform(&mut transform)))
    }

    #[must_use]
    pub fn after_basis_transform(&self, mut transform: impl FnMut(Basis) -> Basis) -> Patch {
        Patch::new(self.tiles.iter().map(|tile| tile.after_basis_transform(&mut transform)))
    }

    #[must_use]
    pub fn with_opposite_order(&self) -> Patch {
        Patch::new(self.tiles.iter().map(Tile::with_opposite_order))
    }

    /// Smallest axis-aligned box containing every used qubit and every extra coordinate, as
    /// `(min corner, max corner)`. `None` for an empty patch with no extras.
    #[must_use]
    pub fn bounding_box(&self, extra: impl IntoIterator<Item = Coord>) -> Option<(Coord, Coord)> {
        self.used_set
            .iter()
            .copied()
            .chain(extra)
            .fold(None, |bounds, q| match bounds {
                None => Some((q, q)),
                Some((low, high)) => Some((low.min(q), high.max(q))),
            })
    }
}
