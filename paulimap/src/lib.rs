//! Pauli operators up to phase over lattice coordinates or integer qubit indices.

mod basis;
mod coord;
pub mod pauli;
pub mod setwise;

#[cfg(feature = "serde")]
mod serde;

pub use basis::Basis;
pub use coord::Coord;
pub use pauli::{PauliMap, PauliString};

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum PauliParseError {
    #[error("unknown Pauli basis {0:?}")]
    UnknownBasis(char),
    #[error("malformed Pauli or coordinate text {0:?}")]
    Malformed(String),
}
