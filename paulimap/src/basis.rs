use derive_more::Display;
use std::str::FromStr;

use crate::PauliParseError;

/// Non-identity single qubit Pauli matrices. Absence from a [`crate::PauliMap`] is the identity.
///
/// The discriminant packs the symplectic representation: bit 0 is the X part, bit 1 the Z part,
/// so multiplying two bases up to phase is a XOR of discriminants.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Display, Copy, Clone, PartialEq, PartialOrd, Eq, Ord, Hash)]
pub enum Basis {
    /// Pauli X
    /// ```text
    /// |0 1|
    /// |1 0|
    /// ```
    X = 0b01,

    /// Pauli Y
    /// ```text
    /// |0 -i|
    /// |i  0|
    /// ```
    Y = 0b11,

    /// Pauli Z
    /// ```text
    /// |1  0|
    /// |0 -1|
    /// ```
    Z = 0b10,
}

impl Basis {
    pub const ALL: [Basis; 3] = [Basis::X, Basis::Y, Basis::Z];

    /// Builds a basis from its symplectic bits, `None` standing for the identity.
    #[must_use]
    pub fn from_bits(x: bool, z: bool) -> Option<Basis> {
        match (x, z) {
            (false, false) => None,
            (true, false) => Some(Basis::X),
            (true, true) => Some(Basis::Y),
            (false, true) => Some(Basis::Z),
        }
    }

    #[must_use]
    pub fn has_x(self) -> bool {
        (self as u8) & 0b01 != 0
    }

    #[must_use]
    pub fn has_z(self) -> bool {
        (self as u8) & 0b10 != 0
    }

    /// Single qubit product with the phase dropped.
    #[must_use]
    pub fn product(left: Option<Basis>, right: Option<Basis>) -> Option<Basis> {
        let bits = left.map_or(0, |b| b as u8) ^ right.map_or(0, |b| b as u8);
        Basis::from_bits(bits & 0b01 != 0, bits & 0b10 != 0)
    }

    /// Two distinct non-identity Paulis on the same qubit always anticommute.
    #[must_use]
    pub fn anticommutes_with(self, other: Basis) -> bool {
        self != other
    }

    #[must_use]
    pub fn xz_flipped(self) -> Basis {
        match self {
            Basis::X => Basis::Z,
            Basis::Y => Basis::Y,
            Basis::Z => Basis::X,
        }
    }
}

impl TryFrom<char> for Basis {
    type Error = PauliParseError;

    fn try_from(character: char) -> Result<Self, Self::Error> {
        match character {
            'X' | 'x' => Ok(Basis::X),
            'Y' | 'y' => Ok(Basis::Y),
            'Z' | 'z' => Ok(Basis::Z),
            other => Err(PauliParseError::UnknownBasis(other)),
        }
    }
}

impl FromStr for Basis {
    type Err = PauliParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut characters = s.trim().chars();
        match (characters.next(), characters.next()) {
            (Some(character), None) => Basis::try_from(character),
            _ => Err(PauliParseError::Malformed(s.to_owned())),
        }
    }
}
