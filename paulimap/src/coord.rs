use std::cmp::Ordering;
use std::fmt::{self, Display};
use std::hash::{Hash, Hasher};
use std::ops::{Add, Mul, Neg, Sub};
use std::str::FromStr;

use crate::PauliParseError;

/// A point of the 2D lattice that qubits live on.
///
/// Data qubits usually sit on integer points and measurement qubits on half-integer points.
/// Coordinates are totally ordered: points with an integer `x` come first, then points are
/// compared by `x` and finally by `y`. Global qubit numbering and tile canonicalization rely on
/// this order.
#[derive(Debug, Copy, Clone, Default)]
pub struct Coord {
    x: f64,
    y: f64,
}

impl Coord {
    pub const ORIGIN: Coord = Coord { x: 0.0, y: 0.0 };

    #[must_use]
    pub fn new(x: f64, y: f64) -> Self {
        debug_assert!(x.is_finite() && y.is_finite());
        Coord {
            x: without_negative_zero(x),
            y: without_negative_zero(y),
        }
    }

    #[must_use]
    pub fn x(&self) -> f64 {
        self.x
    }

    #[must_use]
    pub fn y(&self) -> f64 {
        self.y
    }

    #[must_use]
    pub fn has_integer_x(&self) -> bool {
        self.x.fract() == 0.0
    }

    /// Component-wise minimum.
    #[must_use]
    pub fn min(self, other: Coord) -> Coord {
        Coord::new(self.x.min(other.x), self.y.min(other.y))
    }

    /// Component-wise maximum.
    #[must_use]
    pub fn max(self, other: Coord) -> Coord {
        Coord::new(self.x.max(other.x), self.y.max(other.y))
    }

    /// Midpoint between two coordinates.
    #[must_use]
    pub fn midpoint(self, other: Coord) -> Coord {
        Coord::new((self.x + other.x) / 2.0, (self.y + other.y) / 2.0)
    }
}

fn without_negative_zero(value: f64) -> f64 {
    if value == 0.0 {
        0.0
    } else {
        value
    }
}

impl PartialEq for Coord {
    fn eq(&self, other: &Self) -> bool {
        self.x.to_bits() == other.x.to_bits() && self.y.to_bits() == other.y.to_bits()
    }
}

impl Eq for Coord {}

impl Hash for Coord {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.x.to_bits().hash(state);
        self.y.to_bits().hash(state);
    }
}

impl Ord for Coord {
    fn cmp(&self, other: &Self) -> Ordering {
        (!self.has_integer_x())
            .cmp(&!other.has_integer_x())
            .then_with(|| self.x.total_cmp(&other.x))
            .then_with(|| self.y.total_cmp(&other.y))
    }
}

impl PartialOrd for Coord {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl From<(f64, f64)> for Coord {
    fn from((x, y): (f64, f64)) -> Self {
        Coord::new(x, y)
    }
}

impl From<Coord> for (f64, f64) {
    fn from(coord: Coord) -> Self {
        (coord.x, coord.y)
    }
}

impl Add for Coord {
    type Output = Coord;
    fn add(self, rhs: Coord) -> Coord {
        Coord::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for Coord {
    type Output = Coord;
    fn sub(self, rhs: Coord) -> Coord {
        Coord::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl Neg for Coord {
    type Output = Coord;
    fn neg(self) -> Coord {
        Coord::new(-self.x, -self.y)
    }
}

impl Mul<f64> for Coord {
    type Output = Coord;
    fn mul(self, rhs: f64) -> Coord {
        Coord::new(self.x * rhs, self.y * rhs)
    }
}

impl Display for Coord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

impl FromStr for Coord {
    type Err = PauliParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || PauliParseError::Malformed(s.to_owned());
        let inner = s
            .trim()
            .strip_prefix('(')
            .and_then(|rest| rest.strip_suffix(')'))
            .ok_or_else(malformed)?;
        let (x, y) = inner.split_once(',').ok_or_else(malformed)?;
        let x: f64 = x.trim().parse().map_err(|_| malformed())?;
        let y: f64 = y.trim().parse().map_err(|_| malformed())?;
        if !(x.is_finite() && y.is_finite()) {
            return Err(malformed());
        }
        Ok(Coord::new(x, y))
    }
}
