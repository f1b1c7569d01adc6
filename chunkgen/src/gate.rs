//! Supported circuit instructions and the Pauli conjugation rule of every Clifford among them.

use paulimap::Basis;
use std::fmt::{self, Display};
use std::str::FromStr;

use crate::error::{ChunkError, Result};

/// Single qubit Pauli up to phase, `None` being the identity.
pub type LocalPauli = Option<Basis>;

/// Images of X and Z under conjugation by a single qubit Clifford.
type SingleQubitTable = [Basis; 2];

/// Images of X⊗I, Z⊗I, I⊗X and I⊗Z under conjugation by a two qubit Clifford.
type TwoQubitTable = [(LocalPauli, LocalPauli); 4];

const I: LocalPauli = None;
const X: LocalPauli = Some(Basis::X);
const Y: LocalPauli = Some(Basis::Y);
const Z: LocalPauli = Some(Basis::Z);

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Gate {
    QubitCoords,
    Detector,
    ObservableInclude,
    ShiftCoords,
    Tick,

    XError,
    YError,
    ZError,
    Depolarize1,
    Depolarize2,

    R,
    Rx,
    Ry,
    M,
    Mx,
    My,
    Mr,
    Mrx,
    Mry,
    Mpp,

    I,
    X,
    Y,
    Z,
    H,
    Hxy,
    Hyz,
    S,
    SDag,
    SqrtX,
    SqrtXDag,
    SqrtY,
    SqrtYDag,
    Cxyz,
    Czyx,

    Cx,
    Cy,
    Cz,
    Swap,
    ISwap,
    ISwapDag,
    SqrtXx,
    SqrtXxDag,
    SqrtYy,
    SqrtYyDag,
    SqrtZz,
    SqrtZzDag,
    Xcx,
    Xcy,
    Xcz,
    Ycx,
    Ycy,
    Ycz,
}

/// How an instruction acts on its targets.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GateKind {
    /// Coordinates, detectors, observables and time markers.
    Annotation,
    /// Noise channel acting on one qubit per target.
    Noise1,
    /// Noise channel acting on pairs of targets.
    Noise2,
    Reset(Basis),
    Measure(Basis),
    MeasureReset(Basis),
    /// Measurement of Pauli products, one result per product.
    PauliProduct,
    SingleQubitClifford,
    TwoQubitClifford,
}

const ALL_GATES: [Gate; 53] = [
    Gate::QubitCoords,
    Gate::Detector,
    Gate::ObservableInclude,
    Gate::ShiftCoords,
    Gate::Tick,
    Gate::XError,
    Gate::YError,
    Gate::ZError,
    Gate::Depolarize1,
    Gate::Depolarize2,
    Gate::R,
    Gate::Rx,
    Gate::Ry,
    Gate::M,
    Gate::Mx,
    Gate::My,
    Gate::Mr,
    Gate::Mrx,
    Gate::Mry,
    Gate::Mpp,
    Gate::I,
    Gate::X,
    Gate::Y,
    Gate::Z,
    Gate::H,
    Gate::Hxy,
    Gate::Hyz,
    Gate::S,
    Gate::SDag,
    Gate::SqrtX,
    Gate::SqrtXDag,
    Gate::SqrtY,
    Gate::SqrtYDag,
    Gate::Cxyz,
    Gate::Czyx,
    Gate::Cx,
    Gate::Cy,
    Gate::Cz,
    Gate::Swap,
    Gate::ISwap,
    Gate::ISwapDag,
    Gate::SqrtXx,
    Gate::SqrtXxDag,
    Gate::SqrtYy,
    Gate::SqrtYyDag,
    Gate::SqrtZz,
    Gate::SqrtZzDag,
    Gate::Xcx,
    Gate::Xcy,
    Gate::Xcz,
    Gate::Ycx,
    Gate::Ycy,
    Gate::Ycz,
];

impl Gate {
    /// Every supported gate, in declaration order.
    pub fn all() -> impl Iterator<Item = Gate> {
        ALL_GATES.into_iter()
    }

    /// Canonical name used when printing circuits.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Gate::QubitCoords => "QUBIT_COORDS",
            Gate::Detector => "DETECTOR",
            Gate::ObservableInclude => "OBSERVABLE_INCLUDE",
            Gate::ShiftCoords => "SHIFT_COORDS",
            Gate::Tick => "TICK",
            Gate::XError => "X_ERROR",
            Gate::YError => "Y_ERROR",
            Gate::ZError => "Z_ERROR",
            Gate::Depolarize1 => "DEPOLARIZE1",
            Gate::Depolarize2 => "DEPOLARIZE2",
            Gate::R => "R",
            Gate::Rx => "RX",
            Gate::Ry => "RY",
            Gate::M => "M",
            Gate::Mx => "MX",
            Gate::My => "MY",
            Gate::Mr => "MR",
            Gate::Mrx => "MRX",
            Gate::Mry => "MRY",
            Gate::Mpp => "MPP",
            Gate::I => "I",
            Gate::X => "X",
            Gate::Y => "Y",
            Gate::Z => "Z",
            Gate::H => "H",
            Gate::Hxy => "H_XY",
            Gate::Hyz => "H_YZ",
            Gate::S => "S",
            Gate::SDag => "S_DAG",
            Gate::SqrtX => "SQRT_X",
            Gate::SqrtXDag => "SQRT_X_DAG",
            Gate::SqrtY => "SQRT_Y",
            Gate::SqrtYDag => "SQRT_Y_DAG",
            Gate::Cxyz => "C_XYZ",
            Gate::Czyx => "C_ZYX",
            Gate::Cx => "CX",
            Gate::Cy => "CY",
            Gate::Cz => "CZ",
            Gate::Swap => "SWAP",
            Gate::ISwap => "ISWAP",
            Gate::ISwapDag => "ISWAP_DAG",
            Gate::SqrtXx => "SQRT_XX",
            Gate::SqrtXxDag => "SQRT_XX_DAG",
            Gate::SqrtYy => "SQRT_YY",
            Gate::SqrtYyDag => "SQRT_YY_DAG",
            Gate::SqrtZz => "SQRT_ZZ",
            Gate::SqrtZzDag => "SQRT_ZZ_DAG",
            Gate::Xcx => "XCX",
            Gate::Xcy => "XCY",
            Gate::Xcz => "XCZ",
            Gate::Ycx => "YCX",
            Gate::Ycy => "YCY",
            Gate::Ycz => "YCZ",
        }
    }

    /// Looks a gate up by its canonical name or one of its aliases.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Gate> {
        let upper = name.to_ascii_uppercase();
        let canonical = match upper.as_str() {
            "H_XZ" => "H",
            "SQRT_Z" => "S",
            "SQRT_Z_DAG" => "S_DAG",
            "CNOT" | "ZCX" => "CX",
            "ZCY" => "CY",
            "ZCZ" => "CZ",
            "RZ" => "R",
            "MZ" => "M",
            "MRZ" => "MR",
            other => other,
        };
        Gate::all().find(|gate| gate.name() == canonical)
    }

    #[must_use]
    pub fn reset(basis: Basis) -> Gate {
        match basis {
            Basis::X => Gate::Rx,
            Basis::Y => Gate::Ry,
            Basis::Z => Gate::R,
        }
    }

    #[must_use]
    pub fn measure(basis: Basis) -> Gate {
        match basis {
            Basis::X => Gate::Mx,
            Basis::Y => Gate::My,
            Basis::Z => Gate::M,
        }
    }

    #[must_use]
    pub fn measure_reset(basis: Basis) -> Gate {
        match basis {
            Basis::X => Gate::Mrx,
            Basis::Y => Gate::Mry,
            Basis::Z => Gate::Mr,
        }
    }

    #[must_use]
    pub fn kind(self) -> GateKind {
        match self {
            Gate::QubitCoords | Gate::Detector | Gate::ObservableInclude | Gate::ShiftCoords | Gate::Tick => {
                GateKind::Annotation
            }
            Gate::XError | Gate::YError | Gate::ZError | Gate::Depolarize1 => GateKind::Noise1,
            Gate::Depolarize2 => GateKind::Noise2,
            Gate::R => GateKind::Reset(Basis::Z),
            Gate::Rx => GateKind::Reset(Basis::X),
            Gate::Ry => GateKind::Reset(Basis::Y),
            Gate::M => GateKind::Measure(Basis::Z),
            Gate::Mx => GateKind::Measure(Basis::X),
            Gate::My => GateKind::Measure(Basis::Y),
            Gate::Mr => GateKind::MeasureReset(Basis::Z),
            Gate::Mrx => GateKind::MeasureReset(Basis::X),
            Gate::Mry => GateKind::MeasureReset(Basis::Y),
            Gate::Mpp => GateKind::PauliProduct,
            Gate::I
            | Gate::X
            | Gate::Y
            | Gate::Z
            | Gate::H
            | Gate::Hxy
            | Gate::Hyz
            | Gate::S
            | Gate::SDag
            | Gate::SqrtX
            | Gate::SqrtXDag
            | Gate::SqrtY
            | Gate::SqrtYDag
            | Gate::Cxyz
            | Gate::Czyx => GateKind::SingleQubitClifford,
            Gate::Cx
            | Gate::Cy
            | Gate::Cz
            | Gate::Swap
            | Gate::ISwap
            | Gate::ISwapDag
            | Gate::SqrtXx
            | Gate::SqrtXxDag
            | Gate::SqrtYy
            | Gate::SqrtYyDag
            | Gate::SqrtZz
            | Gate::SqrtZzDag
            | Gate::Xcx
            | Gate::Xcy
            | Gate::Xcz
            | Gate::Ycx
            | Gate::Ycy
            | Gate::Ycz => GateKind::TwoQubitClifford,
        }
    }

    #[must_use]
    pub fn is_annotation(self) -> bool {
        self.kind() == GateKind::Annotation
    }

    /// Number of qubit targets the gate consumes per application.
    #[must_use]
    pub fn arity(self) -> usize {
        match self.kind() {
            GateKind::TwoQubitClifford | GateKind::Noise2 => 2,
            _ => 1,
        }
    }

    /// Whether consecutive instructions of this gate with equal arguments merge into one.
    #[must_use]
    pub fn is_fusable(self) -> bool {
        !self.is_annotation()
    }

    #[must_use]
    pub fn produces_measurements(self) -> bool {
        matches!(
            self.kind(),
            GateKind::Measure(_) | GateKind::MeasureReset(_) | GateKind::PauliProduct
        )
    }

    /// The gate undoing this one. Non-unitary gates are returned unchanged.
    #[must_use]
    pub fn inverse(self) -> Gate {
        match self {
            Gate::S => Gate::SDag,
            Gate::SDag => Gate::S,
            Gate::SqrtX => Gate::SqrtXDag,
            Gate::SqrtXDag => Gate::SqrtX,
            Gate::SqrtY => Gate::SqrtYDag,
            Gate::SqrtYDag => Gate::SqrtY,
            Gate::Cxyz => Gate::Czyx,
            Gate::Czyx => Gate::Cxyz,
            Gate::ISwap => Gate::ISwapDag,
            Gate::ISwapDag => Gate::ISwap,
            Gate::SqrtXx => Gate::SqrtXxDag,
            Gate::SqrtXxDag => Gate::SqrtXx,
            Gate::SqrtYy => Gate::SqrtYyDag,
            Gate::SqrtYyDag => Gate::SqrtYy,
            Gate::SqrtZz => Gate::SqrtZzDag,
            Gate::SqrtZzDag => Gate::SqrtZz,
            other => other,
        }
    }

    /// Control and target bases of a controlled Pauli gate, `CX` being `(Z, X)`.
    #[must_use]
    pub fn controlled_bases(self) -> Option<(Basis, Basis)> {
        let bases = match self {
            Gate::Cx => (Basis::Z, Basis::X),
            Gate::Cy => (Basis::Z, Basis::Y),
            Gate::Cz => (Basis::Z, Basis::Z),
            Gate::Xcx => (Basis::X, Basis::X),
            Gate::Xcy => (Basis::X, Basis::Y),
            Gate::Xcz => (Basis::X, Basis::Z),
            Gate::Ycx => (Basis::Y, Basis::X),
            Gate::Ycy => (Basis::Y, Basis::Y),
            Gate::Ycz => (Basis::Y, Basis::Z),
            _ => return None,
        };
        Some(bases)
    }

    fn single_qubit_table(self) -> Option<SingleQubitTable> {
        let table = match self {
            Gate::I | Gate::X | Gate::Y | Gate::Z => [Basis::X, Basis::Z],
            Gate::H | Gate::SqrtY | Gate::SqrtYDag => [Basis::Z, Basis::X],
            Gate::Hxy | Gate::S | Gate::SDag => [Basis::Y, Basis::Z],
            Gate::Hyz | Gate::SqrtX | Gate::SqrtXDag => [Basis::X, Basis::Y],
            Gate::Cxyz => [Basis::Y, Basis::X],
            Gate::Czyx => [Basis::Z, Basis::Y],
            _ => return None,
        };
        Some(table)
    }

    fn two_qubit_table(self) -> Option<TwoQubitTable> {
        let table = match self {
            Gate::Cx => [(X, X), (Z, I), (I, X), (Z, Z)],
            Gate::Cy => [(X, Y), (Z, I), (Z, X), (Z, Z)],
            Gate::Cz => [(X, Z), (Z, I), (Z, X), (I, Z)],
            Gate::Swap => [(I, X), (I, Z), (X, I), (Z, I)],
            Gate::ISwap | Gate::ISwapDag => [(Z, Y), (I, Z), (Y, Z), (Z, I)],
            Gate::SqrtXx | Gate::SqrtXxDag => [(X, I), (Y, X), (I, X), (X, Y)],
            Gate::SqrtYy | Gate::SqrtYyDag => [(Z, Y), (X, Y), (Y, Z), (Y, X)],
            Gate::SqrtZz | Gate::SqrtZzDag => [(Y, Z), (Z, I), (Z, Y), (I, Z)],
            Gate::Xcx => [(X, I), (Z, X), (I, X), (X, Z)],
            Gate::Xcy => [(X, I), (Z, Y), (X, X), (X, Z)],
            Gate::Xcz => [(X, I), (Z, Z), (X, X), (I, Z)],
            Gate::Ycx => [(X, X), (Z, X), (I, X), (Y, Z)],
            Gate::Ycy => [(X, Y), (Z, Y), (Y, X), (Y, Z)],
            Gate::Ycz => [(X, Z), (Z, Z), (Y, X), (I, Z)],
            _ => return None,
        };
        Some(table)
    }

    /// Conjugates a single qubit Pauli by this gate, `gate · P · gate†`, ignoring sign.
    ///
    /// Returns `None` when the gate is not a single qubit Clifford.
    #[must_use]
    pub fn conjugate(self, pauli: Basis) -> Option<Basis> {
        let [x_image, z_image] = self.single_qubit_table()?;
        let mut result = None;
        if pauli.has_x() {
            result = Basis::product(result, Some(x_image));
        }
        if pauli.has_z() {
            result = Basis::product(result, Some(z_image));
        }
        result
    }

    /// Conjugates a two qubit Pauli by this gate, ignoring sign.
    ///
    /// Returns `None` when the gate is not a two qubit Clifford.
    #[must_use]
    pub fn conjugate_pair(self, first: LocalPauli, second: LocalPauli) -> Option<(LocalPauli, LocalPauli)> {
        let table = self.two_qubit_table()?;
        let mut result = (None, None);
        let mut multiply = |image: (LocalPauli, LocalPauli)| {
            result = (Basis::product(result.0, image.0), Basis::product(result.1, image.1));
        };
        if let Some(first) = first {
            if first.has_x() {
                multiply(table[0]);
            }
            if first.has_z() {
                multiply(table[1]);
            }
        }
        if let Some(second) = second {
            if second.has_x() {
                multiply(table[2]);
            }
            if second.has_z() {
                multiply(table[3]);
            }
        }
        Some(result)
    }
}

impl Display for Gate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Gate {
    type Err = ChunkError;

    fn from_str(s: &str) -> Result<Self> {
        Gate::from_name(s.trim()).ok_or_else(|| ChunkError::UnknownGate(s.trim().to_owned()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn anticommute(a: (LocalPauli, LocalPauli), b: (LocalPauli, LocalPauli)) -> bool {
        let clash = |p: LocalPauli, q: LocalPauli| matches!((p, q), (Some(p), Some(q)) if p != q);
        clash(a.0, b.0) ^ clash(a.1, b.1)
    }

    #[test]
    fn names_round_trip() {
        assert_eq!(Gate::all().count(), 53);
        for gate in Gate::all() {
            assert_eq!(gate.name().parse::<Gate>(), Ok(gate));
        }
        assert_eq!("CNOT".parse::<Gate>(), Ok(Gate::Cx));
        assert_eq!("sqrt_z".parse::<Gate>(), Ok(Gate::S));
        assert_eq!("MRZ".parse::<Gate>(), Ok(Gate::Mr));
        assert_eq!("NOT_A_GATE".parse::<Gate>(), Err(ChunkError::UnknownGate("NOT_A_GATE".into())));
    }

    #[test]
    fn single_qubit_tables_preserve_commutation() {
        for gate in Gate::all().filter(|g| g.kind() == GateKind::SingleQubitClifford) {
            let x = gate.conjugate(Basis::X).unwrap();
            let z = gate.conjugate(Basis::Z).unwrap();
            assert_ne!(x, z, "{gate}");
        }
    }

    #[test]
    fn two_qubit_tables_preserve_commutation() {
        let generators = [(X, I), (Z, I), (I, X), (I, Z)];
        for gate in Gate::all().filter(|g| g.kind() == GateKind::TwoQubitClifford) {
            let images: Vec<_> = generators
                .iter()
                .map(|(a, b)| gate.conjugate_pair(*a, *b).unwrap())
                .collect();
            for i in 0..4 {
                for j in 0..4 {
                    assert_eq!(
                        anticommute(images[i], images[j]),
                        anticommute(generators[i], generators[j]),
                        "{gate} generators {i} {j}"
                    );
                }
            }
        }
    }

    #[test]
    fn inverse_undoes_conjugation() {
        for gate in Gate::all().filter(|g| g.kind() == GateKind::SingleQubitClifford) {
            for basis in Basis::ALL {
                let image = gate.conjugate(basis).unwrap();
                assert_eq!(gate.inverse().conjugate(image), Some(basis), "{gate}");
            }
        }
        for gate in Gate::all().filter(|g| g.kind() == GateKind::TwoQubitClifford) {
            for a in [I, X, Y, Z] {
                for b in [I, X, Y, Z] {
                    let (c, d) = gate.conjugate_pair(a, b).unwrap();
                    assert_eq!(gate.inverse().conjugate_pair(c, d), Some((a, b)), "{gate}");
                }
            }
        }
    }

    #[test]
    fn textbook_rules() {
        assert_eq!(Gate::H.conjugate(Basis::X), Some(Basis::Z));
        assert_eq!(Gate::S.conjugate(Basis::Y), Some(Basis::X));
        assert_eq!(Gate::Cxyz.conjugate(Basis::Y), Some(Basis::Z));
        assert_eq!(Gate::Cx.conjugate_pair(X, I), Some((X, X)));
        assert_eq!(Gate::Cx.conjugate_pair(I, Z), Some((Z, Z)));
        assert_eq!(Gate::Cz.conjugate_pair(X, I), Some((X, Z)));
        assert_eq!(Gate::Swap.conjugate_pair(Y, Z), Some((Z, Y)));
    }
}
