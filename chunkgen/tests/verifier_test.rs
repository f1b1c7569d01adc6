use chunkgen::gate::GateKind;
use chunkgen::{Chunk, ChunkError, Circuit, Coord, Flow, FlowStabilizerVerifier, Gate, PauliString};
use proptest::prelude::*;
use std::collections::{BTreeMap, BTreeSet};

/// Qubit `k` sits at `(k, 0)`.
fn line_q2i(count: usize) -> BTreeMap<Coord, usize> {
    (0..count).map(|k| (Coord::new(k as f64, 0.0), k)).collect()
}

/// Qubit `k` sits at `(0, k)`.
fn column_q2i(count: usize) -> BTreeMap<Coord, usize> {
    (0..count).map(|k| (Coord::new(0.0, k as f64), k)).collect()
}

/// Pauli string over the line layout, e.g. `"X_YZ"`.
fn dense(text: &str) -> PauliString {
    PauliString::from_dense(text).unwrap()
}

fn through(start: PauliString, end: PauliString) -> Flow {
    Flow::builder(Coord::ORIGIN).start(start).end(end).allow_vacuous().build().unwrap()
}

fn single_flow_chunk(circuit: &str, q2i: BTreeMap<Coord, usize>, flow: Flow) -> Chunk {
    Chunk::new(circuit.parse().unwrap(), q2i, vec![flow])
}

#[test]
fn hadamard_swaps_x_and_z() {
    let q = Coord::new(0.0, 1.0);
    let q2i: BTreeMap<Coord, usize> = [(q, 0)].into();
    let x: PauliString = format!("X{q}").parse().unwrap();
    let z: PauliString = format!("Z{q}").parse().unwrap();
    let y: PauliString = format!("Y{q}").parse().unwrap();
    single_flow_chunk("H 0", q2i.clone(), through(x.clone(), z)).verify().unwrap();
    let error = single_flow_chunk("H 0", q2i, through(x, y)).verify().unwrap_err();
    assert!(matches!(error, ChunkError::FlowMismatch { .. }), "{error}");
}

#[test]
fn reset_prepares_but_does_not_absorb_forward() {
    let q = Coord::new(0.0, 1.0);
    let q2i: BTreeMap<Coord, usize> = [(q, 0)].into();
    let z: PauliString = format!("Z{q}").parse().unwrap();
    let consumed = Flow::builder(Coord::ORIGIN).start(z.clone()).build().unwrap();
    assert!(single_flow_chunk("R 0", q2i.clone(), consumed).verify().is_err());
    let prepared = Flow::builder(Coord::ORIGIN).end(z).build().unwrap();
    single_flow_chunk("R 0", q2i, prepared).verify().unwrap();
}

#[test]
fn measurement_bridges_before_and_after() {
    let q2i = column_q2i(4);
    let flows = vec![
        Flow::builder(Coord::ORIGIN)
            .start("Z(0, 0)*Z(0, 2)".parse().unwrap())
            .measurements([0])
            .build()
            .unwrap(),
        Flow::builder(Coord::ORIGIN)
            .end("X(0, 0)*Z(0, 2)".parse().unwrap())
            .measurements([0])
            .build()
            .unwrap(),
    ];
    let chunk = Chunk::new("R 1\nCX 0 1 2 1\nM 1 3\nH 0".parse().unwrap(), q2i, flows);
    let verifier = chunk.verify().unwrap();
    assert_eq!(verifier.measurement_to_flow_indices().get(&0), Some(&vec![0, 1]));
}

#[test]
fn pauli_product_measurements() {
    let q2i = column_q2i(4);
    let end: PauliString = "X(0, 0)*Y(0, 1)*Z(0, 2)".parse().unwrap();
    let flow = Flow::builder(Coord::ORIGIN).end(end).measurements([0]).build().unwrap();
    single_flow_chunk("MPP X0*Y1*Z2", q2i.clone(), flow.clone()).verify().unwrap();

    let error = single_flow_chunk("MPP X0*Y1*Z2\nMPP X0*X1*Z2", q2i, flow).verify().unwrap_err();
    assert!(matches!(error, ChunkError::AnticommutedWithMpp { measurement: 1, .. }));
    assert!(error.to_string().starts_with("Anticommuted with MPP"));
}

#[test]
fn single_qubit_cliffords() {
    let cases = [
        ("C_XYZ 0 1 2", "XYZ", "YZX"),
        ("C_ZYX 0 1 2", "XYZ", "ZXY"),
        ("S 0 1 2", "XYZ", "YXZ"),
        ("S_DAG 0 1 2", "XYZ", "YXZ"),
        ("H_XY 0 1 2", "XYZ", "YXZ"),
        ("SQRT_X 0 1 2", "XYZ", "XZY"),
        ("SQRT_X_DAG 0 1 2", "XYZ", "XZY"),
        ("H_YZ 0 1 2", "XYZ", "XZY"),
    ];
    for (circuit, start, end) in cases {
        let chunk = single_flow_chunk(circuit, line_q2i(3), through(dense(start), dense(end)));
        chunk.verify().unwrap_or_else(|error| panic!("{circuit}: {error}"));
    }
}

#[test]
fn two_qubit_cliffords() {
    let cases = [
        ("CY 0 1 2 3 4 5", "XYYYZ_", "X_Y_Z_"),
        ("CY 0 1 2 3 4 5", "X_Y_Z_", "XYYYZ_"),
        ("CY 0 1 2 3 4 5", "XXYXZX", "YZXZ_X"),
        ("SWAP 0 1 2 3 4 5", "X_YYZY", "_XYYYZ"),
        ("XCY 0 1 2 3 4 5", "X_YYZY", "X_Y_Z_"),
        ("YCX 1 0 3 2 5 4", "X_YYZY", "X_Y_Z_"),
        ("XCY 0 1 2 3 4 5", "X_Y_Z_", "X_YYZY"),
        ("XCY 0 1 2 3 4 5", "XXYXZX", "_XZZYZ"),
    ];
    for (circuit, start, end) in cases {
        let chunk = single_flow_chunk(circuit, line_q2i(6), through(dense(start), dense(end)));
        chunk.verify().unwrap_or_else(|error| panic!("{circuit}: {start} -> {end}: {error}"));
    }
}

#[test]
fn reset_analysis_and_inversion() {
    let flow = Flow::builder(Coord::ORIGIN)
        .end(dense("_Z"))
        .measurements([0])
        .build()
        .unwrap();
    let chunk = single_flow_chunk("R 0 1 2 3 4\nCX 2 0\nM 0", line_q2i(5), flow);
    let verifier = FlowStabilizerVerifier::verify(&chunk).unwrap();
    let expected: BTreeMap<usize, Vec<usize>> = [(2, vec![0]), (3, vec![0]), (4, vec![0])].into();
    assert_eq!(verifier.reset_to_flow_indices(), &expected);

    let inverted = FlowStabilizerVerifier::invert(&chunk).unwrap();
    inverted.verify().unwrap();
    assert_eq!(inverted.flows().len(), chunk.flows().len());
    assert_eq!(inverted.circuit(), &"R 0\nCX 2 0\nM 4 3 2 1 0".parse::<Circuit>().unwrap());
}

#[test]
fn flows_must_stay_inside_the_chunk() {
    let flow = Flow::builder(Coord::ORIGIN).end(dense("__Z")).build().unwrap();
    let error = single_flow_chunk("R 0", line_q2i(1), flow).verify().unwrap_err();
    assert!(matches!(error, ChunkError::UnknownQubit { flow: 0, .. }));

    let flow = Flow::builder(Coord::ORIGIN).end(dense("Z")).measurements([1]).build().unwrap();
    let error = single_flow_chunk("M 0", line_q2i(1), flow).verify().unwrap_err();
    assert!(matches!(
        error,
        ChunkError::MeasurementOutOfRange {
            measurement: 1,
            count: 1,
            ..
        }
    ));
}

fn clifford_gates() -> Vec<Gate> {
    Gate::all()
        .filter(|gate| matches!(gate.kind(), GateKind::SingleQubitClifford | GateKind::TwoQubitClifford))
        .collect()
}

#[test]
fn every_clifford_is_undone_by_its_inverse() {
    for gate in clifford_gates() {
        let arity = gate.arity();
        let targets = (0..arity).map(|k| k.to_string()).collect::<Vec<_>>().join(" ");
        let circuit = format!("{gate} {targets}\n{} {targets}", gate.inverse());
        for start in ["X", "Z", "Y", "XX", "ZY", "_Y", "YZ"] {
            if start.len() > arity {
                continue;
            }
            let chunk = single_flow_chunk(&circuit, line_q2i(arity), through(dense(start), dense(start)));
            chunk.verify().unwrap_or_else(|error| panic!("{circuit}: {error}"));
        }
    }
}

/// Conjugation images of X and Z on every operand, one dense Pauli per generator, signs dropped.
const CLIFFORD_IMAGES: &[(&str, &[(&str, &str)])] = &[
    ("I", &[("X", "X"), ("Z", "Z")]),
    ("X", &[("X", "X"), ("Z", "Z")]),
    ("Y", &[("X", "X"), ("Z", "Z")]),
    ("Z", &[("X", "X"), ("Z", "Z")]),
    ("H", &[("X", "Z"), ("Z", "X")]),
    ("H_XY", &[("X", "Y"), ("Z", "Z")]),
    ("H_YZ", &[("X", "X"), ("Z", "Y")]),
    ("S", &[("X", "Y"), ("Z", "Z")]),
    ("S_DAG", &[("X", "Y"), ("Z", "Z")]),
    ("SQRT_X", &[("X", "X"), ("Z", "Y")]),
    ("SQRT_X_DAG", &[("X", "X"), ("Z", "Y")]),
    ("SQRT_Y", &[("X", "Z"), ("Z", "X")]),
    ("SQRT_Y_DAG", &[("X", "Z"), ("Z", "X")]),
    ("C_XYZ", &[("X", "Y"), ("Z", "X")]),
    ("C_ZYX", &[("X", "Z"), ("Z", "Y")]),
    ("CX", &[("X_", "XX"), ("Z_", "Z_"), ("_X", "_X"), ("_Z", "ZZ")]),
    ("CY", &[("X_", "XY"), ("Z_", "Z_"), ("_X", "ZX"), ("_Z", "ZZ")]),
    ("CZ", &[("X_", "XZ"), ("Z_", "Z_"), ("_X", "ZX"), ("_Z", "_Z")]),
    ("SWAP", &[("X_", "_X"), ("Z_", "_Z"), ("_X", "X_"), ("_Z", "Z_")]),
    ("ISWAP", &[("X_", "ZY"), ("Z_", "_Z"), ("_X", "YZ"), ("_Z", "Z_")]),
    ("ISWAP_DAG", &[("X_", "ZY"), ("Z_", "_Z"), ("_X", "YZ"), ("_Z", "Z_")]),
    ("SQRT_XX", &[("X_", "X_"), ("Z_", "YX"), ("_X", "_X"), ("_Z", "XY")]),
    ("SQRT_XX_DAG", &[("X_", "X_"), ("Z_", "YX"), ("_X", "_X"), ("_Z", "XY")]),
    ("SQRT_YY", &[("X_", "ZY"), ("Z_", "XY"), ("_X", "YZ"), ("_Z", "YX")]),
    ("SQRT_YY_DAG", &[("X_", "ZY"), ("Z_", "XY"), ("_X", "YZ"), ("_Z", "YX")]),
    ("SQRT_ZZ", &[("X_", "YZ"), ("Z_", "Z_"), ("_X", "ZY"), ("_Z", "_Z")]),
    ("SQRT_ZZ_DAG", &[("X_", "YZ"), ("Z_", "Z_"), ("_X", "ZY"), ("_Z", "_Z")]),
    ("XCX", &[("X_", "X_"), ("Z_", "ZX"), ("_X", "_X"), ("_Z", "XZ")]),
    ("XCY", &[("X_", "X_"), ("Z_", "ZY"), ("_X", "XX"), ("_Z", "XZ")]),
    ("XCZ", &[("X_", "X_"), ("Z_", "ZZ"), ("_X", "XX"), ("_Z", "_Z")]),
    ("YCX", &[("X_", "XX"), ("Z_", "ZX"), ("_X", "_X"), ("_Z", "YZ")]),
    ("YCY", &[("X_", "XY"), ("Z_", "ZY"), ("_X", "YX"), ("_Z", "YZ")]),
    ("YCZ", &[("X_", "XZ"), ("Z_", "ZZ"), ("_X", "YX"), ("_Z", "_Z")]),
];

#[test]
fn cliffords_map_every_pauli_to_its_known_image() {
    let named: BTreeSet<Gate> = CLIFFORD_IMAGES.iter().map(|(name, _)| name.parse().unwrap()).collect();
    assert_eq!(named, clifford_gates().into_iter().collect());

    for (name, images) in CLIFFORD_IMAGES {
        let arity = images[0].0.len();
        let targets = (0..arity).map(|k| k.to_string()).collect::<Vec<_>>().join(" ");
        let circuit = format!("{name} {targets}");
        for subset in 1..1usize << images.len() {
            let mut start = PauliString::new();
            let mut end = PauliString::new();
            for (k, (generator, image)) in images.iter().enumerate() {
                if (subset >> k) & 1 == 1 {
                    start *= &dense(generator);
                    end *= &dense(image);
                }
            }
            let flow = through(start.clone(), end.clone());
            let chunk = single_flow_chunk(&circuit, line_q2i(arity), flow);
            chunk.verify().unwrap_or_else(|error| panic!("{circuit}: {start} -> {end}: {error}"));
            let inverted = chunk.inverted().unwrap();
            inverted.verify().unwrap_or_else(|error| panic!("inverse of {circuit}: {end} -> {start}: {error}"));
        }
    }
}

fn random_circuit(max_qubits: usize) -> impl Strategy<Value = Vec<(Gate, Vec<usize>)>> {
    let gates = clifford_gates();
    let qubits: Vec<usize> = (0..max_qubits).collect();
    let step = (prop::sample::select(gates), Just(qubits).prop_shuffle());
    prop::collection::vec(step, 1..12).prop_map(|steps| {
        steps
            .into_iter()
            .map(|(gate, qubits)| (gate, qubits[..gate.arity()].to_vec()))
            .collect()
    })
}

fn render(steps: impl Iterator<Item = (Gate, Vec<usize>)>) -> String {
    steps
        .map(|(gate, qubits)| {
            let targets: Vec<String> = qubits.iter().map(ToString::to_string).collect();
            format!("{gate} {}\n", targets.join(" "))
        })
        .collect()
}

proptest! {
    #[test]
    fn circuit_followed_by_its_mirror_preserves_paulis(
        steps in random_circuit(4),
        start in "[_XYZ]{4}",
    ) {
        let forward = render(steps.clone().into_iter());
        let backward = render(steps.into_iter().rev().map(|(gate, qubits)| (gate.inverse(), qubits)));
        let pauli = dense(&start);
        let chunk = single_flow_chunk(&(forward + &backward), line_q2i(4), through(pauli.clone(), pauli));
        prop_assert!(chunk.verify().is_ok());
    }

    #[test]
    fn inverted_mirror_circuits_still_verify(steps in random_circuit(3), start in "[XYZ]{3}") {
        let forward = render(steps.clone().into_iter());
        let backward = render(steps.into_iter().rev().map(|(gate, qubits)| (gate.inverse(), qubits)));
        let pauli = dense(&start);
        let chunk = single_flow_chunk(&(forward + &backward), line_q2i(3), through(pauli.clone(), pauli.clone()));
        let inverted = chunk.inverted().unwrap();
        prop_assert!(inverted.verify().is_ok());
        prop_assert_eq!(inverted.flows()[0].start(), Some(&pauli));
    }
}
