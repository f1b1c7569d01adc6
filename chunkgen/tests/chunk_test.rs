use chunkgen::surface_code::memory_experiment_chunks;
use chunkgen::{
    compile_chunks_into_circuit, standard_surface_code_chunk, surface_code_patch, Basis, Chunk, Coord, DataBasis,
    Flow, Operation, PauliString, VerifyOptions,
};
use std::collections::{BTreeMap, BTreeSet};

fn left_column_x() -> PauliString {
    (0..3).map(|y| (Coord::new(0.0, f64::from(y)), Basis::X)).collect()
}

fn round(init: &DataBasis, measure: &DataBasis) -> Chunk {
    let patch = surface_code_patch(3).unwrap();
    standard_surface_code_chunk(&patch, init, measure, Some(&left_column_x())).unwrap()
}

fn boundaries(chunk: &Chunk) -> BTreeSet<(Option<PauliString>, Option<PauliString>)> {
    chunk
        .flows()
        .iter()
        .map(|flow| (flow.start().cloned(), flow.end().cloned()))
        .collect()
}

#[test]
fn inverted_round_verifies_with_swapped_boundaries() {
    let chunk = round(&DataBasis::None, &DataBasis::None);
    let inverted = chunk.inverted().unwrap();
    inverted.verify().unwrap();
    assert_eq!(inverted.flows().len(), chunk.flows().len());
    for (flow, reversed) in chunk.flows().iter().zip(inverted.flows()) {
        assert_eq!(flow.start(), reversed.end());
        assert_eq!(flow.end(), reversed.start());
        assert_eq!(flow.center(), reversed.center());
    }
    assert_eq!(inverted.circuit().num_measurements(), chunk.circuit().num_measurements());

    let twice = inverted.inverted().unwrap();
    twice.verify().unwrap();
    assert_eq!(boundaries(&twice), boundaries(&chunk));
}

#[test]
fn inverting_swaps_discarded_stabilizers() {
    let corner: BTreeMap<Coord, Basis> = [(Coord::ORIGIN, Basis::X)].into();
    let chunk = round(&corner.into(), &DataBasis::None);
    assert_eq!(chunk.discarded_inputs().len(), 1);
    let inverted = chunk.inverted().unwrap();
    assert_eq!(inverted.discarded_inputs(), chunk.discarded_outputs());
    assert_eq!(inverted.discarded_outputs(), chunk.discarded_inputs());
    inverted.verify().unwrap();
}

#[test]
fn measurement_that_a_flow_passes_through_stays_a_measurement() {
    let z = |x: f64| PauliString::from([(Coord::new(x, 0.0), Basis::Z)]);
    let flows = vec![
        Flow::builder(Coord::ORIGIN).start(z(0.0)).end(z(0.0)).build().unwrap(),
        Flow::builder(Coord::ORIGIN).end(z(1.0)).measurements([1]).build().unwrap(),
    ];
    let chunk = Chunk::new(
        "M 0 1".parse().unwrap(),
        [(Coord::new(0.0, 0.0), 0), (Coord::new(1.0, 0.0), 1)].into(),
        flows,
    );
    let verifier = chunk.verify().unwrap();
    assert!(verifier.surviving_measurements().contains(&0));
    let inverted = chunk.inverted().unwrap();
    assert_eq!(inverted.circuit().to_string(), "M 1 0\n");
    inverted.verify().unwrap();
}

#[test]
fn repeated_rounds_compile_between_boundaries() {
    let x = DataBasis::Uniform(Basis::X);
    let middle = round(&DataBasis::None, &DataBasis::None).with_repetitions(3).unwrap();
    middle.verify().unwrap();
    assert_eq!(middle.circuit().num_measurements(), 3 * 8);

    let chunks = [round(&x, &DataBasis::None), middle, round(&DataBasis::None, &x)];
    let circuit = compile_chunks_into_circuit(&chunks).unwrap();
    assert_eq!(circuit.num_detectors(), 4 + 3 * 8 + 12);
}

#[test]
fn repeated_rounds_compile_like_unrolled_rounds() {
    let x = DataBasis::Uniform(Basis::X);
    let first = round(&x, &DataBasis::None);
    let middle = round(&DataBasis::None, &DataBasis::None);
    let last = round(&DataBasis::None, &x);

    let looped =
        compile_chunks_into_circuit(&[first.clone(), middle.with_repetitions(3).unwrap(), last.clone()]).unwrap();
    let unrolled = compile_chunks_into_circuit(&[first, middle.clone(), middle.clone(), middle, last]).unwrap();
    let Some(Operation::Repeat { body, .. }) =
        looped.operations().iter().find(|op| matches!(op, Operation::Repeat { .. }))
    else {
        panic!("no REPEAT block in\n{looped}");
    };
    assert_eq!(body.num_detectors(), 8);
    assert!(body.to_string().contains("SHIFT_COORDS(0, 0, 1)"));

    assert_eq!(looped.num_measurements(), unrolled.num_measurements());
    assert_eq!(looped.detectors(), unrolled.detectors());
    assert_eq!(looped.observables(), unrolled.observables());
    assert_eq!(looped.flattened(), unrolled.flattened());
}

#[test]
fn memory_experiment_has_no_dangling_operations_in_the_bulk() {
    let chunks = memory_experiment_chunks(3, Basis::Z, 3).unwrap();
    let strict = VerifyOptions { forbid_dangling: true };
    chunks[1].verify_with(&strict).unwrap();
    for chunk in &chunks {
        chunk.verify().unwrap();
    }
}

#[test]
fn patches_at_chunk_boundaries() {
    let chunk = round(&DataBasis::None, &DataBasis::None);
    let patch = surface_code_patch(3).unwrap();
    assert_eq!(chunk.end_patch().tiles().len(), patch.tiles().len());
    assert_eq!(chunk.start_patch().used_set(), patch.used_set());
    assert_eq!(chunk.end_patch().used_set(), chunk.start_patch().used_set());

    let last = round(&DataBasis::None, &Basis::X.into());
    assert!(last.end_patch().tiles().is_empty());
}
