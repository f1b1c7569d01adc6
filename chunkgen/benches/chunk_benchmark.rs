//! Criterion benchmarks for chunk verification and compilation.

use chunkgen::gate::GateKind;
use chunkgen::surface_code::memory_experiment_chunks;
use chunkgen::{compile_chunks_into_circuit, Basis, Chunk, Coord, Flow, Gate, NoiseModel, PauliString};
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use std::fmt::Write;

const SEED: u64 = 42;
const DISTANCES: [usize; 3] = [3, 5, 9];

/// A random Clifford circuit followed by its inverse, with one flow carrying a random Pauli through it.
fn mirrored_clifford_chunk(qubits: usize, layers: usize, rng: &mut StdRng) -> Chunk {
    let gates: Vec<Gate> = Gate::all()
        .filter(|gate| matches!(gate.kind(), GateKind::SingleQubitClifford | GateKind::TwoQubitClifford))
        .collect();
    let mut steps = Vec::with_capacity(layers);
    let mut order: Vec<usize> = (0..qubits).collect();
    for _ in 0..layers {
        let gate = *gates.choose(rng).expect("Clifford gates exist");
        order.shuffle(rng);
        steps.push((gate, order[..gate.arity()].to_vec()));
    }
    let mut text = String::new();
    let forward = steps.iter().map(|(gate, targets)| (*gate, targets));
    let backward = steps.iter().rev().map(|(gate, targets)| (gate.inverse(), targets));
    for (gate, targets) in forward.chain(backward) {
        write!(text, "{gate}").expect("Writing to a string");
        for target in targets {
            write!(text, " {target}").expect("Writing to a string");
        }
        text.push('\n');
    }

    let q2i = (0..qubits).map(|k| (Coord::new(k as f64, 0.0), k)).collect();
    let pauli: PauliString = (0..qubits)
        .map(|k| (Coord::new(k as f64, 0.0), Basis::ALL[rng.gen_range(0..3)]))
        .collect();
    let flow = Flow::builder(Coord::ORIGIN)
        .start(pauli.clone())
        .end(pauli)
        .build()
        .expect("Valid flow");
    Chunk::new(text.parse().expect("Valid circuit"), q2i, vec![flow])
}

fn round_chunk(distance: usize) -> Chunk {
    let chunks = memory_experiment_chunks(distance, Basis::Z, 3).expect("Valid memory experiment");
    chunks[1].clone()
}

fn verify_benchmark(criterion: &mut Criterion) {
    let mut group = criterion.benchmark_group("verify");
    for distance in DISTANCES {
        let chunk = round_chunk(distance);
        group.bench_with_input(BenchmarkId::new("round", distance), &chunk, |bencher, chunk| {
            bencher.iter(|| chunk.verify().expect("Round verifies"));
        });
        group.bench_with_input(BenchmarkId::new("inverted", distance), &chunk, |bencher, chunk| {
            bencher.iter(|| chunk.inverted().expect("Round inverts"));
        });
    }

    let mut rng = StdRng::seed_from_u64(SEED);
    for (qubits, layers) in [(10, 100), (50, 1000)] {
        let chunk = mirrored_clifford_chunk(qubits, layers, &mut rng);
        group.bench_with_input(
            BenchmarkId::new("mirrored_cliffords", format!("n{qubits}_l{layers}")),
            &chunk,
            |bencher, chunk| bencher.iter(|| chunk.verify().expect("Mirror verifies")),
        );
    }
    group.finish();
}

fn compile_benchmark(criterion: &mut Criterion) {
    let mut group = criterion.benchmark_group("compile");
    group.sample_size(20);

    for (distance, rounds) in [(3, 10), (5, 25), (9, 100)] {
        let param = format!("d{distance}_r{rounds}");
        let chunks = memory_experiment_chunks(distance, Basis::X, rounds).expect("Valid memory experiment");

        group.bench_function(BenchmarkId::new("memory", &param), |bencher| {
            bencher.iter(|| compile_chunks_into_circuit(&chunks).expect("Chunks compile"));
        });

        let circuit = compile_chunks_into_circuit(&chunks).expect("Chunks compile");
        let noise = NoiseModel::uniform_depolarizing(1e-3);
        group.bench_function(BenchmarkId::new("noisy", &param), |bencher| {
            bencher.iter(|| noise.noisy_circuit(&circuit).expect("Noise applies"));
        });
    }
    group.finish();
}

criterion_group!(benches, verify_benchmark, compile_benchmark);
criterion_main!(benches);
