//! Building quantum error correction circuits out of chunks: circuit fragments annotated with the
//! stabilizer flows they implement. Chunks are checked flow by flow against their circuit and then
//! stitched into one circuit whose matched flows become detectors and observables.

pub mod builder;
pub mod chunk;
pub mod circuit;
pub mod compile;
pub mod error;
pub mod experiment;
pub mod flow;
pub mod gate;
pub mod interaction;
pub mod noise;
pub mod patch;
pub mod surface_code;
pub mod tile;
pub mod verifier;

pub use builder::{AtLayer, Builder, MeasurementTracker};
pub use chunk::Chunk;
pub use circuit::{Circuit, Instruction, MeasurementId, Operation, QubitId, Target};
pub use compile::{compile_chunks_into_circuit, compile_chunks_with, CompileOptions};
pub use error::{ChunkError, Result};
pub use experiment::{make_circuit, Constructions, MakeCircuitOptions, Params};
pub use flow::Flow;
pub use gate::Gate;
pub use interaction::to_z_basis_interaction_circuit;
pub use noise::NoiseModel;
pub use patch::Patch;
pub use surface_code::{
    build_surface_code_round_circuit, checkerboard_basis, standard_surface_code_chunk, surface_code_patch, DataBasis,
};
pub use tile::Tile;
pub use verifier::{FlowStabilizerVerifier, VerifyOptions};

pub use paulimap::{Basis, Coord, PauliString};
