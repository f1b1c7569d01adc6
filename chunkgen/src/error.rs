use paulimap::{Basis, Coord, PauliString};
use thiserror::Error;

use crate::circuit::{MeasurementId, QubitId};
use crate::gate::Gate;

/// Every way building, verifying or stitching chunks can fail.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ChunkError {
    #[error("unknown gate name {0:?}")]
    UnknownGate(String),

    #[error("invalid {gate} instruction: {reason}")]
    InvalidInstruction { gate: Gate, reason: &'static str },

    #[error("qubit {qubit} is used more than once by {gate} within one moment")]
    OverlappingOperands { gate: Gate, qubit: Coord },

    #[error("qubit {qubit} changes basis around {gate} but shares its moment with another operation")]
    ConversionConflict { gate: Gate, qubit: QubitId },

    #[error("tile at {measurement_qubit} has {data_qubits} data qubits but {bases} bases")]
    TileShape {
        measurement_qubit: Coord,
        data_qubits: usize,
        bases: usize,
    },

    #[error("flow centered at {center} has no start, no end and no measurements")]
    VacuousFlow { center: Coord },

    #[error("can't concatenate a flow ending in {end} with a flow starting at {start}")]
    FlowConcat { end: PauliString, start: PauliString },

    #[error("no measurement of {qubit} was recorded in layer {layer:?}")]
    UnknownMeasurement { qubit: Coord, layer: String },

    #[error("line {line}: {message}")]
    Parse { line: usize, message: String },

    #[error("qubit {qubit} is not in the qubit index map")]
    UnmappedQubit { qubit: QubitId },

    #[error("flow {flow} touches qubit {qubit} which isn't in the chunk's q2i")]
    UnknownQubit { flow: usize, qubit: Coord },

    #[error("flow {flow} consumes measurement {measurement} but the chunk only has {count} measurements")]
    MeasurementOutOfRange {
        flow: usize,
        measurement: MeasurementId,
        count: usize,
    },

    #[error("flow {flow} anticommuted with the {basis} basis measurement {measurement} of qubit {qubit}")]
    AnticommutedWithMeasurement {
        flow: usize,
        qubit: Coord,
        basis: Basis,
        measurement: MeasurementId,
    },

    #[error("flow {flow} anticommuted with the {basis} basis reset of qubit {qubit}")]
    AnticommutedWithReset { flow: usize, qubit: Coord, basis: Basis },

    #[error("Anticommuted with MPP {product} (measurement {measurement}) while propagating flow {flow}")]
    AnticommutedWithMpp {
        flow: usize,
        product: PauliString,
        measurement: MeasurementId,
    },

    #[error("flow {flow} centered at {center} declares start {expected} but its end and measurements imply {actual}")]
    FlowMismatch {
        flow: usize,
        center: Coord,
        expected: PauliString,
        actual: PauliString,
    },

    #[error("dangling physical operation: {0}")]
    DanglingOperation(String),

    #[error("chunk {chunk}: could not match flow with start {start} (observable {obs_index:?})")]
    UnmatchedFlow {
        chunk: usize,
        start: PauliString,
        obs_index: Option<usize>,
    },

    #[error("chunk {chunk}: flow ending in {end} (observable {obs_index:?}) is never consumed by the next chunk")]
    UnconsumedFlow {
        chunk: usize,
        end: PauliString,
        obs_index: Option<usize>,
    },

    #[error("chunk {chunk}: more than one flow ends in {end} (observable {obs_index:?})")]
    AmbiguousFlow {
        chunk: usize,
        end: PauliString,
        obs_index: Option<usize>,
    },

    #[error("invalid construction: {0}")]
    Construction(String),
}

pub type Result<T> = std::result::Result<T, ChunkError>;
