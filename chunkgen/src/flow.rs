use paulimap::{setwise, Coord, PauliString};
use std::fmt::{self, Display};

use crate::circuit::MeasurementId;
use crate::error::{ChunkError, Result};

/// A stabilizer flow through a chunk: `start`, multiplied by the listed measurement results,
/// becomes `end`.
///
/// A missing `start` means the flow is prepared inside the chunk, a missing `end` means it is
/// measured out inside the chunk. Identity Pauli strings are stored as missing.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Flow {
    start: Option<PauliString>,
    end: Option<PauliString>,
    measurement_indices: Vec<MeasurementId>,
    center: Coord,
    obs_index: Option<usize>,
    postselect: bool,
}

/// Incrementally describes a [`Flow`].
#[derive(Clone, Debug)]
#[must_use]
pub struct FlowBuilder {
    flow: Flow,
    allow_vacuous: bool,
}

impl FlowBuilder {
    pub fn start(mut self, start: PauliString) -> Self {
        self.flow.start = non_identity(start);
        self
    }

    pub fn end(mut self, end: PauliString) -> Self {
        self.flow.end = non_identity(end);
        self
    }

    /// Measurement indices the flow consumes. Repeated indices cancel in pairs.
    pub fn measurements(mut self, indices: impl IntoIterator<Item = MeasurementId>) -> Self {
        self.flow.measurement_indices = setwise::parity_set(indices);
        self
    }

    pub fn obs_index(mut self, obs_index: usize) -> Self {
        self.flow.obs_index = Some(obs_index);
        self
    }

    pub fn postselect(mut self, postselect: bool) -> Self {
        self.flow.postselect = postselect;
        self
    }

    /// Accept a flow with no start, no end and no measurements.
    pub fn allow_vacuous(mut self) -> Self {
        self.allow_vacuous = true;
        self
    }

    pub fn build(self) -> Result<Flow> {
        if !self.allow_vacuous && self.flow.is_vacuous() {
            return Err(ChunkError::VacuousFlow {
                center: self.flow.center,
            });
        }
        Ok(self.flow)
    }
}

fn non_identity(pauli: PauliString) -> Option<PauliString> {
    (!pauli.is_identity()).then_some(pauli)
}

impl Flow {
    pub fn builder(center: Coord) -> FlowBuilder {
        FlowBuilder {
            flow: Flow {
                start: None,
                end: None,
                measurement_indices: Vec::new(),
                center,
                obs_index: None,
                postselect: false,
            },
            allow_vacuous: false,
        }
    }

    #[must_use]
    pub fn start(&self) -> Option<&PauliString> {
        self.start.as_ref()
    }

    #[must_use]
    pub fn end(&self) -> Option<&PauliString> {
        self.end.as_ref()
    }

    /// Sorted measurement indices, local to the owning chunk.
    #[must_use]
    pub fn measurement_indices(&self) -> &[MeasurementId] {
        &self.measurement_indices
    }

    #[must_use]
    pub fn center(&self) -> Coord {
        self.center
    }

    #[must_use]
    pub fn obs_index(&self) -> Option<usize> {
        self.obs_index
    }

    #[must_use]
    pub fn postselect(&self) -> bool {
        self.postselect
    }

    #[must_use]
    pub fn is_vacuous(&self) -> bool {
        self.start.is_none() && self.end.is_none() && self.measurement_indices.is_empty()
    }

    /// Every qubit mentioned by the start or the end.
    pub fn qubits(&self) -> impl Iterator<Item = &Coord> + '_ {
        self.start
            .iter()
            .chain(self.end.iter())
            .flat_map(PauliString::support)
    }

    /// Joins this flow with `next`, a flow of a later circuit segment whose measurement indices
    /// are `offset` past this flow's.
    pub fn concat(&self, next: &Flow, offset: usize) -> Result<Flow> {
        if self.end != next.start || self.obs_index != next.obs_index {
            return Err(ChunkError::FlowConcat {
                end: self.end.clone().unwrap_or_default(),
                start: next.start.clone().unwrap_or_default(),
            });
        }
        let shifted: Vec<MeasurementId> = next.measurement_indices.iter().map(|m| m + offset).collect();
        Ok(Flow {
            start: self.start.clone(),
            end: next.end.clone(),
            measurement_indices: setwise::symmetric_difference(&self.measurement_indices, &shifted),
            center: self.center.midpoint(next.center),
            obs_index: self.obs_index,
            postselect: self.postselect || next.postselect,
        })
    }

    #[must_use]
    pub fn with_measurement_offset(&self, offset: usize) -> Flow {
        Flow {
            measurement_indices: self.measurement_indices.iter().map(|m| m + offset).collect(),
            ..self.clone()
        }
    }

    /// Same flow consuming a different set of measurements.
    #[must_use]
    pub fn with_measurement_indices(&self, indices: impl IntoIterator<Item = MeasurementId>) -> Flow {
        Flow {
            measurement_indices: setwise::parity_set(indices),
            ..self.clone()
        }
    }

    #[must_use]
    pub fn with_postselect(&self, postselect: bool) -> Flow {
        Flow {
            postselect,
            ..self.clone()
        }
    }

    #[must_use]
    pub fn with_transformed_coords(&self, mut transform: impl FnMut(Coord) -> Coord) -> Flow {
        let mut move_keys = |pauli: &PauliString| pauli.with_transformed_keys(|q| transform(*q));
        let start = self.start.as_ref().map(&mut move_keys);
        let end = self.end.as_ref().map(&mut move_keys);
        Flow {
            start,
            end,
            measurement_indices: self.measurement_indices.clone(),
            center: transform(self.center),
            obs_index: self.obs_index,
            postselect: self.postselect,
        }
    }

    #[must_use]
    pub fn with_xz_flipped(&self) -> Flow {
        Flow {
            start: self.start.as_ref().map(PauliString::with_xz_flipped),
            end: self.end.as_ref().map(PauliString::with_xz_flipped),
            ..self.clone()
        }
    }

    /// The same flow run backwards: `start` and `end` swap, measurements are replaced.
    pub(crate) fn reversed(&self, measurement_indices: Vec<MeasurementId>) -> Flow {
        Flow {
            start: self.end.clone(),
            end: self.start.clone(),
            measurement_indices: setwise::parity_set(measurement_indices),
            ..self.clone()
        }
    }
}

impl Display for Flow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let show = |pauli: &Option<PauliString>| pauli.as_ref().map_or_else(|| "1".to_owned(), ToString::to_string);
        write!(f, "{} -> {}", show(&self.start), show(&self.end))?;
        if !self.measurement_indices.is_empty() {
            write!(f, " xor rec{:?}", self.measurement_indices)?;
        }
        if let Some(obs_index) = self.obs_index {
            write!(f, " (obs {obs_index})")?;
        }
        if self.postselect {
            write!(f, " (postselected)")?;
        }
        Ok(())
    }
}
