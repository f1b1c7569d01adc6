use itertools::Itertools;
use std::collections::btree_map::{self, BTreeMap};
use std::fmt::{self, Display};
use std::ops::{Mul, MulAssign};
use std::str::FromStr;

use crate::{Basis, Coord, PauliParseError};

/// A Pauli operator up to phase, stored sparsely as a map from qubit keys to non-identity bases.
///
/// Qubits absent from the map carry the identity, so two maps are equal exactly when they act
/// identically. Multiplication drops the global phase: stabilizer-flow bookkeeping never needs it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PauliMap<Key: Ord> {
    qubits: BTreeMap<Key, Basis>,
}

/// Pauli operators over lattice coordinates, the form flows and tiles are authored in.
pub type PauliString = PauliMap<Coord>;

impl<Key: Ord> Default for PauliMap<Key> {
    fn default() -> Self {
        PauliMap { qubits: BTreeMap::new() }
    }
}

impl<Key: Ord> PauliMap<Key> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of qubits the operator acts non-trivially on.
    #[must_use]
    pub fn weight(&self) -> usize {
        self.qubits.len()
    }

    #[must_use]
    pub fn is_identity(&self) -> bool {
        self.qubits.is_empty()
    }

    #[must_use]
    pub fn get(&self, key: &Key) -> Option<Basis> {
        self.qubits.get(key).copied()
    }

    /// Overwrites the component on `key`; `None` clears it.
    pub fn set(&mut self, key: Key, basis: Option<Basis>) {
        match basis {
            Some(basis) => {
                self.qubits.insert(key, basis);
            }
            None => {
                self.qubits.remove(&key);
            }
        }
    }

    pub fn remove(&mut self, key: &Key) -> Option<Basis> {
        self.qubits.remove(key)
    }

    /// Multiplies a single qubit Pauli into the operator.
    pub fn mul_assign_at(&mut self, key: Key, basis: Basis) {
        match self.qubits.entry(key) {
            btree_map::Entry::Vacant(entry) => {
                entry.insert(basis);
            }
            btree_map::Entry::Occupied(mut entry) => match Basis::product(Some(*entry.get()), Some(basis)) {
                Some(product) => {
                    entry.insert(product);
                }
                None => {
                    entry.remove();
                }
            },
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Key, Basis)> + '_ {
        self.qubits.iter().map(|(key, basis)| (key, *basis))
    }

    pub fn support(&self) -> impl Iterator<Item = &Key> + '_ {
        self.qubits.keys()
    }

    pub fn bases(&self) -> impl Iterator<Item = Basis> + '_ {
        self.qubits.values().copied()
    }

    /// True when the two operators anticommute, i.e. they disagree on an odd number of shared qubits.
    #[must_use]
    pub fn anticommutes_with(&self, other: &PauliMap<Key>) -> bool {
        let (small, large) = if self.weight() <= other.weight() {
            (self, other)
        } else {
            (other, self)
        };
        let disagreements = small
            .qubits
            .iter()
            .filter(|(key, basis)| large.get(key).is_some_and(|b| b.anticommutes_with(**basis)))
            .count();
        disagreements % 2 == 1
    }

    #[must_use]
    pub fn commutes_with(&self, other: &PauliMap<Key>) -> bool {
        !self.anticommutes_with(other)
    }

    #[must_use]
    pub fn with_basis_transform(&self, mut transform: impl FnMut(Basis) -> Basis) -> Self
    where
        Key: Clone,
    {
        PauliMap {
            qubits: self.qubits.iter().map(|(key, basis)| (key.clone(), transform(*basis))).collect(),
        }
    }

    #[must_use]
    pub fn with_xz_flipped(&self) -> Self
    where
        Key: Clone,
    {
        self.with_basis_transform(Basis::xz_flipped)
    }

    /// Keeps only the components whose key satisfies `keep`.
    #[must_use]
    pub fn restricted(&self, mut keep: impl FnMut(&Key) -> bool) -> Self
    where
        Key: Clone,
    {
        PauliMap {
            qubits: self
                .qubits
                .iter()
                .filter(|(key, _)| keep(key))
                .map(|(key, basis)| (key.clone(), *basis))
                .collect(),
        }
    }

    /// Moves every component to a new key. Components landing on the same key are multiplied.
    #[must_use]
    pub fn with_transformed_keys<NewKey: Ord>(&self, mut transform: impl FnMut(&Key) -> NewKey) -> PauliMap<NewKey> {
        self.iter().map(|(key, basis)| (transform(key), basis)).collect()
    }

    /// Like [`PauliMap::with_transformed_keys`], failing with the first key `transform` rejects.
    pub fn try_map_keys<NewKey: Ord>(
        &self,
        mut transform: impl FnMut(&Key) -> Option<NewKey>,
    ) -> Result<PauliMap<NewKey>, &Key> {
        let mut result = PauliMap::new();
        for (key, basis) in self.iter() {
            result.mul_assign_at(transform(key).ok_or(key)?, basis);
        }
        Ok(result)
    }
}

impl PauliString {
    /// Reads a dense Pauli string such as `X_YZ`, placing character `i` at coordinate `(i, 0)`.
    pub fn from_dense(dense: &str) -> Result<Self, PauliParseError> {
        let mut result = PauliString::new();
        for (index, character) in dense.trim().trim_start_matches('+').chars().enumerate() {
            if character == '_' || character == 'I' {
                continue;
            }
            #[allow(clippy::cast_precision_loss)]
            result.mul_assign_at(Coord::new(index as f64, 0.0), Basis::try_from(character)?);
        }
        Ok(result)
    }

    /// Dense form of the operator over the given qubit order, `_` marking the identity.
    #[must_use]
    pub fn to_dense(&self, qubits: &[Coord]) -> String {
        qubits
            .iter()
            .map(|q| self.get(q).map_or('_', |basis| basis.to_string().chars().next().unwrap_or('_')))
            .collect()
    }
}

impl<Key: Ord> FromIterator<(Key, Basis)> for PauliMap<Key> {
    fn from_iter<T: IntoIterator<Item = (Key, Basis)>>(iter: T) -> Self {
        let mut result = PauliMap::new();
        for (key, basis) in iter {
            result.mul_assign_at(key, basis);
        }
        result
    }
}

impl<Key: Ord, const N: usize> From<[(Key, Basis); N]> for PauliMap<Key> {
    fn from(components: [(Key, Basis); N]) -> Self {
        components.into_iter().collect()
    }
}

impl<Key: Ord> From<BTreeMap<Key, Basis>> for PauliMap<Key> {
    fn from(qubits: BTreeMap<Key, Basis>) -> Self {
        PauliMap { qubits }
    }
}

impl<Key: Ord> IntoIterator for PauliMap<Key> {
    type Item = (Key, Basis);
    type IntoIter = btree_map::IntoIter<Key, Basis>;

    fn into_iter(self) -> Self::IntoIter {
        self.qubits.into_iter()
    }
}

impl<Key: Ord + Clone> MulAssign<&PauliMap<Key>> for PauliMap<Key> {
    fn mul_assign(&mut self, rhs: &PauliMap<Key>) {
        for (key, basis) in rhs.iter() {
            self.mul_assign_at(key.clone(), basis);
        }
    }
}

impl<Key: Ord + Clone> Mul<&PauliMap<Key>> for &PauliMap<Key> {
    type Output = PauliMap<Key>;

    fn mul(self, rhs: &PauliMap<Key>) -> PauliMap<Key> {
        let mut result = self.clone();
        result *= rhs;
        result
    }
}

impl<Key: Ord + Clone> Mul<&PauliMap<Key>> for PauliMap<Key> {
    type Output = PauliMap<Key>;

    fn mul(mut self, rhs: &PauliMap<Key>) -> PauliMap<Key> {
        self *= rhs;
        self
    }
}

impl<Key: Ord + Display> Display for PauliMap<Key> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_identity() {
            return write!(f, "I");
        }
        write!(f, "{}", self.qubits.iter().map(|(key, basis)| format!("{basis}{key}")).join("*"))
    }
}

impl<Key: Ord + FromStr> FromStr for PauliMap<Key> {
    type Err = PauliParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() || trimmed == "I" {
            return Ok(PauliMap::new());
        }
        let mut result = PauliMap::new();
        for term in trimmed.split('*') {
            let term = term.trim();
            let mut characters = term.chars();
            let basis = characters
                .next()
                .ok_or_else(|| PauliParseError::Malformed(s.to_owned()))
                .and_then(Basis::try_from)?;
            let key = characters
                .as_str()
                .parse::<Key>()
                .map_err(|_| PauliParseError::Malformed(term.to_owned()))?;
            result.mul_assign_at(key, basis);
        }
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn q(x: f64, y: f64) -> Coord {
        Coord::new(x, y)
    }

    #[test]
    fn product_drops_identities() {
        let a = PauliString::from([(q(0.0, 0.0), Basis::X), (q(1.0, 0.0), Basis::Z)]);
        let b = PauliString::from([(q(0.0, 0.0), Basis::X), (q(2.0, 0.0), Basis::Y)]);
        assert_eq!(&a * &b, PauliString::from([(q(1.0, 0.0), Basis::Z), (q(2.0, 0.0), Basis::Y)]));
        assert!((&a * &a).is_identity());
    }

    #[test]
    fn commutation_counts_disagreements() {
        let xx: PauliMap<usize> = "X0*X1".parse().unwrap();
        let zz: PauliMap<usize> = "Z0*Z1".parse().unwrap();
        let zi: PauliMap<usize> = "Z0".parse().unwrap();
        assert!(xx.commutes_with(&zz));
        assert!(xx.anticommutes_with(&zi));
        assert!(zz.commutes_with(&zi));
    }

    #[test]
    fn text_forms() {
        let pauli: PauliMap<usize> = "X0*Y1*Z2".parse().unwrap();
        assert_eq!(pauli.to_string(), "X0*Y1*Z2");
        assert_eq!(PauliMap::<usize>::new().to_string(), "I");
        assert_eq!("I".parse::<PauliMap<usize>>(), Ok(PauliMap::new()));

        let string = PauliString::from([(q(0.5, -0.5), Basis::Z)]);
        assert_eq!(string.to_string(), "Z(0.5, -0.5)");
        assert_eq!(string.to_string().parse::<PauliString>(), Ok(string));
    }

    #[test]
    fn dense_form() {
        let pauli = PauliString::from_dense("X_YZ").unwrap();
        assert_eq!(pauli.weight(), 3);
        assert_eq!(pauli.get(&q(2.0, 0.0)), Some(Basis::Y));
        let qubits: Vec<Coord> = (0..4).map(|i| q(f64::from(i), 0.0)).collect();
        assert_eq!(pauli.to_dense(&qubits), "X_YZ");
    }

    #[test]
    fn colliding_keys_multiply() {
        let pauli: PauliMap<usize> = "X0*Z1".parse().unwrap();
        let collapsed = pauli.with_transformed_keys(|_| 7usize);
        assert_eq!(collapsed, PauliMap::from([(7, Basis::Y)]));
    }

    #[test]
    fn try_map_keys_reports_missing_key() {
        let pauli: PauliMap<usize> = "X0*Z5".parse().unwrap();
        let result = pauli.try_map_keys(|k| (*k < 3).then_some(*k));
        assert_eq!(result, Err(&5));
    }
}
