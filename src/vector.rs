//! DoF vectors and the exchange of ghost data between partitions.
use crate::{MatrixFreeError, Real};
use nalgebra::DVector;
use serde::{Deserialize, Serialize};

/// Sizes of the owned and ghost ranges of the local DoF space.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Partition {
    pub n_owned: usize,
    pub n_ghosts: usize,
}

impl Partition {
    pub fn new(n_owned: usize, n_ghosts: usize) -> Self {
        Self { n_owned, n_ghosts }
    }

    pub fn n_local(&self) -> usize {
        self.n_owned + self.n_ghosts
    }
}

/// A vector of owned DoF values.
///
/// Ghost values are never stored in the vector itself. They are imported into a separate buffer
/// by a [`GhostExchange`] whenever an operator needs them.
#[derive(Debug, Clone, PartialEq)]
pub struct DofVector<T: Real> {
    values: DVector<T>,
    partition: Partition,
}

impl<T: Real> DofVector<T> {
    pub fn zeros(partition: Partition) -> Self {
        Self {
            values: DVector::zeros(partition.n_owned),
            partition,
        }
    }

    pub fn from_values(partition: Partition, values: DVector<T>) -> Result<Self, MatrixFreeError> {
        if values.len() != partition.n_owned {
            return Err(MatrixFreeError::SizeMismatch {
                expected: partition.n_owned,
                actual: values.len(),
            });
        }
        Ok(Self { values, partition })
    }

    pub fn partition(&self) -> Partition {
        self.partition
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn values(&self) -> &DVector<T> {
        &self.values
    }

    pub fn values_mut(&mut self) -> &mut DVector<T> {
        &mut self.values
    }

    pub fn into_values(self) -> DVector<T> {
        self.values
    }

    pub fn as_slice(&self) -> &[T] {
        self.values.as_slice()
    }

    pub fn as_mut_slice(&mut self) -> &mut [T] {
        self.values.as_mut_slice()
    }

    /// Dot product of the owned values.
    pub fn dot(&self, other: &Self) -> T {
        self.values.dot(&other.values)
    }
}

/// Two-phase exchange of ghost data.
///
/// Ghost DoFs are local, read-only copies of DoFs owned by another partition. Before a pass reads
/// DoF values, [`import_ghosts`](Self::import_ghosts) fills the ghost buffer from the owners.
/// After the local passes, [`export_ghosts`](Self::export_ghosts) adds the contributions
/// accumulated in ghost slots to the owners. Both phases are barriers: no evaluation overlaps with
/// the exchange.
pub trait GhostExchange<T>: Sync {
    fn num_ghosts(&self) -> usize;

    /// Check that the exchange is compatible with a local space of `n_owned` owned DoFs.
    fn check_owners(&self, n_owned: usize) -> Result<(), MatrixFreeError> {
        let _ = n_owned;
        Ok(())
    }

    /// Fill `ghosts` with the current values of the corresponding owned DoFs.
    fn import_ghosts(&self, owned: &[T], ghosts: &mut [T]);

    /// Add `ghost_contributions` to the owners of the corresponding DoFs.
    fn export_ghosts(&self, ghost_contributions: &[T], owned: &mut [T]);
}

/// Exchange for a DoF space without ghosts.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct NoGhosts;

impl<T> GhostExchange<T> for NoGhosts {
    fn num_ghosts(&self) -> usize {
        0
    }

    fn import_ghosts(&self, _owned: &[T], _ghosts: &mut [T]) {}

    fn export_ghosts(&self, _ghost_contributions: &[T], _owned: &mut [T]) {}
}

/// Exchange in which every ghost slot aliases an owned DoF of the same process.
///
/// This describes e.g. periodic identification of DoFs, and exercises the ghost protocol without
/// any inter-process communication.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalGhostExchange {
    owners: Vec<usize>,
}

impl LocalGhostExchange {
    /// Ghost slot `i` aliases owned DoF `owners[i]`.
    pub fn new(owners: Vec<usize>) -> Self {
        Self { owners }
    }

    pub fn owners(&self) -> &[usize] {
        &self.owners
    }
}

impl<T: Real> GhostExchange<T> for LocalGhostExchange {
    fn num_ghosts(&self) -> usize {
        self.owners.len()
    }

    fn check_owners(&self, n_owned: usize) -> Result<(), MatrixFreeError> {
        match self.owners.iter().find(|&&owner| owner >= n_owned) {
            Some(&index) => Err(MatrixFreeError::DofIndexOutOfBounds {
                index,
                num_dofs: n_owned,
            }),
            None => Ok(()),
        }
    }

    fn import_ghosts(&self, owned: &[T], ghosts: &mut [T]) {
        assert_eq!(ghosts.len(), self.owners.len());
        for (ghost, &owner) in ghosts.iter_mut().zip(&self.owners) {
            *ghost = owned[owner];
        }
    }

    fn export_ghosts(&self, ghost_contributions: &[T], owned: &mut [T]) {
        assert_eq!(ghost_contributions.len(), self.owners.len());
        for (&contribution, &owner) in ghost_contributions.iter().zip(&self.owners) {
            owned[owner] += contribution;
        }
    }
}

/// Read access to the local DoF space, owned values followed by imported ghost values.
#[derive(Debug, Copy, Clone)]
pub(crate) struct LocalView<'a, T> {
    owned: &'a [T],
    ghosts: &'a [T],
}

impl<'a, T: Copy> LocalView<'a, T> {
    pub fn new(owned: &'a [T], ghosts: &'a [T]) -> Self {
        Self { owned, ghosts }
    }

    #[inline]
    pub fn get(&self, index: usize) -> T {
        match self.owned.get(index) {
            Some(&value) => value,
            None => self.ghosts[index - self.owned.len()],
        }
    }
}
