//! Parallel processing of disjoint subsets.
//!
//! Scatter-add operations in finite element codes write to entries shared between neighboring
//! cells or faces. If the work items are partitioned into *colors* such that items of the same
//! color write to pairwise disjoint sets of entries, each color can be processed in parallel
//! without atomics or locks. This crate provides the data structure for such a partition
//! ([`DisjointSubsets`]), a greedy coloring algorithm ([`coloring::sequential_greedy_coloring`])
//! and a rayon parallel iterator that hands out mutable access to the entries of each subset.

pub mod coloring;
pub mod nested_vec;
pub mod slice;

pub use nested_vec::NestedVec;

use crate::slice::ParallelSliceAccess;
use rayon::iter::{IndexedParallelIterator, IntoParallelIterator, ParallelIterator};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::fmt::{Display, Formatter};

/// Access to the entries of a single subset during parallel iteration.
///
/// Entries are addressed by their *local* index, i.e. the position of the global index within
/// the subset.
pub struct SubsetAccess<'a, T> {
    label: usize,
    global_indices: &'a [usize],
    access: ParallelSliceAccess<'a, T>,
}

impl<'a, T> SubsetAccess<'a, T> {
    pub fn global_indices(&self) -> &[usize] {
        self.global_indices
    }

    pub fn label(&self) -> usize {
        self.label
    }

    pub fn len(&self) -> usize {
        self.global_indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.global_indices.is_empty()
    }

    pub fn get(&self, local_index: usize) -> &T {
        let global_index = self.global_indices[local_index];
        // The subset is disjoint from every other subset handed out concurrently, and
        // mutable access requires &mut self, so no mutable alias can exist.
        unsafe { self.access.get_unchecked(global_index) }
    }

    pub fn get_mut(&mut self, local_index: usize) -> &mut T {
        let global_index = self.global_indices[local_index];
        unsafe { self.access.get_unchecked_mut(global_index) }
    }
}

/// A set of subsets of indices, in which the intersection of indices between any two subsets is
/// empty.
///
/// Indices may repeat *within* a subset. Each subset carries a label, typically the index of the
/// work item it belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisjointSubsets {
    // The max global index present in any of the subsets, needed for bounds checks against
    // storage before handing out unchecked access
    max_index: Option<usize>,
    subsets: NestedVec<usize>,
    labels: Vec<usize>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct SubsetsNotDisjointError;

impl Display for SubsetsNotDisjointError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "subsets are not disjoint")
    }
}

impl std::error::Error for SubsetsNotDisjointError {}

impl DisjointSubsets {
    pub fn try_from_disjoint_subsets<Subsets: Into<NestedVec<usize>>>(
        subsets: Subsets,
        labels: Vec<usize>,
    ) -> Result<Self, SubsetsNotDisjointError> {
        let subsets = subsets.into();
        assert_eq!(subsets.len(), labels.len(), "Must have exactly one label per subset.");

        let mut global_index_set = HashSet::new();
        let mut local_index_set = HashSet::new();
        for subset in subsets.iter() {
            local_index_set.clear();
            local_index_set.extend(subset.iter().copied());
            for idx in &local_index_set {
                if !global_index_set.insert(*idx) {
                    return Err(SubsetsNotDisjointError);
                }
            }
        }

        let max_index = subsets.iter_array_elements().copied().max();
        Ok(Self {
            max_index,
            subsets,
            labels,
        })
    }

    /// Construct disjoint subsets without checking that they are disjoint.
    ///
    /// # Safety
    ///
    /// The subsets must be pairwise disjoint and `max_index` must be the largest index contained
    /// in any subset. Parallel iteration hands out mutable access based on this assumption.
    pub unsafe fn from_disjoint_subsets_unchecked(
        subsets: NestedVec<usize>,
        labels: Vec<usize>,
        max_index: Option<usize>,
    ) -> Self {
        assert_eq!(subsets.len(), labels.len(), "Must have exactly one label per subset.");
        Self {
            max_index,
            subsets,
            labels,
        }
    }

    pub fn subsets(&self) -> &NestedVec<usize> {
        &self.subsets
    }

    pub fn labels(&self) -> &[usize] {
        &self.labels
    }

    pub fn max_index(&self) -> Option<usize> {
        self.max_index
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Create a parallel iterator over the subsets, with mutable access to the entries of
    /// `storage` indexed by each subset.
    ///
    /// # Panics
    ///
    /// Panics if any subset contains an index that is out of bounds for `storage`.
    pub fn subsets_par_iter<'a, T: Send + Sync>(
        &'a self,
        storage: &'a mut [T],
    ) -> impl 'a + IndexedParallelIterator<Item = SubsetAccess<'a, T>> {
        assert!(
            self.max_index.map_or(true, |max_index| max_index < storage.len()),
            "Subsets contain indices out of bounds."
        );
        let access = ParallelSliceAccess::new(storage);
        let subsets = &self.subsets;
        let labels = &self.labels;
        (0..labels.len()).into_par_iter().map(move |i| SubsetAccess {
            label: labels[i],
            global_indices: subsets.get(i).unwrap_or(&[]),
            access,
        })
    }
}
