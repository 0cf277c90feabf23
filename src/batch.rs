//! Batches of cells and faces processed together, and their race-free schedule.
//!
//! A batch groups up to `W` cells, or up to `W` faces with identical local face numbers and
//! orientation, so that all lanes of a batch execute the same operations. Each batch records the
//! set of local DoFs it writes to. Constrained DoFs are resolved into their unconstrained masters
//! when the batch is built, so the write set only contains unconstrained DoFs.
use crate::constraints::ResolvedConstraints;
use crate::dofs::{DofIndexMap, FacePairTable};
use crate::mesh::topology::FaceOrientation;
use crate::Real;
use matfree_paradis::coloring::sequential_greedy_coloring;
use matfree_paradis::{DisjointSubsets, NestedVec};
use std::collections::HashMap;

/// The resolved DoFs of one side of a batch.
///
/// For every lane and cell-local DoF, the list of `(position, coefficient)` pairs, where
/// `position` indexes the write set of the batch.
#[derive(Debug, Clone, PartialEq)]
pub struct LaneDofs<T> {
    dofs_per_lane: usize,
    offsets: Vec<usize>,
    entries: Vec<(usize, T)>,
}

impl<T> LaneDofs<T> {
    #[inline]
    pub fn entries(&self, lane: usize, local_dof: usize) -> &[(usize, T)] {
        let slot = lane * self.dofs_per_lane + local_dof;
        &self.entries[self.offsets[slot]..self.offsets[slot + 1]]
    }

    pub fn dofs_per_lane(&self) -> usize {
        self.dofs_per_lane
    }
}

/// The write set of a batch and the resolved DoFs of each of its sides.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchDofs<T> {
    write_set: Vec<usize>,
    sides: Vec<LaneDofs<T>>,
}

impl<T: Real> BatchDofs<T> {
    /// Resolve the DoFs of the given sides.
    ///
    /// Each side is a list of cells, one per lane.
    fn build(sides: &[Vec<usize>], dof_map: &DofIndexMap, constraints: &ResolvedConstraints<T>) -> Self {
        let resolved_sides: Vec<Vec<Vec<(usize, T)>>> = sides
            .iter()
            .map(|cells| {
                cells
                    .iter()
                    .flat_map(|&cell| dof_map.cell_dofs(cell))
                    .map(|&dof| constraints.expand(dof))
                    .collect()
            })
            .collect();

        let mut write_set: Vec<usize> = resolved_sides
            .iter()
            .flatten()
            .flatten()
            .map(|&(global, _)| global)
            .collect();
        write_set.sort_unstable();
        write_set.dedup();

        let sides = sides
            .iter()
            .zip(resolved_sides)
            .map(|(cells, slots)| {
                let dofs_per_lane = cells.first().map_or(0, |&cell| dof_map.cell_dofs(cell).len());
                let mut offsets = Vec::with_capacity(slots.len() + 1);
                let mut entries = Vec::new();
                offsets.push(0);
                for slot in slots {
                    for (global, coefficient) in slot {
                        let position = write_set
                            .binary_search(&global)
                            .expect("write set contains all resolved DoFs");
                        entries.push((position, coefficient));
                    }
                    offsets.push(entries.len());
                }
                LaneDofs {
                    dofs_per_lane,
                    offsets,
                    entries,
                }
            })
            .collect();

        Self { write_set, sides }
    }

    /// Sorted, unique local DoF indices written by the batch.
    pub fn write_set(&self) -> &[usize] {
        &self.write_set
    }

    pub fn side(&self, index: usize) -> &LaneDofs<T> {
        &self.sides[index]
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CellBatch<T> {
    pub cells: Vec<usize>,
    pub dofs: BatchDofs<T>,
}

impl<T> CellBatch<T> {
    pub fn lanes(&self) -> usize {
        self.cells.len()
    }
}

/// The exterior side shared by all lanes of an interior face batch.
#[derive(Debug, Clone, PartialEq)]
pub struct ExteriorBatchSide {
    pub local_face: usize,
    pub orientation: FaceOrientation,
    /// Maps interior face quadrature indices to exterior face quadrature indices.
    pub permutation: Vec<usize>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FaceBatch<T> {
    /// Indices into the face pair table.
    pub faces: Vec<usize>,
    pub interior_face: usize,
    /// `None` for batches of boundary faces.
    pub exterior: Option<ExteriorBatchSide>,
    /// Side 0 holds the interior cells, side 1 the exterior cells (if any).
    pub dofs: BatchDofs<T>,
}

impl<T> FaceBatch<T> {
    pub fn lanes(&self) -> usize {
        self.faces.len()
    }
}

/// Split all cells into batches of at most `batch_width` consecutive cells.
pub fn build_cell_batches<T: Real>(
    dof_map: &DofIndexMap,
    constraints: &ResolvedConstraints<T>,
    batch_width: usize,
) -> Vec<CellBatch<T>> {
    let cells: Vec<usize> = (0..dof_map.num_cells()).collect();
    cells
        .chunks(batch_width)
        .map(|chunk| CellBatch {
            cells: chunk.to_vec(),
            dofs: BatchDofs::build(&[chunk.to_vec()], dof_map, constraints),
        })
        .collect()
}

/// Group faces with identical local face numbers and orientation, and split each group into
/// batches of at most `batch_width` faces.
pub fn build_face_batches<T: Real>(
    faces: &FacePairTable,
    dof_map: &DofIndexMap,
    constraints: &ResolvedConstraints<T>,
    batch_width: usize,
    face_dim: usize,
    n_q_1d: usize,
) -> Vec<FaceBatch<T>> {
    type GroupKey = (usize, Option<(usize, FaceOrientation)>);
    let mut group_index: HashMap<GroupKey, usize> = HashMap::new();
    let mut groups: Vec<(GroupKey, Vec<usize>)> = Vec::new();
    for (face_index, pair) in faces.pairs().iter().enumerate() {
        let key = (
            pair.interior.local_face,
            pair.exterior
                .as_ref()
                .map(|exterior| (exterior.cell_face.local_face, exterior.orientation)),
        );
        let next_index = groups.len();
        let index = *group_index.entry(key).or_insert(next_index);
        if index == next_index {
            groups.push((key, Vec::new()));
        }
        groups[index].1.push(face_index);
    }

    let mut batches = Vec::new();
    for ((interior_face, exterior_key), members) in groups {
        let exterior = exterior_key.map(|(local_face, orientation)| ExteriorBatchSide {
            local_face,
            orientation,
            permutation: orientation.quadrature_permutation(face_dim, n_q_1d),
        });
        for chunk in members.chunks(batch_width) {
            let pairs = chunk.iter().map(|&f| &faces.pairs()[f]);
            let mut sides = vec![pairs.clone().map(|pair| pair.interior.cell).collect::<Vec<_>>()];
            if exterior.is_some() {
                sides.push(
                    pairs
                        .filter_map(|pair| pair.exterior.as_ref().map(|e| e.cell_face.cell))
                        .collect(),
                );
            }
            batches.push(FaceBatch {
                faces: chunk.to_vec(),
                interior_face,
                exterior: exterior.clone(),
                dofs: BatchDofs::build(&sides, dof_map, constraints),
            });
        }
    }
    batches
}

/// Partition batches into colors, such that batches of the same color have disjoint write sets.
///
/// The label of each subset is the index of the batch.
pub fn color_batches<'a>(write_sets: impl Iterator<Item = &'a [usize]>) -> Vec<DisjointSubsets> {
    let mut subsets = NestedVec::new();
    for write_set in write_sets {
        subsets.push(write_set);
    }
    sequential_greedy_coloring(&subsets)
}
