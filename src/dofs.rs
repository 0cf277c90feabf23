//! Local-to-global DoF numbering of cells and the DoF pairing of faces.
use crate::mesh::topology::{CellFace, FaceOrientation, FaceTopology};
use crate::MatrixFreeError;
use matfree_paradis::NestedVec;
use serde::{Deserialize, Serialize};

/// Map from cell-local DoFs to indices in the local DoF space of this process.
///
/// The local DoF space consists of `n_owned` owned DoFs followed by `n_ghosts` ghost DoFs, which
/// are read-only copies of DoFs owned elsewhere (see [`GhostExchange`](crate::vector::GhostExchange)).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DofIndexMap {
    n_owned: usize,
    n_ghosts: usize,
    cell_dofs: NestedVec<usize>,
}

impl DofIndexMap {
    /// Discontinuous numbering: cell `c` owns DoFs `c * n .. (c + 1) * n`.
    pub fn discontinuous(num_cells: usize, dofs_per_cell: usize) -> Self {
        let mut cell_dofs = NestedVec::new();
        for cell in 0..num_cells {
            let offset = cell * dofs_per_cell;
            cell_dofs.push(&(offset..offset + dofs_per_cell).collect::<Vec<_>>());
        }
        Self {
            n_owned: num_cells * dofs_per_cell,
            n_ghosts: 0,
            cell_dofs,
        }
    }

    /// Arbitrary numbering with `n_owned` owned DoFs and no ghosts.
    ///
    /// Local DoFs of each cell must be given in tensor order (first axis fastest).
    pub fn from_cell_dofs(n_owned: usize, cell_dofs: &[Vec<usize>]) -> Self {
        Self {
            n_owned,
            n_ghosts: 0,
            cell_dofs: NestedVec::from(cell_dofs),
        }
    }

    /// Declare that indices `n_owned .. n_owned + n_ghosts` refer to ghost DoFs.
    pub fn with_ghosts(self, n_ghosts: usize) -> Self {
        Self { n_ghosts, ..self }
    }

    pub fn n_owned(&self) -> usize {
        self.n_owned
    }

    pub fn n_ghosts(&self) -> usize {
        self.n_ghosts
    }

    /// Size of the local DoF space, owned and ghost DoFs.
    pub fn n_local(&self) -> usize {
        self.n_owned + self.n_ghosts
    }

    pub fn num_cells(&self) -> usize {
        self.cell_dofs.len()
    }

    pub fn cell_dofs(&self, cell: usize) -> &[usize] {
        self.cell_dofs.get(cell).unwrap_or(&[])
    }

    /// Check that every cell has the expected number of DoFs and that all indices are in bounds.
    pub fn validate(&self, num_cells: usize, dofs_per_cell: usize) -> Result<(), MatrixFreeError> {
        if self.num_cells() != num_cells {
            return Err(MatrixFreeError::SizeMismatch {
                expected: num_cells,
                actual: self.num_cells(),
            });
        }
        for (cell, dofs) in self.cell_dofs.iter().enumerate() {
            if dofs.len() != dofs_per_cell {
                return Err(MatrixFreeError::InconsistentDofCount {
                    cell,
                    expected: dofs_per_cell,
                    actual: dofs.len(),
                });
            }
            if let Some(&index) = dofs.iter().find(|&&index| index >= self.n_local()) {
                return Err(MatrixFreeError::DofIndexOutOfBounds {
                    index,
                    num_dofs: self.n_local(),
                });
            }
        }
        Ok(())
    }
}

/// The exterior side of an interior face pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExteriorSide {
    pub cell_face: CellFace,
    pub orientation: FaceOrientation,
}

/// A face together with the cells whose DoFs it couples.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FacePair {
    pub interior: CellFace,
    /// `None` for boundary faces.
    pub exterior: Option<ExteriorSide>,
    /// Boundary id of boundary faces, the local face number `2a + s` of the cell face.
    pub boundary_id: Option<usize>,
}

/// All face pairs of a mesh, interior faces first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FacePairTable {
    pairs: Vec<FacePair>,
    num_interior: usize,
}

impl FacePairTable {
    pub fn build(topology: &FaceTopology, dof_map: &DofIndexMap) -> Result<Self, MatrixFreeError> {
        let mut pairs = Vec::with_capacity(topology.interior_faces().len() + topology.boundary_faces().len());
        for face in topology.interior_faces() {
            let interior_count = dof_map.cell_dofs(face.interior.cell).len();
            let exterior_count = dof_map.cell_dofs(face.exterior.cell).len();
            if interior_count != exterior_count {
                return Err(MatrixFreeError::InconsistentFaceDofs {
                    interior_cell: face.interior.cell,
                    exterior_cell: face.exterior.cell,
                });
            }
            pairs.push(FacePair {
                interior: face.interior,
                exterior: Some(ExteriorSide {
                    cell_face: face.exterior,
                    orientation: face.orientation,
                }),
                boundary_id: None,
            });
        }
        let num_interior = pairs.len();
        pairs.extend(topology.boundary_faces().iter().map(|&face| FacePair {
            interior: face,
            exterior: None,
            boundary_id: Some(face.local_face),
        }));
        Ok(Self { pairs, num_interior })
    }

    pub fn pairs(&self) -> &[FacePair] {
        &self.pairs
    }

    pub fn num_interior(&self) -> usize {
        self.num_interior
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}
