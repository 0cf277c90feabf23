//! Face topology of hypercube meshes.
//!
//! Faces are identified by the set of global vertices they contain. Two cells sharing a face may
//! number its vertices differently; the relation between the two local numberings is captured by
//! a [`FaceOrientation`].
use crate::mesh::Mesh;
use crate::quadrature::{face_axis, face_side};
use crate::{MatrixFreeError, MAX_DIM};
use log::debug;
use nalgebra::allocator::Allocator;
use nalgebra::{DefaultAllocator, DimName, Scalar};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A local face of a cell.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CellFace {
    pub cell: usize,
    pub local_face: usize,
}

/// Relation between the tangential coordinates of the two sides of an interior face.
///
/// Tangential coordinate `j` of the exterior side equals tangential coordinate `axes[j]` of the
/// interior side, negated if `flips[j]` is set. Only the first `d - 1` entries are meaningful.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FaceOrientation {
    axes: [usize; 2],
    flips: [bool; 2],
}

impl Default for FaceOrientation {
    fn default() -> Self {
        Self::identity()
    }
}

impl FaceOrientation {
    pub fn identity() -> Self {
        Self {
            axes: [0, 1],
            flips: [false, false],
        }
    }

    pub fn new(axes: [usize; 2], flips: [bool; 2]) -> Self {
        Self { axes, flips }
    }

    pub fn axes(&self) -> [usize; 2] {
        self.axes
    }

    pub fn flips(&self) -> [bool; 2] {
        self.flips
    }

    pub fn is_identity(&self, face_dim: usize) -> bool {
        (0..face_dim).all(|j| self.axes[j] == j && !self.flips[j])
    }

    /// All symmetries of the reference face of the given dimension.
    pub fn candidates(face_dim: usize) -> Vec<Self> {
        let axis_permutations: &[[usize; 2]] = if face_dim == 2 {
            &[[0, 1], [1, 0]]
        } else {
            &[[0, 1]]
        };
        let num_flip_patterns = 1 << face_dim;
        let mut candidates = Vec::new();
        for &axes in axis_permutations {
            for pattern in 0..num_flip_patterns {
                let flips = [pattern & 1 != 0, pattern & 2 != 0];
                candidates.push(Self { axes, flips });
            }
        }
        candidates
    }

    /// Map a corner of the reference face, given in the interior numbering, to the exterior
    /// numbering.
    ///
    /// Bit `j` of a corner index is set if the corner has tangential coordinate `+1` along axis
    /// `j`.
    pub fn map_corner(&self, face_dim: usize, interior_corner: usize) -> usize {
        (0..face_dim)
            .map(|j| {
                let bit = (interior_corner >> self.axes[j]) & 1;
                let bit = if self.flips[j] { 1 - bit } else { bit };
                bit << j
            })
            .sum()
    }

    /// The permutation of tensor face quadrature points with `n` points per direction, mapping
    /// the interior index of a point to the exterior index of the same physical point.
    ///
    /// Relies on the one-dimensional rule being symmetric, i.e. point `n - 1 - i` is the
    /// reflection of point `i`.
    pub fn quadrature_permutation(&self, face_dim: usize, n: usize) -> Vec<usize> {
        let num_points = n.pow(face_dim as u32);
        (0..num_points)
            .map(|interior_index| {
                let interior_multi_index: [usize; 2] = [interior_index % n, (interior_index / n) % n];
                (0..face_dim)
                    .map(|j| {
                        let q = interior_multi_index[self.axes[j]];
                        let p = if self.flips[j] { n - 1 - q } else { q };
                        p * n.pow(j as u32)
                    })
                    .sum()
            })
            .collect()
    }

    /// Find the orientation that maps the face vertices of the interior side onto the face
    /// vertices of the exterior side, both given in their local face numbering.
    pub fn from_face_vertices(interior: &[usize], exterior: &[usize], face_dim: usize) -> Option<Self> {
        Self::candidates(face_dim).into_iter().find(|orientation| {
            (0..interior.len()).all(|corner| exterior[orientation.map_corner(face_dim, corner)] == interior[corner])
        })
    }
}

/// The local cell vertex corresponding to a local face vertex.
///
/// Face vertices are numbered in the same lexicographic fashion as cell vertices, using the
/// tangential axes in ascending order.
pub fn face_vertex_to_cell_vertex(dim: usize, local_face: usize, face_vertex: usize) -> usize {
    let axis = face_axis(local_face);
    let mut cell_vertex = face_side(local_face) << axis;
    let mut j = 0;
    for a in 0..dim {
        if a != axis {
            cell_vertex |= ((face_vertex >> j) & 1) << a;
            j += 1;
        }
    }
    cell_vertex
}

/// Global vertex indices of a local face, in face-local order.
pub fn face_vertices<T, D>(mesh: &Mesh<T, D>, face: CellFace) -> Vec<usize>
where
    T: Scalar,
    D: DimName,
    DefaultAllocator: Allocator<T, D>,
{
    let dim = D::dim();
    let cell_vertices = mesh.cell_vertices(face.cell);
    (0..(1 << (dim - 1)))
        .map(|f| cell_vertices[face_vertex_to_cell_vertex(dim, face.local_face, f)])
        .collect()
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InteriorFace {
    pub interior: CellFace,
    pub exterior: CellFace,
    pub orientation: FaceOrientation,
}

/// Interior and boundary faces of a mesh.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaceTopology {
    interior_faces: Vec<InteriorFace>,
    boundary_faces: Vec<CellFace>,
}

impl FaceTopology {
    /// Find all faces of the mesh by matching face vertex sets.
    ///
    /// The interior side of an interior face is the side that is encountered first when visiting
    /// cells and their local faces in order, so the result is deterministic.
    ///
    /// Fails with [`MatrixFreeError::UnsupportedDimension`] for meshes of dimension above 3.
    pub fn compute<T, D>(mesh: &Mesh<T, D>) -> Result<Self, MatrixFreeError>
    where
        T: Scalar,
        D: DimName,
        DefaultAllocator: Allocator<T, D>,
    {
        let dim = D::dim();
        if dim == 0 || dim > MAX_DIM {
            return Err(MatrixFreeError::UnsupportedDimension { dim });
        }
        let mut face_index_by_key: HashMap<Vec<usize>, usize> = HashMap::new();
        let mut incident_cell_faces: Vec<Vec<CellFace>> = Vec::new();

        for cell in 0..mesh.num_cells() {
            for local_face in 0..2 * dim {
                let cell_face = CellFace { cell, local_face };
                let mut key = face_vertices(mesh, cell_face);
                key.sort_unstable();
                let next_index = incident_cell_faces.len();
                let index = *face_index_by_key.entry(key).or_insert(next_index);
                if index == next_index {
                    incident_cell_faces.push(Vec::new());
                }
                incident_cell_faces[index].push(cell_face);
            }
        }

        let mut interior_faces = Vec::new();
        let mut boundary_faces = Vec::new();
        for cell_faces in incident_cell_faces {
            match cell_faces.as_slice() {
                &[boundary] => boundary_faces.push(boundary),
                &[interior, exterior] => {
                    let orientation = FaceOrientation::from_face_vertices(
                        &face_vertices(mesh, interior),
                        &face_vertices(mesh, exterior),
                        dim - 1,
                    )
                    .ok_or(MatrixFreeError::InconsistentFaceOrientation {
                        interior_cell: interior.cell,
                        exterior_cell: exterior.cell,
                    })?;
                    interior_faces.push(InteriorFace {
                        interior,
                        exterior,
                        orientation,
                    });
                }
                _ => {
                    return Err(MatrixFreeError::NonManifoldFace {
                        cells: cell_faces.iter().map(|f| f.cell).collect(),
                    })
                }
            }
        }

        debug!(
            "Computed face topology: {} interior faces, {} boundary faces",
            interior_faces.len(),
            boundary_faces.len()
        );

        Ok(Self {
            interior_faces,
            boundary_faces,
        })
    }

    pub fn interior_faces(&self) -> &[InteriorFace] {
        &self.interior_faces
    }

    pub fn boundary_faces(&self) -> &[CellFace] {
        &self.boundary_faces
    }
}
