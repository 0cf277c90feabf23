//! Precomputed mapping data at cell and face quadrature points.
use crate::allocators::DimAllocator;
use crate::dofs::FacePairTable;
use crate::mesh::topology::CellFace;
use crate::mesh::Mesh;
use crate::quadrature::{face_axis, face_side, TensorQuadrature};
use crate::{MatrixFreeError, Real, SmallDim};
use log::debug;
use nalgebra::{try_convert, DefaultAllocator, OMatrix, OPoint, OVector};

/// Mapping data of a single cell at a single reference point.
#[derive(Debug, Clone, PartialEq)]
pub struct PointMapping<T, D>
where
    T: Real,
    D: SmallDim,
    DefaultAllocator: DimAllocator<T, D>,
{
    pub point: OPoint<T, D>,
    pub determinant: T,
    /// The inverse transposed Jacobian `J^{-T}`.
    pub inverse_jacobian_transpose: OMatrix<T, D, D>,
}

impl<T, D> PointMapping<T, D>
where
    T: Real,
    D: SmallDim,
    DefaultAllocator: DimAllocator<T, D>,
{
    /// Evaluate the mapping of `cell` at reference point `xi`.
    ///
    /// Fails if the Jacobian determinant is not positive.
    pub fn compute(mesh: &Mesh<T, D>, cell: usize, xi: &OPoint<T, D>) -> Result<Self, MatrixFreeError> {
        let jacobian = mesh.reference_jacobian(cell, xi);
        let determinant = jacobian.determinant();
        let invalid = || MatrixFreeError::InvalidGeometry {
            cell,
            determinant: try_convert(determinant).unwrap_or(f64::NAN),
        };
        if determinant <= T::zero() {
            return Err(invalid());
        }
        let inverse = jacobian.try_inverse().ok_or_else(invalid)?;
        Ok(Self {
            point: mesh.map_reference_coords(cell, xi),
            determinant,
            inverse_jacobian_transpose: inverse.transpose(),
        })
    }

    /// `|J^{-T} e_a|`, the surface measure factor of faces normal to reference axis `a`.
    pub fn face_scale(&self, axis: usize) -> T {
        self.inverse_jacobian_transpose.column(axis).norm()
    }
}

/// Cell and face mapping data for all quadrature points of a mesh.
///
/// Cell data is stored per cell and quadrature point. Face data is stored per face pair (in the
/// order of the [`FacePairTable`]) and quadrature point of the interior side, except the inverse
/// Jacobians of the exterior side, which are stored in the quadrature ordering of the exterior
/// cell.
#[derive(Debug, Clone)]
pub struct GeometryCache<T, D>
where
    T: Real,
    D: SmallDim,
    DefaultAllocator: DimAllocator<T, D>,
{
    n_q_cell: usize,
    n_q_face: usize,
    cell_jxw: Vec<T>,
    cell_inverse_jacobians: Vec<OMatrix<T, D, D>>,
    cell_points: Vec<OPoint<T, D>>,
    face_jxw: Vec<T>,
    face_normals: Vec<OVector<T, D>>,
    face_points: Vec<OPoint<T, D>>,
    face_interior_inverse_jacobians: Vec<OMatrix<T, D, D>>,
    face_interior_inverse_lengths: Vec<T>,
    face_exterior_inverse_jacobians: Vec<OMatrix<T, D, D>>,
    face_exterior_inverse_lengths: Vec<T>,
}

impl<T, D> GeometryCache<T, D>
where
    T: Real,
    D: SmallDim,
    DefaultAllocator: DimAllocator<T, D>,
{
    pub fn build(
        mesh: &Mesh<T, D>,
        faces: &FacePairTable,
        quadrature: &TensorQuadrature<T, D>,
    ) -> Result<Self, MatrixFreeError> {
        let n_q_cell = quadrature.cell_weights().len();
        let n_q_face = quadrature.face_weights().len();
        let num_cells = mesh.num_cells();

        let mut cell_jxw = Vec::with_capacity(num_cells * n_q_cell);
        let mut cell_inverse_jacobians = Vec::with_capacity(num_cells * n_q_cell);
        let mut cell_points = Vec::with_capacity(num_cells * n_q_cell);
        for cell in 0..num_cells {
            for (&w, xi) in quadrature.cell_weights().iter().zip(quadrature.cell_points()) {
                let mapping = PointMapping::compute(mesh, cell, xi)?;
                cell_jxw.push(w * mapping.determinant);
                cell_inverse_jacobians.push(mapping.inverse_jacobian_transpose);
                cell_points.push(mapping.point);
            }
        }

        let num_faces = faces.len();
        let num_interior = faces.num_interior();
        let mut cache = Self {
            n_q_cell,
            n_q_face,
            cell_jxw,
            cell_inverse_jacobians,
            cell_points,
            face_jxw: Vec::with_capacity(num_faces * n_q_face),
            face_normals: Vec::with_capacity(num_faces * n_q_face),
            face_points: Vec::with_capacity(num_faces * n_q_face),
            face_interior_inverse_jacobians: Vec::with_capacity(num_faces * n_q_face),
            face_interior_inverse_lengths: Vec::with_capacity(num_faces * n_q_face),
            face_exterior_inverse_jacobians: Vec::with_capacity(num_interior * n_q_face),
            face_exterior_inverse_lengths: Vec::with_capacity(num_interior * n_q_face),
        };

        let two = T::one() + T::one();
        for pair in faces.pairs() {
            let interior = face_mappings(mesh, pair.interior, quadrature)?;
            let axis = face_axis(pair.interior.local_face);
            let sign = if face_side(pair.interior.local_face) == 0 { -T::one() } else { T::one() };
            for (&w, mapping) in quadrature.face_weights().iter().zip(interior) {
                let scale = mapping.face_scale(axis);
                cache.face_jxw.push(w * mapping.determinant * scale);
                cache
                    .face_normals
                    .push(mapping.inverse_jacobian_transpose.column(axis) * (sign / scale));
                cache.face_points.push(mapping.point);
                cache.face_interior_inverse_lengths.push(scale / two);
                cache
                    .face_interior_inverse_jacobians
                    .push(mapping.inverse_jacobian_transpose);
            }

            if let Some(exterior) = &pair.exterior {
                let exterior_mappings = face_mappings(mesh, exterior.cell_face, quadrature)?;
                let exterior_axis = face_axis(exterior.cell_face.local_face);
                let permutation = exterior
                    .orientation
                    .quadrature_permutation(D::dim() - 1, quadrature.num_points_per_dim());
                for &p in &permutation {
                    let scale = exterior_mappings[p].face_scale(exterior_axis);
                    cache.face_exterior_inverse_lengths.push(scale / two);
                }
                cache
                    .face_exterior_inverse_jacobians
                    .extend(exterior_mappings.into_iter().map(|m| m.inverse_jacobian_transpose));
            }
        }

        debug!(
            "Built geometry cache for {} cells and {} faces ({} cell and {} face quadrature points each)",
            num_cells, num_faces, n_q_cell, n_q_face
        );
        Ok(cache)
    }

    pub fn n_q_cell(&self) -> usize {
        self.n_q_cell
    }

    pub fn n_q_face(&self) -> usize {
        self.n_q_face
    }

    pub fn cell_jxw(&self, cell: usize) -> &[T] {
        &self.cell_jxw[self.cell_range(cell)]
    }

    /// `J^{-T}` at the quadrature points of a cell.
    pub fn cell_inverse_jacobians(&self, cell: usize) -> &[OMatrix<T, D, D>] {
        &self.cell_inverse_jacobians[self.cell_range(cell)]
    }

    pub fn cell_points(&self, cell: usize) -> &[OPoint<T, D>] {
        &self.cell_points[self.cell_range(cell)]
    }

    pub fn face_jxw(&self, face: usize) -> &[T] {
        &self.face_jxw[self.face_range(face)]
    }

    /// Outward unit normals of the interior side.
    pub fn face_normals(&self, face: usize) -> &[OVector<T, D>] {
        &self.face_normals[self.face_range(face)]
    }

    pub fn face_points(&self, face: usize) -> &[OPoint<T, D>] {
        &self.face_points[self.face_range(face)]
    }

    pub fn face_interior_inverse_jacobians(&self, face: usize) -> &[OMatrix<T, D, D>] {
        &self.face_interior_inverse_jacobians[self.face_range(face)]
    }

    /// Inverse length of the interior cell normal to the face.
    pub fn face_interior_inverse_lengths(&self, face: usize) -> &[T] {
        &self.face_interior_inverse_lengths[self.face_range(face)]
    }

    /// `J^{-T}` of the exterior cell, in the quadrature ordering of the exterior side.
    ///
    /// Only available for interior faces.
    pub fn face_exterior_inverse_jacobians(&self, face: usize) -> &[OMatrix<T, D, D>] {
        &self.face_exterior_inverse_jacobians[self.face_range(face)]
    }

    /// Inverse length of the exterior cell normal to the face, in the quadrature ordering of the
    /// interior side.
    ///
    /// Only available for interior faces.
    pub fn face_exterior_inverse_lengths(&self, face: usize) -> &[T] {
        &self.face_exterior_inverse_lengths[self.face_range(face)]
    }

    fn cell_range(&self, cell: usize) -> std::ops::Range<usize> {
        cell * self.n_q_cell..(cell + 1) * self.n_q_cell
    }

    fn face_range(&self, face: usize) -> std::ops::Range<usize> {
        face * self.n_q_face..(face + 1) * self.n_q_face
    }
}

fn face_mappings<T, D>(
    mesh: &Mesh<T, D>,
    cell_face: CellFace,
    quadrature: &TensorQuadrature<T, D>,
) -> Result<Vec<PointMapping<T, D>>, MatrixFreeError>
where
    T: Real,
    D: SmallDim,
    DefaultAllocator: DimAllocator<T, D>,
{
    quadrature
        .face_points_on_cell(cell_face.local_face)
        .iter()
        .map(|xi| PointMapping::compute(mesh, cell_face.cell, xi))
        .collect()
}
