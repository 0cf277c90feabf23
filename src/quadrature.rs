//! Tensor-product quadrature for cells and faces of the reference hypercube.
use crate::allocators::DimAllocator;
use crate::{MatrixFreeError, Real, SmallDim};
use nalgebra::{convert, DefaultAllocator, OPoint};

/// Errors returned by quadrature methods.
pub use matfree_quadrature::Error as QuadratureError;

/// Gauss quadrature on the reference cell `[-1, 1]^D` and its faces `[-1, 1]^(D - 1)`.
///
/// Both rules are tensor products of the same one-dimensional rule, with the first coordinate
/// running fastest.
#[derive(Debug, Clone, PartialEq)]
pub struct TensorQuadrature<T, D>
where
    T: Real,
    D: SmallDim,
    DefaultAllocator: DimAllocator<T, D>,
{
    points_1d: Vec<T>,
    weights_1d: Vec<T>,
    cell_weights: Vec<T>,
    cell_points: Vec<OPoint<T, D>>,
    face_weights: Vec<T>,
    face_points: Vec<Vec<T>>,
}

impl<T, D> TensorQuadrature<T, D>
where
    T: Real,
    D: SmallDim,
    DefaultAllocator: DimAllocator<T, D>,
{
    pub fn gauss(num_points_per_dim: usize) -> Result<Self, MatrixFreeError> {
        let (weights_1d, points_1d) = matfree_quadrature::univariate::try_gauss(num_points_per_dim)?;
        let (cell_weights, cell_points) = matfree_quadrature::tensor::tensor_gauss(num_points_per_dim, D::dim())?;
        let (face_weights, face_points) = matfree_quadrature::tensor::tensor_gauss(num_points_per_dim, D::dim() - 1)?;

        let convert_vec = |v: Vec<f64>| v.into_iter().map(convert::<f64, T>).collect::<Vec<_>>();
        Ok(Self {
            points_1d: points_1d.into_iter().map(|[x]| convert(x)).collect(),
            weights_1d: convert_vec(weights_1d),
            cell_weights: convert_vec(cell_weights),
            cell_points: cell_points
                .into_iter()
                .map(|p| OPoint::from_slice(&convert_vec(p)))
                .collect(),
            face_weights: convert_vec(face_weights),
            face_points: face_points.into_iter().map(convert_vec).collect(),
        })
    }

    pub fn num_points_per_dim(&self) -> usize {
        self.points_1d.len()
    }

    pub fn points_1d(&self) -> &[T] {
        &self.points_1d
    }

    pub fn weights_1d(&self) -> &[T] {
        &self.weights_1d
    }

    pub fn cell_weights(&self) -> &[T] {
        &self.cell_weights
    }

    pub fn cell_points(&self) -> &[OPoint<T, D>] {
        &self.cell_points
    }

    pub fn face_weights(&self) -> &[T] {
        &self.face_weights
    }

    /// Face quadrature points in tangential coordinates.
    pub fn face_points(&self) -> &[Vec<T>] {
        &self.face_points
    }

    /// Face quadrature points embedded into the reference cell on the given local face.
    pub fn face_points_on_cell(&self, local_face: usize) -> Vec<OPoint<T, D>> {
        self.face_points
            .iter()
            .map(|tangential| face_to_cell_coordinates(local_face, tangential))
            .collect()
    }
}

/// The normal axis of a local face.
pub fn face_axis(local_face: usize) -> usize {
    local_face / 2
}

/// The side (0 for `ξ_a = -1`, 1 for `ξ_a = +1`) of a local face.
pub fn face_side(local_face: usize) -> usize {
    local_face % 2
}

/// Embed tangential face coordinates into the reference cell.
///
/// The tangential coordinates are assigned to the axes other than the normal axis of the face,
/// in ascending order.
pub fn face_to_cell_coordinates<T, D>(local_face: usize, tangential: &[T]) -> OPoint<T, D>
where
    T: Real,
    D: SmallDim,
    DefaultAllocator: DimAllocator<T, D>,
{
    let axis = face_axis(local_face);
    let normal_coordinate = if face_side(local_face) == 0 { -T::one() } else { T::one() };
    let mut point = OPoint::<T, D>::origin();
    let mut tangential_iter = tangential.iter();
    for a in 0..D::dim() {
        point[a] = if a == axis {
            normal_coordinate
        } else {
            tangential_iter.next().copied().unwrap_or_else(T::zero)
        };
    }
    point
}
