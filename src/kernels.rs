//! Pointwise kernels applied at cell and face quadrature points.
//!
//! A kernel receives the value and physical gradient of the trial function at a quadrature point
//! and returns *test coefficients*: the factors multiplying the value and gradient of each test
//! function in the integrand. For a cell term `∫ f(u, ∇u) v + g(u, ∇u) · ∇v dx` the kernel
//! returns `(f, g)`. Face kernels do the same for both sides of a face. The quadrature weight and
//! the Jacobian determinant are applied by the operator.
//!
//! Kernels must be linear in `(u, ∇u)` to be comparable with the explicitly assembled matrix of
//! [`oracle`](crate::oracle).
use crate::allocators::DimAllocator;
use crate::{Real, SmallDim};
use nalgebra::{DefaultAllocator, OPoint, OVector};

mod advection;
mod laplace;
mod mass;

pub use advection::*;
pub use laplace::*;
pub use mass::*;

/// Value and physical gradient of a scalar field at a point.
#[derive(Debug, Clone, PartialEq)]
pub struct PointValues<T, D>
where
    T: Real,
    D: SmallDim,
    DefaultAllocator: DimAllocator<T, D>,
{
    pub value: T,
    pub gradient: OVector<T, D>,
}

impl<T, D> PointValues<T, D>
where
    T: Real,
    D: SmallDim,
    DefaultAllocator: DimAllocator<T, D>,
{
    pub fn new(value: T, gradient: OVector<T, D>) -> Self {
        Self { value, gradient }
    }

    pub fn zero() -> Self {
        Self {
            value: T::zero(),
            gradient: OVector::<T, D>::zeros(),
        }
    }
}

/// Geometric data available to face kernels at a face quadrature point.
#[derive(Debug, Clone)]
pub struct FaceContext<'a, T, D>
where
    T: Real,
    D: SmallDim,
    DefaultAllocator: DimAllocator<T, D>,
{
    pub point: &'a OPoint<T, D>,
    /// Outward unit normal of the interior side.
    pub normal: &'a OVector<T, D>,
    /// Inverse length of the interior cell in the direction normal to the face.
    pub interior_inverse_length: T,
    /// Inverse length of the exterior cell, `None` on boundary faces.
    pub exterior_inverse_length: Option<T>,
    /// Boundary id on boundary faces, `None` on interior faces.
    pub boundary_id: Option<usize>,
    /// Polynomial degree of the element.
    pub degree: usize,
}

/// Test coefficients of the two sides of a face.
#[derive(Debug, Clone, PartialEq)]
pub struct FaceTestValues<T, D>
where
    T: Real,
    D: SmallDim,
    DefaultAllocator: DimAllocator<T, D>,
{
    pub interior: PointValues<T, D>,
    /// Ignored on boundary faces. `None` on interior faces is equivalent to zero.
    pub exterior: Option<PointValues<T, D>>,
}

pub trait CellKernel<T, D>: Sync
where
    T: Real,
    D: SmallDim,
    DefaultAllocator: DimAllocator<T, D>,
{
    fn evaluate_cell(&self, point: &OPoint<T, D>, u: &PointValues<T, D>) -> PointValues<T, D>;
}

pub trait FaceKernel<T, D>: Sync
where
    T: Real,
    D: SmallDim,
    DefaultAllocator: DimAllocator<T, D>,
{
    /// Compute test coefficients from the interior and (on interior faces) exterior trial
    /// values.
    ///
    /// A missing `exterior` signals a boundary face, in which case the boundary id of the
    /// context is set.
    fn evaluate_face(
        &self,
        context: &FaceContext<T, D>,
        interior: &PointValues<T, D>,
        exterior: Option<&PointValues<T, D>>,
    ) -> FaceTestValues<T, D>;
}

/// A kernel with both cell and face terms, as needed for discontinuous Galerkin operators.
pub trait DgKernel<T, D>: CellKernel<T, D> + FaceKernel<T, D>
where
    T: Real,
    D: SmallDim,
    DefaultAllocator: DimAllocator<T, D>,
{
}

impl<T, D, K> DgKernel<T, D> for K
where
    T: Real,
    D: SmallDim,
    K: CellKernel<T, D> + FaceKernel<T, D>,
    DefaultAllocator: DimAllocator<T, D>,
{
}
