use crate::allocators::DimAllocator;
use crate::kernels::{CellKernel, FaceContext, FaceKernel, FaceTestValues, PointValues};
use crate::{Real, SmallDim};
use nalgebra::{DefaultAllocator, OPoint, OVector};

/// The mass operator `∫ u v dx`, without face terms.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct Mass;

impl<T, D> CellKernel<T, D> for Mass
where
    T: Real,
    D: SmallDim,
    DefaultAllocator: DimAllocator<T, D>,
{
    fn evaluate_cell(&self, _point: &OPoint<T, D>, u: &PointValues<T, D>) -> PointValues<T, D> {
        PointValues::new(u.value, OVector::<T, D>::zeros())
    }
}

impl<T, D> FaceKernel<T, D> for Mass
where
    T: Real,
    D: SmallDim,
    DefaultAllocator: DimAllocator<T, D>,
{
    fn evaluate_face(
        &self,
        _context: &FaceContext<T, D>,
        _interior: &PointValues<T, D>,
        _exterior: Option<&PointValues<T, D>>,
    ) -> FaceTestValues<T, D> {
        FaceTestValues {
            interior: PointValues::zero(),
            exterior: None,
        }
    }
}
