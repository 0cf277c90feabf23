use crate::allocators::DimAllocator;
use crate::kernels::{CellKernel, FaceContext, FaceKernel, FaceTestValues, PointValues};
use crate::{Real, SmallDim};
use nalgebra::{DefaultAllocator, OPoint, OVector};

/// Upwind discretization of the advection operator `∇ · (β u)` with constant velocity `β`.
///
/// The bilinear form is `-Σ_K ∫_K u β · ∇v + Σ_F ∫_F (β · n) u_up [v]`, where `u_up` is the
/// trace from the upwind side. Inflow boundaries carry zero data, outflow boundaries let the
/// interior value leave the domain.
#[derive(Debug, Clone, PartialEq)]
pub struct UpwindAdvection<T, D>
where
    T: Real,
    D: SmallDim,
    DefaultAllocator: DimAllocator<T, D>,
{
    pub velocity: OVector<T, D>,
}

impl<T, D> UpwindAdvection<T, D>
where
    T: Real,
    D: SmallDim,
    DefaultAllocator: DimAllocator<T, D>,
{
    pub fn new(velocity: OVector<T, D>) -> Self {
        Self { velocity }
    }
}

impl<T, D> CellKernel<T, D> for UpwindAdvection<T, D>
where
    T: Real,
    D: SmallDim,
    DefaultAllocator: DimAllocator<T, D>,
{
    fn evaluate_cell(&self, _point: &OPoint<T, D>, u: &PointValues<T, D>) -> PointValues<T, D> {
        PointValues::new(T::zero(), &self.velocity * (-u.value))
    }
}

impl<T, D> FaceKernel<T, D> for UpwindAdvection<T, D>
where
    T: Real,
    D: SmallDim,
    DefaultAllocator: DimAllocator<T, D>,
{
    fn evaluate_face(
        &self,
        context: &FaceContext<T, D>,
        interior: &PointValues<T, D>,
        exterior: Option<&PointValues<T, D>>,
    ) -> FaceTestValues<T, D> {
        let normal_velocity = self.velocity.dot(context.normal);
        let outflow = normal_velocity >= T::zero();
        match exterior {
            Some(exterior) => {
                let upwind_value = if outflow { interior.value } else { exterior.value };
                let flux = normal_velocity * upwind_value;
                FaceTestValues {
                    interior: PointValues::new(flux, OVector::<T, D>::zeros()),
                    exterior: Some(PointValues::new(-flux, OVector::<T, D>::zeros())),
                }
            }
            None => {
                let flux = if outflow {
                    normal_velocity * interior.value
                } else {
                    T::zero()
                };
                FaceTestValues {
                    interior: PointValues::new(flux, OVector::<T, D>::zeros()),
                    exterior: None,
                }
            }
        }
    }
}
