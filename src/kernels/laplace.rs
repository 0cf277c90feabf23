use crate::allocators::DimAllocator;
use crate::kernels::{CellKernel, FaceContext, FaceKernel, FaceTestValues, PointValues};
use crate::{Real, SmallDim};
use nalgebra::{convert, DefaultAllocator, OPoint};
use numeric_literals::replace_float_literals;

/// Symmetric interior penalty discretization of the Laplacian `-Δu`.
///
/// The bilinear form is
///
/// ```text
/// a(u, v) = Σ_K ∫_K ∇u · ∇v
///         + Σ_F ∫_F σ [u] [v] - {∂_n u} [v] - [u] {∂_n v},
/// ```
///
/// with jumps `[u] = u⁻ - u⁺` and averages `{∂_n u} = (∇u⁻ + ∇u⁺) · n / 2` taken with respect to
/// the outward normal `n` of the interior side. The penalty is `σ = (k + 1)² (1/h⁻ + 1/h⁺)`.
/// Boundary faces use the mirror value `u⁺ = -u⁻`, which imposes homogeneous Dirichlet conditions
/// weakly.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct SipgLaplace;

impl<T, D> CellKernel<T, D> for SipgLaplace
where
    T: Real,
    D: SmallDim,
    DefaultAllocator: DimAllocator<T, D>,
{
    fn evaluate_cell(&self, _point: &OPoint<T, D>, u: &PointValues<T, D>) -> PointValues<T, D> {
        PointValues::new(T::zero(), u.gradient.clone())
    }
}

impl<T, D> FaceKernel<T, D> for SipgLaplace
where
    T: Real,
    D: SmallDim,
    DefaultAllocator: DimAllocator<T, D>,
{
    #[replace_float_literals(T::from_f64(literal).expect("Literal must fit in T"))]
    fn evaluate_face(
        &self,
        context: &FaceContext<T, D>,
        interior: &PointValues<T, D>,
        exterior: Option<&PointValues<T, D>>,
    ) -> FaceTestValues<T, D> {
        let n = context.normal;
        let penalty_factor: T = convert(((context.degree + 1) * (context.degree + 1)) as f64);
        let h_inv = context.interior_inverse_length;

        match exterior {
            Some(exterior) => {
                let h_inv_exterior = context.exterior_inverse_length.unwrap_or(h_inv);
                let sigma = penalty_factor * (h_inv + h_inv_exterior);
                let jump = interior.value - exterior.value;
                let average_normal_derivative = 0.5 * (&interior.gradient + &exterior.gradient).dot(n);
                let flux = sigma * jump - average_normal_derivative;
                let gradient_coefficient = n * (-0.5 * jump);
                FaceTestValues {
                    interior: PointValues::new(flux, gradient_coefficient.clone()),
                    exterior: Some(PointValues::new(-flux, gradient_coefficient)),
                }
            }
            None => {
                let sigma = 2.0 * penalty_factor * h_inv;
                let jump = 2.0 * interior.value;
                let flux = sigma * jump - interior.gradient.dot(n);
                FaceTestValues {
                    interior: PointValues::new(flux, n * (-0.5 * jump)),
                    exterior: None,
                }
            }
        }
    }
}
