//! Evaluation of finite element functions at cell and face quadrature points, and the adjoint
//! integration against all test functions.
//!
//! All buffers hold a batch of cells or faces with the lane index innermost:
//!
//! - DoF coefficients: `[dof][lane]`,
//! - values: `[point][lane]`,
//! - reference gradients: `[component][point][lane]`.
//!
//! Face quadrature points are ordered by the tangential axes of the face of the evaluated cell,
//! so the two sides of an interior face generally see different orderings.
use crate::basis::ShapeInfo;
use crate::quadrature::{face_axis, face_side};
use crate::sum_factorization::{apply_tensor_product, TensorWorkspace};
use crate::{Real, MAX_DIM};
use nalgebra::DMatrix;

/// Per-side buffers of a batch.
#[derive(Debug, Clone)]
pub struct SideBuffers<T> {
    pub dofs: Vec<T>,
    pub values: Vec<T>,
    pub gradients: Vec<T>,
}

impl<T> Default for SideBuffers<T> {
    fn default() -> Self {
        Self {
            dofs: Vec::new(),
            values: Vec::new(),
            gradients: Vec::new(),
        }
    }
}

impl<T: Real> SideBuffers<T> {
    pub fn resize(&mut self, num_dofs: usize, num_points: usize, dim: usize, lanes: usize) {
        self.dofs.resize(num_dofs * lanes, T::zero());
        self.values.resize(num_points * lanes, T::zero());
        self.gradients.resize(dim * num_points * lanes, T::zero());
    }
}

/// Scratch memory of a single thread for processing batches.
#[derive(Debug, Clone)]
pub struct EvaluatorWorkspace<T> {
    pub interior: SideBuffers<T>,
    pub exterior: SideBuffers<T>,
    pub tensor: TensorWorkspace<T>,
}

impl<T> Default for EvaluatorWorkspace<T> {
    fn default() -> Self {
        Self {
            interior: SideBuffers::default(),
            exterior: SideBuffers::default(),
            tensor: TensorWorkspace::default(),
        }
    }
}

/// Number of evaluation points of a cell (`local_face = None`) or of one of its faces.
pub fn num_points<T: Real>(shape: &ShapeInfo<T>, dim: usize, local_face: Option<usize>) -> usize {
    let point_dim = if local_face.is_some() { dim - 1 } else { dim };
    shape.n_q_1d().pow(point_dim as u32)
}

/// The one-dimensional factors of the tensor product evaluating values (`derivative_axis = None`)
/// or a reference derivative on a cell or face.
fn factors<T: Real>(
    shape: &ShapeInfo<T>,
    dim: usize,
    local_face: Option<usize>,
    derivative_axis: Option<usize>,
) -> [&DMatrix<T>; MAX_DIM] {
    let mut factors = [shape.values(); MAX_DIM];
    for (a, factor) in factors.iter_mut().enumerate().take(dim) {
        let is_derivative = derivative_axis == Some(a);
        *factor = match local_face {
            Some(face) if face_axis(face) == a => {
                if is_derivative {
                    shape.face_gradients(face_side(face))
                } else {
                    shape.face_values(face_side(face))
                }
            }
            _ => {
                if is_derivative {
                    shape.gradients()
                } else {
                    shape.values()
                }
            }
        };
    }
    factors
}

/// Extents of the point tensor, with extent one along the normal axis of a face.
fn point_shape<T: Real>(shape: &ShapeInfo<T>, dim: usize, local_face: Option<usize>) -> [usize; MAX_DIM] {
    let mut extents = [1; MAX_DIM];
    for (a, extent) in extents.iter_mut().enumerate().take(dim) {
        *extent = match local_face {
            Some(face) if face_axis(face) == a => 1,
            _ => shape.n_q_1d(),
        };
    }
    extents
}

/// Interpolate DoF coefficients to values and reference gradients at the points of a cell or
/// face.
#[allow(clippy::too_many_arguments)]
pub fn evaluate<T: Real>(
    shape: &ShapeInfo<T>,
    dim: usize,
    local_face: Option<usize>,
    lanes: usize,
    dofs: &[T],
    values: &mut [T],
    gradients: &mut [T],
    workspace: &mut TensorWorkspace<T>,
) {
    let dof_shape = [shape.n_dofs_1d(); MAX_DIM];
    let block = num_points(shape, dim, local_face) * lanes;

    let value_factors = factors(shape, dim, local_face, None);
    apply_tensor_product(
        &value_factors[..dim],
        false,
        &dof_shape[..dim],
        lanes,
        dofs,
        &mut values[..block],
        false,
        workspace,
    );
    for component in 0..dim {
        let gradient_factors = factors(shape, dim, local_face, Some(component));
        apply_tensor_product(
            &gradient_factors[..dim],
            false,
            &dof_shape[..dim],
            lanes,
            dofs,
            &mut gradients[component * block..(component + 1) * block],
            false,
            workspace,
        );
    }
}

/// Integrate value and reference gradient test coefficients at the points of a cell or face
/// against all basis functions.
///
/// This is the exact transpose of [`evaluate`]. The result overwrites `dofs`.
#[allow(clippy::too_many_arguments)]
pub fn integrate<T: Real>(
    shape: &ShapeInfo<T>,
    dim: usize,
    local_face: Option<usize>,
    lanes: usize,
    values: &[T],
    gradients: &[T],
    dofs: &mut [T],
    workspace: &mut TensorWorkspace<T>,
) {
    let extents = point_shape(shape, dim, local_face);
    let block = num_points(shape, dim, local_face) * lanes;

    let value_factors = factors(shape, dim, local_face, None);
    apply_tensor_product(
        &value_factors[..dim],
        true,
        &extents[..dim],
        lanes,
        &values[..block],
        dofs,
        false,
        workspace,
    );
    for component in 0..dim {
        let gradient_factors = factors(shape, dim, local_face, Some(component));
        apply_tensor_product(
            &gradient_factors[..dim],
            true,
            &extents[..dim],
            lanes,
            &gradients[component * block..(component + 1) * block],
            dofs,
            true,
            workspace,
        );
    }
}
