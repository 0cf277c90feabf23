//! Sum factorization: application of tensor products of one-dimensional matrices by successive
//! contractions along each axis.
//!
//! Tensors are stored with the batch lane innermost, followed by the axes with the first axis
//! running fastest. The entry with multi-index `(i_0, ..., i_{d-1})` and lane `l` of a tensor with
//! extents `(n_0, ..., n_{d-1})` and `L` lanes is stored at
//! `((i_{d-1} n_{d-2} + ...) n_0 + i_0) L + l`.
use crate::{Real, MAX_DIM};
use nalgebra::DMatrix;
use std::mem;

/// Contract a tensor with a matrix along a single axis.
///
/// Computes `output[.., r, ..] (+)= Σ_c M[r, c] input[.., c, ..]` along `axis`, where `M` is
/// `matrix` or its transpose. `shape` holds the extents of `input`.
#[allow(clippy::too_many_arguments)]
pub fn contract_axis<T: Real>(
    matrix: &DMatrix<T>,
    transpose: bool,
    axis: usize,
    shape: &[usize],
    lanes: usize,
    input: &[T],
    output: &mut [T],
    accumulate: bool,
) {
    let (n_out, n_in) = if transpose {
        (matrix.ncols(), matrix.nrows())
    } else {
        (matrix.nrows(), matrix.ncols())
    };
    assert_eq!(shape[axis], n_in, "Extent of contracted axis must match matrix");

    let stride: usize = lanes * shape[..axis].iter().product::<usize>();
    let n_outer: usize = shape[axis + 1..].iter().product();
    assert_eq!(input.len(), stride * n_in * n_outer);
    assert_eq!(output.len(), stride * n_out * n_outer);

    if !accumulate {
        output.fill(T::zero());
    }

    for outer in 0..n_outer {
        let input_block = &input[outer * n_in * stride..(outer + 1) * n_in * stride];
        let output_block = &mut output[outer * n_out * stride..(outer + 1) * n_out * stride];
        for r in 0..n_out {
            let output_row = &mut output_block[r * stride..(r + 1) * stride];
            for c in 0..n_in {
                let coefficient = if transpose { matrix[(c, r)] } else { matrix[(r, c)] };
                let input_row = &input_block[c * stride..(c + 1) * stride];
                for (out, &x) in output_row.iter_mut().zip(input_row) {
                    *out += coefficient * x;
                }
            }
        }
    }
}

/// Scratch buffers for intermediate results of tensor contractions.
#[derive(Debug, Clone)]
pub struct TensorWorkspace<T> {
    current: Vec<T>,
    next: Vec<T>,
}

impl<T> Default for TensorWorkspace<T> {
    fn default() -> Self {
        Self {
            current: Vec::new(),
            next: Vec::new(),
        }
    }
}

/// Apply the tensor product `M_{d-1} ⊗ ... ⊗ M_0` of the given matrices (or of their transposes)
/// to `input`.
///
/// Without transposition, axes are contracted in ascending order; with transposition in
/// descending order, so that the transposed application is the exact adjoint of the forward
/// application, operation for operation. If `accumulate` is set, the result is added to `output`.
///
/// Returns the extents of the result.
#[allow(clippy::too_many_arguments)]
pub fn apply_tensor_product<T: Real>(
    factors: &[&DMatrix<T>],
    transpose: bool,
    input_shape: &[usize],
    lanes: usize,
    input: &[T],
    output: &mut [T],
    accumulate: bool,
    workspace: &mut TensorWorkspace<T>,
) -> [usize; MAX_DIM] {
    let dim = factors.len();
    assert!(dim <= MAX_DIM);
    assert_eq!(input_shape.len(), dim);

    let mut shape = [1; MAX_DIM];
    shape[..dim].copy_from_slice(input_shape);

    if dim == 0 {
        accumulate_or_copy(input, output, accumulate);
        return shape;
    }

    let mut current = mem::take(&mut workspace.current);
    let mut next = mem::take(&mut workspace.next);
    let mut current_is_input = true;

    for step in 0..dim {
        let axis = if transpose { dim - 1 - step } else { step };
        let matrix = factors[axis];
        let mut next_shape = shape;
        next_shape[axis] = if transpose { matrix.ncols() } else { matrix.nrows() };
        let next_len = lanes * next_shape[..dim].iter().product::<usize>();

        let source: &[T] = if current_is_input { input } else { &current };
        if step + 1 == dim {
            contract_axis(matrix, transpose, axis, &shape[..dim], lanes, source, output, accumulate);
        } else {
            next.resize(next_len, T::zero());
            contract_axis(matrix, transpose, axis, &shape[..dim], lanes, source, &mut next, false);
            mem::swap(&mut current, &mut next);
            current_is_input = false;
        }
        shape = next_shape;
    }

    workspace.current = current;
    workspace.next = next;
    shape
}

fn accumulate_or_copy<T: Real>(input: &[T], output: &mut [T], accumulate: bool) {
    if accumulate {
        for (out, &x) in output.iter_mut().zip(input) {
            *out += x;
        }
    } else {
        output.copy_from_slice(input);
    }
}
