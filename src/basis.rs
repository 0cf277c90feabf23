//! Tensor-product Lagrange basis on the reference hypercube.
//!
//! The basis of degree `k` in `d` dimensions is the tensor product of `k + 1` one-dimensional
//! Lagrange polynomials. Local basis functions are numbered lexicographically with the first axis
//! running fastest, the same layout as tensor quadrature points.
use crate::allocators::DimAllocator;
use crate::{Real, SmallDim};
use nalgebra::{convert, DMatrix, DefaultAllocator, OPoint, OVector};

/// One-dimensional Lagrange polynomials on `[-1, 1]`.
#[derive(Debug, Clone, PartialEq)]
pub struct LagrangeBasis1d<T> {
    nodes: Vec<T>,
}

impl<T: Real> LagrangeBasis1d<T> {
    /// Lagrange basis on `degree + 1` equidistant nodes including the end points.
    ///
    /// The degree zero basis has a single node at the midpoint.
    pub fn equidistant(degree: usize) -> Self {
        let nodes = if degree == 0 {
            vec![T::zero()]
        } else {
            let k: T = convert(degree as f64);
            (0..=degree)
                .map(|i| -T::one() + convert::<_, T>(2.0 * i as f64) / k)
                .collect()
        };
        Self { nodes }
    }

    pub fn nodes(&self) -> &[T] {
        &self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn value(&self, i: usize, x: T) -> T {
        let x_i = self.nodes[i];
        self.nodes
            .iter()
            .enumerate()
            .filter(|&(m, _)| m != i)
            .fold(T::one(), |product, (_, &x_m)| product * (x - x_m) / (x_i - x_m))
    }

    pub fn derivative(&self, i: usize, x: T) -> T {
        let x_i = self.nodes[i];
        let mut sum = T::zero();
        for (m, &x_m) in self.nodes.iter().enumerate().filter(|&(m, _)| m != i) {
            let mut product = T::one() / (x_i - x_m);
            for (l, &x_l) in self.nodes.iter().enumerate() {
                if l != i && l != m {
                    product *= (x - x_l) / (x_i - x_l);
                }
            }
            sum += product;
        }
        sum
    }
}

/// One-dimensional shape data of the basis, tabulated at the quadrature points and at the two
/// end points of the reference interval.
///
/// All matrices have one row per evaluation point and one column per basis function.
#[derive(Debug, Clone, PartialEq)]
pub struct ShapeInfo<T: Real> {
    degree: usize,
    basis: LagrangeBasis1d<T>,
    values: DMatrix<T>,
    gradients: DMatrix<T>,
    face_values: [DMatrix<T>; 2],
    face_gradients: [DMatrix<T>; 2],
}

impl<T: Real> ShapeInfo<T> {
    pub fn new(degree: usize, quadrature_points_1d: &[T]) -> Self {
        let basis = LagrangeBasis1d::equidistant(degree);
        let n = basis.len();
        let n_q = quadrature_points_1d.len();
        let values = DMatrix::from_fn(n_q, n, |q, i| basis.value(i, quadrature_points_1d[q]));
        let gradients = DMatrix::from_fn(n_q, n, |q, i| basis.derivative(i, quadrature_points_1d[q]));
        let end_point_row = |x: T, derivative: bool| {
            DMatrix::from_fn(1, n, |_, i| {
                if derivative {
                    basis.derivative(i, x)
                } else {
                    basis.value(i, x)
                }
            })
        };
        let face_values = [end_point_row(-T::one(), false), end_point_row(T::one(), false)];
        let face_gradients = [end_point_row(-T::one(), true), end_point_row(T::one(), true)];
        Self {
            degree,
            basis,
            values,
            gradients,
            face_values,
            face_gradients,
        }
    }

    pub fn degree(&self) -> usize {
        self.degree
    }

    pub fn basis(&self) -> &LagrangeBasis1d<T> {
        &self.basis
    }

    pub fn n_dofs_1d(&self) -> usize {
        self.basis.len()
    }

    pub fn n_q_1d(&self) -> usize {
        self.values.nrows()
    }

    pub fn dofs_per_cell(&self, dim: usize) -> usize {
        self.n_dofs_1d().pow(dim as u32)
    }

    /// Basis values at the quadrature points, `n_q × (k + 1)`.
    pub fn values(&self) -> &DMatrix<T> {
        &self.values
    }

    /// Basis derivatives at the quadrature points, `n_q × (k + 1)`.
    pub fn gradients(&self) -> &DMatrix<T> {
        &self.gradients
    }

    /// Basis values at the end point `-1` (`side = 0`) or `+1` (`side = 1`), `1 × (k + 1)`.
    pub fn face_values(&self, side: usize) -> &DMatrix<T> {
        &self.face_values[side]
    }

    /// Basis derivatives at the end point `-1` (`side = 0`) or `+1` (`side = 1`), `1 × (k + 1)`.
    pub fn face_gradients(&self, side: usize) -> &DMatrix<T> {
        &self.face_gradients[side]
    }

    /// Directly evaluate a tensor-product basis function and its reference gradient at an
    /// arbitrary reference point.
    pub fn evaluate_tensor_basis<D>(&self, local_dof: usize, xi: &OPoint<T, D>) -> (T, OVector<T, D>)
    where
        D: SmallDim,
        DefaultAllocator: DimAllocator<T, D>,
    {
        let n = self.n_dofs_1d();
        let multi_index = OVector::<usize, D>::from_fn(|a, _| (local_dof / n.pow(a as u32)) % n);
        let values_1d = OVector::<T, D>::from_fn(|a, _| self.basis.value(multi_index[a], xi[a]));
        let derivatives_1d = OVector::<T, D>::from_fn(|a, _| self.basis.derivative(multi_index[a], xi[a]));

        let value = values_1d.iter().fold(T::one(), |product, &v| product * v);
        let gradient = OVector::<T, D>::from_fn(|b, _| {
            (0..D::dim()).fold(T::one(), |product, a| {
                product * if a == b { derivatives_1d[a] } else { values_1d[a] }
            })
        });
        (value, gradient)
    }

    /// The reference coordinates of the node associated with a local DoF.
    pub fn node_coordinates<D>(&self, local_dof: usize) -> OPoint<T, D>
    where
        D: SmallDim,
        DefaultAllocator: DimAllocator<T, D>,
    {
        let n = self.n_dofs_1d();
        let mut point = OPoint::<T, D>::origin();
        for a in 0..D::dim() {
            point[a] = self.basis.nodes()[(local_dof / n.pow(a as u32)) % n];
        }
        point
    }
}
