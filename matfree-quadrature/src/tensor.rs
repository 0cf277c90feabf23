//! Quadrature rules formed by tensor products of one-dimensional Gauss rules.
//!
//! Points are stored lexicographically with the first coordinate running fastest, i.e. the point
//! with multi-index `(i_0, i_1, ..., i_{d-1})` is stored at linear index
//! `i_0 + n i_1 + ... + n^{d-1} i_{d-1}`. This matches the layout used by sum factorization.

use crate::univariate::try_gauss;
use crate::{DynRule, Error, Rule};

/// A Gauss rule for the reference hypercube `[-1, 1]^D` with the given number of points per
/// dimension.
///
/// # Panics
///
/// Panics if zero points are requested.
pub fn hypercube_gauss<const D: usize>(num_points_per_dim: usize) -> Rule<D> {
    let (weights, points) = tensor_gauss(num_points_per_dim, D).expect("number of points must be positive");
    let points = points
        .into_iter()
        .map(|p| {
            let mut point = [0.0; D];
            point.copy_from_slice(&p);
            point
        })
        .collect();
    (weights, points)
}

/// A Gauss quadrature rule for the reference quadrilateral.
pub fn quadrilateral_gauss(num_points_per_dim: usize) -> Rule<2> {
    hypercube_gauss::<2>(num_points_per_dim)
}

/// A Gauss quadrature rule for the reference hexahedron.
pub fn hexahedron_gauss(num_points_per_dim: usize) -> Rule<3> {
    hypercube_gauss::<3>(num_points_per_dim)
}

/// A Gauss rule for the reference hypercube `[-1, 1]^dim`, where the dimension is only known at
/// runtime.
///
/// A zero-dimensional rule consists of the single empty point with weight `1`, which is the
/// rule used for the "faces" of one-dimensional cells.
pub fn tensor_gauss(num_points_per_dim: usize, dim: usize) -> Result<DynRule, Error> {
    let (weights1d, points1d) = try_gauss(num_points_per_dim)?;
    let n = num_points_per_dim;
    let num_points = n.pow(dim as u32);

    let mut weights = Vec::with_capacity(num_points);
    let mut points = Vec::with_capacity(num_points);
    for linear_index in 0..num_points {
        let mut remainder = linear_index;
        let mut weight = 1.0;
        let mut point = Vec::with_capacity(dim);
        for _ in 0..dim {
            let i = remainder % n;
            remainder /= n;
            weight *= weights1d[i];
            point.push(points1d[i][0]);
        }
        weights.push(weight);
        points.push(point);
    }

    Ok((weights, points))
}
