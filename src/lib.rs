//! Matrix-free evaluation of finite element operators.
//!
//! Instead of assembling a sparse matrix, the action of the operator on a vector is computed by
//! looping over batches of cells and faces, interpolating the local coefficients to quadrature
//! points with *sum factorization* on a tensor-product Lagrange basis, applying a pointwise
//! kernel, and integrating back against the test functions. Face terms of discontinuous Galerkin
//! discretizations are handled by evaluating both adjacent cells on the shared face and
//! reconciling their independent orientations.
//!
//! The entry point is [`operator::MatrixFreeOperator`]. The [`oracle`] module assembles the same
//! operator as an explicit sparse matrix for verification.

use nalgebra::{DimMin, DimName, RealField};

pub mod allocators;
pub mod basis;
pub mod batch;
pub mod config;
pub mod constraints;
pub mod dofs;
pub mod error;
pub mod evaluator;
pub mod geometry;
pub mod interpolate;
pub mod kernels;
pub mod mesh;
pub mod operator;
pub mod oracle;
pub mod quadrature;
pub mod sum_factorization;
pub mod vector;

#[cfg(feature = "proptest-support")]
pub mod proptest;

pub use error::MatrixFreeError;

pub extern crate nalgebra;
pub extern crate nalgebra_sparse;

/// A small, fixed-size dimension.
///
/// Used as a trait alias for various traits frequently needed by generic `matfree` routines.
/// Only dimensions 1, 2 and 3 are supported by the operator.
pub trait SmallDim: DimName + DimMin<Self, Output = Self> {}

impl<D> SmallDim for D where D: DimName + DimMin<Self, Output = Self> {}

/// Scalar type used throughout the library.
pub trait Real: RealField + Copy {}

impl<T: RealField + Copy> Real for T {}

/// The largest dimension supported by the evaluators.
pub const MAX_DIM: usize = 3;
