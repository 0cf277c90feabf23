//! Error type for operator construction and application.
use crate::quadrature::QuadratureError;
use std::fmt;
use std::fmt::{Display, Formatter};

/// Library-wide error type.
///
/// All variants describe precondition violations. They are deterministic functions of the
/// input, so retrying the failed call with the same input has no effect.
#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum MatrixFreeError {
    /// The reference-to-physical map of a cell has a non-positive Jacobian determinant.
    InvalidGeometry { cell: usize, determinant: f64 },
    /// A physical point could not be mapped back to the reference cell.
    PointInversionFailed { cell: usize },
    /// A cell connectivity does not have `2^d` vertices, or references a vertex out of bounds.
    InvalidCellConnectivity { cell: usize },
    /// The number of DoFs of a cell disagrees with the basis size implied by the element degree.
    InconsistentDofCount { cell: usize, expected: usize, actual: usize },
    /// The two sides of an interior face disagree on the number of DoFs.
    InconsistentFaceDofs { interior_cell: usize, exterior_cell: usize },
    /// No symmetry of the reference face reconciles the vertex numbering of the two sides.
    InconsistentFaceOrientation { interior_cell: usize, exterior_cell: usize },
    /// A face is shared by more than two cells.
    NonManifoldFace { cells: Vec<usize> },
    /// A DoF index (in a cell or in a constraint) is out of bounds.
    DofIndexOutOfBounds { index: usize, num_dofs: usize },
    /// The constraints contain a cycle through the given DoF.
    CyclicConstraints { dof: usize },
    /// A vector or exchange has the wrong size.
    SizeMismatch { expected: usize, actual: usize },
    /// The mesh dimension is not supported.
    UnsupportedDimension { dim: usize },
    /// The configuration is invalid.
    InvalidConfiguration(String),
    /// No quadrature rule with the requested properties is available.
    Quadrature(QuadratureError),
}

impl Display for MatrixFreeError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidGeometry { cell, determinant } => {
                write!(f, "non-positive Jacobian determinant {determinant:e} in cell {cell}")
            }
            Self::PointInversionFailed { cell } => {
                write!(f, "failed to map a physical point back to the reference domain of cell {cell}")
            }
            Self::InvalidCellConnectivity { cell } => {
                write!(f, "invalid vertex connectivity for cell {cell}")
            }
            Self::InconsistentDofCount { cell, expected, actual } => {
                write!(f, "cell {cell} has {actual} DoFs, but the element requires {expected}")
            }
            Self::InconsistentFaceDofs {
                interior_cell,
                exterior_cell,
            } => {
                write!(
                    f,
                    "cells {interior_cell} and {exterior_cell} disagree on the number of DoFs on their shared face"
                )
            }
            Self::InconsistentFaceOrientation {
                interior_cell,
                exterior_cell,
            } => {
                write!(
                    f,
                    "cannot reconcile the orientation of the face shared by cells {interior_cell} and {exterior_cell}"
                )
            }
            Self::NonManifoldFace { cells } => {
                write!(f, "face shared by more than two cells: {cells:?}")
            }
            Self::DofIndexOutOfBounds { index, num_dofs } => {
                write!(f, "DoF index {index} out of bounds for {num_dofs} DoFs")
            }
            Self::CyclicConstraints { dof } => {
                write!(f, "constraints form a cycle through DoF {dof}")
            }
            Self::SizeMismatch { expected, actual } => {
                write!(f, "size mismatch: expected {expected}, got {actual}")
            }
            Self::UnsupportedDimension { dim } => {
                write!(f, "unsupported dimension {dim}")
            }
            Self::InvalidConfiguration(message) => {
                write!(f, "invalid configuration: {message}")
            }
            Self::Quadrature(err) => {
                write!(f, "quadrature error: {err}")
            }
        }
    }
}

impl std::error::Error for MatrixFreeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Quadrature(err) => Some(err),
            _ => None,
        }
    }
}

impl From<QuadratureError> for MatrixFreeError {
    fn from(err: QuadratureError) -> Self {
        Self::Quadrature(err)
    }
}
