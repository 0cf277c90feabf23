//! Quadrature rules for tensor-product reference domains.
//!
//! The main purpose of this crate is to support the `matfree` library. However, the rules
//! available here may be used completely independently of `matfree`.
//!
//! All reference domains are hypercubes `[-1, 1]^d`. Multi-dimensional rules are tensor products
//! of one-dimensional Gauss rules, stored lexicographically with the *first* coordinate running
//! fastest. Points of the one-dimensional rules are sorted in ascending order and are exactly
//! symmetric about the origin, i.e. `points[n - 1 - i] == -points[i]`.

use std::fmt;
use std::fmt::{Display, Formatter};

pub mod tensor;
pub mod univariate;

/// Library-wide error type.
#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum Error {
    /// Indicates that a rule satisfying the given requirements is not available.
    NoRuleAvailable,
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoRuleAvailable => {
                write!(f, "There is no quadrature rule satisfying the requirements available")
            }
        }
    }
}

impl std::error::Error for Error {}

/// A D-dimensional point.
pub type Point<const D: usize> = [f64; D];

/// A D-dimensional rule.
pub type Rule<const D: usize> = (Vec<f64>, Vec<Point<D>>);

/// A rule whose dimension is only known at runtime.
///
/// Each point has as many coordinates as the dimension of the rule.
pub type DynRule = (Vec<f64>, Vec<Vec<f64>>);
