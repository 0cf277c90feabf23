use crate::MatrixFreeError;
use serde::{Deserialize, Serialize};

/// Execution schedule of the batches within a pass.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Parallelism {
    /// All batches are processed in order on the calling thread.
    Serial,
    /// Batches are partitioned into colors with disjoint write sets. Colors are processed one
    /// after the other, the batches of each color in parallel on the rayon thread pool.
    #[default]
    Colored,
}

/// Configuration of a [`MatrixFreeOperator`](crate::operator::MatrixFreeOperator).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatrixFreeConfig {
    /// Polynomial degree `k` of the tensor-product Lagrange element.
    pub degree: usize,
    /// Number of Gauss points per direction. Defaults to `degree + 1` if not set.
    pub quadrature_points_per_dim: Option<usize>,
    /// Maximum number of cells or faces per batch.
    pub batch_width: usize,
    pub parallelism: Parallelism,
}

impl Default for MatrixFreeConfig {
    fn default() -> Self {
        Self {
            degree: 1,
            quadrature_points_per_dim: None,
            batch_width: 4,
            parallelism: Parallelism::default(),
        }
    }
}

impl MatrixFreeConfig {
    pub fn new(degree: usize) -> Self {
        Self {
            degree,
            ..Self::default()
        }
    }

    pub fn with_quadrature_points_per_dim(self, num_points: usize) -> Self {
        Self {
            quadrature_points_per_dim: Some(num_points),
            ..self
        }
    }

    pub fn with_batch_width(self, batch_width: usize) -> Self {
        Self { batch_width, ..self }
    }

    pub fn with_parallelism(self, parallelism: Parallelism) -> Self {
        Self { parallelism, ..self }
    }

    pub fn num_quadrature_points_per_dim(&self) -> usize {
        self.quadrature_points_per_dim.unwrap_or(self.degree + 1)
    }

    pub fn validate(&self) -> Result<(), MatrixFreeError> {
        if self.batch_width == 0 {
            return Err(MatrixFreeError::InvalidConfiguration(
                "batch width must be positive".to_string(),
            ));
        }
        if self.num_quadrature_points_per_dim() == 0 {
            return Err(MatrixFreeError::InvalidConfiguration(
                "number of quadrature points must be positive".to_string(),
            ));
        }
        Ok(())
    }
}
