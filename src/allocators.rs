//! Helper traits for allocator trait bounds.
use nalgebra::allocator::Allocator;
use nalgebra::{DefaultAllocator, DimName, Scalar, U1};

/// An allocator for a single dimension.
///
/// Covers everything needed for small square matrices of the given dimension, including the
/// workspace of LU decompositions used for determinants and inverses. Vector and matrix storage is
/// `Send + Sync`, so that geometry data and kernels can be shared across the rayon thread pool.
pub trait DimAllocator<T: Scalar, D: DimName>:
    Allocator<T, D, Buffer: Send + Sync>
    + Allocator<T, D, D, Buffer: Send + Sync>
    + Allocator<T, U1, D>
    + Allocator<usize, D>
    + Allocator<(usize, usize), D>
{
}

impl<T, D> DimAllocator<T, D> for DefaultAllocator
where
    T: Scalar,
    D: DimName,
    DefaultAllocator: Allocator<T, D, Buffer: Send + Sync>
        + Allocator<T, D, D, Buffer: Send + Sync>
        + Allocator<T, U1, D>
        + Allocator<usize, D>
        + Allocator<(usize, usize), D>,
{
}
