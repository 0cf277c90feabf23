use crate::allocators::DimAllocator;
use crate::{MatrixFreeError, Real, SmallDim};
use nalgebra::allocator::Allocator;
use nalgebra::{DefaultAllocator, DimName, OMatrix, OPoint, Scalar};
use serde::{de, Deserialize, Deserializer, Serialize};

pub mod procedural;
pub mod topology;

/// Index-based mesh of hypercube cells (segments, quadrilaterals, hexahedra).
///
/// Every cell references `2^d` vertices in lexicographic order: local vertex `v` sits at
/// reference coordinate `-1` along axis `a` if bit `a` of `v` is zero, and at `+1` otherwise.
/// The cell geometry is the multilinear interpolation of its vertices.
///
/// Deserialization validates the connectivity like [`Mesh::try_from_vertices_and_cells`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(bound(serialize = "T: Serialize"))]
pub struct Mesh<T: Scalar, D>
where
    D: DimName,
    DefaultAllocator: Allocator<T, D>,
{
    // serde's not able correctly determine the necessary trait bounds in this case,
    // so write our own
    #[serde(bound(
        serialize = "<DefaultAllocator as Allocator<T, D>>::Buffer: Serialize"
    ))]
    vertices: Vec<OPoint<T, D>>,
    cell_vertices: Vec<usize>,
}

/// Unchecked wire representation of [`Mesh`].
#[derive(Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
struct MeshData<T: Scalar, D>
where
    D: DimName,
    DefaultAllocator: Allocator<T, D>,
{
    #[serde(bound(deserialize = "<DefaultAllocator as Allocator<T, D>>::Buffer: Deserialize<'de>"))]
    vertices: Vec<OPoint<T, D>>,
    cell_vertices: Vec<usize>,
}

impl<'de, T, D> Deserialize<'de> for Mesh<T, D>
where
    T: Scalar + Deserialize<'de>,
    D: DimName,
    DefaultAllocator: Allocator<T, D>,
    <DefaultAllocator as Allocator<T, D>>::Buffer: Deserialize<'de>,
{
    fn deserialize<De>(deserializer: De) -> Result<Self, De::Error>
    where
        De: Deserializer<'de>,
    {
        let MeshData { vertices, cell_vertices } = MeshData::<T, D>::deserialize(deserializer)?;
        let n = Self::vertices_per_cell();
        if cell_vertices.len() % n != 0 {
            return Err(de::Error::custom(MatrixFreeError::InvalidCellConnectivity {
                cell: cell_vertices.len() / n,
            }));
        }
        let cells: Vec<Vec<usize>> = cell_vertices.chunks(n).map(<[usize]>::to_vec).collect();
        Self::try_from_vertices_and_cells(vertices, &cells).map_err(de::Error::custom)
    }
}

impl<T, D> Mesh<T, D>
where
    T: Scalar,
    D: DimName,
    DefaultAllocator: Allocator<T, D>,
{
    /// Number of vertices of each cell, `2^d`.
    pub fn vertices_per_cell() -> usize {
        1 << D::dim()
    }

    /// Construct a mesh from vertices and per-cell vertex indices.
    ///
    /// Fails if a cell does not have exactly `2^d` vertices or references a vertex out of bounds.
    pub fn try_from_vertices_and_cells(
        vertices: Vec<OPoint<T, D>>,
        cells: &[Vec<usize>],
    ) -> Result<Self, MatrixFreeError> {
        let mut cell_vertices = Vec::with_capacity(cells.len() * Self::vertices_per_cell());
        for (cell, indices) in cells.iter().enumerate() {
            let valid = indices.len() == Self::vertices_per_cell() && indices.iter().all(|&v| v < vertices.len());
            if !valid {
                return Err(MatrixFreeError::InvalidCellConnectivity { cell });
            }
            cell_vertices.extend_from_slice(indices);
        }
        Ok(Self { vertices, cell_vertices })
    }

    pub fn vertices(&self) -> &[OPoint<T, D>] {
        &self.vertices
    }

    pub fn vertices_mut(&mut self) -> &mut [OPoint<T, D>] {
        &mut self.vertices
    }

    pub fn num_cells(&self) -> usize {
        self.cell_vertices.len() / Self::vertices_per_cell()
    }

    pub fn cell_vertices(&self, cell: usize) -> &[usize] {
        let n = Self::vertices_per_cell();
        &self.cell_vertices[n * cell..n * (cell + 1)]
    }

    pub fn transform_vertices<F>(&mut self, mut transformation: F)
    where
        F: FnMut(&mut OPoint<T, D>),
    {
        for v in &mut self.vertices {
            transformation(v)
        }
    }

    /// Renumber the vertices of a cell, such that new local vertex `i` is old local vertex
    /// `permutation[i]`.
    ///
    /// The caller is responsible for choosing a permutation that corresponds to a symmetry of the
    /// reference cell, otherwise the cell becomes inverted or self-intersecting.
    pub fn permute_cell_vertices(&mut self, cell: usize, permutation: &[usize]) {
        assert_eq!(permutation.len(), Self::vertices_per_cell());
        let old = self.cell_vertices(cell).to_vec();
        let n = Self::vertices_per_cell();
        for (i, &p) in permutation.iter().enumerate() {
            self.cell_vertices[n * cell + i] = old[p];
        }
    }
}

impl<T, D> Mesh<T, D>
where
    T: Real,
    D: SmallDim,
    DefaultAllocator: DimAllocator<T, D>,
{
    /// Map a point in reference coordinates of the given cell to physical coordinates.
    pub fn map_reference_coords(&self, cell: usize, xi: &OPoint<T, D>) -> OPoint<T, D> {
        let mut x = OPoint::origin();
        for (v, &vertex_index) in self.cell_vertices(cell).iter().enumerate() {
            let weight = multilinear_weight(v, xi, None);
            x.coords += &self.vertices[vertex_index].coords * weight;
        }
        x
    }

    /// The Jacobian `∂x/∂ξ` of the reference-to-physical map of the given cell.
    pub fn reference_jacobian(&self, cell: usize, xi: &OPoint<T, D>) -> OMatrix<T, D, D> {
        let mut jacobian = OMatrix::<T, D, D>::zeros();
        for (v, &vertex_index) in self.cell_vertices(cell).iter().enumerate() {
            let x_v = &self.vertices[vertex_index];
            for b in 0..D::dim() {
                let weight_derivative = multilinear_weight(v, xi, Some(b));
                for i in 0..D::dim() {
                    jacobian[(i, b)] += x_v[i] * weight_derivative;
                }
            }
        }
        jacobian
    }

    /// Find the reference coordinates of a physical point in the given cell with Newton's
    /// method.
    ///
    /// The iteration stops once the norm of a Newton update in reference coordinates drops below
    /// `tolerance`. Since the final update is still applied, the result is accurate to roughly
    /// the square of the tolerance.
    ///
    /// Returns `None` if the iteration fails to converge or encounters a singular Jacobian.
    pub fn invert_reference_map(
        &self,
        cell: usize,
        x: &OPoint<T, D>,
        initial_guess: &OPoint<T, D>,
        tolerance: T,
    ) -> Option<OPoint<T, D>> {
        let max_iterations = 50;
        let mut xi = initial_guess.clone();
        for _ in 0..max_iterations {
            let residual = x - self.map_reference_coords(cell, &xi);
            let jacobian_inv = self.reference_jacobian(cell, &xi).try_inverse()?;
            let step = jacobian_inv * residual;
            xi += &step;
            if step.norm() <= tolerance {
                return Some(xi);
            }
        }
        None
    }
}

/// The value (or the derivative along `derivative_axis`) of the multilinear weight of local
/// vertex `v` at reference coordinates `xi`.
fn multilinear_weight<T, D>(v: usize, xi: &OPoint<T, D>, derivative_axis: Option<usize>) -> T
where
    T: Real,
    D: SmallDim,
    DefaultAllocator: DimAllocator<T, D>,
{
    let half = T::one() / (T::one() + T::one());
    (0..D::dim()).fold(T::one(), |product, a| {
        let sign = if (v >> a) & 1 == 0 { -T::one() } else { T::one() };
        let factor = if derivative_axis == Some(a) {
            sign * half
        } else {
            (T::one() + sign * xi[a]) * half
        };
        product * factor
    })
}
