//! Basic procedural mesh generation routines.
use crate::allocators::DimAllocator;
use crate::mesh::Mesh;
use crate::{Real, SmallDim};
use nalgebra::{convert, DefaultAllocator, OPoint, OVector};

/// Uniform mesh of the unit hypercube `[0, 1]^d` with `cells_per_dim` cells along each axis.
pub fn create_unit_hypercube_mesh<T, D>(cells_per_dim: usize) -> Mesh<T, D>
where
    T: Real,
    D: SmallDim,
    DefaultAllocator: DimAllocator<T, D>,
{
    create_rectangular_uniform_hypercube_mesh(
        &OPoint::origin(),
        &OVector::<T, D>::repeat(T::one()),
        &OVector::<usize, D>::repeat(cells_per_dim),
    )
}

/// Uniform axis-aligned mesh of the box `origin + [0, extents]` with the given number of cells
/// along each axis.
///
/// Cells and vertices are numbered lexicographically with the first axis running fastest.
pub fn create_rectangular_uniform_hypercube_mesh<T, D>(
    origin: &OPoint<T, D>,
    extents: &OVector<T, D>,
    cells_per_dim: &OVector<usize, D>,
) -> Mesh<T, D>
where
    T: Real,
    D: SmallDim,
    DefaultAllocator: DimAllocator<T, D>,
{
    let dim = D::dim();
    if cells_per_dim.iter().any(|&n| n == 0) {
        return Mesh::try_from_vertices_and_cells(Vec::new(), &[])
            .expect("empty mesh is always valid");
    }

    let vertices_per_dim = cells_per_dim.map(|n| n + 1);
    let num_vertices: usize = vertices_per_dim.iter().product();
    let num_cells: usize = cells_per_dim.iter().product();

    let vertices = (0..num_vertices)
        .map(|linear_index| {
            let multi_index = unravel(linear_index, vertices_per_dim.as_slice());
            let mut v = origin.clone();
            for a in 0..dim {
                let fraction: T = convert(multi_index[a] as f64 / cells_per_dim[a] as f64);
                v[a] += extents[a] * fraction;
            }
            v
        })
        .collect();

    let cells: Vec<_> = (0..num_cells)
        .map(|linear_index| {
            let cell_index = unravel(linear_index, cells_per_dim.as_slice());
            (0..(1 << dim))
                .map(|local_vertex| {
                    let mut vertex_index = 0;
                    let mut stride = 1;
                    for a in 0..dim {
                        let offset = (local_vertex >> a) & 1;
                        vertex_index += (cell_index[a] + offset) * stride;
                        stride *= vertices_per_dim[a];
                    }
                    vertex_index
                })
                .collect()
        })
        .collect();

    Mesh::try_from_vertices_and_cells(vertices, &cells).expect("generated connectivity is always valid")
}

/// Displace all vertices of the unit hypercube mesh by a smooth field that vanishes on the
/// boundary of `[0, 1]^d`, producing genuinely multilinear (non-affine) cells.
///
/// The displacement along axis `a` is `amplitude · Π_b sin(π x_b)` scaled by `(-1)^a`. Cells stay
/// valid as long as the amplitude is small compared to the cell size.
pub fn distort_unit_hypercube_mesh<T, D>(mesh: &mut Mesh<T, D>, amplitude: T)
where
    T: Real,
    D: SmallDim,
    DefaultAllocator: DimAllocator<T, D>,
{
    mesh.transform_vertices(|v| {
        let bump = v
            .iter()
            .fold(T::one(), |product, &x| product * (T::pi() * x).sin());
        for a in 0..D::dim() {
            let sign = if a % 2 == 0 { T::one() } else { -T::one() };
            v[a] += sign * amplitude * bump;
        }
    });
}

fn unravel(mut linear_index: usize, shape: &[usize]) -> Vec<usize> {
    shape
        .iter()
        .map(|&n| {
            let i = linear_index % n;
            linear_index /= n;
            i
        })
        .collect()
}
