//! Nodal interpolation of functions into the discrete space.
use crate::allocators::DimAllocator;
use crate::basis::ShapeInfo;
use crate::dofs::DofIndexMap;
use crate::mesh::Mesh;
use crate::vector::{DofVector, Partition};
use crate::{MatrixFreeError, Real, SmallDim};
use nalgebra::{DefaultAllocator, OPoint};

/// Interpolate `f` at the nodes of the degree `k` Lagrange basis of every cell.
///
/// Only owned entries are written. If several cells share a DoF, the value of the last cell
/// visited is kept, which is consistent for continuous functions.
pub fn interpolate<T, D, F>(
    mesh: &Mesh<T, D>,
    dof_map: &DofIndexMap,
    degree: usize,
    f: F,
) -> Result<DofVector<T>, MatrixFreeError>
where
    T: Real,
    D: SmallDim,
    F: Fn(&OPoint<T, D>) -> T,
    DefaultAllocator: DimAllocator<T, D>,
{
    // Only the nodes are needed, so no quadrature points are tabulated
    let shape = ShapeInfo::new(degree, &[]);
    let dofs_per_cell = shape.dofs_per_cell(D::dim());
    dof_map.validate(mesh.num_cells(), dofs_per_cell)?;

    let nodes: Vec<OPoint<T, D>> = (0..dofs_per_cell)
        .map(|i| shape.node_coordinates(i))
        .collect();

    let mut result = DofVector::zeros(Partition::new(dof_map.n_owned(), dof_map.n_ghosts()));
    let values = result.as_mut_slice();
    for cell in 0..mesh.num_cells() {
        for (&dof, xi) in dof_map.cell_dofs(cell).iter().zip(&nodes) {
            if dof < values.len() {
                values[dof] = f(&mesh.map_reference_coords(cell, xi));
            }
        }
    }
    Ok(result)
}
