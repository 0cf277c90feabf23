use crate::mesh::procedural::create_unit_hypercube_mesh;
use crate::mesh::Mesh;
use ::proptest::collection::vec;
use ::proptest::prelude::*;
use nalgebra::{DVector, Point2, U2};

/// Coefficient vectors of the given length with entries in `[-1, 1]`.
pub fn coefficient_vector(len: usize) -> impl Strategy<Value = DVector<f64>> {
    vec(-1.0..1.0, len).prop_map(DVector::from_vec)
}

/// Uniform meshes of the unit square whose interior vertices are moved randomly by at most
/// `relative_perturbation` times the cell size along each axis.
///
/// The boundary of the unit square is preserved, and cells remain valid as long as
/// `relative_perturbation < 0.25`.
pub fn perturbed_unit_square_mesh(
    cells_per_dim: usize,
    relative_perturbation: f64,
) -> impl Strategy<Value = Mesh<f64, U2>> {
    assert!(cells_per_dim > 0);
    assert!((0.0..0.25).contains(&relative_perturbation));
    let num_vertices = (cells_per_dim + 1) * (cells_per_dim + 1);
    let h = 1.0 / cells_per_dim as f64;
    let max_offset = relative_perturbation * h;
    let offset = -max_offset..=max_offset;
    vec([offset.clone(), offset], num_vertices).prop_map(move |offsets| {
        let mut mesh = create_unit_hypercube_mesh::<f64, U2>(cells_per_dim);
        for (vertex, [dx, dy]) in mesh.vertices_mut().iter_mut().zip(offsets) {
            let on_boundary = |x: f64| x.abs() < 1e-12 || (x - 1.0).abs() < 1e-12;
            *vertex = Point2::new(
                if on_boundary(vertex.x) { vertex.x } else { vertex.x + dx },
                if on_boundary(vertex.y) { vertex.y } else { vertex.y + dy },
            );
        }
        mesh
    })
}
