use matfree::config::MatrixFreeConfig;
use matfree::constraints::ConstraintSet;
use matfree::dofs::DofIndexMap;
use matfree::kernels::{Mass, SipgLaplace};
use matfree::mesh::procedural::{create_unit_hypercube_mesh, distort_unit_hypercube_mesh};
use matfree::mesh::Mesh;
use matfree::operator::MatrixFreeOperator;
use matfree::vector::{DofVector, LocalGhostExchange, NoGhosts};
use matfree::MatrixFreeError;
use matrixcompare::assert_matrix_eq;
use nalgebra::{DVector, U2};

fn vertex_dofs(mesh: &Mesh<f64, U2>) -> Vec<Vec<usize>> {
    (0..mesh.num_cells())
        .map(|cell| mesh.cell_vertices(cell).to_vec())
        .collect()
}

/// Continuous degree one numbering of a 2x2 mesh, in which cell 3 refers to vertex 8 and cell 1
/// refers to vertex 5 through ghost slots 9 and 10.
fn mesh_with_ghost_references() -> (Mesh<f64, U2>, DofIndexMap, LocalGhostExchange) {
    let mut mesh = create_unit_hypercube_mesh::<f64, U2>(2);
    distort_unit_hypercube_mesh(&mut mesh, 0.05);
    let mut cell_dofs = vertex_dofs(&mesh);
    for (cell, owner, ghost) in [(3, 8, 9), (1, 5, 10)] {
        let position = cell_dofs[cell]
            .iter()
            .position(|&dof| dof == owner)
            .unwrap();
        cell_dofs[cell][position] = ghost;
    }
    let dof_map = DofIndexMap::from_cell_dofs(9, &cell_dofs).with_ghosts(2);
    (mesh, dof_map, LocalGhostExchange::new(vec![8, 5]))
}

#[test]
fn ghost_exchange_reproduces_owned_numbering() {
    let (mesh, ghosted_map, exchange) = mesh_with_ghost_references();
    let owned_map = DofIndexMap::from_cell_dofs(9, &vertex_dofs(&mesh));

    let config = MatrixFreeConfig::new(1).with_batch_width(2);
    let ghosted = MatrixFreeOperator::new(&mesh, ghosted_map, &ConstraintSet::new(), config.clone()).unwrap();
    let owned = MatrixFreeOperator::new(&mesh, owned_map, &ConstraintSet::new(), config).unwrap();
    assert_eq!(ghosted.partition().n_ghosts, 2);
    assert_eq!(ghosted.partition().n_owned, 9);

    let u = DVector::from_fn(9, |i, _| 1.0 + (0.9 * i as f64).cos());
    let u_ghosted = DofVector::from_values(ghosted.partition(), u.clone()).unwrap();
    let u_owned = DofVector::from_values(owned.partition(), u).unwrap();

    for expected_and_actual in [
        (
            owned.apply(&SipgLaplace, &u_owned).unwrap(),
            ghosted.apply_with_exchange(&SipgLaplace, &u_ghosted, &exchange).unwrap(),
        ),
        (
            owned.apply(&Mass, &u_owned).unwrap(),
            ghosted.apply_with_exchange(&Mass, &u_ghosted, &exchange).unwrap(),
        ),
    ] {
        let (expected, actual) = expected_and_actual;
        let scale = expected.values().amax();
        assert_matrix_eq!(actual.into_values(), expected.into_values(), comp = abs, tol = 1e-13 * scale);
    }
}

#[test]
fn ghosts_require_matching_exchange() {
    let (mesh, ghosted_map, _) = mesh_with_ghost_references();
    let operator = MatrixFreeOperator::new(&mesh, ghosted_map, &ConstraintSet::new(), MatrixFreeConfig::new(1)).unwrap();
    let u = DofVector::zeros(operator.partition());

    let err = operator.apply_with_exchange(&Mass, &u, &NoGhosts).unwrap_err();
    assert_eq!(err, MatrixFreeError::SizeMismatch { expected: 2, actual: 0 });
    assert!(operator.apply(&Mass, &u).is_err());

    let too_many = LocalGhostExchange::new(vec![8, 5, 0]);
    let err = operator.apply_with_exchange(&Mass, &u, &too_many).unwrap_err();
    assert_eq!(err, MatrixFreeError::SizeMismatch { expected: 2, actual: 3 });
}

#[test]
fn ghost_owners_must_be_owned_dofs() {
    let (mesh, ghosted_map, _) = mesh_with_ghost_references();
    let operator = MatrixFreeOperator::new(&mesh, ghosted_map, &ConstraintSet::new(), MatrixFreeConfig::new(1)).unwrap();
    let u = DofVector::from_values(operator.partition(), DVector::repeat(9, 1.0)).unwrap();

    let exchange = LocalGhostExchange::new(vec![8, 17]);
    let err = operator
        .apply_with_exchange(&SipgLaplace, &u, &exchange)
        .unwrap_err();
    assert_eq!(err, MatrixFreeError::DofIndexOutOfBounds { index: 17, num_dofs: 9 });

    let mut dst = DofVector::zeros(operator.partition());
    let err = operator
        .apply_add_with_exchange(&SipgLaplace, &mut dst, &u, &exchange)
        .unwrap_err();
    assert_eq!(err, MatrixFreeError::DofIndexOutOfBounds { index: 17, num_dofs: 9 });
    assert_eq!(dst.values().amax(), 0.0);
}
