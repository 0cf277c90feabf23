use crate::unit_square_with_dg_dofs;
use matfree::config::{MatrixFreeConfig, Parallelism};
use matfree::constraints::ConstraintSet;
use matfree::dofs::DofIndexMap;
use matfree::kernels::{SipgLaplace, UpwindAdvection};
use matfree::mesh::procedural::{create_unit_hypercube_mesh, distort_unit_hypercube_mesh};
use matfree::operator::MatrixFreeOperator;
use matfree::proptest::coefficient_vector;
use matfree::vector::DofVector;
use matrixcompare::assert_matrix_eq;
use nalgebra::{DVector, Vector2, U2};
use proptest::prelude::*;

fn assert_send_sync<T: Send + Sync>() {}

#[test]
fn operator_and_kernels_can_be_shared_across_threads() {
    assert_send_sync::<MatrixFreeOperator<f64, U2>>();
    assert_send_sync::<MatrixFreeOperator<f64, nalgebra::U3>>();
    assert_send_sync::<UpwindAdvection<f64, U2>>();
    assert_send_sync::<UpwindAdvection<f64, nalgebra::U1>>();
}

proptest! {
    #[test]
    fn operator_is_linear(
        u in coefficient_vector(36),
        v in coefficient_vector(36),
        a in -2.0f64..2.0,
        b in -2.0f64..2.0,
    ) {
        let (mesh, dof_map) = unit_square_with_dg_dofs(3, 1);
        let operator = MatrixFreeOperator::new(&mesh, dof_map, &ConstraintSet::new(), MatrixFreeConfig::new(1)).unwrap();
        let partition = operator.partition();
        let kernel = UpwindAdvection::new(Vector2::new(0.7, 0.2));

        let combined = DofVector::from_values(partition, &u * a + &v * b).unwrap();
        let a_u = operator.apply(&kernel, &DofVector::from_values(partition, u).unwrap()).unwrap();
        let a_v = operator.apply(&kernel, &DofVector::from_values(partition, v).unwrap()).unwrap();
        let a_combined = operator.apply(&kernel, &combined).unwrap();

        let expected: DVector<f64> = a_u.values() * a + a_v.values() * b;
        let deviation = (a_combined.values() - &expected).amax();
        prop_assert!(deviation <= 1e-12 * expected.amax().max(1.0));
    }
}

#[test]
fn serial_and_colored_schedules_agree() {
    let mut mesh = create_unit_hypercube_mesh::<f64, U2>(4);
    distort_unit_hypercube_mesh(&mut mesh, 0.05);
    let dof_map = DofIndexMap::discontinuous(16, 9);
    let mut constraints = ConstraintSet::new();
    constraints.add_homogeneous_dirichlet([0, 1, 2]);
    constraints.add_line(40, vec![(41, 0.5), (50, 0.5)], 0.0);

    let apply_with = |parallelism| {
        let config = MatrixFreeConfig::new(2)
            .with_batch_width(3)
            .with_parallelism(parallelism);
        let operator = MatrixFreeOperator::new(&mesh, dof_map.clone(), &constraints, config).unwrap();
        let u = DVector::from_fn(144, |i, _| (0.37 * i as f64).sin());
        let u = DofVector::from_values(operator.partition(), u).unwrap();
        operator.apply(&SipgLaplace, &u).unwrap().into_values()
    };

    let serial = apply_with(Parallelism::Serial);
    let colored = apply_with(Parallelism::Colored);
    let scale = serial.amax();
    assert_matrix_eq!(serial, colored, comp = abs, tol = 1e-12 * scale);
}

#[test]
fn constrained_entries_are_ignored_and_left_zero() {
    let (mesh, dof_map) = unit_square_with_dg_dofs(2, 1);
    let mut constraints = ConstraintSet::new();
    constraints.add_homogeneous_dirichlet([3, 6]);
    constraints.add_line(9, vec![(10, 1.0)], 5.0);
    let operator = MatrixFreeOperator::new(&mesh, dof_map, &constraints, MatrixFreeConfig::new(1)).unwrap();

    let u = DVector::from_fn(16, |i, _| 1.0 + i as f64);
    let mut u_modified = u.clone();
    u_modified[3] = -100.0;
    u_modified[6] = 42.0;
    u_modified[9] = 7.0;

    let partition = operator.partition();
    let a_u = operator.apply(&SipgLaplace, &DofVector::from_values(partition, u).unwrap()).unwrap();
    let a_u_modified = operator
        .apply(&SipgLaplace, &DofVector::from_values(partition, u_modified).unwrap())
        .unwrap();

    for &dof in &[3, 6, 9] {
        assert_eq!(a_u.values()[dof], 0.0);
    }
    assert_matrix_eq!(a_u.into_values(), a_u_modified.into_values(), comp = abs, tol = 1e-12);
}

#[test]
fn apply_add_accumulates_into_destination() {
    let (mesh, dof_map) = unit_square_with_dg_dofs(2, 2);
    let operator = MatrixFreeOperator::new(&mesh, dof_map, &ConstraintSet::new(), MatrixFreeConfig::new(2)).unwrap();
    let partition = operator.partition();
    let u = DofVector::from_values(partition, DVector::from_fn(36, |i, _| (i % 5) as f64)).unwrap();
    let w = DVector::from_fn(36, |i, _| 0.5 * i as f64);

    let a_u = operator.apply(&SipgLaplace, &u).unwrap();
    let mut dst = DofVector::from_values(partition, w.clone()).unwrap();
    operator.apply_add(&SipgLaplace, &mut dst, &u).unwrap();
    assert_matrix_eq!(dst.into_values(), a_u.into_values() + w, comp = abs, tol = 1e-12);
}

#[test]
fn coloring_reflects_shared_dofs() {
    let (mesh, dof_map) = unit_square_with_dg_dofs(3, 1);
    let operator = MatrixFreeOperator::new(&mesh, dof_map, &ConstraintSet::new(), MatrixFreeConfig::new(1)).unwrap();
    // Cells of a discontinuous numbering never share DoFs
    assert_eq!(operator.num_cell_colors(), 1);
    assert!(operator.num_face_colors() > 1);
    assert_eq!(operator.cell_batches().len(), 3);
    let lanes: usize = operator.face_batches().iter().map(|batch| batch.lanes()).sum();
    assert_eq!(lanes, operator.face_pairs().len());
    // 12 interior and 12 boundary faces
    assert_eq!(operator.face_pairs().num_interior(), 12);
    assert_eq!(operator.face_pairs().len(), 24);

    let cell_dofs: Vec<Vec<usize>> = (0..mesh.num_cells())
        .map(|cell| mesh.cell_vertices(cell).to_vec())
        .collect();
    let continuous = DofIndexMap::from_cell_dofs(mesh.vertices().len(), &cell_dofs);
    let operator = MatrixFreeOperator::new(
        &mesh,
        continuous,
        &ConstraintSet::new(),
        MatrixFreeConfig::new(1).with_batch_width(1),
    )
    .unwrap();
    assert!(operator.num_cell_colors() > 1);
}
