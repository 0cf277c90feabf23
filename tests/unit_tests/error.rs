use crate::unit_square_with_dg_dofs;
use matfree::config::MatrixFreeConfig;
use matfree::constraints::ConstraintSet;
use matfree::dofs::DofIndexMap;
use matfree::mesh::procedural::create_unit_hypercube_mesh;
use matfree::mesh::topology::FaceTopology;
use matfree::mesh::Mesh;
use matfree::operator::MatrixFreeOperator;
use matfree::quadrature::TensorQuadrature;
use matfree::vector::{DofVector, Partition};
use matfree::MatrixFreeError;
use nalgebra::{Point2, U2, U4};

fn build(
    mesh: &Mesh<f64, U2>,
    dof_map: DofIndexMap,
    constraints: &ConstraintSet<f64>,
    config: MatrixFreeConfig,
) -> Result<MatrixFreeOperator<f64, U2>, MatrixFreeError> {
    MatrixFreeOperator::new(mesh, dof_map, constraints, config)
}

#[test]
fn dof_count_must_match_element() {
    let (mesh, _) = unit_square_with_dg_dofs(3, 1);
    let err = build(&mesh, DofIndexMap::discontinuous(9, 3), &ConstraintSet::new(), MatrixFreeConfig::new(1))
        .err()
        .unwrap();
    assert_eq!(
        err,
        MatrixFreeError::InconsistentDofCount {
            cell: 0,
            expected: 4,
            actual: 3
        }
    );
}

#[test]
fn dof_map_must_cover_every_cell() {
    let (mesh, _) = unit_square_with_dg_dofs(3, 1);
    let err = build(&mesh, DofIndexMap::discontinuous(8, 4), &ConstraintSet::new(), MatrixFreeConfig::new(1))
        .err()
        .unwrap();
    assert_eq!(err, MatrixFreeError::SizeMismatch { expected: 9, actual: 8 });
}

#[test]
fn vectors_must_match_partition() {
    let (mesh, dof_map) = unit_square_with_dg_dofs(3, 1);
    let operator = build(&mesh, dof_map, &ConstraintSet::new(), MatrixFreeConfig::new(1)).unwrap();
    let short = DofVector::zeros(Partition::new(10, 0));
    let err = operator.apply(&matfree::kernels::Mass, &short).unwrap_err();
    assert_eq!(err, MatrixFreeError::SizeMismatch { expected: 36, actual: 10 });

    let mut dst = DofVector::zeros(Partition::new(35, 0));
    let src = DofVector::zeros(operator.partition());
    let err = operator
        .apply_add(&matfree::kernels::Mass, &mut dst, &src)
        .unwrap_err();
    assert_eq!(err, MatrixFreeError::SizeMismatch { expected: 36, actual: 35 });
}

#[test]
fn cyclic_constraints_are_rejected() {
    let (mesh, dof_map) = unit_square_with_dg_dofs(2, 1);
    let mut constraints = ConstraintSet::new();
    constraints.add_line(1, vec![(2, 1.0)], 0.0);
    constraints.add_line(2, vec![(1, 0.5), (3, 0.5)], 0.0);
    let err = build(&mesh, dof_map, &constraints, MatrixFreeConfig::new(1))
        .err()
        .unwrap();
    assert!(matches!(err, MatrixFreeError::CyclicConstraints { .. }));
}

#[test]
fn out_of_bounds_dofs_are_rejected() {
    let (mesh, dof_map) = unit_square_with_dg_dofs(3, 1);
    let mut constraints = ConstraintSet::new();
    constraints.add_line(5, vec![(100, 1.0)], 0.0);
    let err = build(&mesh, dof_map, &constraints, MatrixFreeConfig::new(1))
        .err()
        .unwrap();
    assert_eq!(
        err,
        MatrixFreeError::DofIndexOutOfBounds {
            index: 100,
            num_dofs: 36
        }
    );

    let mesh = create_unit_hypercube_mesh::<f64, U2>(1);
    let dof_map = DofIndexMap::from_cell_dofs(4, &[vec![0, 1, 2, 7]]);
    let err = build(&mesh, dof_map, &ConstraintSet::new(), MatrixFreeConfig::new(1))
        .err()
        .unwrap();
    assert_eq!(err, MatrixFreeError::DofIndexOutOfBounds { index: 7, num_dofs: 4 });
}

#[test]
fn invalid_configuration_is_rejected() {
    let (mesh, dof_map) = unit_square_with_dg_dofs(2, 1);
    let config = MatrixFreeConfig::new(1).with_batch_width(0);
    let err = build(&mesh, dof_map.clone(), &ConstraintSet::new(), config)
        .err()
        .unwrap();
    assert!(matches!(err, MatrixFreeError::InvalidConfiguration(_)));

    let config = MatrixFreeConfig::new(1).with_quadrature_points_per_dim(0);
    let err = build(&mesh, dof_map, &ConstraintSet::new(), config)
        .err()
        .unwrap();
    assert!(matches!(err, MatrixFreeError::InvalidConfiguration(_)));
}

#[test]
fn empty_quadrature_rule_is_unavailable() {
    let err = TensorQuadrature::<f64, U2>::gauss(0).err().unwrap();
    assert!(matches!(err, MatrixFreeError::Quadrature(_)));
    assert!(std::error::Error::source(&err).is_some());
}

#[test]
fn four_dimensional_meshes_are_unsupported() {
    let mesh = create_unit_hypercube_mesh::<f64, U4>(1);
    let dof_map = DofIndexMap::discontinuous(1, 16);
    let err = MatrixFreeOperator::new(&mesh, dof_map, &ConstraintSet::new(), MatrixFreeConfig::new(1))
        .err()
        .unwrap();
    assert_eq!(err, MatrixFreeError::UnsupportedDimension { dim: 4 });

    let err = FaceTopology::compute(&mesh).err().unwrap();
    assert_eq!(err, MatrixFreeError::UnsupportedDimension { dim: 4 });
}

#[test]
fn inverted_cells_are_rejected() {
    let vertices = vec![
        Point2::new(0.0, 0.0),
        Point2::new(1.0, 0.0),
        Point2::new(0.0, 1.0),
        Point2::new(1.0, 1.0),
    ];
    let mesh = Mesh::try_from_vertices_and_cells(vertices, &[vec![1, 0, 3, 2]]).unwrap();
    let dof_map = DofIndexMap::discontinuous(1, 4);
    let err = build(&mesh, dof_map, &ConstraintSet::new(), MatrixFreeConfig::new(1))
        .err()
        .unwrap();
    assert!(matches!(err, MatrixFreeError::InvalidGeometry { cell: 0, .. }));
}

#[test]
fn faces_shared_by_three_cells_are_rejected() {
    let vertices = vec![
        Point2::new(0.0, 0.0),
        Point2::new(1.0, 0.0),
        Point2::new(0.0, 1.0),
        Point2::new(1.0, 1.0),
        Point2::new(0.0, -1.0),
        Point2::new(1.0, -1.0),
        Point2::new(0.0, -2.0),
        Point2::new(1.0, -2.0),
    ];
    let cells = [vec![0, 1, 2, 3], vec![4, 5, 0, 1], vec![6, 7, 0, 1]];
    let mesh = Mesh::try_from_vertices_and_cells(vertices, &cells).unwrap();
    let err = FaceTopology::compute(&mesh).err().unwrap();
    assert_eq!(err, MatrixFreeError::NonManifoldFace { cells: vec![0, 1, 2] });
}

#[test]
fn invalid_connectivity_is_rejected() {
    let vertices = vec![Point2::new(0.0, 0.0), Point2::new(1.0, 0.0), Point2::new(0.0, 1.0)];
    let err = Mesh::try_from_vertices_and_cells(vertices.clone(), &[vec![0, 1, 2]])
        .err()
        .unwrap();
    assert_eq!(err, MatrixFreeError::InvalidCellConnectivity { cell: 0 });
    let err = Mesh::try_from_vertices_and_cells(vertices, &[vec![0, 1, 2, 3]])
        .err()
        .unwrap();
    assert_eq!(err, MatrixFreeError::InvalidCellConnectivity { cell: 0 });
}

#[test]
fn errors_have_readable_messages() {
    let errors = [
        MatrixFreeError::InvalidGeometry {
            cell: 3,
            determinant: -0.5,
        },
        MatrixFreeError::CyclicConstraints { dof: 7 },
        MatrixFreeError::SizeMismatch { expected: 2, actual: 3 },
        MatrixFreeError::NonManifoldFace { cells: vec![0, 1, 2] },
        MatrixFreeError::InvalidConfiguration("batch width must be positive".to_string()),
    ];
    for err in errors {
        let message = err.to_string();
        assert!(!message.is_empty());
    }
    assert_eq!(
        MatrixFreeError::SizeMismatch { expected: 2, actual: 3 }.to_string(),
        "size mismatch: expected 2, got 3"
    );
}
