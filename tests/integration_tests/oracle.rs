use crate::{continuous_q1_dof_map, discontinuous_dof_map};
use matfree::allocators::DimAllocator;
use matfree::config::{MatrixFreeConfig, Parallelism};
use matfree::constraints::ConstraintSet;
use matfree::dofs::DofIndexMap;
use matfree::kernels::{DgKernel, Mass, SipgLaplace, UpwindAdvection};
use matfree::mesh::procedural::{create_unit_hypercube_mesh, distort_unit_hypercube_mesh};
use matfree::mesh::Mesh;
use matfree::operator::MatrixFreeOperator;
use matfree::oracle::{assemble_oracle_matrix, verify_against_oracle};
use matfree::proptest::perturbed_unit_square_mesh;
use matfree::SmallDim;
use nalgebra::{DefaultAllocator, Vector1, Vector2, Vector3, U1, U2, U3};
use proptest::prelude::*;

fn assert_oracle_equivalence<D, K>(
    mesh: &Mesh<f64, D>,
    dof_map: DofIndexMap,
    constraints: &ConstraintSet<f64>,
    config: MatrixFreeConfig,
    kernel: &K,
) where
    D: SmallDim,
    K: DgKernel<f64, D>,
    DefaultAllocator: DimAllocator<f64, D>,
{
    let oracle = assemble_oracle_matrix(mesh, &dof_map, constraints, &config, kernel).unwrap();
    let operator = MatrixFreeOperator::new(mesh, dof_map, constraints, config).unwrap();
    verify_against_oracle(&operator, kernel, &oracle, 1e-11).unwrap();
}

fn distorted_unit_hypercube_mesh<D>(cells_per_dim: usize, amplitude: f64) -> Mesh<f64, D>
where
    D: SmallDim,
    DefaultAllocator: DimAllocator<f64, D>,
{
    let mut mesh = create_unit_hypercube_mesh(cells_per_dim);
    distort_unit_hypercube_mesh(&mut mesh, amplitude);
    mesh
}

fn vertices_on_left_side<D>(mesh: &Mesh<f64, D>) -> Vec<usize>
where
    D: SmallDim,
    DefaultAllocator: DimAllocator<f64, D>,
{
    mesh.vertices()
        .iter()
        .enumerate()
        .filter(|(_, v)| v[0].abs() < 1e-12)
        .map(|(i, _)| i)
        .collect()
}

#[test]
fn sipg_laplace_matches_oracle_2d() {
    let mesh = create_unit_hypercube_mesh::<f64, U2>(3);
    for degree in 0..=3 {
        let dof_map = discontinuous_dof_map(&mesh, degree);
        let config = MatrixFreeConfig::new(degree);
        assert_oracle_equivalence(&mesh, dof_map, &ConstraintSet::new(), config, &SipgLaplace);
    }
}

#[test]
fn sipg_laplace_matches_oracle_on_distorted_mesh_2d() {
    let mesh = distorted_unit_hypercube_mesh::<U2>(3, 0.05);
    for degree in 0..=3 {
        let dof_map = discontinuous_dof_map(&mesh, degree);
        let config = MatrixFreeConfig::new(degree);
        assert_oracle_equivalence(&mesh, dof_map, &ConstraintSet::new(), config, &SipgLaplace);
    }
}

#[test]
fn sipg_laplace_matches_oracle_3d() {
    let mesh = create_unit_hypercube_mesh::<f64, U3>(2);
    for degree in 0..=3 {
        let dof_map = discontinuous_dof_map(&mesh, degree);
        let config = MatrixFreeConfig::new(degree);
        assert_oracle_equivalence(&mesh, dof_map, &ConstraintSet::new(), config, &SipgLaplace);
    }
}

#[test]
fn sipg_laplace_matches_oracle_on_distorted_mesh_3d() {
    let mesh = distorted_unit_hypercube_mesh::<U3>(2, 0.05);
    for degree in 1..=2 {
        let dof_map = discontinuous_dof_map(&mesh, degree);
        let config = MatrixFreeConfig::new(degree);
        assert_oracle_equivalence(&mesh, dof_map, &ConstraintSet::new(), config, &SipgLaplace);
    }
}

#[test]
fn kernels_match_oracle_1d() {
    let uniform = create_unit_hypercube_mesh::<f64, U1>(5);
    let distorted = distorted_unit_hypercube_mesh::<U1>(5, 0.05);
    for mesh in [uniform, distorted] {
        for degree in 0..=3 {
            let config = MatrixFreeConfig::new(degree);
            let dof_map = discontinuous_dof_map(&mesh, degree);
            let no_constraints = ConstraintSet::new();
            assert_oracle_equivalence(&mesh, dof_map.clone(), &no_constraints, config.clone(), &SipgLaplace);
            assert_oracle_equivalence(&mesh, dof_map.clone(), &no_constraints, config.clone(), &Mass);
            for velocity in [1.0, -0.7] {
                let advection = UpwindAdvection::new(Vector1::new(velocity));
                assert_oracle_equivalence(&mesh, dof_map.clone(), &no_constraints, config.clone(), &advection);
            }
        }
    }
}

#[test]
fn continuous_numbering_matches_oracle_1d() {
    let mesh = distorted_unit_hypercube_mesh::<U1>(6, 0.05);
    let mut constraints = ConstraintSet::new();
    constraints.add_homogeneous_dirichlet(vertices_on_left_side(&mesh));
    let dof_map = continuous_q1_dof_map(&mesh);
    assert_oracle_equivalence(&mesh, dof_map, &constraints, MatrixFreeConfig::new(1), &SipgLaplace);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(8))]

    #[test]
    fn oracle_equivalence_holds_on_perturbed_meshes(
        mesh in perturbed_unit_square_mesh(3, 0.15),
        degree in 0..=2usize,
        batch_width in 1..=4usize,
    ) {
        let config = MatrixFreeConfig::new(degree).with_batch_width(batch_width);
        let dof_map = discontinuous_dof_map(&mesh, degree);
        let no_constraints = ConstraintSet::new();
        assert_oracle_equivalence(&mesh, dof_map.clone(), &no_constraints, config.clone(), &SipgLaplace);
        let advection = UpwindAdvection::new(Vector2::new(0.8, -0.4));
        assert_oracle_equivalence(&mesh, dof_map, &no_constraints, config, &advection);
    }
}

#[test]
fn mass_and_advection_match_oracle() {
    let mesh_2d = distorted_unit_hypercube_mesh::<U2>(3, 0.04);
    let mesh_3d = distorted_unit_hypercube_mesh::<U3>(2, 0.04);
    let advection_2d = UpwindAdvection::new(Vector2::new(1.0, 0.5));
    let advection_3d = UpwindAdvection::new(Vector3::new(-0.3, 1.0, 0.7));

    for degree in 0..=2 {
        let config = MatrixFreeConfig::new(degree);
        let dof_map_2d = discontinuous_dof_map(&mesh_2d, degree);
        let dof_map_3d = discontinuous_dof_map(&mesh_3d, degree);
        let no_constraints = ConstraintSet::new();
        assert_oracle_equivalence(&mesh_2d, dof_map_2d.clone(), &no_constraints, config.clone(), &Mass);
        assert_oracle_equivalence(&mesh_2d, dof_map_2d, &no_constraints, config.clone(), &advection_2d);
        assert_oracle_equivalence(&mesh_3d, dof_map_3d.clone(), &no_constraints, config.clone(), &Mass);
        assert_oracle_equivalence(&mesh_3d, dof_map_3d, &no_constraints, config, &advection_3d);
    }
}

#[test]
fn oracle_equivalence_is_independent_of_batching_and_quadrature() {
    let mesh = distorted_unit_hypercube_mesh::<U2>(3, 0.05);
    let dof_map = discontinuous_dof_map(&mesh, 2);
    let configs = [
        MatrixFreeConfig::new(2).with_batch_width(1),
        MatrixFreeConfig::new(2).with_batch_width(3),
        MatrixFreeConfig::new(2)
            .with_batch_width(7)
            .with_parallelism(Parallelism::Serial),
        MatrixFreeConfig::new(2).with_quadrature_points_per_dim(5),
    ];
    for config in configs {
        assert_oracle_equivalence(&mesh, dof_map.clone(), &ConstraintSet::new(), config, &SipgLaplace);
    }
}

#[test]
fn constrained_operator_matches_oracle() {
    let mesh = distorted_unit_hypercube_mesh::<U2>(3, 0.05);
    let dof_map = discontinuous_dof_map(&mesh, 1);

    let mut constraints = ConstraintSet::new();
    constraints.add_homogeneous_dirichlet([0, 5, 33]);
    constraints.add_line(7, vec![(8, 0.5), (12, 0.5)], 0.0);
    // DoF 12 is itself constrained, so DoF 7 resolves through a chain
    constraints.add_line(12, vec![(20, 0.3), (21, -1.2)], 0.1);
    constraints.add_line(30, vec![(2, 1.0)], 0.0);

    for kernel_config in [MatrixFreeConfig::new(1), MatrixFreeConfig::new(1).with_batch_width(2)] {
        assert_oracle_equivalence(&mesh, dof_map.clone(), &constraints, kernel_config.clone(), &SipgLaplace);
        let advection = UpwindAdvection::new(Vector2::new(0.4, -1.0));
        assert_oracle_equivalence(&mesh, dof_map.clone(), &constraints, kernel_config, &advection);
    }
}

#[test]
fn constrained_rows_and_columns_vanish() {
    let mesh = create_unit_hypercube_mesh::<f64, U2>(2);
    let dof_map = discontinuous_dof_map(&mesh, 1);
    let mut constraints = ConstraintSet::new();
    constraints.add_homogeneous_dirichlet([3]);
    constraints.add_line(4, vec![(1, 2.0)], 1.0);

    let config = MatrixFreeConfig::new(1);
    let oracle = assemble_oracle_matrix(&mesh, &dof_map, &constraints, &config, &SipgLaplace).unwrap();
    for (i, j, &value) in oracle.triplet_iter() {
        if value != 0.0 {
            assert!(![3, 4].contains(&i) && ![3, 4].contains(&j));
        }
    }
}

#[test]
fn continuous_numbering_matches_oracle() {
    let mesh_2d = distorted_unit_hypercube_mesh::<U2>(3, 0.05);
    let mesh_3d = distorted_unit_hypercube_mesh::<U3>(2, 0.05);

    let mut constraints_2d = ConstraintSet::new();
    constraints_2d.add_homogeneous_dirichlet(vertices_on_left_side(&mesh_2d));
    let mut constraints_3d = ConstraintSet::new();
    constraints_3d.add_homogeneous_dirichlet(vertices_on_left_side(&mesh_3d));

    let config = MatrixFreeConfig::new(1);
    for constraints in [ConstraintSet::new(), constraints_2d] {
        let dof_map = continuous_q1_dof_map(&mesh_2d);
        assert_oracle_equivalence(&mesh_2d, dof_map, &constraints, config.clone(), &SipgLaplace);
    }
    for constraints in [ConstraintSet::new(), constraints_3d] {
        let dof_map = continuous_q1_dof_map(&mesh_3d);
        assert_oracle_equivalence(&mesh_3d, dof_map, &constraints, config.clone(), &SipgLaplace);
    }
}
