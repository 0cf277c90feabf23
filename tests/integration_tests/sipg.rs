use crate::discontinuous_dof_map;
use matfree::allocators::DimAllocator;
use matfree::config::MatrixFreeConfig;
use matfree::constraints::ConstraintSet;
use matfree::interpolate::interpolate;
use matfree::kernels::{FaceContext, FaceKernel, FaceTestValues, Mass, PointValues, SipgLaplace, UpwindAdvection};
use matfree::mesh::procedural::{create_unit_hypercube_mesh, distort_unit_hypercube_mesh};
use matfree::mesh::Mesh;
use matfree::operator::MatrixFreeOperator;
use matfree::oracle::assemble_oracle_matrix;
use matfree::vector::DofVector;
use matfree::SmallDim;
use matrixcompare::{assert_matrix_eq, assert_scalar_eq};
use nalgebra::{DMatrix, DVector, DefaultAllocator, OPoint, Vector2, U2, U3};

/// `u = Π x_a (1 - x_a)`, which vanishes on the boundary of the unit hypercube.
fn bubble<D>(x: &OPoint<f64, D>) -> f64
where
    D: SmallDim,
    DefaultAllocator: DimAllocator<f64, D>,
{
    x.iter().map(|&x_a| x_a * (1.0 - x_a)).product()
}

/// `-Δu` for the bubble function.
fn bubble_laplacian<D>(x: &OPoint<f64, D>) -> f64
where
    D: SmallDim,
    DefaultAllocator: DimAllocator<f64, D>,
{
    (0..D::dim())
        .map(|a| {
            let others: f64 = (0..D::dim())
                .filter(|&b| b != a)
                .map(|b| x[b] * (1.0 - x[b]))
                .product();
            2.0 * others
        })
        .sum()
}

fn assert_discrete_laplacian_of_bubble_is_exact<D>(mesh: &Mesh<f64, D>)
where
    D: SmallDim,
    DefaultAllocator: DimAllocator<f64, D>,
{
    let degree = 2;
    let dof_map = discontinuous_dof_map(mesh, degree);
    let u_h = interpolate(mesh, &dof_map, degree, bubble::<D>).unwrap();
    let f_h = interpolate(mesh, &dof_map, degree, bubble_laplacian::<D>).unwrap();

    let config = MatrixFreeConfig::new(degree);
    let operator = MatrixFreeOperator::new(mesh, dof_map, &ConstraintSet::new(), config).unwrap();
    let a_u = operator.apply(&SipgLaplace, &u_h).unwrap();
    let m_f = operator.apply(&Mass, &f_h).unwrap();

    let scale = m_f.values().amax();
    assert!(scale > 0.0);
    assert_matrix_eq!(a_u.into_values(), m_f.into_values(), comp = abs, tol = 1e-11 * scale);
}

#[test]
fn discrete_laplacian_of_bubble_equals_projected_source_2d() {
    let mesh = create_unit_hypercube_mesh::<f64, U2>(3);
    assert_discrete_laplacian_of_bubble_is_exact(&mesh);
}

#[test]
fn discrete_laplacian_of_bubble_equals_projected_source_3d() {
    let mesh = create_unit_hypercube_mesh::<f64, U3>(2);
    assert_discrete_laplacian_of_bubble_is_exact(&mesh);
}

#[test]
fn sipg_laplace_is_symmetric() {
    let mut mesh = create_unit_hypercube_mesh::<f64, U2>(3);
    distort_unit_hypercube_mesh(&mut mesh, 0.05);
    let degree = 2;
    let dof_map = discontinuous_dof_map(&mesh, degree);
    let config = MatrixFreeConfig::new(degree);

    let oracle = assemble_oracle_matrix(&mesh, &dof_map, &ConstraintSet::new(), &config, &SipgLaplace).unwrap();
    let dense = DMatrix::from(&oracle);
    let scale = dense.amax();
    let transposed = dense.transpose();
    assert_matrix_eq!(dense, transposed, comp = abs, tol = 1e-12 * scale);

    let n = dof_map.n_owned();
    let operator = MatrixFreeOperator::new(&mesh, dof_map, &ConstraintSet::new(), config).unwrap();
    let u = DofVector::from_values(operator.partition(), DVector::from_fn(n, |i, _| (0.3 * i as f64).sin())).unwrap();
    let v = DofVector::from_values(operator.partition(), DVector::from_fn(n, |i, _| (0.7 * i as f64).cos())).unwrap();
    let a_u = operator.apply(&SipgLaplace, &u).unwrap();
    let a_v = operator.apply(&SipgLaplace, &v).unwrap();
    assert_scalar_eq!(a_u.dot(&v), u.dot(&a_v), comp = abs, tol = 1e-11 * scale * n as f64);
}

#[test]
fn advection_is_not_symmetric() {
    let mesh = create_unit_hypercube_mesh::<f64, U2>(2);
    let dof_map = discontinuous_dof_map(&mesh, 1);
    let config = MatrixFreeConfig::new(1);
    let advection = UpwindAdvection::new(Vector2::new(1.0, 0.5));
    let oracle = assemble_oracle_matrix(&mesh, &dof_map, &ConstraintSet::new(), &config, &advection).unwrap();
    let dense = DMatrix::from(&oracle);
    assert!((&dense - dense.transpose()).amax() > 1e-3);
}

/// Restricts a face kernel to interior faces.
struct InteriorFacesOnly<K>(K);

impl<K> FaceKernel<f64, U2> for InteriorFacesOnly<K>
where
    K: FaceKernel<f64, U2>,
{
    fn evaluate_face(
        &self,
        context: &FaceContext<f64, U2>,
        interior: &PointValues<f64, U2>,
        exterior: Option<&PointValues<f64, U2>>,
    ) -> FaceTestValues<f64, U2> {
        match exterior {
            Some(_) => self.0.evaluate_face(context, interior, exterior),
            None => FaceTestValues {
                interior: PointValues::zero(),
                exterior: None,
            },
        }
    }
}

#[test]
fn interior_face_fluxes_are_conservative() {
    let mut mesh = create_unit_hypercube_mesh::<f64, U2>(3);
    distort_unit_hypercube_mesh(&mut mesh, 0.05);
    let degree = 2;
    let dof_map = discontinuous_dof_map(&mesh, degree);
    let n = dof_map.n_owned();
    let operator = MatrixFreeOperator::new(&mesh, dof_map, &ConstraintSet::new(), MatrixFreeConfig::new(degree)).unwrap();
    let u = DofVector::from_values(operator.partition(), DVector::from_fn(n, |i, _| (1.3 * i as f64).sin())).unwrap();

    // The basis functions of every cell sum to one, so summing all entries adds up the fluxes
    // leaving and entering each cell through interior faces
    let laplace_faces = InteriorFacesOnly(SipgLaplace);
    let mut dst = DofVector::zeros(operator.partition());
    operator.apply_faces_add(&laplace_faces, &mut dst, &u).unwrap();
    assert!(dst.values().amax() > 1e-6);
    assert_scalar_eq!(dst.values().sum(), 0.0, comp = abs, tol = 1e-11 * dst.values().amax());

    let advection_faces = InteriorFacesOnly(UpwindAdvection::new(Vector2::new(-0.2, 1.0)));
    let mut dst = DofVector::zeros(operator.partition());
    operator.apply_faces_add(&advection_faces, &mut dst, &u).unwrap();
    assert_scalar_eq!(dst.values().sum(), 0.0, comp = abs, tol = 1e-11 * dst.values().amax());
}

#[test]
fn cell_and_face_passes_add_up_to_full_application() {
    let mesh = create_unit_hypercube_mesh::<f64, U2>(2);
    let dof_map = discontinuous_dof_map(&mesh, 1);
    let n = dof_map.n_owned();
    let operator = MatrixFreeOperator::new(&mesh, dof_map, &ConstraintSet::new(), MatrixFreeConfig::new(1)).unwrap();
    let u = DofVector::from_values(operator.partition(), DVector::from_fn(n, |i, _| i as f64 - 3.5)).unwrap();

    let full = operator.apply(&SipgLaplace, &u).unwrap();
    let mut passes = DofVector::zeros(operator.partition());
    operator.apply_cells_add(&SipgLaplace, &mut passes, &u).unwrap();
    operator.apply_faces_add(&SipgLaplace, &mut passes, &u).unwrap();
    let scale = full.values().amax();
    assert_matrix_eq!(full.into_values(), passes.into_values(), comp = abs, tol = 1e-12 * scale);
}
