//! Explicit sparse assembly of the operator, for verification of the matrix-free evaluation.
//!
//! The assembly deliberately avoids the machinery of the matrix-free operator: element matrices
//! are computed by direct summation over the full tensor basis at every quadrature point, and the
//! exterior side of each interior face is located by inverting the exterior cell map at the
//! physical quadrature points instead of through face orientations.
use crate::allocators::DimAllocator;
use crate::basis::ShapeInfo;
use crate::config::MatrixFreeConfig;
use crate::constraints::{ConstraintSet, ResolvedConstraints};
use crate::dofs::DofIndexMap;
use crate::geometry::PointMapping;
use crate::kernels::{DgKernel, FaceContext, PointValues};
use crate::mesh::topology::{CellFace, FaceTopology};
use crate::mesh::Mesh;
use crate::operator::MatrixFreeOperator;
use crate::quadrature::{face_axis, face_side, face_to_cell_coordinates, TensorQuadrature};
use crate::vector::DofVector;
use crate::{MatrixFreeError, Real, SmallDim, MAX_DIM};
use eyre::{bail, eyre};
use itertools::izip;
use log::debug;
use nalgebra::{DMatrix, DefaultAllocator, OPoint, OVector};
use nalgebra_sparse::{CooMatrix, CsrMatrix};

/// Basis function values and physical gradients of a cell at a single point.
struct PointBasis<T, D>
where
    T: Real,
    D: SmallDim,
    DefaultAllocator: DimAllocator<T, D>,
{
    mapping: PointMapping<T, D>,
    functions: Vec<PointValues<T, D>>,
}

impl<T, D> PointBasis<T, D>
where
    T: Real,
    D: SmallDim,
    DefaultAllocator: DimAllocator<T, D>,
{
    fn compute(
        mesh: &Mesh<T, D>,
        shape: &ShapeInfo<T>,
        cell: usize,
        xi: &OPoint<T, D>,
    ) -> Result<Self, MatrixFreeError> {
        let mapping = PointMapping::compute(mesh, cell, xi)?;
        let functions = (0..shape.dofs_per_cell(D::dim()))
            .map(|i| {
                let (value, reference_gradient) = shape.evaluate_tensor_basis(i, xi);
                PointValues::new(value, &mapping.inverse_jacobian_transpose * reference_gradient)
            })
            .collect();
        Ok(Self { mapping, functions })
    }
}

/// `φ u + ψ · ∇u`, the integrand of a test function for given test coefficients.
fn pair<T, D>(test: &PointValues<T, D>, function: &PointValues<T, D>) -> T
where
    T: Real,
    D: SmallDim,
    DefaultAllocator: DimAllocator<T, D>,
{
    test.value * function.value + test.gradient.dot(&function.gradient)
}

/// Accumulates local matrices into a global COO matrix, eliminating constraints.
struct ConstrainedAssembler<'a, T: Real> {
    constraints: &'a ResolvedConstraints<T>,
    coo: CooMatrix<T>,
}

impl<'a, T: Real> ConstrainedAssembler<'a, T> {
    fn add_local_matrix(&mut self, dofs: &[usize], local: &DMatrix<T>) {
        let expanded: Vec<_> = dofs.iter().map(|&dof| self.constraints.expand(dof)).collect();
        for (i, row_entries) in expanded.iter().enumerate() {
            for (j, column_entries) in expanded.iter().enumerate() {
                let a_ij = local[(i, j)];
                if a_ij == T::zero() {
                    continue;
                }
                for &(row, c_row) in row_entries {
                    for &(column, c_column) in column_entries {
                        self.coo.push(row, column, c_row * a_ij * c_column);
                    }
                }
            }
        }
    }
}

/// Assemble the matrix of the operator defined by the given kernel.
///
/// The kernel must be linear in its trial arguments. Constraints are eliminated as `Cᵀ A C`, so
/// that rows and columns of constrained DoFs are zero. DoF maps with ghost DoFs are not
/// supported.
pub fn assemble_oracle_matrix<T, D, K>(
    mesh: &Mesh<T, D>,
    dof_map: &DofIndexMap,
    constraints: &ConstraintSet<T>,
    config: &MatrixFreeConfig,
    kernel: &K,
) -> Result<CsrMatrix<T>, MatrixFreeError>
where
    T: Real,
    D: SmallDim,
    K: DgKernel<T, D>,
    DefaultAllocator: DimAllocator<T, D>,
{
    config.validate()?;
    let dim = D::dim();
    if dim == 0 || dim > MAX_DIM {
        return Err(MatrixFreeError::UnsupportedDimension { dim });
    }
    if dof_map.n_ghosts() > 0 {
        return Err(MatrixFreeError::InvalidConfiguration(
            "oracle assembly does not support ghost DoFs".to_string(),
        ));
    }

    let quadrature = TensorQuadrature::<T, D>::gauss(config.num_quadrature_points_per_dim())?;
    let shape = ShapeInfo::new(config.degree, quadrature.points_1d());
    let n = shape.dofs_per_cell(dim);
    dof_map.validate(mesh.num_cells(), n)?;

    let resolved = constraints.close()?;
    resolved.check_bounds(dof_map.n_local())?;

    let num_dofs = dof_map.n_owned();
    let mut assembler = ConstrainedAssembler {
        constraints: &resolved,
        coo: CooMatrix::new(num_dofs, num_dofs),
    };

    let mut element_matrix = DMatrix::zeros(n, n);
    for cell in 0..mesh.num_cells() {
        element_matrix.fill(T::zero());
        for (&w, xi) in izip!(quadrature.cell_weights(), quadrature.cell_points()) {
            let basis = PointBasis::compute(mesh, &shape, cell, xi)?;
            let jxw = w * basis.mapping.determinant;
            for (j, u) in basis.functions.iter().enumerate() {
                let test = kernel.evaluate_cell(&basis.mapping.point, u);
                for (i, v) in basis.functions.iter().enumerate() {
                    element_matrix[(i, j)] += jxw * pair(&test, v);
                }
            }
        }
        assembler.add_local_matrix(dof_map.cell_dofs(cell), &element_matrix);
    }

    let topology = FaceTopology::compute(mesh)?;
    let inversion_tolerance = T::default_epsilon().sqrt();
    let zero = PointValues::zero();
    let two = T::one() + T::one();

    let mut face_matrix = DMatrix::zeros(2 * n, 2 * n);
    for face in topology.interior_faces() {
        let (interior, exterior) = (face.interior, face.exterior);
        let interior_points = quadrature.face_points_on_cell(interior.local_face);
        let exterior_center = face_to_cell_coordinates::<T, D>(exterior.local_face, &[]);
        face_matrix.fill(T::zero());

        for (&w, xi) in izip!(quadrature.face_weights(), &interior_points) {
            let interior_basis = PointBasis::compute(mesh, &shape, interior.cell, xi)?;
            let (jxw, normal, interior_inverse_length) = face_measure(&interior_basis.mapping, interior, w);

            let x = &interior_basis.mapping.point;
            let xi_exterior = mesh
                .invert_reference_map(exterior.cell, x, &exterior_center, inversion_tolerance)
                .ok_or(MatrixFreeError::PointInversionFailed { cell: exterior.cell })?;
            let exterior_basis = PointBasis::compute(mesh, &shape, exterior.cell, &xi_exterior)?;
            let exterior_inverse_length =
                exterior_basis.mapping.face_scale(face_axis(exterior.local_face)) / two;

            let context = FaceContext {
                point: x,
                normal: &normal,
                interior_inverse_length,
                exterior_inverse_length: Some(exterior_inverse_length),
                boundary_id: None,
                degree: shape.degree(),
            };

            for j in 0..2 * n {
                let (u_interior, u_exterior) = if j < n {
                    (&interior_basis.functions[j], &zero)
                } else {
                    (&zero, &exterior_basis.functions[j - n])
                };
                let test = kernel.evaluate_face(&context, u_interior, Some(u_exterior));
                let exterior_test = test.exterior.as_ref().unwrap_or(&zero);
                for i in 0..n {
                    face_matrix[(i, j)] += jxw * pair(&test.interior, &interior_basis.functions[i]);
                    face_matrix[(n + i, j)] += jxw * pair(exterior_test, &exterior_basis.functions[i]);
                }
            }
        }

        let dofs: Vec<usize> = dof_map
            .cell_dofs(interior.cell)
            .iter()
            .chain(dof_map.cell_dofs(exterior.cell))
            .copied()
            .collect();
        assembler.add_local_matrix(&dofs, &face_matrix);
    }

    let mut boundary_matrix = DMatrix::zeros(n, n);
    for &boundary in topology.boundary_faces() {
        boundary_matrix.fill(T::zero());
        for (&w, xi) in izip!(quadrature.face_weights(), &quadrature.face_points_on_cell(boundary.local_face)) {
            let basis = PointBasis::compute(mesh, &shape, boundary.cell, xi)?;
            let (jxw, normal, interior_inverse_length) = face_measure(&basis.mapping, boundary, w);
            let context = FaceContext {
                point: &basis.mapping.point,
                normal: &normal,
                interior_inverse_length,
                exterior_inverse_length: None,
                boundary_id: Some(boundary.local_face),
                degree: shape.degree(),
            };
            for (j, u) in basis.functions.iter().enumerate() {
                let test = kernel.evaluate_face(&context, u, None);
                for (i, v) in basis.functions.iter().enumerate() {
                    boundary_matrix[(i, j)] += jxw * pair(&test.interior, v);
                }
            }
        }
        assembler.add_local_matrix(dof_map.cell_dofs(boundary.cell), &boundary_matrix);
    }

    debug!(
        "Assembled oracle matrix with {} rows and {} stored entries before compression",
        num_dofs,
        assembler.coo.nnz()
    );
    Ok(CsrMatrix::from(&assembler.coo))
}

/// Surface measure, outward unit normal and inverse cell length at a face point.
fn face_measure<T, D>(mapping: &PointMapping<T, D>, cell_face: CellFace, weight: T) -> (T, OVector<T, D>, T)
where
    T: Real,
    D: SmallDim,
    DefaultAllocator: DimAllocator<T, D>,
{
    let axis = face_axis(cell_face.local_face);
    let sign = if face_side(cell_face.local_face) == 0 { -T::one() } else { T::one() };
    let scale = mapping.face_scale(axis);
    let normal = mapping.inverse_jacobian_transpose.column(axis) * (sign / scale);
    (weight * mapping.determinant * scale, normal, scale / (T::one() + T::one()))
}

/// The dense matrix of the operator, obtained by applying it to every unit vector.
pub fn dense_operator_matrix<T, D, K>(
    operator: &MatrixFreeOperator<T, D>,
    kernel: &K,
) -> Result<DMatrix<T>, MatrixFreeError>
where
    T: Real,
    D: SmallDim,
    K: DgKernel<T, D>,
    DefaultAllocator: DimAllocator<T, D>,
{
    let partition = operator.partition();
    let n = partition.n_owned;
    let mut matrix = DMatrix::zeros(n, n);
    let mut unit = DofVector::zeros(partition);
    for j in 0..n {
        unit.as_mut_slice()[j] = T::one();
        let column = operator.apply(kernel, &unit)?;
        matrix.set_column(j, column.values());
        unit.as_mut_slice()[j] = T::zero();
    }
    Ok(matrix)
}

/// Check that the operator agrees with an explicitly assembled matrix.
///
/// Every column `A e_j` of the operator is compared with the corresponding column of `oracle`.
/// Fails on the first column whose largest deviation exceeds `tolerance` times the largest
/// absolute entry of `oracle`.
pub fn verify_against_oracle<T, D, K>(
    operator: &MatrixFreeOperator<T, D>,
    kernel: &K,
    oracle: &CsrMatrix<T>,
    tolerance: T,
) -> eyre::Result<()>
where
    T: Real,
    D: SmallDim,
    K: DgKernel<T, D>,
    DefaultAllocator: DimAllocator<T, D>,
{
    let n = operator.partition().n_owned;
    if oracle.nrows() != n || oracle.ncols() != n {
        bail!(
            "Oracle matrix has dimensions {}x{}, but the operator acts on {} DoFs",
            oracle.nrows(),
            oracle.ncols(),
            n
        );
    }

    let expected = DMatrix::from(oracle);
    let actual = dense_operator_matrix(operator, kernel)?;
    let scale = expected.amax();
    let threshold = if scale > T::zero() { tolerance * scale } else { tolerance };

    for (j, (actual_column, expected_column)) in actual.column_iter().zip(expected.column_iter()).enumerate() {
        let difference = actual_column - expected_column;
        let deviation = difference.amax();
        if deviation > threshold {
            let row = difference.iamax();
            return Err(eyre!(
                "Column {} deviates from oracle by {} at row {} (threshold {})",
                j,
                deviation,
                row,
                threshold
            ));
        }
    }
    Ok(())
}
