//! The matrix-free operator.
use crate::allocators::DimAllocator;
use crate::basis::ShapeInfo;
use crate::batch::{build_cell_batches, build_face_batches, color_batches, CellBatch, FaceBatch, LaneDofs};
use crate::config::{MatrixFreeConfig, Parallelism};
use crate::constraints::{ConstraintSet, ResolvedConstraints};
use crate::dofs::{DofIndexMap, FacePairTable};
use crate::evaluator::{evaluate, integrate, EvaluatorWorkspace};
use crate::geometry::GeometryCache;
use crate::kernels::{CellKernel, DgKernel, FaceContext, FaceKernel, PointValues};
use crate::mesh::topology::FaceTopology;
use crate::mesh::Mesh;
use crate::quadrature::TensorQuadrature;
use crate::vector::{DofVector, GhostExchange, LocalView, NoGhosts, Partition};
use crate::{MatrixFreeError, Real, SmallDim, MAX_DIM};
use log::{debug, trace, warn};
use matfree_paradis::{DisjointSubsets, SubsetAccess};
use nalgebra::{DefaultAllocator, OMatrix, OVector};
use rayon::iter::ParallelIterator;
use std::cell::RefCell;
use thread_local::ThreadLocal;

/// Destination of scatter-add operations, addressed by position in the write set of a batch.
trait ScatterTarget<T> {
    fn add(&mut self, position: usize, value: T);
}

impl<'a, T: Real> ScatterTarget<T> for SubsetAccess<'a, T> {
    #[inline]
    fn add(&mut self, position: usize, value: T) {
        *self.get_mut(position) += value;
    }
}

struct SliceTarget<'a, T> {
    destination: &'a mut [T],
    write_set: &'a [usize],
}

impl<'a, T: Real> ScatterTarget<T> for SliceTarget<'a, T> {
    #[inline]
    fn add(&mut self, position: usize, value: T) {
        self.destination[self.write_set[position]] += value;
    }
}

/// Evaluates the action of a finite element operator without assembling its matrix.
///
/// The operator is built once for a mesh, a DoF numbering and a set of constraints. Its action
/// for a given pointwise kernel is computed by a cell pass followed by a face pass. Within each
/// pass, batches are either processed serially or, by default, in parallel colors with disjoint
/// write sets.
///
/// Constraints are eliminated on the fly: constrained source entries are replaced by their
/// masters (ignoring inhomogeneities), contributions to constrained DoFs are distributed to their
/// masters, and constrained entries of the destination are never written.
pub struct MatrixFreeOperator<T, D>
where
    T: Real,
    D: SmallDim,
    DefaultAllocator: DimAllocator<T, D>,
{
    config: MatrixFreeConfig,
    shape: ShapeInfo<T>,
    dof_map: DofIndexMap,
    faces: FacePairTable,
    geometry: GeometryCache<T, D>,
    constraints: ResolvedConstraints<T>,
    cell_batches: Vec<CellBatch<T>>,
    face_batches: Vec<FaceBatch<T>>,
    cell_colors: Vec<DisjointSubsets>,
    face_colors: Vec<DisjointSubsets>,
    workspace: ThreadLocal<RefCell<EvaluatorWorkspace<T>>>,
}

impl<T, D> MatrixFreeOperator<T, D>
where
    T: Real,
    D: SmallDim,
    DefaultAllocator: DimAllocator<T, D>,
{
    pub fn new(
        mesh: &Mesh<T, D>,
        dof_map: DofIndexMap,
        constraints: &ConstraintSet<T>,
        config: MatrixFreeConfig,
    ) -> Result<Self, MatrixFreeError> {
        config.validate()?;
        let dim = D::dim();
        if dim == 0 || dim > MAX_DIM {
            return Err(MatrixFreeError::UnsupportedDimension { dim });
        }
        if mesh.num_cells() == 0 {
            warn!("Building matrix-free operator for an empty mesh");
        }

        let quadrature = TensorQuadrature::<T, D>::gauss(config.num_quadrature_points_per_dim())?;
        let shape = ShapeInfo::new(config.degree, quadrature.points_1d());
        dof_map.validate(mesh.num_cells(), shape.dofs_per_cell(dim))?;

        let constraints = constraints.close()?;
        constraints.check_bounds(dof_map.n_local())?;

        let topology = FaceTopology::compute(mesh)?;
        let faces = FacePairTable::build(&topology, &dof_map)?;
        let geometry = GeometryCache::build(mesh, &faces, &quadrature)?;

        let cell_batches = build_cell_batches(&dof_map, &constraints, config.batch_width);
        let face_batches = build_face_batches(
            &faces,
            &dof_map,
            &constraints,
            config.batch_width,
            dim - 1,
            quadrature.num_points_per_dim(),
        );
        let cell_colors = color_batches(cell_batches.iter().map(|batch| batch.dofs.write_set()));
        let face_colors = color_batches(face_batches.iter().map(|batch| batch.dofs.write_set()));

        debug!(
            "Built matrix-free operator: degree {}, {} cells in {} batches ({} colors), {} faces in {} batches ({} colors)",
            config.degree,
            mesh.num_cells(),
            cell_batches.len(),
            cell_colors.len(),
            faces.len(),
            face_batches.len(),
            face_colors.len()
        );

        Ok(Self {
            config,
            shape,
            dof_map,
            faces,
            geometry,
            constraints,
            cell_batches,
            face_batches,
            cell_colors,
            face_colors,
            workspace: ThreadLocal::new(),
        })
    }

    pub fn config(&self) -> &MatrixFreeConfig {
        &self.config
    }

    pub fn shape(&self) -> &ShapeInfo<T> {
        &self.shape
    }

    pub fn dof_map(&self) -> &DofIndexMap {
        &self.dof_map
    }

    pub fn face_pairs(&self) -> &FacePairTable {
        &self.faces
    }

    pub fn geometry(&self) -> &GeometryCache<T, D> {
        &self.geometry
    }

    pub fn constraints(&self) -> &ResolvedConstraints<T> {
        &self.constraints
    }

    pub fn cell_batches(&self) -> &[CellBatch<T>] {
        &self.cell_batches
    }

    pub fn face_batches(&self) -> &[FaceBatch<T>] {
        &self.face_batches
    }

    pub fn num_cell_colors(&self) -> usize {
        self.cell_colors.len()
    }

    pub fn num_face_colors(&self) -> usize {
        self.face_colors.len()
    }

    pub fn partition(&self) -> Partition {
        Partition::new(self.dof_map.n_owned(), self.dof_map.n_ghosts())
    }

    /// Compute `A src`.
    pub fn apply<K>(&self, kernel: &K, src: &DofVector<T>) -> Result<DofVector<T>, MatrixFreeError>
    where
        K: DgKernel<T, D>,
    {
        self.apply_with_exchange(kernel, src, &NoGhosts)
    }

    /// Compute `A src`, importing ghost values and exporting ghost contributions through the
    /// given exchange.
    pub fn apply_with_exchange<K, E>(
        &self,
        kernel: &K,
        src: &DofVector<T>,
        exchange: &E,
    ) -> Result<DofVector<T>, MatrixFreeError>
    where
        K: DgKernel<T, D>,
        E: ?Sized + GhostExchange<T>,
    {
        let mut dst = DofVector::zeros(self.partition());
        self.apply_add_with_exchange(kernel, &mut dst, src, exchange)?;
        Ok(dst)
    }

    /// Compute `dst += A src`.
    pub fn apply_add<K>(&self, kernel: &K, dst: &mut DofVector<T>, src: &DofVector<T>) -> Result<(), MatrixFreeError>
    where
        K: DgKernel<T, D>,
    {
        self.apply_add_with_exchange(kernel, dst, src, &NoGhosts)
    }

    pub fn apply_add_with_exchange<K, E>(
        &self,
        kernel: &K,
        dst: &mut DofVector<T>,
        src: &DofVector<T>,
        exchange: &E,
    ) -> Result<(), MatrixFreeError>
    where
        K: DgKernel<T, D>,
        E: ?Sized + GhostExchange<T>,
    {
        self.with_local_space(dst, src, exchange, |source, destination| {
            self.cell_pass(kernel, source, destination);
            self.face_pass(kernel, source, destination);
        })
    }

    /// Compute `dst += A_cells src`, the contribution of cell integrals only.
    pub fn apply_cells_add<K>(&self, kernel: &K, dst: &mut DofVector<T>, src: &DofVector<T>) -> Result<(), MatrixFreeError>
    where
        K: CellKernel<T, D>,
    {
        self.with_local_space(dst, src, &NoGhosts, |source, destination| {
            self.cell_pass(kernel, source, destination)
        })
    }

    /// Compute `dst += A_faces src`, the contribution of face integrals only.
    pub fn apply_faces_add<K>(&self, kernel: &K, dst: &mut DofVector<T>, src: &DofVector<T>) -> Result<(), MatrixFreeError>
    where
        K: FaceKernel<T, D>,
    {
        self.with_local_space(dst, src, &NoGhosts, |source, destination| {
            self.face_pass(kernel, source, destination)
        })
    }

    /// Run the given passes on the local DoF space, with ghost values imported before and ghost
    /// contributions exported after.
    fn with_local_space<E, F>(
        &self,
        dst: &mut DofVector<T>,
        src: &DofVector<T>,
        exchange: &E,
        passes: F,
    ) -> Result<(), MatrixFreeError>
    where
        E: ?Sized + GhostExchange<T>,
        F: FnOnce(LocalView<T>, &mut [T]),
    {
        let n_owned = self.dof_map.n_owned();
        let n_ghosts = self.dof_map.n_ghosts();
        for actual in [src.len(), dst.len()] {
            if actual != n_owned {
                return Err(MatrixFreeError::SizeMismatch {
                    expected: n_owned,
                    actual,
                });
            }
        }
        if exchange.num_ghosts() != n_ghosts {
            return Err(MatrixFreeError::SizeMismatch {
                expected: n_ghosts,
                actual: exchange.num_ghosts(),
            });
        }
        exchange.check_owners(n_owned)?;

        let mut ghosts = vec![T::zero(); n_ghosts];
        exchange.import_ghosts(src.as_slice(), &mut ghosts);
        let source = LocalView::new(src.as_slice(), &ghosts);

        if n_ghosts == 0 {
            passes(source, dst.as_mut_slice());
        } else {
            let mut local = vec![T::zero(); n_owned + n_ghosts];
            local[..n_owned].copy_from_slice(dst.as_slice());
            passes(source, &mut local);
            let (owned, ghost_contributions) = local.split_at(n_owned);
            dst.as_mut_slice().copy_from_slice(owned);
            exchange.export_ghosts(ghost_contributions, dst.as_mut_slice());
        }
        Ok(())
    }

    fn cell_pass<K>(&self, kernel: &K, source: LocalView<T>, destination: &mut [T])
    where
        K: CellKernel<T, D>,
    {
        trace!("Cell pass over {} batches", self.cell_batches.len());
        match self.config.parallelism {
            Parallelism::Serial => {
                let ws = &mut *self.workspace.get_or_default().borrow_mut();
                for batch in &self.cell_batches {
                    let mut target = SliceTarget {
                        destination: &mut *destination,
                        write_set: batch.dofs.write_set(),
                    };
                    self.process_cell_batch(kernel, batch, source, &mut target, ws);
                }
            }
            Parallelism::Colored => {
                for color in &self.cell_colors {
                    color.subsets_par_iter(&mut *destination).for_each(|mut subset| {
                        let ws = &mut *self.workspace.get_or_default().borrow_mut();
                        let batch = &self.cell_batches[subset.label()];
                        self.process_cell_batch(kernel, batch, source, &mut subset, ws);
                    });
                }
            }
        }
    }

    fn face_pass<K>(&self, kernel: &K, source: LocalView<T>, destination: &mut [T])
    where
        K: FaceKernel<T, D>,
    {
        trace!("Face pass over {} batches", self.face_batches.len());
        match self.config.parallelism {
            Parallelism::Serial => {
                let ws = &mut *self.workspace.get_or_default().borrow_mut();
                for batch in &self.face_batches {
                    let mut target = SliceTarget {
                        destination: &mut *destination,
                        write_set: batch.dofs.write_set(),
                    };
                    self.process_face_batch(kernel, batch, source, &mut target, ws);
                }
            }
            Parallelism::Colored => {
                for color in &self.face_colors {
                    color.subsets_par_iter(&mut *destination).for_each(|mut subset| {
                        let ws = &mut *self.workspace.get_or_default().borrow_mut();
                        let batch = &self.face_batches[subset.label()];
                        self.process_face_batch(kernel, batch, source, &mut subset, ws);
                    });
                }
            }
        }
    }

    fn process_cell_batch<K, S>(
        &self,
        kernel: &K,
        batch: &CellBatch<T>,
        source: LocalView<T>,
        target: &mut S,
        workspace: &mut EvaluatorWorkspace<T>,
    ) where
        K: CellKernel<T, D>,
        S: ScatterTarget<T>,
    {
        let dim = D::dim();
        let lanes = batch.lanes();
        let n_dofs = self.shape.dofs_per_cell(dim);
        let n_q = self.geometry.n_q_cell();
        let EvaluatorWorkspace {
            interior: buffers,
            tensor,
            ..
        } = workspace;
        let lane_dofs = batch.dofs.side(0);

        buffers.resize(n_dofs, n_q, dim, lanes);
        gather(lane_dofs, batch.dofs.write_set(), source, lanes, n_dofs, &mut buffers.dofs);
        evaluate(
            &self.shape,
            dim,
            None,
            lanes,
            &buffers.dofs,
            &mut buffers.values,
            &mut buffers.gradients,
            tensor,
        );

        for (lane, &cell) in batch.cells.iter().enumerate() {
            let jxw = self.geometry.cell_jxw(cell);
            let inverse_jacobians = self.geometry.cell_inverse_jacobians(cell);
            let points = self.geometry.cell_points(cell);
            for q in 0..n_q {
                let index = PointIndex::new(n_q, lanes, q, lane);
                let u = read_point(&buffers.values, &buffers.gradients, &inverse_jacobians[q], index);
                let test = kernel.evaluate_cell(&points[q], &u);
                write_point(
                    &mut buffers.values,
                    &mut buffers.gradients,
                    &inverse_jacobians[q],
                    jxw[q],
                    &test,
                    index,
                );
            }
        }

        integrate(
            &self.shape,
            dim,
            None,
            lanes,
            &buffers.values,
            &buffers.gradients,
            &mut buffers.dofs,
            tensor,
        );
        scatter(lane_dofs, lanes, n_dofs, &buffers.dofs, target);
    }

    fn process_face_batch<K, S>(
        &self,
        kernel: &K,
        batch: &FaceBatch<T>,
        source: LocalView<T>,
        target: &mut S,
        workspace: &mut EvaluatorWorkspace<T>,
    ) where
        K: FaceKernel<T, D>,
        S: ScatterTarget<T>,
    {
        let dim = D::dim();
        let lanes = batch.lanes();
        let n_dofs = self.shape.dofs_per_cell(dim);
        let n_q = self.geometry.n_q_face();
        let write_set = batch.dofs.write_set();
        let EvaluatorWorkspace {
            interior,
            exterior,
            tensor,
        } = workspace;

        interior.resize(n_dofs, n_q, dim, lanes);
        gather(batch.dofs.side(0), write_set, source, lanes, n_dofs, &mut interior.dofs);
        evaluate(
            &self.shape,
            dim,
            Some(batch.interior_face),
            lanes,
            &interior.dofs,
            &mut interior.values,
            &mut interior.gradients,
            tensor,
        );
        if let Some(exterior_side) = &batch.exterior {
            exterior.resize(n_dofs, n_q, dim, lanes);
            gather(batch.dofs.side(1), write_set, source, lanes, n_dofs, &mut exterior.dofs);
            evaluate(
                &self.shape,
                dim,
                Some(exterior_side.local_face),
                lanes,
                &exterior.dofs,
                &mut exterior.values,
                &mut exterior.gradients,
                tensor,
            );
        }

        for (lane, &face) in batch.faces.iter().enumerate() {
            let jxw = self.geometry.face_jxw(face);
            let normals = self.geometry.face_normals(face);
            let points = self.geometry.face_points(face);
            let interior_inverse_jacobians = self.geometry.face_interior_inverse_jacobians(face);
            let interior_inverse_lengths = self.geometry.face_interior_inverse_lengths(face);

            for q in 0..n_q {
                let interior_index = PointIndex::new(n_q, lanes, q, lane);
                let u_interior = read_point(
                    &interior.values,
                    &interior.gradients,
                    &interior_inverse_jacobians[q],
                    interior_index,
                );
                let mut context = FaceContext {
                    point: &points[q],
                    normal: &normals[q],
                    interior_inverse_length: interior_inverse_lengths[q],
                    exterior_inverse_length: None,
                    boundary_id: None,
                    degree: self.shape.degree(),
                };

                match &batch.exterior {
                    Some(exterior_side) => {
                        // The exterior side was evaluated in its own quadrature ordering
                        let p = exterior_side.permutation[q];
                        let exterior_index = PointIndex::new(n_q, lanes, p, lane);
                        let exterior_inverse_jacobian = &self.geometry.face_exterior_inverse_jacobians(face)[p];
                        let u_exterior = read_point(
                            &exterior.values,
                            &exterior.gradients,
                            exterior_inverse_jacobian,
                            exterior_index,
                        );
                        context.exterior_inverse_length = Some(self.geometry.face_exterior_inverse_lengths(face)[q]);

                        let test = kernel.evaluate_face(&context, &u_interior, Some(&u_exterior));
                        write_point(
                            &mut interior.values,
                            &mut interior.gradients,
                            &interior_inverse_jacobians[q],
                            jxw[q],
                            &test.interior,
                            interior_index,
                        );
                        let exterior_test = test.exterior.unwrap_or_else(PointValues::zero);
                        write_point(
                            &mut exterior.values,
                            &mut exterior.gradients,
                            exterior_inverse_jacobian,
                            jxw[q],
                            &exterior_test,
                            exterior_index,
                        );
                    }
                    None => {
                        context.boundary_id = self.faces.pairs()[face].boundary_id;
                        let test = kernel.evaluate_face(&context, &u_interior, None);
                        write_point(
                            &mut interior.values,
                            &mut interior.gradients,
                            &interior_inverse_jacobians[q],
                            jxw[q],
                            &test.interior,
                            interior_index,
                        );
                    }
                }
            }
        }

        integrate(
            &self.shape,
            dim,
            Some(batch.interior_face),
            lanes,
            &interior.values,
            &interior.gradients,
            &mut interior.dofs,
            tensor,
        );
        scatter(batch.dofs.side(0), lanes, n_dofs, &interior.dofs, target);
        if let Some(exterior_side) = &batch.exterior {
            integrate(
                &self.shape,
                dim,
                Some(exterior_side.local_face),
                lanes,
                &exterior.values,
                &exterior.gradients,
                &mut exterior.dofs,
                tensor,
            );
            scatter(batch.dofs.side(1), lanes, n_dofs, &exterior.dofs, target);
        }
    }
}

/// Location of a point of a lane in the value and gradient buffers.
#[derive(Debug, Copy, Clone)]
struct PointIndex {
    index: usize,
    block: usize,
}

impl PointIndex {
    fn new(num_points: usize, lanes: usize, q: usize, lane: usize) -> Self {
        Self {
            index: q * lanes + lane,
            block: num_points * lanes,
        }
    }
}

fn read_point<T, D>(
    values: &[T],
    gradients: &[T],
    inverse_jacobian_transpose: &OMatrix<T, D, D>,
    at: PointIndex,
) -> PointValues<T, D>
where
    T: Real,
    D: SmallDim,
    DefaultAllocator: DimAllocator<T, D>,
{
    let reference_gradient = OVector::<T, D>::from_fn(|c, _| gradients[c * at.block + at.index]);
    PointValues::new(values[at.index], inverse_jacobian_transpose * reference_gradient)
}

/// Store test coefficients, mapped back to the reference cell and multiplied by the quadrature
/// weight.
fn write_point<T, D>(
    values: &mut [T],
    gradients: &mut [T],
    inverse_jacobian_transpose: &OMatrix<T, D, D>,
    jxw: T,
    test: &PointValues<T, D>,
    at: PointIndex,
) where
    T: Real,
    D: SmallDim,
    DefaultAllocator: DimAllocator<T, D>,
{
    values[at.index] = test.value * jxw;
    let reference_gradient = inverse_jacobian_transpose.tr_mul(&test.gradient) * jxw;
    for (c, &component) in reference_gradient.iter().enumerate() {
        gradients[c * at.block + at.index] = component;
    }
}

fn gather<T: Real>(
    lane_dofs: &LaneDofs<T>,
    write_set: &[usize],
    source: LocalView<T>,
    lanes: usize,
    n_dofs: usize,
    dofs: &mut [T],
) {
    for lane in 0..lanes {
        for i in 0..n_dofs {
            let mut value = T::zero();
            for &(position, coefficient) in lane_dofs.entries(lane, i) {
                value += coefficient * source.get(write_set[position]);
            }
            dofs[i * lanes + lane] = value;
        }
    }
}

fn scatter<T: Real, S: ScatterTarget<T>>(lane_dofs: &LaneDofs<T>, lanes: usize, n_dofs: usize, dofs: &[T], target: &mut S) {
    for lane in 0..lanes {
        for i in 0..n_dofs {
            let contribution = dofs[i * lanes + lane];
            for &(position, coefficient) in lane_dofs.entries(lane, i) {
                target.add(position, coefficient * contribution);
            }
        }
    }
}
