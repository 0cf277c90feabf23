//! Affine DoF constraints of the form `u_i = Σ_j c_ij u_j + b_i`.
//!
//! Constraints may reference other constrained DoFs, as long as the references do not form a
//! cycle. Before use, a [`ConstraintSet`] is closed into [`ResolvedConstraints`], in which every
//! constrained DoF is expressed in terms of unconstrained DoFs only.
use crate::{MatrixFreeError, Real};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConstraintLine<T> {
    pub entries: Vec<(usize, T)>,
    pub inhomogeneity: T,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConstraintSet<T> {
    lines: BTreeMap<usize, ConstraintLine<T>>,
}

impl<T> Default for ConstraintSet<T> {
    fn default() -> Self {
        Self { lines: BTreeMap::new() }
    }
}

impl<T: Real> ConstraintSet<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Constrain `dof` to `Σ c_j u_j + inhomogeneity`, replacing any previous constraint on it.
    pub fn add_line(&mut self, dof: usize, entries: Vec<(usize, T)>, inhomogeneity: T) {
        self.lines.insert(dof, ConstraintLine { entries, inhomogeneity });
    }

    /// Constrain each of the given DoFs to zero.
    pub fn add_homogeneous_dirichlet(&mut self, dofs: impl IntoIterator<Item = usize>) {
        for dof in dofs {
            self.add_line(dof, Vec::new(), T::zero());
        }
    }

    pub fn is_constrained(&self, dof: usize) -> bool {
        self.lines.contains_key(&dof)
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Resolve chains of constraints.
    ///
    /// Fails with [`MatrixFreeError::CyclicConstraints`] if a constrained DoF depends on itself,
    /// directly or through other constraints.
    pub fn close(&self) -> Result<ResolvedConstraints<T>, MatrixFreeError> {
        let mut resolved = BTreeMap::new();
        for &dof in self.lines.keys() {
            self.resolve_line(dof, &mut resolved)?;
        }
        Ok(ResolvedConstraints { lines: resolved })
    }

    /// Resolve `root` and every constrained DoF it depends on, depth first.
    ///
    /// Chains are walked with an explicit stack instead of recursion.
    fn resolve_line(&self, root: usize, resolved: &mut BTreeMap<usize, ConstraintLine<T>>) -> Result<(), MatrixFreeError> {
        if resolved.contains_key(&root) {
            return Ok(());
        }
        let mut in_progress = HashSet::from([root]);
        let mut stack = vec![root];

        while let Some(&dof) = stack.last() {
            let line = &self.lines[&dof];
            let pending_master = line
                .entries
                .iter()
                .map(|&(master, _)| master)
                .find(|master| self.lines.contains_key(master) && !resolved.contains_key(master));

            if let Some(master) = pending_master {
                if !in_progress.insert(master) {
                    return Err(MatrixFreeError::CyclicConstraints { dof: master });
                }
                stack.push(master);
                continue;
            }

            let mut entries = Vec::with_capacity(line.entries.len());
            let mut inhomogeneity = line.inhomogeneity;
            for &(master, coefficient) in &line.entries {
                match resolved.get(&master) {
                    Some(master_line) => {
                        entries.extend(
                            master_line
                                .entries
                                .iter()
                                .map(|&(j, c_j)| (j, coefficient * c_j)),
                        );
                        inhomogeneity += coefficient * master_line.inhomogeneity;
                    }
                    None => entries.push((master, coefficient)),
                }
            }

            resolved.insert(
                dof,
                ConstraintLine {
                    entries: merge_duplicate_entries(entries),
                    inhomogeneity,
                },
            );
            in_progress.remove(&dof);
            stack.pop();
        }
        Ok(())
    }
}

fn merge_duplicate_entries<T: Real>(mut entries: Vec<(usize, T)>) -> Vec<(usize, T)> {
    entries.sort_by_key(|&(j, _)| j);
    let mut merged: Vec<(usize, T)> = Vec::with_capacity(entries.len());
    for (j, c) in entries {
        match merged.last_mut() {
            Some((last_j, last_c)) if *last_j == j => *last_c += c,
            _ => merged.push((j, c)),
        }
    }
    merged
}

/// Constraints in which every constrained DoF depends on unconstrained DoFs only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedConstraints<T> {
    lines: BTreeMap<usize, ConstraintLine<T>>,
}

impl<T> Default for ResolvedConstraints<T> {
    fn default() -> Self {
        Self { lines: BTreeMap::new() }
    }
}

impl<T: Real> ResolvedConstraints<T> {
    pub fn is_constrained(&self, dof: usize) -> bool {
        self.lines.contains_key(&dof)
    }

    pub fn line(&self, dof: usize) -> Option<&ConstraintLine<T>> {
        self.lines.get(&dof)
    }

    pub fn lines(&self) -> impl '_ + Iterator<Item = (usize, &ConstraintLine<T>)> {
        self.lines.iter().map(|(&dof, line)| (dof, line))
    }

    /// The homogeneous expansion of a DoF in terms of unconstrained DoFs.
    ///
    /// An unconstrained DoF expands to itself with coefficient one.
    pub fn expand(&self, dof: usize) -> Vec<(usize, T)> {
        match self.lines.get(&dof) {
            Some(line) => line.entries.clone(),
            None => vec![(dof, T::one())],
        }
    }

    /// Check that all constrained and master DoFs are smaller than `num_dofs`.
    pub fn check_bounds(&self, num_dofs: usize) -> Result<(), MatrixFreeError> {
        for (&dof, line) in &self.lines {
            let indices = std::iter::once(dof).chain(line.entries.iter().map(|&(j, _)| j));
            for index in indices {
                if index >= num_dofs {
                    return Err(MatrixFreeError::DofIndexOutOfBounds { index, num_dofs });
                }
            }
        }
        Ok(())
    }

    /// Set every constrained entry from its masters, including the inhomogeneity.
    pub fn distribute(&self, values: &mut [T]) -> Result<(), MatrixFreeError> {
        self.check_bounds(values.len())?;
        for (&dof, line) in &self.lines {
            let mut value = line.inhomogeneity;
            for &(j, c) in &line.entries {
                value += c * values[j];
            }
            values[dof] = value;
        }
        Ok(())
    }

    /// Set every constrained entry to zero.
    pub fn set_zero(&self, values: &mut [T]) -> Result<(), MatrixFreeError> {
        self.check_bounds(values.len())?;
        for &dof in self.lines.keys() {
            values[dof] = T::zero();
        }
        Ok(())
    }
}
