use crate::{DisjointSubsets, NestedVec};
use std::mem;

/// Partition the given subsets into colors, such that the subsets within each color are disjoint.
///
/// Subsets are visited in order and assigned greedily to the first color in which they do not
/// conflict with any subset already assigned to the same color. The label of each subset in the
/// output is its index in `subsets`.
pub fn sequential_greedy_coloring(subsets: &NestedVec<usize>) -> Vec<DisjointSubsets> {
    let mut colors = Vec::new();
    let mut postponed_subset_indices = Vec::new();
    let mut current_subset_indices: Vec<_> = (0..subsets.len()).collect();

    // For each index, the last color that claimed it. The table grows on demand since we do not
    // know the largest index up front.
    let mut last_claimed_by_color: Vec<Option<usize>> = Vec::new();

    let mut color_idx = 0;
    while !current_subset_indices.is_empty() {
        let mut color_subsets = NestedVec::new();
        let mut color_labels = Vec::new();
        let mut max_index = None;
        for &subset_idx in &current_subset_indices {
            let subset = subsets.get(subset_idx).unwrap_or(&[]);
            let is_blocked = subset
                .iter()
                .any(|idx| last_claimed_by_color.get(*idx).copied().flatten() == Some(color_idx));
            if is_blocked {
                postponed_subset_indices.push(subset_idx);
            } else {
                for &idx in subset {
                    max_index = max_index.max(Some(idx));
                    if idx >= last_claimed_by_color.len() {
                        // Amortize resizes by creating a larger table than we need right now
                        last_claimed_by_color.resize(2 * idx + 1, None);
                    }
                    last_claimed_by_color[idx] = Some(color_idx);
                }
                color_subsets.push(subset);
                color_labels.push(subset_idx);
            }
        }

        debug_assert!(DisjointSubsets::try_from_disjoint_subsets(color_subsets.clone(), color_labels.clone()).is_ok());

        // Subsets are disjoint by construction, so skip checks
        let color = unsafe { DisjointSubsets::from_disjoint_subsets_unchecked(color_subsets, color_labels, max_index) };
        colors.push(color);
        mem::swap(&mut postponed_subset_indices, &mut current_subset_indices);
        postponed_subset_indices.clear();
        color_idx += 1;
    }

    colors
}
