use serde::{Deserialize, Serialize};
use std::fmt;
use std::fmt::Debug;
use std::ops::Range;

/// A compact storage for a sequence of variable-length arrays.
///
/// All arrays share a single contiguous buffer, with an offset table marking where each array
/// begins and ends.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NestedVec<T> {
    data: Vec<T>,
    offsets: Vec<usize>,
}

impl<T: Debug> Debug for NestedVec<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

impl<T> Default for NestedVec<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> NestedVec<T> {
    pub fn new() -> Self {
        Self {
            data: Vec::new(),
            offsets: vec![0],
        }
    }

    /// Number of arrays.
    pub fn len(&self) -> usize {
        self.offsets.len() - 1
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, index: usize) -> Option<&[T]> {
        let range = self.index_range(index)?;
        self.data.get(range)
    }

    pub fn iter(&self) -> impl '_ + ExactSizeIterator<Item = &[T]> {
        self.offsets
            .windows(2)
            .map(move |window| &self.data[window[0]..window[1]])
    }

    /// Returns an iterator over all elements inside all arrays.
    pub fn iter_array_elements(&self) -> impl '_ + Iterator<Item = &T> {
        self.data.iter()
    }

    pub fn total_num_elements(&self) -> usize {
        self.data.len()
    }

    fn index_range(&self, index: usize) -> Option<Range<usize>> {
        let begin = *self.offsets.get(index)?;
        let end = *self.offsets.get(index + 1)?;
        Some(begin..end)
    }
}

impl<T: Clone> NestedVec<T> {
    pub fn push(&mut self, array: &[T]) {
        self.data.extend_from_slice(array);
        self.offsets.push(self.data.len());
    }
}

impl<'a, T: Clone> From<&'a [Vec<T>]> for NestedVec<T> {
    fn from(arrays: &'a [Vec<T>]) -> Self {
        let mut result = Self::new();
        for array in arrays {
            result.push(array);
        }
        result
    }
}

impl<'a, T: Clone> From<&'a Vec<Vec<T>>> for NestedVec<T> {
    fn from(arrays: &'a Vec<Vec<T>>) -> Self {
        Self::from(arrays.as_slice())
    }
}

impl<T: Clone> From<Vec<Vec<T>>> for NestedVec<T> {
    fn from(arrays: Vec<Vec<T>>) -> Self {
        Self::from(arrays.as_slice())
    }
}

impl<'a, T: Clone> From<&'a NestedVec<T>> for Vec<Vec<T>> {
    fn from(nested: &NestedVec<T>) -> Self {
        nested.iter().map(|array| array.to_vec()).collect()
    }
}
