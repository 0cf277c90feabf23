use std::marker::PhantomData;

/// Unsynchronized shared access to the elements of a mutable slice.
///
/// The access is created from an exclusive borrow of the slice, so for the lifetime `'a` it is
/// the only way to reach the data. Soundness of concurrent use rests entirely on the caller
/// never handing out two live references to the same element when one of them is mutable.
#[derive(Debug)]
pub struct ParallelSliceAccess<'a, T> {
    ptr: *mut T,
    len: usize,
    marker: PhantomData<&'a mut [T]>,
}

impl<'a, T> ParallelSliceAccess<'a, T> {
    pub fn new(slice: &'a mut [T]) -> Self {
        Self {
            ptr: slice.as_mut_ptr(),
            len: slice.len(),
            marker: PhantomData,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// # Safety
    ///
    /// `index` must be in bounds, and no other thread may hold a mutable reference to the same
    /// element.
    pub unsafe fn get_unchecked(&self, index: usize) -> &'a T {
        debug_assert!(index < self.len);
        &*self.ptr.add(index)
    }

    /// # Safety
    ///
    /// `index` must be in bounds, and no other reference to the same element may be alive
    /// while the returned reference is in use.
    #[allow(clippy::mut_from_ref)]
    pub unsafe fn get_unchecked_mut(&self, index: usize) -> &'a mut T {
        debug_assert!(index < self.len);
        &mut *self.ptr.add(index)
    }
}

impl<'a, T> Clone for ParallelSliceAccess<'a, T> {
    fn clone(&self) -> Self {
        Self {
            ptr: self.ptr,
            len: self.len,
            marker: PhantomData,
        }
    }
}

impl<'a, T> Copy for ParallelSliceAccess<'a, T> {}

unsafe impl<'a, T: Send> Send for ParallelSliceAccess<'a, T> {}
unsafe impl<'a, T: Send + Sync> Sync for ParallelSliceAccess<'a, T> {}
