//! An allocator adaptor that fails after a fixed number of allocations.

use std::alloc::Layout;
use std::ptr::NonNull;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::{AllocError, Allocator, System};

/// Wraps an allocator and refuses requests once a budget of successful
/// allocations is spent.
///
/// Deallocations are always forwarded and do not refill the budget.
#[derive(Debug)]
pub struct Limited<A = System> {
    inner: A,
    remaining: AtomicUsize,
}

impl<A> Limited<A> {
    /// Wraps `inner`, allowing `budget` more successful allocations.
    pub const fn new(inner: A, budget: usize) -> Self {
        Self {
            inner,
            remaining: AtomicUsize::new(budget),
        }
    }

    /// Allocations still permitted.
    pub fn remaining(&self) -> usize {
        self.remaining.load(Ordering::Acquire)
    }

    /// Resets the budget.
    pub fn set_remaining(&self, budget: usize) {
        self.remaining.store(budget, Ordering::Release);
    }
}

unsafe impl<A: Allocator> Allocator for Limited<A> {
    fn allocate(&self, layout: Layout) -> Result<NonNull<u8>, AllocError> {
        self.remaining
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1))
            .map_err(|_| AllocError::new(layout))?;
        self.inner.allocate(layout)
    }

    unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout) {
        unsafe { self.inner.deallocate(ptr, layout) }
    }
}
