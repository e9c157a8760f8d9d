//! An allocator adaptor that keeps traffic statistics.

use std::alloc::Layout;
use std::ptr::NonNull;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::{AllocError, Allocator, System};

/// A snapshot of the traffic seen by a [`Counting`] allocator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AllocStats {
    /// Successful calls to `allocate`.
    pub allocations: usize,
    /// Calls to `allocate` that returned an error.
    pub failures: usize,
    /// Calls to `deallocate`.
    pub deallocations: usize,
    /// Bytes currently handed out.
    pub live_bytes: usize,
}

impl AllocStats {
    /// Blocks handed out and not yet returned.
    #[must_use]
    pub const fn live_blocks(&self) -> usize {
        self.allocations - self.deallocations
    }
}

/// Wraps an allocator and counts every allocation and deallocation.
///
/// All counters are atomic, so a shared `&Counting<A>` can back boxes used
/// from several threads.
#[derive(Debug, Default)]
pub struct Counting<A = System> {
    inner: A,
    allocations: AtomicUsize,
    failures: AtomicUsize,
    deallocations: AtomicUsize,
    live_bytes: AtomicUsize,
}

impl<A> Counting<A> {
    /// Wraps `inner` with zeroed counters.
    pub const fn new(inner: A) -> Self {
        Self {
            inner,
            allocations: AtomicUsize::new(0),
            failures: AtomicUsize::new(0),
            deallocations: AtomicUsize::new(0),
            live_bytes: AtomicUsize::new(0),
        }
    }

    /// Returns the current counters.
    pub fn stats(&self) -> AllocStats {
        AllocStats {
            allocations: self.allocations.load(Ordering::Acquire),
            failures: self.failures.load(Ordering::Acquire),
            deallocations: self.deallocations.load(Ordering::Acquire),
            live_bytes: self.live_bytes.load(Ordering::Acquire),
        }
    }

    /// The wrapped allocator.
    pub const fn inner(&self) -> &A {
        &self.inner
    }
}

unsafe impl<A: Allocator> Allocator for Counting<A> {
    fn allocate(&self, layout: Layout) -> Result<NonNull<u8>, AllocError> {
        match self.inner.allocate(layout) {
            Ok(ptr) => {
                self.allocations.fetch_add(1, Ordering::AcqRel);
                self.live_bytes.fetch_add(layout.size(), Ordering::AcqRel);
                Ok(ptr)
            }
            Err(err) => {
                self.failures.fetch_add(1, Ordering::AcqRel);
                Err(err)
            }
        }
    }

    unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout) {
        self.deallocations.fetch_add(1, Ordering::AcqRel);
        self.live_bytes.fetch_sub(layout.size(), Ordering::AcqRel);
        unsafe { self.inner.deallocate(ptr, layout) }
    }
}
