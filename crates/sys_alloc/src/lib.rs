//! Low-level allocator primitives.
//!
//! This crate defines the [`Allocator`] boundary used by `rcbox` and the
//! [`System`] allocator backing it by default. The two adaptors,
//! [`Counting`] and [`Limited`], wrap any other allocator to account for
//! traffic or to inject allocation failures.

use std::alloc::Layout;
use std::fmt;
use std::ptr::NonNull;
use std::sync::Arc;

#[cfg(unix)]
mod unix;
#[cfg(unix)]
use unix as os;

#[cfg(windows)]
mod windows;
#[cfg(windows)]
use windows as os;

mod counting;
mod limited;

pub use counting::{AllocStats, Counting};
pub use limited::Limited;

/// The error returned when an allocator cannot satisfy a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AllocError {
    layout: Layout,
}

impl AllocError {
    /// Creates an error for the rejected `layout`.
    #[must_use]
    pub const fn new(layout: Layout) -> Self {
        Self { layout }
    }

    /// The layout that could not be allocated.
    #[must_use]
    pub const fn layout(&self) -> Layout {
        self.layout
    }
}

impl fmt::Display for AllocError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "memory allocation of {} bytes (align {}) failed",
            self.layout.size(),
            self.layout.align()
        )
    }
}

impl std::error::Error for AllocError {}

/// A source of fixed-size memory blocks.
///
/// # Safety
///
/// Implementations must return blocks that are valid for reads and writes
/// of `layout.size()` bytes and aligned to `layout.align()`, and must stay
/// valid until passed back to [`Allocator::deallocate`] on the same
/// allocator (or a copy of it).
pub unsafe trait Allocator {
    /// Allocates a block described by `layout`.
    ///
    /// # Errors
    ///
    /// Returns [`AllocError`] if the block cannot be provided. Zero-sized
    /// layouts are always rejected.
    fn allocate(&self, layout: Layout) -> Result<NonNull<u8>, AllocError>;

    /// Returns a block to the allocator.
    ///
    /// # Safety
    ///
    /// `ptr` must have been returned by `allocate` on this allocator with
    /// the same `layout`, and must not be used afterwards.
    unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout);
}

unsafe impl<A: Allocator + ?Sized> Allocator for &A {
    #[inline]
    fn allocate(&self, layout: Layout) -> Result<NonNull<u8>, AllocError> {
        (**self).allocate(layout)
    }

    #[inline]
    unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout) {
        unsafe { (**self).deallocate(ptr, layout) }
    }
}

unsafe impl<A: Allocator + ?Sized> Allocator for Arc<A> {
    #[inline]
    fn allocate(&self, layout: Layout) -> Result<NonNull<u8>, AllocError> {
        (**self).allocate(layout)
    }

    #[inline]
    unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout) {
        unsafe { (**self).deallocate(ptr, layout) }
    }
}

/// The platform heap: `malloc`/`posix_memalign` on Unix, the process heap
/// on Windows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct System;

unsafe impl Allocator for System {
    fn allocate(&self, layout: Layout) -> Result<NonNull<u8>, AllocError> {
        if layout.size() == 0 {
            return Err(AllocError::new(layout));
        }
        // SAFETY: size is non-zero.
        let ptr = unsafe { os::alloc(layout) };
        NonNull::new(ptr).ok_or(AllocError::new(layout))
    }

    unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout) {
        // SAFETY: caller guarantees ptr came from `allocate` with `layout`.
        unsafe { os::dealloc(ptr.as_ptr(), layout) }
    }
}
