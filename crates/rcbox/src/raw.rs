//! The box allocation shared by [`StrongBox`](crate::StrongBox) and
//! [`SyncBox`](crate::SyncBox).
//!
//! Both flavors use the same block layout and the same
//! decrement/finalize/free sequence; they differ only in where the
//! [`Counts`] live. The single-threaded box keeps them in a `Cell`, the
//! thread-safe box behind a `parking_lot::Mutex` scoped to the box.

#![allow(clippy::redundant_pub_crate)]

use std::alloc::Layout;
use std::cell::Cell;
use std::marker::PhantomData;
use std::mem::{self, ManuallyDrop, MaybeUninit};
use std::ptr::{self, NonNull};

use parking_lot::Mutex;
use sys_alloc::{AllocError, Allocator};

use crate::counts::{Counts, Release, StrongRelease, WeakRelease};
use crate::options::Options;

/// Storage for a box's counters.
///
/// `with` must run `f` as one indivisible step with respect to every other
/// `with` call on the same cell.
pub(crate) trait CountCell {
    fn new(counts: Counts) -> Self;

    fn with<R>(&self, f: impl FnOnce(&mut Counts) -> R) -> R;
}

impl CountCell for Cell<Counts> {
    #[inline]
    fn new(counts: Counts) -> Self {
        Self::new(counts)
    }

    #[inline]
    fn with<R>(&self, f: impl FnOnce(&mut Counts) -> R) -> R {
        let mut counts = self.get();
        let result = f(&mut counts);
        self.set(counts);
        result
    }
}

impl CountCell for Mutex<Counts> {
    #[inline]
    fn new(counts: Counts) -> Self {
        Self::new(counts)
    }

    #[inline]
    fn with<R>(&self, f: impl FnOnce(&mut Counts) -> R) -> R {
        f(&mut self.lock())
    }
}

/// The heap block: counters, finalization options, the allocator that
/// produced the block, and the payload.
#[repr(C)]
pub(crate) struct BoxInner<T, A, C> {
    counts: C,
    options: Options<T>,
    alloc: ManuallyDrop<A>,
    /// Initialized while the box is `Alive`, dropped in place on finalize.
    value: MaybeUninit<T>,
}

/// An untyped-ownership pointer to a [`BoxInner`].
///
/// `RawBox` is `Copy`; the handle types decide which count a copy stands
/// for and call the matching release exactly once.
pub(crate) struct RawBox<T, A, C> {
    ptr: NonNull<BoxInner<T, A, C>>,
    _owns: PhantomData<BoxInner<T, A, C>>,
}

impl<T, A, C> Clone for RawBox<T, A, C> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T, A, C> Copy for RawBox<T, A, C> {}

impl<T, A: Allocator, C: CountCell> RawBox<T, A, C> {
    const LAYOUT: Layout = Layout::new::<BoxInner<T, A, C>>();

    /// Allocates a block and initializes everything except the value.
    fn allocate(counts: Counts, options: Options<T>, alloc: A) -> Result<Self, AllocError> {
        let block = match alloc.allocate(Self::LAYOUT) {
            Ok(block) => block,
            Err(err) => {
                crate::tracing::log_alloc_failed(err.layout());
                return Err(err);
            }
        };

        let ptr = block.cast::<BoxInner<T, A, C>>();
        let inner = ptr.as_ptr();
        // SAFETY: the block is fresh, sized and aligned for `BoxInner`.
        unsafe {
            ptr::addr_of_mut!((*inner).counts).write(C::new(counts));
            ptr::addr_of_mut!((*inner).options).write(options);
            ptr::addr_of_mut!((*inner).alloc).write(ManuallyDrop::new(alloc));
        }

        Ok(Self {
            ptr,
            _owns: PhantomData,
        })
    }

    /// Allocates a box holding `value`, owned by one strong reference.
    ///
    /// On failure nothing stays allocated and `value` is dropped.
    pub(crate) fn try_new(value: T, options: Options<T>, alloc: A) -> Result<Self, AllocError> {
        let raw = Self::allocate(Counts::new(), options, alloc)?;
        // SAFETY: the value slot is uninitialized and exclusively ours.
        unsafe { raw.value_ptr().write(value) };
        Ok(raw)
    }

    /// Allocates a box with no value, owned by one weak reference.
    ///
    /// The caller must either publish a value with
    /// [`finish_construction`](Self::finish_construction) or release the
    /// weak reference.
    pub(crate) fn try_new_uninit(options: Options<T>, alloc: A) -> Result<Self, AllocError> {
        Self::allocate(Counts::constructing(), options, alloc)
    }

    /// Writes the value into a box from [`try_new_uninit`](Self::try_new_uninit)
    /// and trades the constructor's weak reference for a strong one.
    ///
    /// # Safety
    ///
    /// The caller must own the constructor's weak reference and must not
    /// release it afterwards.
    pub(crate) unsafe fn finish_construction(self, value: T) {
        unsafe { self.value_ptr().write(value) };
        self.counts().with(Counts::finish_construction);
    }

    #[inline]
    fn counts(&self) -> &C {
        // SAFETY: the block is allocated for as long as any handle exists,
        // and only the counts field is borrowed.
        unsafe { &*ptr::addr_of!((*self.ptr.as_ptr()).counts) }
    }

    /// Current counters.
    pub(crate) fn snapshot(self) -> Counts {
        self.counts().with(|counts| *counts)
    }

    #[inline]
    pub(crate) fn value_ptr(self) -> *mut T {
        // SAFETY: projection only, no read.
        unsafe { ptr::addr_of_mut!((*self.ptr.as_ptr()).value).cast::<T>() }
    }

    /// # Safety
    ///
    /// The caller must hold a strong reference for the whole of `'a`.
    #[inline]
    pub(crate) unsafe fn value<'a>(self) -> &'a T {
        unsafe { &*self.value_ptr() }
    }

    /// # Safety
    ///
    /// The caller must hold a reference (strong or weak) for the whole of `'a`.
    #[inline]
    pub(crate) unsafe fn allocator<'a>(self) -> &'a A {
        unsafe { &*ptr::addr_of!((*self.ptr.as_ptr()).alloc).cast::<A>() }
    }

    #[inline]
    pub(crate) fn addr(self) -> usize {
        self.ptr.as_ptr() as usize
    }

    #[inline]
    pub(crate) fn ptr_eq(self, other: Self) -> bool {
        self.ptr == other.ptr
    }

    pub(crate) fn inc_strong(self) {
        self.counts().with(Counts::inc_strong);
    }

    pub(crate) fn inc_weak(self) {
        self.counts().with(Counts::inc_weak);
    }

    /// Takes a strong reference if the payload is still alive.
    pub(crate) fn try_upgrade(self) -> bool {
        self.counts().with(Counts::try_upgrade)
    }

    /// Whether the caller's strong reference is the only reference of any kind.
    pub(crate) fn is_unique(self) -> bool {
        self.counts().with(|counts| counts.is_unique())
    }

    /// Gives up one strong reference, finalizing the payload and freeing the
    /// block as the counts dictate.
    ///
    /// The zero transition is decided inside the counter cell, so exactly one
    /// caller finalizes. Finalization itself runs outside the cell: a payload
    /// holding weak handles to its own box can drop them without
    /// re-entering a held lock, and those drops never free the block early
    /// because the counts stay in [`State::Finalizing`](crate::State::Finalizing)
    /// until [`Counts::finish_finalize`].
    ///
    /// # Safety
    ///
    /// The caller must own a strong reference and not use it afterwards.
    pub(crate) unsafe fn release_strong(self) -> Release {
        if self.counts().with(Counts::dec_strong) == StrongRelease::Retained {
            return Release::Retained;
        }

        // Leaves the finalizing state even if deinit or the hook panics.
        struct FinishOnUnwind<T, A: Allocator, C: CountCell>(RawBox<T, A, C>);

        impl<T, A: Allocator, C: CountCell> Drop for FinishOnUnwind<T, A, C> {
            fn drop(&mut self) {
                // SAFETY: the payload has been dropped by the finalizer.
                unsafe { self.0.finish_finalize() };
            }
        }

        let guard = FinishOnUnwind(self);
        unsafe { self.finalize() };
        mem::forget(guard);

        unsafe { self.finish_finalize() }
    }

    /// Ends finalization and frees the block if no weak handles remain.
    unsafe fn finish_finalize(self) -> Release {
        match self.counts().with(Counts::finish_finalize) {
            WeakRelease::Retained => Release::Finalized,
            WeakRelease::Free => {
                unsafe { self.free() };
                Release::Freed
            }
        }
    }

    /// Gives up one weak reference, freeing the block if it was the last
    /// reference of any kind.
    ///
    /// # Safety
    ///
    /// The caller must own a weak reference and not use it afterwards.
    pub(crate) unsafe fn release_weak(self) -> Release {
        match self.counts().with(Counts::dec_weak) {
            WeakRelease::Retained => Release::Retained,
            WeakRelease::Free => {
                unsafe { self.free() };
                Release::Freed
            }
        }
    }

    /// Runs auto-deinit, the destroy hook, then the payload's `Drop`.
    ///
    /// The payload is dropped even if deinit or the hook panics.
    unsafe fn finalize(self) {
        struct DropValue<T>(*mut T);

        impl<T> Drop for DropValue<T> {
            fn drop(&mut self) {
                // SAFETY: the value is initialized and no handle reads it
                // once the strong count is zero.
                unsafe { ptr::drop_in_place(self.0) };
            }
        }

        let _span = crate::tracing::enter_finalize(std::any::type_name::<T>(), self.addr());

        let value = self.value_ptr();
        let guard = DropValue(value);
        // SAFETY: options are immutable after construction.
        let options = unsafe { ptr::addr_of!((*self.ptr.as_ptr()).options).read() };
        options.run(unsafe { &mut *value });
        drop(guard);
    }

    /// Returns the block to the allocator it came from.
    unsafe fn free(self) {
        crate::tracing::log_freed(std::any::type_name::<T>(), self.addr());

        let inner = self.ptr.as_ptr();
        unsafe {
            let alloc = ManuallyDrop::take(&mut *ptr::addr_of_mut!((*inner).alloc));
            ptr::drop_in_place(ptr::addr_of_mut!((*inner).counts));
            alloc.deallocate(self.ptr.cast::<u8>(), Self::LAYOUT);
        }
    }
}
