//! Thread-safe strong and weak handles.
//!
//! [`SyncBox<T>`] and [`WeakSyncHandle<T>`] follow the same protocol as
//! [`StrongBox`](crate::StrongBox) and [`WeakHandle`](crate::WeakHandle),
//! with the counters behind a `parking_lot::Mutex` owned by each box. Every
//! `ref`, `weak`, `upgrade` and release takes that lock, so all operations on
//! one box are totally ordered and boxes never contend with each other.
//!
//! The decision that the last strong handle is gone is made under the lock
//! together with the decrement. An `upgrade` racing with that release either
//! runs first and keeps the payload alive, or runs second and returns `None`.
//!
//! # Examples
//!
//! ```
//! use rcbox::SyncBox;
//!
//! let shared = SyncBox::new(vec![1, 2, 3]);
//!
//! let handles: Vec<_> = (0..4)
//!     .map(|_| {
//!         let local = SyncBox::clone(&shared);
//!         std::thread::spawn(move || local.iter().sum::<i32>())
//!     })
//!     .collect();
//!
//! for handle in handles {
//!     assert_eq!(handle.join().unwrap(), 6);
//! }
//! assert_eq!(SyncBox::strong_count(&shared), 1);
//! ```

use std::marker::PhantomData;
use std::mem::ManuallyDrop;
use std::ops::Deref;

use parking_lot::Mutex;
use sys_alloc::{AllocError, Allocator, System};

use crate::counts::{Counts, Release, State};
use crate::options::Options;
use crate::raw::RawBox;

type Raw<T, A> = RawBox<T, A, Mutex<Counts>>;

// ============================================================================
// SyncBox<T> - owning handle
// ============================================================================

/// A thread-safe reference-counted box.
///
/// `SyncBox<T>` is `Send + Sync` when `T` and the allocator are. The payload
/// is shared immutably; wrap it in a lock for mutation.
pub struct SyncBox<T, A: Allocator = System> {
    raw: Raw<T, A>,
    _marker: PhantomData<T>,
}

impl<T> SyncBox<T> {
    /// Allocates `value` on the system heap with default [`Options`].
    ///
    /// # Panics
    ///
    /// Aborts through [`std::alloc::handle_alloc_error`] if the allocation
    /// fails. Use [`SyncBox::try_new`] to handle the failure.
    pub fn new(value: T) -> Self {
        Self::new_in(value, Options::new(), System)
    }

    /// Allocates `value` on the system heap with `options`.
    pub fn with_options(value: T, options: Options<T>) -> Self {
        Self::new_in(value, options, System)
    }

    /// Fallible version of [`SyncBox::new`].
    ///
    /// # Errors
    ///
    /// Returns [`AllocError`] if the system heap cannot provide the block.
    pub fn try_new(value: T) -> Result<Self, AllocError> {
        Self::try_new_in(value, Options::new(), System)
    }

    /// Builds a value that holds a weak handle to its own box.
    ///
    /// See [`StrongBox::new_cyclic`](crate::StrongBox::new_cyclic).
    pub fn new_cyclic<F>(data_fn: F) -> Self
    where
        F: FnOnce(&WeakSyncHandle<T>) -> T,
    {
        match Self::try_new_cyclic_in(data_fn, Options::new(), System) {
            Ok(this) => this,
            Err(err) => std::alloc::handle_alloc_error(err.layout()),
        }
    }
}

impl<T, A: Allocator> SyncBox<T, A> {
    /// Allocates `value` from `alloc`.
    ///
    /// # Panics
    ///
    /// Aborts through [`std::alloc::handle_alloc_error`] if the allocation
    /// fails.
    pub fn new_in(value: T, options: Options<T>, alloc: A) -> Self {
        match Self::try_new_in(value, options, alloc) {
            Ok(this) => this,
            Err(err) => std::alloc::handle_alloc_error(err.layout()),
        }
    }

    /// Allocates `value` from `alloc`, reporting allocation failure.
    ///
    /// # Errors
    ///
    /// Returns [`AllocError`] if `alloc` refuses the request; `value` is
    /// dropped and nothing stays allocated.
    pub fn try_new_in(value: T, options: Options<T>, alloc: A) -> Result<Self, AllocError> {
        Ok(Self::from_raw_box(RawBox::try_new(value, options, alloc)?))
    }

    /// Fallible, allocator-aware version of [`SyncBox::new_cyclic`].
    ///
    /// # Errors
    ///
    /// Returns [`AllocError`] if `alloc` refuses the request; `data_fn` is
    /// not called in that case.
    pub fn try_new_cyclic_in<F>(data_fn: F, options: Options<T>, alloc: A) -> Result<Self, AllocError>
    where
        F: FnOnce(&WeakSyncHandle<T, A>) -> T,
    {
        let raw = RawBox::try_new_uninit(options, alloc)?;
        let weak = WeakSyncHandle {
            raw,
            _marker: PhantomData,
        };

        let value = data_fn(&weak);

        let weak = ManuallyDrop::new(weak);
        // SAFETY: we own the constructor's weak reference and forget it.
        unsafe { weak.raw.finish_construction(value) };
        Ok(Self::from_raw_box(raw))
    }

    const fn from_raw_box(raw: Raw<T, A>) -> Self {
        Self {
            raw,
            _marker: PhantomData,
        }
    }

    /// Creates a new [`WeakSyncHandle`] to this allocation.
    #[must_use]
    pub fn downgrade(this: &Self) -> WeakSyncHandle<T, A> {
        this.raw.inc_weak();
        WeakSyncHandle {
            raw: this.raw,
            _marker: PhantomData,
        }
    }

    /// Drops this handle and reports what happened to the box.
    #[allow(clippy::must_use_candidate)]
    pub fn release(this: Self) -> Release {
        let this = ManuallyDrop::new(this);
        // SAFETY: `this` is never used or dropped again.
        unsafe { this.raw.release_strong() }
    }

    /// Number of strong handles. Only a snapshot while other threads hold
    /// handles.
    #[must_use]
    pub fn strong_count(this: &Self) -> usize {
        this.raw.snapshot().strong()
    }

    /// Number of weak handles. Only a snapshot while other threads hold
    /// handles.
    #[must_use]
    pub fn weak_count(this: &Self) -> usize {
        this.raw.snapshot().weak()
    }

    /// Both counters, read under one lock acquisition.
    #[must_use]
    pub fn counts(this: &Self) -> Counts {
        this.raw.snapshot()
    }

    /// Returns `true` if both handles point to the same allocation.
    #[must_use]
    pub fn ptr_eq(this: &Self, other: &Self) -> bool {
        this.raw.ptr_eq(other.raw)
    }

    /// Raw pointer to the payload.
    #[must_use]
    pub fn as_ptr(this: &Self) -> *const T {
        this.raw.value_ptr()
    }

    /// The allocator this box was allocated from.
    #[must_use]
    pub fn allocator(this: &Self) -> &A {
        // SAFETY: `this` holds a strong reference.
        unsafe { this.raw.allocator() }
    }

    /// Mutable access to the payload when no other handle, strong or weak,
    /// exists on any thread.
    #[must_use]
    pub fn get_mut(this: &mut Self) -> Option<&mut T> {
        if this.raw.is_unique() {
            // SAFETY: we hold the only handle; no other thread can clone or
            // upgrade without one.
            Some(unsafe { &mut *this.raw.value_ptr() })
        } else {
            None
        }
    }

    /// A structural rendering that does not require `T: Debug`.
    #[must_use]
    pub fn describe(this: &Self) -> String {
        crate::fmt::describe::<T>("SyncBox", this.raw.snapshot(), this.raw.addr())
    }
}

impl<T, A: Allocator> Deref for SyncBox<T, A> {
    type Target = T;

    #[inline]
    fn deref(&self) -> &T {
        // SAFETY: `self` holds a strong reference.
        unsafe { self.raw.value() }
    }
}

impl<T, A: Allocator> Clone for SyncBox<T, A> {
    #[inline]
    fn clone(&self) -> Self {
        self.raw.inc_strong();
        Self::from_raw_box(self.raw)
    }
}

impl<T, A: Allocator> Drop for SyncBox<T, A> {
    fn drop(&mut self) {
        // SAFETY: the handle is being destroyed.
        unsafe {
            self.raw.release_strong();
        }
    }
}

crate::fmt::impl_value_traits!(SyncBox);

// ============================================================================
// WeakSyncHandle<T> - non-owning handle
// ============================================================================

/// A non-owning reference to a [`SyncBox`] allocation.
pub struct WeakSyncHandle<T, A: Allocator = System> {
    raw: Raw<T, A>,
    _marker: PhantomData<T>,
}

impl<T, A: Allocator> WeakSyncHandle<T, A> {
    /// Returns a new strong handle if the payload is still alive.
    ///
    /// Serialized with every release of the same box: once the last strong
    /// handle has been released, every later call returns `None`.
    #[must_use]
    pub fn upgrade(&self) -> Option<SyncBox<T, A>> {
        self.raw
            .try_upgrade()
            .then(|| SyncBox::from_raw_box(self.raw))
    }

    /// Whether the payload is alive at the moment of the call.
    ///
    /// Another thread may release the last strong handle right after this
    /// returns `true`; use [`upgrade`](Self::upgrade) to get a guarantee.
    #[must_use]
    pub fn is_alive(&self) -> bool {
        self.raw.snapshot().strong() > 0
    }

    /// Lifecycle state of the box at the moment of the call.
    #[must_use]
    pub fn state(&self) -> State {
        self.raw.snapshot().state()
    }

    /// Number of strong handles; zero once the payload is gone.
    #[must_use]
    pub fn strong_count(&self) -> usize {
        self.raw.snapshot().strong()
    }

    /// Number of weak handles, including this one.
    #[must_use]
    pub fn weak_count(&self) -> usize {
        self.raw.snapshot().weak()
    }

    /// Returns `true` if both handles point to the same allocation.
    #[must_use]
    pub fn ptr_eq(this: &Self, other: &Self) -> bool {
        this.raw.ptr_eq(other.raw)
    }

    /// Drops this handle and reports whether it freed the box.
    #[allow(clippy::must_use_candidate)]
    pub fn release(this: Self) -> Release {
        let this = ManuallyDrop::new(this);
        // SAFETY: `this` is never used or dropped again.
        unsafe { this.raw.release_weak() }
    }
}

impl<T, A: Allocator> Clone for WeakSyncHandle<T, A> {
    fn clone(&self) -> Self {
        self.raw.inc_weak();
        Self {
            raw: self.raw,
            _marker: PhantomData,
        }
    }
}

impl<T, A: Allocator> Drop for WeakSyncHandle<T, A> {
    fn drop(&mut self) {
        // SAFETY: the handle is being destroyed.
        unsafe {
            self.raw.release_weak();
        }
    }
}

impl<T, A: Allocator> std::fmt::Debug for WeakSyncHandle<T, A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "(WeakSyncHandle)")
    }
}

// ============================================================================
// Send + Sync trait implementations
// ============================================================================

// The last handle to go may finalize `T` and free through `A` on any thread.
#[allow(clippy::non_send_fields_in_send_ty)]
unsafe impl<T: Send + Sync, A: Allocator + Send + Sync> Send for SyncBox<T, A> {}
#[allow(clippy::non_send_fields_in_send_ty)]
unsafe impl<T: Send + Sync, A: Allocator + Send + Sync> Sync for SyncBox<T, A> {}
#[allow(clippy::non_send_fields_in_send_ty)]
unsafe impl<T: Send + Sync, A: Allocator + Send + Sync> Send for WeakSyncHandle<T, A> {}
#[allow(clippy::non_send_fields_in_send_ty)]
unsafe impl<T: Send + Sync, A: Allocator + Send + Sync> Sync for WeakSyncHandle<T, A> {}
