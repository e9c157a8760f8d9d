//! Single-threaded strong and weak handles.
//!
//! [`StrongBox<T>`] owns a share of a heap allocation holding one `T`;
//! [`WeakHandle<T>`] observes the same allocation without keeping the value
//! alive. Neither type is `Send` or `Sync`: the counters are plain `Cell`s.

use std::cell::Cell;
use std::marker::PhantomData;
use std::mem::ManuallyDrop;
use std::ops::Deref;

use sys_alloc::{AllocError, Allocator, System};

use crate::counts::{Counts, Release, State};
use crate::options::Options;
use crate::raw::RawBox;

type Raw<T, A> = RawBox<T, A, Cell<Counts>>;

// ============================================================================
// StrongBox<T> - owning handle
// ============================================================================

/// A single-threaded reference-counted box.
///
/// Cloning a `StrongBox` adds a strong reference to the same allocation;
/// dropping one removes it. When the last strong reference goes away the
/// payload is finalized (see [`Options`]), and the allocation itself is
/// returned to its allocator once no [`WeakHandle`] remains either.
///
/// Strong handles form no cycle detection: a cycle of `StrongBox`es leaks.
/// Break cycles with [`WeakHandle`].
///
/// # Examples
///
/// ```
/// use rcbox::StrongBox;
///
/// let a = StrongBox::new(4);
/// let b = StrongBox::clone(&a);
/// assert_eq!(StrongBox::strong_count(&a), 2);
/// assert!(StrongBox::ptr_eq(&a, &b));
///
/// drop(b);
/// assert_eq!(StrongBox::strong_count(&a), 1);
/// ```
pub struct StrongBox<T, A: Allocator = System> {
    raw: Raw<T, A>,
    /// `!Send + !Sync`.
    _marker: PhantomData<*const ()>,
}

impl<T> StrongBox<T> {
    /// Allocates `value` on the system heap with default [`Options`].
    ///
    /// # Panics
    ///
    /// Aborts through [`std::alloc::handle_alloc_error`] if the allocation
    /// fails. Use [`StrongBox::try_new`] to handle the failure.
    pub fn new(value: T) -> Self {
        Self::new_in(value, Options::new(), System)
    }

    /// Allocates `value` on the system heap with `options`.
    pub fn with_options(value: T, options: Options<T>) -> Self {
        Self::new_in(value, options, System)
    }

    /// Fallible version of [`StrongBox::new`].
    ///
    /// # Errors
    ///
    /// Returns [`AllocError`] if the system heap cannot provide the block.
    pub fn try_new(value: T) -> Result<Self, AllocError> {
        Self::try_new_in(value, Options::new(), System)
    }

    /// Builds a value that holds a weak handle to its own box.
    ///
    /// `data_fn` receives a [`WeakHandle`] that cannot be upgraded until
    /// `new_cyclic` returns. Clone it into the value to keep a
    /// back-reference.
    ///
    /// # Examples
    ///
    /// ```
    /// use rcbox::{StrongBox, WeakHandle};
    ///
    /// struct Node {
    ///     this: WeakHandle<Node>,
    ///     id: u32,
    /// }
    ///
    /// let node = StrongBox::new_cyclic(|this| Node { this: this.clone(), id: 7 });
    /// let again = node.this.upgrade().unwrap();
    /// assert_eq!(again.id, 7);
    /// ```
    pub fn new_cyclic<F>(data_fn: F) -> Self
    where
        F: FnOnce(&WeakHandle<T>) -> T,
    {
        match Self::try_new_cyclic_in(data_fn, Options::new(), System) {
            Ok(this) => this,
            Err(err) => std::alloc::handle_alloc_error(err.layout()),
        }
    }
}

impl<T, A: Allocator> StrongBox<T, A> {
    /// Allocates `value` from `alloc`.
    ///
    /// The allocator is stored in the box and used again to free it.
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
    /// Returns [`AllocError`] if `alloc` refuses the request. Nothing is
    /// left allocated and `value` is dropped without running any
    /// finalization step from `options`.
    pub fn try_new_in(value: T, options: Options<T>, alloc: A) -> Result<Self, AllocError> {
        Ok(Self::from_raw_box(RawBox::try_new(value, options, alloc)?))
    }

    /// Fallible, allocator-aware version of [`StrongBox::new_cyclic`].
    ///
    /// If `data_fn` panics the box is released once the last clone of the
    /// weak handle is gone; no finalization step runs.
    ///
    /// # Errors
    ///
    /// Returns [`AllocError`] if `alloc` refuses the request; `data_fn` is
    /// not called in that case.
    pub fn try_new_cyclic_in<F>(data_fn: F, options: Options<T>, alloc: A) -> Result<Self, AllocError>
    where
        F: FnOnce(&WeakHandle<T, A>) -> T,
    {
        let raw = RawBox::try_new_uninit(options, alloc)?;
        let weak = WeakHandle {
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

    /// Creates a new [`WeakHandle`] to this allocation.
    #[must_use]
    pub fn downgrade(this: &Self) -> WeakHandle<T, A> {
        this.raw.inc_weak();
        WeakHandle {
            raw: this.raw,
            _marker: PhantomData,
        }
    }

    /// Drops this handle and reports what happened to the box.
    ///
    /// This is the same as `drop(this)` with the outcome made visible.
    ///
    /// # Examples
    ///
    /// ```
    /// use rcbox::{Release, StrongBox};
    ///
    /// let a = StrongBox::new(String::from("payload"));
    /// let b = StrongBox::clone(&a);
    /// let weak = StrongBox::downgrade(&a);
    ///
    /// assert_eq!(StrongBox::release(b), Release::Retained);
    /// assert_eq!(StrongBox::release(a), Release::Finalized);
    /// assert!(weak.upgrade().is_none());
    /// ```
    #[allow(clippy::must_use_candidate)]
    pub fn release(this: Self) -> Release {
        let this = ManuallyDrop::new(this);
        // SAFETY: `this` is never used or dropped again.
        unsafe { this.raw.release_strong() }
    }

    /// Number of strong handles to this allocation.
    #[must_use]
    pub fn strong_count(this: &Self) -> usize {
        this.raw.snapshot().strong()
    }

    /// Number of weak handles to this allocation.
    #[must_use]
    pub fn weak_count(this: &Self) -> usize {
        this.raw.snapshot().weak()
    }

    /// Both counters at once.
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
    /// exists.
    ///
    /// # Examples
    ///
    /// ```
    /// use rcbox::StrongBox;
    ///
    /// let mut a = StrongBox::new(1);
    /// *StrongBox::get_mut(&mut a).unwrap() += 1;
    ///
    /// let b = StrongBox::clone(&a);
    /// assert!(StrongBox::get_mut(&mut a).is_none());
    /// drop(b);
    /// assert_eq!(*a, 2);
    /// ```
    #[must_use]
    pub fn get_mut(this: &mut Self) -> Option<&mut T> {
        if this.raw.is_unique() {
            // SAFETY: unique strong handle, no weak handle could upgrade.
            Some(unsafe { &mut *this.raw.value_ptr() })
        } else {
            None
        }
    }

    /// A structural rendering that does not require `T: Debug`:
    /// type label, counts, payload size and address.
    #[must_use]
    pub fn describe(this: &Self) -> String {
        crate::fmt::describe::<T>("StrongBox", this.raw.snapshot(), this.raw.addr())
    }
}

impl<T, A: Allocator> Deref for StrongBox<T, A> {
    type Target = T;

    #[inline]
    fn deref(&self) -> &T {
        // SAFETY: `self` holds a strong reference.
        unsafe { self.raw.value() }
    }
}

impl<T, A: Allocator> Clone for StrongBox<T, A> {
    #[inline]
    fn clone(&self) -> Self {
        self.raw.inc_strong();
        Self::from_raw_box(self.raw)
    }
}

impl<T, A: Allocator> Drop for StrongBox<T, A> {
    fn drop(&mut self) {
        // SAFETY: the handle is being destroyed.
        unsafe {
            self.raw.release_strong();
        }
    }
}

crate::fmt::impl_value_traits!(StrongBox);

// ============================================================================
// WeakHandle<T> - non-owning handle
// ============================================================================

/// A non-owning reference to a [`StrongBox`] allocation.
///
/// A `WeakHandle` keeps the box metadata allocated but not the payload.
/// Call [`upgrade`](WeakHandle::upgrade) to get a [`StrongBox`] while the
/// payload is still alive.
pub struct WeakHandle<T, A: Allocator = System> {
    raw: Raw<T, A>,
    _marker: PhantomData<*const ()>,
}

impl<T, A: Allocator> WeakHandle<T, A> {
    /// Returns a new strong handle if the payload is still alive.
    ///
    /// `None` is the normal outcome once the last strong handle is gone.
    #[must_use]
    pub fn upgrade(&self) -> Option<StrongBox<T, A>> {
        self.raw
            .try_upgrade()
            .then(|| StrongBox::from_raw_box(self.raw))
    }

    /// Whether the payload is still alive.
    #[must_use]
    pub fn is_alive(&self) -> bool {
        self.raw.snapshot().strong() > 0
    }

    /// Lifecycle state of the box.
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

impl<T, A: Allocator> Clone for WeakHandle<T, A> {
    fn clone(&self) -> Self {
        self.raw.inc_weak();
        Self {
            raw: self.raw,
            _marker: PhantomData,
        }
    }
}

impl<T, A: Allocator> Drop for WeakHandle<T, A> {
    fn drop(&mut self) {
        // SAFETY: the handle is being destroyed.
        unsafe {
            self.raw.release_weak();
        }
    }
}

impl<T, A: Allocator> std::fmt::Debug for WeakHandle<T, A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "(WeakHandle)")
    }
}
