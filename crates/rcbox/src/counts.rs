//! The strong/weak counter state machine shared by both box flavors.
//!
//! [`Counts`] is plain data. The single-threaded box keeps it in a `Cell`,
//! the thread-safe box behind a per-box `parking_lot::Mutex`; every
//! transition below runs inside that cell or lock, so each one is a single
//! indivisible step.

use std::fmt;

/// Largest count either counter may reach before `ref`/`weak` panics.
const MAX_COUNT: usize = isize::MAX as usize;

/// Lifecycle of a box as seen through its counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum State {
    /// `strong > 0`: the payload is readable.
    Alive,
    /// The last strong handle is gone and the payload is being finalized.
    Finalizing,
    /// `strong == 0`, `weak > 0`: payload destroyed, metadata kept for weak
    /// observers.
    Zombie,
    /// Both counts are zero. A valid handle never observes this.
    Freed,
}

/// What releasing a handle did to its box.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Release {
    /// Other handles keep the box (and, for strong releases, the payload) alive.
    Retained,
    /// The payload was finalized; weak handles keep the box allocated.
    Finalized,
    /// The box was returned to its allocator.
    Freed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum StrongRelease {
    Retained,
    Finalize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum WeakRelease {
    Retained,
    Free,
}

/// A snapshot of a box's counters.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Counts {
    strong: usize,
    weak: usize,
    finalizing: bool,
}

impl Counts {
    /// Counts of a freshly constructed box: one strong handle, no weak ones.
    pub(crate) const fn new() -> Self {
        Self {
            strong: 1,
            weak: 0,
            finalizing: false,
        }
    }

    /// Counts of a box whose value is still being built: only the
    /// constructor's weak handle exists.
    pub(crate) const fn constructing() -> Self {
        Self {
            strong: 0,
            weak: 1,
            finalizing: false,
        }
    }

    /// Number of live strong handles.
    #[must_use]
    pub const fn strong(&self) -> usize {
        self.strong
    }

    /// Number of live weak handles.
    #[must_use]
    pub const fn weak(&self) -> usize {
        self.weak
    }

    /// The lifecycle state these counts describe.
    #[must_use]
    pub const fn state(&self) -> State {
        if self.strong > 0 {
            State::Alive
        } else if self.finalizing {
            State::Finalizing
        } else if self.weak > 0 {
            State::Zombie
        } else {
            State::Freed
        }
    }

    /// `true` when the holder of the only strong handle may mutate the payload.
    #[must_use]
    pub const fn is_unique(&self) -> bool {
        self.strong == 1 && self.weak == 0
    }

    pub(crate) fn inc_strong(&mut self) {
        debug_assert!(self.strong > 0, "ref on a box whose payload is gone");
        assert!(self.strong < MAX_COUNT, "strong count overflow");
        self.strong += 1;
    }

    pub(crate) fn inc_weak(&mut self) {
        debug_assert!(self.state() != State::Freed, "weak ref on a freed box");
        assert!(self.weak < MAX_COUNT, "weak count overflow");
        self.weak += 1;
    }

    /// Takes a new strong reference if the payload is still alive.
    pub(crate) fn try_upgrade(&mut self) -> bool {
        if self.strong == 0 {
            return false;
        }
        self.inc_strong();
        true
    }

    /// Drops one strong reference. On the zero transition the box enters
    /// [`State::Finalizing`] and the caller must finalize the payload, then
    /// call [`Counts::finish_finalize`].
    pub(crate) fn dec_strong(&mut self) -> StrongRelease {
        debug_assert!(self.strong > 0, "deref on a box with no strong handles");
        self.strong -= 1;
        if self.strong == 0 {
            self.finalizing = true;
            StrongRelease::Finalize
        } else {
            StrongRelease::Retained
        }
    }

    /// Drops one weak reference. A box that is still finalizing is never
    /// freed here; the finalizing path frees it instead.
    pub(crate) fn dec_weak(&mut self) -> WeakRelease {
        debug_assert!(self.weak > 0, "weak deref on a box with no weak handles");
        self.weak -= 1;
        if self.weak == 0 && self.strong == 0 && !self.finalizing {
            WeakRelease::Free
        } else {
            WeakRelease::Retained
        }
    }

    pub(crate) fn finish_finalize(&mut self) -> WeakRelease {
        debug_assert!(self.finalizing && self.strong == 0);
        self.finalizing = false;
        if self.weak == 0 {
            WeakRelease::Free
        } else {
            WeakRelease::Retained
        }
    }

    /// Publishes a constructed value: the first strong handle appears and the
    /// constructor's weak handle goes away.
    pub(crate) fn finish_construction(&mut self) {
        debug_assert!(self.strong == 0 && self.weak > 0 && !self.finalizing);
        self.strong = 1;
        self.weak -= 1;
    }
}

impl fmt::Debug for Counts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Counts")
            .field("strong", &self.strong)
            .field("weak", &self.weak)
            .field("state", &self.state())
            .finish()
    }
}
