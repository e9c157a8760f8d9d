//! Tests for `WeakHandle`: observation, upgrade, and the zombie state.

use rcbox::{Counting, Options, Release, State, StrongBox, System, WeakHandle};
use std::cell::Cell;
use std::rc::Rc;

struct Payload {
    finalized: Rc<Cell<bool>>,
}

fn mark_finalized(payload: &mut Payload) {
    payload.finalized.set(true);
}

// ============================================================================
// Basic WeakHandle tests
// ============================================================================

#[test]
fn test_weak_basic() {
    let strong = StrongBox::new(42);
    let weak = StrongBox::downgrade(&strong);

    assert!(weak.is_alive());
    assert_eq!(weak.state(), State::Alive);

    let upgraded = weak.upgrade();
    assert!(upgraded.is_some());
    assert_eq!(*upgraded.unwrap(), 42);
}

#[test]
fn test_weak_counts() {
    let strong = StrongBox::new(123);
    assert_eq!(StrongBox::weak_count(&strong), 0);

    let weak1 = StrongBox::downgrade(&strong);
    assert_eq!(StrongBox::weak_count(&strong), 1);

    let weak2 = StrongBox::downgrade(&strong);
    let weak3 = weak1.clone();
    assert_eq!(StrongBox::weak_count(&strong), 3);

    drop(weak2);
    assert_eq!(StrongBox::weak_count(&strong), 2);

    assert_eq!(weak1.weak_count(), 2);
    assert_eq!(weak3.weak_count(), 2);
    assert_eq!(weak1.strong_count(), 1);
}

#[test]
fn test_upgrade_touches_only_strong_count() {
    let strong = StrongBox::new("value");
    let weak = StrongBox::downgrade(&strong);

    let upgraded = weak.upgrade().unwrap();
    assert_eq!(StrongBox::strong_count(&strong), 2);
    assert_eq!(StrongBox::weak_count(&strong), 1);
    assert!(StrongBox::ptr_eq(&strong, &upgraded));

    drop(upgraded);
    assert_eq!(StrongBox::strong_count(&strong), 1);
}

#[test]
fn test_weak_ptr_eq() {
    let a = StrongBox::new(1);
    let b = StrongBox::new(1);

    let weak_a1 = StrongBox::downgrade(&a);
    let weak_a2 = StrongBox::downgrade(&a);
    let weak_b = StrongBox::downgrade(&b);

    assert!(WeakHandle::ptr_eq(&weak_a1, &weak_a2));
    assert!(!WeakHandle::ptr_eq(&weak_a1, &weak_b));
}

#[test]
fn test_weak_debug() {
    let strong = StrongBox::new(0);
    let weak = StrongBox::downgrade(&strong);
    assert_eq!(format!("{weak:?}"), "(WeakHandle)");
}

// ============================================================================
// Zombie state
// ============================================================================

#[test]
fn test_weak_outlives_strong() {
    let alloc = Counting::new(System);
    let finalized = Rc::new(Cell::new(false));

    let strong = StrongBox::new_in(
        Payload {
            finalized: Rc::clone(&finalized),
        },
        Options::new().destroy_hook(mark_finalized),
        &alloc,
    );
    let weak = StrongBox::downgrade(&strong);
    assert_eq!(weak.weak_count(), 1);

    // The payload goes, the box stays for the weak handle.
    assert_eq!(StrongBox::release(strong), Release::Finalized);
    assert!(finalized.get());
    assert_eq!(alloc.stats().live_blocks(), 1);
    assert_eq!(weak.state(), State::Zombie);

    assert!(weak.upgrade().is_none());
    assert!(!weak.is_alive());
    assert_eq!(weak.strong_count(), 0);

    assert_eq!(WeakHandle::release(weak), Release::Freed);
    assert_eq!(alloc.stats().live_blocks(), 0);
}

#[test]
fn test_upgrade_fails_indefinitely_after_zero() {
    let strong = StrongBox::new(String::from("gone"));
    let weak = StrongBox::downgrade(&strong);
    drop(strong);

    for _ in 0..100 {
        assert!(weak.upgrade().is_none());
    }
    assert_eq!(weak.strong_count(), 0);
}

#[test]
fn test_clone_weak_in_zombie_state() {
    let alloc = Counting::new(System);
    let strong = StrongBox::new_in(5u64, Options::new(), &alloc);
    let weak = StrongBox::downgrade(&strong);
    drop(strong);

    let clone = weak.clone();
    assert_eq!(clone.weak_count(), 2);
    assert!(clone.upgrade().is_none());

    assert_eq!(WeakHandle::release(weak), Release::Retained);
    assert_eq!(alloc.stats().live_blocks(), 1);
    assert_eq!(WeakHandle::release(clone), Release::Freed);
    assert_eq!(alloc.stats().live_blocks(), 0);
}

#[test]
fn test_weak_release_while_alive_is_a_decrement() {
    let strong = StrongBox::new(9);
    let weak = StrongBox::downgrade(&strong);

    assert_eq!(WeakHandle::release(weak), Release::Retained);
    assert_eq!(StrongBox::weak_count(&strong), 0);
    assert_eq!(*strong, 9);
}

#[test]
fn test_weak_does_not_keep_payload() {
    let finalized = Rc::new(Cell::new(false));
    let strong = StrongBox::with_options(
        Payload {
            finalized: Rc::clone(&finalized),
        },
        Options::new().destroy_hook(mark_finalized),
    );
    let weaks: Vec<_> = (0..3).map(|_| StrongBox::downgrade(&strong)).collect();

    drop(strong);
    assert!(finalized.get());
    assert!(weaks.iter().all(|w| w.upgrade().is_none()));
}

#[test]
fn test_upgraded_handle_keeps_payload() {
    let finalized = Rc::new(Cell::new(false));
    let strong = StrongBox::with_options(
        Payload {
            finalized: Rc::clone(&finalized),
        },
        Options::new().destroy_hook(mark_finalized),
    );
    let weak = StrongBox::downgrade(&strong);
    let upgraded = weak.upgrade().unwrap();

    drop(strong);
    assert!(!finalized.get());
    assert!(weak.is_alive());

    drop(upgraded);
    assert!(finalized.get());
    assert!(!weak.is_alive());
}
