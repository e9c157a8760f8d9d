//! Allocation failure is the one recoverable error.

use rcbox::{AllocError, Counting, Limited, Options, StrongBox, SyncBox, System};
use std::alloc::Layout;
use std::cell::Cell;
use std::rc::Rc;

struct DropFlag(Rc<Cell<u32>>);

impl Drop for DropFlag {
    fn drop(&mut self) {
        self.0.set(self.0.get() + 1);
    }
}

fn never_called(flag: &mut DropFlag) {
    flag.0.set(1000);
}

#[test]
fn test_try_new_in_reports_failure() {
    let alloc = Limited::new(System, 0);
    let err: AllocError = StrongBox::try_new_in(7_u64, Options::new(), &alloc).unwrap_err();

    assert!(err.layout().size() >= std::mem::size_of::<u64>());
    assert!(err.to_string().contains("memory allocation of"));
}

#[test]
fn test_failed_value_dropped_without_hooks() {
    let alloc = Limited::new(System, 0);
    let drops = Rc::new(Cell::new(0));

    let result = StrongBox::try_new_in(
        DropFlag(Rc::clone(&drops)),
        Options::new().destroy_hook(never_called),
        &alloc,
    );

    assert!(result.is_err());
    assert_eq!(drops.get(), 1);
}

#[test]
fn test_budget_of_one() {
    let alloc = Counting::new(Limited::new(System, 1));

    let first = StrongBox::try_new_in(1, Options::new(), &alloc);
    let second = StrongBox::try_new_in(2, Options::new(), &alloc);
    assert!(first.is_ok());
    assert!(second.is_err());

    let stats = alloc.stats();
    assert_eq!(stats.allocations, 1);
    assert_eq!(stats.failures, 1);

    drop(first);
    assert_eq!(alloc.stats().live_blocks(), 0);
}

#[test]
fn test_budget_refilled() {
    let alloc = Limited::new(System, 0);
    assert!(SyncBox::try_new_in("a", Options::new(), &alloc).is_err());

    alloc.set_remaining(1);
    let boxed = SyncBox::try_new_in("a", Options::new(), &alloc).unwrap();
    assert_eq!(*boxed, "a");
    assert_eq!(alloc.remaining(), 0);
}

#[test]
fn test_sync_failure_leaves_nothing_allocated() {
    let alloc = Counting::new(Limited::new(System, 0));
    assert!(SyncBox::try_new_in(vec![0_u8; 16], Options::new(), &alloc).is_err());

    let stats = alloc.stats();
    assert_eq!(stats.allocations, 0);
    assert_eq!(stats.failures, 1);
    assert_eq!(stats.live_bytes, 0);
}

#[test]
fn test_alloc_error_display() {
    let err = AllocError::new(Layout::from_size_align(64, 8).unwrap());
    assert_eq!(err.to_string(), "memory allocation of 64 bytes (align 8) failed");
}

#[test]
fn test_default_system_try_new_succeeds() {
    let boxed = StrongBox::try_new(String::from("ok")).unwrap();
    assert_eq!(boxed.as_str(), "ok");
    let boxed = SyncBox::try_new(3).unwrap();
    assert_eq!(*boxed, 3);
}
