//! Stress tests for the thread-safe box: no lost updates, no double
//! finalization, and a clean race between `upgrade` and the last release.

use rcbox::{Counting, Options, SyncBox, System};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;

const THREAD_COUNTS: [usize; 4] = [2, 4, 8, 16];
const ITERATIONS: usize = 1_000;

struct Tracked {
    value: usize,
    finalized: Arc<AtomicUsize>,
}

fn count_finalize(tracked: &mut Tracked) {
    tracked.finalized.fetch_add(1, Ordering::SeqCst);
}

fn tracked_box(value: usize, alloc: &Counting) -> (SyncBox<Tracked, &Counting>, Arc<AtomicUsize>) {
    let finalized = Arc::new(AtomicUsize::new(0));
    let handle = SyncBox::new_in(
        Tracked {
            value,
            finalized: Arc::clone(&finalized),
        },
        Options::new().destroy_hook(count_finalize),
        alloc,
    );
    (handle, finalized)
}

#[test]
fn test_no_lost_updates() {
    for threads in THREAD_COUNTS {
        let alloc = Counting::new(System);
        let (root, finalized) = tracked_box(threads, &alloc);

        thread::scope(|s| {
            for _ in 0..threads {
                let own = SyncBox::clone(&root);
                s.spawn(move || {
                    let mut held = Vec::new();
                    for i in 0..ITERATIONS {
                        held.push(SyncBox::clone(&own));
                        if i % 3 == 0 {
                            held.clear();
                        }
                        assert_eq!(own.value, threads);
                    }
                    // `own` and the rest of `held` are the unmatched handles.
                });
            }
        });

        assert_eq!(SyncBox::strong_count(&root), 1);
        assert_eq!(finalized.load(Ordering::SeqCst), 0);

        drop(root);
        assert_eq!(finalized.load(Ordering::SeqCst), 1);
        assert_eq!(alloc.stats().live_blocks(), 0);
    }
}

#[test]
fn test_concurrent_last_release_finalizes_once() {
    for threads in THREAD_COUNTS {
        for _ in 0..50 {
            let alloc = Counting::new(System);
            let (root, finalized) = tracked_box(0, &alloc);
            let barrier = Barrier::new(threads);

            thread::scope(|s| {
                for _ in 0..threads {
                    let own = SyncBox::clone(&root);
                    let barrier = &barrier;
                    s.spawn(move || {
                        barrier.wait();
                        drop(own);
                    });
                }
                drop(root);
            });

            assert_eq!(finalized.load(Ordering::SeqCst), 1);
            assert_eq!(alloc.stats().live_blocks(), 0);
        }
    }
}

#[test]
fn test_upgrade_races_last_release() {
    for threads in THREAD_COUNTS {
        for _ in 0..50 {
            let alloc = Counting::new(System);
            let (root, finalized) = tracked_box(7, &alloc);
            let weak = SyncBox::downgrade(&root);
            let barrier = Barrier::new(threads + 1);

            thread::scope(|s| {
                for _ in 0..threads {
                    let weak = weak.clone();
                    let barrier = &barrier;
                    let finalized = &finalized;
                    s.spawn(move || {
                        barrier.wait();
                        if let Some(strong) = weak.upgrade() {
                            // A successful upgrade always sees a live payload.
                            assert_eq!(finalized.load(Ordering::SeqCst), 0);
                            assert_eq!(strong.value, 7);
                        }
                    });
                }
                barrier.wait();
                drop(root);
            });

            assert_eq!(finalized.load(Ordering::SeqCst), 1);
            assert!(weak.upgrade().is_none());
            drop(weak);
            assert_eq!(alloc.stats().live_blocks(), 0);
        }
    }
}

#[test]
fn test_weak_churn_while_alive() {
    let alloc = Counting::new(System);
    let (root, finalized) = tracked_box(1, &alloc);

    thread::scope(|s| {
        for _ in 0..8 {
            s.spawn(|| {
                for _ in 0..ITERATIONS {
                    let weak = SyncBox::downgrade(&root);
                    let clone = weak.clone();
                    assert!(clone.upgrade().is_some());
                }
            });
        }
    });

    assert_eq!(SyncBox::weak_count(&root), 0);
    assert_eq!(SyncBox::strong_count(&root), 1);
    drop(root);
    assert_eq!(finalized.load(Ordering::SeqCst), 1);
    assert_eq!(alloc.stats().live_blocks(), 0);
}
