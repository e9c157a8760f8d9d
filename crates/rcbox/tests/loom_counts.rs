//! Loom model of the strong/weak count protocol used by `SyncBox`.
//!
//! The model mirrors the lock discipline: count transitions happen under
//! the mutex, finalization runs outside it, and the block is freed exactly
//! once by whoever observes both counts at zero with no finalizer running.

use loom::sync::atomic::{AtomicUsize, Ordering};
use loom::sync::{Arc, Mutex};

#[derive(Default)]
struct Model {
    strong: usize,
    weak: usize,
    finalizing: bool,
}

struct Block {
    counts: Mutex<Model>,
    finalized: AtomicUsize,
    freed: AtomicUsize,
}

impl Block {
    fn new(strong: usize, weak: usize) -> Self {
        Self {
            counts: Mutex::new(Model {
                strong,
                weak,
                finalizing: false,
            }),
            finalized: AtomicUsize::new(0),
            freed: AtomicUsize::new(0),
        }
    }

    fn release_strong(&self) {
        let finalize = {
            let mut counts = self.counts.lock().unwrap();
            counts.strong -= 1;
            counts.finalizing = counts.strong == 0;
            counts.finalizing
        };
        if !finalize {
            return;
        }

        self.finalized.fetch_add(1, Ordering::SeqCst);

        let free = {
            let mut counts = self.counts.lock().unwrap();
            counts.finalizing = false;
            counts.weak == 0
        };
        if free {
            self.freed.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn release_weak(&self) {
        let free = {
            let mut counts = self.counts.lock().unwrap();
            counts.weak -= 1;
            counts.weak == 0 && counts.strong == 0 && !counts.finalizing
        };
        if free {
            self.freed.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn try_upgrade(&self) -> bool {
        let mut counts = self.counts.lock().unwrap();
        if counts.strong == 0 {
            return false;
        }
        counts.strong += 1;
        true
    }
}

/// Two strong handles released concurrently finalize and free once.
#[test]
#[ignore = "loom test - run with cargo test loom_counts --release"]
fn test_concurrent_strong_release() {
    loom::model(|| {
        let block = Arc::new(Block::new(2, 0));

        let other = loom::thread::spawn({
            let block = Arc::clone(&block);
            move || block.release_strong()
        });
        block.release_strong();
        other.join().unwrap();

        assert_eq!(block.finalized.load(Ordering::SeqCst), 1);
        assert_eq!(block.freed.load(Ordering::SeqCst), 1);
    });
}

/// A weak release racing the finalizer never frees before finalization
/// has finished, and the block is still freed exactly once.
#[test]
#[ignore = "loom test - run with cargo test loom_counts --release"]
fn test_weak_release_during_finalize() {
    loom::model(|| {
        let block = Arc::new(Block::new(1, 1));

        let weak = loom::thread::spawn({
            let block = Arc::clone(&block);
            move || block.release_weak()
        });
        block.release_strong();
        weak.join().unwrap();

        assert_eq!(block.finalized.load(Ordering::SeqCst), 1);
        assert_eq!(block.freed.load(Ordering::SeqCst), 1);
    });
}

/// An upgrade racing the last strong release either wins before the zero
/// transition or fails; it never resurrects a finalized payload.
#[test]
#[ignore = "loom test - run with cargo test loom_counts --release"]
fn test_upgrade_races_last_release() {
    loom::model(|| {
        let block = Arc::new(Block::new(1, 1));

        let upgrader = loom::thread::spawn({
            let block = Arc::clone(&block);
            move || {
                if block.try_upgrade() {
                    assert_eq!(block.finalized.load(Ordering::SeqCst), 0);
                    block.release_strong();
                }
                block.release_weak();
            }
        });
        block.release_strong();
        upgrader.join().unwrap();

        assert_eq!(block.finalized.load(Ordering::SeqCst), 1);
        assert_eq!(block.freed.load(Ordering::SeqCst), 1);
    });
}
