//! Integration tests for the `tracing` feature.
//!
//! A `tracing-subscriber` fmt layer writes into a shared buffer so the
//! lifecycle events can be checked by name.

#![cfg(feature = "tracing")]

use rcbox::{Limited, Options, StrongBox, SyncBox, System};
use std::io;
use std::sync::{Arc, Mutex};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::util::SubscriberInitExt;

#[derive(Clone, Default)]
struct Capture(Arc<Mutex<Vec<u8>>>);

impl Capture {
    fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl io::Write for Capture {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

fn with_capture(f: impl FnOnce(&Capture)) {
    let capture = Capture::default();
    let writer = capture.clone();
    let _guard = tracing_subscriber::fmt()
        .with_ansi(false)
        .with_max_level(LevelFilter::TRACE)
        .with_writer(move || writer.clone())
        .finish()
        .set_default();
    f(&capture);
}

#[test]
fn test_release_emits_finalize_and_freed() {
    with_capture(|capture| {
        let boxed = StrongBox::new(String::from("traced"));
        drop(boxed);

        let out = capture.contents();
        assert!(out.contains("box_finalize"), "{out}");
        assert!(out.contains("box_freed"), "{out}");
    });
}

#[test]
fn test_zombie_frees_on_last_weak() {
    with_capture(|capture| {
        let boxed = SyncBox::new(1_u32);
        let weak = SyncBox::downgrade(&boxed);
        drop(boxed);
        assert!(capture.contents().contains("box_finalize"));
        assert!(!capture.contents().contains("box_freed"));

        drop(weak);
        assert!(capture.contents().contains("box_freed"));
    });
}

#[test]
fn test_allocation_failure_is_logged() {
    with_capture(|capture| {
        let alloc = Limited::new(System, 0);
        assert!(StrongBox::try_new_in(0_u64, Options::new(), &alloc).is_err());

        assert!(capture.contents().contains("box_alloc_failed"));
    });
}
