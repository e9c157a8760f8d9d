//! Reference-counted boxes with weak handles, finalization hooks and
//! pluggable allocators.
//!
//! `rcbox` provides two flavors of the same ownership protocol:
//!
//! - [`StrongBox<T>`] / [`WeakHandle<T>`]: single-threaded, counters in `Cell`s.
//! - [`SyncBox<T>`] / [`WeakSyncHandle<T>`]: thread-safe, counters behind a
//!   per-box `parking_lot::Mutex`.
//!
//! A box starts with one strong handle. Cloning a strong handle adds a
//! reference, dropping one removes it. When the strong count reaches zero
//! the payload is finalized exactly once; the allocation is returned to the
//! allocator it came from when the weak count is zero as well. Until then
//! the box stays behind as a *zombie* so weak handles can observe that the
//! value is gone instead of touching freed memory.
//!
//! # Quick Start
//!
//! ```
//! use rcbox::{StrongBox, WeakHandle};
//!
//! let strong = StrongBox::new(4);
//! let weak: WeakHandle<i32> = StrongBox::downgrade(&strong);
//!
//! assert_eq!(*weak.upgrade().unwrap(), 4);
//!
//! drop(strong);
//! assert!(weak.upgrade().is_none());
//! ```
//!
//! # Finalization
//!
//! [`Options`] attach a destroy hook and, for payloads implementing
//! [`Deinit`], an automatic call to `deinit`. Both run before the payload's
//! own `Drop`:
//!
//! ```
//! use rcbox::{Deinit, Options, StrongBox};
//!
//! #[derive(Deinit)]
//! struct Connection {
//!     socket: Socket,
//! }
//!
//! struct Socket {
//!     open: bool,
//! }
//!
//! impl Deinit for Socket {
//!     fn deinit(&mut self) {
//!         self.open = false;
//!     }
//! }
//!
//! fn report(conn: &mut Connection) {
//!     assert!(!conn.socket.open);
//! }
//!
//! let conn = StrongBox::with_options(
//!     Connection { socket: Socket { open: true } },
//!     Options::new().auto_deinit().destroy_hook(report),
//! );
//! drop(conn);
//! ```
//!
//! # Allocators
//!
//! Every box remembers the allocator it was created with and frees through
//! it. Any [`Allocator`] works, including a shared reference to one:
//!
//! ```
//! use rcbox::{Counting, Options, StrongBox, System};
//!
//! let alloc = Counting::new(System);
//! let a = StrongBox::new_in([0u8; 64], Options::new(), &alloc);
//! assert_eq!(alloc.stats().live_blocks(), 1);
//! drop(a);
//! assert_eq!(alloc.stats().live_blocks(), 0);
//! ```
//!
//! # Contract violations
//!
//! Counter underflow is a programmer error, asserted in debug builds. With
//! move-only strong handles it cannot be reached from safe code. Counter
//! overflow always panics.

#![warn(missing_docs)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

mod counts;
mod deinit;
mod fmt;
mod options;
mod raw;
mod rc;
mod sync;
mod tracing;

pub use counts::{Counts, Release, State};
pub use deinit::Deinit;
pub use options::Options;
pub use rc::{StrongBox, WeakHandle};
pub use sync::{SyncBox, WeakSyncHandle};

pub use sys_alloc::{AllocError, AllocStats, Allocator, Counting, Limited, System};

// Re-export derive macro when feature is enabled
#[cfg(feature = "derive")]
pub use rcbox_derive::Deinit;
