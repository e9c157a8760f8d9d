//! Box lifecycle tracing.
//!
//! When the `tracing` feature is enabled, this module emits structured
//! events for allocation failures, finalization and box release. Without
//! the feature every function here compiles to nothing.

use std::alloc::Layout;

#[cfg(feature = "tracing")]
mod internal {
    use std::alloc::Layout;

    use ::tracing::{span, Level};

    /// Span covering one finalization sequence.
    pub struct FinalizeSpan {
        _span: span::EnteredSpan,
    }

    pub fn enter_finalize(type_name: &'static str, addr: usize) -> FinalizeSpan {
        FinalizeSpan {
            _span: span!(Level::DEBUG, "finalize", type_name, addr).entered(),
        }
    }

    pub fn log_alloc_failed(layout: Layout) {
        ::tracing::debug!(
            size = layout.size(),
            align = layout.align(),
            "box_alloc_failed"
        );
    }

    pub fn log_finalize(type_name: &'static str, addr: usize) {
        ::tracing::trace!(type_name, addr, "box_finalize");
    }

    pub fn log_freed(type_name: &'static str, addr: usize) {
        ::tracing::trace!(type_name, addr, "box_freed");
    }
}

#[cfg(not(feature = "tracing"))]
mod internal {
    use std::alloc::Layout;

    /// Stub span when tracing is disabled.
    pub struct FinalizeSpan;

    #[inline(always)]
    pub const fn enter_finalize(_type_name: &'static str, _addr: usize) -> FinalizeSpan {
        FinalizeSpan
    }

    #[inline(always)]
    pub const fn log_alloc_failed(_layout: Layout) {}

    #[inline(always)]
    pub const fn log_finalize(_type_name: &'static str, _addr: usize) {}

    #[inline(always)]
    pub const fn log_freed(_type_name: &'static str, _addr: usize) {}
}

pub use internal::FinalizeSpan;

pub fn enter_finalize(type_name: &'static str, addr: usize) -> FinalizeSpan {
    internal::log_finalize(type_name, addr);
    internal::enter_finalize(type_name, addr)
}

pub fn log_alloc_failed(layout: Layout) {
    internal::log_alloc_failed(layout);
}

pub fn log_freed(type_name: &'static str, addr: usize) {
    internal::log_freed(type_name, addr);
}
