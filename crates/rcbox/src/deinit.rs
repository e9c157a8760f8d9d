//! The intrinsic self-destructor capability.

/// A payload that knows how to tear itself down.
///
/// When a box is built with [`Options::auto_deinit`](crate::Options::auto_deinit),
/// `deinit` runs once, right before the destroy hook and the payload's own
/// `Drop`. Unlike `Drop` it may release resources that need more than the
/// value itself (an allocator handle it borrows, an external registry, and
/// so on) and it leaves the value in place for the steps that follow.
///
/// Use `#[derive(Deinit)]` to call `deinit` on every field in declaration
/// order.
pub trait Deinit {
    /// Releases the resources owned by `self`.
    fn deinit(&mut self);
}

impl<T: Deinit> Deinit for Option<T> {
    fn deinit(&mut self) {
        if let Some(value) = self {
            value.deinit();
        }
    }
}

impl<T: Deinit + ?Sized> Deinit for Box<T> {
    fn deinit(&mut self) {
        (**self).deinit();
    }
}

impl<T: Deinit> Deinit for Vec<T> {
    fn deinit(&mut self) {
        for item in self.iter_mut() {
            item.deinit();
        }
    }
}

impl<T: Deinit, const N: usize> Deinit for [T; N] {
    fn deinit(&mut self) {
        for item in self.iter_mut() {
            item.deinit();
        }
    }
}

impl Deinit for () {
    fn deinit(&mut self) {}
}
