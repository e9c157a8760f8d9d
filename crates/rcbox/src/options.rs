//! Per-box construction options.

use std::fmt;

use crate::deinit::Deinit;

/// Finalization settings fixed when a box is constructed.
///
/// When the last strong handle is released the steps run in this order:
/// the payload's [`Deinit`] (if [`auto_deinit`](Options::auto_deinit) was
/// requested), then the destroy hook, then the payload's `Drop`.
///
/// # Examples
///
/// ```
/// use rcbox::{Options, StrongBox};
///
/// fn close(fd: &mut i32) {
///     *fd = -1;
/// }
///
/// let handle = StrongBox::with_options(3, Options::new().destroy_hook(close));
/// assert_eq!(*handle, 3);
/// ```
pub struct Options<T> {
    deinit: Option<fn(&mut T)>,
    hook: Option<fn(&mut T)>,
}

impl<T> Options<T> {
    /// Options with no finalization beyond `Drop`.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            deinit: None,
            hook: None,
        }
    }

    /// Runs `hook` on the payload when the last strong handle goes away.
    #[must_use]
    pub const fn destroy_hook(mut self, hook: fn(&mut T)) -> Self {
        self.hook = Some(hook);
        self
    }

    /// Runs the payload's own [`Deinit::deinit`] before the destroy hook.
    #[must_use]
    pub fn auto_deinit(mut self) -> Self
    where
        T: Deinit,
    {
        self.deinit = Some(<T as Deinit>::deinit);
        self
    }

    /// Whether a destroy hook is set.
    #[must_use]
    pub const fn has_destroy_hook(&self) -> bool {
        self.hook.is_some()
    }

    /// Whether [`Deinit`] runs automatically.
    #[must_use]
    pub const fn has_auto_deinit(&self) -> bool {
        self.deinit.is_some()
    }

    pub(crate) fn run(&self, value: &mut T) {
        if let Some(deinit) = self.deinit {
            deinit(value);
        }
        if let Some(hook) = self.hook {
            hook(value);
        }
    }
}

impl<T> Clone for Options<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Options<T> {}

impl<T> Default for Options<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for Options<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Options")
            .field("auto_deinit", &self.has_auto_deinit())
            .field("destroy_hook", &self.has_destroy_hook())
            .finish()
    }
}
