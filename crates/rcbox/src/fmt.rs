//! Formatting and value-trait glue shared by both box flavors.

use crate::counts::Counts;

/// `std::any::type_name` with module paths stripped:
/// `alloc::vec::Vec<alloc::string::String>` becomes `Vec<String>`.
pub(crate) fn short_type_name<T: ?Sized>() -> String {
    let full = std::any::type_name::<T>();
    let mut out = String::with_capacity(full.len());
    let mut rest = full;

    while !rest.is_empty() {
        let end = rest
            .find(|c: char| !(c.is_alphanumeric() || c == '_' || c == ':'))
            .unwrap_or(rest.len());
        let (path, tail) = rest.split_at(end);
        out.push_str(path.rsplit("::").next().unwrap_or(path));

        let delim = tail.chars().next().map_or(0, char::len_utf8);
        out.push_str(&tail[..delim]);
        rest = &tail[delim..];
    }

    out
}

/// Label used by the `Debug` rendering, e.g. `StrongBox<Vec<u8>>`.
pub(crate) fn label<T: ?Sized>(kind: &str) -> String {
    format!("{kind}<{}>", short_type_name::<T>())
}

/// Structural rendering available for any payload type.
pub(crate) fn describe<T>(kind: &str, counts: Counts, addr: usize) -> String {
    format!(
        "{} {{ strong: {}, weak: {}, size: {}, at: {addr:#x} }}",
        label::<T>(kind),
        counts.strong(),
        counts.weak(),
        std::mem::size_of::<T>(),
    )
}

/// Implements the value-forwarding traits for a strong handle type.
///
/// `Debug` wraps the payload's rendering in the type label, `Display`
/// delegates to the payload, comparisons and hashing go through the value.
macro_rules! impl_value_traits {
    ($handle:ident) => {
        impl<T: ::std::fmt::Debug, A: ::sys_alloc::Allocator> ::std::fmt::Debug for $handle<T, A> {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                f.debug_tuple(&$crate::fmt::label::<T>(stringify!($handle)))
                    .field(&**self)
                    .finish()
            }
        }

        impl<T: ::std::fmt::Display, A: ::sys_alloc::Allocator> ::std::fmt::Display
            for $handle<T, A>
        {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                ::std::fmt::Display::fmt(&**self, f)
            }
        }

        impl<T, A: ::sys_alloc::Allocator> ::std::fmt::Pointer for $handle<T, A> {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                ::std::fmt::Pointer::fmt(&$handle::as_ptr(self), f)
            }
        }

        impl<T: PartialEq, A: ::sys_alloc::Allocator> PartialEq for $handle<T, A> {
            fn eq(&self, other: &Self) -> bool {
                **self == **other
            }
        }

        impl<T: Eq, A: ::sys_alloc::Allocator> Eq for $handle<T, A> {}

        impl<T: PartialOrd, A: ::sys_alloc::Allocator> PartialOrd for $handle<T, A> {
            fn partial_cmp(&self, other: &Self) -> Option<::std::cmp::Ordering> {
                (**self).partial_cmp(&**other)
            }
        }

        impl<T: Ord, A: ::sys_alloc::Allocator> Ord for $handle<T, A> {
            fn cmp(&self, other: &Self) -> ::std::cmp::Ordering {
                (**self).cmp(&**other)
            }
        }

        impl<T: ::std::hash::Hash, A: ::sys_alloc::Allocator> ::std::hash::Hash for $handle<T, A> {
            fn hash<H: ::std::hash::Hasher>(&self, state: &mut H) {
                (**self).hash(state);
            }
        }

        impl<T, A: ::sys_alloc::Allocator> AsRef<T> for $handle<T, A> {
            fn as_ref(&self) -> &T {
                self
            }
        }

        impl<T, A: ::sys_alloc::Allocator> ::std::borrow::Borrow<T> for $handle<T, A> {
            fn borrow(&self) -> &T {
                self
            }
        }

        impl<T> From<T> for $handle<T> {
            fn from(value: T) -> Self {
                Self::new(value)
            }
        }

        impl<T: Default> Default for $handle<T> {
            fn default() -> Self {
                Self::new(T::default())
            }
        }
    };
}

pub(crate) use impl_value_traits;
