//! Shared aliases and small helpers.

use std::fmt;
use std::hash::BuildHasherDefault;

/// Insertion-ordered map; registration and discovery order are
/// significant throughout the crate.
pub type Map<K, V> = indexmap::IndexMap<K, V, BuildHasherDefault<rustc_hash::FxHasher>>;

/// Insertion-ordered set.
pub type Set<T> = indexmap::IndexSet<T, BuildHasherDefault<rustc_hash::FxHasher>>;

/// Wrap a closure as a `Display` implementation.
pub fn display_fn<F>(f: F) -> impl fmt::Display
where
    F: Fn(&mut fmt::Formatter<'_>) -> fmt::Result,
{
    struct DisplayFn<F>(F);

    impl<F> fmt::Display for DisplayFn<F>
    where
        F: Fn(&mut fmt::Formatter<'_>) -> fmt::Result,
    {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            (self.0)(f)
        }
    }

    DisplayFn(f)
}
