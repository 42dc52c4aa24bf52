//! Reactive values.
//!
//! A [`Signal`] holds a value and runs its watchers whenever it changes;
//! [`ReactiveScope`](crate::ReactiveScope) is built on top of it.

mod signal;

pub use signal::{Signal, WatchGuard};
