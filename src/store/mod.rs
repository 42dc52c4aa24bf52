//! The persistent key-value store and its scope bindings.
//!
//! [`KeyValueStore`] picks a backend once at construction, reads and writes
//! JSON values through it, and keeps one change watcher per bound
//! store-name so that edits made in a [`Scope`](crate::Scope) are persisted
//! as they happen.

mod options;
mod store;

pub use options::{BindOptions, UnbindOptions};
pub use store::{KeyValueStore, KeyValueStoreBuilder};
