//! Storage backends.
//!
//! A [`KeyValueStore`](crate::KeyValueStore) talks to at most one backend:
//! a primary [`StorageBackend`] when the host provides a working one, or a
//! [`CookieStore`] fallback otherwise. Both traits deal in raw strings; JSON
//! encoding happens in the store.

mod cookie;
mod file;
mod memory;

pub use cookie::MemoryCookieJar;
pub use file::JsonFileStorage;
pub use memory::MemoryStorage;

use crate::error::BackendError;

const PROBE_KEY: &str = "__stashbox_probe__";

/// A persistent string key-value store, the equivalent of web storage.
pub trait StorageBackend: Send + Sync {
    fn get_item(&self, key: &str) -> Result<Option<String>, BackendError>;

    fn set_item(&self, key: &str, value: &str) -> Result<(), BackendError>;

    fn remove_item(&self, key: &str) -> Result<(), BackendError>;

    /// Remove every entry, regardless of prefix.
    fn clear(&self) -> Result<(), BackendError>;

    fn keys(&self) -> Result<Vec<String>, BackendError>;

    /// Check that the backend accepts writes.
    ///
    /// Writes and removes a sentinel entry. Hosts that expose a storage
    /// object but refuse writes (private browsing modes, read-only mounts)
    /// fail here.
    fn probe(&self) -> bool {
        self.set_item(PROBE_KEY, PROBE_KEY).is_ok() && self.remove_item(PROBE_KEY).is_ok()
    }
}

/// Cookie-based fallback store.
pub trait CookieStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, BackendError>;

    fn put(&self, key: &str, value: &str) -> Result<(), BackendError>;

    fn remove(&self, key: &str) -> Result<(), BackendError>;
}

/// Which backend a store ended up using.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BackendKind {
    Primary,
    Cookie,
    None,
}
