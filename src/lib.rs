//! # Stashbox
//!
//! Persistent key-value storage for reactive application state.
//!
//! Stashbox provides two layers:
//!
//! ## Storage
//!
//! - [`KeyValueStore`] - JSON values under namespaced keys, written to a
//!   primary [`StorageBackend`] or, when none is usable, a [`CookieStore`]
//! - Lenient decoding: boolean and numeric strings read back as booleans
//!   and numbers
//! - Reference backends: [`MemoryStorage`], [`JsonFileStorage`],
//!   [`MemoryCookieJar`]
//!
//! ## Binding
//!
//! - [`Signal`] - reactive values that notify watchers when changed
//! - [`ReactiveScope`] - a [`Scope`] holding bindable variables by path
//! - [`KeyValueStore::bind`] keeps a scope variable and a stored value in
//!   sync until [`KeyValueStore::unbind`]
//!
//! ```
//! use serde_json::json;
//! use stashbox::{KeyValueStore, MemoryStorage, ReactiveScope, UnbindOptions};
//!
//! let store = KeyValueStore::builder()
//!     .prefix("app")
//!     .primary(MemoryStorage::new())
//!     .build();
//! let scope = ReactiveScope::new();
//!
//! store.bind(&scope, "volume", json!(7)).unwrap();
//! assert_eq!(scope.get("volume"), Some(json!(7)));
//!
//! scope.set("volume", json!(9)).unwrap();
//! assert_eq!(store.get("volume").unwrap(), Some(json!(9)));
//!
//! store.unbind(&scope, "volume", UnbindOptions::removing()).unwrap();
//! assert_eq!(store.get("volume").unwrap(), None);
//! ```

pub mod backend;
pub mod codec;
pub mod config;
pub mod error;
pub mod path;
pub mod runtime;
pub mod scope;
pub mod signal;
pub mod store;

// Re-export main types for convenience
pub use backend::{
    BackendKind, CookieStore, JsonFileStorage, MemoryCookieJar, MemoryStorage, StorageBackend,
};
pub use config::StoreConfig;
pub use error::{BackendError, PathError, StoreError};
pub use scope::{ReactiveScope, Scope, WatchHandle};
pub use signal::{Signal, WatchGuard};
pub use store::{BindOptions, KeyValueStore, KeyValueStoreBuilder, UnbindOptions};
