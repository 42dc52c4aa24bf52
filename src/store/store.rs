use super::{BindOptions, UnbindOptions};
use crate::backend::{BackendKind, CookieStore, StorageBackend};
use crate::codec;
use crate::config::StoreConfig;
use crate::error::{Result, StoreError};
use crate::scope::{Scope, WatchHandle};
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Weak};
use tracing::{debug, error, warn};

enum Backend {
    Primary(Arc<dyn StorageBackend>),
    Cookie(Arc<dyn CookieStore>),
    None,
}

impl Backend {
    fn kind(&self) -> BackendKind {
        match self {
            Backend::Primary(_) => BackendKind::Primary,
            Backend::Cookie(_) => BackendKind::Cookie,
            Backend::None => BackendKind::None,
        }
    }
}

struct Inner {
    config: StoreConfig,
    backend: Backend,
    watchers: Mutex<HashMap<String, WatchHandle>>,
}

/// Persistent key-value store with cookie fallback and scope binding.
///
/// Clones share the backend and the watcher table. Watchers registered by
/// [`bind`](Self::bind) hold only a weak reference back to the store, so
/// dropping the last clone detaches every remaining binding.
///
/// ```
/// use serde_json::json;
/// use stashbox::{KeyValueStore, MemoryStorage};
///
/// let store = KeyValueStore::builder()
///     .prefix("app")
///     .primary(MemoryStorage::new())
///     .build();
///
/// store.set("count", json!(3)).unwrap();
/// assert_eq!(store.get("count").unwrap(), Some(json!(3)));
/// ```
#[derive(Clone)]
pub struct KeyValueStore {
    inner: Arc<Inner>,
}

impl KeyValueStore {
    /// Create a store, selecting the backend once.
    ///
    /// The primary backend is used when present and writable. Otherwise the
    /// cookie store is used when present. With neither, the store still
    /// constructs but reads return nothing and writes are dropped.
    pub fn new(
        config: StoreConfig,
        primary: Option<Arc<dyn StorageBackend>>,
        cookies: Option<Arc<dyn CookieStore>>,
    ) -> Self {
        let backend = match (primary, cookies) {
            (Some(primary), _) if primary.probe() => Backend::Primary(primary),
            (primary, Some(cookies)) => {
                if primary.is_some() {
                    warn!("primary storage rejected probe write, falling back to cookies");
                }
                Backend::Cookie(cookies)
            }
            (primary, None) => {
                if primary.is_some() {
                    warn!("primary storage rejected probe write and no cookie store is available");
                } else {
                    warn!("no storage backend available, values will not be persisted");
                }
                Backend::None
            }
        };
        debug!(backend = ?backend.kind(), prefix = ?config.prefix(), "storage backend selected");

        Self {
            inner: Arc::new(Inner {
                config,
                backend,
                watchers: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Start building a store with no prefix and no backends.
    pub fn builder() -> KeyValueStoreBuilder {
        KeyValueStoreBuilder::default()
    }

    /// The configuration the store was built with.
    pub fn config(&self) -> &StoreConfig {
        &self.inner.config
    }

    /// Whether the primary backend is in use.
    pub fn is_supported(&self) -> bool {
        matches!(self.inner.backend, Backend::Primary(_))
    }

    pub fn backend_kind(&self) -> BackendKind {
        self.inner.backend.kind()
    }

    /// Apply the configured prefix to `key`.
    pub fn normalize(&self, key: &str) -> String {
        codec::normalize(self.inner.config.prefix(), key)
    }

    /// Persist `value` under `key`.
    ///
    /// With the primary backend, returns the value as it reads back from
    /// storage, which can differ in type from `value`: setting the string
    /// `"42"` returns the number `42`. With the cookie fallback, returns
    /// `value` unchanged, or `None` if the cookie could not be written.
    pub fn set(&self, key: &str, value: Value) -> Result<Option<Value>> {
        let key = self.normalize(key);
        let encoded = codec::encode(&value)?;

        match &self.inner.backend {
            Backend::Primary(storage) => {
                storage.set_item(&key, &encoded)?;
                debug!(key = %key, "stored value");
                Ok(Some(codec::decode(&encoded)))
            }
            Backend::Cookie(cookies) => match cookies.put(&key, &encoded) {
                Ok(()) => {
                    debug!(key = %key, "stored value in cookie");
                    Ok(Some(value))
                }
                Err(e) => {
                    error!(key = %key, error = %e, "failed to store value in cookie");
                    Ok(None)
                }
            },
            Backend::None => {
                debug!(key = %key, "no backend, value dropped");
                Ok(None)
            }
        }
    }

    /// Read the value under `key`, or `None` when there is none.
    pub fn get(&self, key: &str) -> Result<Option<Value>> {
        let key = self.normalize(key);

        match &self.inner.backend {
            Backend::Primary(storage) => Ok(storage.get_item(&key)?.map(|raw| codec::decode(&raw))),
            Backend::Cookie(cookies) => match cookies.get(&key) {
                Ok(raw) => Ok(raw.map(|raw| codec::decode(&raw))),
                Err(e) => {
                    error!(key = %key, error = %e, "failed to read cookie");
                    Ok(None)
                }
            },
            Backend::None => Ok(None),
        }
    }

    /// Delete the value under `key`.
    ///
    /// Returns `false` only when the cookie fallback failed to remove it or
    /// there is no backend at all.
    pub fn remove(&self, key: &str) -> Result<bool> {
        let key = self.normalize(key);

        match &self.inner.backend {
            Backend::Primary(storage) => {
                storage.remove_item(&key)?;
                debug!(key = %key, "removed value");
                Ok(true)
            }
            Backend::Cookie(cookies) => match cookies.remove(&key) {
                Ok(()) => Ok(true),
                Err(e) => {
                    error!(key = %key, error = %e, "failed to remove cookie");
                    Ok(false)
                }
            },
            Backend::None => Ok(false),
        }
    }

    /// Wipe the whole primary store, including entries under other prefixes.
    ///
    /// Fails with [`StoreError::Unsupported`] when the primary backend is not
    /// in use; the cookie fallback is never cleared.
    pub fn clear_all(&self) -> Result<()> {
        match &self.inner.backend {
            Backend::Primary(storage) => {
                storage.clear()?;
                debug!("cleared storage");
                Ok(())
            }
            _ => Err(StoreError::Unsupported),
        }
    }

    /// Keys under the configured prefix, with the prefix stripped.
    ///
    /// Only the primary backend can enumerate keys; other backends report
    /// none.
    pub fn keys(&self) -> Result<Vec<String>> {
        let Backend::Primary(storage) = &self.inner.backend else {
            return Ok(Vec::new());
        };
        let keys = storage.keys()?;
        Ok(match self.inner.config.prefix() {
            Some(prefix) => {
                let prefix = format!("{prefix}:");
                keys.into_iter()
                    .filter_map(|key| key.strip_prefix(&prefix).map(str::to_string))
                    .collect()
            }
            None => keys,
        })
    }

    pub fn len(&self) -> Result<usize> {
        Ok(self.keys()?.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Whether a watcher is registered under `store_name`.
    pub fn is_bound(&self, store_name: &str) -> bool {
        self.inner.watchers.lock().contains_key(store_name)
    }

    /// Bind the scope variable at `key` to the stored value.
    ///
    /// Initializes the stored value from the default when there is none,
    /// copies it into the scope, and persists every later change the scope
    /// reports for `key`. Binding the same store-name again replaces the
    /// previous watcher. Returns the stored value.
    pub fn bind<S>(&self, scope: &S, key: &str, opts: impl Into<BindOptions>) -> Result<Option<Value>>
    where
        S: Scope + ?Sized,
    {
        let opts = opts.into();
        let store_name = opts.effective_store_name(key).to_string();

        if matches!(self.get(&store_name)?, None | Some(Value::Null)) {
            self.set(&store_name, opts.default_value.clone())?;
        }

        let current = self.get(&store_name)?;
        scope.assign(key, current.clone().unwrap_or(Value::Null))?;

        self.detach(&store_name);

        let store = Arc::downgrade(&self.inner);
        let name = store_name.clone();
        let handle = scope.watch(
            key,
            Box::new(move |value: Option<&Value>| {
                if let Some(value) = value {
                    persist(&store, &name, value.clone());
                }
            }),
        )?;
        self.inner
            .watchers
            .lock()
            .insert(store_name.clone(), handle);
        debug!(key = %key, store_name = %store_name, "bound scope variable");

        Ok(current)
    }

    /// Stop persisting the scope variable at `key` and set it to `null`.
    pub fn unbind<S>(&self, scope: &S, key: &str, opts: UnbindOptions) -> Result<()>
    where
        S: Scope + ?Sized,
    {
        let store_name = opts.effective_store_name(key);

        if !self.detach(store_name) {
            warn!(key = %key, store_name = %store_name, "no watcher registered for store name");
        }

        if opts.remove {
            self.remove(store_name)?;
        }

        scope.assign(key, Value::Null)?;
        debug!(key = %key, store_name = %store_name, removed = opts.remove, "unbound scope variable");
        Ok(())
    }

    /// Detach the watcher under `store_name`, returning whether one existed.
    fn detach(&self, store_name: &str) -> bool {
        // Take the handle out first so the lock is released before detaching.
        let handle = self.inner.watchers.lock().remove(store_name);
        match handle {
            Some(handle) => {
                handle.detach();
                true
            }
            None => false,
        }
    }
}

fn persist(store: &Weak<Inner>, store_name: &str, value: Value) {
    let Some(inner) = store.upgrade() else {
        return;
    };
    let store = KeyValueStore { inner };
    if let Err(e) = store.set(store_name, value) {
        error!(store_name = %store_name, error = %e, "failed to persist bound value");
    }
}

impl fmt::Debug for KeyValueStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyValueStore")
            .field("config", &self.inner.config)
            .field("backend", &self.inner.backend.kind())
            .field("bindings", &self.inner.watchers.lock().len())
            .finish()
    }
}

/// Builder for [`KeyValueStore`].
#[derive(Default)]
pub struct KeyValueStoreBuilder {
    config: StoreConfig,
    primary: Option<Arc<dyn StorageBackend>>,
    cookies: Option<Arc<dyn CookieStore>>,
}

impl KeyValueStoreBuilder {
    pub fn config(mut self, config: StoreConfig) -> Self {
        self.config = config;
        self
    }

    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.config.prefix = Some(prefix.into());
        self
    }

    pub fn primary(mut self, storage: impl StorageBackend + 'static) -> Self {
        self.primary = Some(Arc::new(storage));
        self
    }

    pub fn cookies(mut self, cookies: impl CookieStore + 'static) -> Self {
        self.cookies = Some(Arc::new(cookies));
        self
    }

    pub fn build(self) -> KeyValueStore {
        KeyValueStore::new(self.config, self.primary, self.cookies)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{MemoryCookieJar, MemoryStorage};
    use crate::error::{BackendError, PathError};
    use crate::runtime::ReactiveRuntime;
    use crate::scope::ReactiveScope;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Primary backend that counts writes and can be made to fail.
    #[derive(Clone, Default)]
    struct CountingStorage {
        storage: MemoryStorage,
        writes: Arc<AtomicUsize>,
        fail_writes: Arc<std::sync::atomic::AtomicBool>,
    }

    impl StorageBackend for CountingStorage {
        fn get_item(&self, key: &str) -> Result<Option<String>, BackendError> {
            self.storage.get_item(key)
        }

        fn set_item(&self, key: &str, value: &str) -> Result<(), BackendError> {
            if self.fail_writes.load(Ordering::SeqCst) {
                return Err(BackendError::QuotaExceeded {
                    key: key.to_string(),
                });
            }
            self.writes.fetch_add(1, Ordering::SeqCst);
            self.storage.set_item(key, value)
        }

        fn remove_item(&self, key: &str) -> Result<(), BackendError> {
            self.storage.remove_item(key)
        }

        fn clear(&self) -> Result<(), BackendError> {
            self.storage.clear()
        }

        fn keys(&self) -> Result<Vec<String>, BackendError> {
            self.storage.keys()
        }

        // Keep the probe out of the write count.
        fn probe(&self) -> bool {
            !self.fail_writes.load(Ordering::SeqCst)
        }
    }

    struct BrokenCookies;

    impl CookieStore for BrokenCookies {
        fn get(&self, _key: &str) -> Result<Option<String>, BackendError> {
            Err(BackendError::Rejected("cookies disabled".into()))
        }

        fn put(&self, _key: &str, _value: &str) -> Result<(), BackendError> {
            Err(BackendError::Rejected("cookies disabled".into()))
        }

        fn remove(&self, _key: &str) -> Result<(), BackendError> {
            Err(BackendError::Rejected("cookies disabled".into()))
        }
    }

    fn memory_store(prefix: &str) -> (KeyValueStore, MemoryStorage) {
        let storage = MemoryStorage::new();
        let store = KeyValueStore::builder()
            .prefix(prefix)
            .primary(storage.clone())
            .build();
        (store, storage)
    }

    #[test]
    fn set_writes_under_prefixed_key() {
        let (store, storage) = memory_store("ns");
        store.set("a", json!(42)).unwrap();
        assert_eq!(storage.raw("ns:a").as_deref(), Some("42"));
        assert_eq!(storage.raw("a"), None);
    }

    #[test]
    fn set_echoes_decoded_value() {
        let (store, _) = memory_store("");
        assert_eq!(store.set("n", json!("42")).unwrap(), Some(json!(42)));
        assert_eq!(store.set("b", json!("false")).unwrap(), Some(json!(false)));
        assert_eq!(store.set("s", json!("hi")).unwrap(), Some(json!("hi")));
    }

    #[test]
    fn primary_write_failure_propagates() {
        let storage = CountingStorage::default();
        let store = KeyValueStore::builder().primary(storage.clone()).build();
        storage.fail_writes.store(true, Ordering::SeqCst);

        let err = store.set("k", json!(1)).unwrap_err();
        assert!(matches!(
            err,
            StoreError::Backend(BackendError::QuotaExceeded { .. })
        ));
    }

    #[test]
    fn rejected_probe_falls_back_to_cookies() {
        let storage = CountingStorage::default();
        storage.fail_writes.store(true, Ordering::SeqCst);
        let jar = MemoryCookieJar::new();
        let store = KeyValueStore::builder()
            .primary(storage)
            .cookies(jar.clone())
            .build();

        assert_eq!(store.backend_kind(), BackendKind::Cookie);
        assert!(!store.is_supported());
        assert_eq!(store.set("k", json!("42")).unwrap(), Some(json!("42")));
        assert_eq!(jar.len(), 1);
        assert_eq!(store.get("k").unwrap(), Some(json!(42)));
    }

    #[test]
    fn cookie_failures_become_benign_results() {
        let store = KeyValueStore::new(StoreConfig::new(), None, Some(Arc::new(BrokenCookies)));

        assert_eq!(store.set("k", json!(1)).unwrap(), None);
        assert_eq!(store.get("k").unwrap(), None);
        assert!(!store.remove("k").unwrap());
    }

    #[test]
    fn no_backend_is_inert() {
        let store = KeyValueStore::builder().build();

        assert_eq!(store.backend_kind(), BackendKind::None);
        assert_eq!(store.set("k", json!(1)).unwrap(), None);
        assert_eq!(store.get("k").unwrap(), None);
        assert!(!store.remove("k").unwrap());
        assert!(matches!(store.clear_all(), Err(StoreError::Unsupported)));
    }

    #[test]
    fn clear_all_requires_primary() {
        let store = KeyValueStore::builder().cookies(MemoryCookieJar::new()).build();
        assert!(matches!(store.clear_all(), Err(StoreError::Unsupported)));
    }

    #[test]
    fn keys_are_scoped_to_prefix() {
        let storage = MemoryStorage::new();
        let app = KeyValueStore::builder()
            .prefix("app")
            .primary(storage.clone())
            .build();
        let other = KeyValueStore::builder()
            .prefix("other")
            .primary(storage.clone())
            .build();

        app.set("a", json!(1)).unwrap();
        app.set("b", json!(2)).unwrap();
        other.set("c", json!(3)).unwrap();

        assert_eq!(app.keys().unwrap(), vec!["a".to_string(), "b".to_string()]);
        assert_eq!(other.len().unwrap(), 1);
        assert_eq!(storage.len(), 3);
    }

    #[test]
    fn bind_keeps_existing_value() {
        ReactiveRuntime::scope(|| {
            let (store, _) = memory_store("");
            let scope = ReactiveScope::new();
            store.set("theme", json!("dark")).unwrap();

            let value = store.bind(&scope, "theme", "light").unwrap();
            assert_eq!(value, Some(json!("dark")));
            assert_eq!(scope.get("theme"), Some(json!("dark")));
        });
    }

    #[test]
    fn bind_with_store_name_persists_under_it() {
        ReactiveRuntime::scope(|| {
            let (store, storage) = memory_store("ns");
            let scope = ReactiveScope::new();

            store
                .bind(
                    &scope,
                    "form.email",
                    BindOptions::new().store_name("email").default_value("a@b.c"),
                )
                .unwrap();
            assert_eq!(scope.get("form.email"), Some(json!("a@b.c")));
            assert!(store.is_bound("email"));

            scope.set("form.email", json!("x@y.z")).unwrap();
            assert_eq!(storage.raw("ns:email").as_deref(), Some("\"x@y.z\""));
        });
    }

    #[test]
    fn rebind_replaces_watcher() {
        ReactiveRuntime::scope(|| {
            let storage = CountingStorage::default();
            let store = KeyValueStore::builder().primary(storage.clone()).build();
            let scope = ReactiveScope::new();

            store.bind(&scope, "foo", json!(1)).unwrap();
            store.bind(&scope, "foo", json!(1)).unwrap();
            assert_eq!(ReactiveRuntime::current().observer_count(), 1);

            let before = storage.writes.load(Ordering::SeqCst);
            scope.set("foo", json!(2)).unwrap();
            assert_eq!(storage.writes.load(Ordering::SeqCst), before + 1);
            assert_eq!(store.get("foo").unwrap(), Some(json!(2)));
        });
    }

    #[test]
    fn unbind_without_remove_keeps_value() {
        ReactiveRuntime::scope(|| {
            let (store, _) = memory_store("");
            let scope = ReactiveScope::new();
            store.bind(&scope, "foo", json!(5)).unwrap();

            store.unbind(&scope, "foo", UnbindOptions::new()).unwrap();
            assert!(!store.is_bound("foo"));
            assert_eq!(scope.get("foo"), Some(Value::Null));
            assert_eq!(store.get("foo").unwrap(), Some(json!(5)));

            // No longer persisted
            scope.set("foo", json!(6)).unwrap();
            assert_eq!(store.get("foo").unwrap(), Some(json!(5)));
        });
    }

    #[test]
    fn unbind_unknown_store_name_still_nulls_scope() {
        ReactiveRuntime::scope(|| {
            let (store, _) = memory_store("");
            let scope = ReactiveScope::with_root(json!({"foo": 3}));

            store.unbind(&scope, "foo", UnbindOptions::new()).unwrap();
            assert_eq!(scope.get("foo"), Some(Value::Null));
        });
    }

    #[test]
    fn bind_rejects_oversized_index() {
        ReactiveRuntime::scope(|| {
            let (store, _) = memory_store("");
            let scope = ReactiveScope::new();

            let err = store
                .bind(&scope, "list[18446744073709551615]", json!(1))
                .unwrap_err();
            assert!(matches!(
                err,
                StoreError::Path(PathError::IndexTooLarge { .. })
            ));
            assert!(!store.is_bound("list[18446744073709551615]"));
        });
    }

    #[test]
    fn bind_and_unbind_with_cookie_fallback() {
        ReactiveRuntime::scope(|| {
            let jar = MemoryCookieJar::new();
            let store = KeyValueStore::builder().cookies(jar.clone()).build();
            let scope = ReactiveScope::new();

            assert_eq!(store.bind(&scope, "foo", json!(5)).unwrap(), Some(json!(5)));
            assert_eq!(scope.get("foo"), Some(json!(5)));

            scope.set("foo", json!(6)).unwrap();
            assert_eq!(store.get("foo").unwrap(), Some(json!(6)));

            store
                .unbind(&scope, "foo", UnbindOptions::removing())
                .unwrap();
            assert!(jar.is_empty());
            assert_eq!(scope.get("foo"), Some(Value::Null));
            assert_eq!(ReactiveRuntime::current().observer_count(), 0);
        });
    }

    #[test]
    fn bind_and_unbind_without_backend() {
        ReactiveRuntime::scope(|| {
            let store = KeyValueStore::builder().build();
            let scope = ReactiveScope::with_root(json!({"foo": 3}));

            assert_eq!(store.bind(&scope, "foo", json!(5)).unwrap(), None);
            assert_eq!(scope.get("foo"), Some(Value::Null));
            assert!(store.is_bound("foo"));

            // Changes are dropped without error
            scope.set("foo", json!(6)).unwrap();
            assert_eq!(store.get("foo").unwrap(), None);

            store
                .unbind(&scope, "foo", UnbindOptions::removing())
                .unwrap();
            assert!(!store.is_bound("foo"));
            assert_eq!(scope.get("foo"), Some(Value::Null));
        });
    }

    #[test]
    fn dropping_store_detaches_watchers() {
        ReactiveRuntime::scope(|| {
            let (store, _) = memory_store("");
            let scope = ReactiveScope::new();
            store.bind(&scope, "foo", json!(1)).unwrap();
            assert_eq!(ReactiveRuntime::current().observer_count(), 1);

            drop(store);
            assert_eq!(ReactiveRuntime::current().observer_count(), 0);
        });
    }
}
