use super::{Listener, Scope, WatchHandle};
use crate::error::PathError;
use crate::path::Path;
use crate::signal::Signal;
use parking_lot::Mutex;
use serde_json::{Map, Value};
use std::sync::Arc;

/// A scope whose state is one JSON object held in a [`Signal`].
///
/// Every assignment notifies the signal; each path watch compares the value
/// at its path with the last value it saw and calls its listener only when
/// they differ.
///
/// ```
/// use serde_json::json;
/// use stashbox::ReactiveScope;
///
/// let scope = ReactiveScope::new();
/// scope.set("prefs.theme", json!("dark")).unwrap();
/// assert_eq!(scope.get("prefs.theme"), Some(json!("dark")));
/// ```
#[derive(Clone)]
pub struct ReactiveScope {
    root: Signal<Value>,
}

impl ReactiveScope {
    pub fn new() -> Self {
        Self::with_root(Value::Object(Map::new()))
    }

    pub fn with_root(root: Value) -> Self {
        Self {
            root: Signal::new(root),
        }
    }

    /// Value at `path`, or `None` when it does not resolve or does not parse.
    pub fn get(&self, path: &str) -> Option<Value> {
        self.read(path).ok().flatten()
    }

    pub fn set(&self, path: &str, value: Value) -> Result<(), PathError> {
        self.assign(path, value)
    }

    /// Clone of the whole scope state.
    pub fn snapshot(&self) -> Value {
        self.root.get()
    }
}

impl Default for ReactiveScope {
    fn default() -> Self {
        Self::new()
    }
}

impl Scope for ReactiveScope {
    fn read(&self, path: &str) -> Result<Option<Value>, PathError> {
        let path = Path::parse(path)?;
        Ok(self.root.with(|root| path.read(root).cloned()))
    }

    fn assign(&self, path: &str, value: Value) -> Result<(), PathError> {
        let path = Path::parse(path)?;
        self.root.update(|root| path.assign(root, value))
    }

    fn watch(&self, path: &str, listener: Listener) -> Result<WatchHandle, PathError> {
        let path = Path::parse(path)?;
        // `None` until the signal's immediate first call seeds it.
        let last_seen: Arc<Mutex<Option<Option<Value>>>> = Arc::new(Mutex::new(None));

        let guard = self.root.watch(move |root| {
            let current = path.read(&root).cloned();
            {
                let mut last = last_seen.lock();
                let seeded = last.is_some();
                if seeded && last.as_ref() == Some(&current) {
                    return;
                }
                *last = Some(current.clone());
                if !seeded {
                    return;
                }
            }
            listener(current.as_ref());
        });

        Ok(guard.into())
    }
}
