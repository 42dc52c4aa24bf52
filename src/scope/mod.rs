//! Scope-like containers that bound values live in.
//!
//! A [`Scope`] resolves accessor paths (see [`Path`](crate::path::Path)),
//! accepts assignments, and reports changes at a path to a listener until
//! the returned [`WatchHandle`] is detached or dropped.

mod reactive;

pub use reactive::ReactiveScope;

use crate::error::PathError;
use crate::signal::WatchGuard;
use serde_json::Value;
use std::fmt;

/// Change listener: receives the new value, or `None` when the path no
/// longer resolves.
pub type Listener = Box<dyn Fn(Option<&Value>) + Send + Sync>;

pub trait Scope {
    fn read(&self, path: &str) -> Result<Option<Value>, PathError>;

    fn assign(&self, path: &str, value: Value) -> Result<(), PathError>;

    /// Register a deep-equality watch on `path`.
    ///
    /// The listener is not called for the value present at registration,
    /// only for later changes.
    fn watch(&self, path: &str, listener: Listener) -> Result<WatchHandle, PathError>;
}

/// Detach capability for a registered watch.
///
/// Dropping the handle detaches as well; [`detach`](Self::detach) makes the
/// teardown explicit at the call site.
pub struct WatchHandle {
    detach: Option<Box<dyn FnOnce() + Send>>,
}

impl WatchHandle {
    pub fn new<F>(detach: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self {
            detach: Some(Box::new(detach)),
        }
    }

    pub fn detach(mut self) {
        self.run_detach();
    }

    fn run_detach(&mut self) {
        if let Some(detach) = self.detach.take() {
            detach();
        }
    }
}

impl Drop for WatchHandle {
    fn drop(&mut self) {
        self.run_detach();
    }
}

impl fmt::Debug for WatchHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WatchHandle")
            .field("attached", &self.detach.is_some())
            .finish()
    }
}

impl From<WatchGuard> for WatchHandle {
    fn from(guard: WatchGuard) -> Self {
        WatchHandle::new(move || drop(guard))
    }
}
