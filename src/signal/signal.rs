use crate::runtime::{ReactiveRuntime, RuntimeInner};
use parking_lot::RwLock;
use std::sync::{Arc, Weak};

/// A reactive value that notifies watchers when changed.
///
/// Clones share the same value. A signal notifies through the runtime that
/// was current when it was created.
pub struct Signal<T> {
    value: Arc<RwLock<T>>,
    id: usize,
    runtime: Arc<ReactiveRuntime>,
}

impl<T> Clone for Signal<T> {
    fn clone(&self) -> Self {
        Self {
            value: Arc::clone(&self.value),
            id: self.id,
            runtime: Arc::clone(&self.runtime),
        }
    }
}

impl<T: Clone + Send + Sync + 'static> Signal<T> {
    /// Create a new signal with the given initial value.
    pub fn new(initial: T) -> Self {
        let runtime = ReactiveRuntime::current();
        let id = runtime.next_id();

        Self {
            value: Arc::new(RwLock::new(initial)),
            id,
            runtime,
        }
    }

    /// Get the current value of the signal.
    pub fn get(&self) -> T {
        self.value.read().clone()
    }

    /// Set a new value for the signal.
    pub fn set(&self, new_value: T) {
        *self.value.write() = new_value;
        self.runtime.notify_observers(self.id);
    }

    /// Update the value in place and notify watchers.
    pub fn update<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        let result = {
            let mut value = self.value.write();
            f(&mut value)
        };
        self.runtime.notify_observers(self.id);
        result
    }

    /// Read the value with a function without cloning.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.value.read())
    }

    /// Watch this signal for changes.
    ///
    /// The callback runs once immediately with the current value and then
    /// after every `set`/`update`, until the returned guard is dropped.
    pub fn watch<F>(&self, callback: F) -> WatchGuard
    where
        F: Fn(T) + Send + Sync + 'static,
    {
        let observer_id = self.runtime.next_id();
        let value = Arc::clone(&self.value);
        let callback = Arc::new(callback);
        let callback_clone = Arc::clone(&callback);

        self.runtime.subscribe(self.id, observer_id, move || {
            let val = value.read().clone();
            callback_clone(val);
        });

        callback(self.get());

        WatchGuard {
            observer_id,
            runtime: Arc::downgrade(self.runtime.inner()),
        }
    }
}

/// RAII guard for signal watchers.
pub struct WatchGuard {
    observer_id: usize,
    runtime: Weak<RuntimeInner>,
}

impl Drop for WatchGuard {
    fn drop(&mut self) {
        if let Some(runtime) = self.runtime.upgrade() {
            runtime.remove_observer(self.observer_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn set_and_update() {
        let signal = Signal::new(1);
        signal.set(2);
        let doubled = signal.update(|n| {
            *n *= 2;
            *n
        });
        assert_eq!(doubled, 4);
        assert_eq!(signal.get(), 4);
        assert_eq!(signal.with(|n| *n + 1), 5);
    }

    #[test]
    fn watch_runs_until_guard_dropped() {
        ReactiveRuntime::scope(|| {
            let signal = Signal::new(0);
            let calls = Arc::new(AtomicUsize::new(0));
            let calls_clone = calls.clone();

            let guard = signal.watch(move |_| {
                calls_clone.fetch_add(1, Ordering::SeqCst);
            });
            // Immediate call with the current value
            assert_eq!(calls.load(Ordering::SeqCst), 1);

            signal.set(1);
            assert_eq!(calls.load(Ordering::SeqCst), 2);

            drop(guard);
            signal.set(2);
            assert_eq!(calls.load(Ordering::SeqCst), 2);
        });
    }

    #[test]
    fn unrelated_signal_does_not_fire_watchers() {
        ReactiveRuntime::scope(|| {
            let _a = Signal::new(0);
            let b = Signal::new(0);
            let calls = Arc::new(AtomicUsize::new(0));
            let calls_clone = calls.clone();

            let _guard = b.watch(move |_| {
                calls_clone.fetch_add(1, Ordering::SeqCst);
            });
            let c = Signal::new(0);
            assert_ne!(b.id, c.id);

            c.set(6);
            assert_eq!(calls.load(Ordering::SeqCst), 1);

            b.set(1);
            assert_eq!(calls.load(Ordering::SeqCst), 2);
        });
    }

    #[test]
    fn signal_keeps_its_creation_runtime() {
        let runtime = ReactiveRuntime::new();
        let signal = ReactiveRuntime::with_runtime(runtime.clone(), || Signal::new(0));
        let seen = Arc::new(AtomicUsize::new(0));
        let seen_clone = seen.clone();

        let _guard = signal.watch(move |v| {
            seen_clone.store(v, Ordering::SeqCst);
        });
        assert_eq!(runtime.observer_count(), 1);

        // Set outside the scope still reaches the watcher.
        signal.set(9);
        assert_eq!(seen.load(Ordering::SeqCst), 9);
    }
}
