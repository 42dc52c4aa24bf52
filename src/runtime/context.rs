use parking_lot::Mutex;
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};

type Observer = Arc<dyn Fn() + Send + Sync>;

/// Subscription graph for one runtime.
#[derive(Default)]
struct ReactiveContext {
    // Map from signal ID to set of observer IDs subscribed to it
    dependencies: HashMap<usize, HashSet<usize>>,
    // Map from observer ID to set of signal IDs it is subscribed to
    observer_deps: HashMap<usize, HashSet<usize>>,
    observers: HashMap<usize, Observer>,
}

/// Inner runtime state shared with watch guards.
pub struct RuntimeInner {
    context: Mutex<ReactiveContext>,
}

impl RuntimeInner {
    fn new() -> Self {
        Self {
            context: Mutex::new(ReactiveContext::default()),
        }
    }

    pub(crate) fn remove_observer(&self, observer_id: usize) {
        let mut ctx = self.context.lock();
        ctx.observers.remove(&observer_id);

        if let Some(old_deps) = ctx.observer_deps.remove(&observer_id) {
            for signal_id in old_deps {
                if let Some(deps) = ctx.dependencies.get_mut(&signal_id) {
                    deps.remove(&observer_id);
                    if deps.is_empty() {
                        ctx.dependencies.remove(&signal_id);
                    }
                }
            }
        }
    }
}

/// Reactive runtime that routes signal changes to their watchers.
///
/// Supports both a global runtime (default) and scoped runtimes for
/// isolation. Signals capture the runtime that is current when they are
/// created and notify through it for their whole lifetime.
///
/// # Examples
///
/// Using scoped runtimes for isolation:
///
/// ```
/// use stashbox::runtime::ReactiveRuntime;
/// use stashbox::Signal;
///
/// ReactiveRuntime::scope(|| {
///     let signal = Signal::new(0);
///     assert_eq!(signal.get(), 0);
/// });
/// ```
pub struct ReactiveRuntime {
    next_id: AtomicUsize,
    inner: Arc<RuntimeInner>,
}

// Thread-local stack for scoped runtimes
thread_local! {
    static RUNTIME_STACK: RefCell<Vec<Arc<ReactiveRuntime>>> = const { RefCell::new(Vec::new()) };
}

impl ReactiveRuntime {
    /// Create a new isolated runtime.
    pub fn new() -> Arc<Self> {
        Arc::new(ReactiveRuntime {
            next_id: AtomicUsize::new(0),
            inner: Arc::new(RuntimeInner::new()),
        })
    }

    /// Run a function with a fresh isolated runtime.
    ///
    /// Useful for testing: signals created inside `f` never share observers
    /// with signals created elsewhere.
    pub fn scope<F, R>(f: F) -> R
    where
        F: FnOnce() -> R,
    {
        Self::with_runtime(Self::new(), f)
    }

    /// Get or create the global runtime (fallback).
    pub fn global() -> Arc<Self> {
        static RUNTIME: OnceLock<Arc<ReactiveRuntime>> = OnceLock::new();
        Arc::clone(RUNTIME.get_or_init(Self::new))
    }

    /// Get the current reactive runtime (scoped or global fallback).
    pub fn current() -> Arc<Self> {
        RUNTIME_STACK.with(|stack| stack.borrow().last().cloned().unwrap_or_else(Self::global))
    }

    /// Run a function with a specific runtime as the current context.
    ///
    /// The runtime is popped again even if `f` panics.
    pub fn with_runtime<F, R>(runtime: Arc<Self>, f: F) -> R
    where
        F: FnOnce() -> R,
    {
        RUNTIME_STACK.with(|stack| {
            stack.borrow_mut().push(runtime);
        });

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(f));

        RUNTIME_STACK.with(|stack| {
            stack.borrow_mut().pop();
        });

        match result {
            Ok(r) => r,
            Err(e) => std::panic::resume_unwind(e),
        }
    }

    pub(crate) fn inner(&self) -> &Arc<RuntimeInner> {
        &self.inner
    }

    /// Generate the next unique ID for a signal or observer.
    pub fn next_id(&self) -> usize {
        self.next_id.fetch_add(1, Ordering::SeqCst)
    }

    /// Number of live observers.
    pub fn observer_count(&self) -> usize {
        self.inner.context.lock().observers.len()
    }

    /// Register `f` as an observer subscribed to `signal_id`.
    pub(crate) fn subscribe<F>(&self, signal_id: usize, observer_id: usize, f: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        let mut ctx = self.inner.context.lock();
        ctx.observers.insert(observer_id, Arc::new(f));
        ctx.dependencies
            .entry(signal_id)
            .or_default()
            .insert(observer_id);
        ctx.observer_deps
            .entry(observer_id)
            .or_default()
            .insert(signal_id);
    }

    /// Run every observer subscribed to a signal.
    ///
    /// Observers run after the registry lock is released, so they may set
    /// signals or drop watch guards themselves.
    pub fn notify_observers(&self, signal_id: usize) {
        let observers: Vec<Observer> = {
            let ctx = self.inner.context.lock();
            let Some(ids) = ctx.dependencies.get(&signal_id) else {
                return;
            };
            let mut ids: Vec<usize> = ids.iter().copied().collect();
            ids.sort_unstable();
            ids.iter()
                .filter_map(|id| ctx.observers.get(id).cloned())
                .collect()
        };

        for observer in observers {
            observer();
        }
    }
}
