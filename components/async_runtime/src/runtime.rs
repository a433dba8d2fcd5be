//! The runtime that owns the task queue and rejection tracking.
//!
//! A host creates one [`Runtime`], builds promises through it and calls
//! [`Runtime::run_until_idle`] whenever its own synchronous work is done.
//! That call is the drain loop: it runs queued continuations in FIFO order
//! and then reports rejections nobody handled.

use crate::combinators;
use crate::config::{ConfigError, RuntimeConfig};
use crate::promise::{invoke, Promise, PromiseId, Resolver};
use crate::rejection::RejectionTracker;
use crate::task_queue::{Task, TaskQueue};
use core_types::Reason;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use tracing::debug;

/// Completion callback handed out by [`Runtime::from_callback`].
pub type Callback<T> = Box<dyn FnOnce(Result<T, Reason>) + Send>;

pub(crate) struct RuntimeInner {
    pub(crate) queue: TaskQueue,
    pub(crate) tracker: RejectionTracker,
    pub(crate) config: RuntimeConfig,
    /// Live `Runtime` handles. Promises keep `RuntimeInner` alive too, so
    /// the strong count alone cannot tell when the host is done.
    handles: AtomicUsize,
}

/// Summary of one [`Runtime::run_until_idle`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RunReport {
    /// Tasks executed during this call.
    pub executed: usize,
    /// Tasks still queued (non-zero only when the drain budget ran out).
    pub remaining: usize,
    /// Unhandled rejections reported by the idle check.
    pub unhandled: usize,
}

/// Process-scoped scheduling context for promises.
///
/// Cloning a `Runtime` gives another handle to the same queue, tracker and
/// configuration. When the last handle is dropped the queue is closed:
/// queued continuations are discarded and promises settled afterwards never
/// run theirs. A handle captured by a queued task or by the rejection hook
/// keeps the runtime open.
///
/// Several threads may call [`run_until_idle`](Self::run_until_idle); only
/// one drains at a time and the others return at once.
///
/// # Examples
///
/// ```
/// use async_runtime::Runtime;
///
/// let rt = Runtime::new();
/// let answer = rt
///     .new_promise(|resolver| resolver.resolve(5))
///     .then(|x| Ok(x + 1));
///
/// let report = rt.run_until_idle();
/// assert_eq!(report.remaining, 0);
/// assert_eq!(answer.value(), Some(6));
/// ```
pub struct Runtime {
    inner: Arc<RuntimeInner>,
}

impl Runtime {
    /// Creates a runtime with the default configuration.
    pub fn new() -> Self {
        Self::build(RuntimeConfig::default())
    }

    /// Creates a runtime from an explicit configuration.
    pub fn with_config(config: RuntimeConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::build(config))
    }

    fn build(config: RuntimeConfig) -> Self {
        Self {
            inner: Arc::new(RuntimeInner {
                queue: TaskQueue::with_catch_panics(config.catch_panics),
                tracker: RejectionTracker::new(),
                config,
                handles: AtomicUsize::new(1),
            }),
        }
    }

    /// The active configuration.
    pub fn config(&self) -> &RuntimeConfig {
        &self.inner.config
    }

    /// Creates a promise and runs `resolver` synchronously with its
    /// [`Resolver`]. If the resolver panics (and panics are caught) the
    /// promise rejects with the panic, unless it had already settled.
    pub fn new_promise<T, F>(&self, resolver: F) -> Promise<T>
    where
        T: Clone + Send + 'static,
        F: FnOnce(Resolver<T>),
    {
        let promise = Promise::pending(&self.inner);
        let handle = Resolver::new(promise.clone());
        let for_resolver = handle.clone();
        let result = invoke(self.inner.config.catch_panics, move || {
            resolver(for_resolver);
            Ok(())
        });
        if let Err(reason) = result {
            handle.reject(reason);
        }
        promise
    }

    /// Creates a pending promise together with its resolver.
    pub fn deferred<T>(&self) -> (Promise<T>, Resolver<T>)
    where
        T: Clone + Send + 'static,
    {
        let promise = Promise::pending(&self.inner);
        let resolver = Resolver::new(promise.clone());
        (promise, resolver)
    }

    /// A promise already fulfilled with `value`.
    pub fn resolved<T>(&self, value: T) -> Promise<T>
    where
        T: Clone + Send + 'static,
    {
        let promise = Promise::pending(&self.inner);
        promise.complete(Ok(value));
        promise
    }

    /// A promise already rejected with `reason`.
    pub fn rejected<T>(&self, reason: impl Into<Reason>) -> Promise<T>
    where
        T: Clone + Send + 'static,
    {
        let promise = Promise::pending(&self.inner);
        promise.complete(Err(reason.into()));
        promise
    }

    /// Adapts a completion-callback API into a promise.
    ///
    /// `start` receives a one-shot callback; whatever result it is called
    /// with settles the promise.
    ///
    /// ```
    /// use async_runtime::{Callback, Runtime};
    /// use core_types::Reason;
    ///
    /// fn read_config(path: &str, done: Callback<String>) {
    ///     if path.is_empty() {
    ///         done(Err(Reason::new("empty path")));
    ///     } else {
    ///         done(Ok(format!("contents of {}", path)));
    ///     }
    /// }
    ///
    /// let rt = Runtime::new();
    /// let contents = rt.from_callback(|done| read_config("app.toml", done));
    /// assert_eq!(contents.value(), Some("contents of app.toml".to_string()));
    /// ```
    pub fn from_callback<T, F>(&self, start: F) -> Promise<T>
    where
        T: Clone + Send + 'static,
        F: FnOnce(Callback<T>),
    {
        self.new_promise(move |resolver| {
            let callback: Callback<T> = Box::new(move |outcome| resolver.settle(outcome));
            start(callback);
        })
    }

    /// Fulfills with all values in input order, or rejects with the first
    /// rejection.
    pub fn all<T>(&self, promises: Vec<Promise<T>>) -> Promise<Vec<T>>
    where
        T: Clone + Send + 'static,
    {
        combinators::all(&self.inner, promises)
    }

    /// Settles like the first input to settle.
    pub fn race<T>(&self, promises: Vec<Promise<T>>) -> Promise<T>
    where
        T: Clone + Send + 'static,
    {
        combinators::race(&self.inner, promises)
    }

    /// Queues a plain callback behind the work already queued.
    pub fn queue_task<F>(&self, f: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.inner.queue.enqueue(Task::new(f));
    }

    /// Number of callbacks waiting to run.
    pub fn pending_tasks(&self) -> usize {
        self.inner.queue.len()
    }

    /// Drains the task queue (up to the configured budget) and, if the
    /// queue ended up empty, reports unhandled rejections.
    ///
    /// Calling this from inside a running task does nothing; the outer
    /// call keeps draining.
    pub fn run_until_idle(&self) -> RunReport {
        let queue = &self.inner.queue;
        if queue.is_draining() {
            return RunReport {
                remaining: queue.len(),
                ..RunReport::default()
            };
        }

        let executed = queue.drain_at_most(self.inner.config.drain_budget);
        let remaining = queue.len();
        let unhandled = if remaining == 0 {
            self.inner.tracker.check()
        } else {
            0
        };

        debug!(executed, remaining, unhandled, "runtime turn finished");
        RunReport {
            executed,
            remaining,
            unhandled,
        }
    }

    /// Drains until `promise` settles or no work is left, then returns its
    /// outcome (`None` if it is still pending).
    ///
    /// If another thread is draining, this waits for that drain instead of
    /// giving up. Called from inside a task it returns after one attempt,
    /// since the enclosing drain cannot make progress until the task ends.
    pub fn run_until_settled<T>(&self, promise: &Promise<T>) -> Option<Result<T, Reason>>
    where
        T: Clone + Send + 'static,
    {
        let queue = &self.inner.queue;
        while promise.is_pending() {
            if self.run_until_idle().executed > 0 {
                continue;
            }
            if queue.is_draining_on_current_thread() {
                break;
            }
            if !queue.is_draining() && queue.is_empty() {
                break;
            }
            thread::yield_now();
        }
        promise.outcome()
    }

    /// Replaces the unhandled-rejection handler. The default does nothing
    /// beyond the `warn` log line every report produces.
    pub fn on_unhandled_rejection<H>(&self, handler: H)
    where
        H: Fn(&Reason, PromiseId) + Send + Sync + 'static,
    {
        self.inner.tracker.set_handler(Arc::new(handler));
    }

    /// Reports rejected promises that still have no continuation.
    /// Returns how many were reported.
    pub fn check_unhandled_rejections(&self) -> usize {
        self.inner.tracker.check()
    }

    /// Total unhandled rejections reported so far.
    pub fn unhandled_reported(&self) -> usize {
        self.inner.tracker.reported()
    }
}

impl Clone for Runtime {
    fn clone(&self) -> Self {
        self.inner.handles.fetch_add(1, Ordering::Relaxed);
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl Drop for Runtime {
    fn drop(&mut self) {
        if self.inner.handles.fetch_sub(1, Ordering::AcqRel) == 1 {
            // Queued tasks own promises, which own the runtime; closing the
            // queue breaks that cycle.
            self.inner.queue.close();
        }
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Runtime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runtime")
            .field("queue", &self.inner.queue)
            .field("config", &self.inner.config)
            .finish()
    }
}
