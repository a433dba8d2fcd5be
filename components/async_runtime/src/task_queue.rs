//! Deferred callback queue.
//!
//! This module provides the FIFO queue that every promise continuation goes
//! through. Callbacks are never run at the point they are enqueued; they run
//! when the host drains the queue, one at a time and to completion.

use core_types::Reason;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, ThreadId};
use tracing::{debug, error, trace};

/// A zero-argument callback waiting in the [`TaskQueue`].
pub struct Task {
    callback: Box<dyn FnOnce() + Send>,
}

impl Task {
    /// Creates a new Task from a closure.
    ///
    /// # Arguments
    ///
    /// * `f` - The function to execute when the task runs
    pub fn new<F>(f: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self {
            callback: Box::new(f),
        }
    }

    /// Executes the task.
    pub fn run(self) {
        (self.callback)()
    }
}

impl std::fmt::Debug for Task {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Task {{ ... }}")
    }
}

struct QueueInner {
    pending: Mutex<VecDeque<Task>>,
    draining: AtomicBool,
    /// Thread running the current drain, if any.
    driver: Mutex<Option<ThreadId>>,
    /// Set once the owning runtime is gone; later tasks are dropped.
    closed: AtomicBool,
    catch_panics: bool,
}

/// A shared FIFO queue of deferred callbacks.
///
/// Cloning a `TaskQueue` yields another handle to the same queue. Draining
/// is non-reentrant: a drain requested while one is already running (from
/// inside a task, or from another thread) returns immediately and the
/// running drain picks the work up.
///
/// # Examples
///
/// ```
/// use async_runtime::{Task, TaskQueue};
/// use std::sync::{Arc, Mutex};
///
/// let queue = TaskQueue::new();
/// let order = Arc::new(Mutex::new(Vec::new()));
///
/// let o = order.clone();
/// let q = queue.clone();
/// queue.enqueue(Task::new(move || {
///     o.lock().unwrap().push(1);
///     let o = o.clone();
///     q.enqueue(Task::new(move || o.lock().unwrap().push(3)));
/// }));
/// let o = order.clone();
/// queue.enqueue(Task::new(move || o.lock().unwrap().push(2)));
///
/// assert_eq!(queue.drain(), 3);
/// assert_eq!(*order.lock().unwrap(), vec![1, 2, 3]);
/// ```
#[derive(Clone)]
pub struct TaskQueue {
    inner: Arc<QueueInner>,
}

impl TaskQueue {
    /// Creates a new empty TaskQueue that catches task panics.
    pub fn new() -> Self {
        Self::with_catch_panics(true)
    }

    /// Creates a new empty TaskQueue with an explicit panic policy.
    ///
    /// When `catch_panics` is false a panicking task unwinds out of
    /// [`drain`](Self::drain); the queue stays usable afterwards.
    pub fn with_catch_panics(catch_panics: bool) -> Self {
        Self {
            inner: Arc::new(QueueInner {
                pending: Mutex::new(VecDeque::new()),
                draining: AtomicBool::new(false),
                driver: Mutex::new(None),
                closed: AtomicBool::new(false),
                catch_panics,
            }),
        }
    }

    /// Adds a task to the end of the queue. Never runs it inline.
    pub fn enqueue(&self, task: Task) {
        let mut pending = self.inner.pending.lock();
        if self.inner.closed.load(Ordering::Acquire) {
            drop(pending);
            trace!("task dropped, queue closed");
            return;
        }
        pending.push_back(task);
        trace!(queued = pending.len(), "task enqueued");
    }

    /// Removes and returns the next task from the queue.
    pub fn dequeue(&self) -> Option<Task> {
        self.inner.pending.lock().pop_front()
    }

    /// Returns true if the queue is empty.
    pub fn is_empty(&self) -> bool {
        self.inner.pending.lock().is_empty()
    }

    /// Returns the number of tasks in the queue.
    pub fn len(&self) -> usize {
        self.inner.pending.lock().len()
    }

    /// Returns true while a drain is in progress.
    pub fn is_draining(&self) -> bool {
        self.inner.draining.load(Ordering::Acquire)
    }

    /// Returns true if the calling thread is the one draining, i.e. this is
    /// called from inside a running task.
    pub fn is_draining_on_current_thread(&self) -> bool {
        *self.inner.driver.lock() == Some(thread::current().id())
    }

    /// Drops every queued task and every task enqueued from now on.
    pub(crate) fn close(&self) {
        let abandoned = {
            let mut pending = self.inner.pending.lock();
            self.inner.closed.store(true, Ordering::Release);
            std::mem::take(&mut *pending)
        };
        debug!(abandoned = abandoned.len(), "task queue closed");
        // Dropping tasks runs user code; the lock is already released.
        drop(abandoned);
    }

    /// Runs tasks until the queue is empty, including tasks enqueued by the
    /// tasks themselves. Returns the number of tasks executed.
    pub fn drain(&self) -> usize {
        self.drain_at_most(None)
    }

    /// Like [`drain`](Self::drain) but stops after `limit` tasks, leaving
    /// the rest queued.
    pub fn drain_at_most(&self, limit: Option<usize>) -> usize {
        let within_limit = |ran: usize| limit.map_or(true, |limit| ran < limit);
        let mut ran = 0;

        loop {
            if self.inner.draining.swap(true, Ordering::AcqRel) {
                trace!("drain requested while draining, ignored");
                return ran;
            }
            {
                let _guard = DrainGuard::enter(&self.inner);
                while within_limit(ran) {
                    let next = self.inner.pending.lock().pop_front();
                    let Some(task) = next else {
                        break;
                    };
                    ran += 1;
                    self.run_task(task);
                }
            }

            // Another thread may have enqueued between the last pop and the
            // flag being cleared; nobody else would pick that task up.
            if self.is_empty() || !within_limit(ran) {
                break;
            }
        }

        debug!(ran, remaining = self.len(), "task queue drained");
        ran
    }

    fn run_task(&self, task: Task) {
        if self.inner.catch_panics {
            if let Err(panic) = panic::catch_unwind(AssertUnwindSafe(|| task.run())) {
                let reason = Reason::from_panic(panic);
                error!(%reason, "task panicked");
            }
        } else {
            task.run();
        }
    }
}

impl Default for TaskQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for TaskQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskQueue")
            .field("len", &self.len())
            .field("draining", &self.is_draining())
            .finish()
    }
}

/// Clears the draining state even when a task unwinds.
struct DrainGuard<'a>(&'a QueueInner);

impl<'a> DrainGuard<'a> {
    fn enter(inner: &'a QueueInner) -> Self {
        *inner.driver.lock() = Some(thread::current().id());
        Self(inner)
    }
}

impl Drop for DrainGuard<'_> {
    fn drop(&mut self) {
        *self.0.driver.lock() = None;
        self.0.draining.store(false, Ordering::Release);
    }
}
