//! Promise implementation: a single-resolution container with continuations.
//!
//! A [`Promise`] starts `Pending` and settles exactly once, to `Fulfilled`
//! with a value or `Rejected` with a [`Reason`]. Continuations registered
//! while pending are stored and handed to the task queue at settlement;
//! continuations registered after settlement go to the task queue straight
//! away. Either way they never run inside the call that registered them.

use crate::rejection::Tracked;
use crate::runtime::RuntimeInner;
use crate::task_queue::Task;
use core_types::Reason;
use parking_lot::Mutex;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tracing::trace;

/// The state of a Promise.
///
/// Once settled (Fulfilled or Rejected), a Promise cannot change state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PromiseState {
    /// The initial state; the promise is neither fulfilled nor rejected.
    Pending,
    /// The promise has been resolved with a value.
    Fulfilled,
    /// The promise has been rejected with a reason.
    Rejected,
}

/// Process-unique identity of a promise, used when reporting rejections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PromiseId(u64);

impl PromiseId {
    fn next() -> Self {
        static NEXT_ID: AtomicU64 = AtomicU64::new(1);
        PromiseId(NEXT_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Returns the raw numeric id.
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for PromiseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "promise#{}", self.0)
    }
}

/// What a continuation produces: a plain value, or another promise whose
/// outcome the dependent promise should take over.
///
/// This tag replaces probing a returned value for a `then` method: the
/// continuation states explicitly whether it is handing back a value or a
/// promise to flatten into.
pub enum Step<U> {
    /// Fulfill the dependent promise with this value.
    Value(U),
    /// Settle the dependent promise the same way this promise settles.
    Adopt(Promise<U>),
}

impl<U> From<Promise<U>> for Step<U> {
    fn from(promise: Promise<U>) -> Self {
        Step::Adopt(promise)
    }
}

impl<U> fmt::Debug for Step<U> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Step::Value(_) => write!(f, "Step::Value(..)"),
            Step::Adopt(p) => write!(f, "Step::Adopt({})", p.id()),
        }
    }
}

/// A continuation waiting for a promise to settle.
///
/// The handler pair and the dependent promise are captured inside the
/// closure, so one list can hold continuations producing different types.
pub(crate) type Reaction<T> = Box<dyn FnOnce(Result<T, Reason>) + Send>;

enum Slot<T> {
    Pending(Vec<Reaction<T>>),
    Fulfilled(T),
    Rejected(Reason),
}

struct Cell<T> {
    slot: Slot<T>,
    /// Set by the first resolve/reject/adopt; later resolver calls are no-ops.
    locked: bool,
    /// A continuation has been attached at some point.
    handled: bool,
    /// The rejection already went to the unhandled-rejection hook.
    reported: bool,
}

pub(crate) struct Shared<T> {
    id: PromiseId,
    cell: Mutex<Cell<T>>,
    runtime: Arc<RuntimeInner>,
}

/// A deferred single value.
///
/// `Promise` is a handle; clones refer to the same underlying promise.
/// Promises are created through a [`Runtime`](crate::Runtime) and chained
/// with [`then`](Promise::then), [`catch`](Promise::catch) and
/// [`finally`](Promise::finally).
///
/// # Examples
///
/// ```
/// use async_runtime::{PromiseState, Runtime};
///
/// let rt = Runtime::new();
/// let promise = rt.new_promise(|resolver| resolver.resolve(5));
/// let next = promise.then(|x| Ok(x + 1));
///
/// assert_eq!(next.state(), PromiseState::Pending);
/// rt.run_until_idle();
/// assert_eq!(next.value(), Some(6));
/// ```
pub struct Promise<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Clone for Promise<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T> Promise<T> {
    /// The promise's identity.
    pub fn id(&self) -> PromiseId {
        self.shared.id
    }

    /// Returns true if both handles refer to the same promise.
    pub fn ptr_eq(&self, other: &Promise<T>) -> bool {
        Arc::ptr_eq(&self.shared, &other.shared)
    }

    pub(crate) fn runtime(&self) -> &Arc<RuntimeInner> {
        &self.shared.runtime
    }

    /// The current state.
    pub fn state(&self) -> PromiseState {
        match self.shared.cell.lock().slot {
            Slot::Pending(_) => PromiseState::Pending,
            Slot::Fulfilled(_) => PromiseState::Fulfilled,
            Slot::Rejected(_) => PromiseState::Rejected,
        }
    }

    /// Returns true while the promise has not settled.
    pub fn is_pending(&self) -> bool {
        self.state() == PromiseState::Pending
    }

    /// Returns the rejection reason, if rejected.
    pub fn reason(&self) -> Option<Reason> {
        match &self.shared.cell.lock().slot {
            Slot::Rejected(reason) => Some(reason.clone()),
            _ => None,
        }
    }
}

impl<T: Clone + Send + 'static> Promise<T> {
    pub(crate) fn pending(runtime: &Arc<RuntimeInner>) -> Self {
        Self {
            shared: Arc::new(Shared {
                id: PromiseId::next(),
                cell: Mutex::new(Cell {
                    slot: Slot::Pending(Vec::new()),
                    locked: false,
                    handled: false,
                    reported: false,
                }),
                runtime: Arc::clone(runtime),
            }),
        }
    }

    /// Returns the fulfillment value, if fulfilled.
    pub fn value(&self) -> Option<T> {
        match &self.shared.cell.lock().slot {
            Slot::Fulfilled(value) => Some(value.clone()),
            _ => None,
        }
    }

    /// Returns the settled outcome, or `None` while pending.
    pub fn outcome(&self) -> Option<Result<T, Reason>> {
        match &self.shared.cell.lock().slot {
            Slot::Pending(_) => None,
            Slot::Fulfilled(value) => Some(Ok(value.clone())),
            Slot::Rejected(reason) => Some(Err(reason.clone())),
        }
    }

    /// Resolver-side settlement: only the first resolver call counts.
    fn settle_once(&self, outcome: Result<T, Reason>) {
        if !self.lock_resolution() {
            return;
        }
        self.complete(outcome);
    }

    fn adopt_once(&self, source: Promise<T>) {
        if !self.lock_resolution() {
            return;
        }
        self.follow(source);
    }

    fn lock_resolution(&self) -> bool {
        let mut cell = self.shared.cell.lock();
        if cell.locked {
            trace!(promise = %self.id(), "settlement ignored, already resolved");
            return false;
        }
        cell.locked = true;
        true
    }

    /// Settles the promise if it is still pending and schedules every stored
    /// continuation, in registration order.
    pub(crate) fn complete(&self, outcome: Result<T, Reason>) {
        let (reactions, unhandled) = {
            let mut cell = self.shared.cell.lock();
            let reactions = match &mut cell.slot {
                Slot::Pending(reactions) => std::mem::take(reactions),
                _ => {
                    trace!(promise = %self.id(), "settlement ignored, already settled");
                    return;
                }
            };
            cell.locked = true;
            cell.slot = match &outcome {
                Ok(value) => Slot::Fulfilled(value.clone()),
                Err(reason) => Slot::Rejected(reason.clone()),
            };
            (reactions, outcome.is_err() && !cell.handled)
        };

        trace!(
            promise = %self.id(),
            fulfilled = outcome.is_ok(),
            continuations = reactions.len(),
            "promise settled"
        );

        if unhandled {
            let weak: Weak<dyn Tracked> = Arc::downgrade(&self.shared) as Weak<dyn Tracked>;
            self.runtime().tracker.track(weak);
        }

        for reaction in reactions {
            self.schedule(reaction, outcome.clone());
        }
    }

    /// Settles according to a continuation's result.
    pub(crate) fn complete_step(&self, step: Result<Step<T>, Reason>) {
        match step {
            Ok(Step::Value(value)) => self.complete(Ok(value)),
            Ok(Step::Adopt(source)) => self.follow(source),
            Err(reason) => self.complete(Err(reason)),
        }
    }

    /// Makes this promise settle the way `source` settles.
    pub(crate) fn follow(&self, source: Promise<T>) {
        if source.ptr_eq(self) {
            let reason = Reason::type_error(format!("chaining cycle detected for {}", self.id()));
            self.complete(Err(reason));
            return;
        }
        let target = self.clone();
        source.subscribe(Box::new(move |outcome| target.complete(outcome)));
    }

    /// Registers a continuation. Stored while pending, scheduled at once if
    /// already settled.
    pub(crate) fn subscribe(&self, reaction: Reaction<T>) {
        let outcome = {
            let mut cell = self.shared.cell.lock();
            cell.handled = true;
            match &mut cell.slot {
                Slot::Pending(reactions) => {
                    reactions.push(reaction);
                    return;
                }
                Slot::Fulfilled(value) => Ok(value.clone()),
                Slot::Rejected(reason) => Err(reason.clone()),
            }
        };
        self.schedule(reaction, outcome);
    }

    fn schedule(&self, reaction: Reaction<T>, outcome: Result<T, Reason>) {
        self.runtime()
            .queue
            .enqueue(Task::new(move || reaction(outcome)));
    }
}

impl<T> fmt::Debug for Promise<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Promise")
            .field("id", &self.id())
            .field("state", &self.state())
            .finish()
    }
}

impl<T: Send> Tracked for Shared<T> {
    fn id(&self) -> PromiseId {
        self.id
    }

    fn take_unhandled(&self) -> Option<Reason> {
        let mut cell = self.cell.lock();
        if cell.handled || cell.reported {
            return None;
        }
        match &cell.slot {
            Slot::Rejected(reason) => {
                let reason = reason.clone();
                cell.reported = true;
                Some(reason)
            }
            _ => None,
        }
    }
}

impl<T> Drop for Shared<T> {
    fn drop(&mut self) {
        if !self.runtime.config.report_unhandled_on_drop {
            return;
        }
        let cell = self.cell.get_mut();
        if cell.handled || cell.reported {
            return;
        }
        if let Slot::Rejected(reason) = &cell.slot {
            cell.reported = true;
            self.runtime.tracker.report(reason, self.id);
        }
    }
}

/// The resolve/reject pair handed to a promise's resolver callback.
///
/// Only the first call to [`resolve`](Resolver::resolve),
/// [`reject`](Resolver::reject), [`settle`](Resolver::settle) or
/// [`adopt`](Resolver::adopt) has any effect; later calls are silently
/// ignored. The resolver may be cloned and moved elsewhere to settle the
/// promise later.
pub struct Resolver<T> {
    promise: Promise<T>,
}

impl<T> Clone for Resolver<T> {
    fn clone(&self) -> Self {
        Self {
            promise: self.promise.clone(),
        }
    }
}

impl<T: Clone + Send + 'static> Resolver<T> {
    pub(crate) fn new(promise: Promise<T>) -> Self {
        Self { promise }
    }

    /// Fulfills the promise with `value`.
    pub fn resolve(&self, value: T) {
        self.promise.settle_once(Ok(value));
    }

    /// Rejects the promise with `reason`.
    pub fn reject(&self, reason: impl Into<Reason>) {
        self.promise.settle_once(Err(reason.into()));
    }

    /// Fulfills or rejects depending on `outcome`.
    pub fn settle(&self, outcome: Result<T, Reason>) {
        self.promise.settle_once(outcome);
    }

    /// Resolves the promise with another promise: it stays pending until
    /// `source` settles and then takes the same outcome.
    pub fn adopt(&self, source: Promise<T>) {
        self.promise.adopt_once(source);
    }

    /// The promise this resolver settles.
    pub fn promise(&self) -> &Promise<T> {
        &self.promise
    }
}

impl<T> fmt::Debug for Resolver<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Resolver").field(&self.promise.id()).finish()
    }
}

/// Runs a user callback, turning a panic into a rejection when
/// `catch_panics` is set.
pub(crate) fn invoke<R>(catch_panics: bool, f: impl FnOnce() -> Result<R, Reason>) -> Result<R, Reason> {
    if catch_panics {
        panic::catch_unwind(AssertUnwindSafe(f)).unwrap_or_else(|panic| Err(Reason::from_panic(panic)))
    } else {
        f()
    }
}
