//! Unhandled rejection tracking.
//!
//! A promise that rejects while nothing is attached to it is remembered
//! here. When the runtime goes idle, every remembered promise that still has
//! no continuation is reported through the runtime's rejection hook.
//! Reporting never aborts anything; the hook decides what to do.

use crate::promise::PromiseId;
use core_types::Reason;
use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use tracing::{trace, warn};

/// Tracked list length that triggers pruning of already dropped promises.
const PRUNE_THRESHOLD: usize = 256;

/// Callback receiving unhandled rejections.
pub(crate) type RejectionHandler = Arc<dyn Fn(&Reason, PromiseId) + Send + Sync>;

/// Type-erased view of a rejected promise.
pub(crate) trait Tracked: Send + Sync {
    fn id(&self) -> PromiseId;

    /// Returns the reason if the promise is rejected, has no continuation
    /// and was not reported yet. Marks it as reported.
    fn take_unhandled(&self) -> Option<Reason>;
}

struct Candidates {
    promises: Vec<Weak<dyn Tracked>>,
    /// Length at which `track` next drops dead entries.
    prune_at: usize,
}

pub(crate) struct RejectionTracker {
    handler: RwLock<RejectionHandler>,
    candidates: Mutex<Candidates>,
    reported: AtomicUsize,
}

impl RejectionTracker {
    /// Creates a tracker whose handler does nothing.
    pub(crate) fn new() -> Self {
        let noop: RejectionHandler = Arc::new(|_: &Reason, _: PromiseId| {});
        Self {
            handler: RwLock::new(noop),
            candidates: Mutex::new(Candidates {
                promises: Vec::new(),
                prune_at: PRUNE_THRESHOLD,
            }),
            reported: AtomicUsize::new(0),
        }
    }

    /// Installs `handler`. The previous handler is dropped after the lock
    /// is released; dropping it may report a rejection itself.
    pub(crate) fn set_handler(&self, handler: RejectionHandler) {
        let previous = std::mem::replace(&mut *self.handler.write(), handler);
        drop(previous);
    }

    /// Remembers a promise that rejected with nothing attached.
    ///
    /// Only `check` empties the list, so a host that never reaches idle
    /// would grow it forever; dropped promises are pruned here instead.
    pub(crate) fn track(&self, promise: Weak<dyn Tracked>) {
        let mut candidates = self.candidates.lock();
        candidates.promises.push(promise);
        if candidates.promises.len() >= candidates.prune_at {
            let before = candidates.promises.len();
            candidates.promises.retain(|weak| weak.strong_count() > 0);
            let after = candidates.promises.len();
            candidates.prune_at = (after * 2).max(PRUNE_THRESHOLD);
            trace!(before, after, "pruned dropped rejection candidates");
        }
    }

    /// Reports every tracked promise that is still unhandled and forgets
    /// the rest. Returns the number reported.
    pub(crate) fn check(&self) -> usize {
        let candidates = {
            let mut candidates = self.candidates.lock();
            candidates.prune_at = PRUNE_THRESHOLD;
            std::mem::take(&mut candidates.promises)
        };
        let mut count = 0;
        for candidate in candidates {
            let Some(promise) = candidate.upgrade() else {
                continue;
            };
            if let Some(reason) = promise.take_unhandled() {
                self.report(&reason, promise.id());
                count += 1;
            }
        }
        count
    }

    pub(crate) fn report(&self, reason: &Reason, promise: PromiseId) {
        warn!(%promise, %reason, "unhandled promise rejection");
        self.reported.fetch_add(1, Ordering::Relaxed);
        let handler = Arc::clone(&self.handler.read());
        handler(reason, promise);
    }

    pub(crate) fn reported(&self) -> usize {
        self.reported.load(Ordering::Relaxed)
    }

    pub(crate) fn tracked(&self) -> usize {
        self.candidates.lock().promises.len()
    }
}
