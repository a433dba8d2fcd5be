//! Promise chaining.
//!
//! Every combinator returns a new dependent promise and registers one
//! continuation on its source. The continuation always runs from the task
//! queue, never inside the combinator call.
//!
//! Continuations report failure by returning `Err(Reason)`; a panic inside
//! a continuation is converted to a [`ReasonKind::Panic`] rejection when the
//! runtime catches panics.
//!
//! [`ReasonKind::Panic`]: core_types::ReasonKind::Panic

use crate::promise::{invoke, Promise, Step};
use crate::runtime::RuntimeInner;
use core_types::Reason;
use parking_lot::Mutex;
use std::sync::Arc;

impl<T: Clone + Send + 'static> Promise<T> {
    /// Maps the fulfillment value. A rejection passes through unchanged.
    ///
    /// ```
    /// use async_runtime::Runtime;
    ///
    /// let rt = Runtime::new();
    /// let doubled = rt.resolved(21).then(|x| Ok(x * 2));
    /// rt.run_until_idle();
    /// assert_eq!(doubled.value(), Some(42));
    /// ```
    pub fn then<U, F>(&self, on_fulfilled: F) -> Promise<U>
    where
        U: Clone + Send + 'static,
        F: FnOnce(T) -> Result<U, Reason> + Send + 'static,
    {
        self.then_step(move |value| on_fulfilled(value).map(Step::Value))
    }

    /// Like [`then`](Self::then), but the continuation may hand back another
    /// promise to flatten into.
    pub fn then_step<U, F>(&self, on_fulfilled: F) -> Promise<U>
    where
        U: Clone + Send + 'static,
        F: FnOnce(T) -> Result<Step<U>, Reason> + Send + 'static,
    {
        self.then_else_step(on_fulfilled, Err)
    }

    /// Registers handlers for both outcomes; both produce plain values.
    pub fn then_else<U, F, R>(&self, on_fulfilled: F, on_rejected: R) -> Promise<U>
    where
        U: Clone + Send + 'static,
        F: FnOnce(T) -> Result<U, Reason> + Send + 'static,
        R: FnOnce(Reason) -> Result<U, Reason> + Send + 'static,
    {
        self.then_else_step(
            move |value| on_fulfilled(value).map(Step::Value),
            move |reason| on_rejected(reason).map(Step::Value),
        )
    }

    /// The general form every other combinator is built on.
    ///
    /// Exactly one of the two handlers runs, from the task queue, once this
    /// promise settles. The returned promise fulfills with a
    /// [`Step::Value`], follows a [`Step::Adopt`]ed promise, or rejects with
    /// the handler's `Err`.
    pub fn then_else_step<U, F, R>(&self, on_fulfilled: F, on_rejected: R) -> Promise<U>
    where
        U: Clone + Send + 'static,
        F: FnOnce(T) -> Result<Step<U>, Reason> + Send + 'static,
        R: FnOnce(Reason) -> Result<Step<U>, Reason> + Send + 'static,
    {
        let derived = Promise::pending(self.runtime());
        let target = derived.clone();
        let catch_panics = self.runtime().config.catch_panics;

        self.subscribe(Box::new(move |outcome| {
            let step = match outcome {
                Ok(value) => invoke(catch_panics, move || on_fulfilled(value)),
                Err(reason) => invoke(catch_panics, move || on_rejected(reason)),
            };
            target.complete_step(step);
        }));

        derived
    }

    /// Recovers from a rejection. A fulfillment passes through unchanged.
    ///
    /// ```
    /// use async_runtime::Runtime;
    ///
    /// let rt = Runtime::new();
    /// let recovered = rt
    ///     .rejected::<String>("bad")
    ///     .catch(|e| Ok(format!("{}!", e.message())));
    /// rt.run_until_idle();
    /// assert_eq!(recovered.value(), Some("bad!".to_string()));
    /// ```
    pub fn catch<R>(&self, on_rejected: R) -> Promise<T>
    where
        R: FnOnce(Reason) -> Result<T, Reason> + Send + 'static,
    {
        self.catch_step(move |reason| on_rejected(reason).map(Step::Value))
    }

    /// Like [`catch`](Self::catch), but the handler may adopt a promise.
    pub fn catch_step<R>(&self, on_rejected: R) -> Promise<T>
    where
        R: FnOnce(Reason) -> Result<Step<T>, Reason> + Send + 'static,
    {
        self.then_else_step(|value| Ok(Step::Value(value)), on_rejected)
    }

    /// Runs `on_settled` whatever the outcome.
    ///
    /// The returned promise settles exactly like this one, unless
    /// `on_settled` fails, in which case it rejects with that failure.
    pub fn finally<S>(&self, on_settled: S) -> Promise<T>
    where
        S: FnOnce() -> Result<(), Reason> + Send + 'static,
    {
        let derived = Promise::pending(self.runtime());
        let target = derived.clone();
        let catch_panics = self.runtime().config.catch_panics;

        self.subscribe(Box::new(move |outcome| match invoke(catch_panics, on_settled) {
            Ok(()) => target.complete(outcome),
            Err(reason) => target.complete(Err(reason)),
        }));

        derived
    }
}

struct Collected<T> {
    values: Vec<Option<T>>,
    remaining: usize,
}

/// Fulfills with every value, in input order, once all inputs fulfill;
/// rejects with the first rejection.
pub(crate) fn all<T>(runtime: &Arc<RuntimeInner>, promises: Vec<Promise<T>>) -> Promise<Vec<T>>
where
    T: Clone + Send + 'static,
{
    let combined = Promise::pending(runtime);
    if promises.is_empty() {
        combined.complete(Ok(Vec::new()));
        return combined;
    }

    let collected = Arc::new(Mutex::new(Collected {
        values: vec![None; promises.len()],
        remaining: promises.len(),
    }));

    for (index, promise) in promises.into_iter().enumerate() {
        let target = combined.clone();
        let collected = Arc::clone(&collected);
        promise.subscribe(Box::new(move |outcome| match outcome {
            Ok(value) => {
                let finished = {
                    let mut collected = collected.lock();
                    collected.values[index] = Some(value);
                    collected.remaining -= 1;
                    if collected.remaining == 0 {
                        Some(collected.values.drain(..).flatten().collect::<Vec<T>>())
                    } else {
                        None
                    }
                };
                if let Some(values) = finished {
                    target.complete(Ok(values));
                }
            }
            Err(reason) => target.complete(Err(reason)),
        }));
    }

    combined
}

/// Settles like whichever input settles first. With no inputs the result
/// stays pending.
pub(crate) fn race<T>(runtime: &Arc<RuntimeInner>, promises: Vec<Promise<T>>) -> Promise<T>
where
    T: Clone + Send + 'static,
{
    let winner = Promise::pending(runtime);
    for promise in promises {
        let target = winner.clone();
        promise.subscribe(Box::new(move |outcome| target.complete(outcome)));
    }
    winner
}
