//! Deferred values and the queue that drives them.
//!
//! This crate provides the promise half of the notification core:
//! - A FIFO task queue that defers every continuation to a later turn
//! - [`Promise`] - a single-resolution value with chained continuations
//! - Unhandled rejection reporting through a replaceable hook
//!
//! # Overview
//!
//! - [`Runtime`] - Owns the queue and the rejection tracker; creates promises
//! - [`Promise`] - `then` / `catch` / `finally` chaining
//! - [`Step`] - Explicit "value or promise to adopt" result of a continuation
//! - [`TaskQueue`] - The FIFO queue of deferred callbacks
//!
//! # Scheduling model
//!
//! Everything runs on the thread that calls [`Runtime::run_until_idle`].
//! Continuations never run inside the call that settles a promise or attaches
//! the continuation; they wait in the queue until the host drains it.
//!
//! # Examples
//!
//! ```
//! use async_runtime::{PromiseState, Runtime};
//!
//! let rt = Runtime::new();
//!
//! let greeting = rt
//!     .new_promise::<String, _>(|resolver| resolver.reject("bad"))
//!     .catch(|reason| Ok(format!("{}!", reason.message())))
//!     .then(|text| Ok(text.len()));
//!
//! rt.run_until_idle();
//! assert_eq!(greeting.state(), PromiseState::Fulfilled);
//! assert_eq!(greeting.value(), Some(4));
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

mod combinators;
pub mod config;
pub mod promise;
mod rejection;
pub mod runtime;
pub mod task_queue;

// Re-export main types at crate root
pub use config::{ConfigError, RuntimeConfig};
pub use promise::{Promise, PromiseId, PromiseState, Resolver, Step};
pub use runtime::{Callback, RunReport, Runtime};
pub use task_queue::{Task, TaskQueue};
