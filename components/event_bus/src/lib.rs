//! Statically typed publish/subscribe.
//!
//! This crate provides the event half of the notification core:
//! - [`Channel`] - a marker type naming an event and fixing its payload type
//! - [`EventBus`] - registers listeners per channel and dispatches to them
//! - [`BusError`] - misuse of a bus (undeclared or mistyped channels)
//!
//! Dispatch is synchronous: [`EventBus::emit`] returns only after every
//! listener has run. A failing listener never stops the others; failures go
//! to the `warn` log and the hook set with [`EventBus::on_listener_error`].
//!
//! # Examples
//!
//! ```
//! use core_types::Reason;
//! use event_bus::{channels, EventBus};
//! use std::sync::{Arc, Mutex};
//!
//! #[derive(Debug, Clone, PartialEq)]
//! pub struct Reconnect {
//!     pub attempt: u32,
//!     pub delay_ms: u64,
//! }
//!
//! channels! {
//!     pub Ready: () = "ready";
//!     pub Failed: Reason = "error";
//!     pub Reconnecting: Reconnect = "reconnecting";
//! }
//!
//! let bus = EventBus::builder()
//!     .declare(Ready)
//!     .declare(Failed)
//!     .declare(Reconnecting)
//!     .build()
//!     .unwrap();
//!
//! let attempts = Arc::new(Mutex::new(Vec::new()));
//! let a = attempts.clone();
//! bus.on(Reconnecting, move |event| {
//!     a.lock().unwrap().push(event.attempt);
//!     Ok(())
//! })
//! .unwrap();
//!
//! bus.emit(Reconnecting, Reconnect { attempt: 1, delay_ms: 100 }).unwrap();
//! bus.emit(Reconnecting, Reconnect { attempt: 2, delay_ms: 200 }).unwrap();
//! bus.emit(Ready, ()).unwrap();
//!
//! assert_eq!(*attempts.lock().unwrap(), vec![1, 2]);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod bus;
pub mod channel;
pub mod error;

// Re-export main types at crate root
pub use bus::{Dispatch, EventBus, EventBusBuilder, ListenerErrorHandler, ListenerFailure, Subscription};
pub use channel::{Channel, ChannelInfo};
pub use error::{BusError, BusResult};
