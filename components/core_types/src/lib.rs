//! Core types shared by the asynchronous notification components.
//!
//! This crate provides the value that flows through every failure path of
//! the runtime: promise rejections, errors returned from continuations,
//! caught panics and listener failures on the event bus.
//!
//! # Overview
//!
//! - [`Reason`] - Rejection reason with an optional typed payload
//! - [`ReasonKind`] - Category of a rejection reason
//!
//! # Examples
//!
//! ```
//! use core_types::{Reason, ReasonKind};
//!
//! let reason = Reason::type_error("chaining cycle detected");
//! assert_eq!(reason.kind(), ReasonKind::TypeError);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

mod error;

pub use error::{Reason, ReasonKind};
