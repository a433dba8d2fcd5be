//! Rejection reasons shared by the promise runtime and the event bus.
//!
//! A [`Reason`] is what a promise rejects with and what a failing listener
//! reports. Callers may attach any `'static` value as a payload, so a
//! rejection can carry the original error type rather than just its text.

use std::any::Any;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// The category of a rejection reason.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReasonKind {
    /// Rejection raised by user code (`reject(..)` or an `Err` from a callback)
    Error,
    /// Misuse detected by the runtime, e.g. a promise adopting itself
    TypeError,
    /// A callback panicked and the panic was caught
    Panic,
}

impl fmt::Display for ReasonKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReasonKind::Error => write!(f, "Error"),
            ReasonKind::TypeError => write!(f, "TypeError"),
            ReasonKind::Panic => write!(f, "Panic"),
        }
    }
}

/// Why a promise rejected or a listener failed.
///
/// Reasons are cheap to clone: the optional payload is reference counted,
/// which lets one rejection flow into every continuation of a promise.
///
/// # Examples
///
/// ```
/// use core_types::{Reason, ReasonKind};
///
/// let reason = Reason::new("bad");
/// assert_eq!(reason.kind(), ReasonKind::Error);
/// assert_eq!(reason.message(), "bad");
/// assert_eq!(reason.to_string(), "Error: bad");
/// ```
#[derive(Clone, Error)]
#[error("{kind}: {message}")]
pub struct Reason {
    kind: ReasonKind,
    message: String,
    payload: Option<Arc<dyn Any + Send + Sync>>,
}

impl Reason {
    /// Creates a reason of kind [`ReasonKind::Error`].
    pub fn new(message: impl Into<String>) -> Self {
        Self::with_kind(ReasonKind::Error, message)
    }

    /// Creates a reason of an explicit kind.
    pub fn with_kind(kind: ReasonKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            payload: None,
        }
    }

    /// Creates a [`ReasonKind::TypeError`] reason.
    pub fn type_error(message: impl Into<String>) -> Self {
        Self::with_kind(ReasonKind::TypeError, message)
    }

    /// Creates a reason carrying an arbitrary payload value.
    ///
    /// ```
    /// use core_types::Reason;
    ///
    /// #[derive(Debug, PartialEq)]
    /// struct Reconnect { attempt: u32 }
    ///
    /// let reason = Reason::with_payload("gave up", Reconnect { attempt: 3 });
    /// assert_eq!(reason.payload::<Reconnect>(), Some(&Reconnect { attempt: 3 }));
    /// assert!(reason.payload::<String>().is_none());
    /// ```
    pub fn with_payload<P>(message: impl Into<String>, payload: P) -> Self
    where
        P: Any + Send + Sync,
    {
        Self {
            kind: ReasonKind::Error,
            message: message.into(),
            payload: Some(Arc::new(payload)),
        }
    }

    /// Wraps a standard error, keeping it as the payload.
    pub fn from_error<E>(error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        let message = error.to_string();
        Self::with_payload(message, error)
    }

    /// Converts a caught panic into a [`ReasonKind::Panic`] reason.
    ///
    /// The panic message is recovered when the payload is a `&str` or a
    /// `String`, which covers `panic!` with or without format arguments.
    pub fn from_panic(panic: Box<dyn Any + Send>) -> Self {
        let message = if let Some(s) = panic.downcast_ref::<&'static str>() {
            (*s).to_string()
        } else if let Some(s) = panic.downcast_ref::<String>() {
            s.clone()
        } else {
            "callback panicked".to_string()
        };
        Self::with_kind(ReasonKind::Panic, message)
    }

    /// The reason's category.
    pub fn kind(&self) -> ReasonKind {
        self.kind
    }

    /// The human-readable message.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns the payload if one is attached and has type `P`.
    pub fn payload<P: Any>(&self) -> Option<&P> {
        self.payload.as_deref()?.downcast_ref::<P>()
    }

    /// Returns true if a payload is attached.
    pub fn has_payload(&self) -> bool {
        self.payload.is_some()
    }
}

impl fmt::Debug for Reason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reason")
            .field("kind", &self.kind)
            .field("message", &self.message)
            .field("payload", &self.payload.as_ref().map(|_| "..."))
            .finish()
    }
}

impl PartialEq for Reason {
    fn eq(&self, other: &Self) -> bool {
        let same_payload = match (&self.payload, &other.payload) {
            (None, None) => true,
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            _ => false,
        };
        self.kind == other.kind && self.message == other.message && same_payload
    }
}

impl From<&str> for Reason {
    fn from(message: &str) -> Self {
        Reason::new(message)
    }
}

impl From<String> for Reason {
    fn from(message: String) -> Self {
        Reason::new(message)
    }
}
