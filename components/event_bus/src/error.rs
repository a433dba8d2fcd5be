//! Event bus configuration errors.

use thiserror::Error;

/// Misuse of a bus: a channel that was never declared, or a channel whose
/// payload type disagrees with its declaration.
///
/// These are returned straight to the caller of `on`, `once`, `emit` or
/// `build`; they are never routed to the listener-error hook.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BusError {
    /// The channel was not declared when the bus was built.
    #[error("channel `{channel}` is not declared on this bus")]
    UndeclaredChannel {
        /// Name of the offending channel
        channel: &'static str,
    },

    /// The channel name is declared with a different payload type.
    #[error("channel `{channel}` carries `{declared}`, not `{requested}`")]
    ChannelTypeMismatch {
        /// Name of the offending channel
        channel: &'static str,
        /// Payload type recorded by the declaration
        declared: &'static str,
        /// Payload type used at the call site
        requested: &'static str,
    },
}

/// Result type for bus operations
pub type BusResult<T> = Result<T, BusError>;
