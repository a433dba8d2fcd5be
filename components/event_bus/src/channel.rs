//! Channel declarations.
//!
//! A channel is a zero-sized marker type that names an event category and
//! fixes the type of value carried on it. Because the payload type is an
//! associated type, `on` and `emit` cannot be called with the wrong payload
//! for a channel; the compiler rejects it.

use std::any::{type_name, TypeId};

/// A statically typed event channel.
///
/// Implement it by hand or declare several channels at once with
/// [`channels!`](crate::channels).
pub trait Channel: Copy + Send + Sync + 'static {
    /// The value carried by events on this channel.
    type Payload: 'static;

    /// The channel's name. Names are the keys of the bus registry.
    const NAME: &'static str;
}

/// Everything the bus records about a declared channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelInfo {
    /// Channel name
    pub name: &'static str,
    /// Identity of the payload type
    pub payload: TypeId,
    /// Readable name of the payload type, for error messages
    pub payload_name: &'static str,
}

impl ChannelInfo {
    /// Describes channel `C`.
    pub fn of<C: Channel>() -> Self {
        Self {
            name: C::NAME,
            payload: TypeId::of::<C::Payload>(),
            payload_name: type_name::<C::Payload>(),
        }
    }

    /// Returns true if `C` matches this declaration's payload type.
    pub fn accepts<C: Channel>(&self) -> bool {
        self.payload == TypeId::of::<C::Payload>()
    }
}

/// Declares channel marker types and their payloads.
///
/// ```
/// use event_bus::{channels, Channel};
///
/// #[derive(Debug, Clone, PartialEq)]
/// pub struct Reconnect {
///     pub attempt: u32,
///     pub delay_ms: u64,
/// }
///
/// channels! {
///     /// The client finished connecting.
///     pub Ready: () = "ready";
///     /// The client is about to retry its connection.
///     pub Reconnecting: Reconnect = "reconnecting";
/// }
///
/// assert_eq!(Ready::NAME, "ready");
/// assert_eq!(<Reconnecting as Channel>::NAME, "reconnecting");
/// ```
#[macro_export]
macro_rules! channels {
    ($( $(#[$meta:meta])* $vis:vis $name:ident : $payload:ty = $label:literal; )*) => {
        $(
            $(#[$meta])*
            #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
            $vis struct $name;

            impl $crate::Channel for $name {
                type Payload = $payload;
                const NAME: &'static str = $label;
            }
        )*
    };
}
