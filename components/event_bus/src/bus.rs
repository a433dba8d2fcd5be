//! The event bus: a registry of listeners per declared channel.

use crate::channel::{Channel, ChannelInfo};
use crate::error::{BusError, BusResult};
use core_types::Reason;
use parking_lot::{Mutex, RwLock};
use std::any::{type_name, Any};
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, trace, warn};

type ListenerFn<P> = Arc<dyn Fn(&P) -> Result<(), Reason> + Send + Sync>;

/// Subscription ids are unique across every bus in the process, so a
/// handle from one bus never removes a listener from another.
static NEXT_SUBSCRIPTION: AtomicU64 = AtomicU64::new(1);

/// Callback receiving listener failures.
pub type ListenerErrorHandler = Arc<dyn Fn(&ListenerFailure) + Send + Sync>;

/// Handle returned by [`EventBus::on`]; pass it to [`EventBus::off`] to
/// remove the listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Subscription {
    channel: &'static str,
    id: u64,
}

impl Subscription {
    /// The channel the listener is registered on.
    pub fn channel(&self) -> &'static str {
        self.channel
    }

    /// Process-unique listener id.
    pub fn id(&self) -> u64 {
        self.id
    }
}

/// A listener returned an error or panicked during `emit`.
#[derive(Debug, Clone)]
pub struct ListenerFailure {
    /// Channel being dispatched
    pub channel: &'static str,
    /// The failing listener
    pub subscription: Subscription,
    /// What went wrong
    pub reason: Reason,
}

/// Outcome of one `emit` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Dispatch {
    /// Listeners invoked, failed ones included
    pub delivered: usize,
    /// Listeners that returned an error or panicked
    pub failed: usize,
}

struct Entry<P> {
    id: u64,
    once: bool,
    listener: ListenerFn<P>,
}

impl<P> Clone for Entry<P> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            once: self.once,
            listener: Arc::clone(&self.listener),
        }
    }
}

/// Listener list with the payload type erased, so `off` can work from a
/// subscription handle alone.
trait ErasedList: Send + Sync {
    /// Detaches the listener with `id`. The caller drops it once the
    /// registry lock is released, since dropping a listener runs arbitrary
    /// user code.
    fn remove(&mut self, id: u64) -> Option<Box<dyn Any + Send>>;
    fn len(&self) -> usize;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

struct ListenerList<P> {
    entries: Vec<Entry<P>>,
}

impl<P: 'static> ErasedList for ListenerList<P> {
    fn remove(&mut self, id: u64) -> Option<Box<dyn Any + Send>> {
        let index = self.entries.iter().position(|entry| entry.id == id)?;
        let entry = self.entries.remove(index);
        Some(Box::new(entry))
    }

    fn len(&self) -> usize {
        self.entries.len()
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

struct Registry {
    declared: HashMap<&'static str, ChannelInfo>,
    listeners: HashMap<&'static str, Box<dyn ErasedList>>,
}

impl Registry {
    fn check<C: Channel>(&self) -> BusResult<()> {
        match self.declared.get(C::NAME) {
            None => Err(BusError::UndeclaredChannel { channel: C::NAME }),
            Some(info) if !info.accepts::<C>() => Err(mismatch::<C>(info)),
            Some(_) => Ok(()),
        }
    }

    /// The typed listener list for `C`, created on first use.
    fn list_mut<C: Channel>(&mut self) -> BusResult<&mut ListenerList<C::Payload>> {
        self.check::<C>()?;
        let list = self
            .listeners
            .entry(C::NAME)
            .or_insert_with(|| Box::new(ListenerList::<C::Payload> { entries: Vec::new() }));
        list.as_any_mut()
            .downcast_mut::<ListenerList<C::Payload>>()
            .ok_or(BusError::ChannelTypeMismatch {
                channel: C::NAME,
                declared: "<erased listener list>",
                requested: type_name::<C::Payload>(),
            })
    }
}

fn mismatch<C: Channel>(declared: &ChannelInfo) -> BusError {
    BusError::ChannelTypeMismatch {
        channel: C::NAME,
        declared: declared.payload_name,
        requested: type_name::<C::Payload>(),
    }
}

/// Builds an [`EventBus`] with a fixed set of channels.
#[derive(Debug, Default)]
pub struct EventBusBuilder {
    declared: Vec<ChannelInfo>,
}

impl EventBusBuilder {
    /// Declares channel `C`.
    pub fn declare<C: Channel>(mut self, _channel: C) -> Self {
        self.declared.push(ChannelInfo::of::<C>());
        self
    }

    /// Builds the bus. Declaring one name twice with different payload
    /// types is a [`BusError::ChannelTypeMismatch`].
    pub fn build(self) -> BusResult<EventBus> {
        let mut declared: HashMap<&'static str, ChannelInfo> = HashMap::new();
        for info in self.declared {
            if let Some(existing) = declared.get(info.name) {
                if existing.payload != info.payload {
                    return Err(BusError::ChannelTypeMismatch {
                        channel: info.name,
                        declared: existing.payload_name,
                        requested: info.payload_name,
                    });
                }
                continue;
            }
            declared.insert(info.name, info);
        }

        debug!(channels = declared.len(), "event bus built");
        let noop: ListenerErrorHandler = Arc::new(|_: &ListenerFailure| {});
        Ok(EventBus {
            registry: Mutex::new(Registry {
                declared,
                listeners: HashMap::new(),
            }),
            error_handler: RwLock::new(noop),
        })
    }
}

/// A publish/subscribe dispatcher over statically typed channels.
///
/// `emit` runs listeners synchronously on the calling thread, in
/// registration order, against a snapshot of the channel's listener list:
/// listeners added during a dispatch miss that event, listeners removed
/// during a dispatch still receive it. A listener that fails (returns `Err`
/// or panics) is reported and the remaining listeners still run.
///
/// # Examples
///
/// ```
/// use event_bus::{channels, EventBus};
/// use std::sync::{Arc, Mutex};
///
/// channels! {
///     pub Ready: () = "ready";
/// }
///
/// let bus = EventBus::builder().declare(Ready).build().unwrap();
/// let log = Arc::new(Mutex::new(Vec::new()));
///
/// let l = log.clone();
/// bus.on(Ready, move |_| { l.lock().unwrap().push("fn1"); Ok(()) }).unwrap();
/// let l = log.clone();
/// bus.on(Ready, move |_| { l.lock().unwrap().push("fn2"); Ok(()) }).unwrap();
///
/// let dispatch = bus.emit(Ready, ()).unwrap();
/// assert_eq!(dispatch.delivered, 2);
/// assert_eq!(*log.lock().unwrap(), vec!["fn1", "fn2"]);
/// ```
pub struct EventBus {
    registry: Mutex<Registry>,
    error_handler: RwLock<ListenerErrorHandler>,
}

impl EventBus {
    /// Starts declaring the bus's channels.
    pub fn builder() -> EventBusBuilder {
        EventBusBuilder::default()
    }

    /// Appends `listener` to `channel`. Registering the same closure twice
    /// keeps both registrations.
    pub fn on<C, F>(&self, channel: C, listener: F) -> BusResult<Subscription>
    where
        C: Channel,
        F: Fn(&C::Payload) -> Result<(), Reason> + Send + Sync + 'static,
    {
        self.register(channel, Arc::new(listener), false)
    }

    /// Like [`on`](Self::on), but the listener is removed before its first
    /// invocation.
    pub fn once<C, F>(&self, channel: C, listener: F) -> BusResult<Subscription>
    where
        C: Channel,
        F: Fn(&C::Payload) -> Result<(), Reason> + Send + Sync + 'static,
    {
        self.register(channel, Arc::new(listener), true)
    }

    fn register<C: Channel>(
        &self,
        _channel: C,
        listener: ListenerFn<C::Payload>,
        once: bool,
    ) -> BusResult<Subscription> {
        let mut registry = self.registry.lock();
        let list = registry.list_mut::<C>()?;
        let id = NEXT_SUBSCRIPTION.fetch_add(1, Ordering::Relaxed);
        list.entries.push(Entry { id, once, listener });

        debug!(channel = C::NAME, id, once, "listener registered");
        Ok(Subscription {
            channel: C::NAME,
            id,
        })
    }

    /// Removes a listener. Returns false if it was already gone.
    ///
    /// Safe to call from inside a listener; a dispatch already in progress
    /// still delivers to the removed listener.
    pub fn off(&self, subscription: Subscription) -> bool {
        let detached = self
            .registry
            .lock()
            .listeners
            .get_mut(subscription.channel)
            .and_then(|list| list.remove(subscription.id));
        let removed = detached.is_some();

        debug!(channel = subscription.channel, id = subscription.id, removed, "listener removed");
        drop(detached);
        removed
    }

    /// Dispatches `payload` to every listener currently on `channel`.
    pub fn emit<C: Channel>(&self, _channel: C, payload: C::Payload) -> BusResult<Dispatch> {
        let snapshot = {
            let mut registry = self.registry.lock();
            let list = registry.list_mut::<C>()?;
            let snapshot = list.entries.clone();
            list.entries.retain(|entry| !entry.once);
            snapshot
        };

        let mut dispatch = Dispatch::default();
        for entry in snapshot {
            let listener = &entry.listener;
            let result = panic::catch_unwind(AssertUnwindSafe(|| listener(&payload)))
                .unwrap_or_else(|panic| Err(Reason::from_panic(panic)));
            dispatch.delivered += 1;

            if let Err(reason) = result {
                dispatch.failed += 1;
                self.report(ListenerFailure {
                    channel: C::NAME,
                    subscription: Subscription {
                        channel: C::NAME,
                        id: entry.id,
                    },
                    reason,
                });
            }
        }

        trace!(
            channel = C::NAME,
            delivered = dispatch.delivered,
            failed = dispatch.failed,
            "event dispatched"
        );
        Ok(dispatch)
    }

    fn report(&self, failure: ListenerFailure) {
        warn!(
            channel = failure.channel,
            id = failure.subscription.id,
            reason = %failure.reason,
            "event listener failed"
        );
        let handler = Arc::clone(&self.error_handler.read());
        handler(&failure);
    }

    /// Replaces the listener-failure handler. The default does nothing
    /// beyond the `warn` log line every failure produces.
    pub fn on_listener_error<H>(&self, handler: H)
    where
        H: Fn(&ListenerFailure) + Send + Sync + 'static,
    {
        let previous = std::mem::replace(&mut *self.error_handler.write(), Arc::new(handler));
        drop(previous);
    }

    /// Number of listeners currently registered on `channel`.
    pub fn listener_count<C: Channel>(&self, _channel: C) -> BusResult<usize> {
        let registry = self.registry.lock();
        registry.check::<C>()?;
        Ok(registry.listeners.get(C::NAME).map_or(0, |list| list.len()))
    }

    /// Returns true if `channel` is declared with a matching payload type.
    pub fn is_declared<C: Channel>(&self, _channel: C) -> bool {
        self.registry.lock().check::<C>().is_ok()
    }

    /// Names of all declared channels, sorted.
    pub fn channels(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.registry.lock().declared.keys().copied().collect();
        names.sort_unstable();
        names
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("channels", &self.channels())
            .finish()
    }
}
