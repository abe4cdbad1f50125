//! Event bus - per-kind listeners plus a broadcast stream of every event

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::broadcast;
use tracing::{error, trace};

use crate::error::Result;
use crate::event::{Event, EventKind};

/// Capacity of the broadcast stream returned by [`EventBus::subscribe`]
const STREAM_CAPACITY: usize = 1024;

/// Callback invoked for each matching event
pub type Listener = Arc<dyn Fn(&Event) + Send + Sync>;

/// Handle returned on registration, used to remove the listener again
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// Dispatches events to the listeners registered for their kind
///
/// Listeners for one kind run in registration order. There is no ordering
/// between listeners of different kinds beyond the order events are emitted.
pub struct EventBus {
    listeners: RwLock<HashMap<EventKind, Vec<(ListenerId, Listener)>>>,
    next_id: AtomicU64,
    stream: broadcast::Sender<Event>,
}

impl EventBus {
    pub fn new() -> Self {
        let (stream, _) = broadcast::channel(STREAM_CAPACITY);

        Self {
            listeners: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(0),
            stream,
        }
    }

    /// Register a listener for one event kind
    pub fn on<F>(&self, kind: EventKind, listener: F) -> ListenerId
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.listeners
            .write()
            .entry(kind)
            .or_default()
            .push((id, Arc::new(listener)));
        id
    }

    /// Register a listener by wire name, rejecting names outside the contract
    pub fn on_named<F>(&self, name: &str, listener: F) -> Result<ListenerId>
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        let kind: EventKind = name.parse()?;
        Ok(self.on(kind, listener))
    }

    /// Remove a listener. Returns false if it was not registered.
    pub fn off(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.write();
        for entries in listeners.values_mut() {
            if let Some(pos) = entries.iter().position(|(lid, _)| *lid == id) {
                entries.remove(pos);
                return true;
            }
        }
        false
    }

    pub fn listener_count(&self, kind: EventKind) -> usize {
        self.listeners.read().get(&kind).map_or(0, Vec::len)
    }

    /// Stream of every emitted event, independent of registered listeners
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.stream.subscribe()
    }

    /// Deliver an event to its listeners and the broadcast stream.
    ///
    /// A panicking listener is logged and skipped; the remaining listeners
    /// still run. Returns the number of listeners invoked.
    pub fn emit(&self, event: Event) -> usize {
        let kind = event.kind();

        // Snapshot so listeners may call on/off without deadlocking
        let snapshot: Vec<Listener> = self
            .listeners
            .read()
            .get(&kind)
            .map(|entries| entries.iter().map(|(_, l)| l.clone()).collect())
            .unwrap_or_default();

        trace!(kind = %kind, listeners = snapshot.len(), "Emitting event");

        for listener in &snapshot {
            if catch_unwind(AssertUnwindSafe(|| listener(&event))).is_err() {
                error!(kind = %kind, "Event listener panicked");
            }
        }

        let _ = self.stream.send(event);
        snapshot.len()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
