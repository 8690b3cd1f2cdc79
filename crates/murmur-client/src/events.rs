use tokio::sync::broadcast;
use tracing::trace;

use crate::error::ConnectError;
use crate::transport::TransportError;

const EVENT_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DisconnectKind {
    /// Transport failure, malformed frame, or a Reject after sync.
    Error,
    Kicked,
    Banned,
    /// The application called `disconnect`.
    User,
}

#[derive(Debug, Clone)]
pub struct DisconnectEvent {
    pub kind: DisconnectKind,
    /// Server-supplied text for kicks, bans and rejects.
    pub reason: Option<String>,
    pub cause: Option<TransportError>,
}

#[derive(Debug, Clone)]
pub enum Event {
    Connected { addr: String, session: Option<u32> },
    ConnectFailed { addr: String, error: ConnectError },
    Disconnected(DisconnectEvent),
}

/// Fan-out of connection events. Sending never waits on subscribers; a slow
/// subscriber sees `RecvError::Lagged` instead of stalling the sender.
#[derive(Debug, Clone)]
pub struct EventHub {
    tx: broadcast::Sender<Event>,
}

impl Default for EventHub {
    fn default() -> Self {
        Self::new()
    }
}

impl EventHub {
    pub fn new() -> Self {
        Self::with_capacity(EVENT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }

    pub fn emit(&self, event: Event) {
        if self.tx.send(event).is_err() {
            trace!(target: "murmur::events", "no event subscribers");
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}
