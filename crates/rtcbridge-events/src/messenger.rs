use std::fmt;
use std::sync::mpsc;
use std::sync::{Arc, Mutex, PoisonError};

use serde::{Deserialize, Serialize};

use crate::event::BridgeEvent;

/// The host's asynchronous delivery mechanism.
///
/// `deliver` is called from transport threads and must not block on the
/// consumer; implementations queue and return.
pub trait Messenger: Send + Sync {
    fn deliver(&self, channel: &str, event: BridgeEvent);
}

/// An event together with the name of the channel it was published on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventEnvelope {
    pub channel: String,
    pub event: BridgeEvent,
}

/// A named endpoint on a [`Messenger`].
#[derive(Clone)]
pub struct EventChannel {
    name: String,
    messenger: Arc<dyn Messenger>,
}

impl EventChannel {
    pub fn new(messenger: Arc<dyn Messenger>, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            messenger,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn publish(&self, event: BridgeEvent) {
        tracing::trace!(channel = %self.name, event = event.name(), "publishing event");
        self.messenger.deliver(&self.name, event);
    }
}

impl fmt::Debug for EventChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventChannel")
            .field("name", &self.name)
            .finish()
    }
}

/// Endpoint name for one data channel's events.
pub fn data_channel_event_channel(prefix: &str, connection_id: &str, token: &str) -> String {
    format!("{prefix}/dataChannelEvent{connection_id}{token}")
}

/// Endpoint name for one renderer's events.
pub fn texture_event_channel(prefix: &str, texture_id: i64) -> String {
    format!("{prefix}/Texture{texture_id}")
}

/// Keeps every delivered event in memory.
#[derive(Default)]
pub struct RecordingMessenger {
    events: Mutex<Vec<EventEnvelope>>,
}

impl RecordingMessenger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything delivered so far.
    pub fn events(&self) -> Vec<EventEnvelope> {
        self.lock().clone()
    }

    /// Events delivered on one channel, in order.
    pub fn events_on(&self, channel: &str) -> Vec<BridgeEvent> {
        self.lock()
            .iter()
            .filter(|envelope| envelope.channel == channel)
            .map(|envelope| envelope.event.clone())
            .collect()
    }

    /// Drain the recorded events.
    pub fn take(&self) -> Vec<EventEnvelope> {
        std::mem::take(&mut *self.lock())
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<EventEnvelope>> {
        self.events.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Messenger for RecordingMessenger {
    fn deliver(&self, channel: &str, event: BridgeEvent) {
        self.lock().push(EventEnvelope {
            channel: channel.to_string(),
            event,
        });
    }
}

/// Forwards events over a std channel to a consumer thread.
pub struct ChannelMessenger {
    tx: mpsc::Sender<EventEnvelope>,
}

impl ChannelMessenger {
    pub fn new() -> (Self, mpsc::Receiver<EventEnvelope>) {
        let (tx, rx) = mpsc::channel();
        (Self { tx }, rx)
    }
}

impl Messenger for ChannelMessenger {
    fn deliver(&self, channel: &str, event: BridgeEvent) {
        let envelope = EventEnvelope {
            channel: channel.to_string(),
            event,
        };
        if self.tx.send(envelope).is_err() {
            tracing::debug!(channel, "event receiver dropped; discarding event");
        }
    }
}
