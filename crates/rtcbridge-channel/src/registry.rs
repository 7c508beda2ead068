use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use rtcbridge_transport::{DataChannel, DataChannelState, ObserverRegistration};
use serde::Serialize;

use crate::observer::ChannelObserver;

/// A live channel and everything scoped to it.
///
/// Field order matters: the observer registration is dropped first so the
/// transport stops calling the observer before the entry goes away.
pub struct ChannelEntry {
    registration: ObserverRegistration,
    observer: Arc<ChannelObserver>,
    token: String,
    connection_id: String,
}

impl ChannelEntry {
    pub fn new(
        token: String,
        connection_id: String,
        registration: ObserverRegistration,
        observer: Arc<ChannelObserver>,
    ) -> Self {
        Self {
            registration,
            observer,
            token,
            connection_id,
        }
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn connection_id(&self) -> &str {
        &self.connection_id
    }

    pub fn channel(&self) -> &Arc<dyn DataChannel> {
        self.registration.channel()
    }

    pub fn observer(&self) -> &Arc<ChannelObserver> {
        &self.observer
    }
}

impl fmt::Debug for ChannelEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChannelEntry")
            .field("token", &self.token)
            .field("connection_id", &self.connection_id)
            .field("registration", &self.registration)
            .finish()
    }
}

/// Point-in-time description of a registered channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelInfo {
    pub correlation_token: String,
    pub connection_id: String,
    pub id: i32,
    pub label: String,
    pub state: DataChannelState,
    pub event_channel: String,
}

/// Token-keyed table of live channels.
///
/// The lock only guards the map. Callers get owned values back and talk to
/// the transport after the guard is released; removed entries are returned
/// so they are dropped (and unregistered) outside the lock too.
#[derive(Default)]
pub struct ChannelRegistry {
    entries: Mutex<HashMap<String, ChannelEntry>>,
}

impl ChannelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert under the entry's token. A token already in use hands the
    /// entry back untouched.
    pub fn insert(&self, entry: ChannelEntry) -> Result<(), ChannelEntry> {
        let mut entries = self.lock();
        if entries.contains_key(entry.token()) {
            return Err(entry);
        }
        entries.insert(entry.token.clone(), entry);
        Ok(())
    }

    pub fn contains(&self, token: &str) -> bool {
        self.lock().contains_key(token)
    }

    pub fn channel(&self, token: &str) -> Option<Arc<dyn DataChannel>> {
        self.lock()
            .get(token)
            .map(|entry| Arc::clone(entry.channel()))
    }

    pub fn remove(&self, token: &str) -> Option<ChannelEntry> {
        self.lock().remove(token)
    }

    /// Remove every entry created on `connection_id`.
    pub fn remove_connection(&self, connection_id: &str) -> Vec<ChannelEntry> {
        let mut entries = self.lock();
        let tokens: Vec<String> = entries
            .values()
            .filter(|entry| entry.connection_id == connection_id)
            .map(|entry| entry.token.clone())
            .collect();
        tokens
            .iter()
            .filter_map(|token| entries.remove(token))
            .collect()
    }

    pub fn info(&self, token: &str) -> Option<ChannelInfo> {
        let (channel, connection_id, event_channel) = {
            let entries = self.lock();
            let entry = entries.get(token)?;
            (
                Arc::clone(entry.channel()),
                entry.connection_id.clone(),
                entry.observer.event_channel().to_string(),
            )
        };
        Some(ChannelInfo {
            correlation_token: token.to_string(),
            connection_id,
            id: channel.id(),
            label: channel.label().to_string(),
            state: channel.state(),
            event_channel,
        })
    }

    /// Tokens currently registered, sorted.
    pub fn tokens(&self) -> Vec<String> {
        let mut tokens: Vec<String> = self.lock().keys().cloned().collect();
        tokens.sort();
        tokens
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, ChannelEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for ChannelRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChannelRegistry")
            .field("len", &self.len())
            .finish()
    }
}
