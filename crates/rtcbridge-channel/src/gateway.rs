use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use rtcbridge_events::{data_channel_event_channel, EventChannel, MessageKind, Messenger};
use rtcbridge_transport::{DataChannel, ObserverRegistration, PeerConnection};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, trace};
use uuid::Uuid;

use crate::config::GatewayConfig;
use crate::error::{ChannelError, Result};
use crate::observer::ChannelObserver;
use crate::options::{type_name, ChannelOptions};
use crate::registry::{ChannelEntry, ChannelInfo, ChannelRegistry};

/// Outgoing message body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    Bytes(Bytes),
    Text(String),
}

impl Payload {
    /// Accepts a JSON string (text) or an array of byte values (binary).
    pub fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::String(text) => Ok(Payload::Text(text.clone())),
            Value::Array(items) => items
                .iter()
                .map(|item| {
                    item.as_u64()
                        .and_then(|byte| u8::try_from(byte).ok())
                        .ok_or_else(|| {
                            ChannelError::InvalidPayload(format!(
                                "byte array element out of range: {item}"
                            ))
                        })
                })
                .collect::<Result<Vec<u8>>>()
                .map(|bytes| Payload::Bytes(Bytes::from(bytes))),
            other => Err(ChannelError::InvalidPayload(format!(
                "expected a string or byte array, got {}",
                type_name(other)
            ))),
        }
    }
}

impl From<Bytes> for Payload {
    fn from(bytes: Bytes) -> Self {
        Payload::Bytes(bytes)
    }
}

impl From<Vec<u8>> for Payload {
    fn from(bytes: Vec<u8>) -> Self {
        Payload::Bytes(Bytes::from(bytes))
    }
}

impl From<String> for Payload {
    fn from(text: String) -> Self {
        Payload::Text(text)
    }
}

impl From<&str> for Payload {
    fn from(text: &str) -> Self {
        Payload::Text(text.to_string())
    }
}

/// Result of a successful create request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedChannel {
    pub id: i32,
    pub label: String,
    pub correlation_token: String,
    pub event_channel: String,
}

/// Entry point for every data channel request from the host.
pub struct DataChannelGateway {
    config: GatewayConfig,
    messenger: Arc<dyn Messenger>,
    registry: ChannelRegistry,
}

impl DataChannelGateway {
    pub fn new(messenger: Arc<dyn Messenger>) -> Self {
        Self::with_config(messenger, GatewayConfig::default())
    }

    pub fn with_config(messenger: Arc<dyn Messenger>, config: GatewayConfig) -> Self {
        Self {
            config,
            messenger,
            registry: ChannelRegistry::new(),
        }
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    pub fn registry(&self) -> &ChannelRegistry {
        &self.registry
    }

    /// Create a channel on `connection`, attach an observer and register it
    /// under a fresh correlation token.
    ///
    /// On error nothing is registered and no events are published.
    pub fn create_channel(
        &self,
        connection_id: &str,
        connection: &dyn PeerConnection,
        label: &str,
        options: &ChannelOptions,
    ) -> Result<CreatedChannel> {
        options.validate()?;
        let init = options.to_init(&self.config.default_protocol);
        let channel = connection.create_data_channel(label, &init)?;

        loop {
            let token = Uuid::new_v4().to_string();
            let event_channel = data_channel_event_channel(
                &self.config.event_channel_prefix,
                connection_id,
                &token,
            );
            let observer = Arc::new(ChannelObserver::new(
                Arc::clone(&channel),
                EventChannel::new(Arc::clone(&self.messenger), event_channel.clone()),
            ));
            let registration = ObserverRegistration::register(Arc::clone(&channel), observer.clone());
            let entry = ChannelEntry::new(
                token.clone(),
                connection_id.to_string(),
                registration,
                observer,
            );

            match self.registry.insert(entry) {
                Ok(()) => {
                    let created = CreatedChannel {
                        id: channel.id(),
                        label: channel.label().to_string(),
                        correlation_token: token,
                        event_channel,
                    };
                    debug!(
                        connection = connection_id,
                        token = %created.correlation_token,
                        id = created.id,
                        label = %created.label,
                        "data channel registered"
                    );
                    return Ok(created);
                }
                Err(rejected) => {
                    debug!(token = %token, "correlation token collision; retrying");
                    drop(rejected);
                }
            }
        }
    }

    /// [`create_channel`](Self::create_channel) with options taken from the
    /// host's JSON map.
    pub fn create_channel_from_value(
        &self,
        connection_id: &str,
        connection: &dyn PeerConnection,
        label: &str,
        options: &Value,
    ) -> Result<CreatedChannel> {
        let options = ChannelOptions::from_value(options)?;
        self.create_channel(connection_id, connection, label, &options)
    }

    /// Send on the channel registered under `token`.
    pub fn send(&self, token: &str, kind: MessageKind, payload: Payload) -> Result<()> {
        let channel = self
            .registry
            .channel(token)
            .ok_or_else(|| ChannelError::NotFound(token.to_string()))?;
        Self::send_on(channel.as_ref(), kind, payload)
    }

    /// Send with the payload taken from a JSON value.
    pub fn send_value(&self, token: &str, kind: MessageKind, payload: &Value) -> Result<()> {
        self.send(token, kind, Payload::from_value(payload)?)
    }

    /// Send directly on a channel handle.
    pub fn send_on(channel: &dyn DataChannel, kind: MessageKind, payload: Payload) -> Result<()> {
        let (data, binary) = match (kind, &payload) {
            (MessageKind::Binary, Payload::Bytes(bytes)) => (&bytes[..], true),
            (MessageKind::Text, Payload::Text(text)) => (text.as_bytes(), false),
            (MessageKind::Binary, Payload::Text(_)) => {
                return Err(ChannelError::InvalidPayload(
                    "binary messages require byte data".to_string(),
                ))
            }
            (MessageKind::Text, Payload::Bytes(_)) => {
                return Err(ChannelError::InvalidPayload(
                    "text messages require a string".to_string(),
                ))
            }
        };
        trace!(id = channel.id(), kind = kind.as_str(), len = data.len(), "sending");
        channel.send(data, binary)?;
        Ok(())
    }

    /// Close and forget the channel. Unknown tokens are ignored.
    ///
    /// The observer stays attached while the transport closes, so the closing
    /// and closed transitions are still published. Returns whether a channel
    /// was found.
    pub fn close(&self, token: &str) -> bool {
        let Some(entry) = self.registry.remove(token) else {
            trace!(token, "close on unknown token");
            return false;
        };
        debug!(token, id = entry.channel().id(), "closing data channel");
        entry.channel().close();
        drop(entry);
        true
    }

    /// Close every channel created on `connection_id`. Returns how many were closed.
    pub fn close_connection(&self, connection_id: &str) -> usize {
        let entries = self.registry.remove_connection(connection_id);
        let count = entries.len();
        for entry in entries {
            entry.channel().close();
        }
        if count > 0 {
            debug!(connection = connection_id, count, "closed connection channels");
        }
        count
    }

    pub fn resolve_channel(&self, token: &str) -> Option<Arc<dyn DataChannel>> {
        self.registry.channel(token)
    }

    pub fn channel_info(&self, token: &str) -> Option<ChannelInfo> {
        self.registry.info(token)
    }
}

impl fmt::Debug for DataChannelGateway {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataChannelGateway")
            .field("config", &self.config)
            .field("registry", &self.registry)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rtcbridge_events::{BridgeEvent, MessageData, RecordingMessenger};
    use rtcbridge_transport::loopback::LoopbackConnection;
    use rtcbridge_transport::DataChannelState;
    use serde_json::json;

    fn gateway() -> (Arc<RecordingMessenger>, DataChannelGateway) {
        let messenger = Arc::new(RecordingMessenger::new());
        (messenger.clone(), DataChannelGateway::new(messenger))
    }

    #[test]
    fn create_registers_under_unique_tokens() {
        let (_, gateway) = gateway();
        let pc = LoopbackConnection::new("pc");

        let a = gateway
            .create_channel("pc", &*pc, "chat", &ChannelOptions::default())
            .unwrap();
        let b = gateway
            .create_channel("pc", &*pc, "chat", &ChannelOptions::default())
            .unwrap();

        assert_ne!(a.correlation_token, b.correlation_token);
        assert_eq!(a.label, "chat");
        assert_eq!(
            a.event_channel,
            format!("RtcBridge/dataChannelEventpc{}", a.correlation_token)
        );
        assert_eq!(gateway.registry().len(), 2);
        assert!(gateway.resolve_channel(&a.correlation_token).is_some());
    }

    #[test]
    fn default_protocol_fills_missing_protocol() {
        let messenger = Arc::new(RecordingMessenger::new());
        let gateway = DataChannelGateway::with_config(
            messenger,
            GatewayConfig::default().with_default_protocol("custom"),
        );
        let pc = LoopbackConnection::new("pc");
        gateway
            .create_channel_from_value("pc", &*pc, "x", &json!({}))
            .unwrap();
        assert_eq!(pc.channels()[0].init().protocol, "custom");
    }

    #[test]
    fn transport_rejection_registers_nothing() {
        let (messenger, gateway) = gateway();
        let pc = LoopbackConnection::new("pc");
        pc.close();

        let err = gateway
            .create_channel("pc", &*pc, "chat", &ChannelOptions::default())
            .unwrap_err();
        assert_eq!(err.kind(), "TransportError");
        assert!(gateway.registry().is_empty());
        assert!(messenger.is_empty());
    }

    #[test]
    fn invalid_options_never_reach_the_transport() {
        let (_, gateway) = gateway();
        let pc = LoopbackConnection::new("pc");
        let err = gateway
            .create_channel_from_value("pc", &*pc, "x", &json!({"negotiated": true}))
            .unwrap_err();
        assert!(matches!(err, ChannelError::InvalidOptions(_)));
        assert!(pc.channels().is_empty());
    }

    #[test]
    fn send_checks_payload_against_kind() {
        let (_, gateway) = gateway();
        let pc = LoopbackConnection::new("pc");
        let created = gateway
            .create_channel("pc", &*pc, "chat", &ChannelOptions::default())
            .unwrap();
        pc.open_all();
        let token = &created.correlation_token;

        gateway.send(token, MessageKind::Text, "hi".into()).unwrap();
        gateway
            .send_value(token, MessageKind::Binary, &json!([1, 2, 3]))
            .unwrap();

        let err = gateway
            .send(token, MessageKind::Binary, "oops".into())
            .unwrap_err();
        assert_eq!(err.kind(), "InvalidPayload");
        let err = gateway
            .send_value(token, MessageKind::Text, &json!(42))
            .unwrap_err();
        assert_eq!(err.kind(), "InvalidPayload");
        assert!(gateway
            .send_value(token, MessageKind::Binary, &json!([256]))
            .is_err());

        let sent = pc.channels()[0].sent_messages();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].data.as_ref(), b"hi");
        assert!(!sent[0].binary);
        assert_eq!(sent[1].data.as_ref(), &[1, 2, 3]);
        assert!(sent[1].binary);
    }

    #[test]
    fn send_before_open_surfaces_transport_error() {
        let (_, gateway) = gateway();
        let pc = LoopbackConnection::new("pc");
        let created = gateway
            .create_channel("pc", &*pc, "chat", &ChannelOptions::default())
            .unwrap();
        let err = gateway
            .send(&created.correlation_token, MessageKind::Text, "x".into())
            .unwrap_err();
        assert!(matches!(err, ChannelError::Transport(_)));
    }

    #[test]
    fn send_on_unknown_token_is_not_found() {
        let (_, gateway) = gateway();
        let err = gateway
            .send("nope", MessageKind::Text, "x".into())
            .unwrap_err();
        assert!(matches!(err, ChannelError::NotFound(_)));
    }

    #[test]
    fn close_publishes_closing_then_closed_and_unregisters() {
        let (messenger, gateway) = gateway();
        let pc = LoopbackConnection::new("pc");
        let created = gateway
            .create_channel("pc", &*pc, "chat", &ChannelOptions::default())
            .unwrap();
        pc.open_all();

        assert!(gateway.close(&created.correlation_token));
        assert!(!gateway.close(&created.correlation_token));
        assert!(gateway.resolve_channel(&created.correlation_token).is_none());
        assert!(!pc.channels()[0].has_observer());

        let states: Vec<_> = messenger
            .events_on(&created.event_channel)
            .into_iter()
            .filter_map(|event| match event {
                BridgeEvent::DataChannelStateChanged { state, .. } => Some(state),
                _ => None,
            })
            .collect();
        assert_eq!(
            states,
            vec![
                DataChannelState::Open,
                DataChannelState::Closing,
                DataChannelState::Closed
            ]
        );
    }

    #[test]
    fn paired_connections_deliver_messages_to_remote_observer() {
        let (messenger, gateway) = gateway();
        let (local, remote) = LoopbackConnection::pair("local", "remote");
        let created = gateway
            .create_channel("local", &*local, "chat", &ChannelOptions::default())
            .unwrap();
        local.open_all();

        let twin = remote.take_incoming().pop().unwrap();
        twin.send(b"pong", false).unwrap();

        let messages: Vec<_> = messenger
            .events_on(&created.event_channel)
            .into_iter()
            .filter_map(|event| match event {
                BridgeEvent::DataChannelReceiveMessage { data, .. } => Some(data),
                _ => None,
            })
            .collect();
        assert_eq!(messages, vec![MessageData::Text("pong".to_string())]);
    }

    #[test]
    fn close_connection_closes_only_its_channels() {
        let (_, gateway) = gateway();
        let a = LoopbackConnection::new("a");
        let b = LoopbackConnection::new("b");
        for _ in 0..3 {
            gateway
                .create_channel("a", &*a, "x", &ChannelOptions::default())
                .unwrap();
        }
        let kept = gateway
            .create_channel("b", &*b, "y", &ChannelOptions::default())
            .unwrap();

        assert_eq!(gateway.close_connection("a"), 3);
        assert_eq!(gateway.registry().tokens(), vec![kept.correlation_token]);
        assert!(a
            .channels()
            .iter()
            .all(|channel| channel.state() == DataChannelState::Closed));
    }

    #[test]
    fn concurrent_create_send_close_keeps_registry_consistent() {
        let (_, gateway) = gateway();
        let pc = LoopbackConnection::new("pc");

        std::thread::scope(|scope| {
            for _ in 0..8 {
                scope.spawn(|| {
                    for _ in 0..25 {
                        let created = gateway
                            .create_channel("pc", &*pc, "load", &ChannelOptions::default())
                            .unwrap();
                        let _ = gateway.send(&created.correlation_token, MessageKind::Text, "x".into());
                        assert!(gateway.close(&created.correlation_token));
                    }
                });
            }
        });

        assert!(gateway.registry().is_empty());
        assert_eq!(pc.channels().len(), 200);
        assert!(pc.channels().iter().all(|channel| !channel.has_observer()));
    }
}
