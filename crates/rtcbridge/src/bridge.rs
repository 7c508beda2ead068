use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use rtcbridge_channel::{ChannelError, DataChannelGateway, GatewayConfig};
use rtcbridge_events::{MessageKind, Messenger};
use rtcbridge_render::{PresentationStrategy, RendererConfig, RendererRegistry, TextureRegistrar};
use rtcbridge_transport::{PeerConnection, StreamResolver};
use serde_json::{json, Value};
use tracing::debug;

use crate::method::{Args, MethodError};

/// Configuration for both halves of a [`Bridge`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BridgeConfig {
    pub gateway: GatewayConfig,
    pub renderer: RendererConfig,
}

impl BridgeConfig {
    /// Prefix used for both channel and texture event endpoints.
    pub fn with_event_channel_prefix(mut self, prefix: impl Into<String>) -> Self {
        let prefix = prefix.into();
        self.gateway.event_channel_prefix = prefix.clone();
        self.renderer.event_channel_prefix = prefix;
        self
    }

    pub fn with_default_protocol(mut self, protocol: impl Into<String>) -> Self {
        self.gateway.default_protocol = protocol.into();
        self
    }

    pub fn with_strategy(mut self, strategy: PresentationStrategy) -> Self {
        self.renderer.strategy = strategy;
        self
    }
}

/// The host-facing surface: data channels and video renderers addressed by
/// method name and a JSON argument map.
pub struct Bridge {
    channels: DataChannelGateway,
    renderers: RendererRegistry,
    connections: Mutex<HashMap<String, Arc<dyn PeerConnection>>>,
}

impl Bridge {
    pub fn new(
        messenger: Arc<dyn Messenger>,
        registrar: Arc<dyn TextureRegistrar>,
        streams: Arc<dyn StreamResolver>,
    ) -> Self {
        Self::with_config(messenger, registrar, streams, BridgeConfig::default())
    }

    pub fn with_config(
        messenger: Arc<dyn Messenger>,
        registrar: Arc<dyn TextureRegistrar>,
        streams: Arc<dyn StreamResolver>,
        config: BridgeConfig,
    ) -> Self {
        Self {
            channels: DataChannelGateway::with_config(Arc::clone(&messenger), config.gateway),
            renderers: RendererRegistry::with_config(registrar, messenger, streams, config.renderer),
            connections: Mutex::new(HashMap::new()),
        }
    }

    pub fn channels(&self) -> &DataChannelGateway {
        &self.channels
    }

    pub fn renderers(&self) -> &RendererRegistry {
        &self.renderers
    }

    /// Make a peer connection addressable by `peerConnectionId`.
    pub fn add_connection(&self, id: impl Into<String>, connection: Arc<dyn PeerConnection>) {
        let id = id.into();
        debug!(connection = %id, "peer connection added");
        self.lock_connections().insert(id, connection);
    }

    pub fn connection(&self, id: &str) -> Option<Arc<dyn PeerConnection>> {
        self.lock_connections().get(id).cloned()
    }

    /// Forget a connection and close every channel created on it. Returns how
    /// many channels were closed.
    pub fn close_connection(&self, id: &str) -> usize {
        self.lock_connections().remove(id);
        self.channels.close_connection(id)
    }

    /// Dispatch one method call.
    pub fn handle(&self, method: &str, args: &Value) -> Result<Value, MethodError> {
        let result = match method {
            "createDataChannel" => self.create_data_channel(method, args),
            "dataChannelSend" => self.data_channel_send(method, args),
            "dataChannelClose" => self.data_channel_close(method, args),
            "createVideoRenderer" => self.create_video_renderer(),
            "videoRendererSetSrcObject" => self.video_renderer_set_src_object(method, args),
            "videoRendererDispose" => self.video_renderer_dispose(method, args),
            "peerConnectionClose" => self.peer_connection_close(method, args),
            other => Err(MethodError::not_implemented(other)),
        };
        if let Err(err) = &result {
            debug!(method, code = %err.code, kind = err.kind, error = %err.message, "method call failed");
        }
        result
    }

    fn create_data_channel(&self, method: &str, args: &Value) -> Result<Value, MethodError> {
        let args = Args::new(method, args)?;
        let connection_id = args.str("peerConnectionId")?;
        let label = args.str("label")?;
        let connection = self.connection(connection_id).ok_or_else(|| {
            MethodError::channel(
                method,
                ChannelError::NotFound(format!("peer connection {connection_id}")),
            )
        })?;
        let created = self
            .channels
            .create_channel_from_value(
                connection_id,
                connection.as_ref(),
                label,
                args.value("dataChannelDict"),
            )
            .map_err(|err| MethodError::channel(method, err))?;
        to_value(method, &created)
    }

    fn data_channel_send(&self, method: &str, args: &Value) -> Result<Value, MethodError> {
        let args = Args::new(method, args)?;
        let token = args.str("dataChannelId")?;
        let kind: MessageKind = args
            .str("type")?
            .parse()
            .map_err(|err| MethodError::invalid_arguments(method, format!("{err}")))?;
        self.channels
            .send_value(token, kind, args.value("data"))
            .map_err(|err| MethodError::channel(method, err))?;
        Ok(Value::Null)
    }

    fn data_channel_close(&self, method: &str, args: &Value) -> Result<Value, MethodError> {
        let args = Args::new(method, args)?;
        let token = args.str("dataChannelId")?;
        self.channels.close(token);
        Ok(Value::Null)
    }

    fn create_video_renderer(&self) -> Result<Value, MethodError> {
        let created = self.renderers.create_renderer();
        to_value("createVideoRenderer", &created)
    }

    fn video_renderer_set_src_object(&self, method: &str, args: &Value) -> Result<Value, MethodError> {
        let args = Args::new(method, args)?;
        let texture_id = args.i64("textureId")?;
        let stream_id = args.opt_str("streamId").unwrap_or_default();
        let owner_tag = args.opt_str("ownerTag").unwrap_or_default();
        self.renderers.bind_stream(texture_id, stream_id, owner_tag);
        Ok(Value::Null)
    }

    fn video_renderer_dispose(&self, method: &str, args: &Value) -> Result<Value, MethodError> {
        let args = Args::new(method, args)?;
        let texture_id = args.i64("textureId")?;
        self.renderers
            .dispose_renderer(texture_id)
            .map_err(|err| MethodError::render(method, err))?;
        Ok(Value::Null)
    }

    fn peer_connection_close(&self, method: &str, args: &Value) -> Result<Value, MethodError> {
        let args = Args::new(method, args)?;
        let connection_id = args.str("peerConnectionId")?;
        let closed = self.close_connection(connection_id);
        Ok(json!({ "closedChannels": closed }))
    }

    fn lock_connections(&self) -> MutexGuard<'_, HashMap<String, Arc<dyn PeerConnection>>> {
        self.connections.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn to_value<T: serde::Serialize>(method: &str, value: &T) -> Result<Value, MethodError> {
    serde_json::to_value(value)
        .map_err(|err| MethodError::new(crate::method::failure_code(method), "Internal", err.to_string()))
}

impl fmt::Debug for Bridge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bridge")
            .field("channels", &self.channels)
            .field("renderers", &self.renderers)
            .finish()
    }
}
