/// Gateway behaviour knobs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayConfig {
    /// Prefix of every per-channel event endpoint name.
    pub event_channel_prefix: String,
    /// Sub-protocol used when the request carries none.
    pub default_protocol: String,
}

impl GatewayConfig {
    pub fn with_event_channel_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.event_channel_prefix = prefix.into();
        self
    }

    pub fn with_default_protocol(mut self, protocol: impl Into<String>) -> Self {
        self.default_protocol = protocol.into();
        self
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            event_channel_prefix: "RtcBridge".to_string(),
            default_protocol: "sctp".to_string(),
        }
    }
}
