use rtcbridge_transport::TransportError;

/// Errors surfaced synchronously by data channel operations.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    /// Malformed or contradictory channel-creation parameters.
    #[error("invalid channel options: {0}")]
    InvalidOptions(String),

    /// Payload does not match the requested message type.
    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    /// The transport rejected the call.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// No live channel is registered under the token.
    #[error("data channel not found: {0}")]
    NotFound(String),
}

impl ChannelError {
    /// Stable kind name reported to the host.
    pub fn kind(&self) -> &'static str {
        match self {
            ChannelError::InvalidOptions(_) => "InvalidOptions",
            ChannelError::InvalidPayload(_) => "InvalidPayload",
            ChannelError::Transport(_) => "TransportError",
            ChannelError::NotFound(_) => "NotFound",
        }
    }
}

pub type Result<T> = std::result::Result<T, ChannelError>;
