use crate::traits::DataChannelState;

/// Errors reported by the underlying transport.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The transport rejected a parameter (channel init, id collision, ...).
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// The operation is not allowed in the channel's current state.
    #[error("data channel is {}", .0.as_str())]
    InvalidState(DataChannelState),

    /// The owning peer connection has been closed.
    #[error("peer connection closed")]
    ConnectionClosed,

    /// Any other transport-internal failure.
    #[error("transport failure: {0}")]
    Failed(String),
}

pub type Result<T> = std::result::Result<T, TransportError>;
