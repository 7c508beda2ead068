/// Errors that can occur while encoding or decoding events.
#[derive(Debug, thiserror::Error)]
pub enum EventError {
    /// The event could not be converted to or from JSON.
    #[error("event encoding failed: {0}")]
    Encode(#[from] serde_json::Error),

    /// A message kind string other than `binary` or `text`.
    #[error("unknown message type: {0}")]
    UnknownMessageKind(String),
}

pub type Result<T> = std::result::Result<T, EventError>;
