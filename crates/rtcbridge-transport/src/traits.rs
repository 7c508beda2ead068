use std::sync::Arc;

use rtcbridge_frame::VideoFrame;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Data channel lifecycle as reported by the transport.
///
/// Ordered: a channel only ever moves forward through these states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataChannelState {
    Connecting,
    Open,
    Closing,
    Closed,
}

impl DataChannelState {
    /// Wire name used in state-change events.
    pub fn as_str(self) -> &'static str {
        match self {
            DataChannelState::Connecting => "connecting",
            DataChannelState::Open => "open",
            DataChannelState::Closing => "closing",
            DataChannelState::Closed => "closed",
        }
    }

    pub fn is_terminal(self) -> bool {
        self == DataChannelState::Closed
    }
}

/// Parameters passed to the transport when creating a data channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataChannelInit {
    /// Stream id; `None` lets the transport pick one.
    pub id: Option<u16>,
    pub ordered: bool,
    pub max_retransmits: Option<u16>,
    pub max_packet_life_time: Option<u16>,
    pub protocol: String,
    pub negotiated: bool,
}

impl Default for DataChannelInit {
    fn default() -> Self {
        Self {
            id: None,
            ordered: true,
            max_retransmits: None,
            max_packet_life_time: None,
            protocol: "sctp".to_string(),
            negotiated: false,
        }
    }
}

/// Callbacks a data channel delivers on transport-owned threads.
pub trait DataChannelObserver: Send + Sync {
    fn on_state_change(&self, state: DataChannelState);

    /// `data` is a sized buffer; it may contain NUL bytes.
    fn on_message(&self, data: &[u8], binary: bool);
}

/// One bidirectional message pipe multiplexed over a peer connection.
pub trait DataChannel: Send + Sync {
    /// Transport-assigned numeric id.
    fn id(&self) -> i32;

    fn label(&self) -> &str;

    fn state(&self) -> DataChannelState;

    /// Queue `data` for transmission with the given binary flag.
    fn send(&self, data: &[u8], binary: bool) -> Result<()>;

    /// Start closing the channel. Idempotent.
    fn close(&self);

    /// Install the channel's single observer, replacing any previous one.
    fn register_observer(&self, observer: Arc<dyn DataChannelObserver>);

    /// Remove the observer. No callback starts after this returns; one already
    /// running may still finish against its own `Arc`.
    fn unregister_observer(&self);
}

/// A negotiated connection to one remote peer.
pub trait PeerConnection: Send + Sync {
    fn create_data_channel(
        &self,
        label: &str,
        init: &DataChannelInit,
    ) -> Result<Arc<dyn DataChannel>>;
}

/// Receives decoded frames from a video track.
pub trait VideoSink: Send + Sync {
    fn on_frame(&self, frame: &VideoFrame);
}

/// Identifies one sink registration on a track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SinkId(pub u64);

/// A source of decoded video frames.
pub trait VideoTrack: Send + Sync {
    fn id(&self) -> &str;

    fn add_sink(&self, sink: Arc<dyn VideoSink>) -> SinkId;

    /// Same delivery guarantee as [`DataChannel::unregister_observer`].
    fn remove_sink(&self, id: SinkId);
}

/// A group of tracks published under one stream id.
pub trait MediaStream: Send + Sync {
    fn id(&self) -> &str;

    fn video_tracks(&self) -> Vec<Arc<dyn VideoTrack>>;
}

/// Looks streams up by id within an owner scope (local media or a peer
/// connection id).
pub trait StreamResolver: Send + Sync {
    fn media_stream(&self, stream_id: &str, owner_tag: &str) -> Option<Arc<dyn MediaStream>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn states_are_ordered_forward() {
        assert!(DataChannelState::Connecting < DataChannelState::Open);
        assert!(DataChannelState::Open < DataChannelState::Closing);
        assert!(DataChannelState::Closing < DataChannelState::Closed);
        assert!(DataChannelState::Closed.is_terminal());
    }

    #[test]
    fn state_serializes_lowercase() {
        let json = serde_json::to_string(&DataChannelState::Closing).unwrap();
        assert_eq!(json, "\"closing\"");
        assert_eq!(DataChannelState::Open.as_str(), "open");
    }

    #[test]
    fn default_init_is_reliable_sctp() {
        let init = DataChannelInit::default();
        assert!(init.ordered);
        assert_eq!(init.protocol, "sctp");
        assert!(init.max_retransmits.is_none());
        assert!(!init.negotiated);
    }
}
