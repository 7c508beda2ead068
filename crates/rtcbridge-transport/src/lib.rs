//! Real-time transport abstraction.
//!
//! rtcbridge never negotiates connections or runs SCTP itself. It consumes a
//! transport through the traits in [`traits`]:
//! - [`PeerConnection`] creates data channels
//! - [`DataChannel`] / [`DataChannelObserver`] carry messages and state changes
//! - [`VideoTrack`] / [`VideoSink`] deliver decoded frames
//! - [`MediaStream`] / [`StreamResolver`] look tracks up by stream id
//!
//! Observer and sink registrations are scoped objects ([`ObserverRegistration`],
//! [`SinkRegistration`]) that unregister on drop. The [`loopback`] module is a
//! complete in-process implementation used by tests, demos and hosts without a
//! network stack.

pub mod error;
pub mod loopback;
pub mod registration;
pub mod traits;

pub use error::{Result, TransportError};
pub use registration::{ObserverRegistration, SinkRegistration};
pub use traits::{
    DataChannel, DataChannelInit, DataChannelObserver, DataChannelState, MediaStream,
    PeerConnection, SinkId, StreamResolver, VideoSink, VideoTrack,
};
