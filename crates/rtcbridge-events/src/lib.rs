//! Events published from transport threads back to the host application.
//!
//! The host's delivery plumbing is opaque to rtcbridge: anything implementing
//! [`Messenger`] can carry events. Each data channel and each renderer
//! publishes on its own named [`EventChannel`]; every record is tagged with an
//! `event` discriminator when encoded.

pub mod error;
pub mod event;
pub mod messenger;
#[cfg(feature = "async")]
pub mod stream;

pub use error::{EventError, Result};
pub use event::{BridgeEvent, MessageData, MessageKind};
pub use messenger::{
    data_channel_event_channel, texture_event_channel, ChannelMessenger, EventChannel,
    EventEnvelope, Messenger, RecordingMessenger,
};
#[cfg(feature = "async")]
pub use stream::{AsyncMessenger, EventStream};
