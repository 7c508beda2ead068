use std::fmt;
use std::sync::Arc;

use crate::traits::{DataChannel, DataChannelObserver, SinkId, VideoSink, VideoTrack};

/// Scoped observer registration on a data channel.
///
/// Dropping it unregisters the observer before anything else owned next to it
/// is torn down, so the transport never calls into a half-destroyed owner.
pub struct ObserverRegistration {
    channel: Arc<dyn DataChannel>,
}

impl ObserverRegistration {
    pub fn register(channel: Arc<dyn DataChannel>, observer: Arc<dyn DataChannelObserver>) -> Self {
        channel.register_observer(observer);
        Self { channel }
    }

    pub fn channel(&self) -> &Arc<dyn DataChannel> {
        &self.channel
    }
}

impl Drop for ObserverRegistration {
    fn drop(&mut self) {
        tracing::trace!(channel_id = self.channel.id(), "unregistering channel observer");
        self.channel.unregister_observer();
    }
}

impl fmt::Debug for ObserverRegistration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObserverRegistration")
            .field("channel_id", &self.channel.id())
            .field("label", &self.channel.label())
            .finish()
    }
}

/// Scoped sink registration on a video track. Removes the sink on drop.
pub struct SinkRegistration {
    track: Arc<dyn VideoTrack>,
    id: SinkId,
}

impl SinkRegistration {
    pub fn register(track: Arc<dyn VideoTrack>, sink: Arc<dyn VideoSink>) -> Self {
        let id = track.add_sink(sink);
        Self { track, id }
    }

    pub fn track(&self) -> &Arc<dyn VideoTrack> {
        &self.track
    }

    pub fn sink_id(&self) -> SinkId {
        self.id
    }
}

impl Drop for SinkRegistration {
    fn drop(&mut self) {
        tracing::trace!(track_id = self.track.id(), sink = self.id.0, "removing video sink");
        self.track.remove_sink(self.id);
    }
}

impl fmt::Debug for SinkRegistration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SinkRegistration")
            .field("track_id", &self.track.id())
            .field("sink", &self.id)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loopback::{LoopbackConnection, LoopbackVideoTrack};
    use crate::traits::{DataChannelInit, DataChannelState, PeerConnection};
    use rtcbridge_frame::VideoFrame;

    struct NullObserver;

    impl DataChannelObserver for NullObserver {
        fn on_state_change(&self, _state: DataChannelState) {}
        fn on_message(&self, _data: &[u8], _binary: bool) {}
    }

    struct NullSink;

    impl VideoSink for NullSink {
        fn on_frame(&self, _frame: &VideoFrame) {}
    }

    #[test]
    fn observer_registration_unregisters_on_drop() {
        let pc = LoopbackConnection::new("pc");
        let channel = pc
            .create_data_channel("chat", &DataChannelInit::default())
            .unwrap();
        let loopback = pc.channels().pop().unwrap();

        let registration = ObserverRegistration::register(channel, Arc::new(NullObserver));
        assert!(loopback.has_observer());
        drop(registration);
        assert!(!loopback.has_observer());
    }

    #[test]
    fn sink_registration_removes_sink_on_drop() {
        let track = Arc::new(LoopbackVideoTrack::new("cam"));
        let registration = SinkRegistration::register(track.clone(), Arc::new(NullSink));
        assert_eq!(track.sink_count(), 1);
        drop(registration);
        assert_eq!(track.sink_count(), 0);
    }
}
