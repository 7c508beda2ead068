//! In-process transport.
//!
//! Two [`LoopbackConnection`]s created with [`LoopbackConnection::pair`] behave
//! like connected peers: a channel created on one side appears as an incoming
//! channel on the other and messages sent on either end are delivered to the
//! twin's observer. Video tracks are driven by calling
//! [`LoopbackVideoTrack::deliver`] from any thread.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use bytes::Bytes;
use rtcbridge_frame::VideoFrame;
use tracing::{debug, trace};

use crate::error::{Result, TransportError};
use crate::traits::{
    DataChannel, DataChannelInit, DataChannelObserver, DataChannelState, MediaStream,
    PeerConnection, SinkId, StreamResolver, VideoSink, VideoTrack,
};

/// Highest usable SCTP stream id.
pub const MAX_STREAM_ID: u16 = 65_534;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A message handed to [`DataChannel::send`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    pub data: Bytes,
    pub binary: bool,
}

#[derive(Default)]
struct ConnectionInner {
    channels: Vec<Arc<LoopbackDataChannel>>,
    incoming: Vec<Arc<LoopbackDataChannel>>,
    next_id: u16,
    closed: bool,
}

/// An in-process peer connection.
pub struct LoopbackConnection {
    name: String,
    remote: Mutex<Weak<LoopbackConnection>>,
    inner: Mutex<ConnectionInner>,
}

impl LoopbackConnection {
    /// A connection without a remote side; sends are only recorded.
    pub fn new(name: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            remote: Mutex::new(Weak::new()),
            inner: Mutex::new(ConnectionInner::default()),
        })
    }

    /// Two connections wired to each other.
    pub fn pair(local: impl Into<String>, remote: impl Into<String>) -> (Arc<Self>, Arc<Self>) {
        let a = Self::new(local);
        let b = Self::new(remote);
        *lock(&a.remote) = Arc::downgrade(&b);
        *lock(&b.remote) = Arc::downgrade(&a);
        (a, b)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Channels created locally.
    pub fn channels(&self) -> Vec<Arc<LoopbackDataChannel>> {
        lock(&self.inner).channels.clone()
    }

    /// Channels the remote side created, drained.
    pub fn take_incoming(&self) -> Vec<Arc<LoopbackDataChannel>> {
        std::mem::take(&mut lock(&self.inner).incoming)
    }

    /// Move every local channel (and its remote twin) that is still connecting
    /// to `Open`.
    pub fn open_all(&self) {
        for channel in self.channels() {
            if channel.state() == DataChannelState::Connecting {
                channel.set_state(DataChannelState::Open);
            }
            if let Some(twin) = channel.twin() {
                if twin.state() == DataChannelState::Connecting {
                    twin.set_state(DataChannelState::Open);
                }
            }
        }
    }

    /// Tear the connection down, closing every channel it owns.
    pub fn close(&self) {
        let channels = {
            let mut inner = lock(&self.inner);
            inner.closed = true;
            let mut all = inner.channels.clone();
            all.extend(inner.incoming.iter().cloned());
            all
        };
        debug!(connection = %self.name, channels = channels.len(), "closing loopback connection");
        for channel in channels {
            channel.close();
        }
    }

    fn allocate_id(inner: &mut ConnectionInner, requested: Option<u16>) -> Result<u16> {
        let in_use = |id: u16| inner.channels.iter().any(|c| c.id == i32::from(id));
        match requested {
            Some(id) if id > MAX_STREAM_ID => Err(TransportError::InvalidParameter(format!(
                "stream id {id} out of range"
            ))),
            Some(id) if in_use(id) => Err(TransportError::InvalidParameter(format!(
                "stream id {id} already in use"
            ))),
            Some(id) => Ok(id),
            None => {
                // Scan the whole id range once, wrapping after MAX_STREAM_ID.
                let span = u32::from(MAX_STREAM_ID) + 1;
                let start = u32::from(inner.next_id) % span;
                let id = (0..span)
                    .map(|offset| ((start + offset) % span) as u16)
                    .find(|id| !in_use(*id))
                    .ok_or_else(|| {
                        TransportError::InvalidParameter("no free stream ids".to_string())
                    })?;
                inner.next_id = if id == MAX_STREAM_ID { 0 } else { id + 1 };
                Ok(id)
            }
        }
    }
}

impl PeerConnection for LoopbackConnection {
    fn create_data_channel(
        &self,
        label: &str,
        init: &DataChannelInit,
    ) -> Result<Arc<dyn DataChannel>> {
        if init.max_retransmits.is_some() && init.max_packet_life_time.is_some() {
            return Err(TransportError::InvalidParameter(
                "maxRetransmits and maxPacketLifeTime are mutually exclusive".to_string(),
            ));
        }

        let channel = {
            let mut inner = lock(&self.inner);
            if inner.closed {
                return Err(TransportError::ConnectionClosed);
            }
            let id = Self::allocate_id(&mut inner, init.id)?;
            let channel = Arc::new(LoopbackDataChannel::new(i32::from(id), label, init.clone()));
            inner.channels.push(Arc::clone(&channel));
            channel
        };

        let remote = lock(&self.remote).upgrade();
        if let Some(remote) = remote {
            let twin = Arc::new(LoopbackDataChannel::new(channel.id, label, init.clone()));
            *lock(&twin.peer) = Arc::downgrade(&channel);
            *lock(&channel.peer) = Arc::downgrade(&twin);
            lock(&remote.inner).incoming.push(twin);
        }

        debug!(connection = %self.name, id = channel.id, label, "created loopback data channel");
        Ok(channel)
    }
}

/// An in-process data channel.
pub struct LoopbackDataChannel {
    id: i32,
    label: String,
    init: DataChannelInit,
    state: Mutex<DataChannelState>,
    observer: Mutex<Option<Arc<dyn DataChannelObserver>>>,
    peer: Mutex<Weak<LoopbackDataChannel>>,
    sent: Mutex<Vec<SentMessage>>,
}

impl LoopbackDataChannel {
    fn new(id: i32, label: &str, init: DataChannelInit) -> Self {
        Self {
            id,
            label: label.to_string(),
            init,
            state: Mutex::new(DataChannelState::Connecting),
            observer: Mutex::new(None),
            peer: Mutex::new(Weak::new()),
            sent: Mutex::new(Vec::new()),
        }
    }

    pub fn init(&self) -> &DataChannelInit {
        &self.init
    }

    pub fn has_observer(&self) -> bool {
        lock(&self.observer).is_some()
    }

    /// Everything passed to `send` so far.
    pub fn sent_messages(&self) -> Vec<SentMessage> {
        lock(&self.sent).clone()
    }

    /// The remote end, when this channel belongs to a paired connection.
    pub fn twin(&self) -> Option<Arc<LoopbackDataChannel>> {
        lock(&self.peer).upgrade()
    }

    /// Report a state change as the transport would.
    pub fn set_state(&self, state: DataChannelState) {
        *lock(&self.state) = state;
        trace!(id = self.id, state = state.as_str(), "loopback channel state");
        if let Some(observer) = self.current_observer() {
            observer.on_state_change(state);
        }
    }

    /// Inject an inbound message as if it arrived from the remote peer.
    pub fn deliver(&self, data: &[u8], binary: bool) {
        if let Some(observer) = self.current_observer() {
            observer.on_message(data, binary);
        }
    }

    fn current_observer(&self) -> Option<Arc<dyn DataChannelObserver>> {
        lock(&self.observer).clone()
    }
}

impl DataChannel for LoopbackDataChannel {
    fn id(&self) -> i32 {
        self.id
    }

    fn label(&self) -> &str {
        &self.label
    }

    fn state(&self) -> DataChannelState {
        *lock(&self.state)
    }

    fn send(&self, data: &[u8], binary: bool) -> Result<()> {
        let state = self.state();
        if state != DataChannelState::Open {
            return Err(TransportError::InvalidState(state));
        }
        lock(&self.sent).push(SentMessage {
            data: Bytes::copy_from_slice(data),
            binary,
        });
        if let Some(twin) = self.twin() {
            twin.deliver(data, binary);
        }
        Ok(())
    }

    fn close(&self) {
        {
            let mut state = lock(&self.state);
            if *state >= DataChannelState::Closing {
                return;
            }
            *state = DataChannelState::Closing;
        }
        if let Some(observer) = self.current_observer() {
            observer.on_state_change(DataChannelState::Closing);
        }
        if let Some(twin) = self.twin() {
            twin.close();
        }
        self.set_state(DataChannelState::Closed);
    }

    fn register_observer(&self, observer: Arc<dyn DataChannelObserver>) {
        *lock(&self.observer) = Some(observer);
    }

    fn unregister_observer(&self) {
        lock(&self.observer).take();
    }
}

/// An in-process video track. Frames pushed with [`deliver`](Self::deliver)
/// reach every registered sink on the calling thread.
pub struct LoopbackVideoTrack {
    id: String,
    sinks: Mutex<Vec<(SinkId, Arc<dyn VideoSink>)>>,
    next_sink: AtomicU64,
}

impl LoopbackVideoTrack {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            sinks: Mutex::new(Vec::new()),
            next_sink: AtomicU64::new(1),
        }
    }

    pub fn sink_count(&self) -> usize {
        lock(&self.sinks).len()
    }

    /// Deliver `frame` to every sink registered at the time of the call.
    pub fn deliver(&self, frame: &VideoFrame) {
        let sinks: Vec<Arc<dyn VideoSink>> =
            lock(&self.sinks).iter().map(|(_, sink)| Arc::clone(sink)).collect();
        for sink in sinks {
            sink.on_frame(frame);
        }
    }
}

impl VideoTrack for LoopbackVideoTrack {
    fn id(&self) -> &str {
        &self.id
    }

    fn add_sink(&self, sink: Arc<dyn VideoSink>) -> SinkId {
        let id = SinkId(self.next_sink.fetch_add(1, Ordering::Relaxed));
        lock(&self.sinks).push((id, sink));
        id
    }

    fn remove_sink(&self, id: SinkId) {
        lock(&self.sinks).retain(|(sink_id, _)| *sink_id != id);
    }
}

/// A fixed set of tracks under one stream id.
pub struct LoopbackMediaStream {
    id: String,
    video_tracks: Vec<Arc<dyn VideoTrack>>,
}

impl LoopbackMediaStream {
    pub fn new(id: impl Into<String>, video_tracks: Vec<Arc<dyn VideoTrack>>) -> Self {
        Self {
            id: id.into(),
            video_tracks,
        }
    }
}

impl MediaStream for LoopbackMediaStream {
    fn id(&self) -> &str {
        &self.id
    }

    fn video_tracks(&self) -> Vec<Arc<dyn VideoTrack>> {
        self.video_tracks.clone()
    }
}

/// Streams keyed by `(owner_tag, stream_id)`.
#[derive(Default)]
pub struct StreamTable {
    streams: Mutex<HashMap<(String, String), Arc<dyn MediaStream>>>,
}

impl StreamTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, owner_tag: impl Into<String>, stream: Arc<dyn MediaStream>) {
        let key = (owner_tag.into(), stream.id().to_string());
        lock(&self.streams).insert(key, stream);
    }

    pub fn remove(&self, owner_tag: &str, stream_id: &str) -> Option<Arc<dyn MediaStream>> {
        lock(&self.streams).remove(&(owner_tag.to_string(), stream_id.to_string()))
    }
}

impl StreamResolver for StreamTable {
    fn media_stream(&self, stream_id: &str, owner_tag: &str) -> Option<Arc<dyn MediaStream>> {
        lock(&self.streams)
            .get(&(owner_tag.to_string(), stream_id.to_string()))
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rtcbridge_frame::{I420Buffer, Rotation};
    use std::sync::atomic::AtomicUsize;

    #[derive(Default)]
    struct Recorder {
        states: Mutex<Vec<DataChannelState>>,
        messages: Mutex<Vec<(Vec<u8>, bool)>>,
    }

    impl DataChannelObserver for Recorder {
        fn on_state_change(&self, state: DataChannelState) {
            lock(&self.states).push(state);
        }

        fn on_message(&self, data: &[u8], binary: bool) {
            lock(&self.messages).push((data.to_vec(), binary));
        }
    }

    #[derive(Default)]
    struct CountingSink {
        frames: AtomicUsize,
    }

    impl VideoSink for CountingSink {
        fn on_frame(&self, _frame: &VideoFrame) {
            self.frames.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn paired_channels_exchange_messages() {
        let (a, b) = LoopbackConnection::pair("a", "b");
        let local = a
            .create_data_channel("chat", &DataChannelInit::default())
            .unwrap();
        let remote = b.take_incoming().pop().expect("remote twin");
        let recorder = Arc::new(Recorder::default());
        remote.register_observer(recorder.clone());

        a.open_all();
        assert_eq!(remote.state(), DataChannelState::Open);

        local.send(b"hi\0there", false).unwrap();
        let messages = lock(&recorder.messages).clone();
        assert_eq!(messages, vec![(b"hi\0there".to_vec(), false)]);
        assert_eq!(lock(&recorder.states).clone(), vec![DataChannelState::Open]);
    }

    #[test]
    fn send_before_open_is_rejected() {
        let pc = LoopbackConnection::new("pc");
        let channel = pc
            .create_data_channel("chat", &DataChannelInit::default())
            .unwrap();
        let err = channel.send(b"x", true).unwrap_err();
        assert!(matches!(
            err,
            TransportError::InvalidState(DataChannelState::Connecting)
        ));
    }

    #[test]
    fn close_walks_closing_then_closed_on_both_ends() {
        let (a, b) = LoopbackConnection::pair("a", "b");
        let local = a
            .create_data_channel("chat", &DataChannelInit::default())
            .unwrap();
        let remote = b.take_incoming().pop().unwrap();
        a.open_all();

        let recorder = Arc::new(Recorder::default());
        local.register_observer(recorder.clone());
        let remote_recorder = Arc::new(Recorder::default());
        remote.register_observer(remote_recorder.clone());

        local.close();
        local.close();
        assert_eq!(
            lock(&recorder.states).clone(),
            vec![DataChannelState::Closing, DataChannelState::Closed]
        );
        assert_eq!(
            lock(&remote_recorder.states).clone(),
            vec![DataChannelState::Closing, DataChannelState::Closed]
        );
    }

    #[test]
    fn rejects_conflicting_reliability_and_duplicate_ids() {
        let pc = LoopbackConnection::new("pc");
        let init = DataChannelInit {
            max_retransmits: Some(3),
            max_packet_life_time: Some(100),
            ..DataChannelInit::default()
        };
        assert!(matches!(
            pc.create_data_channel("x", &init),
            Err(TransportError::InvalidParameter(_))
        ));

        let fixed = DataChannelInit {
            id: Some(5),
            negotiated: true,
            ..DataChannelInit::default()
        };
        pc.create_data_channel("one", &fixed).unwrap();
        assert!(matches!(
            pc.create_data_channel("two", &fixed),
            Err(TransportError::InvalidParameter(_))
        ));
    }

    #[test]
    fn automatic_ids_skip_used_ones() {
        let pc = LoopbackConnection::new("pc");
        let fixed = DataChannelInit {
            id: Some(0),
            ..DataChannelInit::default()
        };
        pc.create_data_channel("fixed", &fixed).unwrap();
        let auto = pc
            .create_data_channel("auto", &DataChannelInit::default())
            .unwrap();
        assert_eq!(auto.id(), 1);
    }

    #[test]
    fn automatic_ids_wrap_inside_the_stream_id_range() {
        let mut inner = ConnectionInner {
            next_id: MAX_STREAM_ID,
            ..ConnectionInner::default()
        };
        assert_eq!(
            LoopbackConnection::allocate_id(&mut inner, None).unwrap(),
            MAX_STREAM_ID
        );
        assert_eq!(LoopbackConnection::allocate_id(&mut inner, None).unwrap(), 0);

        inner.next_id = u16::MAX;
        assert_eq!(LoopbackConnection::allocate_id(&mut inner, None).unwrap(), 0);
    }

    #[test]
    fn closed_connection_refuses_new_channels() {
        let pc = LoopbackConnection::new("pc");
        let channel = pc
            .create_data_channel("chat", &DataChannelInit::default())
            .unwrap();
        pc.close();
        assert_eq!(channel.state(), DataChannelState::Closed);
        assert!(matches!(
            pc.create_data_channel("late", &DataChannelInit::default()),
            Err(TransportError::ConnectionClosed)
        ));
    }

    #[test]
    fn track_delivers_to_registered_sinks_only() {
        let track = LoopbackVideoTrack::new("cam");
        let sink = Arc::new(CountingSink::default());
        let id = track.add_sink(sink.clone());

        let frame = VideoFrame::from_i420(
            I420Buffer::solid(2, 2, 16, 128, 128).unwrap(),
            Rotation::Deg0,
            0,
        );
        track.deliver(&frame);
        track.remove_sink(id);
        track.deliver(&frame);
        assert_eq!(sink.frames.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn stream_table_resolves_by_owner_and_id() {
        let table = StreamTable::new();
        let track: Arc<dyn VideoTrack> = Arc::new(LoopbackVideoTrack::new("cam"));
        table.insert("local", Arc::new(LoopbackMediaStream::new("s1", vec![track])));

        let stream = table.media_stream("s1", "local").expect("stream");
        assert_eq!(stream.video_tracks().len(), 1);
        assert!(table.media_stream("s1", "pc-1").is_none());
        assert!(table.remove("local", "s1").is_some());
        assert!(table.media_stream("s1", "local").is_none());
    }
}
