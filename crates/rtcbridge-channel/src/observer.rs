use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use bytes::Bytes;
use rtcbridge_events::{BridgeEvent, EventChannel, MessageData, MessageKind};
use rtcbridge_transport::{DataChannel, DataChannelObserver, DataChannelState};
use tracing::{debug, trace, warn};

/// Republishes one channel's transport callbacks as bridge events.
///
/// State reports only move forward; a repeated or backward report from the
/// transport is dropped.
pub struct ChannelObserver {
    channel: Arc<dyn DataChannel>,
    events: EventChannel,
    last_state: Mutex<Option<DataChannelState>>,
}

impl ChannelObserver {
    pub fn new(channel: Arc<dyn DataChannel>, events: EventChannel) -> Self {
        Self {
            channel,
            events,
            last_state: Mutex::new(None),
        }
    }

    /// Name of the endpoint this observer publishes on.
    pub fn event_channel(&self) -> &str {
        self.events.name()
    }

    /// Last state published, if any.
    pub fn last_state(&self) -> Option<DataChannelState> {
        *self
            .last_state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Record `state` if it moves forward. Callers publish while still
    /// holding the guard so events leave in the order they were accepted.
    fn advance(&self, state: DataChannelState) -> Option<MutexGuard<'_, Option<DataChannelState>>> {
        let mut last = self
            .last_state
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        match *last {
            Some(previous) if state == previous => {
                debug!(
                    channel = %self.events.name(),
                    state = state.as_str(),
                    "repeated state report ignored"
                );
                None
            }
            Some(previous) if state < previous => {
                warn!(
                    channel = %self.events.name(),
                    from = previous.as_str(),
                    to = state.as_str(),
                    "backward state transition ignored"
                );
                None
            }
            _ => {
                *last = Some(state);
                Some(last)
            }
        }
    }
}

impl DataChannelObserver for ChannelObserver {
    fn on_state_change(&self, state: DataChannelState) {
        let id = self.channel.id();
        let Some(_accepted) = self.advance(state) else {
            return;
        };
        debug!(id, state = state.as_str(), "data channel state changed");
        self.events
            .publish(BridgeEvent::DataChannelStateChanged { id, state });
    }

    fn on_message(&self, data: &[u8], binary: bool) {
        let kind = MessageKind::from_binary_flag(binary);
        let data = if binary {
            MessageData::Binary(Bytes::copy_from_slice(data))
        } else {
            MessageData::Text(decode_text(data, self.events.name()))
        };
        let id = self.channel.id();
        trace!(id, kind = kind.as_str(), len = data.as_bytes().len(), "data channel message");
        self.events
            .publish(BridgeEvent::DataChannelReceiveMessage { id, kind, data });
    }
}

fn decode_text(data: &[u8], channel: &str) -> String {
    match std::str::from_utf8(data) {
        Ok(text) => text.to_owned(),
        Err(err) => {
            warn!(channel, error = %err, "text message is not valid UTF-8; decoding lossily");
            String::from_utf8_lossy(data).into_owned()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rtcbridge_events::{BridgeEvent, RecordingMessenger};
    use rtcbridge_transport::loopback::LoopbackConnection;
    use rtcbridge_transport::{DataChannelInit, PeerConnection};

    fn observed() -> (Arc<RecordingMessenger>, ChannelObserver) {
        let pc = LoopbackConnection::new("pc");
        let channel = pc
            .create_data_channel("chat", &DataChannelInit::default())
            .unwrap();
        let messenger = Arc::new(RecordingMessenger::new());
        let observer = ChannelObserver::new(channel, EventChannel::new(messenger.clone(), "ev"));
        (messenger, observer)
    }

    #[test]
    fn state_changes_publish_in_order() {
        let (messenger, observer) = observed();
        observer.on_state_change(DataChannelState::Open);
        observer.on_state_change(DataChannelState::Closing);
        observer.on_state_change(DataChannelState::Closed);

        let states: Vec<_> = messenger
            .events_on("ev")
            .into_iter()
            .map(|event| match event {
                BridgeEvent::DataChannelStateChanged { id, state } => {
                    assert_eq!(id, 0);
                    state
                }
                other => panic!("unexpected event {other:?}"),
            })
            .collect();
        assert_eq!(
            states,
            vec![
                DataChannelState::Open,
                DataChannelState::Closing,
                DataChannelState::Closed
            ]
        );
    }

    #[test]
    fn repeated_and_backward_states_are_dropped() {
        let (messenger, observer) = observed();
        observer.on_state_change(DataChannelState::Open);
        observer.on_state_change(DataChannelState::Open);
        observer.on_state_change(DataChannelState::Connecting);
        assert_eq!(messenger.len(), 1);
        assert_eq!(observer.last_state(), Some(DataChannelState::Open));
    }

    #[test]
    fn concurrent_reports_publish_monotonically() {
        let states = [
            DataChannelState::Connecting,
            DataChannelState::Open,
            DataChannelState::Closing,
            DataChannelState::Closed,
        ];
        for _ in 0..50 {
            let (messenger, observer) = observed();
            std::thread::scope(|scope| {
                for offset in 0..states.len() {
                    let observer = &observer;
                    scope.spawn(move || {
                        for step in 0..states.len() {
                            observer.on_state_change(states[(offset + step) % states.len()]);
                        }
                    });
                }
            });

            let published: Vec<DataChannelState> = messenger
                .events_on("ev")
                .into_iter()
                .filter_map(|event| match event {
                    BridgeEvent::DataChannelStateChanged { state, .. } => Some(state),
                    _ => None,
                })
                .collect();
            assert!(
                published.windows(2).all(|pair| pair[0] < pair[1]),
                "out of order: {published:?}"
            );
            assert_eq!(published.last(), Some(&DataChannelState::Closed));
        }
    }

    #[test]
    fn binary_message_carries_bytes() {
        let (messenger, observer) = observed();
        observer.on_message(&[0x00, 0x01, 0xFF], true);
        assert_eq!(
            messenger.events_on("ev"),
            vec![BridgeEvent::DataChannelReceiveMessage {
                id: 0,
                kind: MessageKind::Binary,
                data: MessageData::Binary(Bytes::from_static(&[0x00, 0x01, 0xFF])),
            }]
        );
    }

    #[test]
    fn text_message_keeps_nul_and_decodes_invalid_utf8_lossily() {
        let (messenger, observer) = observed();
        observer.on_message(b"a\0b", false);
        observer.on_message(&[b'h', 0xFF, b'i'], false);

        let texts: Vec<_> = messenger
            .events_on("ev")
            .into_iter()
            .map(|event| match event {
                BridgeEvent::DataChannelReceiveMessage {
                    kind: MessageKind::Text,
                    data: MessageData::Text(text),
                    ..
                } => text,
                other => panic!("unexpected event {other:?}"),
            })
            .collect();
        assert_eq!(texts, vec!["a\0b".to_string(), "h\u{FFFD}i".to_string()]);
    }
}
