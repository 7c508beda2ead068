//! Tokio-backed delivery for async hosts.

use std::pin::Pin;
use std::task::{Context, Poll};

use futures_core::Stream;
use tokio::sync::mpsc;

use crate::event::BridgeEvent;
use crate::messenger::{EventEnvelope, Messenger};

/// Queues events on an unbounded tokio channel; never blocks the caller.
pub struct AsyncMessenger {
    tx: mpsc::UnboundedSender<EventEnvelope>,
}

impl AsyncMessenger {
    pub fn new() -> (Self, EventStream) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, EventStream { rx })
    }
}

impl Messenger for AsyncMessenger {
    fn deliver(&self, channel: &str, event: BridgeEvent) {
        let envelope = EventEnvelope {
            channel: channel.to_string(),
            event,
        };
        if self.tx.send(envelope).is_err() {
            tracing::debug!(channel, "event stream dropped; discarding event");
        }
    }
}

/// Receiving half of an [`AsyncMessenger`].
pub struct EventStream {
    rx: mpsc::UnboundedReceiver<EventEnvelope>,
}

impl EventStream {
    /// Wait for the next event. `None` once every messenger is gone.
    pub async fn recv(&mut self) -> Option<EventEnvelope> {
        self.rx.recv().await
    }
}

impl Stream for EventStream {
    type Item = EventEnvelope;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::messenger::EventChannel;

    #[tokio::test]
    async fn events_published_on_threads_reach_the_stream() {
        let (messenger, mut stream) = AsyncMessenger::new();
        let channel = EventChannel::new(Arc::new(messenger), "tex");

        let publisher = std::thread::spawn(move || {
            channel.publish(BridgeEvent::DidFirstFrameRendered { id: 4 });
        });
        publisher.join().expect("publisher should finish");

        let envelope = stream.recv().await.expect("event should arrive");
        assert_eq!(envelope.channel, "tex");
        assert_eq!(envelope.event, BridgeEvent::DidFirstFrameRendered { id: 4 });
        assert!(stream.recv().await.is_none());
    }

    #[tokio::test]
    async fn stream_polls_through_poll_next() {
        let (messenger, mut stream) = AsyncMessenger::new();
        messenger.deliver("a", BridgeEvent::DidFirstFrameRendered { id: 1 });
        drop(messenger);

        let next = std::future::poll_fn(|cx| Pin::new(&mut stream).poll_next(cx)).await;
        assert!(next.is_some());
        let end = std::future::poll_fn(|cx| Pin::new(&mut stream).poll_next(cx)).await;
        assert!(end.is_none());
    }
}
