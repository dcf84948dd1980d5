//! Overlay event fan-out
//!
//! One broadcast channel, any number of SSE subscribers. A subscriber that
//! falls more than the channel capacity behind loses the oldest events and
//! carries on; nobody connected means events are dropped.

use futures::stream::{self, Stream, StreamExt};
use landing_judge_core::OverlayEvent;
use tokio::sync::broadcast;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;

#[derive(Debug, Clone)]
pub struct EventHub {
    tx: broadcast::Sender<OverlayEvent>,
}

impl EventHub {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Send to every current subscriber; returns how many received it
    pub fn publish(&self, event: OverlayEvent) -> usize {
        let kind = event.kind();
        let delivered = self.tx.send(event).unwrap_or(0);
        tracing::debug!(kind, delivered, "Published overlay event");
        self.report_subscribers();
        delivered
    }

    pub fn subscribe(&self) -> broadcast::Receiver<OverlayEvent> {
        let rx = self.tx.subscribe();
        self.report_subscribers();
        rx
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// `hello` followed by every event published from now on
    pub fn stream(&self) -> impl Stream<Item = OverlayEvent> + Send + 'static {
        let live = BroadcastStream::new(self.subscribe()).filter_map(|item| async move {
            match item {
                Ok(event) => Some(event),
                Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Overlay subscriber lagged, events dropped");
                    None
                }
            }
        });
        stream::once(async { OverlayEvent::Hello }).chain(live)
    }

    fn report_subscribers(&self) {
        metrics::gauge!("landing_sse_subscribers").set(self.subscriber_count() as f64);
    }
}

impl Default for EventHub {
    fn default() -> Self {
        Self::new(landing_judge_config::constants::server::EVENT_CHANNEL_CAPACITY)
    }
}
