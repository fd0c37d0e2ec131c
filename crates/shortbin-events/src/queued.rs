use async_trait::async_trait;
use shortbin_core::events::{AccessEvent, EventSink, Result, Topic};
use shortbin_core::EventError;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn, Instrument};

pub const DEFAULT_QUEUE_CAPACITY: usize = 1024;

/// Decouples publishing from the broker with a bounded queue.
///
/// `publish` never waits: when the queue is full the event is rejected
/// immediately. A single worker drains the queue into the inner sink and
/// logs its failures.
#[derive(Debug, Clone)]
pub struct QueuedSink {
    tx: mpsc::Sender<(Topic, AccessEvent)>,
}

impl QueuedSink {
    /// Starts the worker. It exits once every `QueuedSink` clone is dropped
    /// and the queue is drained.
    pub fn spawn<S: EventSink>(inner: S, capacity: usize) -> (Self, JoinHandle<()>) {
        let (tx, mut rx) = mpsc::channel::<(Topic, AccessEvent)>(capacity.max(1));

        let worker = tokio::spawn(
            async move {
                while let Some((topic, event)) = rx.recv().await {
                    if let Err(e) = inner.publish(topic, event).await {
                        warn!(%topic, error = %e, "Queued access event was not delivered");
                    }
                }
                debug!("Event queue closed, worker exiting");
            }
            .in_current_span(),
        );

        (Self { tx }, worker)
    }
}

#[async_trait]
impl EventSink for QueuedSink {
    async fn publish(&self, topic: Topic, event: AccessEvent) -> Result<()> {
        self.tx.try_send((topic, event)).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => {
                EventError::Unavailable("event queue is full".to_string())
            }
            mpsc::error::TrySendError::Closed(_) => EventError::Closed,
        })
    }
}
