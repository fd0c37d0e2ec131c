use async_trait::async_trait;
use shortbin_core::events::{AccessEvent, EventSink, Result, Topic};
use tokio::sync::Mutex;
use tracing::debug;

/// Keeps every published event in memory, in publish order.
///
/// Meant for tests and local runs; nothing is ever evicted.
#[derive(Debug, Default)]
pub struct MemorySink {
    events: Mutex<Vec<(Topic, AccessEvent)>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn events(&self) -> Vec<(Topic, AccessEvent)> {
        self.events.lock().await.clone()
    }

    pub async fn on_topic(&self, topic: Topic) -> Vec<AccessEvent> {
        self.events
            .lock()
            .await
            .iter()
            .filter(|(t, _)| *t == topic)
            .map(|(_, event)| event.clone())
            .collect()
    }

    pub async fn len(&self) -> usize {
        self.events.lock().await.len()
    }
}

#[async_trait]
impl EventSink for MemorySink {
    async fn publish(&self, topic: Topic, event: AccessEvent) -> Result<()> {
        self.events.lock().await.push((topic, event));
        Ok(())
    }
}

/// Drops every event. Used when no broker is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

#[async_trait]
impl EventSink for NullSink {
    async fn publish(&self, topic: Topic, event: AccessEvent) -> Result<()> {
        debug!(%topic, short_id = %event.short_id, "Discarding access event");
        Ok(())
    }
}
