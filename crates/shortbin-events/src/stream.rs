use std::time::Duration;

use async_trait::async_trait;
use redis::streams::StreamMaxlen;
use redis::AsyncCommands;
use shortbin_core::events::{AccessEvent, EventSink, Result, Topic};
use shortbin_core::EventError;
use tracing::{debug, warn};
use typed_builder::TypedBuilder;

/// Where and how access events are appended.
///
/// Each [`Topic`] maps to its own stream key: `{prefix}{topic name}`.
#[derive(Debug, Clone, TypedBuilder)]
pub struct RedisStreamSettings {
    #[builder(default = "sb:events:".to_string(), setter(into))]
    pub key_prefix: String,
    #[builder(default = "clicks".to_string(), setter(into))]
    pub attributed_topic: String,
    #[builder(default = "public_clicks".to_string(), setter(into))]
    pub public_topic: String,
    /// Approximate cap on stream length; older entries are trimmed.
    #[builder(default = 100_000)]
    pub max_len: usize,
    #[builder(default = Duration::from_secs(3))]
    pub publish_timeout: Duration,
}

impl Default for RedisStreamSettings {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl RedisStreamSettings {
    pub fn stream_key(&self, topic: Topic) -> String {
        let name = match topic {
            Topic::Attributed => &self.attributed_topic,
            Topic::Public => &self.public_topic,
        };
        format!("{}{}", self.key_prefix, name)
    }
}

fn map_redis_error(err: redis::RedisError) -> EventError {
    let message = err.to_string();
    if err.is_timeout() {
        EventError::Timeout(message)
    } else if err.is_io_error() || err.is_connection_dropped() || err.is_connection_refusal() {
        EventError::Unavailable(message)
    } else {
        EventError::Operation(message)
    }
}

/// Appends access events to Redis streams.
///
/// One `XADD` per event. The partition key travels as a field so consumers
/// can shard on it.
#[derive(Debug, Clone)]
pub struct RedisStreamSink {
    conn: redis::aio::MultiplexedConnection,
    settings: RedisStreamSettings,
}

impl RedisStreamSink {
    pub fn new(conn: redis::aio::MultiplexedConnection, settings: RedisStreamSettings) -> Self {
        Self { conn, settings }
    }

    pub async fn connect(url: &str, settings: RedisStreamSettings) -> Result<Self> {
        let client = redis::Client::open(url).map_err(map_redis_error)?;
        let conn = client
            .get_multiplexed_async_connection()
            .await
            .map_err(map_redis_error)?;
        Ok(Self::new(conn, settings))
    }
}

#[async_trait]
impl EventSink for RedisStreamSink {
    async fn publish(&self, topic: Topic, event: AccessEvent) -> Result<()> {
        let key = self.settings.stream_key(topic);
        let mut items: Vec<(&str, &str)> = Vec::with_capacity(9);
        items.push(("partition_key", event.partition_key()));
        items.extend(event.fields());

        let mut conn = self.conn.clone();
        let append = async {
            let entry_id: redis::RedisResult<String> = conn
                .xadd_maxlen(
                    &key,
                    StreamMaxlen::Approx(self.settings.max_len),
                    "*",
                    &items,
                )
                .await;
            entry_id
        };

        match tokio::time::timeout(self.settings.publish_timeout, append).await {
            Ok(Ok(entry_id)) => {
                debug!(stream = %key, entry_id = %entry_id, short_id = %event.short_id, "Published access event");
                Ok(())
            }
            Ok(Err(e)) => {
                warn!(stream = %key, error = %e, "Failed to publish access event");
                Err(map_redis_error(e))
            }
            Err(_) => Err(EventError::Timeout(format!(
                "publish to {key} exceeded {:?}",
                self.settings.publish_timeout
            ))),
        }
    }
}
