use crate::error::EventError;
use crate::short_id::ShortId;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::sync::Arc;

pub type Result<T> = std::result::Result<T, EventError>;

/// Owner value recorded for links created without an account.
pub const ANONYMOUS_OWNER: &str = "-1";

/// Destination channel of an access event.
///
/// Anonymous traffic is kept apart from per-account traffic so the two can
/// be processed by different consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    /// Links owned by an account.
    Attributed,
    /// Anonymous links, or links whose owner is unknown.
    Public,
}

impl Topic {
    pub fn for_owner(owner: Option<&str>) -> Self {
        match owner {
            Some(owner) if owner != ANONYMOUS_OWNER => Topic::Attributed,
            _ => Topic::Public,
        }
    }
}

impl Display for Topic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Topic::Attributed => f.write_str("attributed"),
            Topic::Public => f.write_str("public"),
        }
    }
}

/// Request metadata captured for analytics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestMeta {
    pub ip_address: String,
    pub user_agent: String,
    pub referer: String,
    pub forwarded_for: String,
    pub request_host: String,
}

/// One resolved redirect, as published to the event broker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessEvent {
    pub short_id: String,
    pub short_created_by: String,
    pub long_url: String,
    pub ip_address: String,
    pub user_agent: String,
    pub referer: String,
    pub x_forwarded_for: String,
    pub request_host: String,
}

impl AccessEvent {
    pub fn new(id: &ShortId, owner: Option<&str>, long_url: &str, meta: RequestMeta) -> Self {
        Self {
            short_id: id.to_string(),
            short_created_by: owner.unwrap_or(ANONYMOUS_OWNER).to_string(),
            long_url: long_url.to_string(),
            ip_address: meta.ip_address,
            user_agent: meta.user_agent,
            referer: meta.referer,
            x_forwarded_for: meta.forwarded_for,
            request_host: meta.request_host,
        }
    }

    /// Routing key; events for one identifier stay ordered on one partition.
    pub fn partition_key(&self) -> &str {
        &self.short_id
    }

    pub fn topic(&self) -> Topic {
        Topic::for_owner(Some(self.short_created_by.as_str()))
    }

    /// Flat string-keyed view of the record.
    pub fn fields(&self) -> [(&'static str, &str); 8] {
        [
            ("short_id", self.short_id.as_str()),
            ("short_created_by", self.short_created_by.as_str()),
            ("long_url", self.long_url.as_str()),
            ("ip_address", self.ip_address.as_str()),
            ("user_agent", self.user_agent.as_str()),
            ("referer", self.referer.as_str()),
            ("x_forwarded_for", self.x_forwarded_for.as_str()),
            ("request_host", self.request_host.as_str()),
        ]
    }
}

/// Best-effort publisher of access events.
///
/// Implementations give no delivery guarantee to the caller; an `Err` only
/// says this attempt failed.
#[async_trait]
pub trait EventSink: Send + Sync + 'static {
    async fn publish(&self, topic: Topic, event: AccessEvent) -> Result<()>;
}

#[async_trait]
impl<T: EventSink + ?Sized> EventSink for Arc<T> {
    async fn publish(&self, topic: Topic, event: AccessEvent) -> Result<()> {
        (**self).publish(topic, event).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn anonymous_owner_routes_to_public() {
        assert_eq!(Topic::for_owner(None), Topic::Public);
        assert_eq!(Topic::for_owner(Some(ANONYMOUS_OWNER)), Topic::Public);
        assert_eq!(Topic::for_owner(Some("user-1")), Topic::Attributed);
    }

    #[test]
    fn event_uses_sentinel_for_unknown_owner() {
        let id = ShortId::new_unchecked("abc123");
        let event = AccessEvent::new(&id, None, "https://example.com", RequestMeta::default());

        assert_eq!(event.short_created_by, ANONYMOUS_OWNER);
        assert_eq!(event.topic(), Topic::Public);
        assert_eq!(event.partition_key(), "abc123");
    }

    #[test]
    fn fields_cover_every_attribute() {
        let id = ShortId::new_unchecked("abc123");
        let meta = RequestMeta {
            ip_address: "10.0.0.1".to_string(),
            user_agent: "curl/8".to_string(),
            referer: "https://ref.example".to_string(),
            forwarded_for: "1.2.3.4".to_string(),
            request_host: "short.bin".to_string(),
        };
        let event = AccessEvent::new(&id, Some("user-1"), "https://example.com", meta);

        let fields = event.fields();
        assert_eq!(fields.len(), 8);
        assert!(fields.contains(&("short_created_by", "user-1")));
        assert!(fields.contains(&("x_forwarded_for", "1.2.3.4")));
        assert_eq!(event.topic(), Topic::Attributed);
    }
}
