use jiff::Timestamp;
use serde::{Deserialize, Serialize};
use shortbin_core::{UrlRecord, ANONYMOUS_OWNER};

/// What the read cache stores for one short id.
///
/// Encoded as JSON. [`CachedTarget::decode`] also reads the older
/// `owner;url` / `url` string form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedTarget {
    pub owner: Option<String>,
    pub url: String,
    #[serde(default)]
    pub expires_at: Option<Timestamp>,
}

impl CachedTarget {
    pub fn encode(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    /// Returns `None` when the value is neither JSON nor a usable legacy string.
    pub fn decode(raw: &str) -> Option<Self> {
        if raw.starts_with('{') {
            return serde_json::from_str(raw).ok();
        }
        if raw.is_empty() {
            return None;
        }

        // Legacy form: split on the first ';' only.
        let (owner, url) = match raw.split_once(';') {
            Some((owner, url)) => (normalize_owner(owner), url),
            None => (None, raw),
        };
        if url.is_empty() {
            return None;
        }

        Some(Self {
            owner,
            url: url.to_string(),
            expires_at: None,
        })
    }

    pub fn is_expired_at(&self, now: Timestamp) -> bool {
        self.expires_at.is_some_and(|at| now >= at)
    }
}

fn normalize_owner(owner: &str) -> Option<String> {
    match owner {
        "" | ANONYMOUS_OWNER => None,
        owner => Some(owner.to_string()),
    }
}

impl From<&UrlRecord> for CachedTarget {
    fn from(record: &UrlRecord) -> Self {
        Self {
            owner: record.owner_id.clone(),
            url: record.long_url.clone(),
            expires_at: Some(record.expires_at),
        }
    }
}
