use jiff::Timestamp;
use serde::{Deserialize, Serialize};
use shortbin_core::UrlRecord;

#[derive(Debug, Deserialize)]
pub struct CreateUrlRequest {
    pub long_url: String,
    #[serde(default)]
    pub expires_at: Option<Timestamp>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateUrlResponse {
    pub short_id: String,
    pub long_url: String,
    pub created_at: Timestamp,
    pub expires_at: Timestamp,
}

impl From<UrlRecord> for CreateUrlResponse {
    fn from(record: UrlRecord) -> Self {
        Self {
            short_id: record.short_id.as_str().to_string(),
            long_url: record.long_url,
            created_at: record.created_at,
            expires_at: record.expires_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}
