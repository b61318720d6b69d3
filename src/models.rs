use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Sentinel stored when a click carries no referrer.
pub const DIRECT_SOURCE: &str = "Direct";

/// Sentinel stored when no location could be acquired.
pub const UNKNOWN_LOCATION: &str = "Unknown";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShortUrlRecord {
    pub id: String,
    pub original_url: String,
    pub short_code: String,
    pub short_url: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub is_custom: bool,
    pub clicks: Vec<ClickRecord>,
    pub is_expired: bool,
}

impl ShortUrlRecord {
    /// True once `now` is past the validity window.
    pub fn has_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }

    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        !self.is_expired && !self.has_expired_at(now)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClickRecord {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub source: String,
    pub location: String,
    pub user_agent: String,
    pub referrer: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateUrlRequest {
    pub original_url: String,
    pub custom_short_code: Option<String>,
    pub validity_minutes: Option<f64>,
}

#[derive(Debug, Serialize)]
pub struct ListUrlsResponse {
    pub urls: Vec<ShortUrlRecord>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchEntryResult {
    pub index: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub record: Option<ShortUrlRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct BatchCreateResponse {
    pub results: Vec<BatchEntryResult>,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub version: String,
}
