use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::models::ShortUrlRecord;

/// Dashboard aggregates over the whole registry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Statistics {
    pub total_urls: usize,
    pub total_clicks: usize,
    pub active_urls: usize,
    pub top_clicks: usize,
}

impl Statistics {
    pub fn from_records(records: &[ShortUrlRecord], now: DateTime<Utc>) -> Self {
        Self {
            total_urls: records.len(),
            total_clicks: records.iter().map(|r| r.clicks.len()).sum(),
            active_urls: records.iter().filter(|r| r.is_active_at(now)).count(),
            top_clicks: records.iter().map(|r| r.clicks.len()).max().unwrap_or(0),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub summary: Statistics,
    pub urls: Vec<ShortUrlRecord>,
}
