//! The short-URL registry.
//!
//! Records are kept in insertion order and looked up by a linear scan. Every
//! mutation rewrites the whole registry into the store as a single JSON
//! snapshot while the state lock is held.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Utc};
use serde_json::json;
use tokio::sync::Mutex;
use url::Url;
use uuid::Uuid;

use crate::clock::{Clock, SystemClock};
use crate::error::{RegistryError, Result};
use crate::geo::{resolve_location, ClientReported, Geolocator, RedirectContext};
use crate::logger::ActivityLog;
use crate::models::{ClickRecord, CreateUrlRequest, ShortUrlRecord, DIRECT_SOURCE};
use crate::stats::{Statistics, StatsResponse};
use crate::store::{KeyValueStore, STORAGE_KEY};
use crate::token::{is_valid_short_code, TokenGenerator, DEFAULT_CODE_LENGTH};

pub const DEFAULT_BASE_ADDRESS: &str = "http://localhost:3000";
pub const DEFAULT_VALIDITY_MINUTES: i64 = 30;
pub const DEFAULT_MAX_CODE_ATTEMPTS: usize = 100;

const UNKNOWN_USER_AGENT: &str = "Unknown";

#[derive(Debug, Clone)]
pub struct RegistryOptions {
    pub base_address: String,
    pub default_validity_minutes: i64,
    pub code_length: usize,
    pub max_code_attempts: usize,
    pub geolocation_timeout: StdDuration,
}

impl Default for RegistryOptions {
    fn default() -> Self {
        Self {
            base_address: DEFAULT_BASE_ADDRESS.to_string(),
            default_validity_minutes: DEFAULT_VALIDITY_MINUTES,
            code_length: DEFAULT_CODE_LENGTH,
            max_code_attempts: DEFAULT_MAX_CODE_ATTEMPTS,
            geolocation_timeout: crate::geo::DEFAULT_GEOLOCATION_TIMEOUT,
        }
    }
}

pub struct RegistryBuilder {
    store: Arc<dyn KeyValueStore>,
    log: Arc<ActivityLog>,
    clock: Arc<dyn Clock>,
    geolocator: Arc<dyn Geolocator>,
    options: RegistryOptions,
}

impl RegistryBuilder {
    pub fn log(mut self, log: Arc<ActivityLog>) -> Self {
        self.log = log;
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn geolocator(mut self, geolocator: Arc<dyn Geolocator>) -> Self {
        self.geolocator = geolocator;
        self
    }

    pub fn options(mut self, options: RegistryOptions) -> Self {
        self.options = options;
        self
    }

    /// Restores the registry from the store. Missing or unreadable data starts
    /// an empty registry instead of failing.
    pub async fn load(self) -> UrlRegistry {
        let records = load_records(self.store.as_ref(), &self.log).await;

        self.log.info("URL Shortener Service initialized", None);

        UrlRegistry {
            records: Mutex::new(records),
            tokens: TokenGenerator::with_length(self.options.code_length),
            store: self.store,
            log: self.log,
            clock: self.clock,
            geolocator: self.geolocator,
            options: self.options,
        }
    }
}

pub struct UrlRegistry {
    records: Mutex<Vec<ShortUrlRecord>>,
    store: Arc<dyn KeyValueStore>,
    log: Arc<ActivityLog>,
    clock: Arc<dyn Clock>,
    geolocator: Arc<dyn Geolocator>,
    tokens: TokenGenerator,
    options: RegistryOptions,
}

impl UrlRegistry {
    pub fn builder(store: Arc<dyn KeyValueStore>) -> RegistryBuilder {
        RegistryBuilder {
            store,
            log: Arc::new(ActivityLog::new()),
            clock: Arc::new(SystemClock),
            geolocator: Arc::new(ClientReported),
            options: RegistryOptions::default(),
        }
    }

    pub fn log(&self) -> &Arc<ActivityLog> {
        &self.log
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub async fn create_from(&self, request: &CreateUrlRequest) -> Result<ShortUrlRecord> {
        self.create(
            &request.original_url,
            request.custom_short_code.as_deref(),
            request.validity_minutes,
        )
        .await
    }

    pub async fn create(
        &self,
        original_url: &str,
        custom_short_code: Option<&str>,
        validity_minutes: Option<f64>,
    ) -> Result<ShortUrlRecord> {
        self.log.info(
            "Creating short URL",
            Some(json!({
                "originalUrl": original_url,
                "customShortCode": custom_short_code,
                "validityMinutes": validity_minutes,
            })),
        );

        if Url::parse(original_url).is_err() {
            return Err(self.fail(
                RegistryError::InvalidUrl(original_url.to_string()),
                json!({ "url": original_url }),
            ));
        }

        let validity =
            validity_minutes.unwrap_or(self.options.default_validity_minutes as f64);
        let window = match validity_window(validity) {
            Some(window) => window,
            None => {
                return Err(self.fail(
                    RegistryError::InvalidValidity(validity),
                    json!({ "validity": validity }),
                ))
            }
        };

        // An empty custom code is the same as none.
        let custom_short_code = custom_short_code.filter(|code| !code.is_empty());

        let mut records = self.records.lock().await;

        let short_code = match custom_short_code {
            Some(code) => {
                if !is_valid_short_code(code) {
                    return Err(self.fail(
                        RegistryError::InvalidShortCode(code.to_string()),
                        json!({ "shortCode": code }),
                    ));
                }
                if find(&records, code).is_some() {
                    return Err(self.fail(
                        RegistryError::ShortCodeTaken(code.to_string()),
                        json!({ "shortCode": code }),
                    ));
                }
                code.to_string()
            }
            None => {
                let attempts = self.options.max_code_attempts;
                match self
                    .tokens
                    .generate_unique(attempts, |code| find(&records, code).is_some())
                {
                    Some(code) => code,
                    None => {
                        return Err(self.fail(
                            RegistryError::CodeSpaceExhausted(attempts),
                            json!({ "attempts": attempts, "count": records.len() }),
                        ))
                    }
                }
            }
        };

        let now = self.clock.now();
        let expires_at = match now.checked_add_signed(window) {
            Some(at) => at,
            None => {
                return Err(self.fail(
                    RegistryError::InvalidValidity(validity),
                    json!({ "validity": validity }),
                ))
            }
        };

        let record = ShortUrlRecord {
            id: Uuid::new_v4().to_string(),
            original_url: original_url.to_string(),
            short_url: self.short_url_for(&short_code),
            short_code,
            created_at: now,
            expires_at,
            is_custom: custom_short_code.is_some(),
            clicks: Vec::new(),
            is_expired: false,
        };

        records.push(record.clone());
        self.persist(&records).await;

        self.log.info(
            "Short URL created successfully",
            Some(json!({
                "shortCode": record.short_code,
                "originalUrl": record.original_url,
            })),
        );
        Ok(record)
    }

    /// Resolves a short code, recording a click on success.
    ///
    /// An expired record is flagged and persisted before the error is returned.
    /// The location lookup runs without holding the state lock.
    pub async fn redirect(&self, short_code: &str, ctx: RedirectContext) -> Result<String> {
        self.log
            .info("Handling redirect", Some(json!({ "shortCode": short_code })));

        let record_id = {
            let mut records = self.records.lock().await;
            let now = self.clock.now();

            let (record_id, expired) = match find_mut(&mut records, short_code) {
                None => {
                    return Err(self.fail(
                        RegistryError::NotFound(short_code.to_string()),
                        json!({ "shortCode": short_code }),
                    ))
                }
                Some(record) if record.has_expired_at(now) => {
                    record.is_expired = true;
                    (record.id.clone(), true)
                }
                Some(record) => (record.id.clone(), false),
            };

            if expired {
                self.persist(&records).await;
                return Err(self.fail(
                    RegistryError::Expired(short_code.to_string()),
                    json!({ "shortCode": short_code }),
                ));
            }
            record_id
        };

        let location = resolve_location(
            self.geolocator.as_ref(),
            &ctx,
            self.options.geolocation_timeout,
        )
        .await;

        let referrer = ctx
            .referrer
            .filter(|r| !r.is_empty())
            .unwrap_or_else(|| DIRECT_SOURCE.to_string());

        let click = ClickRecord {
            id: Uuid::new_v4().to_string(),
            timestamp: self.clock.now(),
            source: referrer.clone(),
            location,
            user_agent: ctx
                .user_agent
                .filter(|ua| !ua.is_empty())
                .unwrap_or_else(|| UNKNOWN_USER_AGENT.to_string()),
            referrer,
        };

        let mut records = self.records.lock().await;
        let current = records
            .iter_mut()
            .find(|r| r.short_code == short_code && r.id == record_id);
        let original_url = match current {
            Some(record) => {
                record.clicks.push(click.clone());
                record.original_url.clone()
            }
            // Deleted, or deleted and re-created, while the location was being resolved.
            None => {
                return Err(self.fail(
                    RegistryError::NotFound(short_code.to_string()),
                    json!({ "shortCode": short_code }),
                ))
            }
        };
        self.persist(&records).await;

        self.log.info(
            "Click recorded",
            Some(json!({ "shortCode": short_code, "clickData": click })),
        );
        Ok(original_url)
    }

    /// All records, newest first. Expiry flags are refreshed in memory only.
    pub async fn list_all(&self) -> Vec<ShortUrlRecord> {
        let mut records = self.records.lock().await;
        let now = self.clock.now();

        for record in records.iter_mut() {
            if record.has_expired_at(now) {
                record.is_expired = true;
            }
        }

        let mut sorted = records.clone();
        sorted.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        sorted
    }

    pub async fn lookup(&self, short_code: &str) -> Option<ShortUrlRecord> {
        let records = self.records.lock().await;
        find(&records, short_code).cloned()
    }

    pub async fn delete(&self, short_code: &str) -> bool {
        let mut records = self.records.lock().await;
        let Some(index) = records.iter().position(|r| r.short_code == short_code) else {
            return false;
        };

        records.remove(index);
        self.persist(&records).await;

        self.log
            .info("URL deleted", Some(json!({ "shortCode": short_code })));
        true
    }

    /// Dashboard aggregates plus the listing they were computed from.
    pub async fn statistics(&self) -> StatsResponse {
        let urls = self.list_all().await;
        let summary = Statistics::from_records(&urls, self.now());
        self.log
            .info("Statistics loaded", Some(json!({ "count": urls.len() })));
        StatsResponse { summary, urls }
    }

    fn short_url_for(&self, short_code: &str) -> String {
        format!(
            "{}/{}",
            self.options.base_address.trim_end_matches('/'),
            short_code
        )
    }

    /// Writes the full snapshot. A failed write is logged; memory stays authoritative.
    async fn persist(&self, records: &[ShortUrlRecord]) {
        let result = match serde_json::to_string(records) {
            Ok(blob) => self.store.put(STORAGE_KEY, &blob).await,
            Err(e) => Err(RegistryError::StorageWrite(e.to_string())),
        };

        match result {
            Ok(()) => self
                .log
                .info("Saved URLs to storage", Some(json!({ "count": records.len() }))),
            Err(e) => self.log.error(
                "Failed to save URLs to storage",
                Some(json!({ "error": e.to_string() })),
            ),
        }
    }

    fn fail(&self, err: RegistryError, data: serde_json::Value) -> RegistryError {
        self.log.error(err.to_string(), Some(data));
        err
    }
}

/// Whole milliseconds of a positive, finite minute count; `None` otherwise.
fn validity_window(minutes: f64) -> Option<Duration> {
    if !minutes.is_finite() || minutes <= 0.0 {
        return None;
    }
    let millis = (minutes * 60_000.0).round();
    if millis < 1.0 || millis > i64::MAX as f64 {
        return None;
    }
    Duration::try_milliseconds(millis as i64)
}

fn find<'a>(records: &'a [ShortUrlRecord], short_code: &str) -> Option<&'a ShortUrlRecord> {
    records.iter().find(|r| r.short_code == short_code)
}

fn find_mut<'a>(
    records: &'a mut [ShortUrlRecord],
    short_code: &str,
) -> Option<&'a mut ShortUrlRecord> {
    records.iter_mut().find(|r| r.short_code == short_code)
}

async fn load_records(store: &dyn KeyValueStore, log: &ActivityLog) -> Vec<ShortUrlRecord> {
    let blob = match store.get(STORAGE_KEY).await {
        Ok(Some(blob)) => blob,
        Ok(None) => return Vec::new(),
        Err(e) => {
            log.error(
                "Failed to load URLs from storage",
                Some(json!({ "error": e.to_string() })),
            );
            return Vec::new();
        }
    };

    let stored: Vec<ShortUrlRecord> = match serde_json::from_str(&blob) {
        Ok(stored) => stored,
        Err(e) => {
            log.error(
                "Failed to load URLs from storage",
                Some(json!({ "error": e.to_string() })),
            );
            return Vec::new();
        }
    };

    // Rebuild keyed by short code: a later duplicate replaces the earlier one in place.
    let mut records: Vec<ShortUrlRecord> = Vec::with_capacity(stored.len());
    for record in stored {
        match find_mut(&mut records, &record.short_code) {
            Some(existing) => *existing = record,
            None => records.push(record),
        }
    }

    log.info(
        "Loaded URLs from storage",
        Some(json!({ "count": records.len() })),
    );
    records
}
