//! In-memory activity log.
//!
//! Keeps the most recent [`MAX_LOG_ENTRIES`] entries and mirrors every entry to
//! `tracing`. Nothing is persisted; the log lives as long as its owner.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::Value;

pub const MAX_LOG_ENTRIES: usize = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Info,
    Warn,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub level: LogLevel,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

#[derive(Debug)]
pub struct ActivityLog {
    entries: Mutex<VecDeque<LogEntry>>,
    capacity: usize,
}

impl Default for ActivityLog {
    fn default() -> Self {
        Self::new()
    }
}

impl ActivityLog {
    pub fn new() -> Self {
        Self::with_capacity(MAX_LOG_ENTRIES)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Mutex::new(VecDeque::with_capacity(capacity.min(MAX_LOG_ENTRIES))),
            capacity,
        }
    }

    pub fn info(&self, message: impl Into<String>, data: Option<Value>) {
        self.append(LogLevel::Info, message.into(), data);
    }

    pub fn warn(&self, message: impl Into<String>, data: Option<Value>) {
        self.append(LogLevel::Warn, message.into(), data);
    }

    pub fn error(&self, message: impl Into<String>, data: Option<Value>) {
        self.append(LogLevel::Error, message.into(), data);
    }

    /// Snapshot of the retained entries, oldest first.
    pub fn entries(&self) -> Vec<LogEntry> {
        self.entries.lock().iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    fn append(&self, level: LogLevel, message: String, data: Option<Value>) {
        let payload = data.as_ref().map(Value::to_string).unwrap_or_default();
        match level {
            LogLevel::Info => tracing::info!(data = %payload, "{}", message),
            LogLevel::Warn => tracing::warn!(data = %payload, "{}", message),
            LogLevel::Error => tracing::error!(data = %payload, "{}", message),
        }

        if self.capacity == 0 {
            return;
        }

        let mut entries = self.entries.lock();
        while entries.len() >= self.capacity {
            entries.pop_front();
        }
        entries.push_back(LogEntry {
            timestamp: Utc::now(),
            level,
            message,
            data,
        });
    }
}
