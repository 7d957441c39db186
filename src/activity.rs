//! Activity Log - append-only in-memory record of user-visible events and
//! swallowed failures

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Mutex;

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum ActivityLevel {
    Info,
    Warn,
    Error,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ActivityEntry {
    /// Unix millis
    pub timestamp: i64,
    pub level: ActivityLevel,
    pub message: String,
}

/// Append-only diagnostic log. Entries are never mutated or evicted for the
/// lifetime of the session.
#[derive(Debug, Default)]
pub struct ActivityLog {
    entries: Mutex<Vec<ActivityEntry>>,
}

impl ActivityLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, level: ActivityLevel, message: impl Into<String>) {
        let entry = ActivityEntry {
            timestamp: Utc::now().timestamp_millis(),
            level,
            message: message.into(),
        };
        self.entries.lock().unwrap().push(entry);
    }

    pub fn info(&self, message: impl Into<String>) {
        self.record(ActivityLevel::Info, message);
    }

    pub fn warn(&self, message: impl Into<String>) {
        self.record(ActivityLevel::Warn, message);
    }

    pub fn error(&self, message: impl Into<String>) {
        self.record(ActivityLevel::Error, message);
    }

    pub fn entries(&self) -> Vec<ActivityEntry> {
        self.entries.lock().unwrap().clone()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
