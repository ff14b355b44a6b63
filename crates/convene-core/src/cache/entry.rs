use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::utils::format_age;

/// TTL used when a caller does not supply one (5 minutes).
pub const DEFAULT_TTL: Duration = Duration::from_secs(5 * 60);

/// A cached value together with when it was written and how long it stays fresh.
///
/// Serialized as `{"data": ..., "timestamp": <epoch ms>, "ttl": <ms>}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry<T> {
    pub data: T,
    /// Epoch milliseconds at write time
    pub timestamp: i64,
    /// Fixed when the entry is written
    pub ttl: u64,
}

/// Current time in epoch milliseconds.
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// An entry is stale once strictly more than `ttl` milliseconds have elapsed since `timestamp`.
pub fn is_stale(now: i64, timestamp: i64, ttl: u64) -> bool {
    i128::from(now) - i128::from(timestamp) > i128::from(ttl)
}

impl<T> CacheEntry<T> {
    pub fn new(data: T, ttl: Duration) -> Self {
        Self::at(data, ttl, now_millis())
    }

    pub fn at(data: T, ttl: Duration, timestamp: i64) -> Self {
        Self {
            data,
            timestamp,
            ttl: u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX),
        }
    }

    pub fn is_stale_at(&self, now: i64) -> bool {
        is_stale(now, self.timestamp, self.ttl)
    }

    pub fn is_stale(&self) -> bool {
        self.is_stale_at(now_millis())
    }

    pub fn ttl(&self) -> Duration {
        Duration::from_millis(self.ttl)
    }

    pub fn cached_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(self.timestamp)
    }

    pub fn age_minutes_at(&self, now: i64) -> i64 {
        (now - self.timestamp) / 60_000
    }

    pub fn age_display(&self) -> String {
        format_age(self.age_minutes_at(now_millis()))
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> CacheEntry<U> {
        CacheEntry {
            data: f(self.data),
            timestamp: self.timestamp,
            ttl: self.ttl,
        }
    }
}
