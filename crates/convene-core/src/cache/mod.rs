//! Local caching module for offline data access.
//!
//! This module provides the `OfflineCache` TTL wrapper for storing and
//! retrieving API responses locally. Each entry records when it was written
//! and its TTL (5 minutes by default); stale entries are still served when a
//! refresh fails.
//!
//! Cached data types include:
//! - Event listings (one entry per filter combination)
//! - Announcements
//! - Favorites

pub mod entry;
pub mod manager;
pub mod storage;

use thiserror::Error;

pub use entry::{CacheEntry, DEFAULT_TTL};
pub use manager::{
    announcements_key, cache_key, events_key, favorites_key, CacheOptions, CacheStatus,
    DataSource, Fetched, OfflineCache, APP_KEY_PREFIX,
};
pub use storage::{FileStorage, MemoryStorage, Storage, StorageError};

#[derive(Error, Debug)]
pub enum CacheError {
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("Failed to serialize cache entry '{key}': {source}")]
    Serialize {
        key: String,
        #[source]
        source: serde_json::Error,
    },
}
