use std::future::Future;
use std::time::Duration;

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, warn};

use super::entry::{now_millis, CacheEntry, DEFAULT_TTL};
use super::storage::Storage;
use super::CacheError;
use crate::filters::EventFilters;

/// Prefix shared by every key this application writes.
pub const APP_KEY_PREFIX: &str = "convention_app_";

pub fn cache_key(name: &str) -> String {
    format!("{}{}", APP_KEY_PREFIX, name)
}

/// One cache slot per distinct filter combination.
pub fn events_key(filters: &EventFilters) -> String {
    cache_key(&format!("events?{}", filters.to_query_string()))
}

pub fn announcements_key() -> String {
    cache_key("announcements")
}

pub fn favorites_key() -> String {
    cache_key("favorites")
}

/// Where a value returned by [`OfflineCache::fetch_with`] came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataSource {
    /// Fresh cache hit, no fetch performed
    Cache,
    /// Fetched just now and written to the cache
    Network,
    /// Fetch failed; last-known cached value served regardless of age
    StaleCache,
    /// Fetch failed with nothing cached; configured fallback served
    Fallback,
}

#[derive(Debug, Clone)]
pub struct Fetched<T> {
    pub data: T,
    pub source: DataSource,
    pub last_updated: Option<DateTime<Utc>>,
}

impl<T> Fetched<T> {
    fn from_entry(entry: CacheEntry<T>, source: DataSource) -> Self {
        let last_updated = entry.cached_at();
        Self {
            data: entry.data,
            source,
            last_updated,
        }
    }

    pub fn is_from_cache(&self) -> bool {
        matches!(self.source, DataSource::Cache | DataSource::StaleCache)
    }
}

/// Per-call settings: key, TTL and an optional value to serve when nothing else is available.
#[derive(Debug, Clone)]
pub struct CacheOptions<T> {
    pub key: String,
    pub ttl: Duration,
    pub fallback: Option<T>,
}

impl<T> CacheOptions<T> {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            ttl: DEFAULT_TTL,
            fallback: None,
        }
    }

    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn fallback(mut self, value: T) -> Self {
        self.fallback = Some(value);
        self
    }
}

/// TTL cache wrapper with stale-while-revalidate fallback.
///
/// Reads serve fresh entries directly; misses and stale entries trigger the
/// caller's fetch function, whose result is persisted with the current
/// timestamp. When the fetch fails, the last-known value is served no matter
/// how old it is. Storage problems are logged and behave like a cache miss.
pub struct OfflineCache<S> {
    storage: S,
}

impl<S: Storage> OfflineCache<S> {
    pub fn new(storage: S) -> Self {
        Self { storage }
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// Read an entry without evicting it. Storage and parse errors count as a miss.
    fn peek<T: DeserializeOwned>(&self, key: &str) -> Option<CacheEntry<T>> {
        let raw = match self.storage.get_item(key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                warn!(key, error = %e, "Failed to read cache entry, treating as miss");
                return None;
            }
        };

        match serde_json::from_str(&raw) {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!(key, error = %e, "Failed to parse cache entry, treating as miss");
                None
            }
        }
    }

    fn write<T: Serialize>(&self, key: &str, data: &T, ttl: Duration) -> Result<i64, CacheError> {
        let entry = CacheEntry::new(data, ttl);
        let contents = serde_json::to_string(&entry).map_err(|source| CacheError::Serialize {
            key: key.to_string(),
            source,
        })?;
        self.storage.set_item(key, &contents)?;
        Ok(entry.timestamp)
    }

    /// Fresh entry for `key`, if any. A stale entry is evicted and reported as a miss.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<CacheEntry<T>> {
        let entry = self.peek::<T>(key)?;
        if entry.is_stale() {
            debug!(key, "Evicting stale cache entry");
            if let Err(e) = self.storage.remove_item(key) {
                warn!(key, error = %e, "Failed to evict stale cache entry");
            }
            return None;
        }
        Some(entry)
    }

    pub fn save<T: Serialize>(&self, key: &str, data: &T, ttl: Duration) -> Result<(), CacheError> {
        self.write(key, data, ttl).map(|_| ())
    }

    /// Remove the entry for `key` regardless of age.
    pub fn clear(&self, key: &str) -> Result<(), CacheError> {
        debug!(key, "Clearing cache entry");
        self.storage.remove_item(key)?;
        Ok(())
    }

    /// When `key` was last written, fresh or not.
    pub fn last_updated(&self, key: &str) -> Option<DateTime<Utc>> {
        self.peek::<serde_json::Value>(key)
            .and_then(|entry| entry.cached_at())
    }

    /// True when there is no entry or it has outlived its TTL.
    pub fn is_stale(&self, key: &str) -> bool {
        match self.peek::<serde_json::Value>(key) {
            Some(entry) => entry.is_stale_at(now_millis()),
            None => true,
        }
    }

    /// Serve `key` from cache when fresh, otherwise fetch, persist and return.
    ///
    /// If the fetch fails, the previously cached value is returned even when
    /// stale; with nothing cached the fetch error is propagated.
    pub async fn fetch_data<T, F, Fut>(
        &self,
        key: &str,
        ttl: Duration,
        fetch_fn: F,
        force_refresh: bool,
    ) -> Result<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let options = CacheOptions::new(key).ttl(ttl);
        self.fetch_with(options, fetch_fn, force_refresh)
            .await
            .map(|fetched| fetched.data)
    }

    /// [`fetch_data`](Self::fetch_data) with `force_refresh` set.
    pub async fn refresh<T, F, Fut>(&self, key: &str, ttl: Duration, fetch_fn: F) -> Result<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        self.fetch_data(key, ttl, fetch_fn, true).await
    }

    /// Like [`fetch_data`](Self::fetch_data) but reports provenance and honours a fallback value.
    pub async fn fetch_with<T, F, Fut>(
        &self,
        options: CacheOptions<T>,
        fetch_fn: F,
        force_refresh: bool,
    ) -> Result<Fetched<T>>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let CacheOptions { key, ttl, fallback } = options;

        // Not evicted here: a stale entry is still the fallback if the fetch fails
        let cached = match self.peek::<T>(&key) {
            Some(entry) if !force_refresh && !entry.is_stale() => {
                debug!(key = %key, "Cache hit");
                return Ok(Fetched::from_entry(entry, DataSource::Cache));
            }
            other => other,
        };

        debug!(key = %key, force_refresh, has_cached = cached.is_some(), "Fetching fresh data");

        match fetch_fn().await {
            Ok(data) => {
                let last_updated = match self.write(&key, &data, ttl) {
                    Ok(timestamp) => DateTime::from_timestamp_millis(timestamp),
                    Err(e) => {
                        warn!(key = %key, error = %e, "Failed to write cache entry");
                        Some(Utc::now())
                    }
                };
                Ok(Fetched {
                    data,
                    source: DataSource::Network,
                    last_updated,
                })
            }
            Err(err) => {
                if let Some(entry) = cached {
                    warn!(key = %key, error = %err, age = %entry.age_display(), "Fetch failed, serving cached data");
                    return Ok(Fetched::from_entry(entry, DataSource::StaleCache));
                }
                if let Some(data) = fallback {
                    warn!(key = %key, error = %err, "Fetch failed with nothing cached, serving fallback");
                    return Ok(Fetched {
                        data,
                        source: DataSource::Fallback,
                        last_updated: None,
                    });
                }
                Err(err)
            }
        }
    }

    fn app_keys(&self) -> Result<Vec<String>, CacheError> {
        Ok(self
            .storage
            .keys()?
            .into_iter()
            .filter(|key| key.starts_with(APP_KEY_PREFIX))
            .collect())
    }

    /// Remove every application key. Returns how many were removed.
    pub fn clear_all(&self) -> Result<usize, CacheError> {
        let keys = self.app_keys()?;
        for key in &keys {
            self.storage.remove_item(key)?;
        }
        debug!(count = keys.len(), "Cleared application cache");
        Ok(keys.len())
    }

    /// Total bytes stored under application keys. Errors are logged and count as zero.
    pub fn storage_size(&self) -> u64 {
        let keys = match self.app_keys() {
            Ok(keys) => keys,
            Err(e) => {
                warn!(error = %e, "Failed to list cache keys");
                return 0;
            }
        };

        keys.iter()
            .map(|key| match self.storage.get_item(key) {
                Ok(Some(value)) => value.len() as u64,
                Ok(None) => 0,
                Err(e) => {
                    debug!(key = %key, error = %e, "Failed to read cache entry for size");
                    0
                }
            })
            .sum()
    }

    /// Application keys with their age, for status displays.
    pub fn entries(&self) -> Vec<CacheStatus> {
        let keys = match self.app_keys() {
            Ok(keys) => keys,
            Err(e) => {
                warn!(error = %e, "Failed to list cache keys");
                return Vec::new();
            }
        };

        // offline documents share the prefix but are not TTL entries; skip them quietly
        keys.into_iter()
            .filter_map(|key| {
                let raw = self.storage.get_item(&key).ok()??;
                let entry: CacheEntry<serde_json::Value> = serde_json::from_str(&raw).ok()?;
                Some(CacheStatus {
                    age: entry.age_display(),
                    stale: entry.is_stale(),
                    key,
                })
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheStatus {
    pub key: String,
    pub age: String,
    pub stale: bool,
}
