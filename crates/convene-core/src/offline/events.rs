use std::collections::BTreeSet;
use std::future::Future;

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::cache::{CacheError, Storage};
use crate::models::Event;

pub const OFFLINE_EVENTS_KEY: &str = "convention_app_offline_events";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncStatus {
    #[default]
    Synced,
    Pending,
    Failed,
}

/// An event kept on the device, with its offline bookkeeping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OfflineEvent {
    #[serde(flatten)]
    pub event: Event,
    /// Pinned: kept even when the server no longer lists it
    #[serde(default)]
    pub is_offline_only: bool,
    #[serde(default)]
    pub sync_status: SyncStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_sync_attempt: Option<DateTime<Utc>>,
}

impl OfflineEvent {
    fn synced(event: Event, is_offline_only: bool) -> Self {
        Self {
            event,
            is_offline_only,
            sync_status: SyncStatus::Synced,
            last_sync_attempt: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OfflineMetadata {
    pub total_events: usize,
    pub categories: Vec<String>,
    pub locations: Vec<String>,
}

/// The stored document under [`OFFLINE_EVENTS_KEY`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OfflineEventData {
    pub events: Vec<OfflineEvent>,
    #[serde(default)]
    pub last_sync: Option<DateTime<Utc>>,
    #[serde(default)]
    pub metadata: OfflineMetadata,
}

fn distinct_categories(events: &[OfflineEvent]) -> Vec<String> {
    events
        .iter()
        .map(|e| e.event.category.as_str().to_string())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

fn distinct_locations(events: &[OfflineEvent]) -> Vec<String> {
    events
        .iter()
        .map(|e| e.event.location.clone())
        .filter(|l| !l.is_empty())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

impl OfflineEventData {
    fn new(events: Vec<OfflineEvent>, last_sync: Option<DateTime<Utc>>) -> Self {
        let metadata = OfflineMetadata {
            total_events: events.len(),
            categories: distinct_categories(&events),
            locations: distinct_locations(&events),
        };
        Self {
            events,
            last_sync,
            metadata,
        }
    }
}

/// Local filter over stored events. Location matches exactly; search covers
/// title, description and location.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OfflineFilter {
    pub category: Option<String>,
    pub location: Option<String>,
    pub search: Option<String>,
    pub offline_only: bool,
}

impl OfflineFilter {
    pub fn matches(&self, event: &OfflineEvent) -> bool {
        if let Some(category) = self.category.as_deref().filter(|c| !c.is_empty()) {
            if event.event.category.as_str() != category {
                return false;
            }
        }
        if let Some(location) = self.location.as_deref().filter(|l| !l.is_empty()) {
            if event.event.location != location {
                return false;
            }
        }
        if let Some(search) = self.search.as_deref().filter(|s| !s.is_empty()) {
            if !event.event.mentions(search, true) {
                return false;
            }
        }
        !self.offline_only || event.is_offline_only
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SyncState {
    #[default]
    Idle,
    Syncing,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageStats {
    pub total_events: usize,
    pub offline_only_events: usize,
    /// Bytes of the serialized event list
    pub storage_size: u64,
    pub last_sync: Option<DateTime<Utc>>,
    pub categories: Vec<String>,
    pub locations: Vec<String>,
}

/// Events kept for offline use, stored as one document.
pub struct OfflineEventStore<S> {
    storage: S,
    state: SyncState,
}

impl<S: Storage> OfflineEventStore<S> {
    pub fn new(storage: S) -> Self {
        Self {
            storage,
            state: SyncState::Idle,
        }
    }

    pub fn sync_state(&self) -> SyncState {
        self.state
    }

    /// Stored document, or an empty one when missing or unreadable.
    pub fn load(&self) -> OfflineEventData {
        let raw = match self.storage.get_item(OFFLINE_EVENTS_KEY) {
            Ok(Some(raw)) => raw,
            Ok(None) => return OfflineEventData::default(),
            Err(e) => {
                warn!(error = %e, "Failed to read offline events");
                return OfflineEventData::default();
            }
        };
        serde_json::from_str(&raw).unwrap_or_else(|e| {
            warn!(error = %e, "Failed to parse offline events");
            OfflineEventData::default()
        })
    }

    fn persist(&self, events: Vec<OfflineEvent>) -> Result<(), CacheError> {
        self.write(OfflineEventData::new(events, Some(Utc::now())))
    }

    fn write(&self, data: OfflineEventData) -> Result<(), CacheError> {
        let contents = serde_json::to_string(&data).map_err(|source| CacheError::Serialize {
            key: OFFLINE_EVENTS_KEY.to_string(),
            source,
        })?;
        self.storage.set_item(OFFLINE_EVENTS_KEY, &contents)?;
        debug!(count = data.metadata.total_events, "Saved offline events");
        Ok(())
    }

    /// Insert or replace an event by id. A pinned event stays pinned.
    pub fn add_event(&self, event: Event) -> Result<(), CacheError> {
        let mut events = self.load().events;
        match events.iter_mut().find(|e| e.event.id == event.id) {
            Some(existing) => *existing = OfflineEvent::synced(event, existing.is_offline_only),
            None => events.push(OfflineEvent::synced(event, false)),
        }
        self.persist(events)
    }

    /// Returns false when no event had that id.
    pub fn remove_event(&self, event_id: &str) -> Result<bool, CacheError> {
        let mut events = self.load().events;
        let before = events.len();
        events.retain(|e| e.event.id != event_id);
        if events.len() == before {
            return Ok(false);
        }
        self.persist(events)?;
        Ok(true)
    }

    /// Pin a stored event so sync keeps it. Returns false when it is not stored.
    pub fn mark_for_offline(&self, event_id: &str) -> Result<bool, CacheError> {
        let mut events = self.load().events;
        let Some(event) = events.iter_mut().find(|e| e.event.id == event_id) else {
            return Ok(false);
        };
        event.is_offline_only = true;
        event.sync_status = SyncStatus::Synced;
        self.persist(events)?;
        Ok(true)
    }

    /// Stored events matching `filter`, earliest first.
    pub fn events(&self, filter: &OfflineFilter) -> Vec<OfflineEvent> {
        let mut events: Vec<OfflineEvent> = self
            .load()
            .events
            .into_iter()
            .filter(|e| filter.matches(e))
            .collect();
        events.sort_by_key(|e| e.event.date);
        events
    }

    /// Replace stored events with the server's list, keeping each event's pin
    /// and appending pinned events the server no longer returns.
    ///
    /// On failure the stored events are marked `failed` and the error is returned.
    pub async fn sync<F, Fut>(&mut self, fetch_fn: F) -> Result<()>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Vec<Event>>>,
    {
        self.state = SyncState::Syncing;

        let server_events = match fetch_fn().await {
            Ok(events) => events,
            Err(e) => {
                warn!(error = %e, "Offline sync failed");
                self.state = SyncState::Error;
                self.mark_failed();
                return Err(e);
            }
        };

        let stored = self.load().events;
        let is_pinned = |id: &str| stored.iter().any(|e| e.event.id == id && e.is_offline_only);

        let mut merged: Vec<OfflineEvent> = server_events
            .iter()
            .map(|event| OfflineEvent::synced(event.clone(), is_pinned(&event.id)))
            .collect();
        let server_count = merged.len();
        merged.extend(
            stored
                .iter()
                .filter(|e| e.is_offline_only && !server_events.iter().any(|se| se.id == e.event.id))
                .cloned(),
        );

        if let Err(e) = self.persist(merged) {
            self.state = SyncState::Error;
            return Err(e.into());
        }

        info!(server = server_count, "Offline events synced");
        self.state = SyncState::Idle;
        Ok(())
    }

    /// Flag stored events as failed. `last_sync` keeps the last successful sync.
    fn mark_failed(&self) {
        let stored = self.load();
        if stored.events.is_empty() {
            return;
        }
        let now = Utc::now();
        let mut events = stored.events;
        for event in &mut events {
            event.sync_status = SyncStatus::Failed;
            event.last_sync_attempt = Some(now);
        }
        if let Err(e) = self.write(OfflineEventData::new(events, stored.last_sync)) {
            warn!(error = %e, "Failed to record sync failure");
        }
    }

    pub fn clear(&self) -> Result<(), CacheError> {
        self.storage.remove_item(OFFLINE_EVENTS_KEY)?;
        Ok(())
    }

    pub fn stats(&self) -> StorageStats {
        let data = self.load();
        let storage_size = serde_json::to_string(&data.events)
            .map(|s| s.len() as u64)
            .unwrap_or(0);

        StorageStats {
            total_events: data.events.len(),
            offline_only_events: data.events.iter().filter(|e| e.is_offline_only).count(),
            storage_size,
            last_sync: data.last_sync,
            categories: distinct_categories(&data.events),
            locations: distinct_locations(&data.events),
        }
    }
}
