//! Offline event store and favorites.
//!
//! Unlike the TTL cache, data here does not expire. Events pinned for
//! offline use survive a sync even after the server stops returning them,
//! and favorites can be toggled without a connection.

pub mod events;
pub mod favorites;

pub use events::{
    OfflineEvent, OfflineEventData, OfflineEventStore, OfflineFilter, OfflineMetadata,
    StorageStats, SyncState, SyncStatus, OFFLINE_EVENTS_KEY,
};
pub use favorites::{OfflineFavorites, OFFLINE_FAVORITES_KEY};
