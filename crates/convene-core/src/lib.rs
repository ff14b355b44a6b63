//! Core library for convene.
//!
//! Provides the pieces an offline-first convention client needs:
//!
//! - `api`: typed REST client for the events backend
//! - `cache`: TTL cache with stale-while-revalidate fallback over pluggable storage
//! - `filters`: event filter/sort/pagination and query-string building
//! - `offline`: pinned offline events and offline favorites
//! - `auth`: persisted bearer-token session
//! - `config`: application configuration and directories

pub mod api;
pub mod auth;
pub mod cache;
pub mod config;
pub mod filters;
pub mod models;
pub mod offline;
pub mod utils;

pub use api::{ApiClient, ApiError};
pub use cache::{CacheEntry, CacheOptions, DataSource, Fetched, OfflineCache};
pub use config::Config;
pub use auth::Session;
pub use filters::{EventFilters, EventPage, Pagination, SortBy, SortOrder};
pub use offline::{OfflineEventStore, OfflineFavorites};
