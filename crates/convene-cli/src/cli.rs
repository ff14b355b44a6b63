//! Command-line interface parsing for convene.
//!
//! Global flags pick the backend and the cache behaviour; each subcommand
//! maps onto one client operation.

use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use convene_core::filters::{parse_date, parse_sort, FilterError, SortBy, SortOrder};
use convene_core::models::{Priority, ProfileUpdate};
use convene_core::EventFilters;

/// Convention schedule client - browse events and announcements, even offline
#[derive(Parser, Debug)]
#[command(name = "convene")]
#[command(about = "Convention schedule client with an offline cache")]
#[command(version)]
pub struct Cli {
    /// Backend base URL, e.g. http://localhost:4000/api
    #[arg(long, global = true, env = "CONVENE_API_URL", value_name = "URL")]
    pub api_url: Option<String>,

    /// Keep the cache in memory only; nothing is written to disk
    #[arg(long, global = true)]
    pub no_persist: bool,

    /// Never contact the server; answer from cached and pinned data
    #[arg(long, global = true)]
    pub offline: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List events
    Events(EventsArgs),

    /// Show a single event
    Event {
        id: String,
        /// Bypass a fresh cache entry
        #[arg(long)]
        refresh: bool,
    },

    /// List the categories and locations events can be filtered by
    FilterOptions,

    /// Show announcements, most urgent first
    Announcements {
        #[arg(long)]
        refresh: bool,
    },

    /// Post an announcement
    Announce {
        title: String,
        content: String,
        #[arg(long, default_value = "medium", value_parser = parse_priority_arg)]
        priority: Priority,
    },

    /// List your favorite events
    Favorites {
        #[arg(long)]
        refresh: bool,
    },

    /// Add, remove or check a favorite
    #[command(subcommand)]
    Favorite(FavoriteCommand),

    /// Check a ticket in from its id or scanned QR contents
    Checkin {
        /// Ticket id, or the JSON/text payload read from the QR code
        code: String,
    },

    /// Register a device token for push notifications
    PushToken {
        token: String,
        #[arg(long, default_value = "web")]
        platform: String,
    },

    /// Sign in and store the session
    Login {
        #[arg(long)]
        email: Option<String>,
    },

    /// Forget the stored session
    Logout,

    /// Show the signed-in user, verified against the server
    Whoami,

    /// Show your profile, or change it when any field is given
    Profile(ProfileArgs),

    /// Manage events kept for offline use
    #[command(subcommand)]
    Offline(OfflineCommand),

    /// Inspect or clear the local cache
    #[command(subcommand)]
    Cache(CacheCommand),
}

#[derive(Args, Debug, Default)]
pub struct EventsArgs {
    /// Match title or description
    #[arg(long, short)]
    pub search: Option<String>,

    #[arg(long, short)]
    pub category: Option<String>,

    #[arg(long, short)]
    pub location: Option<String>,

    /// First day to include (YYYY-MM-DD)
    #[arg(long, value_parser = parse_date_arg)]
    pub from: Option<NaiveDate>,

    /// Last day to include (YYYY-MM-DD)
    #[arg(long, value_parser = parse_date_arg)]
    pub to: Option<NaiveDate>,

    /// Sort key with optional direction: date, title-asc, category-desc, ...
    #[arg(long, value_parser = parse_sort_arg)]
    pub sort: Option<(SortBy, SortOrder)>,

    #[arg(long, default_value_t = 1)]
    pub page: u32,

    #[arg(long, default_value_t = 20)]
    pub limit: u32,

    /// Bypass a fresh cache entry
    #[arg(long)]
    pub refresh: bool,
}

impl EventsArgs {
    pub fn to_filters(&self) -> Result<EventFilters, FilterError> {
        let mut filters = EventFilters::new()
            .with_search(self.search.clone().unwrap_or_default())
            .with_category(self.category.clone().unwrap_or_default())
            .with_location(self.location.clone().unwrap_or_default())
            .with_date_range(self.from, self.to);
        if let Some((by, order)) = self.sort {
            filters = filters.with_sort(by, order);
        }
        let filters = filters.with_limit(self.limit).with_page(self.page);
        filters.validate()?;
        Ok(filters)
    }
}

#[derive(Args, Debug, Default)]
pub struct ProfileArgs {
    #[arg(long)]
    pub name: Option<String>,
    #[arg(long)]
    pub bio: Option<String>,
    #[arg(long)]
    pub phone: Option<String>,
    #[arg(long)]
    pub company: Option<String>,
    /// Job title
    #[arg(long)]
    pub title: Option<String>,
}

impl ProfileArgs {
    pub fn to_update(&self) -> ProfileUpdate {
        ProfileUpdate {
            name: self.name.clone(),
            bio: self.bio.clone(),
            phone: self.phone.clone(),
            company: self.company.clone(),
            title: self.title.clone(),
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum FavoriteCommand {
    Add { event_id: String },
    Remove { event_id: String },
    Check { event_id: String },
}

#[derive(Subcommand, Debug)]
pub enum OfflineCommand {
    /// Download an event and keep it through syncs
    Pin { event_id: String },

    /// Drop an event from offline storage
    Unpin { event_id: String },

    /// List offline events
    List {
        #[arg(long, short)]
        search: Option<String>,
        #[arg(long, short)]
        category: Option<String>,
        /// Exact location name
        #[arg(long, short)]
        location: Option<String>,
        /// Only pinned events
        #[arg(long)]
        pinned: bool,
    },

    /// Refresh offline events from the server
    Sync,

    /// Offline storage statistics
    Stats,

    /// Remove all offline events
    Clear,
}

#[derive(Subcommand, Debug)]
pub enum CacheCommand {
    /// Cached entries with their age
    Stats,

    /// Remove everything this application stored
    Clear,
}

fn parse_date_arg(s: &str) -> Result<NaiveDate, String> {
    parse_date(s).map_err(|e| e.to_string())
}

fn parse_priority_arg(s: &str) -> Result<Priority, String> {
    s.parse()
}

fn parse_sort_arg(s: &str) -> Result<(SortBy, SortOrder), String> {
    parse_sort(s).map_err(|e| e.to_string())
}
