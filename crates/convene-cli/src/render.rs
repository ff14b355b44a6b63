//! Plain-text rendering of command results.
//!
//! Every function returns the text instead of printing so output can be tested.

use std::fmt::Write;

use chrono::{DateTime, Utc};
use convene_core::cache::CacheStatus;
use convene_core::models::{Announcement, Event, FavoriteEvent, Profile};
use convene_core::offline::{OfflineEvent, StorageStats};
use convene_core::utils::{format_age, format_datetime, format_storage_size, truncate_string};
use convene_core::{DataSource, EventPage};

const TITLE_WIDTH: usize = 40;

/// "updated 5m ago", with a note when the data did not come from the server just now.
pub fn freshness(source: DataSource, last_updated: Option<DateTime<Utc>>, now: DateTime<Utc>) -> String {
    let age = last_updated
        .map(|at| format!("updated {}", format_age((now - at).num_minutes())))
        .unwrap_or_else(|| "never updated".to_string());
    match source {
        DataSource::Cache | DataSource::Network => age,
        DataSource::StaleCache => format!("{} (offline copy, server unreachable)", age),
        DataSource::Fallback => "offline copy from pinned events (server unreachable)".to_string(),
    }
}

fn event_line(out: &mut String, event: &Event) {
    let _ = writeln!(
        out,
        "  {:<13} {:<width$} {:<11} {}",
        event.formatted_datetime_short(),
        truncate_string(&event.title, TITLE_WIDTH),
        event.category.as_str(),
        event.location,
        width = TITLE_WIDTH,
    );
}

pub fn event_page(page: &EventPage) -> String {
    let mut out = String::new();
    if page.events.is_empty() {
        out.push_str("No events found.\n");
        return out;
    }
    for event in &page.events {
        event_line(&mut out, event);
    }
    let p = &page.pagination;
    let _ = writeln!(
        out,
        "\nPage {} of {} ({} events){}{}",
        p.current_page,
        p.total_pages.max(1),
        p.total_events,
        if p.has_prev { "  [--page prev]" } else { "" },
        if p.has_next { "  [--page next]" } else { "" },
    );
    out
}

pub fn event_detail(event: &Event) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", event.title);
    let _ = writeln!(out, "  When:     {} ({} min)", format_datetime(&event.date), event.duration);
    let _ = writeln!(out, "  Where:    {}", event.location);
    let _ = writeln!(out, "  Category: {}", event.category);
    if let Some(speaker) = event.speaker_name() {
        let _ = writeln!(out, "  Speaker:  {}", speaker);
    }
    let _ = writeln!(
        out,
        "  Seats:    {} of {} left{}",
        event.seats_remaining(),
        event.capacity,
        if event.is_full() { " (full)" } else { "" }
    );
    if !event.tags.is_empty() {
        let _ = writeln!(out, "  Tags:     {}", event.tags.join(", "));
    }
    if !event.description.is_empty() {
        let _ = writeln!(out, "\n{}", event.description);
    }
    out
}

pub fn string_list(items: &[String], empty: &str) -> String {
    if items.is_empty() {
        return format!("{}\n", empty);
    }
    items.iter().map(|i| format!("  {}\n", i)).collect()
}

pub fn announcements(items: &[Announcement]) -> String {
    let mut out = String::new();
    if items.is_empty() {
        out.push_str("No announcements.\n");
        return out;
    }
    for a in items {
        let marker = if a.is_urgent() { "!" } else { " " };
        let _ = writeln!(out, "{} [{}] {}", marker, a.priority, a.title);
        let _ = writeln!(out, "    {}", a.content);
    }
    out
}

pub fn profile(profile: &Profile) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{} <{}>", profile.name, profile.email);
    let fields = [
        ("Title", &profile.title),
        ("Company", &profile.company),
        ("Phone", &profile.phone),
    ];
    for (label, value) in fields {
        if let Some(value) = value {
            let _ = writeln!(out, "  {:<9} {}", format!("{}:", label), value);
        }
    }
    if !profile.interests.is_empty() {
        let _ = writeln!(out, "  {:<9} {}", "Likes:", profile.interests.join(", "));
    }
    if let Some(ref bio) = profile.bio {
        let _ = writeln!(out, "\n{}", bio);
    }
    out
}

pub fn favorites(items: &[FavoriteEvent]) -> String {
    if items.is_empty() {
        return "No favorites yet.\n".to_string();
    }
    let mut out = String::new();
    for favorite in items {
        event_line(&mut out, &favorite.event);
    }
    out
}

pub fn offline_events(items: &[OfflineEvent]) -> String {
    if items.is_empty() {
        return "No offline events.\n".to_string();
    }
    let mut out = String::new();
    for item in items {
        if item.is_offline_only {
            out.push('*');
        }
        event_line(&mut out, &item.event);
    }
    out.push_str("\n* pinned\n");
    out
}

pub fn offline_stats(stats: &StorageStats, now: DateTime<Utc>) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Offline events: {} ({} pinned)", stats.total_events, stats.offline_only_events);
    let _ = writeln!(out, "Size:           {}", format_storage_size(stats.storage_size));
    let last_sync = stats
        .last_sync
        .map(|at| format_age((now - at).num_minutes()))
        .unwrap_or_else(|| "never".to_string());
    let _ = writeln!(out, "Last saved:     {}", last_sync);
    if !stats.categories.is_empty() {
        let _ = writeln!(out, "Categories:     {}", stats.categories.join(", "));
    }
    if !stats.locations.is_empty() {
        let _ = writeln!(out, "Locations:      {}", stats.locations.join(", "));
    }
    out
}

pub fn cache_stats(entries: &[CacheStatus], total_bytes: u64) -> String {
    let mut out = String::new();
    for entry in entries {
        let _ = writeln!(
            out,
            "  {:<60} {:>10}{}",
            truncate_string(&entry.key, 60),
            entry.age,
            if entry.stale { " (stale)" } else { "" }
        );
    }
    let _ = writeln!(out, "{} cached entries, {} total", entries.len(), format_storage_size(total_bytes));
    out
}
