//! Event filtering, sorting and pagination.
//!
//! `EventFilters` is the flat set of options the events listing accepts. It
//! renders itself as the `/events` query string, and can also be evaluated
//! locally against cached events with the same semantics the server uses.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::Event;

pub const DEFAULT_PAGE: u32 = 1;
pub const DEFAULT_LIMIT: u32 = 20;

const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FilterError {
    #[error("page must be at least 1 (got {0})")]
    InvalidPage(u32),

    #[error("limit must be at least 1")]
    InvalidLimit,

    #[error("unknown sort key '{0}' (expected date, title, location or category)")]
    UnknownSortKey(String),

    #[error("unknown sort order '{0}' (expected asc or desc)")]
    UnknownSortOrder(String),

    #[error("invalid date '{0}' (expected YYYY-MM-DD)")]
    InvalidDate(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortBy {
    #[default]
    Date,
    Title,
    Location,
    Category,
}

impl SortBy {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortBy::Date => "date",
            SortBy::Title => "title",
            SortBy::Location => "location",
            SortBy::Category => "category",
        }
    }
}

impl FromStr for SortBy {
    type Err = FilterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "date" => Ok(SortBy::Date),
            "title" => Ok(SortBy::Title),
            "location" => Ok(SortBy::Location),
            "category" => Ok(SortBy::Category),
            _ => Err(FilterError::UnknownSortKey(s.to_string())),
        }
    }
}

impl fmt::Display for SortBy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

impl SortOrder {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortOrder::Asc => "asc",
            SortOrder::Desc => "desc",
        }
    }
}

impl FromStr for SortOrder {
    type Err = FilterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "asc" => Ok(SortOrder::Asc),
            "desc" => Ok(SortOrder::Desc),
            _ => Err(FilterError::UnknownSortOrder(s.to_string())),
        }
    }
}

impl fmt::Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parse the combined picker form, e.g. `"date-desc"`. A bare key sorts ascending.
pub fn parse_sort(value: &str) -> Result<(SortBy, SortOrder), FilterError> {
    match value.split_once('-') {
        Some((by, order)) => Ok((by.parse()?, order.parse()?)),
        None => Ok((value.parse()?, SortOrder::Asc)),
    }
}

pub fn parse_date(value: &str) -> Result<NaiveDate, FilterError> {
    NaiveDate::parse_from_str(value.trim(), DATE_FORMAT)
        .map_err(|_| FilterError::InvalidDate(value.to_string()))
}

/// Query options for the events listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventFilters {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<NaiveDate>,
    #[serde(default)]
    pub sort_by: SortBy,
    #[serde(default)]
    pub sort_order: SortOrder,
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_limit")]
    pub limit: u32,
}

fn default_page() -> u32 {
    DEFAULT_PAGE
}

fn default_limit() -> u32 {
    DEFAULT_LIMIT
}

impl Default for EventFilters {
    fn default() -> Self {
        Self {
            search: None,
            category: None,
            location: None,
            start_date: None,
            end_date: None,
            sort_by: SortBy::default(),
            sort_order: SortOrder::default(),
            page: DEFAULT_PAGE,
            limit: DEFAULT_LIMIT,
        }
    }
}

/// Blank strings count as "not set".
fn non_blank(value: impl Into<String>) -> Option<String> {
    let value = value.into();
    if value.trim().is_empty() {
        None
    } else {
        Some(value)
    }
}

fn midnight_utc(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(chrono::NaiveTime::MIN).and_utc()
}

impl EventFilters {
    pub fn new() -> Self {
        Self::default()
    }

    // Changing any filter returns to the first page.

    pub fn with_search(mut self, search: impl Into<String>) -> Self {
        self.search = non_blank(search);
        self.page = DEFAULT_PAGE;
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = non_blank(category);
        self.page = DEFAULT_PAGE;
        self
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = non_blank(location);
        self.page = DEFAULT_PAGE;
        self
    }

    pub fn with_date_range(mut self, start: Option<NaiveDate>, end: Option<NaiveDate>) -> Self {
        self.start_date = start;
        self.end_date = end;
        self.page = DEFAULT_PAGE;
        self
    }

    pub fn with_sort(mut self, sort_by: SortBy, sort_order: SortOrder) -> Self {
        self.sort_by = sort_by;
        self.sort_order = sort_order;
        self.page = DEFAULT_PAGE;
        self
    }

    pub fn with_page(mut self, page: u32) -> Self {
        self.page = page;
        self
    }

    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = limit;
        self.page = DEFAULT_PAGE;
        self
    }

    pub fn next_page(&self) -> Self {
        let mut next = self.clone();
        next.page = self.page.saturating_add(1);
        next
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn validate(&self) -> Result<(), FilterError> {
        if self.page < 1 {
            return Err(FilterError::InvalidPage(self.page));
        }
        if self.limit < 1 {
            return Err(FilterError::InvalidLimit);
        }
        Ok(())
    }

    /// Query parameters in a stable order. Unset options are omitted.
    pub fn to_query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        if let Some(search) = self.search.as_deref().and_then(non_blank) {
            pairs.push(("search", search));
        }
        if let Some(category) = self.category.as_deref().and_then(non_blank) {
            pairs.push(("category", category));
        }
        if let Some(location) = self.location.as_deref().and_then(non_blank) {
            pairs.push(("location", location));
        }
        if let Some(start) = self.start_date {
            pairs.push(("startDate", start.format(DATE_FORMAT).to_string()));
        }
        if let Some(end) = self.end_date {
            pairs.push(("endDate", end.format(DATE_FORMAT).to_string()));
        }
        pairs.push(("sortBy", self.sort_by.as_str().to_string()));
        pairs.push(("sortOrder", self.sort_order.as_str().to_string()));
        pairs.push(("page", self.page.to_string()));
        pairs.push(("limit", self.limit.to_string()));
        pairs
    }

    /// Form-url-encoded query string, without the leading `?`.
    pub fn to_query_string(&self) -> String {
        url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(self.to_query_pairs())
            .finish()
    }

    /// Server-equivalent match: search covers title and description, location is a
    /// case-insensitive substring, date bounds are inclusive at midnight UTC.
    pub fn matches(&self, event: &Event) -> bool {
        if let Some(search) = self.search.as_deref().filter(|s| !s.trim().is_empty()) {
            if !event.mentions(search, false) {
                return false;
            }
        }
        if let Some(category) = self.category.as_deref().filter(|c| !c.trim().is_empty()) {
            if event.category.as_str() != category {
                return false;
            }
        }
        if let Some(location) = self.location.as_deref().filter(|l| !l.trim().is_empty()) {
            if !event.location.to_lowercase().contains(&location.to_lowercase()) {
                return false;
            }
        }
        if let Some(start) = self.start_date {
            if event.date < midnight_utc(start) {
                return false;
            }
        }
        if let Some(end) = self.end_date {
            if event.date > midnight_utc(end) {
                return false;
            }
        }
        true
    }

    fn compare(&self, a: &Event, b: &Event) -> Ordering {
        let ordering = match self.sort_by {
            SortBy::Date => a.date.cmp(&b.date),
            SortBy::Title => a.title.cmp(&b.title),
            SortBy::Location => a.location.cmp(&b.location),
            SortBy::Category => a.category.as_str().cmp(b.category.as_str()),
        };
        match self.sort_order {
            SortOrder::Asc => ordering,
            SortOrder::Desc => ordering.reverse(),
        }
    }

    /// Filter, sort and paginate `events` locally, producing the page the server would return.
    pub fn apply(&self, events: &[Event]) -> Result<EventPage, FilterError> {
        self.validate()?;

        let mut matching: Vec<&Event> = events.iter().filter(|e| self.matches(e)).collect();
        matching.sort_by(|a, b| self.compare(a, b));

        let total = matching.len() as u64;
        let skip = (u64::from(self.page) - 1).saturating_mul(u64::from(self.limit));
        let page_events = matching
            .into_iter()
            .skip(usize::try_from(skip).unwrap_or(usize::MAX))
            .take(self.limit as usize)
            .cloned()
            .collect();

        Ok(EventPage {
            events: page_events,
            pagination: Pagination::new(self.page, self.limit, total),
            filters: Some(AppliedFilters::from(self)),
        })
    }
}

/// Page metadata as computed by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub current_page: u32,
    pub total_pages: u64,
    pub total_events: u64,
    pub has_next: bool,
    pub has_prev: bool,
}

impl Pagination {
    pub fn new(current_page: u32, limit: u32, total_events: u64) -> Self {
        let limit = u64::from(limit.max(1));
        let total_pages = total_events.div_ceil(limit);
        Self {
            current_page,
            total_pages,
            total_events,
            has_next: u64::from(current_page) < total_pages,
            has_prev: current_page > 1,
        }
    }

    /// Everything on one page.
    pub fn single(total_events: u64) -> Self {
        Self {
            current_page: 1,
            total_pages: if total_events == 0 { 0 } else { 1 },
            total_events,
            has_next: false,
            has_prev: false,
        }
    }
}

/// Filters as echoed back by the server; values are passed through untyped.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppliedFilters {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort_order: Option<String>,
}

impl From<&EventFilters> for AppliedFilters {
    fn from(filters: &EventFilters) -> Self {
        Self {
            search: filters.search.clone(),
            category: filters.category.clone(),
            location: filters.location.clone(),
            start_date: filters.start_date.map(|d| d.format(DATE_FORMAT).to_string()),
            end_date: filters.end_date.map(|d| d.format(DATE_FORMAT).to_string()),
            sort_by: Some(filters.sort_by.as_str().to_string()),
            sort_order: Some(filters.sort_order.as_str().to_string()),
        }
    }
}

/// One page of the events listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventPage {
    pub events: Vec<Event>,
    pub pagination: Pagination,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filters: Option<AppliedFilters>,
}

impl EventPage {
    /// Wrap an unpaginated list (older backends return a bare array).
    pub fn unpaged(events: Vec<Event>) -> Self {
        let pagination = Pagination::single(events.len() as u64);
        Self {
            events,
            pagination,
            filters: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::models::fixtures::event;
    use crate::models::EventCategory;

    fn query_map(filters: &EventFilters) -> HashMap<String, String> {
        url::form_urlencoded::parse(filters.to_query_string().as_bytes())
            .into_owned()
            .collect()
    }

    fn schedule() -> Vec<Event> {
        vec![
            event("e1", "Opening Keynote", EventCategory::Keynote, "Main Hall", 1, 9),
            event("e2", "Rust Workshop", EventCategory::Workshop, "Room 4", 1, 14),
            event("e3", "Async Panel", EventCategory::Panel, "Main Hall", 2, 10),
            event("e4", "Closing Social", EventCategory::Social, "Rooftop", 3, 19),
            event("e5", "Advanced Rust Workshop", EventCategory::Workshop, "room 4b", 2, 9),
        ]
    }

    fn ids(page: &EventPage) -> Vec<&str> {
        page.events.iter().map(|e| e.id.as_str()).collect()
    }

    #[test]
    fn test_query_contains_sort_pair() {
        let filters = EventFilters::new().with_sort(SortBy::Date, SortOrder::Desc);
        let query = filters.to_query_string();

        assert!(query.contains("sortBy=date&sortOrder=desc"), "{}", query);
        let map = query_map(&filters);
        assert_eq!(map["sortBy"], "date");
        assert_eq!(map["sortOrder"], "desc");
    }

    #[test]
    fn test_query_omits_unset_and_blank_options() {
        let filters = EventFilters {
            search: Some("   ".to_string()),
            ..EventFilters::default()
        };
        let map = query_map(&filters);

        assert!(!map.contains_key("search"));
        assert!(!map.contains_key("category"));
        assert!(!map.contains_key("startDate"));
        assert_eq!(map["page"], "1");
        assert_eq!(map["limit"], "20");
    }

    #[test]
    fn test_query_encodes_values() {
        let filters = EventFilters::new()
            .with_search("rust & async")
            .with_location("Main Hall")
            .with_date_range(Some(parse_date("2026-05-01").unwrap()), Some(parse_date("2026-05-03").unwrap()));
        let query = filters.to_query_string();

        assert!(query.contains("search=rust+%26+async"), "{}", query);
        let map = query_map(&filters);
        assert_eq!(map["search"], "rust & async");
        assert_eq!(map["location"], "Main Hall");
        assert_eq!(map["startDate"], "2026-05-01");
        assert_eq!(map["endDate"], "2026-05-03");
    }

    #[test]
    fn test_filter_changes_reset_page() {
        let filters = EventFilters::new().with_page(4).with_category("panel");
        assert_eq!(filters.page, 1);

        let filters = filters.with_page(3);
        assert_eq!(filters.next_page().page, 4);

        let mut filters = filters.with_search("x");
        assert_eq!(filters.page, 1);
        filters.reset();
        assert_eq!(filters, EventFilters::default());
    }

    #[test]
    fn test_validate_page_and_limit() {
        assert_eq!(EventFilters::new().with_page(0).validate(), Err(FilterError::InvalidPage(0)));
        assert_eq!(EventFilters::new().with_limit(0).validate(), Err(FilterError::InvalidLimit));
        assert!(EventFilters::new().validate().is_ok());
    }

    #[test]
    fn test_parse_sort() {
        assert_eq!(parse_sort("date-desc").unwrap(), (SortBy::Date, SortOrder::Desc));
        assert_eq!(parse_sort("title").unwrap(), (SortBy::Title, SortOrder::Asc));
        assert_eq!(parse_sort("speaker-asc"), Err(FilterError::UnknownSortKey("speaker".to_string())));
        assert_eq!(parse_sort("date-down"), Err(FilterError::UnknownSortOrder("down".to_string())));
        assert!(parse_date("05/01/2026").is_err());
    }

    #[test]
    fn test_apply_search_matches_title_and_description_only() {
        let page = EventFilters::new().with_search("rust").apply(&schedule()).unwrap();
        assert_eq!(ids(&page), vec!["e2", "e5"]);

        let page = EventFilters::new().with_search("rooftop").apply(&schedule()).unwrap();
        assert!(page.events.is_empty());
    }

    #[test]
    fn test_apply_category_and_location() {
        let page = EventFilters::new().with_category("workshop").apply(&schedule()).unwrap();
        assert_eq!(ids(&page), vec!["e2", "e5"]);

        let page = EventFilters::new().with_location("ROOM 4").apply(&schedule()).unwrap();
        assert_eq!(ids(&page), vec!["e2", "e5"]);
    }

    #[test]
    fn test_apply_date_range_bounds_at_midnight() {
        let filters = EventFilters::new().with_date_range(
            Some(parse_date("2026-05-02").unwrap()),
            Some(parse_date("2026-05-03").unwrap()),
        );
        // e4 is at 19:00 on the 3rd, past the midnight end bound
        assert_eq!(ids(&filters.apply(&schedule()).unwrap()), vec!["e5", "e3"]);
    }

    #[test]
    fn test_apply_sorts() {
        let page = EventFilters::new()
            .with_sort(SortBy::Date, SortOrder::Desc)
            .apply(&schedule())
            .unwrap();
        assert_eq!(ids(&page), vec!["e4", "e3", "e5", "e2", "e1"]);

        let page = EventFilters::new()
            .with_sort(SortBy::Title, SortOrder::Asc)
            .apply(&schedule())
            .unwrap();
        assert_eq!(ids(&page), vec!["e5", "e3", "e4", "e1", "e2"]);
    }

    #[test]
    fn test_apply_paginates_like_server() {
        let page = EventFilters::new().with_limit(2).with_page(2).apply(&schedule()).unwrap();

        assert_eq!(ids(&page), vec!["e5", "e3"]);
        assert_eq!(
            page.pagination,
            Pagination {
                current_page: 2,
                total_pages: 3,
                total_events: 5,
                has_next: true,
                has_prev: true,
            }
        );

        let past_end = EventFilters::new().with_limit(2).with_page(9).apply(&schedule()).unwrap();
        assert!(past_end.events.is_empty());
        assert!(!past_end.pagination.has_next);
    }

    #[test]
    fn test_pagination_arithmetic() {
        assert_eq!(Pagination::new(1, 20, 0).total_pages, 0);
        assert_eq!(Pagination::new(1, 20, 20).total_pages, 1);
        assert_eq!(Pagination::new(1, 20, 21).total_pages, 2);
        assert!(!Pagination::new(1, 20, 20).has_next);
        assert!(!Pagination::new(1, 20, 20).has_prev);
    }

    #[test]
    fn test_parse_server_page() {
        let json = r#"{
            "events": [],
            "pagination": {"currentPage": 1, "totalPages": 0, "totalEvents": 0, "hasNext": false, "hasPrev": false},
            "filters": {"sortBy": "date", "sortOrder": "asc"}
        }"#;
        let page: EventPage = serde_json::from_str(json).unwrap();
        assert_eq!(page.filters.unwrap().sort_by.as_deref(), Some("date"));
    }
}
