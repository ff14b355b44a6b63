use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventCategory {
    Conference,
    Workshop,
    Panel,
    Networking,
    Keynote,
    Exhibition,
    Social,
    #[default]
    Other,
}

impl EventCategory {
    pub const ALL: [EventCategory; 8] = [
        EventCategory::Conference,
        EventCategory::Workshop,
        EventCategory::Panel,
        EventCategory::Networking,
        EventCategory::Keynote,
        EventCategory::Exhibition,
        EventCategory::Social,
        EventCategory::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EventCategory::Conference => "conference",
            EventCategory::Workshop => "workshop",
            EventCategory::Panel => "panel",
            EventCategory::Networking => "networking",
            EventCategory::Keynote => "keynote",
            EventCategory::Exhibition => "exhibition",
            EventCategory::Social => "social",
            EventCategory::Other => "other",
        }
    }
}

impl fmt::Display for EventCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        EventCategory::ALL
            .into_iter()
            .find(|c| c.as_str() == lower)
            .ok_or_else(|| format!("unknown category '{}'", s))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Priority::Low => write!(f, "low"),
            Priority::Medium => write!(f, "medium"),
            Priority::High => write!(f, "high"),
        }
    }
}

impl FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Priority::Low),
            "medium" => Ok(Priority::Medium),
            "high" => Ok(Priority::High),
            _ => Err(format!("unknown priority '{}'", s)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Speaker {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub bio: Option<String>,
    #[serde(default)]
    pub photo: Option<String>,
}

fn default_duration() -> u32 {
    60
}

fn default_capacity() -> u32 {
    100
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    #[serde(rename = "_id")]
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub date: DateTime<Utc>,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub category: EventCategory,
    /// Minutes
    #[serde(default = "default_duration")]
    pub duration: u32,
    #[serde(default = "default_capacity")]
    pub capacity: u32,
    #[serde(default)]
    pub registered_count: u32,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speaker: Option<Speaker>,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Event {
    pub fn ends_at(&self) -> DateTime<Utc> {
        self.date + Duration::minutes(i64::from(self.duration))
    }

    pub fn seats_remaining(&self) -> u32 {
        self.capacity.saturating_sub(self.registered_count)
    }

    pub fn is_full(&self) -> bool {
        self.seats_remaining() == 0
    }

    pub fn speaker_name(&self) -> Option<&str> {
        self.speaker.as_ref().and_then(|s| s.name.as_deref())
    }

    pub fn formatted_date(&self) -> String {
        self.date.format("%b %d, %Y").to_string()
    }

    /// Compact date/time for list view: "Jan 26 5p", "Jan 26 9:30a"
    pub fn formatted_datetime_short(&self) -> String {
        let hour = self.date.format("%I").to_string().trim_start_matches('0').to_string();
        let minute = self.date.format("%M").to_string();
        let ampm = if self.date.format("%p").to_string() == "PM" { 'p' } else { 'a' };
        if minute == "00" {
            format!("{} {}{}", self.date.format("%b %d"), hour, ampm)
        } else {
            format!("{} {}:{}{}", self.date.format("%b %d"), hour, minute, ampm)
        }
    }

    /// Whether the title, description, or (optionally) location contain `needle`, ignoring case.
    pub fn mentions(&self, needle: &str, include_location: bool) -> bool {
        let needle = needle.to_lowercase();
        self.title.to_lowercase().contains(&needle)
            || self.description.to_lowercase().contains(&needle)
            || (include_location && self.location.to_lowercase().contains(&needle))
    }
}

/// Body for `POST /events`. Omitted fields take the server defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewEvent {
    pub title: String,
    pub description: String,
    pub date: DateTime<Utc>,
    pub location: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<EventCategory>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capacity: Option<u32>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speaker: Option<Speaker>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
}

/// Body for `PUT /events/:id`. Only set fields are sent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<EventCategory>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capacity: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_active: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample_json() -> &'static str {
        r#"{
            "_id": "665f1c2e9b1e8a0012a4b001",
            "title": "Opening Keynote",
            "description": "Welcome to the convention",
            "date": "2026-05-01T17:00:00.000Z",
            "location": "Main Hall",
            "category": "keynote",
            "capacity": 500,
            "registeredCount": 500,
            "tags": ["welcome"],
            "speaker": {"name": "Ada Lovelace"},
            "createdAt": "2026-01-10T12:00:00.000Z"
        }"#
    }

    #[test]
    fn test_parse_event_with_defaults() {
        let event: Event = serde_json::from_str(sample_json()).unwrap();

        assert_eq!(event.id, "665f1c2e9b1e8a0012a4b001");
        assert_eq!(event.category, EventCategory::Keynote);
        assert_eq!(event.duration, 60);
        assert!(event.is_active);
        assert_eq!(event.priority, Priority::Medium);
        assert_eq!(event.speaker_name(), Some("Ada Lovelace"));
        assert!(event.is_full());
        assert_eq!(event.date, Utc.with_ymd_and_hms(2026, 5, 1, 17, 0, 0).unwrap());
        assert_eq!(event.ends_at(), Utc.with_ymd_and_hms(2026, 5, 1, 18, 0, 0).unwrap());
    }

    #[test]
    fn test_event_serializes_with_wire_names() {
        let event: Event = serde_json::from_str(sample_json()).unwrap();
        let json = serde_json::to_value(&event).unwrap();

        assert_eq!(json["_id"], "665f1c2e9b1e8a0012a4b001");
        assert_eq!(json["registeredCount"], 500);
        assert_eq!(json["isActive"], true);
        assert!(json.get("updatedAt").is_none());
    }

    #[test]
    fn test_category_from_str() {
        assert_eq!("Workshop".parse::<EventCategory>().unwrap(), EventCategory::Workshop);
        assert_eq!(" social ".parse::<EventCategory>().unwrap(), EventCategory::Social);
        assert!("party".parse::<EventCategory>().is_err());
    }

    #[test]
    fn test_priority_from_str() {
        assert_eq!("HIGH".parse::<Priority>(), Ok(Priority::High));
        assert_eq!(" low ".parse::<Priority>(), Ok(Priority::Low));
        assert!("urgent".parse::<Priority>().is_err());
    }

    #[test]
    fn test_formatted_datetime_short() {
        let mut event: Event = serde_json::from_str(sample_json()).unwrap();
        assert_eq!(event.formatted_datetime_short(), "May 01 5p");

        event.date = Utc.with_ymd_and_hms(2026, 1, 26, 9, 30, 0).unwrap();
        assert_eq!(event.formatted_datetime_short(), "Jan 26 9:30a");
        assert_eq!(event.formatted_date(), "Jan 26, 2026");
    }

    #[test]
    fn test_mentions() {
        let event: Event = serde_json::from_str(sample_json()).unwrap();
        assert!(event.mentions("KEYNOTE", false));
        assert!(event.mentions("welcome", false));
        assert!(!event.mentions("main hall", false));
        assert!(event.mentions("main hall", true));
    }

    #[test]
    fn test_event_update_only_sends_set_fields() {
        let update = EventUpdate {
            capacity: Some(250),
            ..Default::default()
        };
        assert_eq!(serde_json::to_string(&update).unwrap(), r#"{"capacity":250}"#);
    }
}
