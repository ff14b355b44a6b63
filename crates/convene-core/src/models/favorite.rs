use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Event;

/// An event from `GET /favorites`, annotated with the favorite record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FavoriteEvent {
    #[serde(flatten)]
    pub event: Event,
    pub favorite_id: String,
    pub added_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FavoriteStatus {
    pub is_favorited: bool,
    #[serde(default)]
    pub favorite_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddFavoriteResponse {
    pub message: String,
    pub favorite_id: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_favorite_event() {
        let json = r#"{
            "_id": "e1",
            "title": "Rust Workshop",
            "description": "Ownership in practice",
            "date": "2026-05-02T14:00:00Z",
            "location": "Room 4",
            "category": "workshop",
            "favoriteId": "f9",
            "addedAt": "2026-04-20T08:00:00Z"
        }"#;

        let favorite: FavoriteEvent = serde_json::from_str(json).unwrap();
        assert_eq!(favorite.event.id, "e1");
        assert_eq!(favorite.favorite_id, "f9");
    }

    #[test]
    fn test_parse_favorite_status() {
        let status: FavoriteStatus =
            serde_json::from_str(r#"{"isFavorited": false, "favoriteId": null}"#).unwrap();
        assert!(!status.is_favorited);
        assert_eq!(status.favorite_id, None);
    }
}
