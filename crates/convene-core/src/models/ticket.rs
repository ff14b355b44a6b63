use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ticket {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub event_id: Option<String>,
    #[serde(default)]
    pub checked_in: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckinResponse {
    pub message: String,
    pub ticket: Ticket,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CheckinRequest<'a> {
    pub ticket_id: &'a str,
}

/// Extract a ticket id from scanned QR contents.
///
/// Codes carry either a JSON object (`{"ticketId": "..."}`, `_id` or `id`
/// also accepted) or the bare id as text.
pub fn ticket_id_from_scan(data: &str) -> Option<String> {
    let data = data.trim();
    if data.is_empty() {
        return None;
    }

    match serde_json::from_str::<serde_json::Value>(data) {
        Ok(serde_json::Value::Object(map)) => ["ticketId", "_id", "id"]
            .iter()
            .find_map(|field| map.get(*field).and_then(|v| v.as_str()))
            .map(str::to_string),
        Ok(serde_json::Value::String(s)) => Some(s),
        _ => Some(data.to_string()),
    }
}
