//! API client for communicating with the convention REST API.
//!
//! This module provides the `ApiClient` struct for making authenticated
//! API requests for events, announcements, favorites, profiles and tickets.

use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::{header, Client, Url};
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, warn};

use crate::config::Config;
use crate::filters::{EventFilters, EventPage};
use crate::models::ticket::CheckinRequest;
use crate::models::user::Credentials;
use crate::models::{
    AddFavoriteResponse, Announcement, AuthResponse, CheckinResponse, Event, EventUpdate,
    FavoriteEvent, FavoriteStatus, MessageResponse, NewAnnouncement, NewEvent, Profile,
    ProfileUpdate, RegistrationForm, VerifyResponse,
};
use crate::utils::truncate_string;

use super::ApiError;

/// Base URL used when neither the config file nor the environment set one.
pub const DEFAULT_API_URL: &str = "http://localhost:4000/api";

/// HTTP request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PushTokenRequest<'a> {
    push_token: &'a str,
    platform: &'a str,
}

/// API client for the convention backend.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: Url,
    token: Option<String>,
}

impl ApiClient {
    /// Create a new API client rooted at `base_url` (e.g. `http://localhost:4000/api`).
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let base_url = Url::parse(base_url)
            .with_context(|| format!("Invalid API base URL '{}'", base_url))?;
        if base_url.cannot_be_a_base() {
            anyhow::bail!("API base URL '{}' cannot carry a path", base_url);
        }

        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            base_url,
            token: None,
        })
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(&config.api_url(), config.request_timeout())
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Set the bearer token for authenticated requests
    pub fn set_token(&mut self, token: String) {
        self.token = Some(token);
    }

    pub fn clear_token(&mut self) {
        self.token = None;
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    /// Create a new ApiClient with the given token, sharing the connection pool.
    pub fn with_token(&self, token: String) -> Self {
        Self {
            client: self.client.clone(),
            base_url: self.base_url.clone(),
            token: Some(token),
        }
    }

    /// Join path segments onto the base URL. Segments are percent-encoded individually.
    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| anyhow::anyhow!("API base URL '{}' cannot carry a path", self.base_url))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn auth_headers(&self) -> Result<header::HeaderMap> {
        let mut headers = header::HeaderMap::new();
        if let Some(ref token) = self.token {
            headers.insert(
                header::AUTHORIZATION,
                header::HeaderValue::from_str(&format!("Bearer {}", token))?,
            );
        }
        Ok(headers)
    }

    /// Check if response is successful, returning an error with body if not.
    async fn check_response(response: reqwest::Response) -> Result<reqwest::Response> {
        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            debug!(status = %status, "Request failed");
            Err(ApiError::from_status(status, &body).into())
        }
    }

    async fn send<T: DeserializeOwned>(&self, request: reqwest::RequestBuilder, url: &Url) -> Result<T> {
        let response = request
            .headers(self.auth_headers()?)
            .send()
            .await
            .map_err(ApiError::from)
            .with_context(|| format!("Failed to send request to {}", url))?;

        let response = Self::check_response(response).await?;
        response
            .json()
            .await
            .with_context(|| format!("Failed to parse JSON response from {}", url))
    }

    async fn get<T: DeserializeOwned>(&self, url: Url) -> Result<T> {
        debug!(url = %url, "GET");
        self.send(self.client.get(url.clone()), &url).await
    }

    async fn post<T: DeserializeOwned, B: Serialize>(&self, url: Url, body: &B) -> Result<T> {
        debug!(url = %url, "POST");
        self.send(self.client.post(url.clone()).json(body), &url).await
    }

    async fn put<T: DeserializeOwned, B: Serialize>(&self, url: Url, body: &B) -> Result<T> {
        debug!(url = %url, "PUT");
        self.send(self.client.put(url.clone()).json(body), &url).await
    }

    async fn delete<T: DeserializeOwned>(&self, url: Url) -> Result<T> {
        debug!(url = %url, "DELETE");
        self.send(self.client.delete(url.clone()), &url).await
    }

    // ===== Authentication =====

    /// Register a new account. The form is validated locally first and
    /// rejected with `ApiError::Validation` without a round trip.
    pub async fn register(&self, form: &RegistrationForm) -> Result<AuthResponse> {
        let errors = form.validate();
        if !errors.is_empty() {
            return Err(ApiError::Validation {
                message: "Validation failed".to_string(),
                errors,
            }
            .into());
        }
        self.post(self.endpoint(&["auth", "register"])?, form).await
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<AuthResponse> {
        let credentials = Credentials { email, password };
        self.post(self.endpoint(&["auth", "login"])?, &credentials).await
    }

    /// Check the current bearer token against the server.
    pub async fn verify_token(&self) -> Result<VerifyResponse> {
        if self.token.is_none() {
            return Err(ApiError::Unauthorized("No token provided".to_string()).into());
        }
        self.get(self.endpoint(&["auth", "verify"])?).await
    }

    // ===== Profile =====

    pub async fn fetch_profile(&self) -> Result<Profile> {
        self.get(self.endpoint(&["profile"])?).await
    }

    pub async fn update_profile(&self, update: &ProfileUpdate) -> Result<Profile> {
        self.put(self.endpoint(&["profile"])?, update).await
    }

    // ===== Events =====

    /// Fetch one page of events. Older backends return a bare array, which is
    /// wrapped as a single page.
    pub async fn fetch_events(&self, filters: &EventFilters) -> Result<EventPage> {
        filters.validate()?;

        let mut url = self.endpoint(&["events"])?;
        url.query_pairs_mut().extend_pairs(filters.to_query_pairs());
        debug!(url = %url, "GET");

        let response = self
            .client
            .get(url.clone())
            .headers(self.auth_headers()?)
            .send()
            .await
            .map_err(ApiError::from)
            .context("Failed to fetch events")?;
        let response = Self::check_response(response).await?;
        let text = response.text().await.context("Failed to read events response body")?;

        if let Ok(page) = serde_json::from_str::<EventPage>(&text) {
            debug!(count = page.events.len(), total = page.pagination.total_events, "Parsed events page");
            return Ok(page);
        }
        if let Ok(events) = serde_json::from_str::<Vec<Event>>(&text) {
            debug!(count = events.len(), "Parsed events as direct array");
            return Ok(EventPage::unpaged(events));
        }

        warn!(url = %url, "Failed to parse events response");
        Err(ApiError::InvalidResponse(format!(
            "Unexpected events payload: {}",
            truncate_string(&text, 200)
        ))
        .into())
    }

    pub async fn fetch_event(&self, id: &str) -> Result<Event> {
        self.get(self.endpoint(&["events", id])?).await
    }

    pub async fn fetch_categories(&self) -> Result<Vec<String>> {
        self.get(self.endpoint(&["events", "categories"])?).await
    }

    pub async fn fetch_locations(&self) -> Result<Vec<String>> {
        self.get(self.endpoint(&["events", "locations"])?).await
    }

    /// Categories and locations for the filter picker, fetched concurrently.
    pub async fn fetch_filter_options(&self) -> Result<(Vec<String>, Vec<String>)> {
        futures::try_join!(self.fetch_categories(), self.fetch_locations())
    }

    pub async fn create_event(&self, event: &NewEvent) -> Result<Event> {
        self.post(self.endpoint(&["events"])?, event).await
    }

    pub async fn update_event(&self, id: &str, update: &EventUpdate) -> Result<Event> {
        self.put(self.endpoint(&["events", id])?, update).await
    }

    pub async fn delete_event(&self, id: &str) -> Result<MessageResponse> {
        self.delete(self.endpoint(&["events", id])?).await
    }

    // ===== Announcements =====

    pub async fn fetch_announcements(&self) -> Result<Vec<Announcement>> {
        self.get(self.endpoint(&["announcements"])?).await
    }

    pub async fn create_announcement(&self, announcement: &NewAnnouncement) -> Result<Announcement> {
        self.post(self.endpoint(&["announcements"])?, announcement).await
    }

    // ===== Favorites =====

    pub async fn fetch_favorites(&self) -> Result<Vec<FavoriteEvent>> {
        self.get(self.endpoint(&["favorites"])?).await
    }

    pub async fn add_favorite(&self, event_id: &str) -> Result<AddFavoriteResponse> {
        self.post(self.endpoint(&["favorites", event_id])?, &serde_json::json!({}))
            .await
    }

    pub async fn remove_favorite(&self, event_id: &str) -> Result<MessageResponse> {
        self.delete(self.endpoint(&["favorites", event_id])?).await
    }

    pub async fn check_favorite(&self, event_id: &str) -> Result<FavoriteStatus> {
        self.get(self.endpoint(&["favorites", "check", event_id])?).await
    }

    // ===== Tickets & notifications =====

    pub async fn check_in(&self, ticket_id: &str) -> Result<CheckinResponse> {
        self.post(self.endpoint(&["tickets", "checkin"])?, &CheckinRequest { ticket_id })
            .await
    }

    pub async fn register_push_token(&self, push_token: &str, platform: &str) -> Result<MessageResponse> {
        let body = PushTokenRequest { push_token, platform };
        self.post(self.endpoint(&["notifications", "push-token"])?, &body)
            .await
    }
}

#[cfg(test)]
mod tests {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::task::JoinHandle;

    use super::*;
    use crate::filters::{SortBy, SortOrder};

    fn client(base: &str) -> ApiClient {
        ApiClient::new(base, DEFAULT_TIMEOUT).unwrap()
    }

    /// Serve one canned HTTP response and hand back the raw request text.
    async fn serve_once(status: &str, body: &str) -> (String, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}/api", listener.local_addr().unwrap());
        let response = format!(
            "HTTP/1.1 {}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
            status,
            body.len(),
            body
        );

        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 4096];
            loop {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..n]);
                let text = String::from_utf8_lossy(&request);
                if let Some(head_end) = text.find("\r\n\r\n") {
                    let content_length = text[..head_end]
                        .lines()
                        .find_map(|l| {
                            let (name, value) = l.split_once(':')?;
                            name.eq_ignore_ascii_case("content-length")
                                .then(|| value.trim().parse::<usize>().ok())
                                .flatten()
                        })
                        .unwrap_or(0);
                    if request.len() >= head_end + 4 + content_length {
                        break;
                    }
                }
            }
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.ok();
            String::from_utf8_lossy(&request).into_owned()
        });

        (base, handle)
    }

    #[test]
    fn test_endpoint_joins_and_encodes_segments() {
        let api = client("http://localhost:4000/api");
        assert_eq!(
            api.endpoint(&["favorites", "check", "e 1"]).unwrap().as_str(),
            "http://localhost:4000/api/favorites/check/e%201"
        );

        let api = client("http://localhost:4000/api/");
        assert_eq!(api.endpoint(&["events"]).unwrap().as_str(), "http://localhost:4000/api/events");
    }

    #[test]
    fn test_rejects_bad_base_url() {
        assert!(ApiClient::new("not a url", DEFAULT_TIMEOUT).is_err());
        assert!(ApiClient::new("mailto:someone@example.com", DEFAULT_TIMEOUT).is_err());
    }

    #[test]
    fn test_auth_headers() {
        let api = client(DEFAULT_API_URL);
        assert!(api.auth_headers().unwrap().is_empty());

        let api = api.with_token("abc".to_string());
        assert_eq!(api.token(), Some("abc"));
        assert_eq!(api.auth_headers().unwrap()[header::AUTHORIZATION], "Bearer abc");
    }

    #[tokio::test]
    async fn test_register_validates_before_sending() {
        // nothing listens on this port; a request would fail with a network error
        let api = client("http://127.0.0.1:9/api");
        let form = RegistrationForm {
            email: "nope".to_string(),
            password: "123".to_string(),
            name: "Ada".to_string(),
        };

        let err = api.register(&form).await.unwrap_err();
        let api_err = err.downcast_ref::<ApiError>().unwrap();
        let fields = api_err.field_errors().unwrap();
        assert!(fields.contains_key("email"));
        assert!(fields.contains_key("password"));
    }

    #[tokio::test]
    async fn test_verify_without_token_is_unauthorized() {
        let err = client(DEFAULT_API_URL).verify_token().await.unwrap_err();
        assert!(err.downcast_ref::<ApiError>().unwrap().is_auth_error());
    }

    #[tokio::test]
    async fn test_fetch_events_sends_filters_and_token() {
        let body = r#"{
            "events": [{"_id": "e1", "title": "Rust Workshop", "date": "2026-05-02T14:00:00Z"}],
            "pagination": {"currentPage": 1, "totalPages": 1, "totalEvents": 1, "hasNext": false, "hasPrev": false},
            "filters": {"sortBy": "date", "sortOrder": "desc"}
        }"#;
        let (base, server) = serve_once("200 OK", body).await;
        let api = client(&base).with_token("jwt".to_string());
        let filters = EventFilters::new()
            .with_category("workshop")
            .with_sort(SortBy::Date, SortOrder::Desc);

        let page = api.fetch_events(&filters).await.unwrap();
        let request = server.await.unwrap();

        assert_eq!(page.events.len(), 1);
        assert_eq!(page.events[0].title, "Rust Workshop");
        let request_line = request.lines().next().unwrap();
        assert!(request_line.starts_with("GET /api/events?category=workshop&sortBy=date&sortOrder=desc&page=1&limit=20 "), "{}", request_line);
        assert!(request.to_lowercase().contains("authorization: bearer jwt"));
    }

    #[tokio::test]
    async fn test_fetch_events_accepts_bare_array() {
        let body = r#"[{"_id": "e1", "title": "A", "date": "2026-05-01T09:00:00Z"}, {"_id": "e2", "title": "B", "date": "2026-05-01T10:00:00Z"}]"#;
        let (base, server) = serve_once("200 OK", body).await;

        let page = client(&base).fetch_events(&EventFilters::default()).await.unwrap();
        server.await.unwrap();

        assert_eq!(page.events.len(), 2);
        assert_eq!(page.pagination.total_events, 2);
        assert!(!page.pagination.has_next);
    }

    #[tokio::test]
    async fn test_fetch_events_rejects_invalid_page_locally() {
        let err = client("http://127.0.0.1:9/api")
            .fetch_events(&EventFilters::new().with_page(0))
            .await
            .unwrap_err();
        assert!(err.downcast_ref::<crate::filters::FilterError>().is_some());
    }

    #[tokio::test]
    async fn test_error_status_maps_to_api_error() {
        let (base, server) = serve_once("404 Not Found", r#"{"error": "Event not found"}"#).await;

        let err = client(&base).fetch_event("missing").await.unwrap_err();
        server.await.unwrap();

        let api_err = err.downcast_ref::<ApiError>().unwrap();
        assert!(matches!(api_err, ApiError::NotFound(m) if m == "Event not found"));
    }

    #[tokio::test]
    async fn test_check_in_posts_ticket_id() {
        let body = r#"{"message": "Ticket checked in successfully", "ticket": {"_id": "t1", "checkedIn": true}}"#;
        let (base, server) = serve_once("200 OK", body).await;

        let resp = client(&base).with_token("jwt".to_string()).check_in("t1").await.unwrap();
        let request = server.await.unwrap();

        assert!(resp.ticket.checked_in);
        assert!(request.starts_with("POST /api/tickets/checkin "));
        assert!(request.ends_with(r#"{"ticketId":"t1"}"#));
    }

    #[tokio::test]
    async fn test_fetch_profile() {
        let body = r#"{"_id": "u1", "email": "ada@example.com", "name": "Ada", "bio": "Engines"}"#;
        let (base, server) = serve_once("200 OK", body).await;

        let profile = client(&base).with_token("jwt".to_string()).fetch_profile().await.unwrap();
        let request = server.await.unwrap();

        assert_eq!(profile.name, "Ada");
        assert_eq!(profile.bio.as_deref(), Some("Engines"));
        assert!(request.starts_with("GET /api/profile "));
        assert!(request.to_lowercase().contains("authorization: bearer jwt"));
    }

    #[tokio::test]
    async fn test_update_profile_puts_set_fields() {
        let body = r#"{"_id": "u1", "email": "ada@example.com", "name": "Ada L."}"#;
        let (base, server) = serve_once("200 OK", body).await;
        let update = ProfileUpdate {
            name: Some("Ada L.".to_string()),
            ..Default::default()
        };

        let profile = client(&base)
            .with_token("jwt".to_string())
            .update_profile(&update)
            .await
            .unwrap();
        let request = server.await.unwrap();

        assert_eq!(profile.name, "Ada L.");
        assert!(request.starts_with("PUT /api/profile "));
        assert!(request.ends_with(r#"{"name":"Ada L."}"#));
    }

    #[tokio::test]
    async fn test_create_announcement() {
        let body = r#"{"_id": "a1", "title": "Doors open", "content": "Desk 3", "priority": "high"}"#;
        let (base, server) = serve_once("201 Created", body).await;
        let announcement = NewAnnouncement {
            title: "Doors open".to_string(),
            content: "Desk 3".to_string(),
            priority: crate::models::Priority::High,
        };

        let created = client(&base).create_announcement(&announcement).await.unwrap();
        let request = server.await.unwrap();

        assert_eq!(created.id, "a1");
        assert!(created.is_urgent());
        assert!(request.starts_with("POST /api/announcements "));
        assert!(request.ends_with(r#"{"title":"Doors open","content":"Desk 3","priority":"high"}"#));
    }

    #[tokio::test]
    async fn test_push_token_body() {
        let (base, server) = serve_once("200 OK", r#"{"message": "Push token registered successfully"}"#).await;

        let resp = client(&base)
            .with_token("jwt".to_string())
            .register_push_token("ExponentPushToken[abc]", "ios")
            .await
            .unwrap();
        let request = server.await.unwrap();

        assert_eq!(resp.message, "Push token registered successfully");
        assert!(request.ends_with(r#"{"pushToken":"ExponentPushToken[abc]","platform":"ios"}"#));
    }
}
