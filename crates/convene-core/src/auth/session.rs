use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::cache::{FileStorage, Storage};
use crate::models::{AuthResponse, User};

/// Storage key; `FileStorage` over the cache dir keeps it in `session.json`.
pub const SESSION_KEY: &str = "session";

/// Token lifetime. The backend signs tokens with a 7 day expiry.
pub const TOKEN_EXPIRY_DAYS: i64 = 7;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionData {
    pub token: String,
    pub user: User,
    pub created_at: DateTime<Utc>,
}

impl SessionData {
    pub fn from_auth(auth: AuthResponse) -> Self {
        Self {
            token: auth.token,
            user: auth.user,
            created_at: Utc::now(),
        }
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.created_at + Duration::days(TOKEN_EXPIRY_DAYS)
    }

    pub fn is_expired(&self) -> bool {
        Utc::now() > self.expires_at()
    }

    pub fn time_until_expiry(&self) -> Duration {
        self.expires_at() - Utc::now()
    }
}

/// The signed-in user and their bearer token. Stored outside the TTL cache's
/// key prefix, so `clear_all` leaves it in place.
pub struct Session {
    storage: Arc<dyn Storage>,
    pub data: Option<SessionData>,
}

impl Session {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage, data: None }
    }

    /// Session kept as `session.json` in `cache_dir`.
    pub fn in_dir(cache_dir: PathBuf) -> Self {
        Self::new(Arc::new(FileStorage::new(cache_dir)))
    }

    /// Returns false when nothing is stored or the stored token has expired.
    pub fn load(&mut self) -> Result<bool> {
        let Some(raw) = self
            .storage
            .get_item(SESSION_KEY)
            .context("Failed to read session")?
        else {
            return Ok(false);
        };
        let data: SessionData = serde_json::from_str(&raw).context("Failed to parse session")?;

        if data.is_expired() {
            debug!(created_at = %data.created_at, "Discarding expired session");
            if let Err(e) = self.storage.remove_item(SESSION_KEY) {
                warn!(error = %e, "Failed to remove expired session");
            }
            return Ok(false);
        }
        self.data = Some(data);
        Ok(true)
    }

    /// Write the current session. A signed-out session writes nothing.
    pub fn save(&self) -> Result<()> {
        let Some(ref data) = self.data else {
            return Ok(());
        };
        let contents = serde_json::to_string_pretty(data)?;
        self.storage
            .set_item(SESSION_KEY, &contents)
            .context("Failed to write session")?;
        Ok(())
    }

    /// Forget the session in memory and in storage.
    pub fn clear(&mut self) -> Result<()> {
        self.data = None;
        self.storage
            .remove_item(SESSION_KEY)
            .context("Failed to remove session")?;
        Ok(())
    }

    pub fn update(&mut self, data: SessionData) {
        self.data = Some(data);
    }

    /// Bearer token, hidden once expired.
    pub fn token(&self) -> Option<&str> {
        self.live().map(|d| d.token.as_str())
    }

    pub fn user(&self) -> Option<&User> {
        self.data.as_ref().map(|d| &d.user)
    }

    pub fn is_valid(&self) -> bool {
        self.live().is_some()
    }

    fn live(&self) -> Option<&SessionData> {
        self.data.as_ref().filter(|d| !d.is_expired())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryStorage;

    fn user() -> User {
        User {
            id: "u1".to_string(),
            email: "ada@example.com".to_string(),
            name: "Ada".to_string(),
        }
    }

    fn data(age_days: i64) -> SessionData {
        SessionData {
            token: "jwt".to_string(),
            user: user(),
            created_at: Utc::now() - Duration::days(age_days),
        }
    }

    #[test]
    fn test_expiry() {
        assert!(!data(0).is_expired());
        assert!(!data(6).is_expired());
        assert!(data(8).is_expired());
        assert!(data(0).time_until_expiry() > Duration::days(6));
    }

    #[test]
    fn test_save_load_clear() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = Session::in_dir(dir.path().to_path_buf());
        assert!(!session.load().unwrap());

        session.update(data(1));
        session.save().unwrap();
        assert!(dir.path().join("session.json").exists());

        let mut reloaded = Session::in_dir(dir.path().to_path_buf());
        assert!(reloaded.load().unwrap());
        assert_eq!(reloaded.token(), Some("jwt"));
        assert_eq!(reloaded.user().map(|u| u.name.as_str()), Some("Ada"));

        reloaded.clear().unwrap();
        assert!(!reloaded.is_valid());
        assert!(!dir.path().join("session.json").exists());
    }

    #[test]
    fn test_expired_session_is_discarded() {
        let storage = Arc::new(MemoryStorage::new());
        let mut session = Session::new(storage.clone());
        session.update(data(30));
        session.save().unwrap();
        assert!(session.token().is_none());

        let mut reloaded = Session::new(storage.clone());
        assert!(!reloaded.load().unwrap());
        assert!(reloaded.data.is_none());
        assert!(storage.get_item(SESSION_KEY).unwrap().is_none());
    }

    #[test]
    fn test_corrupt_session_is_an_error() {
        let storage = Arc::new(MemoryStorage::new());
        storage.set_item(SESSION_KEY, "{not json").unwrap();

        let mut session = Session::new(storage);
        assert!(session.load().is_err());
        assert!(!session.is_valid());
    }

    #[test]
    fn test_signed_out_save_writes_nothing() {
        let storage = Arc::new(MemoryStorage::new());
        Session::new(storage.clone()).save().unwrap();
        assert!(storage.keys().unwrap().is_empty());
    }

    #[test]
    fn test_from_auth() {
        let auth = AuthResponse {
            message: "Login successful".to_string(),
            token: "t".to_string(),
            user: user(),
        };
        let data = SessionData::from_auth(auth);
        assert_eq!(data.token, "t");
        assert!(!data.is_expired());
    }
}
