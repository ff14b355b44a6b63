use tracing::warn;

use crate::cache::{CacheError, Storage};

pub const OFFLINE_FAVORITES_KEY: &str = "convention_app_offline_favorites";

/// Favorite event ids kept on the device, in insertion order.
pub struct OfflineFavorites<S> {
    storage: S,
}

impl<S: Storage> OfflineFavorites<S> {
    pub fn new(storage: S) -> Self {
        Self { storage }
    }

    pub fn list(&self) -> Vec<String> {
        match self.storage.get_item(OFFLINE_FAVORITES_KEY) {
            Ok(Some(raw)) => serde_json::from_str(&raw).unwrap_or_else(|e| {
                warn!(error = %e, "Failed to parse offline favorites");
                Vec::new()
            }),
            Ok(None) => Vec::new(),
            Err(e) => {
                warn!(error = %e, "Failed to read offline favorites");
                Vec::new()
            }
        }
    }

    fn save(&self, ids: &[String]) -> Result<(), CacheError> {
        let contents = serde_json::to_string(ids).map_err(|source| CacheError::Serialize {
            key: OFFLINE_FAVORITES_KEY.to_string(),
            source,
        })?;
        self.storage.set_item(OFFLINE_FAVORITES_KEY, &contents)?;
        Ok(())
    }

    /// Returns false if it was already a favorite.
    pub fn add(&self, event_id: &str) -> Result<bool, CacheError> {
        let mut ids = self.list();
        if ids.iter().any(|id| id == event_id) {
            return Ok(false);
        }
        ids.push(event_id.to_string());
        self.save(&ids)?;
        Ok(true)
    }

    pub fn remove(&self, event_id: &str) -> Result<bool, CacheError> {
        let mut ids = self.list();
        let before = ids.len();
        ids.retain(|id| id != event_id);
        if ids.len() == before {
            return Ok(false);
        }
        self.save(&ids)?;
        Ok(true)
    }

    pub fn contains(&self, event_id: &str) -> bool {
        self.list().iter().any(|id| id == event_id)
    }

    pub fn clear(&self) -> Result<(), CacheError> {
        self.save(&[])
    }
}
