//! Data models for convention entities.
//!
//! This module contains the records exchanged with the backend:
//!
//! - `Event`, `NewEvent`, `EventUpdate`: schedule entries and their write bodies
//! - `Announcement`, `NewAnnouncement`: organizer notices
//! - `FavoriteEvent`, `FavoriteStatus`: per-user favorites
//! - `Ticket`, `CheckinResponse`: ticket check-in
//! - `User`, `AuthResponse`, `VerifyResponse`, `RegistrationForm`: accounts
//! - `Profile`, `ProfileUpdate`: the signed-in user's editable record

pub mod announcement;
pub mod event;
pub mod favorite;
pub mod ticket;
pub mod user;

use serde::{Deserialize, Serialize};

pub use announcement::{Announcement, NewAnnouncement};
pub use event::{Event, EventCategory, EventUpdate, NewEvent, Priority, Speaker};
pub use favorite::{AddFavoriteResponse, FavoriteEvent, FavoriteStatus};
pub use ticket::{ticket_id_from_scan, CheckinResponse, Ticket};
pub use user::{AuthResponse, Profile, ProfileUpdate, RegistrationForm, User, VerifyResponse};

/// Plain `{"message": ...}` acknowledgement returned by delete-style endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageResponse {
    #[serde(default)]
    pub message: String,
}
