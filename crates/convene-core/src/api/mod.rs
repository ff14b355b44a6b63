//! REST API client module for the convention backend.
//!
//! This module provides the `ApiClient` for communicating with the
//! backend to fetch events, announcements and favorites, check tickets in
//! and register push tokens.
//!
//! The API uses JWT bearer token authentication obtained through
//! `POST /auth/login`.

pub mod client;
pub mod error;

pub use client::{ApiClient, DEFAULT_API_URL, DEFAULT_TIMEOUT};
pub use error::ApiError;
