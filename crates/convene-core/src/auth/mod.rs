//! Authentication module for managing the user session.
//!
//! This module provides `Session`: the bearer token returned by
//! `POST /auth/login`, persisted through a `Storage` backend. Tokens expire
//! 7 days after they are issued.

pub mod session;

pub use session::{Session, SessionData, SESSION_KEY, TOKEN_EXPIRY_DAYS};
