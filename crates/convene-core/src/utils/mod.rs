//! Utility functions for string formatting.

pub mod format;

pub use format::{format_age, format_datetime, format_storage_size, truncate_string};
