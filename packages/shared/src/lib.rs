//! Shared utilities for Kaiwa.
//!
//! Cross-cutting helpers used by the client crates: logger bootstrap and
//! timestamp conversion.

pub mod logger;
pub mod time;

pub use logger::setup_logger;
pub use time::{now_unix_millis, unix_millis_to_rfc3339};
