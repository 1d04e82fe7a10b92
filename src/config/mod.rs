//! Application configuration and constants.
//!
//! This module provides:
//! - Configuration constants (TTLs, timings, size limits)
//! - Default HTTP header constants
//! - CLI options and the runtime configuration derived from them

pub mod constants;
pub mod headers;
mod types;

pub use types::{AppConfig, LogFormat, LogLevel, Options};
