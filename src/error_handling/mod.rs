//! Error handling.
//!
//! Typed errors live here; application edges wrap them with `anyhow`
//! context. Request handlers never propagate: every failure becomes a
//! logged drop, a 4xx response, or a message on the listener error channel.

mod types;

pub use types::{InitializationError, QueryParseError};
