//! Error type definitions.
//!
//! This module defines the typed errors of the query-name codec and of
//! process initialization.

use log::SetLoggerError;
use thiserror::Error;

/// Error types for initialization failures.
#[derive(Error, Debug)]
pub enum InitializationError {
    /// Error initializing the logger.
    #[error("Logger initialization error: {0}")]
    LoggerError(#[from] SetLoggerError),

    /// An address from the configuration did not parse.
    #[error("Invalid address in configuration: {0}")]
    InvalidAddress(String),
}

/// Failure modes of the encoded query-name codec.
///
/// A parse failure never yields a partial record and never touches the
/// session store; the DNS layer drops the query silently.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueryParseError {
    /// The name does not begin with the `s-` start tag.
    #[error("cannot find start tag in query name")]
    MissingStartTag,

    /// The name does not contain the `-e.` end tag.
    #[error("cannot find end tag in query name")]
    MissingEndTag,

    /// The domain suffix after the end tag is too short or has no dot.
    #[error("cannot parse domain suffix in query name")]
    InvalidSuffix,

    /// The program between the tags does not have exactly three
    /// dash-separated fields.
    #[error("cannot parse rebinding program in query name")]
    FieldCount,

    /// The host field has no `.` separating attacker and target hosts.
    #[error("cannot find attacker and target hosts in query name")]
    MissingHostSeparator,

    /// The attacker host is not a fully-expanded 4 or 16 byte hex address.
    #[error("cannot decode address of the first host in query name")]
    InvalidAttackerHost,

    /// The target host is neither hex-encoded address, `localhost`, nor a
    /// valid DNS name after un-escaping.
    #[error("cannot parse second host in query name")]
    InvalidReboundHost,

    /// The session field is empty.
    #[error("cannot parse session in query name")]
    EmptySession,
}
