//! Rebinding strategies.
//!
//! A strategy maps a session snapshot to the ordered list of answers the
//! DNS responder serializes. The tag is the wire-level string carried in
//! the query name; an unknown tag falls back to the configured default.
//!
//! Strategies never touch timestamps. The responder owns that bookkeeping
//! so every strategy observes a consistent `(last, current)` pair for the
//! dispatch in flight.

use std::fmt;

use clap::ValueEnum;
use rand::Rng;

use crate::session::SessionStore;

/// The closed set of rebinding strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Strategy {
    /// Answer the attacker IP on the first query, the rebound target on
    /// every later query inside the rebind timeout.
    #[value(name = "fs")]
    FirstThenSecond,
    /// Alternate deterministically between attacker IP and rebound target.
    #[value(name = "rr")]
    RoundRobin,
    /// Pick one of the two hosts uniformly at random.
    #[value(name = "rd")]
    Random,
    /// Answer both hosts at once; after the firewall trick has fired,
    /// answer only the rebound target.
    #[value(name = "ma")]
    MultiA,
}

impl Strategy {
    /// Resolves a wire tag to a strategy, if known.
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "fs" => Some(Self::FirstThenSecond),
            "rr" => Some(Self::RoundRobin),
            "rd" => Some(Self::Random),
            "ma" => Some(Self::MultiA),
            _ => None,
        }
    }

    /// The wire tag of this strategy.
    pub fn tag(&self) -> &'static str {
        match self {
            Self::FirstThenSecond => "fs",
            Self::RoundRobin => "rr",
            Self::Random => "rd",
            Self::MultiA => "ma",
        }
    }

    /// Computes the ordered answer list for `session_id`.
    ///
    /// Returns an empty list if the session has vanished (raced with the
    /// expiry sweep); the responder then sends an empty reply.
    pub fn answers(&self, session_id: &str, store: &SessionStore) -> Vec<String> {
        match self {
            Self::FirstThenSecond => first_then_second(session_id, store),
            Self::RoundRobin => round_robin(session_id, store),
            Self::Random => random(session_id, store),
            Self::MultiA => multi_a(session_id, store),
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Within the rebind timeout of the previous answer, keep steering the
/// victim at the target; otherwise hand out the attacker address.
fn first_then_second(session_id: &str, store: &SessionStore) -> Vec<String> {
    store
        .read(session_id, |s| {
            let within_timeout = s.last_query_time.is_some_and(|last| {
                s.current_query_time.signed_duration_since(last)
                    < chrono::Duration::seconds(s.rebound_timeout_secs as i64)
            });
            if within_timeout {
                vec![s.rebound_target.clone()]
            } else {
                vec![s.attacker_ip.clone()]
            }
        })
        .unwrap_or_default()
}

/// Alternate between the two hosts, advancing the persisted cursor
/// 0 -> 1 -> 2 -> 1 -> 2 ... where 1 is the attacker IP and 2 the target.
///
/// The whole transition runs under one exclusive lock acquisition so
/// concurrent queries for the same session serialize cleanly.
fn round_robin(session_id: &str, store: &SessionStore) -> Vec<String> {
    store
        .update(session_id, |s| {
            s.last_rr_index = match s.last_rr_index {
                0 | 2 => 1,
                _ => 2,
            };
            if s.last_rr_index == 1 {
                vec![s.attacker_ip.clone()]
            } else {
                vec![s.rebound_target.clone()]
            }
        })
        .unwrap_or_default()
}

fn random(session_id: &str, store: &SessionStore) -> Vec<String> {
    store
        .read(session_id, |s| {
            let hosts = [s.attacker_ip.clone(), s.rebound_target.clone()];
            let pick = rand::rng().random_range(0..hosts.len());
            vec![hosts[pick].clone()]
        })
        .unwrap_or_default()
}

/// Both hosts in one response so the browser can fail over on its own;
/// once the attacker flow has been firewalled, stop advertising the
/// attacker IP so browsers cannot revert to it.
fn multi_a(session_id: &str, store: &SessionStore) -> Vec<String> {
    store
        .read(session_id, |s| {
            if s.firewalled_once {
                vec![s.rebound_target.clone()]
            } else {
                vec![s.attacker_ip.clone(), s.rebound_target.clone()]
            }
        })
        .unwrap_or_default()
}
