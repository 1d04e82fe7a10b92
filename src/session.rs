//! Per-victim rebinding session state.
//!
//! One [`SessionState`] exists per rebinding program, keyed by the session
//! token embedded in the query name. The store is shared between the DNS
//! responder (which creates and advances sessions) and the HTTP dispatcher
//! (which latches the firewall flag); both sides only ever hold the lock
//! for short, non-blocking critical sections.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use log::debug;

/// Rebinding state of one victim session.
#[derive(Debug, Clone)]
pub struct SessionState {
    /// Wall-clock time of the first query that created this session.
    pub first_query_time: DateTime<Utc>,
    /// Time of the last answered query. `None` until the responder has
    /// answered once; the expiry sweep spares such entries.
    pub last_query_time: Option<DateTime<Utc>>,
    /// Time of the query currently being dispatched.
    pub current_query_time: DateTime<Utc>,
    /// String form of the first host in the program: where the payload
    /// is fetched from.
    pub attacker_ip: String,
    /// String form of the second host: an IP literal, a DNS name, or the
    /// literal `localhost`.
    pub rebound_target: String,
    /// Window in seconds within which first-then-second keeps answering
    /// with the target.
    pub rebound_timeout_secs: u64,
    /// Round-robin cursor, cycling 0 -> 1 -> 2 -> 1 -> 2 ...
    pub last_rr_index: u8,
    /// Latched by the HTTP dispatcher once a drop rule has been installed
    /// for this session; multi-A then stops advertising the attacker IP.
    pub firewalled_once: bool,
}

impl SessionState {
    /// State for a session seen for the first time at `now`.
    pub fn new(now: DateTime<Utc>, attacker_ip: String, rebound_target: String, rebound_timeout_secs: u64) -> Self {
        Self {
            first_query_time: now,
            last_query_time: None,
            current_query_time: now,
            attacker_ip,
            rebound_target,
            rebound_timeout_secs,
            last_rr_index: 0,
            firewalled_once: false,
        }
    }
}

/// Concurrent map from session id to rebinding state.
///
/// Reads take the shared lock, mutations the exclusive lock. Unbounded
/// growth between expiry sweeps is accepted; flooding the store with
/// session ids is a known denial-of-service vector.
#[derive(Debug, Default)]
pub struct SessionStore {
    sessions: RwLock<HashMap<String, SessionState>>,
}

impl SessionStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts `initial` under `id` unless the session already exists.
    ///
    /// Returns `true` if the entry pre-existed (and was left untouched).
    pub fn get_or_create(&self, id: &str, initial: SessionState) -> bool {
        let mut sessions = self.sessions.write().unwrap_or_else(|e| e.into_inner());
        match sessions.entry(id.to_string()) {
            std::collections::hash_map::Entry::Occupied(_) => true,
            std::collections::hash_map::Entry::Vacant(slot) => {
                slot.insert(initial);
                false
            }
        }
    }

    /// Applies a read-only projection to the session under the shared lock.
    ///
    /// Returns `None` if the session does not exist.
    pub fn read<T>(&self, id: &str, f: impl FnOnce(&SessionState) -> T) -> Option<T> {
        let sessions = self.sessions.read().unwrap_or_else(|e| e.into_inner());
        sessions.get(id).map(f)
    }

    /// Mutates the session under the exclusive lock.
    ///
    /// Returns `None` if the session does not exist.
    pub fn update<T>(&self, id: &str, f: impl FnOnce(&mut SessionState) -> T) -> Option<T> {
        let mut sessions = self.sessions.write().unwrap_or_else(|e| e.into_inner());
        sessions.get_mut(id).map(f)
    }

    /// Whether a session exists for `id`.
    pub fn contains(&self, id: &str) -> bool {
        let sessions = self.sessions.read().unwrap_or_else(|e| e.into_inner());
        sessions.contains_key(id)
    }

    /// Number of live sessions.
    pub fn len(&self) -> usize {
        let sessions = self.sessions.read().unwrap_or_else(|e| e.into_inner());
        sessions.len()
    }

    /// Whether the store holds no sessions.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Removes sessions whose last answered query is older than `max_age`.
    ///
    /// Entries that were created but never answered (no `last_query_time`)
    /// are retained.
    pub fn sweep(&self, max_age: Duration) {
        let cutoff = chrono::Duration::from_std(max_age).unwrap_or(chrono::Duration::MAX);
        let now = Utc::now();
        let mut sessions = self.sessions.write().unwrap_or_else(|e| e.into_inner());
        let before = sessions.len();
        sessions.retain(|_, state| match state.last_query_time {
            Some(last) => now.signed_duration_since(last) <= cutoff,
            None => true,
        });
        let removed = before - sessions.len();
        if removed > 0 {
            debug!("DNS: expired {} idle session(s)", removed);
        }
    }
}

/// Spawns the periodic expiry sweeper.
///
/// Runs until the task is aborted; each tick removes sessions idle for
/// longer than `max_age`.
pub fn spawn_expiry_sweeper(
    store: Arc<SessionStore>,
    max_age: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let period = max_age.max(Duration::from_secs(1));
        let mut interval = tokio::time::interval(period);
        // the first tick fires immediately; harmless, the store is empty
        loop {
            interval.tick().await;
            store.sweep(max_age);
        }
    })
}
