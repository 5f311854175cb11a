//! # pvw-idempotency
//!
//! Process-local replay cache keyed by `(endpoint path, idempotency key)`.
//!
//! The front-end is the sole gate: it looks a key up after validation and
//! records the completed response (success or error) before returning it.
//! A hit with the same payload hash replays the recorded response
//! byte-for-byte; a hit with a different hash is a conflict and the live
//! execution must not proceed.
//!
//! The store is in-process only and does not survive restart. That is
//! acceptable because no cross-instance deduplication is claimed; if
//! multi-instance deployment is ever added, this becomes an external
//! interface.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// A recorded response, replayable byte-for-byte.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredResponse {
    pub status: u16,
    pub content_type: String,
    pub body: Vec<u8>,
}

/// Outcome of a cache lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    /// No live entry; execution proceeds and the outcome should be recorded.
    Miss,
    /// Same key, same payload — replay this response verbatim.
    Replay(StoredResponse),
    /// Same key, different payload — the request must be refused.
    Conflict,
}

struct Entry {
    payload_hash: String,
    response: StoredResponse,
    stored_at: Instant,
    ttl: Duration,
}

impl Entry {
    fn expired(&self, now: Instant) -> bool {
        now.duration_since(self.stored_at) >= self.ttl
    }
}

/// Defaults per the service contract.
pub const DEFAULT_TTL: Duration = Duration::from_secs(60 * 60);
pub const DEFAULT_HIGH_RISK_TTL: Duration = Duration::from_secs(15 * 60);

/// The replay cache. Safe for concurrent use; the mutex only guards O(1)
/// map operations and is never held across I/O.
pub struct IdempotencyStore {
    ttl: Duration,
    high_risk_ttl: Duration,
    entries: Mutex<HashMap<(String, String), Entry>>,
}

impl IdempotencyStore {
    pub fn new(ttl: Duration, high_risk_ttl: Duration) -> Self {
        Self {
            ttl,
            high_risk_ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(DEFAULT_TTL, DEFAULT_HIGH_RISK_TTL)
    }

    /// Look up a key for an endpoint against the given payload hash.
    ///
    /// Expired entries are removed and treated as misses. Replayed responses
    /// are copied out so callers never alias the stored body.
    pub fn lookup(&self, endpoint: &str, key: &str, payload_hash: &str) -> Lookup {
        let now = Instant::now();
        let mut entries = self.entries.lock().unwrap_or_else(|p| p.into_inner());
        let map_key = (endpoint.to_string(), key.to_string());

        match entries.get(&map_key) {
            None => Lookup::Miss,
            Some(entry) if entry.expired(now) => {
                entries.remove(&map_key);
                Lookup::Miss
            }
            Some(entry) if entry.payload_hash == payload_hash => {
                tracing::debug!(endpoint, key, "idempotent replay");
                Lookup::Replay(entry.response.clone())
            }
            Some(_) => {
                tracing::warn!(endpoint, key, "idempotency key reused with different payload");
                Lookup::Conflict
            }
        }
    }

    /// Record a completed response under a key.
    ///
    /// The first completion wins: an existing live entry is never
    /// overwritten, keeping the stored payload hash immutable for the life
    /// of the entry. Conflict responses are never recorded (the front-end
    /// returns them without calling this).
    pub fn record(
        &self,
        endpoint: &str,
        key: &str,
        payload_hash: &str,
        response: &StoredResponse,
        high_risk: bool,
    ) {
        let now = Instant::now();
        let ttl = if high_risk { self.high_risk_ttl } else { self.ttl };
        let mut entries = self.entries.lock().unwrap_or_else(|p| p.into_inner());
        let map_key = (endpoint.to_string(), key.to_string());

        match entries.get(&map_key) {
            Some(entry) if !entry.expired(now) => {}
            _ => {
                entries.insert(
                    map_key,
                    Entry {
                        payload_hash: payload_hash.to_string(),
                        response: response.clone(),
                        stored_at: now,
                        ttl,
                    },
                );
            }
        }
    }

    /// Number of live (unexpired) entries. Diagnostic only.
    pub fn len(&self) -> usize {
        let now = Instant::now();
        let entries = self.entries.lock().unwrap_or_else(|p| p.into_inner());
        entries.values().filter(|e| !e.expired(now)).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
