//! Idempotency cache: maps a client-supplied key to the fingerprint of the
//! request that first used it and, once the request finishes, its response.
//!
//! Arbitration outcomes:
//! - **New**: first use of the key; the caller processes the request and
//!   completes (or aborts) the returned ticket.
//! - **Replay**: same key, same fingerprint, finished; the cached response
//!   is returned verbatim.
//! - **Conflict**: same key, different fingerprint; the key is being
//!   reused for a different request.
//! - **InFlight**: same key, same fingerprint, but the first request has
//!   not finished yet.

use dashmap::DashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
enum IdemState {
    InFlight,
    Done {
        status: u16,
        response: serde_json::Value,
    },
}

#[derive(Debug, Clone)]
struct IdemEntry {
    request_hash: String,
    state: IdemState,
    expires_at: Instant,
}

/// Outcome of idempotency arbitration for an incoming request.
pub enum IdempotencyOutcome {
    /// First writer for this key; process the request, then complete the
    /// ticket with the response to cache.
    New(IdempotencyTicket),
    /// Identical request already processed; return the cached response.
    Replay {
        status: u16,
        response: serde_json::Value,
    },
    /// Key reused with a different request fingerprint.
    Conflict,
    /// Identical request still being processed by another handler.
    InFlight,
}

/// Store of idempotency records with a bounded TTL.
#[derive(Clone)]
pub struct IdempotencyStore {
    inner: Arc<DashMap<String, IdemEntry>>,
    ttl: Duration,
}

impl IdempotencyStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            inner: Arc::new(DashMap::new()),
            ttl,
        }
    }

    /// Arbitrate a request under `key` with the given fingerprint. First
    /// writer wins: exactly one caller per key observes `New`.
    pub fn begin(&self, key: &str, request_hash: &str) -> IdempotencyOutcome {
        let now = Instant::now();
        match self.inner.entry(key.to_string()) {
            dashmap::mapref::entry::Entry::Occupied(mut occupied) => {
                if now >= occupied.get().expires_at {
                    occupied.insert(IdemEntry {
                        request_hash: request_hash.to_string(),
                        state: IdemState::InFlight,
                        expires_at: now + self.ttl,
                    });
                    return IdempotencyOutcome::New(self.ticket(key, request_hash));
                }
                let entry = occupied.get();
                if entry.request_hash != request_hash {
                    return IdempotencyOutcome::Conflict;
                }
                match &entry.state {
                    IdemState::Done { status, response } => IdempotencyOutcome::Replay {
                        status: *status,
                        response: response.clone(),
                    },
                    IdemState::InFlight => IdempotencyOutcome::InFlight,
                }
            }
            dashmap::mapref::entry::Entry::Vacant(vacant) => {
                vacant.insert(IdemEntry {
                    request_hash: request_hash.to_string(),
                    state: IdemState::InFlight,
                    expires_at: now + self.ttl,
                });
                IdempotencyOutcome::New(self.ticket(key, request_hash))
            }
        }
    }

    /// Drop expired records.
    pub fn purge_expired(&self) -> usize {
        let before = self.inner.len();
        let now = Instant::now();
        self.inner.retain(|_, entry| now < entry.expires_at);
        before - self.inner.len()
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    fn ticket(&self, key: &str, request_hash: &str) -> IdempotencyTicket {
        IdempotencyTicket {
            map: Arc::clone(&self.inner),
            key: key.to_string(),
            request_hash: request_hash.to_string(),
            completed: false,
        }
    }
}

/// Claim on an in-flight idempotency record. Completing it caches the
/// response; dropping it without completing releases the key so a retry
/// can run.
pub struct IdempotencyTicket {
    map: Arc<DashMap<String, IdemEntry>>,
    key: String,
    request_hash: String,
    completed: bool,
}

impl IdempotencyTicket {
    /// Cache the response for replays of this key.
    pub fn complete(mut self, status: u16, response: serde_json::Value) {
        if let Some(mut entry) = self.map.get_mut(&self.key) {
            if entry.request_hash == self.request_hash {
                entry.state = IdemState::Done { status, response };
            }
        }
        self.completed = true;
    }
}

impl Drop for IdempotencyTicket {
    fn drop(&mut self) {
        if !self.completed {
            self.map.remove_if(&self.key, |_, entry| {
                entry.request_hash == self.request_hash
                    && matches!(entry.state, IdemState::InFlight)
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn first_use_is_new_then_replay() {
        let store = IdempotencyStore::new(Duration::from_secs(60));

        let ticket = match store.begin("k1", "hash-a") {
            IdempotencyOutcome::New(ticket) => ticket,
            _ => panic!("expected New"),
        };
        ticket.complete(201, json!({"id": "ride-1"}));

        match store.begin("k1", "hash-a") {
            IdempotencyOutcome::Replay { status, response } => {
                assert_eq!(status, 201);
                assert_eq!(response["id"], "ride-1");
            }
            _ => panic!("expected Replay"),
        }
    }

    #[test]
    fn same_key_different_fingerprint_conflicts() {
        let store = IdempotencyStore::new(Duration::from_secs(60));
        match store.begin("k1", "hash-a") {
            IdempotencyOutcome::New(ticket) => ticket.complete(201, json!({})),
            _ => panic!("expected New"),
        }
        assert!(matches!(
            store.begin("k1", "hash-b"),
            IdempotencyOutcome::Conflict
        ));
    }

    #[test]
    fn duplicate_while_in_flight() {
        let store = IdempotencyStore::new(Duration::from_secs(60));
        let _ticket = match store.begin("k1", "hash-a") {
            IdempotencyOutcome::New(ticket) => ticket,
            _ => panic!("expected New"),
        };
        assert!(matches!(
            store.begin("k1", "hash-a"),
            IdempotencyOutcome::InFlight
        ));
    }

    #[test]
    fn abandoned_ticket_releases_key() {
        let store = IdempotencyStore::new(Duration::from_secs(60));
        match store.begin("k1", "hash-a") {
            IdempotencyOutcome::New(ticket) => drop(ticket),
            _ => panic!("expected New"),
        }
        // the failed attempt left no record; retry is admitted
        assert!(matches!(
            store.begin("k1", "hash-a"),
            IdempotencyOutcome::New(_)
        ));
    }

    #[test]
    fn distinct_keys_are_independent() {
        let store = IdempotencyStore::new(Duration::from_secs(60));
        let t1 = match store.begin("k1", "hash-a") {
            IdempotencyOutcome::New(t) => t,
            _ => panic!("expected New"),
        };
        let t2 = match store.begin("k2", "hash-a") {
            IdempotencyOutcome::New(t) => t,
            _ => panic!("expected New"),
        };
        t1.complete(201, json!({"id": 1}));
        t2.complete(201, json!({"id": 2}));
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn expired_record_admits_fresh_request() {
        let store = IdempotencyStore::new(Duration::from_millis(20));
        match store.begin("k1", "hash-a") {
            IdempotencyOutcome::New(ticket) => ticket.complete(201, json!({})),
            _ => panic!("expected New"),
        }
        std::thread::sleep(Duration::from_millis(40));
        assert!(matches!(
            store.begin("k1", "hash-b"),
            IdempotencyOutcome::New(_)
        ));
    }

    #[test]
    fn concurrent_begins_admit_single_writer() {
        let store = IdempotencyStore::new(Duration::from_secs(60));
        let mut handles = Vec::new();
        for _ in 0..8 {
            let store = store.clone();
            handles.push(std::thread::spawn(move || {
                match store.begin("k1", "hash-a") {
                    IdempotencyOutcome::New(ticket) => {
                        // hold the claim briefly, then cache
                        std::thread::sleep(Duration::from_millis(10));
                        ticket.complete(201, json!({}));
                        1usize
                    }
                    _ => 0usize,
                }
            }));
        }
        let winners: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(winners, 1);
    }

    #[test]
    fn purge_drops_expired_records() {
        let store = IdempotencyStore::new(Duration::from_millis(20));
        match store.begin("k1", "hash-a") {
            IdempotencyOutcome::New(ticket) => ticket.complete(201, json!({})),
            _ => panic!("expected New"),
        }
        std::thread::sleep(Duration::from_millis(40));
        assert_eq!(store.purge_expired(), 1);
        assert!(store.is_empty());
    }
}
