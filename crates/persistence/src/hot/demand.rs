//! Per-cell demand counters with windowed expiry.
//!
//! A counter's TTL is set on the first increment of a fresh window and is
//! not refreshed by later increments; when the window lapses, the next
//! increment restarts it at one.

use dashmap::DashMap;
use std::time::{Duration, Instant};

use shared::geo::Cell;

#[derive(Debug, Clone, Copy)]
struct DemandEntry {
    count: u32,
    expires_at: Instant,
}

/// Store of per-cell demand counters.
pub struct DemandCounterStore {
    inner: DashMap<Cell, DemandEntry>,
    ttl: Duration,
}

impl DemandCounterStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            inner: DashMap::new(),
            ttl,
        }
    }

    /// Atomically increment the counter for a cell and return the new count.
    pub fn increment(&self, cell: Cell) -> u32 {
        let now = Instant::now();
        let mut entry = self.inner.entry(cell).or_insert(DemandEntry {
            count: 0,
            expires_at: now + self.ttl,
        });
        if now >= entry.expires_at {
            entry.count = 0;
            entry.expires_at = now + self.ttl;
        }
        entry.count += 1;
        entry.count
    }

    /// Current demand for a cell; zero when the window lapsed or never
    /// started.
    pub fn get(&self, cell: Cell) -> u32 {
        match self.inner.get(&cell) {
            Some(entry) if Instant::now() < entry.expires_at => entry.count,
            _ => 0,
        }
    }

    /// Drop counters whose window lapsed.
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
}
