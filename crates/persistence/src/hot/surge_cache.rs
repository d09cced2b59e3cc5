//! Cached surge computations per cell, plus the per-region set of active
//! surge cells.
//!
//! Concurrent recomputations are idempotent: the cache write replaces the
//! prior value wholesale (last write wins).

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use dashmap::DashMap;
use std::collections::HashSet;
use std::time::{Duration, Instant};

use shared::geo::Cell;

/// A cached surge reading for one cell.
#[derive(Debug, Clone)]
pub struct SurgeCacheEntry {
    pub multiplier: f64,
    pub supply: u32,
    pub demand: u32,
    pub updated_at: DateTime<Utc>,
    pub valid_until: DateTime<Utc>,
    expires_at: Instant,
}

impl SurgeCacheEntry {
    fn is_live(&self) -> bool {
        Instant::now() < self.expires_at
    }
}

/// Store of cached surge entries keyed by cell.
pub struct SurgeCacheStore {
    entries: DashMap<Cell, SurgeCacheEntry>,
    regions: DashMap<String, HashSet<Cell>>,
    ttl: Duration,
}

impl SurgeCacheStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            regions: DashMap::new(),
            ttl,
        }
    }

    /// Cache a fresh computation for a cell and register the cell in its
    /// region's active set. Replaces any prior entry.
    pub fn put(
        &self,
        region: &str,
        cell: Cell,
        multiplier: f64,
        supply: u32,
        demand: u32,
    ) -> SurgeCacheEntry {
        let now = Utc::now();
        let entry = SurgeCacheEntry {
            multiplier,
            supply,
            demand,
            updated_at: now,
            valid_until: now + ChronoDuration::from_std(self.ttl).unwrap_or_default(),
            expires_at: Instant::now() + self.ttl,
        };
        self.entries.insert(cell, entry.clone());
        self.regions
            .entry(region.to_string())
            .or_default()
            .insert(cell);
        entry
    }

    /// The live cached entry for a cell, if any.
    pub fn get(&self, cell: Cell) -> Option<SurgeCacheEntry> {
        let entry = self.entries.get(&cell)?;
        if !entry.is_live() {
            return None;
        }
        Some(entry.clone())
    }

    /// Live entries for a region at or above a multiplier threshold,
    /// descending by multiplier.
    pub fn zones(&self, region: &str, min_multiplier: f64) -> Vec<(Cell, SurgeCacheEntry)> {
        let cells: Vec<Cell> = match self.regions.get(region) {
            Some(set) => set.iter().copied().collect(),
            None => return Vec::new(),
        };

        let mut zones: Vec<(Cell, SurgeCacheEntry)> = cells
            .into_iter()
            .filter_map(|cell| self.get(cell).map(|entry| (cell, entry)))
            .filter(|(_, entry)| entry.multiplier >= min_multiplier)
            .collect();
        zones.sort_by(|a, b| b.1.multiplier.total_cmp(&a.1.multiplier));
        zones
    }

    /// Drop expired entries and prune them from region sets.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let dead: Vec<Cell> = self
            .entries
            .iter()
            .filter(|e| now >= e.expires_at)
            .map(|e| *e.key())
            .collect();

        for cell in &dead {
            self.entries.remove_if(cell, |_, e| Instant::now() >= e.expires_at);
        }
        for mut set in self.regions.iter_mut() {
            set.retain(|cell| self.entries.contains_key(cell));
        }
        dead.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
