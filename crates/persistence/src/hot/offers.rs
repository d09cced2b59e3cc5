//! Fast-lookup entries for outstanding driver offers.
//!
//! One entry per ride holds the identifying fields of the current offer so
//! deadline checks never touch the relational store. The entry outlives the
//! offer deadline by a small slack window: within that window the timeout
//! sweep still sees the entry and can resolve the offer; past it, absence
//! of the entry is the authoritative signal that the offer is no longer
//! live.

use dashmap::DashMap;
use std::time::{Duration, Instant};
use uuid::Uuid;

/// Identifying fields of a ride's current offer.
#[derive(Debug, Clone)]
pub struct OfferEntry {
    pub offer_id: Uuid,
    pub driver_id: String,
    deadline: Instant,
    evict_at: Instant,
}

impl OfferEntry {
    /// Whether the driver's response window has closed.
    pub fn deadline_passed(&self) -> bool {
        Instant::now() >= self.deadline
    }
}

/// Store of fast-lookup offer entries keyed by ride id.
pub struct OfferEntryStore {
    inner: DashMap<Uuid, OfferEntry>,
    slack: Duration,
}

impl OfferEntryStore {
    /// `slack` is how long an entry survives past the offer deadline so the
    /// timeout sweep can observe it.
    pub fn new(slack: Duration) -> Self {
        Self {
            inner: DashMap::new(),
            slack,
        }
    }

    /// Record the current offer for a ride, replacing any prior entry.
    pub fn put(&self, ride_id: Uuid, offer_id: Uuid, driver_id: &str, offer_ttl: Duration) {
        let deadline = Instant::now() + offer_ttl;
        self.inner.insert(
            ride_id,
            OfferEntry {
                offer_id,
                driver_id: driver_id.to_string(),
                deadline,
                evict_at: deadline + self.slack,
            },
        );
    }

    /// The live entry for a ride, if any. An entry past its eviction point
    /// is treated as absent (and dropped).
    pub fn get(&self, ride_id: Uuid) -> Option<OfferEntry> {
        let entry = self.inner.get(&ride_id)?;
        if Instant::now() >= entry.evict_at {
            drop(entry);
            self.inner
                .remove_if(&ride_id, |_, e| Instant::now() >= e.evict_at);
            return None;
        }
        Some(entry.clone())
    }

    /// Delete the entry for a ride (offer resolved).
    pub fn remove(&self, ride_id: Uuid) {
        self.inner.remove(&ride_id);
    }

    /// Rides whose offer deadline has passed but whose entry is still held;
    /// the timeout sweep resolves these.
    pub fn rides_past_deadline(&self) -> Vec<Uuid> {
        let now = Instant::now();
        self.inner
            .iter()
            .filter(|e| now >= e.deadline && now < e.evict_at)
            .map(|e| *e.key())
            .collect()
    }

    /// Drop entries past their eviction point.
    pub fn purge_expired(&self) -> usize {
        let before = self.inner.len();
        let now = Instant::now();
        self.inner.retain(|_, entry| now < entry.evict_at);
        before - self.inner.len()
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_get_remove_roundtrip() {
        let store = OfferEntryStore::new(Duration::from_secs(5));
        let ride_id = Uuid::new_v4();
        let offer_id = Uuid::new_v4();

        store.put(ride_id, offer_id, "drv-1", Duration::from_secs(15));
        let entry = store.get(ride_id).expect("entry present");
        assert_eq!(entry.offer_id, offer_id);
        assert_eq!(entry.driver_id, "drv-1");
        assert!(!entry.deadline_passed());

        store.remove(ride_id);
        assert!(store.get(ride_id).is_none());
    }

    #[test]
    fn replacing_offer_overwrites_entry() {
        let store = OfferEntryStore::new(Duration::from_secs(5));
        let ride_id = Uuid::new_v4();

        store.put(ride_id, Uuid::new_v4(), "drv-1", Duration::from_secs(15));
        let second_offer = Uuid::new_v4();
        store.put(ride_id, second_offer, "drv-2", Duration::from_secs(15));

        let entry = store.get(ride_id).unwrap();
        assert_eq!(entry.offer_id, second_offer);
        assert_eq!(entry.driver_id, "drv-2");
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn deadline_passes_but_entry_survives_slack() {
        let store = OfferEntryStore::new(Duration::from_millis(100));
        let ride_id = Uuid::new_v4();

        store.put(ride_id, Uuid::new_v4(), "drv-1", Duration::from_millis(20));
        std::thread::sleep(Duration::from_millis(40));

        let entry = store.get(ride_id).expect("still inside slack window");
        assert!(entry.deadline_passed());
        assert_eq!(store.rides_past_deadline(), vec![ride_id]);
    }

    #[test]
    fn entry_absent_after_eviction_point() {
        let store = OfferEntryStore::new(Duration::from_millis(10));
        let ride_id = Uuid::new_v4();

        store.put(ride_id, Uuid::new_v4(), "drv-1", Duration::from_millis(10));
        std::thread::sleep(Duration::from_millis(40));

        assert!(store.get(ride_id).is_none());
        assert!(store.rides_past_deadline().is_empty());
    }

    #[test]
    fn purge_drops_evicted_entries() {
        let store = OfferEntryStore::new(Duration::from_millis(10));
        store.put(Uuid::new_v4(), Uuid::new_v4(), "drv-1", Duration::from_millis(10));
        store.put(Uuid::new_v4(), Uuid::new_v4(), "drv-2", Duration::from_secs(30));
        std::thread::sleep(Duration::from_millis(40));

        assert_eq!(store.purge_expired(), 1);
        assert_eq!(store.len(), 1);
    }
}
