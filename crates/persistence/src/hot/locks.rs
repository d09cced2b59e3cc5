//! Per-ride mutual-exclusion locks with acquire-with-expiry semantics.
//!
//! The lock serializes driver-response and timeout handling for a single
//! ride id. Acquisition is set-if-absent with a short TTL; a crashed holder
//! never wedges the ride because the entry expires. The RAII guard releases
//! on every exit path, including early returns and errors.

use dashmap::DashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use uuid::Uuid;

#[derive(Debug, Clone, Copy)]
struct LockEntry {
    token: Uuid,
    expires_at: Instant,
}

/// Store of per-ride locks.
#[derive(Clone)]
pub struct RideLockStore {
    inner: Arc<DashMap<Uuid, LockEntry>>,
    ttl: Duration,
}

impl RideLockStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            inner: Arc::new(DashMap::new()),
            ttl,
        }
    }

    /// Try to acquire the lock for a ride. Returns `None` if another holder
    /// currently owns a live lock; the caller surfaces RIDE_BUSY without
    /// retrying.
    pub fn acquire(&self, ride_id: Uuid) -> Option<RideLockGuard> {
        let now = Instant::now();
        let token = Uuid::new_v4();
        let entry = LockEntry {
            token,
            expires_at: now + self.ttl,
        };

        match self.inner.entry(ride_id) {
            dashmap::mapref::entry::Entry::Occupied(mut occupied) => {
                if occupied.get().expires_at > now {
                    return None;
                }
                // stale holder; steal the lock
                occupied.insert(entry);
            }
            dashmap::mapref::entry::Entry::Vacant(vacant) => {
                vacant.insert(entry);
            }
        }

        Some(RideLockGuard {
            map: Arc::clone(&self.inner),
            ride_id,
            token,
        })
    }

    /// Drop lock entries whose TTL elapsed without release.
    pub fn purge_expired(&self) -> usize {
        let before = self.inner.len();
        let now = Instant::now();
        self.inner.retain(|_, entry| entry.expires_at > now);
        before - self.inner.len()
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

/// Held per-ride lock; releases on drop. Only the holder that created the
/// entry releases it (token match), so a stolen stale lock is never
/// clobbered by its previous owner.
pub struct RideLockGuard {
    map: Arc<DashMap<Uuid, LockEntry>>,
    ride_id: Uuid,
    token: Uuid,
}

impl Drop for RideLockGuard {
    fn drop(&mut self) {
        self.map
            .remove_if(&self.ride_id, |_, entry| entry.token == self.token);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn acquire_then_release_on_drop() {
        let store = RideLockStore::new(Duration::from_secs(5));
        let ride_id = Uuid::new_v4();

        let guard = store.acquire(ride_id).expect("first acquire succeeds");
        assert!(store.acquire(ride_id).is_none(), "held lock blocks");
        drop(guard);
        assert!(store.acquire(ride_id).is_some(), "released lock reacquires");
    }

    #[test]
    fn independent_rides_do_not_contend() {
        let store = RideLockStore::new(Duration::from_secs(5));
        let _a = store.acquire(Uuid::new_v4()).unwrap();
        let _b = store.acquire(Uuid::new_v4()).unwrap();
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn expired_lock_can_be_stolen() {
        let store = RideLockStore::new(Duration::from_millis(20));
        let ride_id = Uuid::new_v4();

        let stale = store.acquire(ride_id).unwrap();
        std::thread::sleep(Duration::from_millis(40));

        let fresh = store.acquire(ride_id).expect("stale lock is stealable");
        // the stale guard must not release the stolen lock
        drop(stale);
        assert_eq!(store.len(), 1);
        drop(fresh);
        assert!(store.is_empty());
    }

    #[test]
    fn concurrent_acquire_admits_one_holder() {
        let store = RideLockStore::new(Duration::from_secs(5));
        let ride_id = Uuid::new_v4();

        let mut handles = Vec::new();
        for _ in 0..8 {
            let store = store.clone();
            handles.push(std::thread::spawn(move || {
                store.acquire(ride_id).is_some()
            }));
        }
        let acquired: usize = handles
            .into_iter()
            .map(|h| h.join().unwrap() as usize)
            .sum();
        // guards are dropped as each thread finishes, so later threads may
        // reacquire; but at least one and at most all can have succeeded,
        // and the map ends empty (every guard released)
        assert!(acquired >= 1);
        assert!(store.is_empty());
    }

    #[test]
    fn purge_reclaims_abandoned_locks() {
        let store = RideLockStore::new(Duration::from_millis(10));
        let guard = store.acquire(Uuid::new_v4()).unwrap();
        std::mem::forget(guard);
        std::thread::sleep(Duration::from_millis(30));
        assert_eq!(store.purge_expired(), 1);
        assert!(store.is_empty());
    }
}
