//! Hot key-value state, ephemeral by design.
//!
//! Everything here lives in process memory and is rebuilt organically from
//! traffic after a restart: driver heartbeats repopulate the geo index,
//! demand counters restart their windows, caches refill on first read.
//! Readers always gate on the per-entry TTL; a background sweep reclaims
//! expired entries.

pub mod demand;
pub mod geo_index;
pub mod idempotency;
pub mod locks;
pub mod offers;
pub mod surge_cache;

pub use demand::DemandCounterStore;
pub use geo_index::{DriverPresence, GeoIndex};
pub use idempotency::{IdempotencyOutcome, IdempotencyStore, IdempotencyTicket};
pub use locks::{RideLockGuard, RideLockStore};
pub use offers::{OfferEntry, OfferEntryStore};
pub use surge_cache::{SurgeCacheEntry, SurgeCacheStore};
