//! Periodic reclamation of expired hot-store entries.
//!
//! Readers already gate on per-entry TTLs; this sweep just returns the
//! memory and keeps the store-size gauges honest.

use std::sync::Arc;
use tracing::debug;

use persistence::hot::{
    DemandCounterStore, GeoIndex, IdempotencyStore, OfferEntryStore, RideLockStore,
    SurgeCacheStore,
};
use persistence::metrics::record_hot_store_size;

use crate::jobs::scheduler::{Job, JobFrequency};

pub struct HotStoreCleanupJob {
    geo_index: Arc<GeoIndex>,
    offers: Arc<OfferEntryStore>,
    locks: Arc<RideLockStore>,
    demand: Arc<DemandCounterStore>,
    surge_cache: Arc<SurgeCacheStore>,
    idempotency: Arc<IdempotencyStore>,
}

impl HotStoreCleanupJob {
    pub fn new(
        geo_index: Arc<GeoIndex>,
        offers: Arc<OfferEntryStore>,
        locks: Arc<RideLockStore>,
        demand: Arc<DemandCounterStore>,
        surge_cache: Arc<SurgeCacheStore>,
        idempotency: Arc<IdempotencyStore>,
    ) -> Self {
        Self {
            geo_index,
            offers,
            locks,
            demand,
            surge_cache,
            idempotency,
        }
    }
}

#[async_trait::async_trait]
impl Job for HotStoreCleanupJob {
    fn name(&self) -> &'static str {
        "hot_store_cleanup"
    }

    fn frequency(&self) -> JobFrequency {
        JobFrequency::Minutes(1)
    }

    async fn execute(&self) -> Result<(), String> {
        let drivers = self.geo_index.purge_expired();
        let offers = self.offers.purge_expired();
        let locks = self.locks.purge_expired();
        let demand = self.demand.purge_expired();
        let surge = self.surge_cache.purge_expired();
        let idempotency = self.idempotency.purge_expired();

        record_hot_store_size("geo_index", self.geo_index.len());
        record_hot_store_size("offer_entries", self.offers.len());
        record_hot_store_size("ride_locks", self.locks.len());
        record_hot_store_size("demand_counters", self.demand.len());
        record_hot_store_size("surge_cache", self.surge_cache.len());
        record_hot_store_size("idempotency", self.idempotency.len());

        debug!(
            drivers,
            offers, locks, demand, surge, idempotency, "Hot store sweep complete"
        );
        Ok(())
    }
}
