//! Surge pricing engine.
//!
//! Supply comes from the proximity index, demand from the windowed
//! counters; the smoothed multiplier is cached per cell with a short TTL.
//! Reads on the matching path treat every failure as neutral surge.

use std::sync::Arc;

use domain::models::{SurgeInfo, SurgeZone};
use domain::services::{Event, EventPublisher, EventType};
use persistence::hot::{DemandCounterStore, GeoIndex, SurgeCacheStore};
use shared::geo::{infer_region, Cell};

use crate::config::SurgeConfig;

/// Compute the smoothed, clamped, one-decimal surge multiplier.
///
/// `raw = demand / supply`, `m = 1 + (raw - 1) * smoothing`, clamped to
/// `[min, max]`. With no supply: neutral when there is no demand, capped
/// otherwise.
pub(crate) fn compute_multiplier(supply: u32, demand: u32, config: &SurgeConfig) -> f64 {
    let unclamped = if supply == 0 {
        if demand == 0 {
            1.0
        } else {
            config.max_multiplier
        }
    } else {
        let raw = demand as f64 / supply as f64;
        1.0 + (raw - 1.0) * config.smoothing
    };
    let clamped = unclamped
        .max(config.min_multiplier)
        .min(config.max_multiplier);
    (clamped * 10.0).round() / 10.0
}

pub struct SurgeService {
    index: Arc<GeoIndex>,
    demand: Arc<DemandCounterStore>,
    cache: Arc<SurgeCacheStore>,
    events: Arc<dyn EventPublisher>,
    config: SurgeConfig,
    default_region: String,
}

impl SurgeService {
    pub fn new(
        index: Arc<GeoIndex>,
        demand: Arc<DemandCounterStore>,
        cache: Arc<SurgeCacheStore>,
        events: Arc<dyn EventPublisher>,
        config: SurgeConfig,
        default_region: String,
    ) -> Self {
        Self {
            index,
            demand,
            cache,
            events,
            config,
            default_region,
        }
    }

    /// Atomically bump the demand counter for a cell.
    pub fn increment_demand(&self, cell: Cell) -> u32 {
        self.demand.increment(cell)
    }

    /// Cached surge for a cell, or the neutral sentinel.
    pub fn get_surge_for_cell(&self, cell: Cell) -> SurgeInfo {
        match self.cache.get(cell) {
            Some(entry) => SurgeInfo {
                cell,
                multiplier: entry.multiplier,
                supply: entry.supply,
                demand: entry.demand,
                updated_at: Some(entry.updated_at),
                valid_until: Some(entry.valid_until),
            },
            None => SurgeInfo::neutral(cell),
        }
    }

    /// Recompute surge for a cell and cache the result. Idempotent under
    /// retries: the cache write replaces the prior value. Publishes
    /// `surge.updated` when the multiplier changed.
    pub async fn calculate_surge(
        &self,
        cell: Cell,
        region: &str,
        latitude: f64,
        longitude: f64,
    ) -> SurgeInfo {
        let supply = self
            .index
            .count_nearby(region, latitude, longitude, self.config.supply_radius_km);
        let demand = self.demand.get(cell);
        let multiplier = compute_multiplier(supply, demand, &self.config);

        let previous = self.cache.get(cell).map(|entry| entry.multiplier);
        let entry = self.cache.put(region, cell, multiplier, supply, demand);

        if previous != Some(multiplier) {
            self.events
                .publish(Event::new(
                    EventType::SurgeUpdated,
                    cell.to_string(),
                    serde_json::json!({
                        "cell": cell,
                        "region": region,
                        "multiplier": multiplier,
                        "supply": supply,
                        "demand": demand,
                    }),
                ))
                .await;
        }

        SurgeInfo {
            cell,
            multiplier,
            supply,
            demand,
            updated_at: Some(entry.updated_at),
            valid_until: Some(entry.valid_until),
        }
    }

    /// Surge at a coordinate: cached value when populated, otherwise a
    /// fresh computation for the inferred region.
    pub async fn get_surge_for_location(&self, latitude: f64, longitude: f64) -> SurgeInfo {
        let cell = Cell::containing(latitude, longitude);
        if let Some(entry) = self.cache.get(cell) {
            return SurgeInfo {
                cell,
                multiplier: entry.multiplier,
                supply: entry.supply,
                demand: entry.demand,
                updated_at: Some(entry.updated_at),
                valid_until: Some(entry.valid_until),
            };
        }
        let region = infer_region(latitude, longitude)
            .map(str::to_string)
            .unwrap_or_else(|| self.default_region.clone());
        self.calculate_surge(cell, &region, latitude, longitude).await
    }

    /// Active surge cells in a region at or above the threshold, descending
    /// by multiplier.
    pub fn get_surge_zones_for_region(&self, region: &str, min_multiplier: f64) -> Vec<SurgeZone> {
        self.cache
            .zones(region, min_multiplier)
            .into_iter()
            .map(|(cell, entry)| SurgeZone {
                cell,
                multiplier: entry.multiplier,
                supply: entry.supply,
                demand: entry.demand,
                updated_at: entry.updated_at,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use domain::models::{DriverStatus, VehicleTier};
    use domain::services::InMemoryEventBus;
    use persistence::hot::geo_index::LocationSample;
    use std::time::Duration;

    fn test_config() -> SurgeConfig {
        SurgeConfig::default()
    }

    fn service_with_bus() -> (SurgeService, Arc<InMemoryEventBus>) {
        let bus = Arc::new(InMemoryEventBus::new());
        let service = SurgeService::new(
            Arc::new(GeoIndex::new(Duration::from_secs(30))),
            Arc::new(DemandCounterStore::new(Duration::from_secs(300))),
            Arc::new(SurgeCacheStore::new(Duration::from_secs(60))),
            bus.clone(),
            test_config(),
            "bangalore".to_string(),
        );
        (service, bus)
    }

    fn seed_drivers(service: &SurgeService, count: usize, lat: f64, lng: f64) {
        for i in 0..count {
            service.index.register(
                &format!("drv-{i}"),
                "bangalore",
                VehicleTier::Economy,
                DriverStatus::Online,
                &LocationSample {
                    latitude: lat,
                    longitude: lng,
                    heading: None,
                    speed: None,
                    recorded_at: Utc::now(),
                },
            );
        }
    }

    #[test]
    fn multiplier_no_supply_no_demand_is_neutral() {
        assert_eq!(compute_multiplier(0, 0, &test_config()), 1.0);
    }

    #[test]
    fn multiplier_no_supply_with_demand_is_capped() {
        assert_eq!(compute_multiplier(0, 1, &test_config()), 3.0);
        assert_eq!(compute_multiplier(0, 100, &test_config()), 3.0);
    }

    #[test]
    fn multiplier_balanced_market_is_neutral() {
        assert_eq!(compute_multiplier(10, 10, &test_config()), 1.0);
    }

    #[test]
    fn multiplier_extreme_demand_clamps_at_max() {
        assert_eq!(compute_multiplier(1, 100, &test_config()), 3.0);
    }

    #[test]
    fn multiplier_applies_smoothing() {
        // raw = 2.0, smoothed = 1 + (2 - 1) * 0.5 = 1.5
        assert_eq!(compute_multiplier(10, 20, &test_config()), 1.5);
        // raw = 3.0, smoothed = 2.0
        assert_eq!(compute_multiplier(10, 30, &test_config()), 2.0);
    }

    #[test]
    fn multiplier_excess_supply_clamps_at_min() {
        // raw = 0.2, smoothed = 0.6, clamped to 1.0
        assert_eq!(compute_multiplier(10, 2, &test_config()), 1.0);
    }

    #[test]
    fn multiplier_rounds_to_one_decimal() {
        // raw = 5/3, smoothed = 1.333.. -> 1.3
        assert_eq!(compute_multiplier(3, 5, &test_config()), 1.3);
    }

    #[tokio::test]
    async fn calculate_surge_counts_supply_and_demand() {
        let (service, _) = service_with_bus();
        seed_drivers(&service, 1, 12.9716, 77.5946);
        let cell = Cell::containing(12.9716, 77.5946);
        for _ in 0..100 {
            service.increment_demand(cell);
        }

        let info = service
            .calculate_surge(cell, "bangalore", 12.9716, 77.5946)
            .await;
        assert_eq!(info.supply, 1);
        assert_eq!(info.demand, 100);
        assert_eq!(info.multiplier, 3.0);
        assert!(info.valid_until.is_some());
    }

    #[tokio::test]
    async fn calculate_surge_caches_result() {
        let (service, _) = service_with_bus();
        let cell = Cell::containing(12.9716, 77.5946);
        service
            .calculate_surge(cell, "bangalore", 12.9716, 77.5946)
            .await;

        let cached = service.get_surge_for_cell(cell);
        assert!(cached.updated_at.is_some(), "entry was cached");
    }

    #[tokio::test]
    async fn uncached_cell_reads_neutral_sentinel() {
        let (service, _) = service_with_bus();
        let info = service.get_surge_for_cell(Cell {
            lat_idx: 1,
            lng_idx: 2,
        });
        assert_eq!(info.multiplier, 1.0);
        assert_eq!(info.supply, 0);
        assert_eq!(info.demand, 0);
        assert!(info.updated_at.is_none());
    }

    #[tokio::test]
    async fn surge_updated_emitted_only_on_change() {
        let (service, bus) = service_with_bus();
        let cell = Cell::containing(12.9716, 77.5946);

        // first computation moves the multiplier from "uncached" to 1.0
        service
            .calculate_surge(cell, "bangalore", 12.9716, 77.5946)
            .await;
        assert_eq!(bus.count(EventType::SurgeUpdated), 1);

        // unchanged recomputation stays quiet
        service
            .calculate_surge(cell, "bangalore", 12.9716, 77.5946)
            .await;
        assert_eq!(bus.count(EventType::SurgeUpdated), 1);

        // demand spike changes the multiplier
        for _ in 0..50 {
            service.increment_demand(cell);
        }
        service
            .calculate_surge(cell, "bangalore", 12.9716, 77.5946)
            .await;
        assert_eq!(bus.count(EventType::SurgeUpdated), 2);
    }

    #[tokio::test]
    async fn get_surge_for_location_computes_once_then_hits_cache() {
        let (service, bus) = service_with_bus();
        let first = service.get_surge_for_location(12.9716, 77.5946).await;
        let second = service.get_surge_for_location(12.9716, 77.5946).await;
        assert_eq!(first.multiplier, second.multiplier);
        // a cache hit does not republish
        assert_eq!(bus.count(EventType::SurgeUpdated), 1);
    }

    #[tokio::test]
    async fn zones_are_ordered_and_filtered() {
        let (service, _) = service_with_bus();
        // three cells with increasing demand, no supply anywhere
        for (i, demand) in [(1, 0u32), (2, 3), (3, 9)] {
            let cell = Cell {
                lat_idx: i,
                lng_idx: 0,
            };
            for _ in 0..demand {
                service.increment_demand(cell);
            }
            service
                .calculate_surge(cell, "bangalore", 12.9716, 77.5946)
                .await;
        }

        let zones = service.get_surge_zones_for_region("bangalore", 1.5);
        assert_eq!(zones.len(), 2, "neutral cell filtered out");
        assert!(zones[0].multiplier >= zones[1].multiplier);
    }
}
