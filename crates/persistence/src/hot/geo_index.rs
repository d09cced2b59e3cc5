//! Region-scoped driver geo index with presence gating.
//!
//! Drivers are bucketed by grid cell so a radius query only touches the
//! cells covering the search disk, never the whole region population. The
//! presence marker (refreshed by every heartbeat) is authoritative: a
//! bucket may still hold a driver whose presence expired, and readers must
//! skip it until the cleanup sweep removes the record.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::collections::HashSet;
use std::time::{Duration, Instant};

use domain::models::{DriverStatus, NearbyDriver, VehicleTier};
use shared::geo::{haversine_km, Cell};

/// Live state for one driver: last reported position plus metadata.
#[derive(Debug, Clone)]
pub struct DriverPresence {
    pub driver_id: String,
    pub region: String,
    pub latitude: f64,
    pub longitude: f64,
    pub status: DriverStatus,
    pub vehicle_type: VehicleTier,
    pub heading: Option<f64>,
    pub speed: Option<f64>,
    pub last_update: DateTime<Utc>,
    pub cell: Cell,
    presence_expires_at: Instant,
}

impl DriverPresence {
    /// Whether the presence marker is still live.
    pub fn is_live(&self) -> bool {
        Instant::now() < self.presence_expires_at
    }
}

/// Heartbeat fields carried into the index.
#[derive(Debug, Clone)]
pub struct LocationSample {
    pub latitude: f64,
    pub longitude: f64,
    pub heading: Option<f64>,
    pub speed: Option<f64>,
    pub recorded_at: DateTime<Utc>,
}

/// In-process geospatial index over all regions.
pub struct GeoIndex {
    drivers: DashMap<String, DriverPresence>,
    buckets: DashMap<(String, Cell), HashSet<String>>,
    presence_ttl: Duration,
}

impl GeoIndex {
    pub fn new(presence_ttl: Duration) -> Self {
        Self {
            drivers: DashMap::new(),
            buckets: DashMap::new(),
            presence_ttl,
        }
    }

    /// Refresh an existing driver's position and presence marker. Status and
    /// vehicle type are untouched. Returns the new cell, or `None` if the
    /// driver has no record yet (caller registers it with profile data).
    pub fn refresh(
        &self,
        driver_id: &str,
        region: &str,
        sample: &LocationSample,
    ) -> Option<Cell> {
        let new_cell = Cell::containing(sample.latitude, sample.longitude);
        let mut entry = self.drivers.get_mut(driver_id)?;

        let old_region = entry.region.clone();
        let old_cell = entry.cell;

        entry.latitude = sample.latitude;
        entry.longitude = sample.longitude;
        entry.heading = sample.heading;
        entry.speed = sample.speed;
        entry.last_update = sample.recorded_at;
        entry.region = region.to_string();
        entry.cell = new_cell;
        entry.presence_expires_at = Instant::now() + self.presence_ttl;
        drop(entry);

        if old_region != region || old_cell != new_cell {
            self.remove_from_bucket(&old_region, old_cell, driver_id);
            self.add_to_bucket(region, new_cell, driver_id);
        }
        Some(new_cell)
    }

    /// Register a driver seen for the first time (or after presence
    /// teardown), seeding metadata from the profile.
    pub fn register(
        &self,
        driver_id: &str,
        region: &str,
        vehicle_type: VehicleTier,
        status: DriverStatus,
        sample: &LocationSample,
    ) -> Cell {
        let cell = Cell::containing(sample.latitude, sample.longitude);
        let previous = self.drivers.insert(
            driver_id.to_string(),
            DriverPresence {
                driver_id: driver_id.to_string(),
                region: region.to_string(),
                latitude: sample.latitude,
                longitude: sample.longitude,
                status,
                vehicle_type,
                heading: sample.heading,
                speed: sample.speed,
                last_update: sample.recorded_at,
                cell,
                presence_expires_at: Instant::now() + self.presence_ttl,
            },
        );
        if let Some(prev) = previous {
            if prev.region != region || prev.cell != cell {
                self.remove_from_bucket(&prev.region, prev.cell, driver_id);
            }
        }
        self.add_to_bucket(region, cell, driver_id);
        cell
    }

    /// Update a driver's availability status in the index. Metadata-only;
    /// position and presence marker are untouched. Returns the previous
    /// status, or `None` if the driver has no record.
    pub fn set_status(&self, driver_id: &str, status: DriverStatus) -> Option<DriverStatus> {
        let mut entry = self.drivers.get_mut(driver_id)?;
        let previous = entry.status;
        entry.status = status;
        Some(previous)
    }

    /// Current position and metadata for a driver, gated on the presence
    /// marker and the region scope.
    pub fn get(&self, driver_id: &str, region: &str) -> Option<DriverPresence> {
        let entry = self.drivers.get(driver_id)?;
        if entry.region != region || !entry.is_live() {
            return None;
        }
        Some(entry.clone())
    }

    /// Current position and metadata regardless of region, presence-gated.
    pub fn get_any_region(&self, driver_id: &str) -> Option<DriverPresence> {
        let entry = self.drivers.get(driver_id)?;
        if !entry.is_live() {
            return None;
        }
        Some(entry.clone())
    }

    /// Nearest-neighbour search: drivers in `region` within `radius_km` of
    /// the origin, `ONLINE` with a live presence marker, optionally filtered
    /// to a vehicle tier, ascending by distance, truncated to `limit`.
    ///
    /// Runs over the cell disk covering the radius, so cost tracks the local
    /// candidate count rather than the region population.
    pub fn find_nearby(
        &self,
        region: &str,
        latitude: f64,
        longitude: f64,
        radius_km: f64,
        tier: Option<VehicleTier>,
        limit: usize,
    ) -> Vec<NearbyDriver> {
        let origin = Cell::containing(latitude, longitude);
        let mut matches: Vec<NearbyDriver> = Vec::new();

        for cell in origin.disk(radius_km) {
            let ids: Vec<String> = match self.buckets.get(&(region.to_string(), cell)) {
                Some(bucket) => bucket.iter().cloned().collect(),
                None => continue,
            };

            for id in ids {
                let entry = match self.drivers.get(&id) {
                    Some(e) => e,
                    None => continue,
                };
                if entry.region != region
                    || !entry.is_live()
                    || !entry.status.is_dispatchable()
                {
                    continue;
                }
                if let Some(wanted) = tier {
                    if entry.vehicle_type != wanted {
                        continue;
                    }
                }
                let distance_km =
                    haversine_km(latitude, longitude, entry.latitude, entry.longitude);
                if distance_km > radius_km {
                    continue;
                }
                matches.push(NearbyDriver {
                    driver_id: entry.driver_id.clone(),
                    distance_km,
                    latitude: entry.latitude,
                    longitude: entry.longitude,
                    vehicle_type: entry.vehicle_type,
                    status: entry.status,
                    heading: entry.heading,
                    speed: entry.speed,
                });
            }
        }

        matches.sort_by(|a, b| a.distance_km.total_cmp(&b.distance_km));
        matches.truncate(limit);
        matches
    }

    /// Count of dispatchable drivers within the radius (surge supply).
    pub fn count_nearby(
        &self,
        region: &str,
        latitude: f64,
        longitude: f64,
        radius_km: f64,
    ) -> u32 {
        self.find_nearby(region, latitude, longitude, radius_km, None, usize::MAX)
            .len() as u32
    }

    /// Tear down records whose presence marker expired. Returns the number
    /// of removed drivers.
    pub fn purge_expired(&self) -> usize {
        let dead: Vec<(String, String, Cell)> = self
            .drivers
            .iter()
            .filter(|e| !e.is_live())
            .map(|e| (e.driver_id.clone(), e.region.clone(), e.cell))
            .collect();

        let mut removed = 0;
        for (driver_id, region, cell) in dead {
            // Re-check under the entry lock so a heartbeat racing the sweep
            // keeps its freshly refreshed record.
            let was_removed = self
                .drivers
                .remove_if(&driver_id, |_, e| !e.is_live())
                .is_some();
            if was_removed {
                self.remove_from_bucket(&region, cell, &driver_id);
                removed += 1;
            }
        }
        removed
    }

    /// Number of driver records currently held (live or awaiting sweep).
    pub fn len(&self) -> usize {
        self.drivers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.drivers.is_empty()
    }

    fn add_to_bucket(&self, region: &str, cell: Cell, driver_id: &str) {
        self.buckets
            .entry((region.to_string(), cell))
            .or_default()
            .insert(driver_id.to_string());
    }

    fn remove_from_bucket(&self, region: &str, cell: Cell, driver_id: &str) {
        if let Some(mut bucket) = self.buckets.get_mut(&(region.to_string(), cell)) {
            bucket.remove(driver_id);
            if bucket.is_empty() {
                drop(bucket);
                self.buckets
                    .remove_if(&(region.to_string(), cell), |_, b| b.is_empty());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(lat: f64, lng: f64) -> LocationSample {
        LocationSample {
            latitude: lat,
            longitude: lng,
            heading: Some(90.0),
            speed: Some(8.0),
            recorded_at: Utc::now(),
        }
    }

    fn online_driver(index: &GeoIndex, id: &str, lat: f64, lng: f64) {
        index.register(
            id,
            "bangalore",
            VehicleTier::Economy,
            DriverStatus::Online,
            &sample(lat, lng),
        );
    }

    #[test]
    fn register_then_find_nearby() {
        let index = GeoIndex::new(Duration::from_secs(30));
        online_driver(&index, "drv-1", 12.9716, 77.5946);

        let found = index.find_nearby("bangalore", 12.9716, 77.5946, 5.0, None, 10);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].driver_id, "drv-1");
        assert!(found[0].distance_km < 0.01);
    }

    #[test]
    fn find_nearby_sorts_ascending_by_distance() {
        let index = GeoIndex::new(Duration::from_secs(30));
        online_driver(&index, "far", 12.9900, 77.6100);
        online_driver(&index, "near", 12.9717, 77.5947);
        online_driver(&index, "mid", 12.9800, 77.6000);

        let found = index.find_nearby("bangalore", 12.9716, 77.5946, 10.0, None, 10);
        let ids: Vec<&str> = found.iter().map(|d| d.driver_id.as_str()).collect();
        assert_eq!(ids, vec!["near", "mid", "far"]);
    }

    #[test]
    fn find_nearby_respects_radius() {
        let index = GeoIndex::new(Duration::from_secs(30));
        online_driver(&index, "close", 12.9717, 77.5947);
        // ~4.5 km north
        online_driver(&index, "away", 13.0120, 77.5946);

        let found = index.find_nearby("bangalore", 12.9716, 77.5946, 2.0, None, 10);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].driver_id, "close");
    }

    #[test]
    fn tiny_radius_returns_only_colocated() {
        let index = GeoIndex::new(Duration::from_secs(30));
        online_driver(&index, "here", 12.9716, 77.5946);
        // ~300 m away
        online_driver(&index, "street-over", 12.9743, 77.5946);

        let found = index.find_nearby("bangalore", 12.9716, 77.5946, 0.1, None, 10);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].driver_id, "here");
    }

    #[test]
    fn find_nearby_filters_tier() {
        let index = GeoIndex::new(Duration::from_secs(30));
        online_driver(&index, "economy", 12.9716, 77.5946);
        index.register(
            "premium",
            "bangalore",
            VehicleTier::Premium,
            DriverStatus::Online,
            &sample(12.9716, 77.5946),
        );

        let found = index.find_nearby(
            "bangalore",
            12.9716,
            77.5946,
            5.0,
            Some(VehicleTier::Premium),
            10,
        );
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].driver_id, "premium");
    }

    #[test]
    fn find_nearby_excludes_off_trip_and_offline() {
        let index = GeoIndex::new(Duration::from_secs(30));
        online_driver(&index, "busy", 12.9716, 77.5946);
        online_driver(&index, "gone", 12.9716, 77.5946);
        online_driver(&index, "free", 12.9716, 77.5946);
        index.set_status("busy", DriverStatus::OnTrip);
        index.set_status("gone", DriverStatus::Offline);

        let found = index.find_nearby("bangalore", 12.9716, 77.5946, 5.0, None, 10);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].driver_id, "free");
    }

    #[test]
    fn find_nearby_scoped_to_region() {
        let index = GeoIndex::new(Duration::from_secs(30));
        online_driver(&index, "blr", 12.9716, 77.5946);
        index.register(
            "bom",
            "mumbai",
            VehicleTier::Economy,
            DriverStatus::Online,
            &sample(19.0760, 72.8777),
        );

        let found = index.find_nearby("mumbai", 19.0760, 72.8777, 5.0, None, 10);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].driver_id, "bom");
    }

    #[test]
    fn presence_expiry_gates_reads_before_sweep() {
        let index = GeoIndex::new(Duration::from_millis(20));
        online_driver(&index, "drv-1", 12.9716, 77.5946);
        std::thread::sleep(Duration::from_millis(40));

        // record still in the index, but the presence gate hides it
        assert_eq!(index.len(), 1);
        assert!(index
            .find_nearby("bangalore", 12.9716, 77.5946, 5.0, None, 10)
            .is_empty());
        assert!(index.get("drv-1", "bangalore").is_none());
    }

    #[test]
    fn heartbeat_revives_presence() {
        let index = GeoIndex::new(Duration::from_millis(30));
        online_driver(&index, "drv-1", 12.9716, 77.5946);
        std::thread::sleep(Duration::from_millis(50));
        assert!(index
            .find_nearby("bangalore", 12.9716, 77.5946, 5.0, None, 10)
            .is_empty());

        index
            .refresh("drv-1", "bangalore", &sample(12.9716, 77.5946))
            .unwrap();
        assert_eq!(
            index
                .find_nearby("bangalore", 12.9716, 77.5946, 5.0, None, 10)
                .len(),
            1
        );
    }

    #[test]
    fn purge_removes_expired_records() {
        let index = GeoIndex::new(Duration::from_millis(20));
        online_driver(&index, "drv-1", 12.9716, 77.5946);
        online_driver(&index, "drv-2", 12.9720, 77.5950);
        std::thread::sleep(Duration::from_millis(40));

        assert_eq!(index.purge_expired(), 2);
        assert!(index.is_empty());
    }

    #[test]
    fn refresh_moves_driver_between_cells() {
        let index = GeoIndex::new(Duration::from_secs(30));
        online_driver(&index, "drv-1", 12.9716, 77.5946);
        // hop ~2 km east
        index
            .refresh("drv-1", "bangalore", &sample(12.9716, 77.6130))
            .unwrap();

        let found = index.find_nearby("bangalore", 12.9716, 77.6130, 0.5, None, 10);
        assert_eq!(found.len(), 1);
        let stale = index.find_nearby("bangalore", 12.9716, 77.5946, 0.5, None, 10);
        assert!(stale.is_empty());
    }

    #[test]
    fn refresh_unknown_driver_returns_none() {
        let index = GeoIndex::new(Duration::from_secs(30));
        assert!(index
            .refresh("ghost", "bangalore", &sample(12.9716, 77.5946))
            .is_none());
    }

    #[test]
    fn set_status_returns_previous() {
        let index = GeoIndex::new(Duration::from_secs(30));
        online_driver(&index, "drv-1", 12.9716, 77.5946);
        assert_eq!(
            index.set_status("drv-1", DriverStatus::OnTrip),
            Some(DriverStatus::Online)
        );
        assert_eq!(index.set_status("ghost", DriverStatus::Online), None);
    }

    #[test]
    fn count_nearby_counts_supply() {
        let index = GeoIndex::new(Duration::from_secs(30));
        for i in 0..4 {
            online_driver(&index, &format!("drv-{i}"), 12.9716 + i as f64 * 0.001, 77.5946);
        }
        assert_eq!(index.count_nearby("bangalore", 12.9716, 77.5946, 2.0), 4);
    }

    #[test]
    fn limit_truncates_results() {
        let index = GeoIndex::new(Duration::from_secs(30));
        for i in 0..8 {
            online_driver(&index, &format!("drv-{i}"), 12.9716 + i as f64 * 0.0005, 77.5946);
        }
        let found = index.find_nearby("bangalore", 12.9716, 77.5946, 5.0, None, 3);
        assert_eq!(found.len(), 3);
        assert_eq!(found[0].driver_id, "drv-0");
    }
}
