//! Driver presence and proximity service.
//!
//! Wraps the hot geo index with region inference, profile seeding for
//! first-seen drivers, and event emission. The heartbeat path never blocks
//! on the relational store except for the first sighting of a driver,
//! when the profile seeds vehicle tier and status.

use chrono::{TimeZone, Utc};
use sqlx::PgPool;
use std::sync::Arc;

use domain::models::{
    Driver, DriverLocationUpdate, DriverStatus, NearbyDriver, NearbyQuery, VehicleTier,
};
use domain::services::{Event, EventPublisher, EventType};
use persistence::hot::geo_index::LocationSample;
use persistence::hot::{DriverPresence, GeoIndex};
use persistence::repositories::DriverRepository;
use shared::geo::{infer_region, Cell};

use crate::error::ApiError;
use crate::middleware::metrics::record_heartbeat;

/// Result of a heartbeat ingest.
#[derive(Debug, Clone)]
pub struct LocationIngest {
    pub region: String,
    pub cell: Cell,
}

pub struct ProximityService {
    pool: PgPool,
    index: Arc<GeoIndex>,
    events: Arc<dyn EventPublisher>,
    default_region: String,
}

impl ProximityService {
    pub fn new(
        pool: PgPool,
        index: Arc<GeoIndex>,
        events: Arc<dyn EventPublisher>,
        default_region: String,
    ) -> Self {
        Self {
            pool,
            index,
            events,
            default_region,
        }
    }

    /// Region for a coordinate, falling back to the configured default.
    pub fn resolve_region(&self, latitude: f64, longitude: f64) -> String {
        infer_region(latitude, longitude)
            .map(str::to_string)
            .unwrap_or_else(|| self.default_region.clone())
    }

    /// Ingest a heartbeat: write the geo entry, refresh the presence
    /// marker, upsert metadata, and publish `driver.location.updated`.
    /// Never changes driver status.
    pub async fn update_location(
        &self,
        driver_id: &str,
        update: &DriverLocationUpdate,
    ) -> Result<LocationIngest, ApiError> {
        let region = self.resolve_region(update.latitude, update.longitude);
        let recorded_at = match update.timestamp {
            Some(millis) => Utc
                .timestamp_millis_opt(millis)
                .single()
                .ok_or_else(|| ApiError::Validation("Invalid timestamp".to_string()))?,
            None => Utc::now(),
        };
        let sample = LocationSample {
            latitude: update.latitude,
            longitude: update.longitude,
            heading: update.heading,
            speed: update.speed,
            recorded_at,
        };

        let cell = match self.index.refresh(driver_id, &region, &sample) {
            Some(cell) => cell,
            None => {
                // first sighting since startup or presence teardown: seed
                // metadata from the profile when one exists
                let (vehicle_type, status) = match DriverRepository::new(self.pool.clone())
                    .find_by_id(driver_id)
                    .await?
                    .map(Driver::try_from)
                    .transpose()
                    .map_err(ApiError::Internal)?
                {
                    Some(profile) => (profile.vehicle_type, profile.status),
                    None => (VehicleTier::Economy, DriverStatus::Online),
                };
                self.index
                    .register(driver_id, &region, vehicle_type, status, &sample)
            }
        };

        record_heartbeat();
        self.events
            .publish(Event::new(
                EventType::DriverLocationUpdated,
                driver_id,
                serde_json::json!({
                    "driverId": driver_id,
                    "latitude": update.latitude,
                    "longitude": update.longitude,
                    "region": region,
                    "cell": cell,
                }),
            ))
            .await;

        Ok(LocationIngest { region, cell })
    }

    /// Change a driver's availability status in the profile row and, when a
    /// presence record exists, the hot index. Publishes
    /// `driver.status.changed` with previous and new values.
    pub async fn set_status(
        &self,
        driver_id: &str,
        status: DriverStatus,
    ) -> Result<DriverStatus, ApiError> {
        let repo = DriverRepository::new(self.pool.clone());
        let profile = repo
            .find_by_id(driver_id)
            .await?
            .ok_or_else(|| ApiError::NotFound(format!("Driver {} not found", driver_id)))?;
        let previous = profile
            .status
            .parse::<DriverStatus>()
            .map_err(ApiError::Internal)?;

        repo.set_status(driver_id, status.as_str()).await?;
        self.index.set_status(driver_id, status);

        self.events
            .publish(Event::new(
                EventType::DriverStatusChanged,
                driver_id,
                serde_json::json!({
                    "driverId": driver_id,
                    "previousStatus": previous,
                    "newStatus": status,
                }),
            ))
            .await;

        Ok(status)
    }

    /// Nearest-neighbour query over the hot index.
    pub fn find_nearby(&self, query: &NearbyQuery) -> Vec<NearbyDriver> {
        self.index.find_nearby(
            &query.region,
            query.latitude,
            query.longitude,
            query.radius_km,
            query.vehicle_type,
            query.limit as usize,
        )
    }

    /// Current position and metadata for a driver, if present and live.
    pub fn get_location(&self, driver_id: &str, region: &str) -> Option<DriverPresence> {
        self.index.get(driver_id, region)
    }

    /// Live position for a driver without a region scope (profile lookups).
    pub fn locate(&self, driver_id: &str) -> Option<DriverPresence> {
        self.index.get_any_region(driver_id)
    }
}
