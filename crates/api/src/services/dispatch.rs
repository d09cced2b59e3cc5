//! Dispatch / matching engine.
//!
//! Owns the ride-request state machine: intake, candidate selection, offer
//! creation with deadlines, accept/decline/timeout arbitration under the
//! per-ride lock, and the reassignment loop. Double acceptance is blocked
//! twice: by the lock plus state check, and by the conditional UPDATE on
//! the ride row.

use chrono::{Duration as ChronoDuration, Utc};
use sqlx::PgPool;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

use domain::models::{
    CreateRideRequest, DispatchOutcome, DriverOffer, DriverResponseAction, DriverResponseRequest,
    DriverResponseResult, DriverStatus, MatchedDriver, NearbyDriver, RideDetailsResponse,
    RideRequest, RideRequestResponse, RideStatus, VehicleTier,
};
use domain::services::{Event, EventPublisher, EventType};
use persistence::entities::RideRequestEntity;
use persistence::hot::{GeoIndex, OfferEntryStore, RideLockStore};
use persistence::repositories::{
    DriverOfferRepository, DriverRepository, NewRideRequest, RideRequestRepository,
    RiderRepository,
};
use shared::geo::{haversine_km, infer_region, Cell};

use crate::config::{DispatchConfig, FareConfig};
use crate::error::ApiError;
use crate::middleware::metrics::{
    record_dispatch_latency, record_offer_created, record_offer_resolved, record_ride_requested,
};
use crate::services::SurgeService;

/// Quote-time fare estimate: base + distance + a linear travel-time term
/// (3 minutes per kilometre), scaled by surge, rounded to 2 decimals.
pub(crate) fn estimate_fare(config: &FareConfig, distance_km: f64, surge_multiplier: f64) -> f64 {
    let travel_minutes = distance_km * 3.0;
    let fare = (config.base + config.per_km * distance_km + config.per_minute * travel_minutes)
        * surge_multiplier;
    (fare * 100.0).round() / 100.0
}

/// Pickup ETA estimate in whole minutes.
pub(crate) fn eta_minutes(distance_km: f64) -> u32 {
    (2.0 * distance_km).ceil() as u32
}

/// Nearest candidate not yet burned on this request. `candidates` arrives
/// ascending by distance from the proximity index.
pub(crate) fn pick_nearest(
    candidates: &[NearbyDriver],
    excluded: &HashSet<String>,
) -> Option<NearbyDriver> {
    candidates
        .iter()
        .find(|c| !excluded.contains(&c.driver_id))
        .cloned()
}

enum MatchOutcome {
    Matched {
        driver: MatchedDriver,
        ride: RideRequestEntity,
    },
    Exhausted {
        status: RideStatus,
    },
}

pub struct DispatchService {
    pool: PgPool,
    index: Arc<GeoIndex>,
    locks: Arc<RideLockStore>,
    offers: Arc<OfferEntryStore>,
    surge: Arc<SurgeService>,
    events: Arc<dyn EventPublisher>,
    config: DispatchConfig,
    fare: FareConfig,
    default_region: String,
}

impl DispatchService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        pool: PgPool,
        index: Arc<GeoIndex>,
        locks: Arc<RideLockStore>,
        offers: Arc<OfferEntryStore>,
        surge: Arc<SurgeService>,
        events: Arc<dyn EventPublisher>,
        config: DispatchConfig,
        fare: FareConfig,
        default_region: String,
    ) -> Self {
        Self {
            pool,
            index,
            locks,
            offers,
            surge,
            events,
            config,
            fare,
            default_region,
        }
    }

    /// Ride intake: surge quote, fare estimate, persistence, and the first
    /// synchronous match attempt. Idempotency arbitration happens in the
    /// route layer before this runs.
    pub async fn create_ride_request(
        &self,
        request: &CreateRideRequest,
        idempotency_key_hash: &str,
    ) -> Result<RideRequestResponse, ApiError> {
        let started = Instant::now();

        let region = infer_region(request.pickup.latitude, request.pickup.longitude)
            .map(str::to_string)
            .unwrap_or_else(|| self.default_region.clone());
        let cell = Cell::containing(request.pickup.latitude, request.pickup.longitude);

        self.surge.increment_demand(cell);
        let surge_info = self
            .surge
            .get_surge_for_location(request.pickup.latitude, request.pickup.longitude)
            .await;

        let distance_km = haversine_km(
            request.pickup.latitude,
            request.pickup.longitude,
            request.destination.latitude,
            request.destination.longitude,
        );
        let estimated_fare = estimate_fare(&self.fare, distance_km, surge_info.multiplier);

        RiderRepository::new(self.pool.clone())
            .ensure(&request.rider_id)
            .await?;

        let ride = RideRequestRepository::new(self.pool.clone())
            .insert(NewRideRequest {
                rider_id: request.rider_id.clone(),
                pickup_lat: request.pickup.latitude,
                pickup_lng: request.pickup.longitude,
                destination_lat: request.destination.latitude,
                destination_lng: request.destination.longitude,
                tier: request.tier.as_str().to_string(),
                payment_method: request.payment_method.as_str().to_string(),
                surge_multiplier: surge_info.multiplier,
                estimated_fare,
                idempotency_key: idempotency_key_hash.to_string(),
                region: region.clone(),
                pickup_cell: cell.to_string(),
                expires_at: Utc::now()
                    + ChronoDuration::seconds(self.config.request_expiry_secs as i64),
            })
            .await?;
        record_ride_requested();

        let mut events_ok = self
            .events
            .publish(Event::new(
                EventType::RideRequested,
                ride.id.to_string(),
                serde_json::json!({
                    "rideId": ride.id,
                    "riderId": request.rider_id,
                    "pickup": request.pickup,
                    "destination": request.destination,
                    "tier": request.tier,
                    "region": region,
                    "cell": cell,
                    "surgeMultiplier": surge_info.multiplier,
                    "estimatedFare": estimated_fare,
                }),
            ))
            .await;

        let (outcome, match_events_ok) = self.match_next_driver(&ride).await?;
        events_ok &= match_events_ok;

        let response = match outcome {
            MatchOutcome::Matched { driver, ride } => RideRequestResponse {
                id: ride.id,
                // the creation response reports the pre-offer snapshot; the
                // detail endpoint shows DRIVER_OFFERED once polled
                status: RideStatus::Matching,
                rider_id: request.rider_id.clone(),
                pickup: request.pickup,
                destination: request.destination,
                tier: request.tier,
                surge_multiplier: surge_info.multiplier,
                estimated_fare,
                matched_driver: Some(driver),
                match_attempts: ride.match_attempts,
                events_published: events_ok,
            },
            MatchOutcome::Exhausted { status } => RideRequestResponse {
                id: ride.id,
                status,
                rider_id: request.rider_id.clone(),
                pickup: request.pickup,
                destination: request.destination,
                tier: request.tier,
                surge_multiplier: surge_info.multiplier,
                estimated_fare,
                matched_driver: None,
                match_attempts: ride.match_attempts,
                events_published: events_ok,
            },
        };

        record_dispatch_latency(started.elapsed().as_secs_f64());
        Ok(response)
    }

    /// Select the nearest eligible driver and hand them a deadline-bounded
    /// offer. Candidates who already declined or expired an offer for this
    /// request are excluded.
    async fn match_next_driver(
        &self,
        ride: &RideRequestEntity,
    ) -> Result<(MatchOutcome, bool), ApiError> {
        let tier = ride
            .tier
            .parse::<VehicleTier>()
            .map_err(ApiError::Internal)?;
        let offer_repo = DriverOfferRepository::new(self.pool.clone());

        let excluded: HashSet<String> = offer_repo
            .unavailable_driver_ids(ride.id)
            .await?
            .into_iter()
            .collect();

        let candidates = self.index.find_nearby(
            &ride.region,
            ride.pickup_lat,
            ride.pickup_lng,
            self.config.default_radius_km,
            Some(tier),
            self.config.candidate_limit + excluded.len(),
        );

        let candidate = match pick_nearest(&candidates, &excluded) {
            Some(candidate) => candidate,
            None => {
                let status = if ride.match_attempts == 0 {
                    RideStatus::NoDrivers
                } else {
                    RideStatus::Expired
                };
                RideRequestRepository::new(self.pool.clone())
                    .mark_exhausted(ride.id, status.as_str())
                    .await?;
                self.offers.remove(ride.id);
                let events_ok = self
                    .events
                    .publish(Event::new(
                        EventType::RideExpired,
                        ride.id.to_string(),
                        serde_json::json!({
                            "rideId": ride.id,
                            "status": status,
                            "matchAttempts": ride.match_attempts,
                        }),
                    ))
                    .await;
                return Ok((MatchOutcome::Exhausted { status }, events_ok));
            }
        };

        let offer_expires_at = Utc::now() + ChronoDuration::seconds(self.config.offer_ttl_secs as i64);
        let offer = offer_repo
            .insert(
                ride.id,
                &candidate.driver_id,
                candidate.distance_km,
                offer_expires_at,
            )
            .await?;
        let updated = RideRequestRepository::new(self.pool.clone())
            .record_offer(ride.id, offer.id, &candidate.driver_id)
            .await?;
        self.offers.put(
            ride.id,
            offer.id,
            &candidate.driver_id,
            self.config.offer_ttl(),
        );
        record_offer_created();

        let events_ok = self
            .events
            .publish(Event::new(
                EventType::RideMatched,
                ride.id.to_string(),
                serde_json::json!({
                    "rideId": ride.id,
                    "driverId": candidate.driver_id,
                    "offerId": offer.id,
                    "distanceKm": candidate.distance_km,
                    "offerExpiresAt": offer_expires_at,
                }),
            ))
            .await;

        Ok((
            MatchOutcome::Matched {
                driver: MatchedDriver {
                    driver_id: candidate.driver_id,
                    distance_km: candidate.distance_km,
                    eta_minutes: eta_minutes(candidate.distance_km),
                },
                ride: updated,
            },
            events_ok,
        ))
    }

    /// Arbitrate a driver's accept/decline under the per-ride lock.
    pub async fn handle_driver_response(
        &self,
        ride_id: Uuid,
        request: &DriverResponseRequest,
    ) -> Result<DriverResponseResult, ApiError> {
        let _lock = self.locks.acquire(ride_id).ok_or(ApiError::RideBusy)?;

        let ride_repo = RideRequestRepository::new(self.pool.clone());
        let offer_repo = DriverOfferRepository::new(self.pool.clone());

        let ride = ride_repo
            .find_by_id(ride_id)
            .await?
            .ok_or_else(|| ApiError::NotFound(format!("Ride {} not found", ride_id)))?;
        let status = ride
            .status
            .parse::<RideStatus>()
            .map_err(ApiError::Internal)?;
        if status != RideStatus::DriverOffered {
            return Err(ApiError::OfferInvalid(
                "Ride has no outstanding offer".to_string(),
            ));
        }

        let offer_id = ride.current_offer_id.ok_or_else(|| {
            ApiError::OfferInvalid("Ride has no outstanding offer".to_string())
        })?;
        let offer = offer_repo
            .find_by_id(offer_id)
            .await?
            .ok_or_else(|| ApiError::OfferInvalid("Offer not found".to_string()))?;
        if offer.driver_id != request.driver_id {
            return Err(ApiError::OfferInvalid(
                "Offer belongs to a different driver".to_string(),
            ));
        }
        if offer.status != "PENDING" {
            return Err(ApiError::OfferInvalid("Offer already resolved".to_string()));
        }

        // the fast-lookup entry is the liveness signal; a missing or
        // superseded entry means this response arrived too late
        match self.offers.get(ride_id) {
            Some(entry) if entry.offer_id == offer_id => {}
            _ => return Err(ApiError::OfferExpired),
        }

        match request.action {
            DriverResponseAction::Accept => {
                self.accept_offer(&ride, offer_id, &request.driver_id).await
            }
            DriverResponseAction::Decline => {
                offer_repo
                    .resolve(offer_id, "DECLINED", request.reason.as_deref())
                    .await?;
                record_offer_resolved("declined");
                self.offers.remove(ride_id);
                self.events
                    .publish(Event::new(
                        EventType::RideDeclined,
                        ride_id.to_string(),
                        serde_json::json!({
                            "rideId": ride_id,
                            "driverId": request.driver_id,
                            "offerId": offer_id,
                            "reason": request.reason,
                        }),
                    ))
                    .await;
                self.continue_matching(&ride).await
            }
        }
    }

    async fn accept_offer(
        &self,
        ride: &RideRequestEntity,
        offer_id: Uuid,
        driver_id: &str,
    ) -> Result<DriverResponseResult, ApiError> {
        // conditional update: second barrier against double acceptance
        let rows = RideRequestRepository::new(self.pool.clone())
            .accept(ride.id, offer_id)
            .await?;
        if rows == 0 {
            return Err(ApiError::OfferInvalid(
                "Offer is no longer current".to_string(),
            ));
        }

        DriverOfferRepository::new(self.pool.clone())
            .resolve(offer_id, "ACCEPTED", None)
            .await?;
        DriverRepository::new(self.pool.clone())
            .set_status(driver_id, DriverStatus::OnTrip.as_str())
            .await?;
        self.index.set_status(driver_id, DriverStatus::OnTrip);
        self.offers.remove(ride.id);
        record_offer_resolved("accepted");

        self.events
            .publish(Event::new(
                EventType::RideAccepted,
                ride.id.to_string(),
                serde_json::json!({
                    "rideId": ride.id,
                    "driverId": driver_id,
                    "offerId": offer_id,
                }),
            ))
            .await;

        Ok(DriverResponseResult {
            status: DispatchOutcome::Accepted,
            driver_id: Some(driver_id.to_string()),
            reason: None,
        })
    }

    /// After a decline or timeout: either exhaust the request or run the
    /// next match attempt. `ride` carries the pre-resolution state.
    async fn continue_matching(
        &self,
        ride: &RideRequestEntity,
    ) -> Result<DriverResponseResult, ApiError> {
        let ride_repo = RideRequestRepository::new(self.pool.clone());

        if ride.match_attempts >= self.config.max_attempts {
            ride_repo
                .mark_exhausted(ride.id, RideStatus::Expired.as_str())
                .await?;
            self.events
                .publish(Event::new(
                    EventType::RideExpired,
                    ride.id.to_string(),
                    serde_json::json!({
                        "rideId": ride.id,
                        "status": RideStatus::Expired,
                        "matchAttempts": ride.match_attempts,
                    }),
                ))
                .await;
            return Ok(DriverResponseResult {
                status: DispatchOutcome::Expired,
                driver_id: None,
                reason: Some("Max match attempts reached".to_string()),
            });
        }

        ride_repo.reset_to_matching(ride.id).await?;
        let reloaded = ride_repo
            .find_by_id(ride.id)
            .await?
            .ok_or_else(|| ApiError::Internal("Ride vanished during reassignment".to_string()))?;

        match self.match_next_driver(&reloaded).await?.0 {
            MatchOutcome::Matched { driver, .. } => Ok(DriverResponseResult {
                status: DispatchOutcome::Reassigned,
                driver_id: Some(driver.driver_id),
                reason: None,
            }),
            MatchOutcome::Exhausted { .. } => Ok(DriverResponseResult {
                status: DispatchOutcome::Expired,
                driver_id: None,
                reason: Some("No available drivers".to_string()),
            }),
        }
    }

    /// Resolve an offer whose response window closed without an answer.
    /// Returns whether a timeout was processed.
    pub async fn check_timeout(&self, ride_id: Uuid) -> Result<bool, ApiError> {
        let _lock = self.locks.acquire(ride_id).ok_or(ApiError::RideBusy)?;

        // a live entry inside its window means nothing to do
        if let Some(entry) = self.offers.get(ride_id) {
            if !entry.deadline_passed() {
                return Ok(false);
            }
        }

        let ride_repo = RideRequestRepository::new(self.pool.clone());
        let offer_repo = DriverOfferRepository::new(self.pool.clone());

        let ride = ride_repo
            .find_by_id(ride_id)
            .await?
            .ok_or_else(|| ApiError::NotFound(format!("Ride {} not found", ride_id)))?;
        if ride.status != RideStatus::DriverOffered.as_str() {
            return Ok(false);
        }
        let offer_id = match ride.current_offer_id {
            Some(offer_id) => offer_id,
            None => return Ok(false),
        };
        let offer = match offer_repo.find_by_id(offer_id).await? {
            Some(offer) => offer,
            None => return Ok(false),
        };
        if offer.status != "PENDING" {
            self.offers.remove(ride_id);
            return Ok(false);
        }

        // implicit decline: the offer deadline passed (or its fast-lookup
        // entry is gone, which is authoritative for expiry)
        offer_repo
            .resolve(offer_id, "EXPIRED", Some("Timeout"))
            .await?;
        record_offer_resolved("expired");
        self.offers.remove(ride_id);
        self.events
            .publish(Event::new(
                EventType::RideDeclined,
                ride_id.to_string(),
                serde_json::json!({
                    "rideId": ride_id,
                    "driverId": offer.driver_id,
                    "offerId": offer_id,
                    "reason": "Timeout",
                }),
            ))
            .await;

        self.continue_matching(&ride).await?;
        Ok(true)
    }

    /// Pure read: the ride request augmented with its current offer.
    pub async fn get_ride_details(&self, ride_id: Uuid) -> Result<RideDetailsResponse, ApiError> {
        let entity = RideRequestRepository::new(self.pool.clone())
            .find_by_id(ride_id)
            .await?
            .ok_or_else(|| ApiError::NotFound(format!("Ride {} not found", ride_id)))?;
        let current_offer_id = entity.current_offer_id;
        let ride = RideRequest::try_from(entity).map_err(ApiError::Internal)?;

        let current_offer = match current_offer_id {
            Some(offer_id) => DriverOfferRepository::new(self.pool.clone())
                .find_by_id(offer_id)
                .await?
                .map(DriverOffer::try_from)
                .transpose()
                .map_err(ApiError::Internal)?,
            None => None,
        };

        Ok(RideDetailsResponse {
            ride,
            current_offer,
        })
    }

    /// Rider-initiated cancellation; a no-op when the ride already reached
    /// a terminal status.
    pub async fn cancel_ride(
        &self,
        ride_id: Uuid,
        reason: Option<String>,
    ) -> Result<RideRequest, ApiError> {
        let ride_repo = RideRequestRepository::new(self.pool.clone());
        ride_repo
            .find_by_id(ride_id)
            .await?
            .ok_or_else(|| ApiError::NotFound(format!("Ride {} not found", ride_id)))?;

        let rows = ride_repo.cancel(ride_id).await?;
        if rows > 0 {
            self.offers.remove(ride_id);
            self.events
                .publish(Event::new(
                    EventType::RideCancelled,
                    ride_id.to_string(),
                    serde_json::json!({
                        "rideId": ride_id,
                        "reason": reason,
                    }),
                ))
                .await;
        }

        let entity = ride_repo
            .find_by_id(ride_id)
            .await?
            .ok_or_else(|| ApiError::NotFound(format!("Ride {} not found", ride_id)))?;
        RideRequest::try_from(entity).map_err(ApiError::Internal)
    }

    /// Rides whose offer deadline passed; driven by the timeout sweep job.
    pub fn rides_past_deadline(&self) -> Vec<Uuid> {
        self.offers.rides_past_deadline()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::models::DriverStatus;

    fn fare_config() -> FareConfig {
        FareConfig {
            base: 50.0,
            per_km: 12.0,
            per_minute: 2.0,
        }
    }

    #[test]
    fn fare_for_zero_distance_is_base_times_surge() {
        assert_eq!(estimate_fare(&fare_config(), 0.0, 1.0), 50.0);
        assert_eq!(estimate_fare(&fare_config(), 0.0, 2.0), 100.0);
    }

    #[test]
    fn fare_includes_distance_and_time_terms() {
        // 10 km: 50 + 120 + 2 * 30 = 230
        assert_eq!(estimate_fare(&fare_config(), 10.0, 1.0), 230.0);
    }

    #[test]
    fn fare_scales_with_surge_and_rounds() {
        // 2.3 km at 1.5x: (50 + 27.6 + 13.8) * 1.5 = 137.1
        assert_eq!(estimate_fare(&fare_config(), 2.3, 1.5), 137.1);
        // rounding to 2 decimals
        let fare = estimate_fare(&fare_config(), 1.234, 1.3);
        assert_eq!((fare * 100.0).round() / 100.0, fare);
    }

    #[test]
    fn eta_rounds_up_to_whole_minutes() {
        assert_eq!(eta_minutes(0.0), 0);
        assert_eq!(eta_minutes(0.4), 1);
        assert_eq!(eta_minutes(1.0), 2);
        assert_eq!(eta_minutes(2.6), 6);
    }

    fn candidate(id: &str, distance_km: f64) -> NearbyDriver {
        NearbyDriver {
            driver_id: id.to_string(),
            distance_km,
            latitude: 12.97,
            longitude: 77.59,
            vehicle_type: VehicleTier::Economy,
            status: DriverStatus::Online,
            heading: None,
            speed: None,
        }
    }

    #[test]
    fn pick_nearest_takes_first_eligible() {
        let candidates = vec![candidate("a", 0.5), candidate("b", 1.0), candidate("c", 2.0)];
        let picked = pick_nearest(&candidates, &HashSet::new()).unwrap();
        assert_eq!(picked.driver_id, "a");
    }

    #[test]
    fn pick_nearest_skips_excluded() {
        let candidates = vec![candidate("a", 0.5), candidate("b", 1.0)];
        let excluded: HashSet<String> = ["a".to_string()].into();
        let picked = pick_nearest(&candidates, &excluded).unwrap();
        assert_eq!(picked.driver_id, "b");
    }

    #[test]
    fn pick_nearest_exhausted_pool_is_none() {
        let candidates = vec![candidate("a", 0.5)];
        let excluded: HashSet<String> = ["a".to_string()].into();
        assert!(pick_nearest(&candidates, &excluded).is_none());
    }

    #[test]
    fn pick_nearest_empty_pool_is_none() {
        assert!(pick_nearest(&[], &HashSet::new()).is_none());
    }
}
