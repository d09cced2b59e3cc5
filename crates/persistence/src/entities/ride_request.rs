//! Ride request entity (database row mapping).

use chrono::{DateTime, Utc};
use domain::models::{Coordinates, PaymentMethod, RideRequest, RideStatus, VehicleTier};
use sqlx::FromRow;
use uuid::Uuid;

/// Database row mapping for the ride_requests table.
#[derive(Debug, Clone, FromRow)]
pub struct RideRequestEntity {
    pub id: Uuid,
    pub rider_id: String,
    pub pickup_lat: f64,
    pub pickup_lng: f64,
    pub destination_lat: f64,
    pub destination_lng: f64,
    pub tier: String,
    pub payment_method: String,
    pub status: String,
    pub surge_multiplier: f64,
    pub estimated_fare: f64,
    pub match_attempts: i32,
    pub current_offer_id: Option<Uuid>,
    pub driver_id: Option<String>,
    pub idempotency_key: String,
    pub region: String,
    pub pickup_cell: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<RideRequestEntity> for RideRequest {
    type Error = String;

    fn try_from(entity: RideRequestEntity) -> Result<Self, Self::Error> {
        Ok(RideRequest {
            id: entity.id,
            rider_id: entity.rider_id,
            pickup: Coordinates {
                latitude: entity.pickup_lat,
                longitude: entity.pickup_lng,
            },
            destination: Coordinates {
                latitude: entity.destination_lat,
                longitude: entity.destination_lng,
            },
            tier: entity.tier.parse::<VehicleTier>()?,
            payment_method: entity.payment_method.parse::<PaymentMethod>()?,
            status: entity.status.parse::<RideStatus>()?,
            surge_multiplier: entity.surge_multiplier,
            estimated_fare: entity.estimated_fare,
            match_attempts: entity.match_attempts,
            current_offer_id: entity.current_offer_id,
            driver_id: entity.driver_id,
            region: entity.region,
            created_at: entity.created_at,
            expires_at: entity.expires_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_entity() -> RideRequestEntity {
        RideRequestEntity {
            id: Uuid::new_v4(),
            rider_id: "rider-1".to_string(),
            pickup_lat: 12.9716,
            pickup_lng: 77.5946,
            destination_lat: 12.98,
            destination_lng: 77.61,
            tier: "ECONOMY".to_string(),
            payment_method: "CARD".to_string(),
            status: "MATCHING".to_string(),
            surge_multiplier: 1.2,
            estimated_fare: 184.5,
            match_attempts: 0,
            current_offer_id: None,
            driver_id: None,
            idempotency_key: "k1".to_string(),
            region: "bangalore".to_string(),
            pickup_cell: "2594x15518".to_string(),
            created_at: Utc::now(),
            expires_at: Utc::now() + chrono::Duration::minutes(5),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_entity_converts_to_domain() {
        let ride = RideRequest::try_from(create_test_entity()).unwrap();
        assert_eq!(ride.status, RideStatus::Matching);
        assert_eq!(ride.tier, VehicleTier::Economy);
        assert_eq!(ride.pickup.latitude, 12.9716);
    }

    #[test]
    fn test_entity_rejects_unknown_status() {
        let mut entity = create_test_entity();
        entity.status = "TELEPORTED".to_string();
        assert!(RideRequest::try_from(entity).is_err());
    }
}
