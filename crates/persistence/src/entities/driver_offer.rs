//! Driver offer entity (database row mapping).

use chrono::{DateTime, Utc};
use domain::models::{DriverOffer, OfferStatus};
use sqlx::FromRow;
use uuid::Uuid;

/// Database row mapping for the driver_offers table.
#[derive(Debug, Clone, FromRow)]
pub struct DriverOfferEntity {
    pub id: Uuid,
    pub ride_request_id: Uuid,
    pub driver_id: String,
    pub status: String,
    pub distance_km: f64,
    pub expires_at: DateTime<Utc>,
    pub responded_at: Option<DateTime<Utc>>,
    pub decline_reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<DriverOfferEntity> for DriverOffer {
    type Error = String;

    fn try_from(entity: DriverOfferEntity) -> Result<Self, Self::Error> {
        Ok(DriverOffer {
            id: entity.id,
            ride_request_id: entity.ride_request_id,
            driver_id: entity.driver_id,
            status: entity.status.parse::<OfferStatus>()?,
            distance_km: entity.distance_km,
            expires_at: entity.expires_at,
            responded_at: entity.responded_at,
            decline_reason: entity.decline_reason,
            created_at: entity.created_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_converts_to_domain() {
        let entity = DriverOfferEntity {
            id: Uuid::new_v4(),
            ride_request_id: Uuid::new_v4(),
            driver_id: "drv-1".to_string(),
            status: "PENDING".to_string(),
            distance_km: 0.8,
            expires_at: Utc::now() + chrono::Duration::seconds(15),
            responded_at: None,
            decline_reason: None,
            created_at: Utc::now(),
        };
        let offer = DriverOffer::try_from(entity).unwrap();
        assert_eq!(offer.status, OfferStatus::Pending);
    }
}
