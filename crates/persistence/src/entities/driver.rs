//! Driver entity (database row mapping).

use chrono::{DateTime, Utc};
use domain::models::{Driver, DriverStatus, VehicleTier};
use sqlx::FromRow;

/// Database row mapping for the drivers table.
#[derive(Debug, Clone, FromRow)]
pub struct DriverEntity {
    pub id: String,
    pub name: String,
    pub vehicle_type: String,
    pub rating: f64,
    pub acceptance_rate: f64,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<DriverEntity> for Driver {
    type Error = String;

    fn try_from(entity: DriverEntity) -> Result<Self, Self::Error> {
        Ok(Driver {
            id: entity.id,
            name: entity.name,
            vehicle_type: entity.vehicle_type.parse::<VehicleTier>()?,
            rating: entity.rating,
            acceptance_rate: entity.acceptance_rate,
            status: entity.status.parse::<DriverStatus>()?,
            created_at: entity.created_at,
            updated_at: entity.updated_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_entity() -> DriverEntity {
        DriverEntity {
            id: "drv-1001".to_string(),
            name: "Asha".to_string(),
            vehicle_type: "ECONOMY".to_string(),
            rating: 4.7,
            acceptance_rate: 0.92,
            status: "ONLINE".to_string(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_entity_converts_to_domain() {
        let driver = Driver::try_from(create_test_entity()).unwrap();
        assert_eq!(driver.vehicle_type, VehicleTier::Economy);
        assert_eq!(driver.status, DriverStatus::Online);
    }

    #[test]
    fn test_entity_rejects_unknown_tier() {
        let mut entity = create_test_entity();
        entity.vehicle_type = "HOVERCRAFT".to_string();
        assert!(Driver::try_from(entity).is_err());
    }
}
