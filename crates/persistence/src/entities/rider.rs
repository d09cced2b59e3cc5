//! Rider entity (database row mapping).

use chrono::{DateTime, Utc};
use domain::models::Rider;
use sqlx::FromRow;

/// Database row mapping for the riders table.
#[derive(Debug, Clone, FromRow)]
pub struct RiderEntity {
    pub id: String,
    pub name: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<RiderEntity> for Rider {
    fn from(entity: RiderEntity) -> Self {
        Rider {
            id: entity.id,
            name: entity.name,
            created_at: entity.created_at,
        }
    }
}
