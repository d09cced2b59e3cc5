//! Driver offer repository for database operations.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::entities::DriverOfferEntity;
use crate::metrics::QueryTimer;

/// Repository for driver offer database operations.
#[derive(Clone)]
pub struct DriverOfferRepository {
    pool: PgPool,
}

impl DriverOfferRepository {
    /// Creates a new DriverOfferRepository with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert a new PENDING offer for a ride.
    pub async fn insert(
        &self,
        ride_request_id: Uuid,
        driver_id: &str,
        distance_km: f64,
        expires_at: DateTime<Utc>,
    ) -> Result<DriverOfferEntity, sqlx::Error> {
        let timer = QueryTimer::new("insert_driver_offer");
        let result = sqlx::query_as::<_, DriverOfferEntity>(
            r#"
            INSERT INTO driver_offers (ride_request_id, driver_id, status, distance_km, expires_at)
            VALUES ($1, $2, 'PENDING', $3, $4)
            RETURNING id, ride_request_id, driver_id, status, distance_km, expires_at,
                      responded_at, decline_reason, created_at
            "#,
        )
        .bind(ride_request_id)
        .bind(driver_id)
        .bind(distance_km)
        .bind(expires_at)
        .fetch_one(&self.pool)
        .await;
        timer.record();
        result
    }

    /// Find an offer by id.
    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<DriverOfferEntity>, sqlx::Error> {
        sqlx::query_as::<_, DriverOfferEntity>(
            r#"
            SELECT id, ride_request_id, driver_id, status, distance_km, expires_at,
                   responded_at, decline_reason, created_at
            FROM driver_offers
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
    }

    /// Resolve a PENDING offer to ACCEPTED, DECLINED, or EXPIRED. The status
    /// check in the WHERE clause keeps offer transitions monotonic under
    /// concurrent resolvers.
    /// Returns the number of rows updated (0 means the offer was already
    /// resolved).
    pub async fn resolve(
        &self,
        offer_id: Uuid,
        status: &str,
        decline_reason: Option<&str>,
    ) -> Result<u64, sqlx::Error> {
        let timer = QueryTimer::new("resolve_driver_offer");
        let result = sqlx::query(
            r#"
            UPDATE driver_offers
            SET status = $2, responded_at = NOW(), decline_reason = $3
            WHERE id = $1 AND status = 'PENDING'
            "#,
        )
        .bind(offer_id)
        .bind(status)
        .bind(decline_reason)
        .execute(&self.pool)
        .await;
        timer.record();
        result.map(|r| r.rows_affected())
    }

    /// Driver ids that already declined or expired an offer for this ride;
    /// the matcher excludes them from later attempts.
    pub async fn unavailable_driver_ids(
        &self,
        ride_request_id: Uuid,
    ) -> Result<Vec<String>, sqlx::Error> {
        let rows: Vec<(String,)> = sqlx::query_as(
            r#"
            SELECT DISTINCT driver_id
            FROM driver_offers
            WHERE ride_request_id = $1 AND status IN ('DECLINED', 'EXPIRED')
            "#,
        )
        .bind(ride_request_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(|(id,)| id).collect())
    }
}
