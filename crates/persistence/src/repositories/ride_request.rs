//! Ride request repository for database operations.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::entities::RideRequestEntity;
use crate::metrics::QueryTimer;

/// Input data for persisting a new ride request.
#[derive(Debug, Clone)]
pub struct NewRideRequest {
    pub rider_id: String,
    pub pickup_lat: f64,
    pub pickup_lng: f64,
    pub destination_lat: f64,
    pub destination_lng: f64,
    pub tier: String,
    pub payment_method: String,
    pub surge_multiplier: f64,
    pub estimated_fare: f64,
    pub idempotency_key: String,
    pub region: String,
    pub pickup_cell: String,
    pub expires_at: DateTime<Utc>,
}

/// Repository for ride request database operations.
#[derive(Clone)]
pub struct RideRequestRepository {
    pool: PgPool,
}

impl RideRequestRepository {
    /// Creates a new RideRequestRepository with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert a new ride request in MATCHING status.
    pub async fn insert(&self, input: NewRideRequest) -> Result<RideRequestEntity, sqlx::Error> {
        let timer = QueryTimer::new("insert_ride_request");
        let result = sqlx::query_as::<_, RideRequestEntity>(
            r#"
            INSERT INTO ride_requests (
                rider_id, pickup_lat, pickup_lng, destination_lat, destination_lng,
                tier, payment_method, status, surge_multiplier, estimated_fare,
                match_attempts, idempotency_key, region, pickup_cell, expires_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, 'MATCHING', $8, $9, 0, $10, $11, $12, $13)
            RETURNING id, rider_id, pickup_lat, pickup_lng, destination_lat, destination_lng,
                      tier, payment_method, status, surge_multiplier, estimated_fare,
                      match_attempts, current_offer_id, driver_id, idempotency_key, region,
                      pickup_cell, created_at, expires_at, updated_at
            "#,
        )
        .bind(&input.rider_id)
        .bind(input.pickup_lat)
        .bind(input.pickup_lng)
        .bind(input.destination_lat)
        .bind(input.destination_lng)
        .bind(&input.tier)
        .bind(&input.payment_method)
        .bind(input.surge_multiplier)
        .bind(input.estimated_fare)
        .bind(&input.idempotency_key)
        .bind(&input.region)
        .bind(&input.pickup_cell)
        .bind(input.expires_at)
        .fetch_one(&self.pool)
        .await;
        timer.record();
        result
    }

    /// Find a ride request by id.
    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<RideRequestEntity>, sqlx::Error> {
        sqlx::query_as::<_, RideRequestEntity>(
            r#"
            SELECT id, rider_id, pickup_lat, pickup_lng, destination_lat, destination_lng,
                   tier, payment_method, status, surge_multiplier, estimated_fare,
                   match_attempts, current_offer_id, driver_id, idempotency_key, region,
                   pickup_cell, created_at, expires_at, updated_at
            FROM ride_requests
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
    }

    /// Record a new outstanding offer: bumps match_attempts and moves the
    /// request into DRIVER_OFFERED.
    pub async fn record_offer(
        &self,
        ride_id: Uuid,
        offer_id: Uuid,
        driver_id: &str,
    ) -> Result<RideRequestEntity, sqlx::Error> {
        let timer = QueryTimer::new("record_offer");
        let result = sqlx::query_as::<_, RideRequestEntity>(
            r#"
            UPDATE ride_requests
            SET status = 'DRIVER_OFFERED',
                current_offer_id = $2,
                driver_id = $3,
                match_attempts = match_attempts + 1,
                updated_at = NOW()
            WHERE id = $1
            RETURNING id, rider_id, pickup_lat, pickup_lng, destination_lat, destination_lng,
                      tier, payment_method, status, surge_multiplier, estimated_fare,
                      match_attempts, current_offer_id, driver_id, idempotency_key, region,
                      pickup_cell, created_at, expires_at, updated_at
            "#,
        )
        .bind(ride_id)
        .bind(offer_id)
        .bind(driver_id)
        .fetch_one(&self.pool)
        .await;
        timer.record();
        result
    }

    /// Accept the current offer. The WHERE clause is the second
    /// double-acceptance barrier after the per-ride lock: it only matches
    /// while the given offer is still the outstanding one.
    /// Returns the number of rows updated (0 means the barrier rejected it).
    pub async fn accept(&self, ride_id: Uuid, offer_id: Uuid) -> Result<u64, sqlx::Error> {
        let timer = QueryTimer::new("accept_ride_request");
        let result = sqlx::query(
            r#"
            UPDATE ride_requests
            SET status = 'ACCEPTED', updated_at = NOW()
            WHERE id = $1 AND status = 'DRIVER_OFFERED' AND current_offer_id = $2
            "#,
        )
        .bind(ride_id)
        .bind(offer_id)
        .execute(&self.pool)
        .await;
        timer.record();
        result.map(|r| r.rows_affected())
    }

    /// Return the request to MATCHING after a decline or timeout, clearing
    /// the outstanding offer.
    pub async fn reset_to_matching(&self, ride_id: Uuid) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE ride_requests
            SET status = 'MATCHING', current_offer_id = NULL, driver_id = NULL,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(ride_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    /// Move the request into a terminal failure status (NO_DRIVERS or
    /// EXPIRED), clearing any outstanding offer.
    pub async fn mark_exhausted(&self, ride_id: Uuid, status: &str) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE ride_requests
            SET status = $2, current_offer_id = NULL, driver_id = NULL, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(ride_id)
        .bind(status)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    /// Cancel the ride unless it already reached a terminal status.
    /// Returns the number of rows updated (0 means it was already terminal).
    pub async fn cancel(&self, ride_id: Uuid) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE ride_requests
            SET status = 'CANCELLED', current_offer_id = NULL, updated_at = NOW()
            WHERE id = $1
              AND status NOT IN ('ACCEPTED', 'NO_DRIVERS', 'EXPIRED', 'CANCELLED')
            "#,
        )
        .bind(ride_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }
}
