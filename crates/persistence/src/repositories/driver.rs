//! Driver repository for database operations.

use sqlx::PgPool;

use crate::entities::DriverEntity;
use crate::metrics::QueryTimer;

/// Repository for driver database operations.
#[derive(Clone)]
pub struct DriverRepository {
    pool: PgPool,
}

impl DriverRepository {
    /// Creates a new DriverRepository with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert or update a driver profile. Re-registration refreshes name
    /// and vehicle type but keeps rating and acceptance history.
    pub async fn upsert(
        &self,
        driver_id: &str,
        name: &str,
        vehicle_type: &str,
    ) -> Result<DriverEntity, sqlx::Error> {
        let timer = QueryTimer::new("upsert_driver");
        let result = sqlx::query_as::<_, DriverEntity>(
            r#"
            INSERT INTO drivers (id, name, vehicle_type, rating, acceptance_rate, status)
            VALUES ($1, $2, $3, 5.0, 1.0, 'OFFLINE')
            ON CONFLICT (id) DO UPDATE SET
                name = EXCLUDED.name,
                vehicle_type = EXCLUDED.vehicle_type,
                updated_at = NOW()
            RETURNING id, name, vehicle_type, rating, acceptance_rate, status,
                      created_at, updated_at
            "#,
        )
        .bind(driver_id)
        .bind(name)
        .bind(vehicle_type)
        .fetch_one(&self.pool)
        .await;
        timer.record();
        result
    }

    /// Find a driver by id.
    pub async fn find_by_id(&self, driver_id: &str) -> Result<Option<DriverEntity>, sqlx::Error> {
        sqlx::query_as::<_, DriverEntity>(
            r#"
            SELECT id, name, vehicle_type, rating, acceptance_rate, status,
                   created_at, updated_at
            FROM drivers
            WHERE id = $1
            "#,
        )
        .bind(driver_id)
        .fetch_optional(&self.pool)
        .await
    }

    /// Update a driver's availability status.
    /// Returns the number of rows updated (0 means the driver is unknown).
    pub async fn set_status(&self, driver_id: &str, status: &str) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE drivers
            SET status = $2, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(driver_id)
        .bind(status)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }
}
