//! Rider repository for database operations.

use sqlx::PgPool;

/// Repository for rider database operations.
#[derive(Clone)]
pub struct RiderRepository {
    pool: PgPool,
}

impl RiderRepository {
    /// Creates a new RiderRepository with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Ensure a rider row exists for the given external id. Rider identity
    /// is owned upstream; dispatch only needs the foreign-key target.
    pub async fn ensure(&self, rider_id: &str) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO riders (id)
            VALUES ($1)
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(rider_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
