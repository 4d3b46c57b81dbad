//! Database schema management for `gnss-pw-service`.
//!
//! Ensures the station catalog table exists before serving requests.
//! Applied once on startup from `main.rs` (EMBP: single gateway call).

use anyhow::Result;
use sqlx::PgPool;

// ---

/// Create or update the database schema (idempotent).
///
/// Creates the `gnss_stations` catalog read by the context enricher. Safe to
/// call on every startup; no-op if objects already exist. Rows are managed
/// outside this service.
///
/// Errors are propagated if any SQL execution fails.
pub async fn create_schema(pool: &PgPool) -> Result<()> {
    // ---
    let mut tx = pool.begin().await?;

    // Station geometry served to the enricher
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS gnss_stations (
            station_id   TEXT             PRIMARY KEY,
            latitude     DOUBLE PRECISION NOT NULL CHECK (latitude BETWEEN -90 AND 90),
            longitude    DOUBLE PRECISION NOT NULL CHECK (longitude BETWEEN -180 AND 180),
            elevation_m  DOUBLE PRECISION NOT NULL,
            name         TEXT,
            updated_at   TIMESTAMPTZ      NOT NULL DEFAULT now()
        );
        "#,
    )
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(())
}
