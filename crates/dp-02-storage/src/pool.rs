//! Connection pool setup and schema bootstrap.

use std::time::Duration;

use shared_types::{DispatchError, DispatchResult};
use sqlx::postgres::{PgPool, PgPoolOptions};

use crate::error::db_err;
use crate::SCHEMA_SQL;

/// Connects a pool sized for the API plus the outbox workers.
pub async fn connect(database_url: &str) -> DispatchResult<PgPool> {
    PgPoolOptions::new()
        .max_connections(20)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url)
        .await
        .map_err(|e| DispatchError::Internal(format!("database connect failed: {e}")))
}

/// Applies the bundled DDL. Idempotent (`IF NOT EXISTS` throughout).
pub async fn init_schema(pool: &PgPool) -> DispatchResult<()> {
    let mut conn = pool.acquire().await.map_err(db_err)?;
    sqlx::raw_sql(SCHEMA_SQL)
        .execute(&mut *conn)
        .await
        .map_err(db_err)?;
    Ok(())
}
