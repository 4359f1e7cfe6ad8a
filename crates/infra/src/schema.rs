//! Database schema bootstrap.

use sqlx::PgPool;
use tracing::info;

use crate::error::StoreError;

const INIT_SQL: &str = include_str!("../migrations/0001_init.sql");

/// Apply the schema. Every statement is idempotent.
pub async fn apply_schema(pool: &PgPool) -> Result<(), StoreError> {
    sqlx::raw_sql(INIT_SQL).execute(pool).await?;
    info!("database schema applied");
    Ok(())
}
