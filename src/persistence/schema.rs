//! `SQLite` schema bootstrap logic.
//!
//! All definitions use `IF NOT EXISTS` and are safe to re-run on every
//! startup.

use sqlx::SqlitePool;

use crate::Result;

/// Apply the cache table definitions to the connected database.
///
/// # Errors
///
/// Returns `AppError::Db` if any DDL statement fails.
pub async fn bootstrap_schema(pool: &SqlitePool) -> Result<()> {
    let ddl = r"
CREATE TABLE IF NOT EXISTS cache_entry (
    fingerprint     TEXT PRIMARY KEY NOT NULL,
    operation       TEXT NOT NULL,
    value           TEXT NOT NULL,
    created_at      TEXT NOT NULL,
    last_hit_at     TEXT,
    hit_count       INTEGER NOT NULL DEFAULT 0
);

CREATE INDEX IF NOT EXISTS idx_cache_operation ON cache_entry(operation);
CREATE INDEX IF NOT EXISTS idx_cache_recency ON cache_entry(COALESCE(last_hit_at, created_at));
";

    sqlx::raw_sql(ddl).execute(pool).await?;
    Ok(())
}
