//! Durable storage for memoized call results.

use std::sync::Arc;

use chrono::{DateTime, SecondsFormat, Utc};

use crate::{AppError, Result};

use super::db::Database;
use super::eviction::{EvictionPolicy, PruneStats};

/// A stored call result and its usage counters.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    /// Fingerprint of the call that produced the value.
    pub fingerprint: String,
    /// Name of the wrapped operation.
    pub operation: String,
    /// Successful result.
    pub value: serde_json::Value,
    /// When the value was stored.
    pub created_at: DateTime<Utc>,
    /// Last time the value was served from the store.
    pub last_hit_at: Option<DateTime<Utc>>,
    /// How often the value was served from the store.
    pub hit_count: i64,
}

#[derive(sqlx::FromRow)]
struct CacheEntryRow {
    fingerprint: String,
    operation: String,
    value: String,
    created_at: String,
    last_hit_at: Option<String>,
    hit_count: i64,
}

impl CacheEntryRow {
    fn into_entry(self) -> Result<CacheEntry> {
        let value = serde_json::from_str(&self.value)
            .map_err(|e| AppError::Db(format!("invalid cached value: {e}")))?;
        let created_at = parse_timestamp(&self.created_at, "created_at")?;
        let last_hit_at = self
            .last_hit_at
            .as_deref()
            .map(|raw| parse_timestamp(raw, "last_hit_at"))
            .transpose()?;

        Ok(CacheEntry {
            fingerprint: self.fingerprint,
            operation: self.operation,
            value,
            created_at,
            last_hit_at,
            hit_count: self.hit_count,
        })
    }
}

// Fixed-width UTC so stored timestamps order lexicographically.
fn stamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(raw: &str, field: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| AppError::Db(format!("invalid {field}: {e}")))
}

/// Repository for `cache_entry` rows.
#[derive(Clone)]
pub struct CacheStore {
    db: Arc<Database>,
}

impl CacheStore {
    /// Create a new store over an open pool.
    #[must_use]
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Fetch the entry for `fingerprint`, recording the hit.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails or the row is corrupt.
    pub async fn get(&self, fingerprint: &str) -> Result<Option<CacheEntry>> {
        let now = stamp(Utc::now());
        let row: Option<CacheEntryRow> = sqlx::query_as(
            "UPDATE cache_entry SET hit_count = hit_count + 1, last_hit_at = ?1
             WHERE fingerprint = ?2
             RETURNING fingerprint, operation, value, created_at, last_hit_at, hit_count",
        )
        .bind(&now)
        .bind(fingerprint)
        .fetch_optional(self.db.as_ref())
        .await?;

        row.map(CacheEntryRow::into_entry).transpose()
    }

    /// Fetch the entry for `fingerprint` without touching its counters.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails or the row is corrupt.
    pub async fn peek(&self, fingerprint: &str) -> Result<Option<CacheEntry>> {
        let row: Option<CacheEntryRow> = sqlx::query_as(
            "SELECT fingerprint, operation, value, created_at, last_hit_at, hit_count
             FROM cache_entry WHERE fingerprint = ?1",
        )
        .bind(fingerprint)
        .fetch_optional(self.db.as_ref())
        .await?;

        row.map(CacheEntryRow::into_entry).transpose()
    }

    /// Store `value` under `fingerprint`, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if serialization or the upsert fails.
    pub async fn put(
        &self,
        fingerprint: &str,
        operation: &str,
        value: &serde_json::Value,
    ) -> Result<()> {
        let value = serde_json::to_string(value)
            .map_err(|e| AppError::Db(format!("serialize cached value: {e}")))?;
        let now = stamp(Utc::now());

        sqlx::query(
            "INSERT INTO cache_entry (fingerprint, operation, value, created_at, last_hit_at, hit_count)
             VALUES (?1, ?2, ?3, ?4, NULL, 0)
             ON CONFLICT(fingerprint) DO UPDATE SET
                 operation = excluded.operation,
                 value = excluded.value,
                 created_at = excluded.created_at",
        )
        .bind(fingerprint)
        .bind(operation)
        .bind(&value)
        .bind(&now)
        .execute(self.db.as_ref())
        .await?;
        Ok(())
    }

    /// Number of stored entries.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn len(&self) -> Result<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM cache_entry")
            .fetch_one(self.db.as_ref())
            .await?;
        Ok(u64::try_from(count).unwrap_or_default())
    }

    /// Whether the store holds no entries.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn is_empty(&self) -> Result<bool> {
        Ok(self.len().await? == 0)
    }

    /// Apply `policy`: drop entries idle longer than `max_age`, then the
    /// least recently used ones beyond `max_entries`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if a delete fails.
    pub async fn prune(&self, policy: &EvictionPolicy) -> Result<PruneStats> {
        self.prune_at(policy, Utc::now()).await
    }

    /// [`CacheStore::prune`] evaluated against an explicit `now`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if a delete fails.
    pub async fn prune_at(&self, policy: &EvictionPolicy, now: DateTime<Utc>) -> Result<PruneStats> {
        let mut deleted = 0_u64;

        if let Some(max_age) = policy.max_age {
            let cutoff = stamp(now - max_age);
            let result = sqlx::query(
                "DELETE FROM cache_entry WHERE COALESCE(last_hit_at, created_at) < ?1",
            )
            .bind(&cutoff)
            .execute(self.db.as_ref())
            .await?;
            deleted += result.rows_affected();
        }

        if let Some(max_entries) = policy.max_entries {
            let result = sqlx::query(
                "DELETE FROM cache_entry WHERE fingerprint IN (
                     SELECT fingerprint FROM cache_entry
                     ORDER BY COALESCE(last_hit_at, created_at) DESC
                     LIMIT -1 OFFSET ?1
                 )",
            )
            .bind(i64::from(max_entries))
            .execute(self.db.as_ref())
            .await?;
            deleted += result.rows_affected();
        }

        Ok(PruneStats {
            deleted,
            remaining: self.len().await?,
        })
    }

    /// Overwrite an entry's creation and last-hit timestamps.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the update fails.
    pub async fn touch(&self, fingerprint: &str, at: DateTime<Utc>) -> Result<()> {
        let at = stamp(at);
        sqlx::query("UPDATE cache_entry SET created_at = ?1, last_hit_at = ?1 WHERE fingerprint = ?2")
            .bind(&at)
            .bind(fingerprint)
            .execute(self.db.as_ref())
            .await?;
        Ok(())
    }
}
