//! Persists TMDB metadata cache entries (component H), keyed by TMDB id with
//! a TTL checked by [`forgecast_domain::TmdbCacheEntry::is_valid`].

use forgecast_domain::TmdbCacheEntry;
use sqlx::types::Json;
use sqlx::{PgPool, Row};

use crate::error::{db, DataResult};

const UPSERT_SQL: &str = r"
    INSERT INTO forgecast.tmdb_cache (tmdb_id, payload, cached_at, expires_at)
    VALUES ($1, $2, $3, $4)
    ON CONFLICT (tmdb_id) DO UPDATE SET
        payload = EXCLUDED.payload,
        cached_at = EXCLUDED.cached_at,
        expires_at = EXCLUDED.expires_at
";

const SELECT_SQL: &str = "SELECT tmdb_id, payload, cached_at, expires_at FROM forgecast.tmdb_cache WHERE tmdb_id = $1";

/// Database-backed repository for cached TMDB lookups.
#[derive(Clone)]
pub struct TmdbCacheStore {
    pool: PgPool,
}

impl TmdbCacheStore {
    /// Wrap an already-migrated connection pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert or refresh a cache entry.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::DataError::Database`] if the write fails.
    pub async fn upsert(&self, entry: &TmdbCacheEntry) -> DataResult<()> {
        let tmdb_id = i64::try_from(entry.tmdb_id).unwrap_or(i64::MAX);
        sqlx::query(UPSERT_SQL)
            .bind(tmdb_id)
            .bind(Json(&entry.payload))
            .bind(entry.cached_at)
            .bind(entry.expires_at)
            .execute(&self.pool)
            .await
            .map_err(db("upsert_tmdb_cache"))?;
        Ok(())
    }

    /// Look up a cached entry regardless of its TTL; callers decide whether
    /// to use it via [`forgecast_domain::TmdbCacheEntry::is_valid`].
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::DataError::Database`] on a query failure.
    pub async fn get(&self, tmdb_id: u64) -> DataResult<Option<TmdbCacheEntry>> {
        let id = i64::try_from(tmdb_id).unwrap_or(i64::MAX);
        let row = sqlx::query(SELECT_SQL)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db("get_tmdb_cache"))?;
        row.as_ref().map(decode_row).transpose()
    }
}

fn decode_row(row: &sqlx::postgres::PgRow) -> DataResult<TmdbCacheEntry> {
    let raw_id: i64 = row.try_get("tmdb_id").map_err(db("decode_tmdb_cache"))?;
    let Json(payload): Json<serde_json::Value> = row.try_get("payload").map_err(db("decode_tmdb_cache"))?;
    Ok(TmdbCacheEntry {
        tmdb_id: u64::try_from(raw_id).unwrap_or_default(),
        payload,
        cached_at: row.try_get("cached_at").map_err(db("decode_tmdb_cache"))?,
        expires_at: row.try_get("expires_at").map_err(db("decode_tmdb_cache"))?,
    })
}
