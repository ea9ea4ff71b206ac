//! Persists [`BatchJob`] rows (component J).

use forgecast_domain::{BatchJob, BatchProgress};
use sqlx::types::Json;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::error::{db, DataResult};
use crate::status_codec::{batch_status_label, parse_batch_status, parse_priority, priority_label};

const INSERT_SQL: &str = r"
    INSERT INTO forgecast.batch_jobs (
        id, file_entry_ids, concurrency_limit, priority, completed, failed, cancelled, status, created_at
    )
    VALUES ($1, $2, $3, $4::forgecast.priority, $5, $6, $7, $8::forgecast.batch_status, $9)
";

const SELECT_BY_ID_SQL: &str =
    "SELECT *, priority::TEXT AS priority_text, status::TEXT AS status_text FROM forgecast.batch_jobs WHERE id = $1";

const UPDATE_PROGRESS_SQL: &str = r"
    UPDATE forgecast.batch_jobs
    SET completed = $2, failed = $3, cancelled = $4, status = $5::forgecast.batch_status
    WHERE id = $1
";

/// Database-backed repository for [`BatchJob`]s.
#[derive(Clone)]
pub struct BatchStore {
    pool: PgPool,
}

impl BatchStore {
    /// Wrap an already-migrated connection pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert a brand-new batch.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::DataError::Database`] if the insert fails.
    pub async fn create(&self, batch: &BatchJob) -> DataResult<()> {
        sqlx::query(INSERT_SQL)
            .bind(batch.id)
            .bind(Json(&batch.file_entry_ids))
            .bind(i32::try_from(batch.concurrency_limit).unwrap_or(i32::MAX))
            .bind(priority_label(batch.priority))
            .bind(i32::try_from(batch.progress.completed).unwrap_or(i32::MAX))
            .bind(i32::try_from(batch.progress.failed).unwrap_or(i32::MAX))
            .bind(i32::try_from(batch.progress.cancelled).unwrap_or(i32::MAX))
            .bind(batch_status_label(batch.status))
            .bind(batch.created_at)
            .execute(&self.pool)
            .await
            .map_err(db("create_batch"))?;
        Ok(())
    }

    /// Load a batch by id.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::DataError::NotFound`] if no row matches.
    pub async fn get(&self, id: Uuid) -> DataResult<BatchJob> {
        let row = sqlx::query(SELECT_BY_ID_SQL)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db("get_batch"))?
            .ok_or_else(|| crate::error::DataError::NotFound {
                entity: "batch_job",
                id: id.to_string(),
            })?;
        decode_row(&row)
    }

    /// Persist updated progress counters and status for a batch (eventually
    /// consistent: the caller recomputes counters from settled
    /// `FileEntry`/`QueueJob` state rather than this store tracking deltas).
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::DataError::Database`] if the update fails.
    pub async fn update_progress(&self, id: Uuid, progress: BatchProgress, status: forgecast_domain::BatchStatus) -> DataResult<()> {
        sqlx::query(UPDATE_PROGRESS_SQL)
            .bind(id)
            .bind(i32::try_from(progress.completed).unwrap_or(i32::MAX))
            .bind(i32::try_from(progress.failed).unwrap_or(i32::MAX))
            .bind(i32::try_from(progress.cancelled).unwrap_or(i32::MAX))
            .bind(batch_status_label(status))
            .execute(&self.pool)
            .await
            .map_err(db("update_batch_progress"))?;
        Ok(())
    }
}

fn decode_row(row: &sqlx::postgres::PgRow) -> DataResult<BatchJob> {
    let priority_text: String = row.try_get("priority_text").map_err(db("decode_batch"))?;
    let status_text: String = row.try_get("status_text").map_err(db("decode_batch"))?;
    let Json(file_entry_ids): Json<Vec<Uuid>> = row.try_get("file_entry_ids").map_err(db("decode_batch"))?;
    let completed: i32 = row.try_get("completed").map_err(db("decode_batch"))?;
    let failed: i32 = row.try_get("failed").map_err(db("decode_batch"))?;
    let cancelled: i32 = row.try_get("cancelled").map_err(db("decode_batch"))?;
    let concurrency_limit: i32 = row.try_get("concurrency_limit").map_err(db("decode_batch"))?;

    Ok(BatchJob {
        id: row.try_get("id").map_err(db("decode_batch"))?,
        file_entry_ids,
        concurrency_limit: u32::try_from(concurrency_limit).unwrap_or(1),
        priority: parse_priority(&priority_text),
        progress: BatchProgress {
            completed: u32::try_from(completed).unwrap_or_default(),
            failed: u32::try_from(failed).unwrap_or_default(),
            cancelled: u32::try_from(cancelled).unwrap_or_default(),
        },
        status: parse_batch_status(&status_text),
        created_at: row.try_get("created_at").map_err(db("decode_batch"))?,
    })
}
