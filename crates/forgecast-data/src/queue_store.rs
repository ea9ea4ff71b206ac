//! Persists [`QueueJob`] rows and implements dispatch, completion, and
//! crash-recovery semantics (component I/J).

use chrono::{Duration, Utc};
use forgecast_domain::{Priority, QueueJob, QueueState};
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::error::{db, DataResult};
use crate::status_codec::{parse_priority, parse_queue_state, priority_label, queue_state_label};

const INSERT_SQL: &str = r"
    INSERT INTO forgecast.queue_jobs (
        id, file_entry_id, priority, state, attempt, max_attempts,
        scheduled_at, started_at, finished_at, last_error, batch_id
    )
    VALUES (
        $1, $2, $3::forgecast.priority, $4::forgecast.queue_state, $5, $6,
        $7, $8, $9, $10, $11
    )
";

const CLAIM_NEXT_SQL: &str = r"
    UPDATE forgecast.queue_jobs
    SET state = 'running'::forgecast.queue_state, started_at = now()
    WHERE id = (
        SELECT id FROM forgecast.queue_jobs
        WHERE state = 'queued' AND scheduled_at <= now()
        ORDER BY priority DESC, scheduled_at ASC, id ASC
        FOR UPDATE SKIP LOCKED
        LIMIT 1
    )
    RETURNING id, file_entry_id, priority::TEXT AS priority, state::TEXT AS state,
        attempt, max_attempts, scheduled_at, started_at, finished_at, last_error, batch_id
";

const COMPLETE_SQL: &str = r"
    UPDATE forgecast.queue_jobs
    SET state = 'done'::forgecast.queue_state, finished_at = now()
    WHERE id = $1
";

const CANCEL_SQL: &str = r"
    UPDATE forgecast.queue_jobs
    SET state = 'cancelled'::forgecast.queue_state, finished_at = now()
    WHERE id = $1 AND state IN ('queued', 'running')
";

const REQUEUE_SQL: &str = r"
    UPDATE forgecast.queue_jobs
    SET state = 'queued'::forgecast.queue_state,
        attempt = attempt + 1,
        scheduled_at = $2,
        last_error = $3,
        started_at = NULL
    WHERE id = $1
";

const FAIL_SQL: &str = r"
    UPDATE forgecast.queue_jobs
    SET state = 'failed'::forgecast.queue_state, finished_at = now(), last_error = $2
    WHERE id = $1
";

const GET_STATE_SQL: &str = r"
    SELECT state::TEXT AS state FROM forgecast.queue_jobs WHERE id = $1
";

const RECOVER_STALE_SQL: &str = r"
    UPDATE forgecast.queue_jobs
    SET state = 'queued'::forgecast.queue_state, started_at = NULL,
        last_error = 'recovered after presumed worker crash'
    WHERE state = 'running' AND started_at < $1
    RETURNING id
";

/// Database-backed repository and dispatch surface for [`QueueJob`]s.
#[derive(Clone)]
pub struct JobQueueStore {
    pool: PgPool,
}

impl JobQueueStore {
    /// Wrap an already-migrated connection pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert a brand-new job. Callers are responsible for checking (outside
    /// a single statement, typically within the same transaction as the
    /// enqueue decision) that no other active job already owns
    /// `file_entry_id`; the partial unique index in `migrations/` makes a
    /// second concurrent insert fail rather than silently duplicate.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::DataError::Database`] if the insert fails,
    /// including a unique-violation when an active job already exists.
    pub async fn enqueue(&self, job: &QueueJob) -> DataResult<()> {
        sqlx::query(INSERT_SQL)
            .bind(job.id)
            .bind(job.file_entry_id)
            .bind(priority_label(job.priority))
            .bind(queue_state_label(job.state))
            .bind(i32::try_from(job.attempt).unwrap_or(i32::MAX))
            .bind(i32::try_from(job.max_attempts).unwrap_or(i32::MAX))
            .bind(job.scheduled_at)
            .bind(job.started_at)
            .bind(job.finished_at)
            .bind(&job.last_error)
            .bind(job.batch_id)
            .execute(&self.pool)
            .await
            .map_err(db("enqueue_job"))?;
        Ok(())
    }

    /// Atomically claim the highest-priority eligible job, per
    /// [`QueueJob::dispatch_key`]'s ordering, using `FOR UPDATE SKIP LOCKED`
    /// so concurrent workers never contend on the same row.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::DataError::Database`] on a query failure.
    pub async fn claim_next(&self) -> DataResult<Option<QueueJob>> {
        let row = sqlx::query(CLAIM_NEXT_SQL)
            .fetch_optional(&self.pool)
            .await
            .map_err(db("claim_next_job"))?;
        row.as_ref().map(decode_row).transpose()
    }

    /// Mark a job `done`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::DataError::Database`] if the update fails.
    pub async fn complete(&self, job_id: Uuid) -> DataResult<()> {
        sqlx::query(COMPLETE_SQL)
            .bind(job_id)
            .execute(&self.pool)
            .await
            .map_err(db("complete_job"))?;
        Ok(())
    }

    /// Cancel a queued or running job.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::DataError::Database`] if the update fails.
    pub async fn cancel(&self, job_id: Uuid) -> DataResult<()> {
        sqlx::query(CANCEL_SQL)
            .bind(job_id)
            .execute(&self.pool)
            .await
            .map_err(db("cancel_job"))?;
        Ok(())
    }

    /// Handle a failed attempt: requeue with an incremented attempt counter
    /// and a delay of `retry_delay` if the job has attempts remaining,
    /// otherwise mark it terminally `failed`. The attempt budget check
    /// mirrors [`forgecast_domain::QueueJob`]'s `max_attempts` field, read
    /// by the caller before deciding which path to take.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::DataError::Database`] if the update fails.
    pub async fn requeue_or_fail(
        &self,
        job_id: Uuid,
        attempt: u32,
        max_attempts: u32,
        retry_delay: Duration,
        error: &str,
    ) -> DataResult<()> {
        if attempt + 1 >= max_attempts {
            sqlx::query(FAIL_SQL)
                .bind(job_id)
                .bind(error)
                .execute(&self.pool)
                .await
                .map_err(db("fail_job"))?;
        } else {
            let scheduled_at = Utc::now() + retry_delay;
            sqlx::query(REQUEUE_SQL)
                .bind(job_id)
                .bind(scheduled_at)
                .bind(error)
                .execute(&self.pool)
                .await
                .map_err(db("requeue_job"))?;
        }
        Ok(())
    }

    /// Mark a job terminally `failed` for a reason independent of the
    /// attempt budget (e.g. a non-retryable [`forgecast_domain::ErrorKind`]
    /// classification). Distinct from [`Self::requeue_or_fail`], whose fail
    /// branch only fires once `max_attempts` is exhausted.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::DataError::Database`] if the update fails.
    pub async fn fail(&self, job_id: Uuid, error: &str) -> DataResult<()> {
        sqlx::query(FAIL_SQL)
            .bind(job_id)
            .bind(error)
            .execute(&self.pool)
            .await
            .map_err(db("fail_job"))?;
        Ok(())
    }

    /// Look up a job's current state, used by a worker mid-claim to detect
    /// an externally issued cancellation at a stage boundary (the database
    /// is the single source of truth; an in-process flag would not see a
    /// cancellation issued by another worker process).
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::DataError::Database`] if the query fails.
    pub async fn get_state(&self, job_id: Uuid) -> DataResult<Option<QueueState>> {
        let row = sqlx::query(GET_STATE_SQL)
            .bind(job_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db("get_queue_job_state"))?;
        row.map(|row| {
            let state_text: String = row.try_get("state").map_err(db("get_queue_job_state"))?;
            Ok(parse_queue_state(&state_text))
        })
        .transpose()
    }

    /// Reset every `running` job whose `started_at` predates `now - grace`
    /// back to `queued`, recovering from a worker crash (spec section 9,
    /// open question 3; default grace period is
    /// [`forgecast_config::DEFAULT_CRASH_RECOVERY_GRACE_SECS`]).
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::DataError::Database`] if the update fails.
    pub async fn recover_stale_running_jobs(&self, grace: Duration) -> DataResult<Vec<Uuid>> {
        let threshold = Utc::now() - grace;
        let rows = sqlx::query(RECOVER_STALE_SQL)
            .bind(threshold)
            .fetch_all(&self.pool)
            .await
            .map_err(db("recover_stale_jobs"))?;
        rows.iter()
            .map(|row| row.try_get::<Uuid, _>("id").map_err(db("recover_stale_jobs")))
            .collect()
    }
}

fn decode_row(row: &sqlx::postgres::PgRow) -> DataResult<QueueJob> {
    let priority_text: String = row.try_get("priority").map_err(db("decode_queue_job"))?;
    let state_text: String = row.try_get("state").map_err(db("decode_queue_job"))?;
    let attempt: i32 = row.try_get("attempt").map_err(db("decode_queue_job"))?;
    let max_attempts: i32 = row.try_get("max_attempts").map_err(db("decode_queue_job"))?;

    Ok(QueueJob {
        id: row.try_get("id").map_err(db("decode_queue_job"))?,
        file_entry_id: row.try_get("file_entry_id").map_err(db("decode_queue_job"))?,
        priority: parse_priority(&priority_text),
        state: parse_queue_state(&state_text),
        attempt: u32::try_from(attempt).unwrap_or_default(),
        max_attempts: u32::try_from(max_attempts).unwrap_or(u32::MAX),
        scheduled_at: row.try_get("scheduled_at").map_err(db("decode_queue_job"))?,
        started_at: row.try_get("started_at").map_err(db("decode_queue_job"))?,
        finished_at: row.try_get("finished_at").map_err(db("decode_queue_job"))?,
        last_error: row.try_get("last_error").map_err(db("decode_queue_job"))?,
        batch_id: row.try_get("batch_id").map_err(db("decode_queue_job"))?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn priority_and_state_labels_round_trip() {
        for priority in [Priority::Low, Priority::Normal, Priority::High] {
            assert_eq!(parse_priority(priority_label(priority)), priority);
        }
        for state in [
            QueueState::Queued,
            QueueState::Running,
            QueueState::Done,
            QueueState::Failed,
            QueueState::Cancelled,
        ] {
            assert_eq!(parse_queue_state(queue_state_label(state)), state);
        }
    }
}
