//! Queue worker (component I, spec section 4.9): claims one job at a time,
//! drives its `FileEntry` through `forgecast-pipeline`'s stages, and settles
//! the job according to the stage outcome.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{Duration, Utc};
use forgecast_data::{DataResult, FileEntryStore, JobQueueStore};
use forgecast_domain::{ErrorKind, FileEntry, FileEntryStatus, PipelineError, QueueJob, QueueState, Stage};
use forgecast_events::{Event, EventBus};
use forgecast_pipeline::ExternalServices;
use forgecast_telemetry::Metrics;
use tokio::sync::{watch, Semaphore};
use tokio::time::sleep;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::labels::{file_entry_status_label, stage_label};

/// Requeue backoff cap, per spec section 4.9 step 5.
const MAX_REQUEUE_BACKOFF_SECS: i64 = 300;
/// How long to wait before re-checking an empty queue.
const DEFAULT_POLL_INTERVAL: StdDuration = StdDuration::from_millis(500);

/// Drives queued jobs through the pipeline stages (component I).
///
/// `worker_concurrency` bounds how many distinct `FileEntry`s may be
/// in-flight at once; a single entry is always processed strictly serially
/// across its own stages within one claim (spec section 5).
#[derive(Clone)]
pub struct QueueWorker {
    queue: JobQueueStore,
    file_entries: FileEntryStore,
    services: Arc<ExternalServices>,
    events: EventBus,
    metrics: Metrics,
    concurrency: Arc<Semaphore>,
    poll_interval: StdDuration,
}

impl QueueWorker {
    /// Construct a worker bounded to `worker_concurrency` concurrently
    /// in-flight file entries.
    #[must_use]
    pub fn new(
        queue: JobQueueStore,
        file_entries: FileEntryStore,
        services: Arc<ExternalServices>,
        events: EventBus,
        metrics: Metrics,
        worker_concurrency: u32,
    ) -> Self {
        Self {
            queue,
            file_entries,
            services,
            events,
            metrics,
            concurrency: Arc::new(Semaphore::new(worker_concurrency.max(1) as usize)),
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    /// Override the idle poll interval; tests use a short one so they don't
    /// wait out the production default.
    #[must_use]
    pub fn with_poll_interval(mut self, interval: StdDuration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Reset any job left `RUNNING` by a crashed prior process (spec section
    /// 4.8's durability requirement). Call once at startup, before [`Self::run`].
    ///
    /// # Errors
    ///
    /// Returns an error if the recovery query fails.
    pub async fn recover_crashed_jobs(&self, grace: Duration) -> DataResult<Vec<Uuid>> {
        let recovered = self.queue.recover_stale_running_jobs(grace).await?;
        if !recovered.is_empty() {
            warn!(count = recovered.len(), "recovered jobs left running by a crashed worker");
        }
        Ok(recovered)
    }

    /// Run the claim loop until `shutdown` is set to `true`.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        loop {
            if *shutdown.borrow() {
                info!("queue worker shutting down");
                return;
            }
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("queue worker shutting down");
                        return;
                    }
                }
                () = self.claim_once() => {}
            }
        }
    }

    /// Acquire a concurrency permit, then try to claim and spawn one job.
    /// Acquiring the permit first bounds in-flight claims to
    /// `worker_concurrency`, so a job is never marked `RUNNING` in the
    /// database while actually idle waiting on a free slot.
    async fn claim_once(&self) {
        let permit = Arc::clone(&self.concurrency)
            .acquire_owned()
            .await
            .expect("semaphore is never closed");

        match self.queue.claim_next().await {
            Ok(Some(job)) => {
                let worker = self.clone();
                tokio::spawn(async move {
                    let _permit = permit;
                    worker.drain_job(job).await;
                });
            }
            Ok(None) => {
                drop(permit);
                sleep(self.poll_interval).await;
            }
            Err(source) => {
                drop(permit);
                error!(%source, "failed to claim next job");
                sleep(self.poll_interval).await;
            }
        }
    }

    /// Drive one claimed job through as many stages as it has checkpoints
    /// remaining, within this single claim (spec section 4.9 steps 2-7).
    async fn drain_job(&self, job: QueueJob) {
        let mut entry = match self.file_entries.get_by_id(job.file_entry_id).await {
            Ok(entry) => entry,
            Err(source) => {
                error!(job_id = %job.id, %source, "failed to load file entry for claimed job");
                if let Err(source) = self.queue.fail(job.id, &source.to_string()).await {
                    error!(job_id = %job.id, %source, "failed to mark job failed after load error");
                }
                self.metrics.record_job_failed();
                return;
            }
        };

        loop {
            if self.is_cancelled(job.id).await {
                self.settle_cancelled(&mut entry, &job).await;
                return;
            }

            let Some(stage) = entry.next_stage() else {
                self.settle_complete(&entry, &job).await;
                return;
            };

            match forgecast_pipeline::run_next_stage(&mut entry, &self.services).await {
                Ok(_) => {
                    if let Err(source) = self.file_entries.save(&entry).await {
                        error!(job_id = %job.id, %source, "failed to persist stage checkpoint");
                    }
                    self.metrics.record_stage_run(stage_label(stage), "ok");
                    self.events.publish(Event::FileEntryProgressed {
                        file_entry_id: entry.id,
                        stage: stage_label(stage).to_string(),
                        status: file_entry_status_label(entry.status).to_string(),
                    });

                    if entry.status.is_terminal() {
                        if entry.status == FileEntryStatus::Uploaded {
                            self.settle_complete(&entry, &job).await;
                        } else {
                            let kind = entry.error_kind.unwrap_or(ErrorKind::InternalInvariant);
                            let message = entry.error_message.clone().unwrap_or_default();
                            self.settle_failed(&mut entry, &job, kind, message).await;
                        }
                        return;
                    }
                }
                Err(err) => {
                    self.metrics.record_stage_run(stage_label(stage), "error");
                    if err.retryable() {
                        self.settle_retry(&job, &mut entry, stage, &err).await;
                    } else {
                        let kind = err.kind();
                        self.settle_failed(&mut entry, &job, kind, err.to_string()).await;
                    }
                    return;
                }
            }
        }
    }

    /// The database is the single source of truth for cancellation (spec
    /// section 5); an in-process flag would miss a cancellation issued by a
    /// different worker process, so this re-checks state at every stage
    /// boundary within the claim.
    async fn is_cancelled(&self, job_id: Uuid) -> bool {
        matches!(self.queue.get_state(job_id).await, Ok(Some(QueueState::Cancelled)))
    }

    async fn settle_complete(&self, entry: &FileEntry, job: &QueueJob) {
        if let Err(source) = self.queue.complete(job.id).await {
            error!(job_id = %job.id, %source, "failed to mark job complete");
        }
        self.events.publish(Event::FileEntryCompleted {
            file_entry_id: entry.id,
            release_name: entry.release_name.clone().unwrap_or_default(),
        });
    }

    async fn settle_failed(&self, entry: &mut FileEntry, job: &QueueJob, kind: ErrorKind, message: String) {
        let now = Utc::now();
        if entry.status != FileEntryStatus::Failed {
            entry.mark_failed(kind, message.clone(), now);
            if let Err(source) = self.file_entries.save(entry).await {
                error!(job_id = %job.id, %source, "failed to persist failed file entry");
            }
        }
        if let Err(source) = self.queue.fail(job.id, &message).await {
            error!(job_id = %job.id, %source, "failed to mark job failed");
        }
        self.metrics.record_job_failed();
        self.events.publish(Event::FileEntryFailed {
            file_entry_id: entry.id,
            error_kind: kind.as_str().to_string(),
            message,
        });
    }

    /// On a retryable stage error: requeue with `2^attempt` seconds of
    /// backoff, capped at five minutes, preserving the entry's already
    /// persisted state (spec section 4.9 step 5). If this exhausts the
    /// attempt budget, [`forgecast_data::JobQueueStore::requeue_or_fail`]
    /// fails the job instead, so the entry is marked failed to match.
    async fn settle_retry(&self, job: &QueueJob, entry: &mut FileEntry, stage: Stage, err: &PipelineError) {
        let delay = backoff_delay(job.attempt);
        let message = err.to_string();
        if let Err(source) = self
            .queue
            .requeue_or_fail(job.id, job.attempt, job.max_attempts, delay, &message)
            .await
        {
            error!(job_id = %job.id, %source, "failed to requeue job");
        }

        if job.attempt + 1 >= job.max_attempts {
            entry.mark_failed(err.kind(), message.clone(), Utc::now());
            if let Err(source) = self.file_entries.save(entry).await {
                error!(job_id = %job.id, %source, "failed to persist attempt-exhausted file entry");
            }
            self.metrics.record_job_failed();
            self.events.publish(Event::FileEntryFailed {
                file_entry_id: entry.id,
                error_kind: err.kind().as_str().to_string(),
                message,
            });
        } else {
            self.metrics.record_job_requeued();
            self.metrics.record_retry(stage_label(stage));
        }
    }

    /// On a cancel signal: stop at the current stage boundary. The entry is
    /// marked `CANCELLED` only when no stage has ever completed for it
    /// (`status == PENDING`); otherwise its already-reached status is left
    /// untouched so a future resume can pick up from the last checkpoint,
    /// and only the job's own bookkeeping records the cancellation (spec
    /// section 4.9 step 7).
    async fn settle_cancelled(&self, entry: &mut FileEntry, job: &QueueJob) {
        if entry.status == FileEntryStatus::Pending {
            entry.mark_cancelled(Utc::now());
            if let Err(source) = self.file_entries.save(entry).await {
                error!(job_id = %job.id, %source, "failed to persist cancelled file entry");
            }
        }
        if let Err(source) = self.queue.cancel(job.id).await {
            error!(job_id = %job.id, %source, "failed to mark job cancelled");
        }
        self.metrics.record_job_cancelled();
        self.events.publish(Event::FileEntryCancelled { file_entry_id: entry.id });
    }
}

fn backoff_delay(attempt: u32) -> Duration {
    let secs = 2i64.checked_pow(attempt).unwrap_or(i64::MAX).min(MAX_REQUEUE_BACKOFF_SECS);
    Duration::seconds(secs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_then_caps_at_five_minutes() {
        assert_eq!(backoff_delay(0), Duration::seconds(1));
        assert_eq!(backoff_delay(1), Duration::seconds(2));
        assert_eq!(backoff_delay(3), Duration::seconds(8));
        assert_eq!(backoff_delay(20), Duration::seconds(MAX_REQUEUE_BACKOFF_SECS));
        assert_eq!(backoff_delay(63), Duration::seconds(MAX_REQUEUE_BACKOFF_SECS));
    }
}
