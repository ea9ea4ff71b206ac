//! Batch controller (component J, spec section 4.10): enqueues many file
//! entries under a shared concurrency cap and keeps aggregate progress
//! eventually consistent with settled `FileEntry`/`QueueJob` state.
//!
//! Decoupled from [`crate::worker::QueueWorker`]: this controller learns
//! about settlement purely by subscribing to the event bus the worker
//! already publishes to, mirroring the event-reactive orchestrator pattern
//! used elsewhere in this workspace.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use forgecast_data::{BatchStore, DataResult, JobQueueStore};
use forgecast_domain::{BatchJob, BatchStatus, Priority, QueueJob};
use forgecast_events::{Event, EventBus};
use tokio::task::JoinHandle;
use tracing::{error, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Settlement {
    Completed,
    Failed,
    Cancelled,
}

struct BatchRuntime {
    pending: VecDeque<Uuid>,
    /// `file_entry_id -> job_id` for members currently queued or running.
    in_flight: HashMap<Uuid, Uuid>,
    concurrency_limit: u32,
    priority: Priority,
}

/// Enqueues and tracks batches of file entries (component J).
#[derive(Clone)]
pub struct BatchController {
    queue: JobQueueStore,
    batches: BatchStore,
    events: EventBus,
    runtimes: Arc<Mutex<HashMap<Uuid, BatchRuntime>>>,
    owner: Arc<Mutex<HashMap<Uuid, Uuid>>>,
}

impl BatchController {
    /// Construct a controller over the given stores and event bus.
    #[must_use]
    pub fn new(queue: JobQueueStore, batches: BatchStore, events: EventBus) -> Self {
        Self {
            queue,
            batches,
            events,
            runtimes: Arc::new(Mutex::new(HashMap::new())),
            owner: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Create a batch over `file_entry_ids` and admit as many as
    /// `concurrency_limit` allows immediately; the rest are admitted as
    /// earlier members settle.
    ///
    /// # Errors
    ///
    /// Returns an error if the batch row or its first admitted jobs cannot
    /// be persisted.
    pub async fn create(&self, file_entry_ids: Vec<Uuid>, concurrency_limit: u32, priority: Priority) -> DataResult<Uuid> {
        let batch = BatchJob::new(file_entry_ids.clone(), concurrency_limit, priority);
        self.batches.create(&batch).await?;

        {
            let mut runtimes = self.runtimes.lock().expect("batch runtime lock poisoned");
            let mut owner = self.owner.lock().expect("batch owner lock poisoned");
            for file_entry_id in &file_entry_ids {
                owner.insert(*file_entry_id, batch.id);
            }
            runtimes.insert(
                batch.id,
                BatchRuntime {
                    pending: file_entry_ids.into_iter().collect(),
                    in_flight: HashMap::new(),
                    concurrency_limit: batch.concurrency_limit,
                    priority,
                },
            );
        }

        self.admit_more(batch.id).await?;
        Ok(batch.id)
    }

    /// Cascade-cancel every job this batch still owns or has yet to enqueue.
    ///
    /// # Errors
    ///
    /// Returns an error if a job's cancellation cannot be persisted.
    pub async fn cancel(&self, batch_id: Uuid) -> DataResult<()> {
        let (job_ids, pending_count) = {
            let mut runtimes = self.runtimes.lock().expect("batch runtime lock poisoned");
            let Some(runtime) = runtimes.get_mut(&batch_id) else {
                return Ok(());
            };
            let pending_count = u32::try_from(runtime.pending.len()).unwrap_or(u32::MAX);
            runtime.pending.clear();
            (runtime.in_flight.values().copied().collect::<Vec<_>>(), pending_count)
        };

        // Pending members were never enqueued, so they will never reach
        // `on_settled` via an event; account for their cancellation here.
        // In-flight members instead settle the normal way once the worker
        // observes the job it cancels below.
        if pending_count > 0 {
            if let Ok(batch) = self.batches.get(batch_id).await {
                let mut progress = batch.progress;
                progress.cancelled += pending_count;
                if let Err(source) = self.batches.update_progress(batch_id, progress, BatchStatus::Cancelled).await {
                    error!(%batch_id, %source, "failed to persist batch cancellation");
                } else {
                    self.events.publish(Event::BatchProgressed {
                        batch_id,
                        total: batch.total(),
                        completed: progress.completed,
                        failed: progress.failed,
                        cancelled: progress.cancelled,
                    });
                }
            }
        }

        for job_id in job_ids {
            self.queue.cancel(job_id).await?;
        }
        Ok(())
    }

    /// Subscribe to the event bus and keep batch progress in sync with
    /// settled file entries for this controller's lifetime.
    #[must_use]
    pub fn spawn_watcher(&self) -> JoinHandle<()> {
        let controller = self.clone();
        tokio::spawn(async move {
            let mut stream = controller.events.subscribe(None);
            while let Some(envelope) = stream.next().await {
                match envelope.event {
                    Event::FileEntryCompleted { file_entry_id, .. } => {
                        controller.on_settled(file_entry_id, Settlement::Completed).await;
                    }
                    Event::FileEntryFailed { file_entry_id, .. } => {
                        controller.on_settled(file_entry_id, Settlement::Failed).await;
                    }
                    Event::FileEntryCancelled { file_entry_id } => {
                        controller.on_settled(file_entry_id, Settlement::Cancelled).await;
                    }
                    _ => {}
                }
            }
            warn!("batch controller event stream ended");
        })
    }

    async fn admit_more(&self, batch_id: Uuid) -> DataResult<()> {
        loop {
            let candidate = {
                let mut runtimes = self.runtimes.lock().expect("batch runtime lock poisoned");
                let Some(runtime) = runtimes.get_mut(&batch_id) else {
                    return Ok(());
                };
                if runtime.in_flight.len() >= runtime.concurrency_limit as usize {
                    return Ok(());
                }
                runtime.pending.pop_front().map(|file_entry_id| (file_entry_id, runtime.priority))
            };
            let Some((file_entry_id, priority)) = candidate else {
                return Ok(());
            };

            let mut job = QueueJob::new(file_entry_id, priority);
            job.batch_id = Some(batch_id);
            let job_id = job.id;
            self.queue.enqueue(&job).await?;

            if let Some(runtime) = self.runtimes.lock().expect("batch runtime lock poisoned").get_mut(&batch_id) {
                runtime.in_flight.insert(file_entry_id, job_id);
            }
        }
    }

    async fn on_settled(&self, file_entry_id: Uuid, settlement: Settlement) {
        let Some(batch_id) = self.owner.lock().expect("batch owner lock poisoned").get(&file_entry_id).copied() else {
            return;
        };

        let finished = {
            let mut runtimes = self.runtimes.lock().expect("batch runtime lock poisoned");
            let Some(runtime) = runtimes.get_mut(&batch_id) else {
                return;
            };
            runtime.in_flight.remove(&file_entry_id);
            runtime.pending.is_empty() && runtime.in_flight.is_empty()
        };

        if let Err(source) = self.admit_more(batch_id).await {
            error!(%batch_id, %source, "failed to admit next batch member");
        }

        let batch = match self.batches.get(batch_id).await {
            Ok(batch) => batch,
            Err(source) => {
                error!(%batch_id, %source, "failed to load batch for progress update");
                return;
            }
        };
        let mut progress = batch.progress;
        match settlement {
            Settlement::Completed => progress.completed += 1,
            Settlement::Failed => progress.failed += 1,
            Settlement::Cancelled => progress.cancelled += 1,
        }
        let status = if progress.cancelled > 0 {
            BatchStatus::Cancelled
        } else if finished {
            BatchStatus::Completed
        } else {
            BatchStatus::Running
        };

        if let Err(source) = self.batches.update_progress(batch_id, progress, status).await {
            error!(%batch_id, %source, "failed to persist batch progress");
            return;
        }

        self.events.publish(Event::BatchProgressed {
            batch_id,
            total: batch.total(),
            completed: progress.completed,
            failed: progress.failed,
            cancelled: progress.cancelled,
        });

        if finished {
            self.owner.lock().expect("batch owner lock poisoned").retain(|_, owning_batch| *owning_batch != batch_id);
            self.runtimes.lock().expect("batch runtime lock poisoned").remove(&batch_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn runtime_tracks_concurrency_limit() {
        let runtime = BatchRuntime {
            pending: VecDeque::from(vec![Uuid::nil()]),
            in_flight: HashMap::new(),
            concurrency_limit: 2,
            priority: Priority::Normal,
        };
        assert!(runtime.in_flight.len() < runtime.concurrency_limit as usize);
    }
}
