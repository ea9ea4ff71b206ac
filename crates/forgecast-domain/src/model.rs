//! Core entities: [`FileEntry`], [`QueueJob`], [`BatchJob`], [`TrackerResult`],
//! and the tracker-runtime / TMDB cache records that accompany them.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::error::{ErrorKind, PipelineError, PipelineResult};

/// Ordered pipeline stages; the ordinal doubles as the monotonic progression
/// order checked by [`FileEntry::record_checkpoint`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Verify the file exists and parse filename tokens.
    Scan,
    /// Run MediaInfo and fetch TMDB metadata.
    Analyze,
    /// Approve the release for publication (auto or human).
    Approve,
    /// Generate screenshots and upload them to an image host.
    Prepare,
    /// Compute the release name and move the file to the output directory.
    Rename,
    /// Generate `.torrent` files and render the NFO/BBCode presentation.
    Generate,
    /// Upload to each enabled tracker.
    Upload,
}

impl Stage {
    /// All stages in execution order.
    pub const ALL: [Self; 7] = [
        Self::Scan,
        Self::Analyze,
        Self::Approve,
        Self::Prepare,
        Self::Rename,
        Self::Generate,
        Self::Upload,
    ];

    /// The stage that must have completed before this one may begin, if any.
    #[must_use]
    pub const fn predecessor(self) -> Option<Self> {
        match self {
            Self::Scan => None,
            Self::Analyze => Some(Self::Scan),
            Self::Approve => Some(Self::Analyze),
            Self::Prepare => Some(Self::Approve),
            Self::Rename => Some(Self::Prepare),
            Self::Generate => Some(Self::Rename),
            Self::Upload => Some(Self::Generate),
        }
    }

    /// The [`FileEntryStatus`] a `FileEntry` reaches once this stage succeeds.
    #[must_use]
    pub const fn target_status(self) -> FileEntryStatus {
        match self {
            Self::Scan => FileEntryStatus::Scanned,
            Self::Analyze => FileEntryStatus::Analyzed,
            Self::Approve => FileEntryStatus::Approved,
            Self::Prepare => FileEntryStatus::Prepared,
            Self::Rename => FileEntryStatus::Renamed,
            Self::Generate => FileEntryStatus::MetadataGenerated,
            Self::Upload => FileEntryStatus::Uploaded,
        }
    }
}

/// Lifecycle status of a [`FileEntry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileEntryStatus {
    /// Newly enqueued, no stage has run yet.
    Pending,
    /// Scan stage succeeded.
    Scanned,
    /// Analyze stage succeeded.
    Analyzed,
    /// Approve stage succeeded.
    Approved,
    /// Prepare stage succeeded.
    Prepared,
    /// Rename stage succeeded.
    Renamed,
    /// Generate stage succeeded.
    MetadataGenerated,
    /// Upload stage succeeded for at least one tracker with no permanent failures.
    Uploaded,
    /// A stage raised a terminal error.
    Failed,
    /// Processing was cancelled before reaching a terminal success.
    Cancelled,
}

impl FileEntryStatus {
    /// Whether this status is terminal (no further stages will run).
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Uploaded | Self::Failed | Self::Cancelled)
    }
}

/// Per-tracker outcome of the Upload stage, recorded as a child of [`FileEntry`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackerResult {
    /// Slug of the tracker this result describes.
    pub tracker_slug: String,
    /// Outcome of the upload attempt.
    pub outcome: TrackerOutcome,
    /// Remote torrent identifier, when the tracker returned one.
    pub remote_torrent_id: Option<String>,
    /// Remote URL to the published release, when known.
    pub remote_url: Option<String>,
    /// Error detail when `outcome == Failed`.
    pub error: Option<String>,
}

/// Outcome of an upload attempt against a single tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackerOutcome {
    /// The duplicate check matched an existing release; no upload was sent.
    SkippedDuplicate,
    /// The upload succeeded.
    Uploaded,
    /// The upload failed.
    Failed,
}

/// One source media file being carried through the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileEntry {
    /// Unique identifier.
    pub id: Uuid,
    /// Absolute path to the file; unique among active entries.
    pub file_path: String,
    /// Standardized release name, set after the Rename stage.
    pub release_name: Option<String>,
    /// Current lifecycle status.
    pub status: FileEntryStatus,
    /// Taxonomy kind of the last error, if any.
    pub error_kind: Option<ErrorKind>,
    /// Human-readable text of the last error, if any.
    pub error_message: Option<String>,
    /// When the entry was created.
    pub created_at: DateTime<Utc>,
    /// When the entry was last updated.
    pub updated_at: DateTime<Utc>,
    /// Checkpoint timestamp for the Scan stage.
    pub scanned_at: Option<DateTime<Utc>>,
    /// Checkpoint timestamp for the Analyze stage.
    pub analyzed_at: Option<DateTime<Utc>>,
    /// Checkpoint timestamp for the Approve stage.
    pub approved_at: Option<DateTime<Utc>>,
    /// Checkpoint timestamp for the Prepare stage.
    pub prepared_at: Option<DateTime<Utc>>,
    /// Checkpoint timestamp for the Rename stage.
    pub renamed_at: Option<DateTime<Utc>>,
    /// Checkpoint timestamp for the Generate stage.
    pub metadata_generated_at: Option<DateTime<Utc>>,
    /// Checkpoint timestamp for the Upload stage.
    pub uploaded_at: Option<DateTime<Utc>>,
    /// Tracker slug -> local path of the generated `.torrent` file.
    pub torrent_paths: BTreeMap<String, String>,
    /// Local path to the rendered NFO, if generated.
    pub nfo_path: Option<String>,
    /// Ordered list of uploaded screenshot URLs.
    pub screenshot_urls: Vec<String>,
    /// Structured blob of TMDB + MediaInfo fields gathered during Analyze.
    pub metadata: Value,
    /// Per-tracker results recorded during Upload.
    pub tracker_results: Vec<TrackerResult>,
}

impl FileEntry {
    /// Construct a brand-new entry in `PENDING` status.
    #[must_use]
    pub fn new(file_path: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            file_path: file_path.into(),
            release_name: None,
            status: FileEntryStatus::Pending,
            error_kind: None,
            error_message: None,
            created_at: now,
            updated_at: now,
            scanned_at: None,
            analyzed_at: None,
            approved_at: None,
            prepared_at: None,
            renamed_at: None,
            metadata_generated_at: None,
            uploaded_at: None,
            torrent_paths: BTreeMap::new(),
            nfo_path: None,
            screenshot_urls: Vec::new(),
            metadata: Value::Null,
            tracker_results: Vec::new(),
        }
    }

    /// The checkpoint timestamp already recorded for `stage`, if any.
    #[must_use]
    pub const fn checkpoint(&self, stage: Stage) -> Option<DateTime<Utc>> {
        match stage {
            Stage::Scan => self.scanned_at,
            Stage::Analyze => self.analyzed_at,
            Stage::Approve => self.approved_at,
            Stage::Prepare => self.prepared_at,
            Stage::Rename => self.renamed_at,
            Stage::Generate => self.metadata_generated_at,
            Stage::Upload => self.uploaded_at,
        }
    }

    /// Whether `stage` has already completed and may be skipped (idempotent resume).
    #[must_use]
    pub const fn is_complete(&self, stage: Stage) -> bool {
        self.checkpoint(stage).is_some()
    }

    /// The next stage to execute, or `None` if every stage has completed.
    #[must_use]
    pub fn next_stage(&self) -> Option<Stage> {
        Stage::ALL.into_iter().find(|stage| !self.is_complete(*stage))
    }

    /// Record that `stage` completed successfully at `now`.
    ///
    /// A no-op if the checkpoint was already set (idempotent re-entry, see
    /// the pipeline stage invariants). Returns [`PipelineError::InternalInvariant`]
    /// if `stage`'s predecessor has not completed, or if the entry is already
    /// in a terminal status.
    ///
    /// # Errors
    ///
    /// Returns an error if the stage's precondition is violated.
    pub fn record_checkpoint(&mut self, stage: Stage, now: DateTime<Utc>) -> PipelineResult<()> {
        if self.is_complete(stage) {
            return Ok(());
        }
        if self.status.is_terminal() {
            return Err(PipelineError::InternalInvariant {
                detail: format!("cannot advance {stage:?} on terminal entry {}", self.id),
            });
        }
        if let Some(predecessor) = stage.predecessor() {
            if !self.is_complete(predecessor) {
                return Err(PipelineError::InternalInvariant {
                    detail: format!(
                        "cannot advance {stage:?} before predecessor {predecessor:?} on entry {}",
                        self.id
                    ),
                });
            }
        }

        match stage {
            Stage::Scan => self.scanned_at = Some(now),
            Stage::Analyze => self.analyzed_at = Some(now),
            Stage::Approve => self.approved_at = Some(now),
            Stage::Prepare => self.prepared_at = Some(now),
            Stage::Rename => self.renamed_at = Some(now),
            Stage::Generate => self.metadata_generated_at = Some(now),
            Stage::Upload => self.uploaded_at = Some(now),
        }
        self.status = stage.target_status();
        self.updated_at = now;
        Ok(())
    }

    /// Mark the entry `FAILED` with a classified error. Idempotent only in the
    /// sense that re-failing an already-failed entry updates the recorded error.
    pub fn mark_failed(&mut self, kind: ErrorKind, message: impl Into<String>, now: DateTime<Utc>) {
        self.status = FileEntryStatus::Failed;
        self.error_kind = Some(kind);
        self.error_message = Some(message.into());
        self.updated_at = now;
    }

    /// Mark the entry `CANCELLED`.
    pub fn mark_cancelled(&mut self, now: DateTime<Utc>) {
        self.status = FileEntryStatus::Cancelled;
        self.error_kind = Some(ErrorKind::UserCancelled);
        self.updated_at = now;
    }

    /// Append (or replace, by `tracker_slug`) a per-tracker upload result.
    pub fn record_tracker_result(&mut self, result: TrackerResult) {
        if let Some(existing) = self
            .tracker_results
            .iter_mut()
            .find(|r| r.tracker_slug == result.tracker_slug)
        {
            *existing = result;
        } else {
            self.tracker_results.push(result);
        }
    }

    /// Fraction of pipeline stages completed, in `[0.0, 1.0]`.
    #[expect(
        clippy::cast_precision_loss,
        reason = "stage counts are tiny; precision loss is not observable"
    )]
    #[must_use]
    pub fn progress_fraction(&self) -> f32 {
        let completed = Stage::ALL.iter().filter(|s| self.is_complete(**s)).count();
        completed as f32 / Stage::ALL.len() as f32
    }
}

/// Scheduling priority for a [`QueueJob`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    /// Processed after `Normal` and `High` jobs are exhausted.
    Low,
    /// Default priority.
    Normal,
    /// Processed before `Normal` and `Low` jobs.
    High,
}

impl Default for Priority {
    fn default() -> Self {
        Self::Normal
    }
}

/// Execution state of a [`QueueJob`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueState {
    /// Waiting to be claimed.
    Queued,
    /// Claimed by a worker and currently executing.
    Running,
    /// Completed successfully.
    Done,
    /// Failed terminally; will not be retried.
    Failed,
    /// Cancelled before completion.
    Cancelled,
}

impl QueueState {
    /// Whether a job in this state counts toward the "at most one active job
    /// per file" invariant.
    #[must_use]
    pub const fn is_active(self) -> bool {
        matches!(self, Self::Queued | Self::Running)
    }
}

/// One scheduled execution attempt for a [`FileEntry`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueJob {
    /// Unique identifier.
    pub id: Uuid,
    /// The file entry this job advances.
    pub file_entry_id: Uuid,
    /// Scheduling priority.
    pub priority: Priority,
    /// Current execution state.
    pub state: QueueState,
    /// Zero-based attempt counter; incremented on each requeue.
    pub attempt: u32,
    /// Maximum attempts before the job is failed terminally.
    pub max_attempts: u32,
    /// Earliest time this job may be claimed.
    pub scheduled_at: DateTime<Utc>,
    /// When a worker claimed the job.
    pub started_at: Option<DateTime<Utc>>,
    /// When the job reached a terminal state.
    pub finished_at: Option<DateTime<Utc>>,
    /// Most recent error message, if any attempt failed.
    pub last_error: Option<String>,
    /// Batch this job belongs to, if enqueued as part of one.
    pub batch_id: Option<Uuid>,
}

/// Default attempt budget per job, per §3 of the specification.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

impl QueueJob {
    /// Construct a new job in `QUEUED` state, scheduled for immediate execution.
    #[must_use]
    pub fn new(file_entry_id: Uuid, priority: Priority) -> Self {
        Self {
            id: Uuid::new_v4(),
            file_entry_id,
            priority,
            state: QueueState::Queued,
            attempt: 0,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            scheduled_at: Utc::now(),
            started_at: None,
            finished_at: None,
            last_error: None,
            batch_id: None,
        }
    }

    /// Dispatch ordering key: strict priority (high first), then
    /// `scheduled_at` ascending, then `id` ascending as a stable tie-break.
    #[must_use]
    pub fn dispatch_key(&self) -> (std::cmp::Reverse<Priority>, DateTime<Utc>, Uuid) {
        (std::cmp::Reverse(self.priority), self.scheduled_at, self.id)
    }
}

/// Status of a [`BatchJob`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchStatus {
    /// No jobs have started yet.
    Pending,
    /// At least one job is queued or running.
    Running,
    /// Every job reached a terminal state with no cancellations.
    Completed,
    /// The batch was cancelled.
    Cancelled,
}

/// Progress counters for a [`BatchJob`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchProgress {
    /// File entries that reached `UPLOADED`.
    pub completed: u32,
    /// File entries that reached `FAILED`.
    pub failed: u32,
    /// File entries that reached `CANCELLED`.
    pub cancelled: u32,
}

/// A bundle of [`FileEntry`] ids processed under a shared concurrency cap.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchJob {
    /// Unique identifier.
    pub id: Uuid,
    /// File entries owned by this batch.
    pub file_entry_ids: Vec<Uuid>,
    /// Maximum number of jobs from this batch that may run concurrently.
    pub concurrency_limit: u32,
    /// Scheduling priority applied to every job the batch enqueues.
    pub priority: Priority,
    /// Aggregate progress counters.
    pub progress: BatchProgress,
    /// Current status.
    pub status: BatchStatus,
    /// When the batch was created.
    pub created_at: DateTime<Utc>,
}

impl BatchJob {
    /// Construct a new pending batch over `file_entry_ids`.
    #[must_use]
    pub fn new(file_entry_ids: Vec<Uuid>, concurrency_limit: u32, priority: Priority) -> Self {
        Self {
            id: Uuid::new_v4(),
            file_entry_ids,
            concurrency_limit: concurrency_limit.max(1),
            priority,
            progress: BatchProgress::default(),
            status: BatchStatus::Pending,
            created_at: Utc::now(),
        }
    }

    /// Total number of file entries owned by this batch.
    #[must_use]
    pub fn total(&self) -> u32 {
        u32::try_from(self.file_entry_ids.len()).unwrap_or(u32::MAX)
    }

    /// Whether every owned file entry has reached a terminal state.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        let settled = self.progress.completed + self.progress.failed + self.progress.cancelled;
        settled >= self.total()
    }
}

/// Cached TMDB movie metadata, keyed by `tmdb_id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TmdbCacheEntry {
    /// TMDB numeric identifier.
    pub tmdb_id: u64,
    /// Cached payload (see `forgecast-external::MovieMetadata`).
    pub payload: Value,
    /// When the entry was fetched.
    pub cached_at: DateTime<Utc>,
    /// When the entry should be refreshed.
    pub expires_at: DateTime<Utc>,
}

impl TmdbCacheEntry {
    /// Whether the cached payload may still be used as of `now`.
    #[must_use]
    pub fn is_valid(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_entry_starts_pending_with_no_checkpoints() {
        let entry = FileEntry::new("/in/movie.mkv");
        assert_eq!(entry.status, FileEntryStatus::Pending);
        assert_eq!(entry.next_stage(), Some(Stage::Scan));
        assert!(!entry.is_complete(Stage::Scan));
    }

    #[test]
    fn record_checkpoint_advances_status_and_is_idempotent() {
        let mut entry = FileEntry::new("/in/movie.mkv");
        let t1 = Utc::now();
        entry.record_checkpoint(Stage::Scan, t1).unwrap();
        assert_eq!(entry.status, FileEntryStatus::Scanned);
        assert_eq!(entry.scanned_at, Some(t1));

        let t2 = t1 + chrono::Duration::seconds(5);
        entry.record_checkpoint(Stage::Scan, t2).unwrap();
        assert_eq!(
            entry.scanned_at,
            Some(t1),
            "re-entering a completed stage must not move the checkpoint"
        );
    }

    #[test]
    fn record_checkpoint_rejects_out_of_order_advance() {
        let mut entry = FileEntry::new("/in/movie.mkv");
        let err = entry.record_checkpoint(Stage::Analyze, Utc::now()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InternalInvariant);
    }

    #[test]
    fn record_checkpoint_rejects_advance_on_terminal_entry() {
        let mut entry = FileEntry::new("/in/movie.mkv");
        entry.mark_failed(ErrorKind::ValidationError, "bad name", Utc::now());
        let err = entry.record_checkpoint(Stage::Scan, Utc::now()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InternalInvariant);
    }

    #[test]
    fn uploaded_status_implies_every_checkpoint_set() {
        let mut entry = FileEntry::new("/in/movie.mkv");
        let mut now = Utc::now();
        for stage in Stage::ALL {
            entry.record_checkpoint(stage, now).unwrap();
            now += chrono::Duration::seconds(1);
        }
        assert_eq!(entry.status, FileEntryStatus::Uploaded);
        assert!(entry.uploaded_at.is_some());
        assert!(Stage::ALL.iter().all(|s| entry.is_complete(*s)));
    }

    #[test]
    fn progress_fraction_tracks_completed_stages() {
        let mut entry = FileEntry::new("/in/movie.mkv");
        assert!((entry.progress_fraction() - 0.0).abs() < f32::EPSILON);
        entry.record_checkpoint(Stage::Scan, Utc::now()).unwrap();
        assert!((entry.progress_fraction() - (1.0 / 7.0)).abs() < 1e-6);
    }

    #[test]
    fn dispatch_key_orders_high_priority_first() {
        let high = QueueJob::new(Uuid::new_v4(), Priority::High);
        let normal = QueueJob::new(Uuid::new_v4(), Priority::Normal);
        assert!(high.dispatch_key() < normal.dispatch_key());
    }

    #[test]
    fn batch_is_finished_once_every_entry_settles() {
        let ids = vec![Uuid::new_v4(), Uuid::new_v4()];
        let mut batch = BatchJob::new(ids, 2, Priority::Normal);
        assert!(!batch.is_finished());
        batch.progress.completed = 1;
        batch.progress.failed = 1;
        assert!(batch.is_finished());
    }

    #[test]
    fn tmdb_cache_entry_validity_follows_expiry() {
        let now = Utc::now();
        let entry = TmdbCacheEntry {
            tmdb_id: 550,
            payload: Value::Null,
            cached_at: now,
            expires_at: now + chrono::Duration::days(30),
        };
        assert!(entry.is_valid(now));
        assert!(!entry.is_valid(now + chrono::Duration::days(31)));
    }
}
