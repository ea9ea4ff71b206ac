//! Text-label codecs for the Postgres enum types declared in `migrations/`,
//! mirroring the teacher's explicit serialize/deserialize pair rather than
//! round-tripping through `serde_json`.

use forgecast_domain::{BatchStatus, FileEntryStatus, Priority, QueueState, TrackerOutcome};
use tracing::warn;

pub(crate) const fn file_entry_status_label(status: FileEntryStatus) -> &'static str {
    match status {
        FileEntryStatus::Pending => "pending",
        FileEntryStatus::Scanned => "scanned",
        FileEntryStatus::Analyzed => "analyzed",
        FileEntryStatus::Approved => "approved",
        FileEntryStatus::Prepared => "prepared",
        FileEntryStatus::Renamed => "renamed",
        FileEntryStatus::MetadataGenerated => "metadata_generated",
        FileEntryStatus::Uploaded => "uploaded",
        FileEntryStatus::Failed => "failed",
        FileEntryStatus::Cancelled => "cancelled",
    }
}

pub(crate) fn parse_file_entry_status(label: &str) -> FileEntryStatus {
    match label {
        "pending" => FileEntryStatus::Pending,
        "scanned" => FileEntryStatus::Scanned,
        "analyzed" => FileEntryStatus::Analyzed,
        "approved" => FileEntryStatus::Approved,
        "prepared" => FileEntryStatus::Prepared,
        "renamed" => FileEntryStatus::Renamed,
        "metadata_generated" => FileEntryStatus::MetadataGenerated,
        "uploaded" => FileEntryStatus::Uploaded,
        "cancelled" => FileEntryStatus::Cancelled,
        other => {
            if other != "failed" {
                warn!(label = other, "unknown file entry status label, treating as failed");
            }
            FileEntryStatus::Failed
        }
    }
}

pub(crate) const fn priority_label(priority: Priority) -> &'static str {
    match priority {
        Priority::Low => "low",
        Priority::Normal => "normal",
        Priority::High => "high",
    }
}

pub(crate) fn parse_priority(label: &str) -> Priority {
    match label {
        "low" => Priority::Low,
        "high" => Priority::High,
        other => {
            if other != "normal" {
                warn!(label = other, "unknown priority label, treating as normal");
            }
            Priority::Normal
        }
    }
}

pub(crate) const fn queue_state_label(state: QueueState) -> &'static str {
    match state {
        QueueState::Queued => "queued",
        QueueState::Running => "running",
        QueueState::Done => "done",
        QueueState::Failed => "failed",
        QueueState::Cancelled => "cancelled",
    }
}

pub(crate) fn parse_queue_state(label: &str) -> QueueState {
    match label {
        "queued" => QueueState::Queued,
        "running" => QueueState::Running,
        "done" => QueueState::Done,
        "cancelled" => QueueState::Cancelled,
        other => {
            if other != "failed" {
                warn!(label = other, "unknown queue state label, treating as failed");
            }
            QueueState::Failed
        }
    }
}

pub(crate) const fn batch_status_label(status: BatchStatus) -> &'static str {
    match status {
        BatchStatus::Pending => "pending",
        BatchStatus::Running => "running",
        BatchStatus::Completed => "completed",
        BatchStatus::Cancelled => "cancelled",
    }
}

pub(crate) fn parse_batch_status(label: &str) -> BatchStatus {
    match label {
        "pending" => BatchStatus::Pending,
        "running" => BatchStatus::Running,
        "cancelled" => BatchStatus::Cancelled,
        other => {
            if other != "completed" {
                warn!(label = other, "unknown batch status label, treating as completed");
            }
            BatchStatus::Completed
        }
    }
}

pub(crate) const fn tracker_outcome_label(outcome: TrackerOutcome) -> &'static str {
    match outcome {
        TrackerOutcome::SkippedDuplicate => "skipped_duplicate",
        TrackerOutcome::Uploaded => "uploaded",
        TrackerOutcome::Failed => "failed",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_entry_status_round_trips() {
        for status in [
            FileEntryStatus::Pending,
            FileEntryStatus::Scanned,
            FileEntryStatus::Analyzed,
            FileEntryStatus::Approved,
            FileEntryStatus::Prepared,
            FileEntryStatus::Renamed,
            FileEntryStatus::MetadataGenerated,
            FileEntryStatus::Uploaded,
            FileEntryStatus::Failed,
            FileEntryStatus::Cancelled,
        ] {
            assert_eq!(parse_file_entry_status(file_entry_status_label(status)), status);
        }
    }

    #[test]
    fn priority_round_trips() {
        for priority in [Priority::Low, Priority::Normal, Priority::High] {
            assert_eq!(parse_priority(priority_label(priority)), priority);
        }
    }
}
