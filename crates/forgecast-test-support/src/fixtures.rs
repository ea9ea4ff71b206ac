//! Builders for domain values and a sample tracker schema document, shared
//! across crates' test suites instead of being duplicated in each one.

use chrono::Utc;
use forgecast_domain::{FileEntry, Priority, QueueJob, Stage};
use uuid::Uuid;

/// A brand-new, `PENDING` file entry at a throwaway path.
#[must_use]
pub fn pending_file_entry() -> FileEntry {
    FileEntry::new(format!("/media/inbox/sample-{}.mkv", Uuid::new_v4()))
}

/// A file entry fast-forwarded through every stage up to and including
/// `stage`, as if it had already been processed that far.
///
/// # Panics
///
/// Panics if `record_checkpoint` rejects one of the stage advances, which
/// would indicate a bug in this helper rather than the code under test.
#[must_use]
pub fn file_entry_at_stage(stage: Stage) -> FileEntry {
    let mut entry = pending_file_entry();
    let now = Utc::now();
    for step in Stage::ALL {
        entry.record_checkpoint(step, now).expect("stage sequence is contiguous");
        if step == stage {
            break;
        }
    }
    entry
}

/// A queued job scheduling `entry` at [`Priority::Normal`].
#[must_use]
pub fn queue_job_for(entry: &FileEntry) -> QueueJob {
    QueueJob::new(entry.id, Priority::Normal)
}

/// A minimal, valid tracker schema document, in the shape
/// `forgecast_tracker::parse` expects. Mirrors the fields real tracker
/// schemas fill in, with placeholder values everywhere else.
pub const SAMPLE_TRACKER_SCHEMA_YAML: &str = r#"
tracker:
  name: Sample Tracker
  slug: sample
  base_url: https://tracker.example
auth:
  type: api_key
  header: X-Api-Key
endpoints:
  search:
    path: /api/search
    method: GET
  upload:
    path: /api/upload
search:
  format: json
  results_path: data.results
  title_path: title
  id_path: id
upload:
  fields:
    - name: torrent
      type: file
      required: true
    - name: release_name
      type: string
      source: release_name
      required: true
    - name: category
      type: option
      source: media.resolution
options:
  category:
    field: category
    mappings:
      "1080p": "44"
      "2160p": "45"
    default: "1"
response:
  upload:
    success_field: status
    success_value: "ok"
    error_field: message
"#;

/// Parse [`SAMPLE_TRACKER_SCHEMA_YAML`] into a raw [`serde_yaml::Value`],
/// the form `forgecast_tracker::parse` and `forgecast_config::TrackerEntry`
/// both carry the document as.
///
/// # Panics
///
/// Panics if the constant above is not valid YAML, which would mean this
/// crate itself is broken rather than the code under test.
#[must_use]
pub fn sample_tracker_schema_document() -> serde_yaml::Value {
    serde_yaml::from_str(SAMPLE_TRACKER_SCHEMA_YAML).expect("constant fixture is valid YAML")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pending_file_entry_has_no_checkpoints() {
        let entry = pending_file_entry();
        assert_eq!(entry.status, forgecast_domain::FileEntryStatus::Pending);
        assert!(entry.next_stage().is_some());
    }

    #[test]
    fn file_entry_at_stage_completes_exactly_up_to_stage() {
        let entry = file_entry_at_stage(Stage::Approve);
        assert!(entry.is_complete(Stage::Scan));
        assert!(entry.is_complete(Stage::Analyze));
        assert!(entry.is_complete(Stage::Approve));
        assert!(!entry.is_complete(Stage::Prepare));
    }

    #[test]
    fn queue_job_for_references_its_file_entry() {
        let entry = pending_file_entry();
        let job = queue_job_for(&entry);
        assert_eq!(job.file_entry_id, entry.id);
        assert_eq!(job.priority, Priority::Normal);
    }

    #[test]
    fn sample_tracker_schema_document_parses() {
        let document = sample_tracker_schema_document();
        assert!(document.get("tracker").is_some());
    }
}
