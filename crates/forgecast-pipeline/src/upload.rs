//! Upload stage (spec section 4.6 and 4.11): duplicate-check each enabled
//! tracker, upload what isn't a duplicate, and seed what uploaded
//! successfully.

use forgecast_config::PartialFailurePolicy;
use forgecast_domain::{FileEntry, PipelineResult, TrackerOutcome, TrackerResult};
use forgecast_tracker::BuildContext;
use tracing::warn;

use crate::services::ExternalServices;

pub(crate) async fn run(entry: &mut FileEntry, services: &ExternalServices) -> PipelineResult<()> {
    for (slug, handle) in &services.trackers {
        if !handle.enabled {
            continue;
        }

        let release_name = entry.release_name.clone().unwrap_or_default();
        let matches = handle.adapter.duplicate_check(&release_name).await?;
        if handle.skip_on_duplicate && !matches.is_empty() {
            entry.record_tracker_result(TrackerResult {
                tracker_slug: slug.clone(),
                outcome: TrackerOutcome::SkippedDuplicate,
                remote_torrent_id: None,
                remote_url: None,
                error: None,
            });
            continue;
        }

        let Some(torrent_path) = entry.torrent_paths.get(slug).cloned() else {
            entry.record_tracker_result(TrackerResult {
                tracker_slug: slug.clone(),
                outcome: TrackerOutcome::Failed,
                remote_torrent_id: None,
                remote_url: None,
                error: Some("no .torrent was generated for this tracker".to_string()),
            });
            continue;
        };
        let torrent_bytes = match tokio::fs::read(&torrent_path).await {
            Ok(bytes) => bytes,
            Err(source) => {
                entry.record_tracker_result(TrackerResult {
                    tracker_slug: slug.clone(),
                    outcome: TrackerOutcome::Failed,
                    remote_torrent_id: None,
                    remote_url: None,
                    error: Some(format!("failed to read {torrent_path}: {source}")),
                });
                continue;
            }
        };
        let torrent_filename = format!("{release_name}.torrent");

        let ctx = BuildContext::new(build_context_root(entry, &release_name));
        match handle.adapter.upload(&ctx, torrent_bytes.clone(), &torrent_filename).await {
            Ok(result) => {
                if let Err(source) = services.torrent.add_torrent(&torrent_bytes, Some(slug.as_str())).await {
                    warn!(tracker = slug.as_str(), %source, "upload succeeded but seeding admission failed");
                }
                entry.record_tracker_result(result);
            }
            Err(err) => {
                entry.record_tracker_result(TrackerResult {
                    tracker_slug: slug.clone(),
                    outcome: TrackerOutcome::Failed,
                    remote_torrent_id: None,
                    remote_url: None,
                    error: Some(err.to_string()),
                });
                if !err.retryable() {
                    continue;
                }
                return Err(err);
            }
        }
    }
    Ok(())
}

fn build_context_root(entry: &FileEntry, release_name: &str) -> serde_json::Value {
    let mut root = entry.metadata.clone();
    if !root.is_object() {
        root = serde_json::Value::Object(serde_json::Map::new());
    }
    root.as_object_mut()
        .expect("promoted to object above")
        .insert("release".to_string(), serde_json::json!({ "name": release_name }));
    root
}

/// Whether the Upload stage's recorded results resolve to a final `UPLOADED`
/// status under the configured partial-failure policy, versus `FAILED`.
#[must_use]
pub(crate) fn succeeded(entry: &FileEntry, policy: PartialFailurePolicy) -> bool {
    let any_success = entry
        .tracker_results
        .iter()
        .any(|result| matches!(result.outcome, TrackerOutcome::Uploaded | TrackerOutcome::SkippedDuplicate));
    let any_failure = entry.tracker_results.iter().any(|result| result.outcome == TrackerOutcome::Failed);

    match policy {
        PartialFailurePolicy::UploadedIfAnySucceeded => any_success,
        PartialFailurePolicy::FailedIfAnyFailed => any_success && !any_failure,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry_with(outcomes: &[TrackerOutcome]) -> FileEntry {
        let mut entry = FileEntry::new("/in/movie.mkv");
        for (index, outcome) in outcomes.iter().enumerate() {
            entry.record_tracker_result(TrackerResult {
                tracker_slug: format!("tracker{index}"),
                outcome: *outcome,
                remote_torrent_id: None,
                remote_url: None,
                error: None,
            });
        }
        entry
    }

    #[test]
    fn any_succeeded_policy_tolerates_one_failure() {
        let entry = entry_with(&[TrackerOutcome::Uploaded, TrackerOutcome::Failed]);
        assert!(succeeded(&entry, PartialFailurePolicy::UploadedIfAnySucceeded));
    }

    #[test]
    fn failed_if_any_failed_policy_does_not() {
        let entry = entry_with(&[TrackerOutcome::Uploaded, TrackerOutcome::Failed]);
        assert!(!succeeded(&entry, PartialFailurePolicy::FailedIfAnyFailed));
    }

    #[test]
    fn no_trackers_at_all_never_succeeds() {
        let entry = entry_with(&[]);
        assert!(!succeeded(&entry, PartialFailurePolicy::UploadedIfAnySucceeded));
    }
}
