//! Discovery loop: walks the configured input directory for media files that
//! have no [`forgecast_domain::FileEntry`] yet, creates one, and enqueues a
//! `QueueJob` for it (spec section 6's filesystem interface — the core
//! itself never lists directories, so this is the CLI's job).

use std::path::Path;
use std::time::Duration;

use forgecast_data::{DataResult, FileEntryStore, JobQueueStore};
use forgecast_domain::{FileEntry, Priority, QueueJob};
use tracing::{info, warn};
use walkdir::WalkDir;

/// How often the input directory is re-scanned for new files.
pub const DEFAULT_SCAN_INTERVAL: Duration = Duration::from_secs(30);

/// Walk `input_media_path` once and enqueue a job for every regular file
/// that has no matching [`FileEntry`] row yet.
///
/// # Errors
///
/// Returns an error if a store operation fails outright; a single
/// unreadable directory entry is logged and skipped rather than aborting the
/// whole pass.
pub async fn scan_once(input_media_path: &Path, file_entries: &FileEntryStore, queue: &JobQueueStore) -> DataResult<usize> {
    let mut discovered = 0usize;

    for candidate in WalkDir::new(input_media_path).into_iter().filter_map(|entry| match entry {
        Ok(entry) => Some(entry),
        Err(source) => {
            warn!(%source, "failed to read directory entry during discovery");
            None
        }
    }) {
        if !candidate.file_type().is_file() {
            continue;
        }
        let file_path = candidate.path().to_string_lossy().into_owned();

        if file_entries.get_by_path(&file_path).await?.is_some() {
            continue;
        }

        let entry = FileEntry::new(file_path.clone());
        file_entries.save(&entry).await?;
        queue.enqueue(&QueueJob::new(entry.id, Priority::Normal)).await?;
        discovered += 1;
        info!(file_path = %file_path, file_entry_id = %entry.id, "discovered new media file");
    }

    Ok(discovered)
}

/// Run [`scan_once`] on a fixed interval until `shutdown` fires.
pub async fn run(input_media_path: &Path, file_entries: &FileEntryStore, queue: &JobQueueStore, mut shutdown: tokio::sync::watch::Receiver<bool>) {
    let mut interval = tokio::time::interval(DEFAULT_SCAN_INTERVAL);
    loop {
        if *shutdown.borrow() {
            return;
        }
        tokio::select! {
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    return;
                }
            }
            _ = interval.tick() => {
                match scan_once(input_media_path, file_entries, queue).await {
                    Ok(0) => {}
                    Ok(count) => info!(count, "discovery pass enqueued new files"),
                    Err(source) => warn!(%source, "discovery pass failed"),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_scan_interval_is_positive() {
        assert!(DEFAULT_SCAN_INTERVAL > Duration::ZERO);
    }
}
