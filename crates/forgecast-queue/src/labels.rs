//! String labels for [`Stage`] and [`FileEntryStatus`], used only to tag
//! events and metrics (`forgecast-data::status_codec` owns the DB-facing
//! codecs; this module never round-trips through Postgres).

use forgecast_domain::{FileEntryStatus, Stage};

pub(crate) const fn stage_label(stage: Stage) -> &'static str {
    match stage {
        Stage::Scan => "scan",
        Stage::Analyze => "analyze",
        Stage::Approve => "approve",
        Stage::Prepare => "prepare",
        Stage::Rename => "rename",
        Stage::Generate => "generate",
        Stage::Upload => "upload",
    }
}

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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_stage_has_a_label() {
        for stage in Stage::ALL {
            assert!(!stage_label(stage).is_empty());
        }
    }
}
