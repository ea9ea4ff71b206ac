//! Persists [`FileEntry`] rows (component G).

use std::collections::BTreeMap;

use forgecast_domain::{ErrorKind, FileEntry, FileEntryStatus, TrackerResult};
use sqlx::types::Json;
use sqlx::{PgPool, Row};

use crate::error::{db, DataError, DataResult};
use crate::status_codec::{file_entry_status_label, parse_file_entry_status};

const UPSERT_SQL: &str = r"
    INSERT INTO forgecast.file_entries (
        id, file_path, release_name, status, error_kind, error_message,
        created_at, updated_at, scanned_at, analyzed_at, approved_at,
        prepared_at, renamed_at, metadata_generated_at, uploaded_at,
        torrent_paths, nfo_path, screenshot_urls, metadata, tracker_results
    )
    VALUES (
        $1, $2, $3, $4::forgecast.file_entry_status, $5, $6,
        $7, $8, $9, $10, $11,
        $12, $13, $14, $15,
        $16, $17, $18, $19, $20
    )
    ON CONFLICT (id) DO UPDATE SET
        file_path = EXCLUDED.file_path,
        release_name = EXCLUDED.release_name,
        status = EXCLUDED.status,
        error_kind = EXCLUDED.error_kind,
        error_message = EXCLUDED.error_message,
        updated_at = EXCLUDED.updated_at,
        scanned_at = EXCLUDED.scanned_at,
        analyzed_at = EXCLUDED.analyzed_at,
        approved_at = EXCLUDED.approved_at,
        prepared_at = EXCLUDED.prepared_at,
        renamed_at = EXCLUDED.renamed_at,
        metadata_generated_at = EXCLUDED.metadata_generated_at,
        uploaded_at = EXCLUDED.uploaded_at,
        torrent_paths = EXCLUDED.torrent_paths,
        nfo_path = EXCLUDED.nfo_path,
        screenshot_urls = EXCLUDED.screenshot_urls,
        metadata = EXCLUDED.metadata,
        tracker_results = EXCLUDED.tracker_results
";

const SELECT_BY_ID_SQL: &str = "SELECT *, status::TEXT AS status_text FROM forgecast.file_entries WHERE id = $1";
const SELECT_BY_PATH_SQL: &str =
    "SELECT *, status::TEXT AS status_text FROM forgecast.file_entries WHERE file_path = $1 ORDER BY created_at DESC LIMIT 1";

/// Database-backed repository for [`FileEntry`] rows.
#[derive(Clone)]
pub struct FileEntryStore {
    pool: PgPool,
}

impl FileEntryStore {
    /// Wrap an already-migrated connection pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert or fully overwrite a [`FileEntry`] row.
    ///
    /// # Errors
    ///
    /// Returns [`DataError::Database`] if the write fails.
    pub async fn save(&self, entry: &FileEntry) -> DataResult<()> {
        let error_kind = entry.error_kind.map(ErrorKind::as_str);
        sqlx::query(UPSERT_SQL)
            .bind(entry.id)
            .bind(&entry.file_path)
            .bind(&entry.release_name)
            .bind(file_entry_status_label(entry.status))
            .bind(error_kind)
            .bind(&entry.error_message)
            .bind(entry.created_at)
            .bind(entry.updated_at)
            .bind(entry.scanned_at)
            .bind(entry.analyzed_at)
            .bind(entry.approved_at)
            .bind(entry.prepared_at)
            .bind(entry.renamed_at)
            .bind(entry.metadata_generated_at)
            .bind(entry.uploaded_at)
            .bind(Json(&entry.torrent_paths))
            .bind(&entry.nfo_path)
            .bind(Json(&entry.screenshot_urls))
            .bind(Json(&entry.metadata))
            .bind(Json(&entry.tracker_results))
            .execute(&self.pool)
            .await
            .map_err(db("save_file_entry"))?;
        Ok(())
    }

    /// Load a file entry by its id.
    ///
    /// # Errors
    ///
    /// Returns [`DataError::NotFound`] if no row matches, or
    /// [`DataError::Database`]/[`DataError::Decode`] on failure.
    pub async fn get_by_id(&self, id: uuid::Uuid) -> DataResult<FileEntry> {
        let row = sqlx::query(SELECT_BY_ID_SQL)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db("get_file_entry_by_id"))?
            .ok_or_else(|| DataError::NotFound {
                entity: "file_entry",
                id: id.to_string(),
            })?;
        decode_row(&row)
    }

    /// Load the most recent file entry for a given source path, active or not.
    ///
    /// # Errors
    ///
    /// Returns [`DataError::NotFound`] if no row matches.
    pub async fn get_by_path(&self, file_path: &str) -> DataResult<Option<FileEntry>> {
        let row = sqlx::query(SELECT_BY_PATH_SQL)
            .bind(file_path)
            .fetch_optional(&self.pool)
            .await
            .map_err(db("get_file_entry_by_path"))?;
        row.as_ref().map(decode_row).transpose()
    }
}

fn decode_row(row: &sqlx::postgres::PgRow) -> DataResult<FileEntry> {
    let status_text: String = row.try_get("status_text").map_err(db("decode_file_entry"))?;
    let error_kind_text: Option<String> = row.try_get("error_kind").map_err(db("decode_file_entry"))?;
    let Json(torrent_paths): Json<BTreeMap<String, String>> =
        row.try_get("torrent_paths").map_err(db("decode_file_entry"))?;
    let Json(screenshot_urls): Json<Vec<String>> = row.try_get("screenshot_urls").map_err(db("decode_file_entry"))?;
    let Json(metadata): Json<serde_json::Value> = row.try_get("metadata").map_err(db("decode_file_entry"))?;
    let Json(tracker_results): Json<Vec<TrackerResult>> =
        row.try_get("tracker_results").map_err(db("decode_file_entry"))?;

    Ok(FileEntry {
        id: row.try_get("id").map_err(db("decode_file_entry"))?,
        file_path: row.try_get("file_path").map_err(db("decode_file_entry"))?,
        release_name: row.try_get("release_name").map_err(db("decode_file_entry"))?,
        status: parse_file_entry_status(&status_text),
        error_kind: error_kind_text.as_deref().map(parse_error_kind),
        error_message: row.try_get("error_message").map_err(db("decode_file_entry"))?,
        created_at: row.try_get("created_at").map_err(db("decode_file_entry"))?,
        updated_at: row.try_get("updated_at").map_err(db("decode_file_entry"))?,
        scanned_at: row.try_get("scanned_at").map_err(db("decode_file_entry"))?,
        analyzed_at: row.try_get("analyzed_at").map_err(db("decode_file_entry"))?,
        approved_at: row.try_get("approved_at").map_err(db("decode_file_entry"))?,
        prepared_at: row.try_get("prepared_at").map_err(db("decode_file_entry"))?,
        renamed_at: row.try_get("renamed_at").map_err(db("decode_file_entry"))?,
        metadata_generated_at: row.try_get("metadata_generated_at").map_err(db("decode_file_entry"))?,
        uploaded_at: row.try_get("uploaded_at").map_err(db("decode_file_entry"))?,
        torrent_paths,
        nfo_path: row.try_get("nfo_path").map_err(db("decode_file_entry"))?,
        screenshot_urls,
        metadata,
        tracker_results,
    })
}

fn parse_error_kind(label: &str) -> ErrorKind {
    match label {
        "network_transient" => ErrorKind::NetworkTransient,
        "rate_limited" => ErrorKind::RateLimited,
        "circuit_open" => ErrorKind::CircuitOpen,
        "auth_rejected" => ErrorKind::AuthRejected,
        "validation_error" => ErrorKind::ValidationError,
        "duplicate_release" => ErrorKind::DuplicateRelease,
        "tracker_permanent" => ErrorKind::TrackerPermanent,
        "external_unavailable" => ErrorKind::ExternalUnavailable,
        "user_cancelled" => ErrorKind::UserCancelled,
        _ => ErrorKind::InternalInvariant,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_kind_round_trips_through_its_label() {
        for kind in [
            ErrorKind::NetworkTransient,
            ErrorKind::RateLimited,
            ErrorKind::CircuitOpen,
            ErrorKind::AuthRejected,
            ErrorKind::ValidationError,
            ErrorKind::DuplicateRelease,
            ErrorKind::TrackerPermanent,
            ErrorKind::ExternalUnavailable,
            ErrorKind::InternalInvariant,
            ErrorKind::UserCancelled,
        ] {
            assert_eq!(parse_error_kind(kind.as_str()), kind);
        }
    }

    #[test]
    fn status_enum_cast_matches_row_decode_expectations() {
        assert_eq!(FileEntryStatus::Pending, parse_file_entry_status_for_test("pending"));
    }

    fn parse_file_entry_status_for_test(label: &str) -> FileEntryStatus {
        crate::status_codec::parse_file_entry_status(label)
    }
}
