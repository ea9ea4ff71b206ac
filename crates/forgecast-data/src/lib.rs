#![forbid(unsafe_code)]
#![deny(
    warnings,
    dead_code,
    unused,
    unused_imports,
    unused_must_use,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    clippy::cargo,
    clippy::nursery,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::multiple_crate_versions)]

//! Postgres-backed persistence for pipeline state (components G, H, J):
//! [`FileEntryStore`], [`JobQueueStore`], [`BatchStore`], [`TmdbCacheStore`],
//! all built on `sqlx` over a single shared [`sqlx::PgPool`].

pub mod batch_store;
pub mod error;
pub mod file_entry_store;
pub mod queue_store;
mod status_codec;
pub mod tmdb_cache_store;

pub use batch_store::BatchStore;
pub use error::{DataError, DataResult};
pub use file_entry_store::FileEntryStore;
pub use queue_store::JobQueueStore;
pub use tmdb_cache_store::TmdbCacheStore;

use sqlx::PgPool;

/// Run pending migrations against `pool` and construct every store over it.
///
/// # Errors
///
/// Returns an error if migrations fail to apply.
pub async fn connect(pool: PgPool) -> Result<Stores, sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(&pool).await?;
    Ok(Stores {
        file_entries: FileEntryStore::new(pool.clone()),
        queue: JobQueueStore::new(pool.clone()),
        batches: BatchStore::new(pool.clone()),
        tmdb_cache: TmdbCacheStore::new(pool),
    })
}

/// Every store, constructed over one shared pool.
#[derive(Clone)]
pub struct Stores {
    /// File entry repository.
    pub file_entries: FileEntryStore,
    /// Job queue repository and dispatch surface.
    pub queue: JobQueueStore,
    /// Batch job repository.
    pub batches: BatchStore,
    /// TMDB metadata cache repository.
    pub tmdb_cache: TmdbCacheStore,
}
