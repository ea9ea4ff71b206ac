//! Wires every crate in the workspace together into a running service:
//! config, telemetry, persistence, external-service contracts, the tracker
//! layer, and finally the queue worker and batch controller (spec section
//! 10.4's "external collaborator owns wiring" contract).

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::Duration;
use forgecast_config::CoreConfig;
use forgecast_external::{CliMediaInfoProvider, FlaresolverrClient, HttpImageHost, LocalTorrentClient, PlainTextRenderer, TmdbClient};
use forgecast_pipeline::{ExternalServices, TrackerHandle};
use forgecast_queue::{BatchController, QueueWorker};
use forgecast_resilience::ServiceRegistry;
use forgecast_telemetry::{LoggingConfig, Metrics};
use forgecast_tracker::TrackerAdapter;
use sqlx::postgres::PgPoolOptions;
use tokio::sync::watch;
use tracing::{info, warn};

use crate::cli::Cli;
use crate::discover;
use crate::error::{AppError, AppResult};

const DB_MAX_CONNECTIONS: u32 = 16;
const DB_ACQUIRE_TIMEOUT: StdDuration = StdDuration::from_secs(10);

/// Load configuration, wire every dependency, and run until `Ctrl-C`.
///
/// # Errors
///
/// Returns an error if configuration, the database connection, or telemetry
/// cannot be established.
pub async fn run(cli: Cli) -> AppResult<()> {
    let config = forgecast_config::load_from_path(&cli.config).map_err(|source| AppError::Config { source })?;

    let mut logging = LoggingConfig::default();
    if let Some(format) = cli.log_format {
        logging.format = format.into();
    }
    forgecast_telemetry::init_logging(&logging).map_err(|source| AppError::Telemetry { source })?;
    info!(config_path = %cli.config.display(), "forgecast starting");

    let metrics = Metrics::new().map_err(|source| AppError::Telemetry { source })?;
    let events = forgecast_events::EventBus::new();
    let registry = Arc::new(ServiceRegistry::new(metrics.clone()));

    for (key, bucket) in &config.rate_limits {
        registry.rate_limiter().configure(key, (*bucket).into());
    }

    let pool = PgPoolOptions::new()
        .max_connections(DB_MAX_CONNECTIONS)
        .acquire_timeout(DB_ACQUIRE_TIMEOUT)
        .connect(&config.database_url)
        .await
        .map_err(|source| AppError::DatabaseConnect { source })?;
    let stores = forgecast_data::connect(pool).await.map_err(|source| AppError::Migrate { source })?;

    let services = build_external_services(&config, &registry, &stores.tmdb_cache)?;

    let worker = QueueWorker::new(
        stores.queue.clone(),
        stores.file_entries.clone(),
        Arc::new(services),
        events.clone(),
        metrics.clone(),
        config.worker_concurrency,
    );
    let batches = BatchController::new(stores.queue.clone(), stores.batches.clone(), events.clone());

    let grace = Duration::seconds(i64::try_from(config.policy.crash_recovery_grace_secs).unwrap_or(i64::MAX));
    match worker.recover_crashed_jobs(grace).await {
        Ok(recovered) if !recovered.is_empty() => info!(count = recovered.len(), "requeued jobs orphaned by a crashed worker"),
        Ok(_) => {}
        Err(source) => warn!(%source, "failed to recover crashed jobs at startup"),
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let batch_watcher = batches.spawn_watcher();
    let input_media_path = PathBuf::from(&config.input_media_path);
    let discover_task = tokio::spawn({
        let file_entries = stores.file_entries.clone();
        let queue = stores.queue.clone();
        let shutdown_rx = shutdown_rx.clone();
        async move { discover::run(&input_media_path, &file_entries, &queue, shutdown_rx).await }
    });
    let worker_task = tokio::spawn({
        let shutdown_rx = shutdown_rx.clone();
        async move { worker.run(shutdown_rx).await }
    });

    tokio::signal::ctrl_c().await.ok();
    info!("shutdown signal received");
    let _ = shutdown_tx.send(true);

    let _ = worker_task.await;
    let _ = discover_task.await;
    batch_watcher.abort();
    if let Err(source) = batch_watcher.await {
        if !source.is_cancelled() {
            warn!(%source, "batch watcher task join failed");
        }
    }

    Ok(())
}

fn build_external_services(
    config: &CoreConfig,
    registry: &Arc<ServiceRegistry>,
    tmdb_cache: &forgecast_data::TmdbCacheStore,
) -> AppResult<ExternalServices> {
    let http = reqwest::Client::new();

    let metadata = Arc::new(TmdbClient::new(
        http.clone(),
        config.tmdb_api_key.clone().unwrap_or_default(),
        tmdb_cache.clone(),
        config.tmdb_cache_ttl_days,
        Arc::clone(registry),
    ));
    let media_info = Arc::new(CliMediaInfoProvider::new());
    let cloudflare = config
        .flaresolverr_url
        .clone()
        .map(|base_url| Arc::new(FlaresolverrClient::new(http.clone(), base_url, Arc::clone(registry))) as Arc<dyn forgecast_external::CloudflareBypassClient>);
    let torrent = Arc::new(LocalTorrentClient::new(http.clone(), config.torrent_webui_url.clone().unwrap_or_default(), Arc::clone(registry)));
    let image_host = Arc::new(HttpImageHost::new(http.clone(), config.image_host_upload_url.clone().unwrap_or_default(), Arc::clone(registry)));
    let nfo_renderer = Arc::new(PlainTextRenderer);

    let mut trackers = BTreeMap::new();
    for tracker_entry in &config.trackers {
        let schema = forgecast_tracker::parse(&tracker_entry.schema).map_err(|source| AppError::TrackerSchema {
            slug: tracker_entry.slug.clone(),
            source,
        })?;
        let adapter = Arc::new(TrackerAdapter::new(schema, tracker_entry.credentials.clone(), http.clone(), Arc::clone(registry)));
        trackers.insert(
            tracker_entry.slug.clone(),
            TrackerHandle {
                adapter,
                enabled: tracker_entry.enabled,
                skip_on_duplicate: tracker_entry.skip_on_duplicate,
            },
        );
    }

    Ok(ExternalServices {
        metadata,
        media_info,
        cloudflare,
        torrent,
        image_host,
        nfo_renderer,
        trackers,
        output_dir: config.output_dir.clone(),
        policy: config.policy,
    })
}
