//! The core configuration mapping described in spec section 6: a plain,
//! deserializable struct handed to the core by its external collaborator
//! (the CLI binary). The core itself never parses CLI args or env vars.

use std::collections::BTreeMap;
use std::path::PathBuf;

use forgecast_resilience::BucketSpec;
use serde::{Deserialize, Serialize};

/// Default crash-recovery grace period (see `DESIGN.md` open question #3).
pub const DEFAULT_CRASH_RECOVERY_GRACE_SECS: u64 = 300;
/// Default TMDB cache TTL, in days.
pub const DEFAULT_TMDB_CACHE_TTL_DAYS: u32 = 30;
/// Default worker concurrency (serial execution).
pub const DEFAULT_WORKER_CONCURRENCY: u32 = 1;

/// Whether the Approve stage auto-approves or blocks on a human action.
/// Resolves the first open question in spec section 9; default is `Auto`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovePolicy {
    /// The Approve stage always succeeds immediately.
    Auto,
    /// The Approve stage waits for an external approval signal.
    Manual,
}

impl Default for ApprovePolicy {
    fn default() -> Self {
        Self::Auto
    }
}

/// How the Upload stage maps a mix of per-tracker outcomes to the final
/// `FileEntry` status. Resolves the second open question in spec section 9;
/// default is `UploadedIfAnySucceeded`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PartialFailurePolicy {
    /// `UPLOADED` if at least one tracker succeeded (uploaded or skipped as
    /// a duplicate) and no tracker failed with a non-retryable error that the
    /// caller flagged as blocking; otherwise `FAILED`.
    UploadedIfAnySucceeded,
    /// `FAILED` unless every enabled tracker individually succeeded.
    FailedIfAnyFailed,
}

impl Default for PartialFailurePolicy {
    fn default() -> Self {
        Self::UploadedIfAnySucceeded
    }
}

/// Pipeline-wide policy knobs that resolve the spec's open questions.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicySettings {
    /// Approve-stage policy.
    pub approve: ApprovePolicy,
    /// Upload-stage partial-failure mapping.
    pub partial_failure: PartialFailurePolicy,
    /// Grace period after which a `RUNNING` job with no owning process is
    /// considered crashed and reset to `QUEUED`.
    pub crash_recovery_grace_secs: u64,
}

impl Default for PolicySettings {
    fn default() -> Self {
        Self {
            approve: ApprovePolicy::default(),
            partial_failure: PartialFailurePolicy::default(),
            crash_recovery_grace_secs: DEFAULT_CRASH_RECOVERY_GRACE_SECS,
        }
    }
}

/// Override for a single named rate-limit bucket (serializable mirror of
/// [`forgecast_resilience::BucketSpec`]).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RateLimitOverride {
    /// Bucket capacity (burst size).
    pub capacity: f64,
    /// Tokens refilled per second.
    pub refill_rate: f64,
}

impl From<RateLimitOverride> for BucketSpec {
    fn from(value: RateLimitOverride) -> Self {
        Self::new(value.capacity, value.refill_rate)
    }
}

/// Per-tracker credentials; shape depends on the tracker's declared `auth.type`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerCredentials {
    /// Bearer token or API key value.
    pub api_key: Option<String>,
    /// Tracker passkey, used by passkey-style auth and announce URLs.
    pub passkey: Option<String>,
    /// Username, for cookie-based auth flows.
    pub username: Option<String>,
    /// Password, for cookie-based auth flows.
    pub password: Option<String>,
}

/// One configured tracker: where its declarative schema document lives,
/// credentials, and enablement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackerEntry {
    /// Tracker slug; must be unique across the configuration.
    pub slug: String,
    /// Whether this tracker participates in the Upload stage.
    pub enabled: bool,
    /// Runtime credentials, layered on top of the schema's `auth` section.
    pub credentials: TrackerCredentials,
    /// Path to this tracker's schema document (spec section 4.5), resolved
    /// relative to the directory containing the main configuration file.
    /// Loaded and validated independently of `CoreConfig`'s own document,
    /// one file per tracker (spec section 10.4).
    pub schema_path: PathBuf,
    /// Raw declarative schema document, kept as an opaque value until
    /// `forgecast-tracker` parses it. Populated by `load_from_path` after
    /// reading `schema_path`; left `Null` by `load_from_str` alone, which
    /// has no base directory to resolve the path against.
    #[serde(skip, default = "null_schema")]
    pub schema: serde_yaml::Value,
    /// Skip the Upload stage for this tracker when `duplicate_check` matches.
    #[serde(default = "default_true")]
    pub skip_on_duplicate: bool,
}

fn null_schema() -> serde_yaml::Value {
    serde_yaml::Value::Null
}

const fn default_true() -> bool {
    true
}

/// The full core configuration mapping (spec section 6).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    /// Postgres connection string for the persistence layer.
    pub database_url: String,
    /// Directory scanned for new media files.
    pub input_media_path: String,
    /// Directory renamed media and generated artifacts are written under.
    pub output_dir: String,
    /// Number of file entries that may be in-flight concurrently.
    pub worker_concurrency: u32,
    /// Base URL of a FlareSolverr-compatible Cloudflare bypass service.
    pub flaresolverr_url: Option<String>,
    /// Base URL of the multipart screenshot upload endpoint the Prepare
    /// stage's `ImageHost` posts to.
    pub image_host_upload_url: Option<String>,
    /// Base URL of a qBittorrent-Web-API-compatible instance the
    /// `TorrentClient` uses for seeding status after authoring a `.torrent`.
    pub torrent_webui_url: Option<String>,
    /// TMDB API key.
    pub tmdb_api_key: Option<String>,
    /// TMDB cache entry lifetime, in days.
    pub tmdb_cache_ttl_days: u32,
    /// Named rate-limit overrides, keyed by `(service, action)` string.
    pub rate_limits: BTreeMap<String, RateLimitOverride>,
    /// Configured trackers.
    pub trackers: Vec<TrackerEntry>,
    /// Pipeline policy knobs.
    pub policy: PolicySettings,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            database_url: String::new(),
            input_media_path: String::new(),
            output_dir: String::new(),
            worker_concurrency: DEFAULT_WORKER_CONCURRENCY,
            flaresolverr_url: None,
            image_host_upload_url: None,
            torrent_webui_url: None,
            tmdb_api_key: None,
            tmdb_cache_ttl_days: DEFAULT_TMDB_CACHE_TTL_DAYS,
            rate_limits: BTreeMap::new(),
            trackers: Vec::new(),
            policy: PolicySettings::default(),
        }
    }
}
