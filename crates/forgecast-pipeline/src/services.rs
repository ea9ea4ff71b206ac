//! The `ExternalServices` bundle every stage function receives: the
//! component-D contracts, the per-tracker adapters, and the policy knobs
//! needed to resolve the Upload stage's partial-failure rule.

use std::collections::BTreeMap;
use std::sync::Arc;

use forgecast_config::PolicySettings;
use forgecast_external::{CloudflareBypassClient, ImageHost, MediaInfoProvider, MetadataProvider, NfoRenderer, TorrentClient};
use forgecast_tracker::TrackerAdapter;

/// One configured tracker, paired with the enablement flags the Upload
/// stage needs (spec section 4.6 and 4.11).
pub struct TrackerHandle {
    /// The schema-driven adapter for this tracker.
    pub adapter: Arc<TrackerAdapter>,
    /// Whether this tracker participates in the Upload stage at all.
    pub enabled: bool,
    /// Whether a `duplicate_check` match short-circuits the upload as
    /// `SKIPPED_DUPLICATE` rather than proceeding.
    pub skip_on_duplicate: bool,
}

/// Every external collaborator the seven pipeline stages depend on (spec
/// section 4.6), bundled so stage functions take one argument beyond the
/// `FileEntry` they advance.
pub struct ExternalServices {
    /// Fetches TMDB movie metadata.
    pub metadata: Arc<dyn MetadataProvider>,
    /// Analyzes a media file's technical characteristics.
    pub media_info: Arc<dyn MediaInfoProvider>,
    /// Obtains Cloudflare-bypass sessions; `None` when no tracker this
    /// deployment uses declares `cloudflare.enabled`.
    pub cloudflare: Option<Arc<dyn CloudflareBypassClient>>,
    /// Authors `.torrent` files and reports on seeding status.
    pub torrent: Arc<dyn TorrentClient>,
    /// Uploads screenshots to a public image host.
    pub image_host: Arc<dyn ImageHost>,
    /// Renders the NFO/BBCode presentation text.
    pub nfo_renderer: Arc<dyn NfoRenderer>,
    /// Configured trackers, keyed by slug.
    pub trackers: BTreeMap<String, TrackerHandle>,
    /// Directory renamed media and generated artifacts are written under.
    pub output_dir: String,
    /// Pipeline-wide policy knobs (spec section 9's resolved open questions).
    pub policy: PolicySettings,
}
