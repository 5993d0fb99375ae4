//! Command-line and environment layer (highest precedence).

use std::path::PathBuf;

use clap::Args;
use serde::Serialize;

/// Settings taken from flags or their environment variables.
///
/// Only values that were actually given are serialized, so an absent flag
/// leaves the lower layers untouched.
#[derive(Debug, Clone, Default, Args, Serialize)]
pub struct ConfigOverrides {
    /// Directory holding one subdirectory per live stream
    #[arg(long, env = "HLS_DIR")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub root_dir: Option<PathBuf>,

    /// Base URL of the HLS origin server
    #[arg(long, env = "MEDIAMTX_HLS_URL")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub origin_url: Option<String>,

    /// Top-level playlist filename inside each stream directory
    #[arg(long, env = "MANIFEST_TOP_PLAYLIST")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_playlist: Option<String>,

    /// Epoch length in milliseconds
    #[arg(long, env = "MANIFEST_EPOCH_MS")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub epoch_ms: Option<u64>,

    /// Pause between scan cycles in milliseconds
    #[arg(long, env = "MANIFEST_SCAN_INTERVAL_MS")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scan_interval_ms: Option<u64>,

    /// A stream with no segment write for this long is inactive
    #[arg(long, env = "MANIFEST_STALE_AFTER_MS")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stale_after_ms: Option<u64>,

    /// Per-request timeout for playlist fetches
    #[arg(long, env = "MANIFEST_FETCH_TIMEOUT_MS")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fetch_timeout_ms: Option<u64>,

    /// Bound on a whole publish attempt across all sinks
    #[arg(long, env = "MANIFEST_PUBLISH_DEADLINE_MS")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub publish_deadline_ms: Option<u64>,

    /// Relay WebSocket URLs, comma separated
    #[arg(long = "relay", env = "MANIFEST_RELAYS", value_delimiter = ',')]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub relays: Option<Vec<String>>,

    /// Ed25519 secret key (64 hex characters or base64 of 32 bytes)
    #[arg(long, env = "MANIFEST_SECRET_KEY_HEX", hide_env_values = true)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signing_secret: Option<String>,

    /// Legacy `{publicKey, privateKey}` key file consulted when no secret is set
    #[arg(long, env = "MANIFEST_LEGACY_KEY_FILE")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub legacy_key_file: Option<PathBuf>,

    /// Also write each manifest as JSON under this directory
    #[arg(long, env = "MANIFEST_OUT_DIR")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub manifest_dir: Option<PathBuf>,

    /// Port of the introspection HTTP server
    #[arg(long, env = "MANIFEST_HTTP_PORT")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub http_port: Option<u16>,
}
