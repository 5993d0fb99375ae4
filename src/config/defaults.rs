//! Built-in defaults (lowest layer).

use std::path::PathBuf;

use attest_protocol::DEFAULT_EPOCH_MS;

use super::AttestConfig;

pub const DEFAULT_ROOT_DIR: &str = "/hls";
pub const DEFAULT_ORIGIN_URL: &str = "http://mediamtx:8880";
pub const DEFAULT_TOP_PLAYLIST: &str = "index.m3u8";
pub const DEFAULT_SCAN_INTERVAL_MS: u64 = 2_000;
pub const DEFAULT_STALE_AFTER_MS: u64 = 30_000;
pub const DEFAULT_FETCH_TIMEOUT_MS: u64 = 2_500;
pub const DEFAULT_PUBLISH_DEADLINE_MS: u64 = 5_000;
pub const DEFAULT_RELAY: &str = "ws://relay:8080";
pub const DEFAULT_LEGACY_KEY_FILE: &str = "keys.json";
pub const DEFAULT_HTTP_PORT: u16 = 3001;

impl Default for AttestConfig {
    fn default() -> Self {
        Self {
            root_dir: PathBuf::from(DEFAULT_ROOT_DIR),
            origin_url: DEFAULT_ORIGIN_URL.to_string(),
            top_playlist: DEFAULT_TOP_PLAYLIST.to_string(),
            epoch_ms: DEFAULT_EPOCH_MS,
            scan_interval_ms: DEFAULT_SCAN_INTERVAL_MS,
            stale_after_ms: DEFAULT_STALE_AFTER_MS,
            fetch_timeout_ms: DEFAULT_FETCH_TIMEOUT_MS,
            publish_deadline_ms: DEFAULT_PUBLISH_DEADLINE_MS,
            relays: vec![DEFAULT_RELAY.to_string()],
            signing_secret: None,
            legacy_key_file: PathBuf::from(DEFAULT_LEGACY_KEY_FILE),
            manifest_dir: None,
            http_port: DEFAULT_HTTP_PORT,
        }
    }
}
