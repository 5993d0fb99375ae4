//! Active stream discovery.

use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use attest_playlist::{has_extension, SEGMENT_EXTENSIONS};
use attest_protocol::{decode_dir_name, StreamDir};
use tokio::fs;
use tracing::{debug, trace};

/// A stream directory with recent segment writes.
#[derive(Debug, Clone)]
pub struct ActiveStream {
    /// Decoded owner, stream name and rendition hint
    pub dir: StreamDir,

    /// Directory name as found on disk (also the origin path component)
    pub dir_name: String,

    /// Absolute path of the directory
    pub path: PathBuf,

    /// Most recent segment modification time
    pub last_write: SystemTime,
}

/// List the immediate subdirectories of `root` that decode as stream
/// directories and have a segment file modified within `stale_after` of
/// `now`. An unreadable root yields an empty list. Results are sorted by
/// directory name.
pub async fn scan_active_streams(
    root: &Path,
    stale_after: Duration,
    now: SystemTime,
) -> Vec<ActiveStream> {
    let mut entries = match fs::read_dir(root).await {
        Ok(entries) => entries,
        Err(e) => {
            debug!(root = %root.display(), error = %e, "stream root not readable");
            return Vec::new();
        }
    };

    let mut active = Vec::new();
    loop {
        let entry = match entries.next_entry().await {
            Ok(Some(entry)) => entry,
            Ok(None) => break,
            Err(e) => {
                debug!(root = %root.display(), error = %e, "stream root listing interrupted");
                break;
            }
        };

        let is_dir = entry.file_type().await.map(|t| t.is_dir()).unwrap_or(false);
        if !is_dir {
            continue;
        }

        let Ok(dir_name) = entry.file_name().into_string() else {
            continue;
        };
        let dir = match decode_dir_name(&dir_name) {
            Ok(dir) => dir,
            Err(e) => {
                trace!(dir = %dir_name, error = %e, "skipping non-stream directory");
                continue;
            }
        };

        let path = entry.path();
        let Some(last_write) = latest_segment_write(&path).await else {
            continue;
        };
        if is_stale(last_write, stale_after, now) {
            trace!(dir = %dir_name, "stream is stale");
            continue;
        }

        active.push(ActiveStream {
            dir,
            dir_name,
            path,
            last_write,
        });
    }

    active.sort_by(|a, b| a.dir_name.cmp(&b.dir_name));
    active
}

/// Newest modification time among segment-like files directly in `dir`.
async fn latest_segment_write(dir: &Path) -> Option<SystemTime> {
    let mut entries = fs::read_dir(dir).await.ok()?;
    let mut latest: Option<SystemTime> = None;

    while let Ok(Some(entry)) = entries.next_entry().await {
        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            continue;
        };
        if !has_extension(name, SEGMENT_EXTENSIONS) {
            continue;
        }
        let Ok(metadata) = entry.metadata().await else {
            continue;
        };
        if !metadata.is_file() {
            continue;
        }
        if let Ok(modified) = metadata.modified() {
            latest = Some(latest.map_or(modified, |l| l.max(modified)));
        }
    }

    latest
}

/// A write in the future (clock skew) counts as fresh.
fn is_stale(last_write: SystemTime, stale_after: Duration, now: SystemTime) -> bool {
    match now.duration_since(last_write) {
        Ok(age) => age > stale_after,
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const OWNER: &str = "0f1e2d3c4b5a69788796a5b4c3d2e1f00f1e2d3c4b5a69788796a5b4c3d2e1f0";

    fn make_stream(root: &Path, name: &str, files: &[&str]) -> PathBuf {
        let dir = root.join(name);
        std::fs::create_dir_all(&dir).unwrap();
        for file in files {
            std::fs::write(dir.join(file), b"data").unwrap();
        }
        dir
    }

    #[tokio::test]
    async fn test_missing_root_is_empty() {
        let streams = scan_active_streams(
            Path::new("/nonexistent/hls-root"),
            Duration::from_secs(30),
            SystemTime::now(),
        )
        .await;
        assert!(streams.is_empty());
    }

    #[tokio::test]
    async fn test_finds_active_stream_dirs() {
        let root = TempDir::new().unwrap();
        make_stream(root.path(), &format!("{OWNER}--show__r720p"), &["seg1.ts", "index.m3u8"]);
        make_stream(root.path(), &format!("{OWNER}--talk"), &["init.mp4", "seg1.m4s"]);
        // Not a stream dir name
        make_stream(root.path(), "lost+found", &["seg1.ts"]);
        // No segment files at all
        make_stream(root.path(), &format!("{OWNER}--idle"), &["index.m3u8"]);
        // A stray file in the root
        std::fs::write(root.path().join(format!("{OWNER}--file")), b"x").unwrap();

        let streams =
            scan_active_streams(root.path(), Duration::from_secs(30), SystemTime::now()).await;

        let names: Vec<_> = streams.iter().map(|s| s.dir.identity.stream_name()).collect();
        assert_eq!(names, vec!["show", "talk"]);
        assert_eq!(streams[0].dir.rendition_hint.as_deref(), Some("720p"));
        assert_eq!(streams[1].dir.rendition_hint, None);
        assert_eq!(streams[0].path, root.path().join(&streams[0].dir_name));
    }

    #[tokio::test]
    async fn test_stale_stream_excluded() {
        let root = TempDir::new().unwrap();
        make_stream(root.path(), &format!("{OWNER}--show"), &["seg1.ts"]);

        let later = SystemTime::now() + Duration::from_secs(60);
        let streams = scan_active_streams(root.path(), Duration::from_secs(30), later).await;
        assert!(streams.is_empty());

        let streams = scan_active_streams(root.path(), Duration::from_secs(120), later).await;
        assert_eq!(streams.len(), 1);
    }

    #[test]
    fn test_future_write_is_fresh() {
        let now = SystemTime::now();
        assert!(!is_stale(now + Duration::from_secs(5), Duration::from_secs(1), now));
        assert!(is_stale(now - Duration::from_secs(5), Duration::from_secs(1), now));
    }
}
