//! Segment digesting from the local stream directory.

use std::path::{Path, PathBuf};

use attest_playlist::{is_contained_path, strip_query, MediaPlaylist};
use attest_protocol::SegmentEntry;
use tokio::fs;
use tracing::debug;

/// Digests for the segments of one media playlist that exist on disk.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DigestedSegments {
    pub init_segment: Option<SegmentEntry>,
    pub segments: Vec<SegmentEntry>,
}

impl DigestedSegments {
    /// No media segments were readable. An init segment alone does not count.
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }
}

/// Digest every segment (and the init segment) listed in `playlist`, read
/// from `stream_dir`. Entries that are missing, unreadable, not regular
/// files, or would resolve outside `stream_dir` are left out; playlist
/// order is kept.
pub async fn digest_segments(stream_dir: &Path, playlist: &MediaPlaylist) -> DigestedSegments {
    let init_segment = match &playlist.init_segment {
        Some(uri) => digest_one(stream_dir, uri).await,
        None => None,
    };

    let mut segments = Vec::with_capacity(playlist.segments.len());
    for uri in &playlist.segments {
        if let Some(entry) = digest_one(stream_dir, uri).await {
            segments.push(entry);
        }
    }

    DigestedSegments {
        init_segment,
        segments,
    }
}

/// Local path for a playlist URI, or `None` if it is not contained.
pub fn local_path(stream_dir: &Path, uri: &str) -> Option<PathBuf> {
    if !is_contained_path(uri) {
        return None;
    }
    Some(stream_dir.join(strip_query(uri)))
}

async fn digest_one(stream_dir: &Path, uri: &str) -> Option<SegmentEntry> {
    let Some(path) = local_path(stream_dir, uri) else {
        debug!(uri, "skipping segment outside stream directory");
        return None;
    };

    match fs::metadata(&path).await {
        Ok(metadata) if metadata.is_file() => {}
        Ok(_) => return None,
        Err(e) => {
            debug!(path = %path.display(), error = %e, "segment not available");
            return None;
        }
    }

    match fs::read(&path).await {
        Ok(bytes) => Some(SegmentEntry::from_bytes(uri, &bytes)),
        Err(e) => {
            debug!(path = %path.display(), error = %e, "segment vanished before read");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use attest_protocol::sha256_hex;
    use tempfile::TempDir;

    fn playlist(init: Option<&str>, segments: &[&str]) -> MediaPlaylist {
        MediaPlaylist {
            init_segment: init.map(str::to_string),
            segments: segments.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[tokio::test]
    async fn test_digests_present_segments_in_order() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("init.mp4"), b"init").unwrap();
        std::fs::write(dir.path().join("seg2.m4s"), b"two").unwrap();
        std::fs::write(dir.path().join("seg1.m4s"), b"one").unwrap();

        let digested = digest_segments(
            dir.path(),
            &playlist(Some("init.mp4"), &["seg1.m4s", "gone.m4s", "seg2.m4s"]),
        )
        .await;

        let uris: Vec<_> = digested.segments.iter().map(|s| s.uri.as_str()).collect();
        assert_eq!(uris, vec!["seg1.m4s", "seg2.m4s"]);
        assert_eq!(digested.segments[0].digest, sha256_hex(b"one"));
        assert_eq!(digested.segments[0].byte_length, 3);
        assert_eq!(digested.init_segment.unwrap().uri, "init.mp4");
    }

    #[tokio::test]
    async fn test_query_stripped_for_lookup_but_kept_in_uri() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("seg1.ts"), b"one").unwrap();

        let digested = digest_segments(dir.path(), &playlist(None, &["seg1.ts?token=abc"])).await;
        assert_eq!(digested.segments.len(), 1);
        assert_eq!(digested.segments[0].uri, "seg1.ts?token=abc");
    }

    #[tokio::test]
    async fn test_escaping_and_non_file_entries_skipped() {
        let root = TempDir::new().unwrap();
        let stream = root.path().join("stream");
        std::fs::create_dir(&stream).unwrap();
        std::fs::create_dir(stream.join("dir.ts")).unwrap();
        std::fs::write(root.path().join("secret.ts"), b"outside").unwrap();

        let digested = digest_segments(
            &stream,
            &playlist(None, &["../secret.ts", "dir.ts", "/etc/hosts.ts"]),
        )
        .await;
        assert!(digested.is_empty());
    }

    #[tokio::test]
    async fn test_init_alone_is_empty() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("init.mp4"), b"init").unwrap();

        let media = playlist(Some("init.mp4"), &["seg1.m4s"]);
        let digested = digest_segments(dir.path(), &media).await;
        assert!(digested.init_segment.is_some());
        assert!(digested.is_empty());
    }
}
