//! Playlist fetching and master/media resolution.

use std::time::Duration;

use attest_playlist::{is_contained_path, MediaPlaylist, Resolution, PLAYLIST_EXTENSION};
use thiserror::Error;
use tracing::debug;
use url::Url;

/// Rendition id used when neither a hint nor a playlist filename applies.
pub const FALLBACK_RENDITION: &str = "index";

/// Playlist fetch errors. The scheduler treats all of them as "no data".
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("invalid origin URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("origin URL cannot carry a path: {0}")]
    NotABase(String),

    #[error("variant reference escapes the stream directory: {0}")]
    UnsafeReference(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// A media playlist together with the relative path it was served from.
#[derive(Debug, Clone)]
pub struct ResolvedPlaylist {
    pub media: MediaPlaylist,

    /// Playlist path relative to the stream directory (top or variant)
    pub served_from: String,
}

impl ResolvedPlaylist {
    /// Rendition id: the directory hint, otherwise the served playlist's
    /// file stem.
    pub fn rendition_id(&self, hint: Option<&str>) -> String {
        if let Some(hint) = hint {
            return hint.to_string();
        }
        playlist_stem(&self.served_from)
            .map(str::to_string)
            .unwrap_or_else(|| FALLBACK_RENDITION.to_string())
    }
}

fn playlist_stem(path: &str) -> Option<&str> {
    let file = attest_playlist::strip_query(path).rsplit('/').next()?;
    let stem = match file.rsplit_once('.') {
        Some((stem, ext)) if ext.eq_ignore_ascii_case(PLAYLIST_EXTENSION) => stem,
        _ => file,
    };
    (!stem.is_empty()).then_some(stem)
}

/// Fetches `<origin>/<streamDir>/<topPlaylist>` and follows at most one
/// variant reference.
#[derive(Debug, Clone)]
pub struct PlaylistResolver {
    client: reqwest::Client,
    origin: Url,
    top_playlist: String,
    timeout: Duration,
}

impl PlaylistResolver {
    pub fn new(
        origin_url: &str,
        top_playlist: &str,
        timeout: Duration,
    ) -> Result<Self, FetchError> {
        let origin = Url::parse(origin_url)?;
        if origin.cannot_be_a_base() {
            return Err(FetchError::NotABase(origin_url.to_string()));
        }
        Ok(Self {
            client: reqwest::Client::new(),
            origin,
            top_playlist: top_playlist.to_string(),
            timeout,
        })
    }

    /// Resolve the media playlist for one stream directory.
    pub async fn resolve(&self, dir_name: &str) -> Result<ResolvedPlaylist, FetchError> {
        let top = self.fetch(dir_name, &self.top_playlist).await?;

        let variant = match attest_playlist::resolve(&top) {
            Resolution::Media => None,
            Resolution::Variant(variant) => Some(variant.to_string()),
        };

        let (text, served_from) = match variant {
            None => (top, self.top_playlist.clone()),
            Some(variant) => {
                if !is_contained_path(&variant) {
                    return Err(FetchError::UnsafeReference(variant));
                }
                debug!(dir = %dir_name, variant = %variant, "following variant playlist");
                let text = self.fetch(dir_name, &variant).await?;
                (text, variant)
            }
        };

        Ok(ResolvedPlaylist {
            media: MediaPlaylist::parse(&text),
            served_from,
        })
    }

    /// URL of `relative` inside the stream directory. Each path segment is
    /// percent-encoded separately; a query string on `relative` is kept.
    pub fn playlist_url(&self, dir_name: &str, relative: &str) -> Result<Url, FetchError> {
        let (path, query) = match relative.split_once('?') {
            Some((path, query)) => (path, Some(query)),
            None => (relative, None),
        };

        let mut url = self.origin.clone();
        url.set_query(None);
        url.set_fragment(None);
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| FetchError::NotABase(self.origin.to_string()))?;
            segments.pop_if_empty().push(dir_name);
            segments.extend(path.split('/').filter(|s| !s.is_empty() && *s != "."));
        }
        url.set_query(query);
        Ok(url)
    }

    async fn fetch(&self, dir_name: &str, relative: &str) -> Result<String, FetchError> {
        let url = self.playlist_url(dir_name, relative)?;
        let response = self
            .client
            .get(url)
            .timeout(self.timeout)
            .send()
            .await?
            .error_for_status()?;
        Ok(response.text().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolver(origin: &str) -> PlaylistResolver {
        PlaylistResolver::new(origin, "index.m3u8", Duration::from_secs(1)).unwrap()
    }

    #[test]
    fn test_playlist_url_joins_segments() {
        let r = resolver("http://mediamtx:8880");
        assert_eq!(
            r.playlist_url("abc--show", "index.m3u8").unwrap().as_str(),
            "http://mediamtx:8880/abc--show/index.m3u8"
        );

        let r = resolver("http://origin/hls/");
        assert_eq!(
            r.playlist_url("abc--my show", "low/stream.m3u8?v=2").unwrap().as_str(),
            "http://origin/hls/abc--my%20show/low/stream.m3u8?v=2"
        );
    }

    #[test]
    fn test_rejects_non_base_origin() {
        let timeout = Duration::from_secs(1);
        assert!(PlaylistResolver::new("mailto:ops@example.com", "index.m3u8", timeout).is_err());
        assert!(PlaylistResolver::new("not a url", "index.m3u8", timeout).is_err());
    }

    #[test]
    fn test_rendition_id_rules() {
        let resolved = |served: &str| ResolvedPlaylist {
            media: MediaPlaylist::default(),
            served_from: served.to_string(),
        };

        assert_eq!(resolved("video1_stream.m3u8").rendition_id(Some("720p")), "720p");
        assert_eq!(resolved("video1_stream.m3u8").rendition_id(None), "video1_stream");
        assert_eq!(resolved("index.m3u8").rendition_id(None), "index");
        assert_eq!(resolved("low/main.M3U8?x=1").rendition_id(None), "main");
        assert_eq!(resolved(".m3u8").rendition_id(None), FALLBACK_RENDITION);
    }
}
