//! Line classifier.
//!
//! Every playlist line maps to exactly one [`Line`] variant. Higher-level
//! decisions (master vs. media, which URIs to digest) are made over the
//! classified stream, never by matching raw text.

/// Extensions of files treated as media segments.
pub const SEGMENT_EXTENSIONS: &[&str] = &["ts", "m4s", "mp4"];

/// Extension of playlist files.
pub const PLAYLIST_EXTENSION: &str = "m3u8";

const EXTINF: &str = "#EXTINF:";
const EXT_X_MAP: &str = "#EXT-X-MAP:";

/// A classified playlist line.
#[derive(Debug, Clone, PartialEq)]
pub enum Line<'a> {
    /// Empty or whitespace-only
    Blank,

    /// `#EXTINF:<duration>,<title>`; duration is `None` if unparseable
    SegmentDuration(Option<f64>),

    /// `#EXT-X-MAP` carrying a `URI` attribute
    InitSegmentRef(&'a str),

    /// Any other line starting with `#` (tags and comments)
    Comment(&'a str),

    /// URI line with a segment extension
    SegmentRef(&'a str),

    /// Any other URI line (variant playlists, unrecognized media)
    Other(&'a str),
}

impl<'a> Line<'a> {
    /// Whether this line only appears in media playlists.
    pub fn is_media_directive(&self) -> bool {
        matches!(self, Self::SegmentDuration(_) | Self::InitSegmentRef(_))
    }

    /// The URI of an `Other` line that names a playlist.
    pub fn playlist_ref(&self) -> Option<&'a str> {
        match self {
            Self::Other(uri) if has_extension(uri, &[PLAYLIST_EXTENSION]) => Some(*uri),
            _ => None,
        }
    }
}

/// Classify one line. Surrounding whitespace (including `\r`) is ignored.
pub fn classify(raw: &str) -> Line<'_> {
    let line = raw.trim();

    if line.is_empty() {
        return Line::Blank;
    }

    if let Some(rest) = line.strip_prefix(EXTINF) {
        let duration = rest
            .split(',')
            .next()
            .and_then(|d| d.trim().parse::<f64>().ok());
        return Line::SegmentDuration(duration);
    }

    if let Some(attrs) = line.strip_prefix(EXT_X_MAP) {
        return match attribute(attrs, "URI") {
            Some(uri) if !uri.is_empty() => Line::InitSegmentRef(uri),
            _ => Line::Comment(line),
        };
    }

    if line.starts_with('#') {
        return Line::Comment(line);
    }

    if has_extension(line, SEGMENT_EXTENSIONS) {
        Line::SegmentRef(line)
    } else {
        Line::Other(line)
    }
}

/// Case-insensitive extension check on the path part of a URI.
pub fn has_extension(uri: &str, extensions: &[&str]) -> bool {
    let path = strip_query(uri);
    match path.rsplit_once('.') {
        Some((_, ext)) => extensions.iter().any(|e| ext.eq_ignore_ascii_case(e)),
        None => false,
    }
}

/// The URI without any query string or fragment.
pub fn strip_query(uri: &str) -> &str {
    uri.split(['?', '#']).next().unwrap_or(uri)
}

/// Whether `uri` is a plain relative path that stays below the directory it
/// is resolved against: no scheme, no leading slash, no `..` segment.
pub fn is_contained_path(uri: &str) -> bool {
    let path = strip_query(uri);
    if path.is_empty() || path.starts_with(['/', '\\']) {
        return false;
    }
    // `scheme:` prefix (http:, file:, C:) is never a local relative path
    if let Some((scheme, _)) = path.split_once(':') {
        let is_scheme = scheme
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "+-.".contains(c));
        if !scheme.is_empty() && is_scheme {
            return false;
        }
    }
    path.split(['/', '\\']).all(|segment| segment != "..")
}

/// Look up an attribute in an HLS attribute list (`KEY=VALUE,KEY="v,v"`).
pub fn attribute<'a>(list: &'a str, name: &str) -> Option<&'a str> {
    let mut rest = list;
    while !rest.is_empty() {
        let (key, after_key) = rest.split_once('=')?;
        let key = key.trim();

        let (value, remainder) = if let Some(quoted) = after_key.strip_prefix('"') {
            let end = quoted.find('"')?;
            let remainder = quoted[end + 1..].trim_start_matches(',');
            (&quoted[..end], remainder)
        } else {
            match after_key.split_once(',') {
                Some((value, remainder)) => (value, remainder),
                None => (after_key, ""),
            }
        };

        if key.eq_ignore_ascii_case(name) {
            return Some(value);
        }
        rest = remainder;
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_blank_and_comments() {
        assert_eq!(classify(""), Line::Blank);
        assert_eq!(classify("   \r"), Line::Blank);
        assert_eq!(classify("#EXTM3U"), Line::Comment("#EXTM3U"));
        assert_eq!(
            classify("#EXT-X-TARGETDURATION:2"),
            Line::Comment("#EXT-X-TARGETDURATION:2")
        );
    }

    #[test]
    fn test_classify_extinf() {
        assert_eq!(classify("#EXTINF:2.000,"), Line::SegmentDuration(Some(2.0)));
        assert_eq!(classify("#EXTINF:4,title"), Line::SegmentDuration(Some(4.0)));
        assert_eq!(classify("#EXTINF:abc,"), Line::SegmentDuration(None));
    }

    #[test]
    fn test_classify_map() {
        assert_eq!(
            classify(r#"#EXT-X-MAP:URI="init.mp4""#),
            Line::InitSegmentRef("init.mp4")
        );
        assert_eq!(
            classify(r#"#EXT-X-MAP:BYTERANGE="720@0",URI="a,b/init.mp4""#),
            Line::InitSegmentRef("a,b/init.mp4")
        );
        assert!(matches!(classify("#EXT-X-MAP:BYTERANGE=5"), Line::Comment(_)));
    }

    #[test]
    fn test_classify_uris() {
        assert_eq!(classify("seg_001.m4s"), Line::SegmentRef("seg_001.m4s"));
        assert_eq!(classify("seg_001.TS\r"), Line::SegmentRef("seg_001.TS"));
        assert_eq!(classify("part.mp4?session=1"), Line::SegmentRef("part.mp4?session=1"));
        assert_eq!(classify("video1_stream.m3u8"), Line::Other("video1_stream.m3u8"));
        assert_eq!(classify("README"), Line::Other("README"));
    }

    #[test]
    fn test_playlist_ref() {
        assert_eq!(classify("low/index.M3U8").playlist_ref(), Some("low/index.M3U8"));
        assert_eq!(classify("seg.ts").playlist_ref(), None);
        assert_eq!(classify("#EXT-X-STREAM-INF:BANDWIDTH=1").playlist_ref(), None);
    }

    #[test]
    fn test_contained_path() {
        assert!(is_contained_path("seg1.ts"));
        assert!(is_contained_path("low/seg1.ts?t=1"));
        assert!(is_contained_path("a..b.ts"));
        assert!(!is_contained_path("../other/seg1.ts"));
        assert!(!is_contained_path("low/../../seg1.ts"));
        assert!(!is_contained_path("/etc/passwd"));
        assert!(!is_contained_path("http://evil/seg1.ts"));
        assert!(!is_contained_path("file:seg1.ts"));
        assert!(!is_contained_path("?only=query"));
    }

    #[test]
    fn test_attribute_lookup() {
        let list = r#"TYPE=AUDIO,GROUP-ID="aud",NAME="English, main",URI="en.m3u8""#;
        assert_eq!(attribute(list, "TYPE"), Some("AUDIO"));
        assert_eq!(attribute(list, "name"), Some("English, main"));
        assert_eq!(attribute(list, "URI"), Some("en.m3u8"));
        assert_eq!(attribute(list, "DEFAULT"), None);
    }
}
