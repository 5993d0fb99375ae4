//! Playlist resolution and media playlist parsing.

use crate::line::{classify, Line};

/// Outcome of inspecting a fetched top-level playlist.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution<'a> {
    /// Already a media playlist; parse it directly
    Media,

    /// A master playlist; fetch this variant (relative URI) next
    Variant(&'a str),
}

/// Decide whether `text` is a media playlist or one level of indirection.
///
/// Any `#EXTINF` or `#EXT-X-MAP` line marks a media playlist. Otherwise the
/// first URI line ending in `.m3u8` is the variant to follow. Text with
/// neither is treated as media (and will simply yield no segments).
pub fn resolve(text: &str) -> Resolution<'_> {
    let mut variant = None;

    for line in text.lines().map(classify) {
        if line.is_media_directive() {
            return Resolution::Media;
        }
        if variant.is_none() {
            variant = line.playlist_ref();
        }
    }

    match variant {
        Some(uri) => Resolution::Variant(uri),
        None => Resolution::Media,
    }
}

/// Segment references collected from a media playlist.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MediaPlaylist {
    /// First `#EXT-X-MAP` URI, if any
    pub init_segment: Option<String>,

    /// Segment URIs in file order
    pub segments: Vec<String>,
}

impl MediaPlaylist {
    /// Parse a media playlist line by line.
    pub fn parse(text: &str) -> Self {
        let mut playlist = Self::default();

        for line in text.lines().map(classify) {
            match line {
                Line::InitSegmentRef(uri) => {
                    if playlist.init_segment.is_none() {
                        playlist.init_segment = Some(uri.to_string());
                    }
                }
                Line::SegmentRef(uri) => playlist.segments.push(uri.to_string()),
                Line::Blank
                | Line::SegmentDuration(_)
                | Line::Comment(_)
                | Line::Other(_) => {}
            }
        }

        playlist
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }
}
