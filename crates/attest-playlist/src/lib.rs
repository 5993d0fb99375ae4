//! HLS playlist grammar.
//!
//! A small explicit grammar over playlist lines: each line is classified
//! into a tagged variant, and master/media resolution plus segment
//! collection operate on those variants. Performs no I/O.

pub mod line;
pub mod parser;

pub use line::{
    classify, has_extension, is_contained_path, strip_query, Line, PLAYLIST_EXTENSION,
    SEGMENT_EXTENSIONS,
};
pub use parser::{resolve, MediaPlaylist, Resolution};
