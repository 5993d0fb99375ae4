//! Everything read from the live HLS origin: stream directories on disk,
//! playlists over HTTP, and segment bytes on disk.

pub mod digest;
pub mod resolver;
pub mod scanner;

pub use digest::{digest_segments, DigestedSegments};
pub use resolver::{FetchError, PlaylistResolver, ResolvedPlaylist};
pub use scanner::{scan_active_streams, ActiveStream};
