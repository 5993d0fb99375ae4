//! Stream identity codec.
//!
//! The origin writes one directory per live source, named
//! `<ownerKeyHex>--<streamName>[__r<renditionHint>]`. A transcoder that
//! publishes extra renditions of the same stream does so by adding sibling
//! directories carrying a rendition hint.

use std::fmt;
use thiserror::Error;

/// Length of an owner key in hex characters (32 bytes).
pub const OWNER_KEY_HEX_LEN: usize = 64;

/// Separator between owner key and stream name.
pub const NAME_SEPARATOR: &str = "--";

/// Marker introducing an optional trailing rendition hint.
pub const RENDITION_MARKER: &str = "__r";

/// Longest accepted rendition hint.
pub const MAX_RENDITION_HINT_LEN: usize = 16;

/// Errors from decoding a directory name.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdentityError {
    #[error("missing '--' separator in {0:?}")]
    MissingSeparator(String),

    #[error("owner key must be 64 hex characters, got {0:?}")]
    InvalidOwnerKey(String),

    #[error("stream name is empty")]
    EmptyStreamName,
}

/// Owner key plus stream name. Immutable once decoded.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StreamIdentity {
    owner_key: String,
    stream_name: String,
}

impl StreamIdentity {
    /// Validate and build an identity. The owner key is normalized to lowercase.
    pub fn new(owner_key: &str, stream_name: &str) -> Result<Self, IdentityError> {
        if !is_owner_key(owner_key) {
            return Err(IdentityError::InvalidOwnerKey(owner_key.to_string()));
        }
        if stream_name.trim().is_empty() {
            return Err(IdentityError::EmptyStreamName);
        }
        Ok(Self {
            owner_key: owner_key.to_ascii_lowercase(),
            stream_name: stream_name.to_string(),
        })
    }

    pub fn owner_key(&self) -> &str {
        &self.owner_key
    }

    pub fn stream_name(&self) -> &str {
        &self.stream_name
    }
}

impl fmt::Display for StreamIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}…/{}", &self.owner_key[..8], self.stream_name)
    }
}

/// A decoded origin directory name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamDir {
    pub identity: StreamIdentity,
    pub rendition_hint: Option<String>,
}

impl StreamDir {
    /// Encode back into the on-disk directory name.
    pub fn dir_name(&self) -> String {
        encode_dir_name(&self.identity, self.rendition_hint.as_deref())
    }
}

/// Encode an identity (and optional rendition hint) into a directory name.
pub fn encode_dir_name(identity: &StreamIdentity, rendition_hint: Option<&str>) -> String {
    match rendition_hint {
        Some(hint) => format!(
            "{}{NAME_SEPARATOR}{}{RENDITION_MARKER}{hint}",
            identity.owner_key, identity.stream_name
        ),
        None => format!("{}{NAME_SEPARATOR}{}", identity.owner_key, identity.stream_name),
    }
}

/// Decode a directory name.
///
/// Splits on the first `--`. The left side must be a 64-character hex key;
/// the right side, after removing a trailing `__r<hint>`, must be non-empty.
pub fn decode_dir_name(name: &str) -> Result<StreamDir, IdentityError> {
    let (owner_key, rest) = name
        .split_once(NAME_SEPARATOR)
        .ok_or_else(|| IdentityError::MissingSeparator(name.to_string()))?;

    let (stream_name, rendition_hint) = split_rendition_hint(rest);
    let identity = StreamIdentity::new(owner_key, stream_name)?;

    Ok(StreamDir {
        identity,
        rendition_hint: rendition_hint.map(str::to_string),
    })
}

/// Whether a string is a well-formed owner key.
pub fn is_owner_key(value: &str) -> bool {
    value.len() == OWNER_KEY_HEX_LEN && value.bytes().all(|b| b.is_ascii_hexdigit())
}

fn split_rendition_hint(raw: &str) -> (&str, Option<&str>) {
    match raw.rfind(RENDITION_MARKER) {
        Some(idx) => {
            let hint = &raw[idx + RENDITION_MARKER.len()..];
            if is_rendition_hint(hint) {
                (&raw[..idx], Some(hint))
            } else {
                (raw, None)
            }
        }
        None => (raw, None),
    }
}

fn is_rendition_hint(value: &str) -> bool {
    !value.is_empty()
        && value.len() <= MAX_RENDITION_HINT_LEN
        && value.bytes().all(|b| b.is_ascii_alphanumeric())
}
