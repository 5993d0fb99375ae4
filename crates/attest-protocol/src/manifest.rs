//! Manifest payload: the signed content binding a stream/rendition/epoch to
//! segment digests.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;

use crate::epoch::Epoch;
use crate::error::{ProtocolError, ProtocolResult};
use crate::identity::{is_owner_key, StreamIdentity};

/// Payload schema version
pub const MANIFEST_VERSION: u32 = 1;

/// Length of a hex SHA-256 digest
pub const DIGEST_HEX_LEN: usize = 64;

/// Compute SHA-256 of bytes and return hex string
pub fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// One segment (or init segment) as read from the origin at scan time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SegmentEntry {
    /// URI exactly as it appears in the playlist
    pub uri: String,

    /// SHA-256 of the file contents (hex-encoded)
    pub digest: String,

    /// Size in bytes
    pub byte_length: u64,
}

impl SegmentEntry {
    /// Digest `bytes` into an entry for `uri`.
    pub fn from_bytes(uri: impl Into<String>, bytes: &[u8]) -> Self {
        Self {
            uri: uri.into(),
            digest: sha256_hex(bytes),
            byte_length: bytes.len() as u64,
        }
    }

    /// Whether `bytes` obtained from any source are the attested bytes.
    pub fn matches(&self, bytes: &[u8]) -> bool {
        bytes.len() as u64 == self.byte_length && sha256_hex(bytes) == self.digest
    }

    fn validate(&self) -> ProtocolResult<()> {
        if self.uri.trim().is_empty() {
            return Err(ProtocolError::InvalidManifest("segment uri is empty".to_string()));
        }
        if !is_digest_hex(&self.digest) {
            return Err(ProtocolError::InvalidManifest(format!(
                "segment {} has malformed digest",
                self.uri
            )));
        }
        Ok(())
    }
}

fn is_digest_hex(value: &str) -> bool {
    value.len() == DIGEST_HEX_LEN && value.bytes().all(|b| b.is_ascii_hexdigit())
}

/// Replaceable key of a manifest: `ownerKey:streamName:renditionId:epochStart`.
///
/// A pure function of those four values. A later `createdAt` for the same
/// identifier supersedes an earlier one.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ManifestIdentifier {
    pub owner_key: String,
    pub stream_name: String,
    pub rendition_id: String,
    pub epoch_start: u64,
}

impl fmt::Display for ManifestIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}:{}",
            self.owner_key, self.stream_name, self.rendition_id, self.epoch_start
        )
    }
}

impl FromStr for ManifestIdentifier {
    type Err = ProtocolError;

    /// Owner keys are hex and epoch starts are numeric, so a stream name
    /// containing ':' still parses unambiguously as long as the rendition
    /// does not.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ProtocolError::InvalidIdentifier(s.to_string());

        let mut tail = s.rsplitn(3, ':');
        let epoch_start = tail
            .next()
            .and_then(|v| v.parse::<u64>().ok())
            .ok_or_else(invalid)?;
        let rendition_id = tail.next().ok_or_else(invalid)?;
        let head = tail.next().ok_or_else(invalid)?;
        let (owner_key, stream_name) = head.split_once(':').ok_or_else(invalid)?;

        if !is_owner_key(owner_key) || stream_name.is_empty() || rendition_id.is_empty() {
            return Err(invalid());
        }

        Ok(Self {
            owner_key: owner_key.to_string(),
            stream_name: stream_name.to_string(),
            rendition_id: rendition_id.to_string(),
            epoch_start,
        })
    }
}

impl Serialize for ManifestIdentifier {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ManifestIdentifier {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// The signed content of a manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestPayload {
    /// Payload schema version
    pub version: u32,

    /// Stream owner key (hex)
    pub owner_key: String,

    /// Stream name within the owner's namespace
    pub stream_name: String,

    /// Rendition (quality variant) identifier
    pub rendition_id: String,

    /// Time bucket the segment set was observed in
    pub epoch: Epoch,

    /// Segments in playlist order
    pub segments: Vec<SegmentEntry>,

    /// Initialization segment (fMP4 only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub init_segment: Option<SegmentEntry>,
}

impl ManifestPayload {
    /// Build a payload for one stream rendition in one epoch.
    pub fn new(
        identity: &StreamIdentity,
        rendition_id: impl Into<String>,
        epoch: Epoch,
        segments: Vec<SegmentEntry>,
        init_segment: Option<SegmentEntry>,
    ) -> Self {
        Self {
            version: MANIFEST_VERSION,
            owner_key: identity.owner_key().to_string(),
            stream_name: identity.stream_name().to_string(),
            rendition_id: rendition_id.into(),
            epoch,
            segments,
            init_segment,
        }
    }

    /// The replaceable identifier. Depends only on owner, stream, rendition
    /// and epoch start; never on segment content.
    pub fn identifier(&self) -> ManifestIdentifier {
        ManifestIdentifier {
            owner_key: self.owner_key.clone(),
            stream_name: self.stream_name.clone(),
            rendition_id: self.rendition_id.clone(),
            epoch_start: self.epoch.start,
        }
    }

    /// Serialize with JCS (sorted keys, no whitespace).
    pub fn canonical_bytes(&self) -> ProtocolResult<Vec<u8>> {
        serde_json_canonicalizer::to_vec(self)
            .map_err(|e| ProtocolError::Canonicalization(e.to_string()))
    }

    /// SHA-256 of the canonical bytes.
    pub fn content_digest(&self) -> ProtocolResult<String> {
        Ok(sha256_hex(&self.canonical_bytes()?))
    }

    /// Structural checks a verifier applies before trusting the payload.
    pub fn validate(&self) -> ProtocolResult<()> {
        if self.version != MANIFEST_VERSION {
            return Err(ProtocolError::InvalidManifest(format!(
                "unsupported payload version {}",
                self.version
            )));
        }
        if !is_owner_key(&self.owner_key) {
            return Err(ProtocolError::InvalidManifest("owner key is not 64-hex".to_string()));
        }
        if self.stream_name.trim().is_empty() {
            return Err(ProtocolError::InvalidManifest("stream name is empty".to_string()));
        }
        if self.rendition_id.trim().is_empty() {
            return Err(ProtocolError::InvalidManifest("rendition id is empty".to_string()));
        }
        if self.epoch.duration_ms == 0 {
            return Err(ProtocolError::InvalidManifest("epoch duration is zero".to_string()));
        }
        if self.segments.is_empty() {
            return Err(ProtocolError::InvalidManifest("no segments".to_string()));
        }
        for segment in &self.segments {
            segment.validate()?;
        }
        if let Some(init) = &self.init_segment {
            init.validate()?;
        }
        Ok(())
    }
}
