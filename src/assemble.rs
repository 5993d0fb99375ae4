//! Manifest assembly for one stream rendition at one instant.

use std::num::NonZeroU64;

use attest_protocol::{
    Epoch, ManifestIdentifier, ManifestPayload, ProtocolResult, StreamIdentity,
};

use crate::origin::DigestedSegments;

/// An unsigned manifest plus the values the change detector keys on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssembledManifest {
    pub payload: ManifestPayload,
    pub identifier: ManifestIdentifier,

    /// SHA-256 of the canonical payload
    pub content_digest: String,
}

/// Builds payloads with a fixed epoch length.
#[derive(Debug, Clone, Copy)]
pub struct Assembler {
    epoch_duration: NonZeroU64,
}

impl Assembler {
    pub fn new(epoch_duration: NonZeroU64) -> Self {
        Self { epoch_duration }
    }

    /// The epoch containing `now_ms`.
    pub fn epoch_at(&self, now_ms: u64) -> Epoch {
        Epoch::containing(now_ms, self.epoch_duration)
    }

    pub fn assemble(
        &self,
        identity: &StreamIdentity,
        rendition_id: &str,
        digested: DigestedSegments,
        now_ms: u64,
    ) -> ProtocolResult<AssembledManifest> {
        let payload = ManifestPayload::new(
            identity,
            rendition_id,
            self.epoch_at(now_ms),
            digested.segments,
            digested.init_segment,
        );
        let content_digest = payload.content_digest()?;
        Ok(AssembledManifest {
            identifier: payload.identifier(),
            payload,
            content_digest,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use attest_protocol::SegmentEntry;

    const OWNER: &str = "0f1e2d3c4b5a69788796a5b4c3d2e1f00f1e2d3c4b5a69788796a5b4c3d2e1f0";

    fn digested(contents: &[&[u8]]) -> DigestedSegments {
        DigestedSegments {
            init_segment: None,
            segments: contents
                .iter()
                .enumerate()
                .map(|(i, bytes)| SegmentEntry::from_bytes(format!("seg{i}.ts"), bytes))
                .collect(),
        }
    }

    #[test]
    fn test_same_input_same_digest() {
        let assembler = Assembler::new(NonZeroU64::new(12_000).unwrap());
        let identity = StreamIdentity::new(OWNER, "show").unwrap();

        let a = assembler.assemble(&identity, "index", digested(&[b"a", b"b"]), 25_500).unwrap();
        let b = assembler.assemble(&identity, "index", digested(&[b"a", b"b"]), 30_000).unwrap();

        assert_eq!(a.payload.epoch.start, 24_000);
        assert_eq!(a, b);
    }

    #[test]
    fn test_content_change_keeps_identifier() {
        let assembler = Assembler::new(NonZeroU64::new(12_000).unwrap());
        let identity = StreamIdentity::new(OWNER, "show").unwrap();

        let a = assembler.assemble(&identity, "index", digested(&[b"a"]), 25_500).unwrap();
        let b = assembler.assemble(&identity, "index", digested(&[b"a", b"b"]), 25_600).unwrap();

        assert_eq!(a.identifier, b.identifier);
        assert_ne!(a.content_digest, b.content_digest);
    }

    #[test]
    fn test_epoch_boundary_changes_identifier() {
        let assembler = Assembler::new(NonZeroU64::new(12_000).unwrap());
        let identity = StreamIdentity::new(OWNER, "show").unwrap();

        let a = assembler.assemble(&identity, "index", digested(&[b"a"]), 35_999).unwrap();
        let b = assembler.assemble(&identity, "index", digested(&[b"a"]), 36_000).unwrap();

        assert_eq!(a.identifier.epoch_start, 24_000);
        assert_eq!(b.identifier.epoch_start, 36_000);
    }
}
