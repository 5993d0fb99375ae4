//! Change detection across scan cycles.

use std::collections::HashMap;

use attest_protocol::ManifestIdentifier;

use crate::assemble::AssembledManifest;

/// Last successfully published content digest per identifier.
///
/// Only written after a publish succeeds, so a failed publish is retried on
/// the next cycle with the same identifier.
#[derive(Debug, Default)]
pub struct ChangeDetector {
    published: HashMap<ManifestIdentifier, String>,
}

impl ChangeDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether exactly this content was already published under its identifier.
    pub fn is_unchanged(&self, manifest: &AssembledManifest) -> bool {
        self.published
            .get(&manifest.identifier)
            .is_some_and(|digest| *digest == manifest.content_digest)
    }

    pub fn record(&mut self, manifest: &AssembledManifest) {
        self.published
            .insert(manifest.identifier.clone(), manifest.content_digest.clone());
    }

    /// Forget identifiers whose epoch started before `epoch_start`.
    pub fn prune_before(&mut self, epoch_start: u64) {
        self.published.retain(|id, _| id.epoch_start >= epoch_start);
    }

    pub fn len(&self) -> usize {
        self.published.len()
    }

    pub fn is_empty(&self) -> bool {
        self.published.is_empty()
    }
}
