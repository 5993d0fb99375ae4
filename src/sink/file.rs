//! Filesystem sink.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use attest_protocol::SignedManifest;
use tokio::fs;

use super::{ManifestSink, SinkError};

/// Writes each manifest to `<dir>/<ownerKey>--<streamName>/<renditionId>.json`.
///
/// The file is replaced atomically (temp file + rename) so readers never
/// see a partial manifest.
#[derive(Debug, Clone)]
pub struct FileSink {
    dir: PathBuf,
    name: String,
}

impl FileSink {
    pub fn new(dir: PathBuf) -> Self {
        let name = format!("file:{}", dir.display());
        Self { dir, name }
    }

    /// Target path for a manifest.
    pub fn manifest_path(&self, manifest: &SignedManifest) -> Result<PathBuf, SinkError> {
        let payload = &manifest.payload;
        let stream_dir = format!("{}--{}", payload.owner_key, payload.stream_name);
        let file_name = format!("{}.json", payload.rendition_id);
        for component in [&stream_dir, &file_name] {
            check_component(component)?;
        }
        Ok(self.dir.join(stream_dir).join(file_name))
    }
}

fn check_component(component: &str) -> Result<(), SinkError> {
    let unsafe_name = component.is_empty()
        || component.starts_with('.')
        || component.contains(['/', '\\', '\0']);
    if unsafe_name {
        return Err(SinkError::UnsafePath(component.to_string()));
    }
    Ok(())
}

async fn write_atomic(path: &Path, contents: &[u8]) -> Result<(), SinkError> {
    let parent = path
        .parent()
        .ok_or_else(|| SinkError::UnsafePath(path.display().to_string()))?;
    fs::create_dir_all(parent).await?;

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let temp = parent.join(format!(".{file_name}.tmp"));
    fs::write(&temp, contents).await?;
    if let Err(e) = fs::rename(&temp, path).await {
        let _ = fs::remove_file(&temp).await;
        return Err(e.into());
    }
    Ok(())
}

#[async_trait]
impl ManifestSink for FileSink {
    fn name(&self) -> &str {
        &self.name
    }

    async fn publish(&self, manifest: &SignedManifest) -> Result<(), SinkError> {
        let path = self.manifest_path(manifest)?;
        let json = serde_json::to_vec_pretty(manifest)
            .map_err(attest_protocol::ProtocolError::from)?;
        write_atomic(&path, &json).await
    }
}
