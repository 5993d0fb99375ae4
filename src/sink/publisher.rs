//! Publication race across relays, with pull-sink mirroring.

use std::sync::Arc;
use std::time::Duration;

use attest_protocol::SignedManifest;
use futures::future::join_all;
use futures::stream::{FuturesUnordered, StreamExt};
use thiserror::Error;
use tracing::{debug, warn};

use super::{FileSink, ManifestSink, RelaySink, SinkError};
use crate::config::AttestConfig;

/// Errors from a publish attempt as a whole
#[derive(Debug, Error)]
pub enum PublishError {
    #[error("no sinks configured")]
    NoSinks,

    #[error("no sink accepted the manifest within {0:?}")]
    Deadline(Duration),

    #[error("every sink failed: {}", .0.join("; "))]
    AllFailed(Vec<String>),
}

/// Sends a manifest to every relay concurrently and succeeds as soon as any
/// one of them accepts it.
///
/// Each relay attempt runs on its own task, bounded by the same deadline. The
/// caller is released at the first acceptance; remaining attempts continue
/// in the background until they finish or hit the deadline.
///
/// Mirrors are pull sinks (a directory readers fetch from). They are written
/// alongside every attempt but never count as delivery while at least one
/// relay is configured. With no relays, the mirrors race instead.
#[derive(Clone)]
pub struct Publisher {
    relays: Vec<Arc<dyn ManifestSink>>,
    mirrors: Vec<Arc<dyn ManifestSink>>,
    deadline: Duration,
}

impl Publisher {
    pub fn new(relays: Vec<Arc<dyn ManifestSink>>, deadline: Duration) -> Self {
        Self {
            relays,
            mirrors: Vec::new(),
            deadline,
        }
    }

    pub fn with_mirrors(mut self, mirrors: Vec<Arc<dyn ManifestSink>>) -> Self {
        self.mirrors = mirrors;
        self
    }

    /// One relay sink per configured URL, plus a file mirror when
    /// `manifest_dir` is set.
    pub fn from_config(config: &AttestConfig) -> Self {
        let relays = config
            .relays
            .iter()
            .map(|url| Arc::new(RelaySink::new(url.clone())) as Arc<dyn ManifestSink>)
            .collect();
        let mirrors = config
            .manifest_dir
            .iter()
            .map(|dir| Arc::new(FileSink::new(dir.clone())) as Arc<dyn ManifestSink>)
            .collect();
        Self::new(relays, config.publish_deadline())
            .with_mirrors(mirrors)
    }

    pub fn sink_names(&self) -> Vec<&str> {
        self.relays
            .iter()
            .chain(&self.mirrors)
            .map(|s| s.name())
            .collect()
    }

    /// Publish `manifest`; returns the name of the first accepting sink.
    pub async fn publish(&self, manifest: &SignedManifest) -> Result<String, PublishError> {
        let manifest = Arc::new(manifest.clone());

        if self.relays.is_empty() {
            return self.race(&self.mirrors, manifest).await;
        }

        let (delivered, ()) = tokio::join!(
            self.race(&self.relays, Arc::clone(&manifest)),
            self.mirror(&manifest)
        );
        delivered
    }

    async fn race(
        &self,
        sinks: &[Arc<dyn ManifestSink>],
        manifest: Arc<SignedManifest>,
    ) -> Result<String, PublishError> {
        if sinks.is_empty() {
            return Err(PublishError::NoSinks);
        }

        let deadline = self.deadline;
        let mut attempts: FuturesUnordered<_> = sinks
            .iter()
            .map(|sink| {
                let sink = Arc::clone(sink);
                let manifest = Arc::clone(&manifest);
                tokio::spawn(async move {
                    let outcome = bounded(deadline, sink.as_ref(), &manifest).await;
                    (sink.name().to_string(), outcome)
                })
            })
            .collect();

        let race = async {
            let mut failures = Vec::new();
            while let Some(joined) = attempts.next().await {
                match joined {
                    Ok((name, Ok(()))) => return Ok(name),
                    Ok((name, Err(e))) => {
                        debug!(sink = %name, error = %e, "sink did not accept manifest");
                        failures.push(format!("{name}: {e}"));
                    }
                    Err(e) => failures.push(format!("sink task failed: {e}")),
                }
            }
            Err(PublishError::AllFailed(failures))
        };

        match tokio::time::timeout(deadline, race).await {
            Ok(result) => result,
            Err(_) => Err(PublishError::Deadline(deadline)),
        }
    }

    async fn mirror(&self, manifest: &SignedManifest) {
        let writes = self.mirrors.iter().map(|sink| async move {
            if let Err(e) = bounded(self.deadline, sink.as_ref(), manifest).await {
                warn!(sink = %sink.name(), error = %e, "mirror write failed");
            }
        });
        join_all(writes).await;
    }
}

async fn bounded(
    deadline: Duration,
    sink: &dyn ManifestSink,
    manifest: &SignedManifest,
) -> Result<(), SinkError> {
    match tokio::time::timeout(deadline, sink.publish(manifest)).await {
        Ok(outcome) => outcome,
        Err(_) => Err(SinkError::Timeout),
    }
}
