//! Scan-cycle scheduler.
//!
//! One task owns all mutable service state (the change detector and the
//! latest-manifest view). Cycles never overlap: the next cycle starts one
//! scan interval after the previous one finished. Within a cycle, stream
//! units are processed one at a time, each reading the clock when its
//! segment set has been digested.

use std::collections::BTreeMap;
use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use attest_protocol::{ProtocolError, SignedManifest};
use chrono::{DateTime, Utc};
use futures::FutureExt;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::assemble::Assembler;
use crate::change::ChangeDetector;
use crate::clock::{Clock, SystemClock};
use crate::config::AttestConfig;
use crate::origin::{
    digest_segments, scan_active_streams, ActiveStream, FetchError, PlaylistResolver,
};
use crate::signing::SigningIdentity;
use crate::sink::Publisher;

/// Most recently published manifests, shared read-only with the
/// introspection server.
#[derive(Debug, Clone, Default)]
pub struct LatestManifests {
    latest: Option<Arc<SignedManifest>>,
    by_stream: BTreeMap<(String, String), Arc<SignedManifest>>,
}

impl LatestManifests {
    /// The last manifest published for any stream.
    pub fn latest(&self) -> Option<&SignedManifest> {
        self.latest.as_deref()
    }

    /// The last manifest published for one stream, any rendition.
    pub fn for_stream(&self, owner_key: &str, stream_name: &str) -> Option<&SignedManifest> {
        self.by_stream
            .get(&(owner_key.to_ascii_lowercase(), stream_name.to_string()))
            .map(Arc::as_ref)
    }

    pub fn stream_count(&self) -> usize {
        self.by_stream.len()
    }

    pub(crate) fn record(&mut self, manifest: SignedManifest) {
        let manifest = Arc::new(manifest);
        let key = (
            manifest.payload.owner_key.clone(),
            manifest.payload.stream_name.clone(),
        );
        self.by_stream.insert(key, Arc::clone(&manifest));
        self.latest = Some(manifest);
    }
}

/// Where and how often to look for streams.
#[derive(Debug, Clone)]
pub struct ScanSettings {
    pub root_dir: PathBuf,
    pub stale_after: Duration,
    pub scan_interval: Duration,
}

/// Counts for one cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// Stream directories considered active
    pub active: usize,

    /// Manifests accepted by a sink
    pub published: usize,

    /// Units whose content was already published for this epoch
    pub unchanged: usize,

    /// Units with no playlist or no readable segments
    pub skipped: usize,

    /// Units where signing or publishing failed
    pub failed: usize,
}

enum UnitOutcome {
    Published,
    Unchanged,
    NoData,
    PublishFailed,
}

/// Drives scan → resolve → digest → assemble → sign → publish.
pub struct Scheduler {
    settings: ScanSettings,
    resolver: PlaylistResolver,
    assembler: Assembler,
    signer: Arc<SigningIdentity>,
    publisher: Publisher,
    clock: Arc<dyn Clock>,
    changes: ChangeDetector,
    latest: watch::Sender<LatestManifests>,
}

impl Scheduler {
    pub fn new(
        settings: ScanSettings,
        resolver: PlaylistResolver,
        assembler: Assembler,
        signer: Arc<SigningIdentity>,
        publisher: Publisher,
    ) -> Self {
        let (latest, _) = watch::channel(LatestManifests::default());
        Self {
            settings,
            resolver,
            assembler,
            signer,
            publisher,
            clock: Arc::new(SystemClock),
            changes: ChangeDetector::new(),
            latest,
        }
    }

    /// Replace the system clock.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Wire up a scheduler from the effective configuration.
    pub fn from_config(
        config: &AttestConfig,
        signer: Arc<SigningIdentity>,
    ) -> Result<Self, FetchError> {
        let settings = ScanSettings {
            root_dir: config.root_dir.clone(),
            stale_after: config.stale_after(),
            scan_interval: config.scan_interval(),
        };
        let resolver = PlaylistResolver::new(
            &config.origin_url,
            &config.top_playlist,
            config.fetch_timeout(),
        )?;
        Ok(Self::new(
            settings,
            resolver,
            Assembler::new(config.epoch_duration()),
            signer,
            Publisher::from_config(config),
        ))
    }

    /// A read handle on the latest-manifest view.
    pub fn subscribe(&self) -> watch::Receiver<LatestManifests> {
        self.latest.subscribe()
    }

    /// Run cycles until `cancel` fires. A failing or panicking cycle is
    /// logged and the loop continues.
    pub async fn run(mut self, cancel: CancellationToken) {
        info!(
            root = %self.settings.root_dir.display(),
            interval_ms = self.settings.scan_interval.as_millis() as u64,
            sinks = ?self.publisher.sink_names(),
            "scheduler started"
        );

        loop {
            let cycle = AssertUnwindSafe(self.run_cycle()).catch_unwind();
            tokio::select! {
                _ = cancel.cancelled() => break,
                outcome = cycle => match outcome {
                    Ok(report) if report.published > 0 => info!(?report, "scan cycle complete"),
                    Ok(report) => debug!(?report, "scan cycle complete"),
                    Err(_) => error!("scan cycle panicked; continuing with next cycle"),
                },
            }

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(self.settings.scan_interval) => {}
            }
        }

        info!("scheduler stopped");
    }

    /// Run one cycle. The scan and pruning use the time the cycle starts.
    pub async fn run_cycle(&mut self) -> CycleReport {
        let now = self.clock.now();
        let epoch = self.assembler.epoch_at(unix_millis(now));
        self.changes.prune_before(epoch.previous().start);

        let streams = scan_active_streams(
            &self.settings.root_dir,
            self.settings.stale_after,
            SystemTime::from(now),
        )
        .await;

        let mut report = CycleReport {
            active: streams.len(),
            ..Default::default()
        };

        for stream in &streams {
            match self.process(stream).await {
                Ok(UnitOutcome::Published) => report.published += 1,
                Ok(UnitOutcome::Unchanged) => report.unchanged += 1,
                Ok(UnitOutcome::NoData) => report.skipped += 1,
                Ok(UnitOutcome::PublishFailed) => report.failed += 1,
                Err(e) => {
                    warn!(dir = %stream.dir_name, error = %e, "failed to build manifest");
                    report.failed += 1;
                }
            }
        }

        report
    }

    async fn process(&mut self, stream: &ActiveStream) -> Result<UnitOutcome, ProtocolError> {
        let resolved = match self.resolver.resolve(&stream.dir_name).await {
            Ok(resolved) => resolved,
            Err(e) => {
                debug!(dir = %stream.dir_name, error = %e, "playlist unavailable");
                return Ok(UnitOutcome::NoData);
            }
        };
        if resolved.media.is_empty() {
            debug!(dir = %stream.dir_name, "playlist lists no segments");
            return Ok(UnitOutcome::NoData);
        }

        let digested = digest_segments(&stream.path, &resolved.media).await;
        if digested.is_empty() {
            debug!(dir = %stream.dir_name, "no listed segment readable on disk");
            return Ok(UnitOutcome::NoData);
        }

        let rendition_id = resolved.rendition_id(stream.dir.rendition_hint.as_deref());
        let now = self.clock.now();
        let assembled = self.assembler.assemble(
            &stream.dir.identity,
            &rendition_id,
            digested,
            unix_millis(now),
        )?;

        if self.changes.is_unchanged(&assembled) {
            return Ok(UnitOutcome::Unchanged);
        }

        let signed = SignedManifest::seal(
            assembled.payload.clone(),
            now.timestamp(),
            self.signer.as_ref(),
        )?;

        match self.publisher.publish(&signed).await {
            Ok(sink) => {
                info!(
                    identifier = %assembled.identifier,
                    id = %signed.id,
                    segments = signed.payload.segments.len(),
                    sink = %sink,
                    "published manifest"
                );
                self.changes.record(&assembled);
                self.latest.send_modify(|view| view.record(signed));
                Ok(UnitOutcome::Published)
            }
            Err(e) => {
                warn!(
                    identifier = %assembled.identifier,
                    error = %e,
                    "publish failed; will retry"
                );
                Ok(UnitOutcome::PublishFailed)
            }
        }
    }
}

fn unix_millis(now: DateTime<Utc>) -> u64 {
    u64::try_from(now.timestamp_millis()).unwrap_or(0)
}
