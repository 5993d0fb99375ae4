//! Live Attest - signed segment manifests for live HLS streams
//!
//! Watches an HLS origin's stream directories, digests the segments each
//! live rendition currently lists, and publishes one signed, replaceable
//! manifest per (stream, rendition, epoch) to WebSocket relays and an
//! optional directory. A small HTTP surface reports the signing identity
//! and the latest manifest.

pub mod assemble;
pub mod change;
pub mod clock;
pub mod config;
pub mod introspect;
pub mod origin;
pub mod scheduler;
pub mod signing;
pub mod sink;

pub use assemble::{AssembledManifest, Assembler};
pub use change::ChangeDetector;
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{AttestConfig, ConfigError, ConfigOverrides};
pub use scheduler::{CycleReport, LatestManifests, ScanSettings, Scheduler};
pub use signing::{KeySource, SigningError, SigningIdentity};
pub use sink::{FileSink, ManifestSink, PublishError, Publisher, RelaySink, SinkError};
