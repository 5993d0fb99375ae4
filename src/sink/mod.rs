//! Publication sinks.
//!
//! A sink accepts one signed manifest at a time. The [`Publisher`] races the
//! configured relays; the first acceptance wins. The file sink is a mirror
//! and only decides delivery when no relay is configured.

mod file;
mod publisher;
mod relay;

use std::io;

use async_trait::async_trait;
use attest_protocol::{ProtocolError, SignedManifest};
use thiserror::Error;

pub use file::FileSink;
pub use publisher::{PublishError, Publisher};
pub use relay::RelaySink;

/// Errors from a single sink
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("relay rejected manifest: {0}")]
    Rejected(String),

    #[error("relay closed the connection before acknowledging")]
    Closed,

    #[error("timed out")]
    Timeout,

    #[error("unsafe path component: {0}")]
    UnsafePath(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("encoding error: {0}")]
    Protocol(#[from] ProtocolError),
}

/// A destination for signed manifests.
#[async_trait]
pub trait ManifestSink: Send + Sync {
    /// Short label for logs
    fn name(&self) -> &str;

    /// Deliver one manifest. `Ok` means the destination accepted it.
    async fn publish(&self, manifest: &SignedManifest) -> Result<(), SinkError>;
}
