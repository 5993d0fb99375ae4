//! WebSocket relay sink.

use async_trait::async_trait;
use attest_protocol::{event_frame, RelayMessage, SignedManifest};
use futures::{SinkExt, StreamExt};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, trace};

use super::{ManifestSink, SinkError};

/// Publishes to one relay: connect, send `["EVENT", m]`, wait for the
/// matching `OK`. Timing is bounded by the [`super::Publisher`] deadline.
#[derive(Debug, Clone)]
pub struct RelaySink {
    url: String,
}

impl RelaySink {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

#[async_trait]
impl ManifestSink for RelaySink {
    fn name(&self) -> &str {
        &self.url
    }

    async fn publish(&self, manifest: &SignedManifest) -> Result<(), SinkError> {
        let frame = event_frame(manifest)?;
        let (mut ws, _) = connect_async(self.url.as_str()).await?;
        ws.send(Message::Text(frame)).await?;

        while let Some(message) = ws.next().await {
            let text = match message? {
                Message::Text(text) => text,
                Message::Close(_) => return Err(SinkError::Closed),
                _ => continue,
            };

            match RelayMessage::parse(&text) {
                Ok(RelayMessage::Ok {
                    event_id,
                    accepted,
                    message,
                }) if event_id == manifest.id => {
                    let _ = ws.close(None).await;
                    return if accepted {
                        Ok(())
                    } else {
                        Err(SinkError::Rejected(message))
                    };
                }
                Ok(RelayMessage::Notice(notice)) => {
                    debug!(relay = %self.url, notice = %notice, "relay notice");
                }
                Ok(other) => trace!(relay = %self.url, frame = ?other, "ignoring relay frame"),
                Err(e) => debug!(relay = %self.url, error = %e, "malformed relay frame"),
            }
        }

        Err(SinkError::Closed)
    }
}
