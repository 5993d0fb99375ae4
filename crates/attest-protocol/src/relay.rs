//! Relay frame codec.
//!
//! Relays speak JSON arrays over WebSocket text frames:
//! - client → relay: `["EVENT", <manifest>]`
//! - relay → client: `["OK", <id>, <accepted>, <message>]` or `["NOTICE", <message>]`

use serde_json::Value;

use crate::error::{ProtocolError, ProtocolResult};
use crate::signed::SignedManifest;

/// Encode the publish frame for a manifest.
pub fn event_frame(manifest: &SignedManifest) -> ProtocolResult<String> {
    Ok(serde_json::to_string(&("EVENT", manifest))?)
}

/// A frame received from a relay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayMessage {
    /// Acceptance or rejection of a published event
    Ok {
        event_id: String,
        accepted: bool,
        message: String,
    },

    /// Human-readable relay notice
    Notice(String),

    /// Any other frame label (subscriptions etc.); ignored by publishers
    Other(String),
}

impl RelayMessage {
    /// Parse a relay text frame.
    pub fn parse(text: &str) -> ProtocolResult<Self> {
        let value: Value = serde_json::from_str(text)?;
        let items = value
            .as_array()
            .ok_or_else(|| ProtocolError::MalformedFrame("frame is not an array".to_string()))?;
        let label = items
            .first()
            .and_then(Value::as_str)
            .ok_or_else(|| ProtocolError::MalformedFrame("missing frame label".to_string()))?;

        match label {
            "OK" => {
                let event_id = items
                    .get(1)
                    .and_then(Value::as_str)
                    .ok_or_else(|| {
                        ProtocolError::MalformedFrame("OK without event id".to_string())
                    })?;
                let accepted = items
                    .get(2)
                    .and_then(Value::as_bool)
                    .ok_or_else(|| ProtocolError::MalformedFrame("OK without status".to_string()))?;
                let message = items.get(3).and_then(Value::as_str).unwrap_or_default();
                Ok(Self::Ok {
                    event_id: event_id.to_string(),
                    accepted,
                    message: message.to_string(),
                })
            }
            "NOTICE" => Ok(Self::Notice(
                items.get(1).and_then(Value::as_str).unwrap_or_default().to_string(),
            )),
            other => Ok(Self::Other(other.to_string())),
        }
    }

    /// Encode an `OK` frame. Used by relay-side tooling and tests.
    pub fn ok_frame(event_id: &str, accepted: bool, message: &str) -> String {
        serde_json::json!(["OK", event_id, accepted, message]).to_string()
    }

    /// Whether this frame acknowledges `event_id` as accepted.
    pub fn acknowledges(&self, event_id: &str) -> bool {
        matches!(self, Self::Ok { event_id: id, accepted: true, .. } if id == event_id)
    }
}

/// Extract the manifest from a client `EVENT` frame.
pub fn parse_event_frame(text: &str) -> ProtocolResult<SignedManifest> {
    let (label, manifest): (String, SignedManifest) = serde_json::from_str(text)?;
    if label != "EVENT" {
        return Err(ProtocolError::MalformedFrame(format!("expected EVENT, got {label}")));
    }
    Ok(manifest)
}
