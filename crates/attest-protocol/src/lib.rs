//! Live Attest Protocol Types
//!
//! Wire types shared by the attestation service and any downstream verifier:
//! stream identity codec, epochs, manifest payloads, the signed envelope,
//! and relay framing.

pub mod epoch;
pub mod error;
pub mod identity;
pub mod manifest;
pub mod relay;
pub mod signed;

pub use epoch::{Epoch, DEFAULT_EPOCH_MS};
pub use error::{ProtocolError, ProtocolResult};
pub use identity::{decode_dir_name, encode_dir_name, IdentityError, StreamDir, StreamIdentity};
pub use manifest::{sha256_hex, ManifestIdentifier, ManifestPayload, SegmentEntry, MANIFEST_VERSION};
pub use relay::{event_frame, parse_event_frame, RelayMessage};
pub use signed::{ManifestSigner, SignedManifest, MANIFEST_KIND};
