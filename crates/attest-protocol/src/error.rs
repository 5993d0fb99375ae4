//! Error types for manifest construction, verification, and relay framing.

use thiserror::Error;

/// Errors from protocol operations.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("JCS canonicalization error: {0}")]
    Canonicalization(String),

    #[error("invalid manifest: {0}")]
    InvalidManifest(String),

    #[error("unsupported manifest kind {0}")]
    UnsupportedKind(u32),

    #[error("identifier mismatch: expected {expected}, got {actual}")]
    IdentifierMismatch { expected: String, actual: String },

    #[error("event id mismatch: expected {expected}, got {actual}")]
    IdMismatch { expected: String, actual: String },

    #[error("invalid identifier: {0}")]
    InvalidIdentifier(String),

    #[error("invalid public key: {0}")]
    InvalidKey(String),

    #[error("invalid signature encoding: {0}")]
    InvalidSignature(String),

    #[error("signature does not verify under the signer key")]
    BadSignature,

    #[error("malformed relay frame: {0}")]
    MalformedFrame(String),
}

/// Result type for protocol operations
pub type ProtocolResult<T> = Result<T, ProtocolError>;
