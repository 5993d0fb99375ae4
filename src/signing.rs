//! Signing identity provisioning.
//!
//! The service signs with exactly one Ed25519 key per process, chosen once
//! at startup in this order:
//! 1. An explicit secret from configuration (malformed is fatal)
//! 2. A legacy `{publicKey, privateKey}` JSON key file (problems are logged
//!    and skipped)
//! 3. A freshly generated ephemeral key, held in memory only

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

use attest_protocol::ManifestSigner;
use base64::Engine;
use ed25519_dalek::{Signature, Signer, SigningKey, SECRET_KEY_LENGTH};
use serde::Deserialize;
use thiserror::Error;
use tracing::{info, warn};

/// Errors from key provisioning
#[derive(Debug, Error)]
pub enum SigningError {
    /// The configured secret cannot be decoded. The secret itself is never
    /// included in the message.
    #[error("configured signing secret is malformed: {0}")]
    MalformedSecret(&'static str),

    #[error("legacy key file {path}: {reason}")]
    LegacyKeyFile { path: PathBuf, reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Where the active signing key came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeySource {
    /// Explicit secret in configuration
    Configured,

    /// Legacy key file on disk
    LegacyFile { path: PathBuf },

    /// Generated at startup; lost on restart
    Ephemeral,
}

impl KeySource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Configured => "configured",
            Self::LegacyFile { .. } => "legacy_file",
            Self::Ephemeral => "ephemeral",
        }
    }
}

/// On-disk shape of the legacy key file.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LegacyKeyFile {
    public_key: String,
    private_key: String,
}

/// The process-wide signing key and its provenance.
pub struct SigningIdentity {
    key: SigningKey,
    public_key_hex: String,
    source: KeySource,
}

impl SigningIdentity {
    /// Resolve the signing key for this process.
    pub fn resolve(secret: Option<&str>, legacy_key_file: &Path) -> Result<Self, SigningError> {
        if let Some(secret) = secret {
            let identity = Self::from_secret(secret)?;
            info!(public_key = %identity.public_key_hex, "using configured signing key");
            return Ok(identity);
        }

        match load_legacy_key(legacy_key_file) {
            Ok(Some(key)) => {
                let identity = Self::new(
                    key,
                    KeySource::LegacyFile {
                        path: legacy_key_file.to_path_buf(),
                    },
                );
                info!(
                    public_key = %identity.public_key_hex,
                    path = %legacy_key_file.display(),
                    "using signing key from legacy key file"
                );
                return Ok(identity);
            }
            Ok(None) => {}
            Err(e) => warn!(error = %e, "ignoring unusable legacy key file"),
        }

        let identity = Self::ephemeral();
        warn!(
            public_key = %identity.public_key_hex,
            "no signing key configured; generated an ephemeral key that changes on every restart"
        );
        Ok(identity)
    }

    /// Decode an explicit secret: 64 hex characters or base64 of 32 bytes.
    pub fn from_secret(secret: &str) -> Result<Self, SigningError> {
        let secret = secret.trim();
        let bytes = if secret.len() == SECRET_KEY_LENGTH * 2
            && secret.bytes().all(|b| b.is_ascii_hexdigit())
        {
            hex::decode(secret).map_err(|_| SigningError::MalformedSecret("invalid hex"))?
        } else {
            base64::engine::general_purpose::STANDARD
                .decode(secret)
                .map_err(|_| SigningError::MalformedSecret("expected 64 hex characters or base64"))?
        };

        let seed: [u8; SECRET_KEY_LENGTH] = bytes
            .try_into()
            .map_err(|_| SigningError::MalformedSecret("key must be 32 bytes"))?;
        Ok(Self::new(SigningKey::from_bytes(&seed), KeySource::Configured))
    }

    /// Generate a key that lives only as long as this process.
    pub fn ephemeral() -> Self {
        Self::new(SigningKey::generate(&mut rand::thread_rng()), KeySource::Ephemeral)
    }

    fn new(key: SigningKey, source: KeySource) -> Self {
        let public_key_hex = hex::encode(key.verifying_key().as_bytes());
        Self {
            key,
            public_key_hex,
            source,
        }
    }

    pub fn public_key_hex(&self) -> &str {
        &self.public_key_hex
    }

    pub fn source(&self) -> &KeySource {
        &self.source
    }
}

impl ManifestSigner for SigningIdentity {
    fn public_key_hex(&self) -> String {
        self.public_key_hex.clone()
    }

    fn sign(&self, message: &[u8]) -> Signature {
        self.key.sign(message)
    }
}

impl fmt::Debug for SigningIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningIdentity")
            .field("public_key", &self.public_key_hex)
            .field("source", &self.source)
            .finish_non_exhaustive()
    }
}

/// Read the legacy key file. A missing file is `Ok(None)`.
///
/// The private key may be a 32-byte seed or a 64-byte seed+public pair; the
/// derived public key must match the recorded one.
fn load_legacy_key(path: &Path) -> Result<Option<SigningKey>, SigningError> {
    let contents = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };

    let fail = |reason: &str| SigningError::LegacyKeyFile {
        path: path.to_path_buf(),
        reason: reason.to_string(),
    };

    let file: LegacyKeyFile = serde_json::from_str(&contents).map_err(|_| fail("not a key file"))?;
    let private = hex::decode(file.private_key.trim()).map_err(|_| fail("private key is not hex"))?;
    let seed: [u8; SECRET_KEY_LENGTH] = match private.len() {
        32 | 64 => private[..SECRET_KEY_LENGTH]
            .try_into()
            .map_err(|_| fail("private key has wrong length"))?,
        _ => return Err(fail("private key has wrong length")),
    };

    let key = SigningKey::from_bytes(&seed);
    let derived = hex::encode(key.verifying_key().as_bytes());
    if !derived.eq_ignore_ascii_case(file.public_key.trim()) {
        return Err(fail("public key does not match private key"));
    }
    Ok(Some(key))
}

#[cfg(test)]
mod tests {
    use super::*;
    use attest_protocol::{Epoch, ManifestPayload, SegmentEntry, SignedManifest, StreamIdentity};
    use std::num::NonZeroU64;
    use tempfile::TempDir;

    // RFC 8032 test vector 1
    const SECRET_HEX: &str = "9d61b19deffd5a60ba844af492ec2cc44449c5697b326919703bac031cae7f60";
    const PUBLIC_HEX: &str = "d75a980182b10ab7d54bfed3c964073a0ee172f3daa62325af021a68f707511a";

    fn write_key_file(dir: &TempDir, public: &str, private: &str) -> PathBuf {
        let path = dir.path().join("keys.json");
        std::fs::write(
            &path,
            serde_json::json!({"publicKey": public, "privateKey": private}).to_string(),
        )
        .unwrap();
        path
    }

    #[test]
    fn test_configured_hex_secret() {
        let identity = SigningIdentity::from_secret(SECRET_HEX).unwrap();
        assert_eq!(identity.public_key_hex(), PUBLIC_HEX);
        assert_eq!(identity.source(), &KeySource::Configured);
    }

    #[test]
    fn test_configured_base64_secret() {
        let encoded =
            base64::engine::general_purpose::STANDARD.encode(hex::decode(SECRET_HEX).unwrap());
        let identity = SigningIdentity::from_secret(&encoded).unwrap();
        assert_eq!(identity.public_key_hex(), PUBLIC_HEX);
    }

    #[test]
    fn test_malformed_secret_is_fatal() {
        let dir = TempDir::new().unwrap();
        let legacy = write_key_file(&dir, PUBLIC_HEX, SECRET_HEX);

        let not_hex = "g".repeat(64);
        for bad in ["zz", "abcd", not_hex.as_str()] {
            let err = SigningIdentity::resolve(Some(bad), &legacy).unwrap_err();
            assert!(matches!(err, SigningError::MalformedSecret(_)));
            assert!(!err.to_string().contains(bad));
        }
    }

    #[test]
    fn test_legacy_key_file_used_when_no_secret() {
        let dir = TempDir::new().unwrap();
        let legacy = write_key_file(&dir, PUBLIC_HEX, SECRET_HEX);

        let identity = SigningIdentity::resolve(None, &legacy).unwrap();
        assert_eq!(identity.public_key_hex(), PUBLIC_HEX);
        assert_eq!(identity.source(), &KeySource::LegacyFile { path: legacy });
    }

    #[test]
    fn test_legacy_key_file_accepts_expanded_key() {
        let dir = TempDir::new().unwrap();
        let expanded = format!("{SECRET_HEX}{PUBLIC_HEX}");
        let legacy = write_key_file(&dir, PUBLIC_HEX, &expanded);

        let identity = SigningIdentity::resolve(None, &legacy).unwrap();
        assert_eq!(identity.public_key_hex(), PUBLIC_HEX);
    }

    #[test]
    fn test_mismatched_legacy_file_falls_through() {
        let dir = TempDir::new().unwrap();
        let legacy = write_key_file(&dir, &"ab".repeat(32), SECRET_HEX);

        let identity = SigningIdentity::resolve(None, &legacy).unwrap();
        assert_eq!(identity.source(), &KeySource::Ephemeral);
        assert_ne!(identity.public_key_hex(), PUBLIC_HEX);
    }

    #[test]
    fn test_garbage_legacy_file_falls_through() {
        let dir = TempDir::new().unwrap();
        let legacy = dir.path().join("keys.json");
        std::fs::write(&legacy, "not json").unwrap();

        let identity = SigningIdentity::resolve(None, &legacy).unwrap();
        assert_eq!(identity.source(), &KeySource::Ephemeral);
    }

    #[test]
    fn test_ephemeral_keys_differ_and_are_not_persisted() {
        let dir = TempDir::new().unwrap();
        let legacy = dir.path().join("keys.json");

        let first = SigningIdentity::resolve(None, &legacy).unwrap();
        let second = SigningIdentity::resolve(None, &legacy).unwrap();

        assert_eq!(first.source(), &KeySource::Ephemeral);
        assert_ne!(first.public_key_hex(), second.public_key_hex());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_debug_hides_secret() {
        let identity = SigningIdentity::from_secret(SECRET_HEX).unwrap();
        let debug = format!("{identity:?}");
        assert!(debug.contains(PUBLIC_HEX));
        assert!(!debug.contains(SECRET_HEX));
    }

    #[test]
    fn test_signed_manifest_verifies() {
        let identity = SigningIdentity::from_secret(SECRET_HEX).unwrap();
        let stream = StreamIdentity::new(PUBLIC_HEX, "show").unwrap();
        let epoch = Epoch::containing(25_500, NonZeroU64::new(12_000).unwrap());
        let payload = ManifestPayload::new(
            &stream,
            "index",
            epoch,
            vec![SegmentEntry::from_bytes("seg1.ts", b"abc")],
            None,
        );

        let signed = SignedManifest::seal(payload, 25, &identity).unwrap();
        assert_eq!(signed.signer_public_key, PUBLIC_HEX);
        signed.verify().unwrap();
    }
}
