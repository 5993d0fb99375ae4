//! Signed manifest envelope.
//!
//! The signature covers the JCS encoding of
//! `{kind, identifier, createdAt, signerPublicKey, payload}`, so neither the
//! content nor the timestamp that decides supersession can be altered by a
//! relay. The envelope `id` is the SHA-256 of those same bytes.

use ed25519_dalek::{Signature, Verifier, VerifyingKey};
use serde::{Deserialize, Serialize};

use crate::error::{ProtocolError, ProtocolResult};
use crate::manifest::{sha256_hex, ManifestIdentifier, ManifestPayload};

/// Event kind for segment manifests (parameterized-replaceable range).
pub const MANIFEST_KIND: u32 = 30313;

/// Anything that can sign on behalf of the attestation service.
///
/// Callers never see key material, only the public half and signatures.
pub trait ManifestSigner {
    /// Ed25519 public key, hex-encoded
    fn public_key_hex(&self) -> String;

    /// Sign `message` with the private key
    fn sign(&self, message: &[u8]) -> Signature;
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SigningInput<'a> {
    kind: u32,
    identifier: &'a ManifestIdentifier,
    created_at: i64,
    signer_public_key: &'a str,
    payload: &'a ManifestPayload,
}

/// Manifest as disseminated to relays and served to pull clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignedManifest {
    /// SHA-256 of the signing bytes (hex)
    pub id: String,

    /// Always [`MANIFEST_KIND`]
    pub kind: u32,

    /// Replaceable identifier derived from the payload
    pub identifier: ManifestIdentifier,

    /// Unix seconds at signing time
    pub created_at: i64,

    /// Ed25519 public key of the attestation service (hex)
    pub signer_public_key: String,

    #[serde(flatten)]
    pub payload: ManifestPayload,

    /// Ed25519 signature over the signing bytes (hex)
    pub signature: String,
}

impl SignedManifest {
    /// Sign `payload` at `created_at` (Unix seconds).
    pub fn seal<S>(payload: ManifestPayload, created_at: i64, signer: &S) -> ProtocolResult<Self>
    where
        S: ManifestSigner + ?Sized,
    {
        let identifier = payload.identifier();
        let signer_public_key = signer.public_key_hex();
        let bytes = signing_bytes(
            MANIFEST_KIND,
            &identifier,
            created_at,
            &signer_public_key,
            &payload,
        )?;

        let signature = signer.sign(&bytes);

        Ok(Self {
            id: sha256_hex(&bytes),
            kind: MANIFEST_KIND,
            identifier,
            created_at,
            signer_public_key,
            payload,
            signature: hex::encode(signature.to_bytes()),
        })
    }

    /// Full verification: structure, identifier binding, id, and signature.
    pub fn verify(&self) -> ProtocolResult<()> {
        if self.kind != MANIFEST_KIND {
            return Err(ProtocolError::UnsupportedKind(self.kind));
        }

        self.payload.validate()?;

        let expected = self.payload.identifier();
        if expected != self.identifier {
            return Err(ProtocolError::IdentifierMismatch {
                expected: expected.to_string(),
                actual: self.identifier.to_string(),
            });
        }

        let bytes = signing_bytes(
            self.kind,
            &self.identifier,
            self.created_at,
            &self.signer_public_key,
            &self.payload,
        )?;

        let expected_id = sha256_hex(&bytes);
        if expected_id != self.id {
            return Err(ProtocolError::IdMismatch {
                expected: expected_id,
                actual: self.id.clone(),
            });
        }

        let key = decode_verifying_key(&self.signer_public_key)?;
        let signature = decode_signature(&self.signature)?;
        key.verify(&bytes, &signature)
            .map_err(|_| ProtocolError::BadSignature)
    }

    /// Replaceable-event ordering: same identifier and newer, with ties broken
    /// by the lower id.
    pub fn supersedes(&self, other: &SignedManifest) -> bool {
        self.identifier == other.identifier
            && (self.created_at > other.created_at
                || (self.created_at == other.created_at && self.id < other.id))
    }

    /// Serialize to JSON
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Load from JSON
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

fn signing_bytes(
    kind: u32,
    identifier: &ManifestIdentifier,
    created_at: i64,
    signer_public_key: &str,
    payload: &ManifestPayload,
) -> ProtocolResult<Vec<u8>> {
    let input = SigningInput {
        kind,
        identifier,
        created_at,
        signer_public_key,
        payload,
    };
    serde_json_canonicalizer::to_vec(&input)
        .map_err(|e| ProtocolError::Canonicalization(e.to_string()))
}

fn decode_verifying_key(encoded: &str) -> ProtocolResult<VerifyingKey> {
    let bytes = hex::decode(encoded).map_err(|e| ProtocolError::InvalidKey(e.to_string()))?;
    let bytes: [u8; 32] = bytes
        .try_into()
        .map_err(|_| ProtocolError::InvalidKey("key must be 32 bytes".to_string()))?;
    VerifyingKey::from_bytes(&bytes).map_err(|e| ProtocolError::InvalidKey(e.to_string()))
}

fn decode_signature(encoded: &str) -> ProtocolResult<Signature> {
    let bytes =
        hex::decode(encoded).map_err(|e| ProtocolError::InvalidSignature(e.to_string()))?;
    Signature::from_slice(&bytes).map_err(|e| ProtocolError::InvalidSignature(e.to_string()))
}
