// Sealbox — Secret record data models
//
// SECURITY: a record never holds plaintext, only its one-way digest, and
// the `digest` field is intentionally private. It is never included in
// Debug output, log messages, or serialized responses. The only observable
// fact about a stored digest is whether a candidate hashes to it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;
use std::fmt;

use super::StoreError;

/// Width of every stored digest and every identity fingerprint, in bytes.
pub const DIGEST_LEN: usize = 32;

/// Domain separation tag mixed into uid-derived identities.
const IDENTITY_TAG: &[u8] = b"sealbox/identity/uid/v1";

// ─── SecretDigest ────────────────────────────────────────────────────────────

/// Fixed-width output of the one-way hash applied to a stored secret.
///
/// Every digest in the store is SHA-256, and the same function is used for
/// storage and verification, so digest equality is hash equality.
#[derive(Clone, PartialEq, Eq)]
pub struct SecretDigest([u8; DIGEST_LEN]);

impl SecretDigest {
    /// Hash an arbitrary-length plaintext candidate.
    pub fn compute(plaintext: &[u8]) -> Self {
        let out = Sha256::digest(plaintext);
        Self(out.into())
    }

    /// Wrap raw digest bytes, e.g. read back from the database.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, StoreError> {
        let arr: [u8; DIGEST_LEN] = bytes
            .try_into()
            .map_err(|_| StoreError::MalformedDigest(bytes.len()))?;
        Ok(Self(arr))
    }

    /// Parse a 64-character hex digest, as accepted on the CLI and gateway.
    pub fn from_hex(s: &str) -> Result<Self, StoreError> {
        let bytes =
            hex::decode(s.trim()).map_err(|_| StoreError::MalformedDigest(s.trim().len() / 2))?;
        Self::from_bytes(&bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Full-width equality: every byte is inspected regardless of where the
    /// first mismatch occurs.
    pub fn matches(&self, other: &SecretDigest) -> bool {
        let mut diff = 0u8;
        for (a, b) in self.0.iter().zip(other.0.iter()) {
            diff |= a ^ b;
        }
        diff == 0
    }
}

/// Debug never prints digest bytes.
impl fmt::Debug for SecretDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SecretDigest([REDACTED])")
    }
}

// ─── Identity ────────────────────────────────────────────────────────────────

/// Opaque fingerprint of a principal. Two callers are the same principal
/// exactly when their Identity values are equal.
#[derive(Clone, PartialEq, Eq)]
pub struct Identity([u8; DIGEST_LEN]);

impl Identity {
    /// Derive the identity of a local Unix user from its uid.
    /// Deterministic, so the CLI and the socket gateway agree on who a
    /// given user is.
    pub fn from_uid(uid: u32) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(IDENTITY_TAG);
        hasher.update(uid.to_le_bytes());
        Self(hasher.finalize().into())
    }

    /// Parse an explicit identity supplied as 64 hex characters.
    pub fn from_hex(s: &str) -> Result<Self, StoreError> {
        let bytes = hex::decode(s.trim()).map_err(|_| StoreError::MalformedIdentity)?;
        let arr: [u8; DIGEST_LEN] =
            bytes.try_into().map_err(|_| StoreError::MalformedIdentity)?;
        Ok(Self(arr))
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Identities are not secret, but 64 hex chars drown log lines.
        write!(f, "Identity({}…)", &self.to_hex()[..16])
    }
}

// ─── Records ─────────────────────────────────────────────────────────────────

/// The full secret record as stored. The `digest` field is private — access
/// only via `digest()`, and only to compare against a candidate.
pub struct SecretRecord {
    pub id: Uuid,
    pub label: String,
    /// Set once at creation from the caller identity; never changes.
    pub owner: Identity,
    digest: SecretDigest,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SecretRecord {
    pub fn new(
        id: Uuid,
        label: String,
        owner: Identity,
        digest: SecretDigest,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            label,
            owner,
            digest,
            created_at,
            updated_at,
        }
    }

    /// Access the stored digest.
    /// IMPORTANT: callers must not surface it; the only legitimate use is
    /// equality against a candidate digest.
    pub fn digest(&self) -> &SecretDigest {
        &self.digest
    }

    /// Reduce to the digest-free view.
    pub fn summary(&self) -> SecretSummary {
        SecretSummary {
            id: self.id,
            label: self.label.clone(),
            owner: self.owner.to_hex(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// Custom Debug that never reveals the digest.
impl fmt::Debug for SecretRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecretRecord")
            .field("id", &self.id)
            .field("label", &self.label)
            .field("owner", &self.owner)
            .field("digest", &"[REDACTED]")
            .field("created_at", &self.created_at)
            .field("updated_at", &self.updated_at)
            .finish()
    }
}

impl fmt::Display for SecretRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.id, self.label)
    }
}

/// A lightweight view of a record, used for listing and the gateway.
/// Never contains the digest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecretSummary {
    pub id: Uuid,
    pub label: String,
    /// Owner identity as 64 hex characters.
    pub owner: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl fmt::Display for SecretSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.id, self.label)
    }
}

/// Input struct for creating a new record. The owner is not part of the
/// input: it is always the caller identity at construction time.
pub struct NewSecret {
    pub label: String,
    pub digest: SecretDigest,
}

// ─── Tests ───────────────────────────────────────────────────────────────────
