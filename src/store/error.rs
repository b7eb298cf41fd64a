// Sealbox — Store error types

use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum StoreError {
    /// The caller identity does not match the record owner. Permanent
    /// authorization failure: surfaced to the caller, never retried, and
    /// the failing operation changes no state.
    #[error("Caller is not the owner of secret {0}")]
    NotOwner(Uuid),

    #[error("Secret not found: {0}")]
    NotFound(Uuid),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Malformed digest: expected 32 bytes, got {0}")]
    MalformedDigest(usize),

    #[error("Malformed identity: expected 64 hex characters")]
    MalformedIdentity,

    #[error("Store not initialized — run `sealbox init` first")]
    NotInitialized,

    #[error("Invalid store key — store may be corrupted or the key is wrong")]
    InvalidKey,

    #[error("{0}")]
    Other(String),
}
