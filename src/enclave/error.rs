// Sealbox — Enclave error types

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EnclaveError {
    #[error("Keyring error: {0}")]
    Keyring(String),

    #[error("Key derivation error: {0}")]
    Derivation(String),

    #[error("Entropy error: generated secret has {0} bytes, expected {1}")]
    InsufficientEntropy(usize, usize),
}
