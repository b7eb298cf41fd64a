// Sealbox — Enclave Module
//
// Platform-native master key storage and Argon2id key derivation. The
// master secret lives in the OS keyring (Keychain/DPAPI/libsecret) and is
// stretched into the SQLCipher store key on demand.

mod error;
mod provider;

pub use error::EnclaveError;
pub use provider::{MasterKeyProvider, PlatformKeyring, StoreKey};
