// Sealbox — Master Key Provider
//
// The key that unlocks the SQLCipher vault is never written to disk. A
// random 256-bit master secret lives in the platform keyring and is
// stretched with Argon2id into the store key on demand. Key material is
// wrapped in Zeroizing and freed as soon as it leaves scope.

use argon2::{Algorithm, Argon2, Params, Version};
use rand::RngCore;
use sha2::{Digest, Sha256};
use zeroize::Zeroizing;

use super::EnclaveError;

/// Service name identifying Sealbox entries in the platform keyring.
const KEYRING_SERVICE: &str = "sealbox-vault";

/// Username for the keyring entry holding the master secret.
const KEYRING_USER: &str = "master-secret";

/// Length of the randomly generated master secret (256-bit entropy).
const MASTER_SECRET_LEN: usize = 32;

/// Length of the derived store key (256-bit for SQLCipher/AES-256).
const STORE_KEY_LEN: usize = 32;

// Argon2id parameters: m=65536 (64 MiB), t=3 iterations, p=4 lanes.
const KDF_M_COST: u32 = 65536;
const KDF_T_COST: u32 = 3;
const KDF_P_COST: u32 = 4;

// ─── StoreKey ────────────────────────────────────────────────────────────────

/// The derived SQLCipher key. The only way out is the hex form the vault
/// PRAGMA expects, itself zeroized on drop.
pub struct StoreKey(Zeroizing<Vec<u8>>);

impl StoreKey {
    pub fn hex(&self) -> Zeroizing<String> {
        Zeroizing::new(hex::encode(self.0.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[cfg(test)]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over master key management, enabling platform-specific
/// backends and mock implementations for testing.
pub trait MasterKeyProvider {
    /// Retrieve the master secret (provisioning a fresh random one on first
    /// use) and stretch it into the store key.
    fn unlock(&self) -> Result<StoreKey, EnclaveError>;

    /// Whether a master secret already exists.
    fn is_provisioned(&self) -> Result<bool, EnclaveError>;

    /// Delete the master secret.
    /// WARNING: this makes the encrypted vault irrecoverable.
    fn reset(&self) -> Result<(), EnclaveError>;
}

// ─── Platform Implementation ─────────────────────────────────────────────────

/// Production backend over the `keyring` crate: D-Bus Secret Service on
/// Linux, Keychain on macOS, Credential Manager on Windows.
pub struct PlatformKeyring {
    service: String,
    user: String,
}

impl PlatformKeyring {
    pub fn new() -> Self {
        Self::with_names(KEYRING_SERVICE, KEYRING_USER)
    }

    /// Custom service/user names, for test isolation.
    pub fn with_names(service: &str, user: &str) -> Self {
        Self {
            service: service.to_string(),
            user: user.to_string(),
        }
    }

    fn entry(&self) -> Result<keyring::Entry, EnclaveError> {
        keyring::Entry::new(&self.service, &self.user)
            .map_err(|e| EnclaveError::Keyring(format!("keyring entry unavailable: {}", e)))
    }

    /// Read the stored master secret, or None when nothing is provisioned.
    fn read_master(&self) -> Result<Option<Zeroizing<Vec<u8>>>, EnclaveError> {
        match self.entry()?.get_secret() {
            Ok(secret) => Ok(Some(Zeroizing::new(secret))),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(EnclaveError::Keyring(format!(
                "could not read master secret: {}",
                e
            ))),
        }
    }
}

impl Default for PlatformKeyring {
    fn default() -> Self {
        Self::new()
    }
}

impl MasterKeyProvider for PlatformKeyring {
    fn unlock(&self) -> Result<StoreKey, EnclaveError> {
        let master = match self.read_master()? {
            Some(existing) => {
                tracing::debug!("Using existing master secret from keyring");
                existing
            }
            None => {
                tracing::info!("No master secret found — provisioning a new one");
                let fresh = generate_master_secret()?;
                self.entry()?.set_secret(&fresh).map_err(|e| {
                    EnclaveError::Keyring(format!("could not store master secret: {}", e))
                })?;
                fresh
            }
        };

        derive_store_key(&master, &build_salt(&self.service, &self.user))
    }

    fn is_provisioned(&self) -> Result<bool, EnclaveError> {
        Ok(self.read_master()?.is_some())
    }

    fn reset(&self) -> Result<(), EnclaveError> {
        match self.entry()?.delete_credential() {
            Ok(()) => {
                tracing::warn!("Master secret deleted — the vault is now irrecoverable");
                Ok(())
            }
            Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(EnclaveError::Keyring(format!(
                "could not delete master secret: {}",
                e
            ))),
        }
    }
}

// ─── Derivation helpers ──────────────────────────────────────────────────────

/// Generate a cryptographically secure random master secret.
fn generate_master_secret() -> Result<Zeroizing<Vec<u8>>, EnclaveError> {
    let mut secret = Zeroizing::new(vec![0u8; MASTER_SECRET_LEN]);
    rand::rng().fill_bytes(&mut secret);

    if secret.len() != MASTER_SECRET_LEN {
        return Err(EnclaveError::InsufficientEntropy(
            secret.len(),
            MASTER_SECRET_LEN,
        ));
    }

    Ok(secret)
}

/// Deterministic Argon2id salt: SHA-256(service || "::" || user).
/// The same master secret always derives the same store key, while the salt
/// stays unique per installation namespace.
fn build_salt(service: &str, user: &str) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(service.as_bytes());
    hasher.update(b"::");
    hasher.update(user.as_bytes());
    hasher.finalize().to_vec()
}

fn derive_store_key(master: &[u8], salt: &[u8]) -> Result<StoreKey, EnclaveError> {
    let params = Params::new(KDF_M_COST, KDF_T_COST, KDF_P_COST, Some(STORE_KEY_LEN))
        .map_err(|e| EnclaveError::Derivation(format!("invalid Argon2 params: {}", e)))?;

    let kdf = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);

    let mut key = Zeroizing::new(vec![0u8; STORE_KEY_LEN]);
    kdf.hash_password_into(master, salt, &mut key)
        .map_err(|e| EnclaveError::Derivation(format!("Argon2id hash failed: {}", e)))?;

    Ok(StoreKey(key))
}

// ─── In-Memory Mock for Testing ──────────────────────────────────────────────

/// Keeps the master secret in memory so unit tests never touch the real
/// platform keyring.
#[cfg(test)]
pub mod mock {
    use super::*;
    use std::sync::Mutex;

    pub struct MemoryKeyProvider {
        secret: Mutex<Option<Vec<u8>>>,
    }

    impl MemoryKeyProvider {
        pub fn new() -> Self {
            Self {
                secret: Mutex::new(None),
            }
        }

        /// Pre-loaded with a known secret.
        pub fn with_secret(secret: Vec<u8>) -> Self {
            Self {
                secret: Mutex::new(Some(secret)),
            }
        }
    }

    impl MasterKeyProvider for MemoryKeyProvider {
        fn unlock(&self) -> Result<StoreKey, EnclaveError> {
            let mut guard = self.secret.lock().unwrap();
            let master = match *guard {
                Some(ref s) => Zeroizing::new(s.clone()),
                None => {
                    let fresh = generate_master_secret()?;
                    *guard = Some(fresh.to_vec());
                    fresh
                }
            };
            derive_store_key(&master, &build_salt("sealbox-test", "test-user"))
        }

        fn is_provisioned(&self) -> Result<bool, EnclaveError> {
            Ok(self.secret.lock().unwrap().is_some())
        }

        fn reset(&self) -> Result<(), EnclaveError> {
            *self.secret.lock().unwrap() = None;
            Ok(())
        }
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::mock::MemoryKeyProvider;
    use super::*;

    #[test]
    fn test_unlock_provisions_on_first_use() {
        let provider = MemoryKeyProvider::new();
        assert!(!provider.is_provisioned().unwrap());

        provider.unlock().unwrap();
        assert!(provider.is_provisioned().unwrap());
    }

    #[test]
    fn test_store_key_has_expected_length() {
        let key = MemoryKeyProvider::new().unlock().unwrap();
        assert_eq!(key.len(), STORE_KEY_LEN);
        assert_eq!(key.hex().len(), STORE_KEY_LEN * 2);
    }

    #[test]
    fn test_derivation_is_deterministic() {
        let provider = MemoryKeyProvider::with_secret(vec![42u8; MASTER_SECRET_LEN]);
        let a = provider.unlock().unwrap();
        let b = provider.unlock().unwrap();
        assert_eq!(
            a.as_bytes(),
            b.as_bytes(),
            "Same master secret must derive the same store key"
        );
    }

    #[test]
    fn test_different_secrets_derive_different_keys() {
        let a = MemoryKeyProvider::with_secret(vec![1u8; MASTER_SECRET_LEN])
            .unlock()
            .unwrap();
        let b = MemoryKeyProvider::with_secret(vec![2u8; MASTER_SECRET_LEN])
            .unlock()
            .unwrap();
        assert_ne!(a.as_bytes(), b.as_bytes());
    }

    #[test]
    fn test_unlock_is_stable_across_calls() {
        let provider = MemoryKeyProvider::new();
        let first = provider.unlock().unwrap();
        let second = provider.unlock().unwrap();
        assert_eq!(first.as_bytes(), second.as_bytes());
    }

    #[test]
    fn test_reset_clears_provisioned_secret() {
        let provider = MemoryKeyProvider::new();
        provider.unlock().unwrap();
        assert!(provider.is_provisioned().unwrap());

        provider.reset().unwrap();
        assert!(!provider.is_provisioned().unwrap());
    }

    #[test]
    fn test_reset_without_secret_is_ok() {
        assert!(MemoryKeyProvider::new().reset().is_ok());
    }

    #[test]
    fn test_salt_differs_by_namespace() {
        assert_ne!(
            build_salt("sealbox-vault", "master-secret"),
            build_salt("sealbox-test", "master-secret")
        );
    }
}
