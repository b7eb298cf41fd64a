// Sealbox — Store Module
//
// Owner-gated digest storage in a SQLCipher-encrypted database. Plaintext
// is never persisted; every mutation is audit-logged.

mod vault;
mod error;
mod models;
mod repository;

pub use vault::Vault;
pub use error::StoreError;
pub use models::{Identity, NewSecret, SecretDigest, SecretRecord, SecretSummary, DIGEST_LEN};
pub use repository::{SecretStore, SqliteSecretStore};
