// Sealbox — Encrypted Vault
//
// The vault is a SQLCipher database holding the `secrets` and `audit_log`
// tables. The key is applied via PRAGMA before any table is touched and is
// probed immediately, so a wrong key fails at open time rather than on the
// first query.

use std::path::Path;

use rusqlite::Connection;

use super::StoreError;

/// Handle to the open, unlocked vault.
pub struct Vault {
    conn: Connection,
}

impl Vault {
    /// Open (or create) the vault at `path`, keyed with the hex-encoded
    /// 32-byte key derived by the enclave.
    pub fn open(path: &Path, hex_key: &str) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        unlock(&conn, hex_key)?;

        let vault = Self { conn };
        vault.init_schema()?;
        Ok(vault)
    }

    /// Unencrypted in-memory vault, for unit tests only.
    #[cfg(test)]
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let vault = Self {
            conn: Connection::open_in_memory()?,
        };
        vault.init_schema()?;
        Ok(vault)
    }

    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Idempotent schema setup.
    fn init_schema(&self) -> Result<(), StoreError> {
        self.conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS secrets (
                id          TEXT PRIMARY KEY,
                label       TEXT NOT NULL,
                owner       TEXT NOT NULL,
                digest      BLOB NOT NULL,
                created_at  TEXT NOT NULL,
                updated_at  TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS audit_log (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                secret_id   TEXT NOT NULL,
                action      TEXT NOT NULL,
                actor       TEXT NOT NULL,
                timestamp   TEXT NOT NULL,
                details     TEXT
            );

            CREATE INDEX IF NOT EXISTS idx_audit_secret
                ON audit_log(secret_id);

            CREATE INDEX IF NOT EXISTS idx_secrets_label
                ON secrets(label);
            ",
        )?;

        tracing::debug!("Vault schema ready");
        Ok(())
    }
}

/// Apply the SQLCipher key and probe it. A wrong key surfaces from the
/// probe as "file is not a database".
fn unlock(conn: &Connection, hex_key: &str) -> Result<(), StoreError> {
    conn.pragma_update(None, "key", &format!("x'{}'", hex_key))?;
    conn.execute_batch("SELECT count(*) FROM sqlite_master;")
        .map_err(|_| StoreError::InvalidKey)
}

// ─── Tests ───────────────────────────────────────────────────────────────────
