// Sealbox — Secret Store Repository
//
// Implements the owner-gated operations on the encrypted store. Key design
// decision: the stored digest never leaves this module. `verify()` is the
// only way to learn anything about it, and all it ever reveals is whether a
// candidate plaintext hashes to the stored value.

use chrono::{DateTime, Utc};
use rusqlite::params;
use uuid::Uuid;

use super::vault::Vault;
use super::models::{Identity, NewSecret, SecretDigest, SecretRecord, SecretSummary};
use super::StoreError;

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over secret digest storage.
///
/// The caller identity is an explicit parameter on every gated operation;
/// there is no ambient notion of "current caller". An operation either
/// succeeds completely or changes nothing.
pub trait SecretStore {
    /// Create a new record owned by `caller`. Returns the generated handle.
    fn create(&self, secret: NewSecret, caller: &Identity) -> Result<Uuid, StoreError>;

    /// Replace the digest of `id` in full. Owner only. On success an audit
    /// event carrying the owner identity is committed atomically with the
    /// digest swap.
    fn update_digest(
        &self,
        id: &Uuid,
        new_digest: SecretDigest,
        caller: &Identity,
    ) -> Result<(), StoreError>;

    /// Hash `candidate` and compare against the stored digest. Owner only.
    /// No state mutation and no event — verification is deliberately silent.
    fn verify(&self, id: &Uuid, candidate: &[u8], caller: &Identity)
        -> Result<bool, StoreError>;

    /// Get record metadata. Never includes the digest.
    fn get(&self, id: &Uuid) -> Result<Option<SecretSummary>, StoreError>;

    /// List all records (metadata only).
    fn list(&self) -> Result<Vec<SecretSummary>, StoreError>;

    /// Delete a record. Owner only. Returns true if it existed.
    fn delete(&self, id: &Uuid, caller: &Identity) -> Result<bool, StoreError>;

    /// Retrieve the formatted audit history for a record.
    fn audit_entries(&self, id: &Uuid) -> Result<Vec<String>, StoreError>;
}

// ─── SQLite Implementation ──────────────────────────────────────────────────

pub struct SqliteSecretStore<'a> {
    db: &'a Vault,
}

impl<'a> SqliteSecretStore<'a> {
    pub fn new(db: &'a Vault) -> Self {
        Self { db }
    }

    /// Load the full record, digest included. Private: only the gated
    /// operations above may look at what comes back.
    fn fetch(&self, id: &Uuid) -> Result<Option<SecretRecord>, StoreError> {
        let mut stmt = self.db.conn().prepare(
            "SELECT id, label, owner, digest, created_at, updated_at
             FROM secrets WHERE id = ?1",
        )?;

        let mut rows = stmt.query_map(params![id.to_string()], Self::row_to_record)?;

        match rows.next() {
            Some(Ok(record)) => Ok(Some(record)),
            Some(Err(e)) => Err(StoreError::Database(e)),
            None => Ok(None),
        }
    }

    fn row_to_record(row: &rusqlite::Row<'_>) -> rusqlite::Result<SecretRecord> {
        let id_str: String = row.get(0)?;
        let label: String = row.get(1)?;
        let owner_hex: String = row.get(2)?;
        let digest_blob: Vec<u8> = row.get(3)?;
        let created_at_str: String = row.get(4)?;
        let updated_at_str: String = row.get(5)?;

        let id = Uuid::parse_str(&id_str).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
        })?;
        let owner = Identity::from_hex(&owner_hex).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(2, rusqlite::types::Type::Text, Box::new(e))
        })?;
        let digest = SecretDigest::from_bytes(&digest_blob).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(3, rusqlite::types::Type::Blob, Box::new(e))
        })?;

        Ok(SecretRecord::new(
            id,
            label,
            owner,
            digest,
            parse_utc(&created_at_str),
            parse_utc(&updated_at_str),
        ))
    }

    /// Write an entry to the audit log outside any caller transaction.
    fn log_event(
        &self,
        secret_id: &Uuid,
        action: &str,
        actor: &Identity,
        details: Option<&str>,
    ) -> Result<(), StoreError> {
        self.db.conn().execute(
            "INSERT INTO audit_log (secret_id, action, actor, timestamp, details)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                secret_id.to_string(),
                action,
                actor.to_hex(),
                Utc::now().to_rfc3339(),
                details,
            ],
        )?;

        tracing::debug!(
            secret_id = %secret_id,
            action = %action,
            "Audit log entry recorded"
        );

        Ok(())
    }
}

fn parse_utc(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

impl<'a> SecretStore for SqliteSecretStore<'a> {
    fn create(&self, secret: NewSecret, caller: &Identity) -> Result<Uuid, StoreError> {
        let id = Uuid::new_v4();
        let now = Utc::now().to_rfc3339();

        self.db.conn().execute(
            "INSERT INTO secrets (id, label, owner, digest, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                id.to_string(),
                secret.label,
                caller.to_hex(),
                secret.digest.as_bytes(),
                now,
                now,
            ],
        )?;

        self.log_event(&id, "created", caller, None)?;

        tracing::info!(
            secret_id = %id,
            label = %secret.label,
            "Secret digest stored"
        );

        Ok(id)
    }

    fn update_digest(
        &self,
        id: &Uuid,
        new_digest: SecretDigest,
        caller: &Identity,
    ) -> Result<(), StoreError> {
        let record = self.fetch(id)?.ok_or(StoreError::NotFound(*id))?;

        // Precondition check before any write: a failed call changes nothing.
        if record.owner != *caller {
            return Err(StoreError::NotOwner(*id));
        }

        // The digest swap and its notification event land in one transaction.
        let tx = self.db.conn().unchecked_transaction()?;
        tx.execute(
            "UPDATE secrets SET digest = ?1, updated_at = ?2 WHERE id = ?3",
            params![
                new_digest.as_bytes(),
                Utc::now().to_rfc3339(),
                id.to_string(),
            ],
        )?;
        tx.execute(
            "INSERT INTO audit_log (secret_id, action, actor, timestamp, details)
             VALUES (?1, 'digest_updated', ?2, ?3, NULL)",
            params![
                id.to_string(),
                record.owner.to_hex(),
                Utc::now().to_rfc3339(),
            ],
        )?;
        tx.commit()?;

        tracing::info!(secret_id = %id, owner = ?record.owner, "Digest replaced");

        Ok(())
    }

    fn verify(
        &self,
        id: &Uuid,
        candidate: &[u8],
        caller: &Identity,
    ) -> Result<bool, StoreError> {
        let record = self.fetch(id)?.ok_or(StoreError::NotFound(*id))?;

        if record.owner != *caller {
            return Err(StoreError::NotOwner(*id));
        }

        Ok(SecretDigest::compute(candidate).matches(record.digest()))
    }

    fn get(&self, id: &Uuid) -> Result<Option<SecretSummary>, StoreError> {
        Ok(self.fetch(id)?.map(|record| record.summary()))
    }

    fn list(&self) -> Result<Vec<SecretSummary>, StoreError> {
        let mut stmt = self.db.conn().prepare(
            "SELECT id, label, owner, digest, created_at, updated_at
             FROM secrets ORDER BY created_at DESC",
        )?;

        let rows = stmt.query_map([], Self::row_to_record)?;

        let mut summaries = Vec::new();
        for row in rows {
            summaries.push(row?.summary());
        }

        Ok(summaries)
    }

    fn delete(&self, id: &Uuid, caller: &Identity) -> Result<bool, StoreError> {
        let record = match self.fetch(id)? {
            Some(r) => r,
            None => return Ok(false),
        };

        if record.owner != *caller {
            return Err(StoreError::NotOwner(*id));
        }

        self.db.conn().execute(
            "DELETE FROM secrets WHERE id = ?1",
            params![id.to_string()],
        )?;

        // The audit log has no FK constraint, so deleted records keep their
        // history.
        self.log_event(id, "deleted", caller, None)?;
        tracing::info!(secret_id = %id, "Secret record deleted");

        Ok(true)
    }

    fn audit_entries(&self, id: &Uuid) -> Result<Vec<String>, StoreError> {
        let mut stmt = self.db.conn().prepare(
            "SELECT action, actor, timestamp, details FROM audit_log
             WHERE secret_id = ?1 ORDER BY id ASC",
        )?;

        let rows = stmt.query_map(params![id.to_string()], |row| {
            let action: String = row.get(0)?;
            let actor: String = row.get(1)?;
            let timestamp_str: String = row.get(2)?;
            let details: Option<String> = row.get(3)?;

            let ts = parse_utc(&timestamp_str);
            let mut formatted = format!(
                "[{}] {} by {}",
                ts.format("%Y-%m-%d %H:%M:%S"),
                action,
                actor
            );
            if let Some(d) = details {
                formatted.push_str(&format!(" ({})", d));
            }
            Ok(formatted)
        })?;

        let mut entries = Vec::new();
        for row in rows {
            entries.push(row?);
        }

        Ok(entries)
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn owner() -> Identity {
        Identity::from_uid(1000)
    }

    fn intruder() -> Identity {
        Identity::from_uid(4242)
    }

    /// Create a store holding one record with digest = SHA-256("hunter2").
    fn setup() -> (Vault, Uuid) {
        let db = Vault::open_in_memory().unwrap();
        let store = SqliteSecretStore::new(&db);
        let id = store
            .create(
                NewSecret {
                    label: "shell account".to_string(),
                    digest: SecretDigest::compute(b"hunter2"),
                },
                &owner(),
            )
            .unwrap();
        (db, id)
    }

    fn audit_count(db: &Vault, id: &Uuid, action: &str) -> i64 {
        db.conn()
            .query_row(
                "SELECT count(*) FROM audit_log WHERE secret_id = ?1 AND action = ?2",
                params![id.to_string(), action],
                |row| row.get(0),
            )
            .unwrap()
    }

    #[test]
    fn test_create_returns_random_uuid() {
        let (_db, id) = setup();
        assert_eq!(id.get_version(), Some(uuid::Version::Random));
    }

    #[test]
    fn test_create_writes_audit_entry() {
        let (db, id) = setup();
        assert_eq!(audit_count(&db, &id, "created"), 1);
    }

    #[test]
    fn test_owner_verify_matches_iff_hash_matches() {
        let (db, id) = setup();
        let store = SqliteSecretStore::new(&db);

        assert!(store.verify(&id, b"hunter2", &owner()).unwrap());
        assert!(!store.verify(&id, b"wrong", &owner()).unwrap());
    }

    #[test]
    fn test_non_owner_verify_fails() {
        let (db, id) = setup();
        let store = SqliteSecretStore::new(&db);

        match store.verify(&id, b"hunter2", &intruder()) {
            Err(StoreError::NotOwner(failed_id)) => assert_eq!(failed_id, id),
            other => panic!("Expected NotOwner, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_non_owner_update_fails_and_leaves_digest_unchanged() {
        let (db, id) = setup();
        let store = SqliteSecretStore::new(&db);

        let result =
            store.update_digest(&id, SecretDigest::compute(b"hijacked"), &intruder());
        assert!(matches!(result, Err(StoreError::NotOwner(_))));

        // Old digest still in place, and no update event was recorded.
        assert!(store.verify(&id, b"hunter2", &owner()).unwrap());
        assert!(!store.verify(&id, b"hijacked", &owner()).unwrap());
        assert_eq!(audit_count(&db, &id, "digest_updated"), 0);
    }

    #[test]
    fn test_update_then_verify_reflects_new_digest() {
        let (db, id) = setup();
        let store = SqliteSecretStore::new(&db);

        store
            .update_digest(&id, SecretDigest::compute(b"newpass"), &owner())
            .unwrap();

        assert!(!store.verify(&id, b"hunter2", &owner()).unwrap());
        assert!(store.verify(&id, b"newpass", &owner()).unwrap());
    }

    #[test]
    fn test_update_emits_event_carrying_owner_identity() {
        let (db, id) = setup();
        let store = SqliteSecretStore::new(&db);

        store
            .update_digest(&id, SecretDigest::compute(b"newpass"), &owner())
            .unwrap();

        let actor: String = db
            .conn()
            .query_row(
                "SELECT actor FROM audit_log WHERE secret_id = ?1 AND action = 'digest_updated'",
                params![id.to_string()],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(actor, owner().to_hex());
    }

    #[test]
    fn test_verify_is_silent() {
        let (db, id) = setup();
        let store = SqliteSecretStore::new(&db);

        let before: i64 = db
            .conn()
            .query_row("SELECT count(*) FROM audit_log", [], |row| row.get(0))
            .unwrap();

        store.verify(&id, b"hunter2", &owner()).unwrap();
        store.verify(&id, b"wrong", &owner()).unwrap();

        let after: i64 = db
            .conn()
            .query_row("SELECT count(*) FROM audit_log", [], |row| row.get(0))
            .unwrap();
        assert_eq!(before, after, "Verification must not write audit entries");
    }

    #[test]
    fn test_owner_is_invariant_across_operations() {
        let (db, id) = setup();
        let store = SqliteSecretStore::new(&db);

        let before = store.get(&id).unwrap().unwrap().owner;

        store
            .update_digest(&id, SecretDigest::compute(b"rotated"), &owner())
            .unwrap();
        store.verify(&id, b"rotated", &owner()).unwrap();

        let after = store.get(&id).unwrap().unwrap().owner;
        assert_eq!(before, after);
        assert_eq!(after, owner().to_hex());
    }

    #[test]
    fn test_update_nonexistent_returns_not_found() {
        let db = Vault::open_in_memory().unwrap();
        let store = SqliteSecretStore::new(&db);

        let missing = Uuid::new_v4();
        let result =
            store.update_digest(&missing, SecretDigest::compute(b"x"), &owner());
        assert!(matches!(result, Err(StoreError::NotFound(_))));
    }

    #[test]
    fn test_get_nonexistent_returns_none() {
        let db = Vault::open_in_memory().unwrap();
        let store = SqliteSecretStore::new(&db);
        assert!(store.get(&Uuid::new_v4()).unwrap().is_none());
    }

    #[test]
    fn test_list_returns_summaries() {
        let db = Vault::open_in_memory().unwrap();
        let store = SqliteSecretStore::new(&db);

        for label in ["email", "vpn", "disk encryption"] {
            store
                .create(
                    NewSecret {
                        label: label.to_string(),
                        digest: SecretDigest::compute(label.as_bytes()),
                    },
                    &owner(),
                )
                .unwrap();
        }

        let summaries = store.list().unwrap();
        assert_eq!(summaries.len(), 3);
        for summary in &summaries {
            let json = serde_json::to_string(summary).unwrap();
            assert!(!json.contains("digest"), "Summaries must never carry digests");
        }
    }

    #[test]
    fn test_delete_is_owner_gated() {
        let (db, id) = setup();
        let store = SqliteSecretStore::new(&db);

        let result = store.delete(&id, &intruder());
        assert!(matches!(result, Err(StoreError::NotOwner(_))));
        assert!(store.get(&id).unwrap().is_some(), "Record must survive");

        assert!(store.delete(&id, &owner()).unwrap());
        assert!(store.get(&id).unwrap().is_none());
        assert_eq!(audit_count(&db, &id, "deleted"), 1);
    }

    #[test]
    fn test_delete_nonexistent_returns_false() {
        let db = Vault::open_in_memory().unwrap();
        let store = SqliteSecretStore::new(&db);
        assert!(!store.delete(&Uuid::new_v4(), &owner()).unwrap());
    }

    #[test]
    fn test_audit_entries_are_ordered_and_formatted() {
        let (db, id) = setup();
        let store = SqliteSecretStore::new(&db);

        store
            .update_digest(&id, SecretDigest::compute(b"newpass"), &owner())
            .unwrap();

        let entries = store.audit_entries(&id).unwrap();
        assert_eq!(entries.len(), 2);
        assert!(entries[0].contains("created"));
        assert!(entries[1].contains("digest_updated"));
        assert!(entries[1].contains(&owner().to_hex()));
    }

    #[test]
    fn test_full_lifecycle() {
        let db = Vault::open_in_memory().unwrap();
        let store = SqliteSecretStore::new(&db);

        let id = store
            .create(
                NewSecret {
                    label: "master passphrase".to_string(),
                    digest: SecretDigest::compute(b"hunter2"),
                },
                &owner(),
            )
            .unwrap();

        assert!(store.verify(&id, b"hunter2", &owner()).unwrap());

        store
            .update_digest(&id, SecretDigest::compute(b"newpass"), &owner())
            .unwrap();
        assert!(!store.verify(&id, b"hunter2", &owner()).unwrap());
        assert!(store.verify(&id, b"newpass", &owner()).unwrap());

        assert_eq!(store.list().unwrap().len(), 1);
        assert!(store.delete(&id, &owner()).unwrap());
        assert!(store.list().unwrap().is_empty());

        // created + digest_updated + deleted
        let audit: i64 = db
            .conn()
            .query_row(
                "SELECT count(*) FROM audit_log WHERE secret_id = ?1",
                params![id.to_string()],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(audit, 3);
    }
}
