// Sealbox — CLI Command Handlers
//
// Each function handles one CLI subcommand, coordinating the enclave
// (master key) and store modules. Plaintext from the command line is
// hashed locally and zeroized; it never reaches the database or the log.

use std::path::PathBuf;

use uuid::Uuid;
use zeroize::Zeroizing;

use crate::enclave::{MasterKeyProvider, PlatformKeyring};
use crate::error::SealboxError;
use crate::gateway::UdsServer;
use crate::store::{
    Identity, NewSecret, SecretDigest, SecretStore, SqliteSecretStore, StoreError, Vault,
};

use super::{Cli, Commands};

/// Default directory for Sealbox data files.
fn data_dir() -> PathBuf {
    let base = dirs_next::data_dir().unwrap_or_else(|| PathBuf::from("."));
    base.join("sealbox")
}

/// Path to the encrypted store file.
fn db_path() -> PathBuf {
    data_dir().join("sealbox.db")
}

/// Execute the parsed CLI command.
pub async fn execute(cli: Cli) -> Result<(), SealboxError> {
    let identity_flag = cli.identity;

    match cli.command {
        Commands::Init => cmd_init(),
        Commands::Serve => cmd_serve().await,
        Commands::Create {
            label,
            secret,
            digest,
        } => cmd_create(label, secret, digest, &resolve_identity(identity_flag.as_deref())?),
        Commands::Update { id, secret, digest } => {
            cmd_update(id, secret, digest, &resolve_identity(identity_flag.as_deref())?)
        }
        Commands::Verify { id, secret } => {
            cmd_verify(id, secret, &resolve_identity(identity_flag.as_deref())?)
        }
        Commands::List => cmd_list(),
        Commands::Show { id } => cmd_show(id),
        Commands::Delete { id } => cmd_delete(id, &resolve_identity(identity_flag.as_deref())?),
        Commands::Audit { id } => cmd_audit(id),
    }
}

// ─── Identity resolution ─────────────────────────────────────────────────────

/// The caller identity: an explicit `--identity` override, or the identity
/// derived from the invoking user's uid.
fn resolve_identity(flag: Option<&str>) -> Result<Identity, SealboxError> {
    match flag {
        Some(hex) => Ok(Identity::from_hex(hex)?),
        None => local_identity(),
    }
}

#[cfg(unix)]
fn local_identity() -> Result<Identity, SealboxError> {
    use std::os::unix::fs::MetadataExt;

    let home = dirs_next::home_dir()
        .ok_or_else(|| SealboxError::Other("cannot determine home directory".to_string()))?;
    let uid = std::fs::metadata(&home)?.uid();
    Ok(Identity::from_uid(uid))
}

#[cfg(not(unix))]
fn local_identity() -> Result<Identity, SealboxError> {
    Err(SealboxError::Other(
        "no local identity source on this platform — pass --identity".to_string(),
    ))
}

// ─── Init ────────────────────────────────────────────────────────────────────

fn cmd_init() -> Result<(), SealboxError> {
    let provider = PlatformKeyring::new();

    std::fs::create_dir_all(data_dir())?;

    let key = provider.unlock()?;
    let path = db_path();
    let _db = Vault::open(&path, &key.hex())?;

    println!("✓ Sealbox initialized");
    println!("  Store: {}", path.display());
    println!("  Master key stored in platform keyring");
    println!();
    println!("Next: create a record with `sealbox create --label <name> --secret <value>`");

    Ok(())
}

// ─── Create ──────────────────────────────────────────────────────────────────

fn cmd_create(
    label: String,
    secret: Option<String>,
    digest: Option<String>,
    caller: &Identity,
) -> Result<(), SealboxError> {
    let digest = digest_from_args(secret, digest)?;

    let db = open_db()?;
    let store = SqliteSecretStore::new(&db);

    let id = store.create(
        NewSecret {
            label: label.clone(),
            digest,
        },
        caller,
    )?;

    println!("✓ Secret record created");
    println!("  ID:    {}", id);
    println!("  Label: {}", label);

    Ok(())
}

// ─── Update ──────────────────────────────────────────────────────────────────

fn cmd_update(
    id_str: String,
    secret: Option<String>,
    digest: Option<String>,
    caller: &Identity,
) -> Result<(), SealboxError> {
    let id = parse_uuid(&id_str)?;
    let digest = digest_from_args(secret, digest)?;

    let db = open_db()?;
    let store = SqliteSecretStore::new(&db);

    store.update_digest(&id, digest, caller)?;
    println!("✓ Digest replaced for {}", id);

    Ok(())
}

// ─── Verify ──────────────────────────────────────────────────────────────────

fn cmd_verify(id_str: String, secret: String, caller: &Identity) -> Result<(), SealboxError> {
    let id = parse_uuid(&id_str)?;
    let candidate = Zeroizing::new(secret);

    let db = open_db()?;
    let store = SqliteSecretStore::new(&db);

    if store.verify(&id, candidate.as_bytes(), caller)? {
        println!("✓ Candidate matches the stored digest");
    } else {
        println!("✗ Candidate does not match");
    }

    Ok(())
}

// ─── List ────────────────────────────────────────────────────────────────────

fn cmd_list() -> Result<(), SealboxError> {
    let db = open_db()?;
    let store = SqliteSecretStore::new(&db);

    let summaries = store.list()?;

    if summaries.is_empty() {
        println!("No secret records yet.");
        println!("Create one with: sealbox create --label <name> --secret <value>");
        return Ok(());
    }

    println!("Secret records ({}):\n", summaries.len());
    for summary in &summaries {
        println!(
            "  {} │ {:20} │ owner {}… │ {}",
            summary.id,
            summary.label,
            &summary.owner[..16],
            summary.updated_at.format("%Y-%m-%d %H:%M"),
        );
    }

    Ok(())
}

// ─── Show ────────────────────────────────────────────────────────────────────

fn cmd_show(id_str: String) -> Result<(), SealboxError> {
    let id = parse_uuid(&id_str)?;

    let db = open_db()?;
    let store = SqliteSecretStore::new(&db);

    match store.get(&id)? {
        Some(summary) => {
            println!("Secret record:\n");
            println!("  ID:      {}", summary.id);
            println!("  Label:   {}", summary.label);
            println!("  Owner:   {}", summary.owner);
            println!("  Digest:  [REDACTED]"); // Only verification may observe it.
            println!("  Created: {}", summary.created_at.format("%Y-%m-%d %H:%M:%S UTC"));
            println!("  Updated: {}", summary.updated_at.format("%Y-%m-%d %H:%M:%S UTC"));
        }
        None => {
            println!("Secret record not found: {}", id);
        }
    }

    Ok(())
}

// ─── Delete ──────────────────────────────────────────────────────────────────

fn cmd_delete(id_str: String, caller: &Identity) -> Result<(), SealboxError> {
    let id = parse_uuid(&id_str)?;

    let db = open_db()?;
    let store = SqliteSecretStore::new(&db);

    if store.delete(&id, caller)? {
        println!("✓ Secret record {} deleted", id);
    } else {
        println!("Secret record not found: {}", id);
    }

    Ok(())
}

// ─── Audit ───────────────────────────────────────────────────────────────────

fn cmd_audit(id_str: String) -> Result<(), SealboxError> {
    let id = parse_uuid(&id_str)?;

    let db = open_db()?;
    let store = SqliteSecretStore::new(&db);

    let entries = store.audit_entries(&id)?;

    if entries.is_empty() {
        println!("No audit entries for record: {}", id);
        return Ok(());
    }

    println!("Audit log for record: {}", id);
    println!("{:-<80}", "");
    for entry in entries {
        println!("{}", entry);
    }
    println!("{:-<80}", "");

    Ok(())
}

// ─── Serve ───────────────────────────────────────────────────────────────────

async fn cmd_serve() -> Result<(), SealboxError> {
    let provider = PlatformKeyring::new();

    if !provider.is_provisioned()? {
        return Err(SealboxError::Store(StoreError::NotInitialized));
    }
    let path = db_path();
    if !path.exists() {
        return Err(SealboxError::Store(StoreError::NotInitialized));
    }

    let key = provider.unlock()?;
    let socket_path = UdsServer::default_socket_path();
    println!("Starting Sealbox UDS server at {}...", socket_path.display());

    let server = UdsServer::new(path, key.hex(), socket_path);
    server
        .run()
        .await
        .map_err(|e| SealboxError::Other(format!("UDS server error: {}", e)))
}

// ─── Helpers ─────────────────────────────────────────────────────────────────

fn parse_uuid(s: &str) -> Result<Uuid, SealboxError> {
    Uuid::parse_str(s).map_err(|e| SealboxError::Other(format!("Invalid UUID: {}", e)))
}

/// Resolve the `--secret`/`--digest` pair into a digest. Plaintext is
/// hashed here, in process, and zeroized on drop.
fn digest_from_args(
    secret: Option<String>,
    digest: Option<String>,
) -> Result<SecretDigest, SealboxError> {
    match (secret, digest) {
        (Some(plain), None) => {
            let plain = Zeroizing::new(plain);
            Ok(SecretDigest::compute(plain.as_bytes()))
        }
        (None, Some(hex)) => Ok(SecretDigest::from_hex(&hex)?),
        _ => Err(SealboxError::Other(
            "pass exactly one of --secret or --digest".to_string(),
        )),
    }
}

/// Open the encrypted store, failing early when `sealbox init` has not run.
fn open_db() -> Result<Vault, SealboxError> {
    let provider = PlatformKeyring::new();

    if !provider.is_provisioned()? {
        return Err(SealboxError::Store(StoreError::NotInitialized));
    }

    let path = db_path();
    if !path.exists() {
        return Err(SealboxError::Store(StoreError::NotInitialized));
    }

    let key = provider.unlock()?;
    Ok(Vault::open(&path, &key.hex())?)
}

// ─── Tests ───────────────────────────────────────────────────────────────────
