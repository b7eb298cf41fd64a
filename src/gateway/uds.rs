// Sealbox — Unix Domain Socket Server
//
// Listens on a Unix domain socket for JSON-RPC 2.0 requests. Each
// connection is handled in a spawned tokio task; the caller identity is
// resolved once per connection from SO_PEERCRED and passed explicitly into
// every store operation.

use std::path::{Path, PathBuf};

use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixListener;
use zeroize::Zeroizing;

use crate::store::{
    Identity, NewSecret, SecretDigest, SecretStore, SqliteSecretStore, StoreError, Vault,
};

use super::caller::PeerIdentity;
use super::protocol::{
    RpcRequest, RpcResponse, INTERNAL_ERROR, INVALID_PARAMS, INVALID_REQUEST,
    METHOD_NOT_FOUND, NOT_OWNER,
};

/// Unix Domain Socket server for Sealbox.
pub struct UdsServer {
    db_path: PathBuf,
    hex_key: Zeroizing<String>,
    socket_path: PathBuf,
}

impl UdsServer {
    pub fn new(db_path: PathBuf, hex_key: Zeroizing<String>, socket_path: PathBuf) -> Self {
        Self {
            db_path,
            hex_key,
            socket_path,
        }
    }

    /// Default socket path: `$XDG_RUNTIME_DIR/sealbox/sealbox.sock`,
    /// falling back to `/tmp/sealbox/sealbox.sock`.
    pub fn default_socket_path() -> PathBuf {
        let runtime_dir = std::env::var("XDG_RUNTIME_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"));
        runtime_dir.join("sealbox").join("sealbox.sock")
    }

    /// Start the server. Runs until the process is terminated.
    pub async fn run(&self) -> Result<(), Box<dyn std::error::Error>> {
        if let Some(parent) = self.socket_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        // Remove a stale socket file from a previous run.
        if self.socket_path.exists() {
            tokio::fs::remove_file(&self.socket_path).await?;
        }

        let listener = UnixListener::bind(&self.socket_path)?;
        tracing::info!(
            socket = %self.socket_path.display(),
            "Sealbox UDS server listening"
        );

        // Owner-only socket permissions.
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = std::fs::Permissions::from_mode(0o600);
            std::fs::set_permissions(&self.socket_path, perms)?;
        }

        loop {
            let (stream, _addr) = listener.accept().await?;
            let db_path = self.db_path.clone();
            let hex_key = self.hex_key.clone();

            tokio::spawn(async move {
                if let Err(e) = handle_connection(stream, &db_path, &hex_key).await {
                    tracing::error!("Connection handler error: {}", e);
                }
            });
        }
    }
}

/// Handle one client connection: newline-delimited JSON-RPC requests in,
/// responses out, all on behalf of the peer's resolved identity.
async fn handle_connection(
    stream: tokio::net::UnixStream,
    db_path: &Path,
    hex_key: &str,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let cred = stream.peer_cred()?;

    #[cfg(target_os = "linux")]
    let pid = cred.pid().map(|p| p as u32);
    #[cfg(not(target_os = "linux"))]
    let pid: Option<u32> = None;

    let peer = PeerIdentity::new(cred.uid(), pid);
    let caller = peer.identity();
    tracing::info!(%peer, "Client connected");

    let (reader, mut writer) = stream.into_split();
    let mut lines = BufReader::new(reader).lines();

    while let Ok(Some(line)) = lines.next_line().await {
        let response = process_request(&line, db_path, hex_key, &caller);
        let mut json = serde_json::to_string(&response)?;
        json.push('\n');
        writer.write_all(json.as_bytes()).await?;
        writer.flush().await?;
    }

    Ok(())
}

/// Parse and dispatch a single JSON-RPC request.
fn process_request(
    raw: &str,
    db_path: &Path,
    hex_key: &str,
    caller: &Identity,
) -> RpcResponse {
    let request: RpcRequest = match serde_json::from_str(raw) {
        Ok(req) => req,
        Err(e) => return RpcResponse::parse_error(format!("Parse error: {}", e)),
    };

    if let Err(e) = request.validate() {
        return RpcResponse::error(request.id, INVALID_REQUEST, e);
    }

    let db = match Vault::open(db_path, hex_key) {
        Ok(db) => db,
        Err(e) => {
            return RpcResponse::error(
                request.id,
                INTERNAL_ERROR,
                format!("Store error: {}", e),
            )
        }
    };
    let store = SqliteSecretStore::new(&db);

    match request.method.as_str() {
        "create" => handle_create(&store, request.id, &request.params, caller),
        "update_digest" => handle_update(&store, request.id, &request.params, caller),
        "verify" => handle_verify(&store, request.id, &request.params, caller),
        "get" => handle_get(&store, request.id, &request.params),
        "list" => handle_list(&store, request.id),
        "delete" => handle_delete(&store, request.id, &request.params, caller),
        "audit" => handle_audit(&store, request.id, &request.params),
        _ => RpcResponse::error(
            request.id,
            METHOD_NOT_FOUND,
            format!("Unknown method: {}", request.method),
        ),
    }
}

/// Map a store failure onto the wire. `NotOwner` keeps its own code so
/// clients can tell an authorization failure from a missing record.
fn store_error(id: Value, e: StoreError) -> RpcResponse {
    match e {
        StoreError::NotOwner(_) => RpcResponse::error(id, NOT_OWNER, format!("{}", e)),
        StoreError::NotFound(_) => RpcResponse::error(id, INVALID_PARAMS, format!("{}", e)),
        other => RpcResponse::error(id, INTERNAL_ERROR, format!("{}", other)),
    }
}

// ─── Method Handlers ─────────────────────────────────────────────────────────

fn handle_create(
    store: &SqliteSecretStore<'_>,
    id: Value,
    params: &Value,
    caller: &Identity,
) -> RpcResponse {
    let label = match params.get("label").and_then(|v| v.as_str()) {
        Some(l) if !l.is_empty() => l.to_string(),
        _ => return RpcResponse::error(id, INVALID_PARAMS, "Missing 'label'"),
    };
    let digest = match params.get("digest").and_then(|v| v.as_str()) {
        Some(hex) => match SecretDigest::from_hex(hex) {
            Ok(d) => d,
            Err(e) => return RpcResponse::error(id, INVALID_PARAMS, format!("{}", e)),
        },
        None => return RpcResponse::error(id, INVALID_PARAMS, "Missing 'digest'"),
    };

    match store.create(
        NewSecret {
            label: label.clone(),
            digest,
        },
        caller,
    ) {
        Ok(uuid) => RpcResponse::success(
            id,
            serde_json::json!({ "id": uuid.to_string(), "label": label }),
        ),
        Err(e) => store_error(id, e),
    }
}

fn handle_update(
    store: &SqliteSecretStore<'_>,
    id: Value,
    params: &Value,
    caller: &Identity,
) -> RpcResponse {
    let record_id = match extract_uuid(params) {
        Ok(uuid) => uuid,
        Err(resp) => return resp.with_id(id),
    };
    let digest = match params.get("digest").and_then(|v| v.as_str()) {
        Some(hex) => match SecretDigest::from_hex(hex) {
            Ok(d) => d,
            Err(e) => return RpcResponse::error(id, INVALID_PARAMS, format!("{}", e)),
        },
        None => return RpcResponse::error(id, INVALID_PARAMS, "Missing 'digest'"),
    };

    match store.update_digest(&record_id, digest, caller) {
        Ok(()) => RpcResponse::success(
            id,
            serde_json::json!({ "updated": true, "id": record_id.to_string() }),
        ),
        Err(e) => store_error(id, e),
    }
}

fn handle_verify(
    store: &SqliteSecretStore<'_>,
    id: Value,
    params: &Value,
    caller: &Identity,
) -> RpcResponse {
    let record_id = match extract_uuid(params) {
        Ok(uuid) => uuid,
        Err(resp) => return resp.with_id(id),
    };
    let secret = match params.get("secret").and_then(|v| v.as_str()) {
        Some(s) => s,
        None => return RpcResponse::error(id, INVALID_PARAMS, "Missing 'secret'"),
    };

    match store.verify(&record_id, secret.as_bytes(), caller) {
        Ok(matched) => RpcResponse::success(id, serde_json::json!({ "match": matched })),
        Err(e) => store_error(id, e),
    }
}

fn handle_get(store: &SqliteSecretStore<'_>, id: Value, params: &Value) -> RpcResponse {
    let record_id = match extract_uuid(params) {
        Ok(uuid) => uuid,
        Err(resp) => return resp.with_id(id),
    };

    match store.get(&record_id) {
        Ok(Some(summary)) => {
            let json = serde_json::to_value(&summary).unwrap_or(Value::Null);
            RpcResponse::success(id, json)
        }
        Ok(None) => RpcResponse::error(id, INVALID_PARAMS, "Secret not found"),
        Err(e) => store_error(id, e),
    }
}

fn handle_list(store: &SqliteSecretStore<'_>, id: Value) -> RpcResponse {
    match store.list() {
        Ok(summaries) => {
            let json = serde_json::to_value(&summaries).unwrap_or(Value::Null);
            RpcResponse::success(id, json)
        }
        Err(e) => store_error(id, e),
    }
}

fn handle_delete(
    store: &SqliteSecretStore<'_>,
    id: Value,
    params: &Value,
    caller: &Identity,
) -> RpcResponse {
    let record_id = match extract_uuid(params) {
        Ok(uuid) => uuid,
        Err(resp) => return resp.with_id(id),
    };

    match store.delete(&record_id, caller) {
        Ok(true) => RpcResponse::success(
            id,
            serde_json::json!({ "deleted": true, "id": record_id.to_string() }),
        ),
        Ok(false) => RpcResponse::error(id, INVALID_PARAMS, "Secret not found"),
        Err(e) => store_error(id, e),
    }
}

fn handle_audit(store: &SqliteSecretStore<'_>, id: Value, params: &Value) -> RpcResponse {
    let record_id = match extract_uuid(params) {
        Ok(uuid) => uuid,
        Err(resp) => return resp.with_id(id),
    };

    match store.audit_entries(&record_id) {
        Ok(entries) => RpcResponse::success(id, serde_json::json!({ "entries": entries })),
        Err(e) => store_error(id, e),
    }
}

// ─── Helpers ─────────────────────────────────────────────────────────────────

fn extract_uuid(params: &Value) -> Result<uuid::Uuid, RpcResponse> {
    let id_str = params.get("id").and_then(|v| v.as_str()).ok_or_else(|| {
        RpcResponse::error(Value::Null, INVALID_PARAMS, "Missing 'id' parameter")
    })?;

    uuid::Uuid::parse_str(id_str).map_err(|e| {
        RpcResponse::error(Value::Null, INVALID_PARAMS, format!("Invalid UUID: {}", e))
    })
}

// ─── Tests ───────────────────────────────────────────────────────────────────
