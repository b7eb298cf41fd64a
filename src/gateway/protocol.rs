// Sealbox — JSON-RPC 2.0 Protocol Types
//
// Hand-rolled JSON-RPC 2.0 plumbing for the UDS gateway; the handful of
// types needed here does not justify a dependency.

use serde::{Deserialize, Serialize};
use serde_json::Value;

const PROTOCOL_VERSION: &str = "2.0";

// Standard JSON-RPC 2.0 error codes, plus the one application code Sealbox
// defines: NOT_OWNER, so clients can tell an authorization failure apart
// from a missing record.
pub const PARSE_ERROR: i32 = -32700;
pub const INVALID_REQUEST: i32 = -32600;
pub const METHOD_NOT_FOUND: i32 = -32601;
pub const INVALID_PARAMS: i32 = -32602;
pub const INTERNAL_ERROR: i32 = -32603;
pub const NOT_OWNER: i32 = -32001;

/// An incoming request line.
#[derive(Debug, Deserialize)]
pub struct RpcRequest {
    pub jsonrpc: String,
    pub method: String,
    #[serde(default)]
    pub params: Value,
    pub id: Value,
}

impl RpcRequest {
    /// Reject anything that is not a well-formed JSON-RPC 2.0 call.
    pub fn validate(&self) -> Result<(), String> {
        if self.jsonrpc != PROTOCOL_VERSION {
            return Err(format!("jsonrpc must be \"{}\"", PROTOCOL_VERSION));
        }
        if self.method.is_empty() {
            return Err("method must not be empty".to_string());
        }
        Ok(())
    }
}

/// An outgoing response line. Exactly one of `result`/`error` is present.
#[derive(Debug, Serialize)]
pub struct RpcResponse {
    pub jsonrpc: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
    pub id: Value,
}

#[derive(Debug, Serialize)]
pub struct RpcError {
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl RpcResponse {
    fn reply(id: Value, result: Option<Value>, error: Option<RpcError>) -> Self {
        Self {
            jsonrpc: PROTOCOL_VERSION.to_string(),
            result,
            error,
            id,
        }
    }

    pub fn success(id: Value, result: Value) -> Self {
        Self::reply(id, Some(result), None)
    }

    pub fn error(id: Value, code: i32, message: impl Into<String>) -> Self {
        let err = RpcError {
            code,
            message: message.into(),
            data: None,
        };
        Self::reply(id, None, Some(err))
    }

    /// The request never parsed, so the id is null.
    pub fn parse_error(message: impl Into<String>) -> Self {
        Self::error(Value::Null, PARSE_ERROR, message)
    }

    /// Swap in the real request id on errors built before it was at hand.
    pub fn with_id(mut self, id: Value) -> Self {
        self.id = id;
        self
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid_request() {
        let req: RpcRequest = serde_json::from_str(
            r#"{"jsonrpc":"2.0","method":"verify","params":{"id":"x"},"id":7}"#,
        )
        .unwrap();
        assert_eq!(req.method, "verify");
        assert!(req.validate().is_ok());
    }

    #[test]
    fn test_missing_params_defaults_to_null() {
        let req: RpcRequest =
            serde_json::from_str(r#"{"jsonrpc":"2.0","method":"list","id":1}"#).unwrap();
        assert_eq!(req.params, Value::Null);
    }

    #[test]
    fn test_wrong_version_fails_validation() {
        let req: RpcRequest =
            serde_json::from_str(r#"{"jsonrpc":"1.0","method":"list","params":{},"id":1}"#)
                .unwrap();
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_success_response_has_no_error_field() {
        let resp =
            RpcResponse::success(Value::Number(1.into()), serde_json::json!({"match": true}));
        let wire = serde_json::to_string(&resp).unwrap();
        assert!(wire.contains("\"result\""));
        assert!(!wire.contains("\"error\""));
    }

    #[test]
    fn test_not_owner_code_serializes() {
        let resp =
            RpcResponse::error(Value::Number(1.into()), NOT_OWNER, "Caller is not the owner");
        let wire = serde_json::to_string(&resp).unwrap();
        assert!(wire.contains("-32001"));
        assert!(!wire.contains("\"result\""));
    }

    #[test]
    fn test_parse_error_has_null_id() {
        let wire = serde_json::to_string(&RpcResponse::parse_error("bad json")).unwrap();
        assert!(wire.contains("\"id\":null"));
        assert!(wire.contains("-32700"));
    }

    #[test]
    fn test_with_id_replaces_id() {
        let resp = RpcResponse::parse_error("x").with_id(Value::Number(9.into()));
        let wire = serde_json::to_string(&resp).unwrap();
        assert!(wire.contains("\"id\":9"));
    }
}
