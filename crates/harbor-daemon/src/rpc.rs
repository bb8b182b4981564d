//! JSON-RPC 2.0 over a Unix socket.
//!
//! One request per line, one response per line, answered in order. Amounts
//! travel as decimal strings and addresses as `0x`-prefixed hex.
//!
//! The socket is created owner-only (`0600`). Requests name their `caller`
//! and nothing on the wire proves it, so access to the socket file is the
//! only authentication the node has.
//!
//! ## Error codes
//!
//! | Code   | Meaning |
//! |--------|---------|
//! | -32700 | Parse error |
//! | -32600 | Invalid request |
//! | -32601 | Method not found |
//! | -32602 | Invalid params |
//! | -32603 | Internal error |
//! | -32001 | Access denied |
//! | -32002 | Invalid amount |
//! | -32003 | External call failure |
//! | -32004 | Arithmetic fault |
//! | -32005 | Invalid configuration |

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use harbor_vault::{ErrorKind, VaultError};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};
use tracing::{debug, error, info, warn};

use crate::commands;
use crate::node::NodeError;
use crate::DaemonState;

/// Error codes carried in [`RpcError::code`].
pub mod codes {
    pub const PARSE_ERROR: i32 = -32700;
    pub const INVALID_REQUEST: i32 = -32600;
    pub const METHOD_NOT_FOUND: i32 = -32601;
    pub const INVALID_PARAMS: i32 = -32602;
    pub const INTERNAL_ERROR: i32 = -32603;
    pub const ACCESS_DENIED: i32 = -32001;
    pub const INVALID_AMOUNT: i32 = -32002;
    pub const EXTERNAL_CALL_FAILURE: i32 = -32003;
    pub const ARITHMETIC_FAULT: i32 = -32004;
    pub const INVALID_CONFIGURATION: i32 = -32005;
}

const JSONRPC_VERSION: &str = "2.0";

/// An incoming call. `params` defaults to `null` when omitted.
#[derive(Debug, Deserialize)]
pub struct RpcRequest {
    pub jsonrpc: String,
    pub id: Value,
    pub method: String,
    #[serde(default)]
    pub params: Value,
}

/// Reply to one [`RpcRequest`]. Exactly one of `result` and `error` is set.
#[derive(Debug, Serialize)]
pub struct RpcResponse {
    pub jsonrpc: &'static str,
    pub id: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
}

/// JSON-RPC error object. `message` is a stable upper-case name; details go
/// in `data`.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RpcError {
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl RpcResponse {
    pub fn success(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            id,
            result: Some(result),
            error: None,
        }
    }

    pub fn error(id: Value, error: RpcError) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            id,
            result: None,
            error: Some(error),
        }
    }
}

impl RpcError {
    fn new(code: i32, message: &str, data: Option<Value>) -> Self {
        Self {
            code,
            message: message.to_string(),
            data,
        }
    }

    fn with_detail(code: i32, message: &str, detail: &str) -> Self {
        Self::new(code, message, Some(json!({ "detail": detail })))
    }

    pub fn parse_error() -> Self {
        Self::new(codes::PARSE_ERROR, "PARSE_ERROR", None)
    }

    pub fn invalid_request() -> Self {
        Self::new(codes::INVALID_REQUEST, "INVALID_REQUEST", None)
    }

    pub fn method_not_found(method: &str) -> Self {
        Self::new(
            codes::METHOD_NOT_FOUND,
            "METHOD_NOT_FOUND",
            Some(json!({ "method": method })),
        )
    }

    pub fn invalid_params(detail: &str) -> Self {
        Self::with_detail(codes::INVALID_PARAMS, "INVALID_PARAMS", detail)
    }

    pub fn internal_error(detail: &str) -> Self {
        Self::with_detail(codes::INTERNAL_ERROR, "INTERNAL_ERROR", detail)
    }

    /// A vault operation failed; code and name follow its [`ErrorKind`].
    pub fn vault(err: &VaultError) -> Self {
        let kind = err.kind();
        let (code, message) = match kind {
            ErrorKind::AccessDenied => (codes::ACCESS_DENIED, "ACCESS_DENIED"),
            ErrorKind::InvalidAmount => (codes::INVALID_AMOUNT, "INVALID_AMOUNT"),
            ErrorKind::ExternalCallFailure => {
                (codes::EXTERNAL_CALL_FAILURE, "EXTERNAL_CALL_FAILURE")
            }
            ErrorKind::ArithmeticFault => (codes::ARITHMETIC_FAULT, "ARITHMETIC_FAULT"),
            ErrorKind::InvalidConfiguration => {
                (codes::INVALID_CONFIGURATION, "INVALID_CONFIGURATION")
            }
        };
        Self::new(
            code,
            message,
            Some(json!({ "kind": kind, "detail": err.to_string() })),
        )
    }
}

impl From<NodeError> for RpcError {
    fn from(err: NodeError) -> Self {
        match err {
            NodeError::Vault(e) => RpcError::vault(&e),
            NodeError::Config(detail) => Self::with_detail(
                codes::INVALID_CONFIGURATION,
                "INVALID_CONFIGURATION",
                &detail,
            ),
            other => {
                error!(error = %other, "rpc: internal failure");
                RpcError::internal_error(&other.to_string())
            }
        }
    }
}

/// Serves newline-delimited JSON-RPC on a Unix socket, one task per client.
pub struct RpcServer {
    state: Arc<DaemonState>,
    socket_path: PathBuf,
}

impl RpcServer {
    pub fn new(state: Arc<DaemonState>, socket_path: PathBuf) -> Self {
        Self { state, socket_path }
    }

    /// Bind the socket and accept clients until the task is dropped.
    ///
    /// # Errors
    ///
    /// Returns an error if the socket cannot be bound.
    pub async fn run(&self) -> anyhow::Result<()> {
        let listener = bind_owner_only(&self.socket_path)?;
        info!(socket = %self.socket_path.display(), "rpc: listening");

        loop {
            let stream = match listener.accept().await {
                Ok((stream, _)) => stream,
                Err(e) => {
                    error!(error = %e, "rpc: accept failed");
                    continue;
                }
            };
            let state = Arc::clone(&self.state);
            tokio::spawn(async move {
                if let Err(e) = serve_client(&state, stream).await {
                    warn!(error = %e, "rpc: client dropped");
                }
            });
        }
    }
}

/// Bind `path` and restrict it to the owning user.
fn bind_owner_only(path: &Path) -> anyhow::Result<UnixListener> {
    // A socket left by an unclean exit would make bind fail.
    if path.exists() {
        std::fs::remove_file(path)?;
    }
    let listener = UnixListener::bind(path)?;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
    Ok(listener)
}

/// Answer each request line in order until the client hangs up.
async fn serve_client(state: &Arc<DaemonState>, stream: UnixStream) -> anyhow::Result<()> {
    let (read_half, mut write_half) = stream.into_split();
    let mut lines = BufReader::new(read_half).lines();

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        let response = match serde_json::from_str::<RpcRequest>(&line) {
            Ok(request) => dispatch_request(state, request).await,
            Err(e) => {
                debug!(error = %e, "rpc: unparseable request");
                RpcResponse::error(Value::Null, RpcError::parse_error())
            }
        };
        let mut encoded = serde_json::to_vec(&response)?;
        encoded.push(b'\n');
        write_half.write_all(&encoded).await?;
    }
    Ok(())
}

/// Dispatch a JSON-RPC request to the appropriate command handler.
pub async fn dispatch_request(state: &Arc<DaemonState>, request: RpcRequest) -> RpcResponse {
    let RpcRequest {
        jsonrpc,
        id,
        method,
        params,
    } = request;
    if jsonrpc != JSONRPC_VERSION {
        return RpcResponse::error(id, RpcError::invalid_request());
    }
    let params = &params;
    debug!(%method, "rpc: dispatching");

    let result = match method.as_str() {
        // Depositor commands
        "deposit" => commands::vault::deposit(state, params).await,
        "withdraw" => commands::vault::withdraw(state, params).await,
        "staked_balance" => commands::vault::staked_balance(state, params).await,
        "accrued_reward" => commands::vault::accrued_reward(state, params).await,
        "total_staked" => commands::vault::total_staked(state).await,
        "reward_balance" => commands::vault::reward_balance(state, params).await,

        // Owner commands
        "claim_external_protocol_reward" => {
            commands::admin::claim_external_protocol_reward(state, params).await
        }
        "skim_external_interest" => commands::admin::skim_external_interest(state, params).await,
        "set_reward_token" => commands::admin::set_reward_token(state, params).await,
        "set_vault_authority" => commands::admin::set_vault_authority(state, params).await,
        "transfer_ownership" => commands::admin::transfer_ownership(state, params).await,

        // Diagnostics
        "market_status" => commands::diagnostics::market_status(state).await,
        "recent_events" => commands::diagnostics::recent_events(state, params).await,

        // Development
        "dev_set_price" => commands::admin::dev_set_price(state, params).await,

        other => Err(RpcError::method_not_found(other)),
    };

    match result {
        Ok(value) => RpcResponse::success(id, value),
        Err(err) => {
            debug!(%method, code = err.code, "rpc: request failed");
            RpcResponse::error(id, err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use harbor_vault::AmountViolation;

    #[test]
    fn test_vault_errors_map_to_codes() {
        let err = RpcError::vault(&VaultError::InvalidAmount(AmountViolation::Zero));
        assert_eq!(err.code, codes::INVALID_AMOUNT);
        assert_eq!(err.message, "INVALID_AMOUNT");
        let data = err.data.expect("data");
        assert_eq!(data["kind"], "invalid_amount");
        assert_eq!(data["detail"], "invalid amount: amount must be greater than zero");

        assert_eq!(RpcError::vault(&VaultError::OracleMissing).code, -32005);
        assert_eq!(RpcError::method_not_found("nope").code, -32601);
    }

    #[tokio::test]
    async fn test_socket_is_owner_only() {
        let path = std::env::temp_dir()
            .join(format!("harbor-rpc-{}.sock", std::process::id()));
        std::fs::write(&path, b"stale").expect("stale file");

        let _listener = bind_owner_only(&path).expect("bind");
        let mode = std::fs::metadata(&path).expect("metadata").permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
        std::fs::remove_file(&path).expect("cleanup");
    }

    #[test]
    fn test_node_error_mapping() {
        let err: RpcError = NodeError::Config("vault.min_stake".to_string()).into();
        assert_eq!(err.code, codes::INVALID_CONFIGURATION);

        let err: RpcError = NodeError::Corrupt("bad".to_string()).into();
        assert_eq!(err.code, codes::INTERNAL_ERROR);
    }

    #[test]
    fn test_response_has_result_or_error() {
        let ok = serde_json::to_value(RpcResponse::success(json!(7), json!({"total_staked": "0"})))
            .expect("serialize");
        assert_eq!(ok["jsonrpc"], "2.0");
        assert_eq!(ok["id"], 7);
        assert!(ok.get("error").is_none());

        let failed = serde_json::to_value(RpcResponse::error(
            Value::Null,
            RpcError::internal_error("disk full"),
        ))
        .expect("serialize");
        assert!(failed.get("result").is_none());
        assert_eq!(failed["error"]["code"], -32603);
        assert_eq!(failed["error"]["data"]["detail"], "disk full");
    }

    #[test]
    fn test_params_default_to_null() {
        let request: RpcRequest =
            serde_json::from_str(r#"{"jsonrpc":"2.0","id":1,"method":"total_staked"}"#)
                .expect("parse");
        assert!(request.params.is_null());
    }
}
