//! Handler Registry
//!
//! Dispatches JSON-RPC requests to the drive handlers.

pub mod common;
pub mod drive;

use serde_json::Value;
use tokio::sync::broadcast;
use tracing::{debug, info};

use super::protocol::{JsonRpcRequest, JsonRpcResponse};

/// Handler registry - dispatches requests to appropriate handlers
pub struct HandlerRegistry {
    shutdown_tx: Option<broadcast::Sender<()>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self { shutdown_tx: None }
    }

    /// Registry whose `server.shutdown` stops the owning server.
    pub fn with_shutdown(shutdown_tx: broadcast::Sender<()>) -> Self {
        Self {
            shutdown_tx: Some(shutdown_tx),
        }
    }

    /// Handle a JSON-RPC request
    pub async fn handle(&self, request: &JsonRpcRequest) -> JsonRpcResponse {
        let id = request.id.clone().unwrap_or(Value::Null);

        debug!("Handling method: {}", request.method);

        let (namespace, action) = request.parse_method();

        match namespace {
            "drive" => drive::handle(action, &request.params, id).await,
            "server" => self.handle_server(action, &request.params, id).await,
            _ => JsonRpcResponse::method_not_found(id, &request.method),
        }
    }

    /// Handle server control methods
    async fn handle_server(&self, action: &str, _params: &Value, id: Value) -> JsonRpcResponse {
        match action {
            "status" => JsonRpcResponse::success(
                id,
                serde_json::json!({
                    "status": "running",
                    "version": env!("CARGO_PKG_VERSION"),
                }),
            ),
            "shutdown" => {
                if let Some(tx) = &self.shutdown_tx {
                    info!("Shutdown requested over socket");
                    let _ = tx.send(());
                }
                JsonRpcResponse::success(id, serde_json::json!({"message": "Shutdown initiated"}))
            }
            _ => JsonRpcResponse::method_not_found(id, &format!("server.{}", action)),
        }
    }
}

impl Default for HandlerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn server_status_reports_version() {
        let registry = HandlerRegistry::new();
        let request = JsonRpcRequest {
            jsonrpc: "2.0".to_string(),
            id: Some(Value::Number(1.into())),
            method: "server.status".to_string(),
            params: Value::Null,
        };
        let resp = registry.handle(&request).await;
        let result = resp.result.unwrap();
        assert_eq!(result["status"], "running");
    }

    #[tokio::test]
    async fn unknown_drive_action_is_method_not_found() {
        let registry = HandlerRegistry::new();
        let request = JsonRpcRequest {
            jsonrpc: "2.0".to_string(),
            id: Some(Value::Number(2.into())),
            method: "drive.delete_everything".to_string(),
            params: Value::Null,
        };
        let resp = registry.handle(&request).await;
        assert_eq!(resp.error.unwrap().code, -32601);
    }
}
