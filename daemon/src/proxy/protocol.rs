//! JSON-RPC 2.0 Protocol Implementation
//!
//! Parsing and serialization of JSON-RPC 2.0 messages on the socket side,
//! plus the mapping from `DriveError` to wire errors.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::DriveError;

/// JSON-RPC 2.0 Request
#[derive(Debug, Clone, Deserialize)]
pub struct JsonRpcRequest {
    /// Protocol version (must be "2.0")
    pub jsonrpc: String,

    /// Request ID for correlating responses
    #[serde(default)]
    pub id: Option<Value>,

    /// Method name (e.g., "drive.folder_create", "drive.file_search")
    pub method: String,

    /// Method parameters
    #[serde(default)]
    pub params: Value,
}

impl JsonRpcRequest {
    /// Check if this is a notification (no id = no response expected)
    pub fn is_notification(&self) -> bool {
        self.id.is_none()
    }

    /// Validate the request structure
    pub fn validate(&self) -> Result<(), String> {
        if self.jsonrpc != "2.0" {
            return Err("Invalid JSON-RPC version, expected '2.0'".to_string());
        }
        if self.method.is_empty() {
            return Err("Method cannot be empty".to_string());
        }
        Ok(())
    }

    /// Parse method into namespace and action
    /// e.g., "drive.folder_create" -> ("drive", "folder_create")
    pub fn parse_method(&self) -> (&str, &str) {
        if let Some((namespace, action)) = self.method.split_once('.') {
            (namespace, action)
        } else {
            (self.method.as_str(), "")
        }
    }
}

/// JSON-RPC 2.0 Response
#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcResponse {
    /// Protocol version
    pub jsonrpc: String,

    /// Request ID (copied from request)
    pub id: Value,

    /// Result (on success)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,

    /// Error (on failure)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

impl JsonRpcResponse {
    /// Create a success response
    pub fn success(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: Some(result),
            error: None,
        }
    }

    /// Create an error response
    pub fn error(id: Value, code: i32, message: impl Into<String>, data: Option<Value>) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: None,
            error: Some(JsonRpcError {
                code,
                message: message.into(),
                data,
            }),
        }
    }

    /// Create a parse error response (for malformed JSON)
    pub fn parse_error(message: impl Into<String>) -> Self {
        Self::error(Value::Null, -32700, message, None)
    }

    /// Create an invalid request error
    pub fn invalid_request(id: Value, message: impl Into<String>) -> Self {
        Self::error(id, -32600, message, None)
    }

    /// Create a method not found error
    pub fn method_not_found(id: Value, method: &str) -> Self {
        Self::error(id, -32601, format!("Method not found: {}", method), None)
    }

    /// Create an invalid params error
    pub fn invalid_params(id: Value, message: impl Into<String>) -> Self {
        Self::error(id, -32602, message, None)
    }

    /// Create an internal error response
    pub fn internal_error(id: Value, message: impl Into<String>) -> Self {
        Self::error(id, -32603, message, None)
    }

    /// Wrap a DriveError, carrying its message to the caller unchanged.
    pub fn drive_error(id: Value, err: &DriveError) -> Self {
        Self::error(id, err.rpc_code(), err.to_string(), None)
    }
}

/// JSON-RPC 2.0 Error Object
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcError {
    /// Error code
    pub code: i32,

    /// Error message
    pub message: String,

    /// Additional error data
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// Batch request support - parse either single request or array of requests
pub fn parse_request(input: &str) -> Result<Vec<JsonRpcRequest>, JsonRpcResponse> {
    let trimmed = input.trim();

    if trimmed.is_empty() {
        return Err(JsonRpcResponse::parse_error("Empty request"));
    }

    // Try parsing as array first
    if trimmed.starts_with('[') {
        match serde_json::from_str::<Vec<JsonRpcRequest>>(trimmed) {
            Ok(requests) => {
                if requests.is_empty() {
                    Err(JsonRpcResponse::invalid_request(
                        Value::Null,
                        "Empty batch request",
                    ))
                } else {
                    Ok(requests)
                }
            }
            Err(e) => Err(JsonRpcResponse::parse_error(e.to_string())),
        }
    } else {
        // Parse as single request
        match serde_json::from_str::<JsonRpcRequest>(trimmed) {
            Ok(request) => Ok(vec![request]),
            Err(e) => Err(JsonRpcResponse::parse_error(e.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_single_request() {
        let input = r#"{"jsonrpc":"2.0","id":1,"method":"drive.folder_search","params":{"query":"Reports"}}"#;
        let requests = parse_request(input).unwrap();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].method, "drive.folder_search");
    }

    #[test]
    fn test_parse_batch_request() {
        let input = r#"[
            {"jsonrpc":"2.0","id":1,"method":"drive.file_search","params":{}},
            {"jsonrpc":"2.0","id":2,"method":"server.status","params":{}}
        ]"#;
        let requests = parse_request(input).unwrap();
        assert_eq!(requests.len(), 2);
    }

    #[test]
    fn test_parse_method() {
        let req = JsonRpcRequest {
            jsonrpc: "2.0".to_string(),
            id: Some(Value::Number(1.into())),
            method: "drive.resolve_folder".to_string(),
            params: Value::Null,
        };
        assert_eq!(req.parse_method(), ("drive", "resolve_folder"));
    }

    #[test]
    fn test_drive_error_mapping() {
        let err = DriveError::InvalidArgument("folder name is required".to_string());
        let resp = JsonRpcResponse::drive_error(Value::Number(7.into()), &err);
        let wire = resp.error.unwrap();
        assert_eq!(wire.code, -32602);
        assert!(wire.message.contains("folder name is required"));
    }

    #[test]
    fn test_backend_error_surfaces_verbatim() {
        let err = DriveError::Backend {
            code: 403,
            message: "The user does not have sufficient permissions".to_string(),
        };
        let resp = JsonRpcResponse::drive_error(Value::Null, &err);
        let wire = resp.error.unwrap();
        assert_eq!(wire.code, -32000);
        assert!(wire.message.contains("sufficient permissions"));
    }

    #[test]
    fn test_success_response() {
        let resp = JsonRpcResponse::success(
            Value::Number(1.into()),
            serde_json::json!({"id": "F123"}),
        );
        assert!(resp.error.is_none());
        assert!(resp.result.is_some());
    }
}
