//! Common Handler Utilities
//!
//! Typed parameter extraction from loose JSON dicts, plus construction of
//! per-request Drive API clients from the global token broker.

use serde_json::Value;
use tracing::error;

use super::super::protocol::JsonRpcResponse;
use crate::auth;
use crate::google::DriveApi;

// ────────────────────────────────────────────────────────────────────────────
// Parameter Extraction Helpers
// ────────────────────────────────────────────────────────────────────────────

/// Extract a required string parameter
pub fn require_string<'a>(
    params: &'a Value,
    key: &str,
    id: &Value,
) -> Result<&'a str, JsonRpcResponse> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| {
            JsonRpcResponse::invalid_params(id.clone(), format!("Missing '{}' parameter", key))
        })
}

/// Extract an optional string parameter (empty string counts as absent)
pub fn optional_string<'a>(params: &'a Value, key: &str) -> Option<&'a str> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
}

/// Extract a string parameter with a default value
pub fn string_with_default<'a>(params: &'a Value, key: &str, default: &'a str) -> &'a str {
    params.get(key).and_then(|v| v.as_str()).unwrap_or(default)
}

/// Extract a bool parameter with a default value
pub fn bool_with_default(params: &Value, key: &str, default: bool) -> bool {
    params.get(key).and_then(|v| v.as_bool()).unwrap_or(default)
}

/// Extract a u64 parameter with a default value. Accepts numeric strings
/// too, the way the original tool parameters arrived.
pub fn u64_with_default(params: &Value, key: &str, default: u64) -> u64 {
    match params.get(key) {
        Some(v) => v
            .as_u64()
            .or_else(|| v.as_str().and_then(|s| s.parse().ok()))
            .unwrap_or(default),
        None => default,
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Drive API construction
// ────────────────────────────────────────────────────────────────────────────

/// Build a Drive API client with a fresh bearer token for this request.
pub async fn drive_api(id: &Value) -> Result<DriveApi, JsonRpcResponse> {
    let broker = auth::broker().map_err(|e| {
        error!("Token broker unavailable: {}", e);
        JsonRpcResponse::drive_error(id.clone(), &e)
    })?;

    let token = broker.access_token().await.map_err(|e| {
        error!("Failed to obtain access token: {}", e);
        JsonRpcResponse::drive_error(id.clone(), &e)
    })?;

    DriveApi::new(token).map_err(|e| JsonRpcResponse::drive_error(id.clone(), &e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn require_string_rejects_empty_and_missing() {
        let id = Value::Number(1.into());
        let params = json!({"name": ""});
        assert!(require_string(&params, "name", &id).is_err());
        assert!(require_string(&params, "other", &id).is_err());

        let params = json!({"name": "Reports"});
        assert_eq!(require_string(&params, "name", &id).unwrap(), "Reports");
    }

    #[test]
    fn u64_accepts_numeric_strings() {
        let params = json!({"max_results": "25"});
        assert_eq!(u64_with_default(&params, "max_results", 10), 25);

        let params = json!({"max_results": 40});
        assert_eq!(u64_with_default(&params, "max_results", 10), 40);

        let params = json!({"max_results": "not a number"});
        assert_eq!(u64_with_default(&params, "max_results", 10), 10);
    }

    #[test]
    fn bool_defaults_apply() {
        let params = json!({});
        assert!(!bool_with_default(&params, "parent_by_name", false));
        let params = json!({"parent_by_name": true});
        assert!(bool_with_default(&params, "parent_by_name", false));
    }
}
