//! Error taxonomy for Drive operations.
//!
//! Every backend failure is surfaced to the caller unchanged; no retry or
//! local recovery happens at this layer. "No match" outcomes are not errors
//! and never appear here.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DriveError {
    /// Caller-supplied parameter is unusable (empty name, malformed
    /// credentials). Raised before any backend call is made.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Google answered with an error envelope. The message is Google's own,
    /// passed through verbatim.
    #[error("Google API error {code}: {message}")]
    Backend { code: i64, message: String },

    /// HTTP 429 from Google. Not retried here.
    #[error("rate limited by Google API")]
    RateLimited,

    /// The request never produced a usable response (connect failure,
    /// timeout, unreadable body).
    #[error("transport error: {0}")]
    Transport(String),

    /// Credential loading or token minting failed.
    #[error("auth error: {0}")]
    Auth(String),

    /// A by-name lookup matched nothing where an existing item was required
    /// (update paths). The resolver never raises this; a resolver miss is
    /// the create path, not a failure.
    #[error("not found: {0}")]
    NotFound(String),
}

impl DriveError {
    /// Map to a JSON-RPC error code.
    ///
    /// Standard codes: -32768 to -32000. Application codes follow the
    /// daemon's own convention below.
    pub fn rpc_code(&self) -> i32 {
        match self {
            DriveError::InvalidArgument(_) => -32602,
            DriveError::Backend { .. } => -32000,
            DriveError::Transport(_) => -32000,
            DriveError::RateLimited => -32002,
            DriveError::Auth(_) => -32010,
            DriveError::NotFound(_) => -32004,
        }
    }
}

impl From<reqwest::Error> for DriveError {
    fn from(err: reqwest::Error) -> Self {
        DriveError::Transport(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_argument_maps_to_invalid_params() {
        let err = DriveError::InvalidArgument("folder name is required".to_string());
        assert_eq!(err.rpc_code(), -32602);
    }

    #[test]
    fn backend_error_keeps_google_message() {
        let err = DriveError::Backend {
            code: 404,
            message: "File not found: abc123".to_string(),
        };
        assert_eq!(err.rpc_code(), -32000);
        assert!(err.to_string().contains("File not found: abc123"));
        assert!(err.to_string().contains("404"));
    }

    #[test]
    fn rate_limit_has_dedicated_code() {
        assert_eq!(DriveError::RateLimited.rpc_code(), -32002);
    }
}
