//! Error types for the A2A gateway

use std::io;

use thiserror::Error;

/// Result type alias for the A2A gateway
pub type Result<T> = std::result::Result<T, Error>;

/// A2A gateway errors
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration source unreadable
    #[error("Failed to read configuration: {0}")]
    ConfigRead(String),

    /// Configuration document malformed
    #[error("Failed to parse configuration: {0}")]
    ConfigParse(String),

    /// Credential hash, backend slug, or task id has no match
    #[error("Not found: {0}")]
    NotFound(String),

    /// Task already terminal or the backend refuses cancellation
    #[error("Task not cancelable: {0}")]
    NotCancelable(String),

    /// Network or stream failure
    #[error("Transport error: {0}")]
    Transport(String),

    /// Caller-side deadline elapsed; the remote task's fate is unknown
    #[error("Deadline exceeded: {0}")]
    DeadlineExceeded(String),

    /// JSON-RPC error returned by a backend
    #[error("JSON-RPC error {code}: {message}")]
    JsonRpc {
        /// Error code
        code: i32,
        /// Error message
        message: String,
        /// Optional data
        data: Option<serde_json::Value>,
    },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a JSON-RPC error
    pub fn json_rpc(code: i32, message: impl Into<String>) -> Self {
        Self::JsonRpc {
            code,
            message: message.into(),
            data: None,
        }
    }

    /// Returns `true` for the expected "nothing to cancel" outcome.
    #[must_use]
    pub fn is_not_cancelable(&self) -> bool {
        match self {
            Self::NotCancelable(_) => true,
            Self::JsonRpc { code, .. } => *code == rpc_codes::TASK_NOT_CANCELABLE,
            _ => false,
        }
    }

    /// Convert to a JSON-RPC error code
    #[must_use]
    pub fn to_rpc_code(&self) -> i32 {
        match self {
            Self::JsonRpc { code, .. } => *code,
            Self::Json(_) => rpc_codes::PARSE_ERROR,
            Self::NotFound(_) => rpc_codes::TASK_NOT_FOUND,
            Self::NotCancelable(_) => rpc_codes::TASK_NOT_CANCELABLE,
            Self::Transport(_) | Self::Http(_) | Self::DeadlineExceeded(_) => -32000,
            _ => rpc_codes::INTERNAL_ERROR,
        }
    }
}

/// JSON-RPC error codes, including the A2A task-protocol range
pub mod rpc_codes {
    /// Parse error - Invalid JSON
    pub const PARSE_ERROR: i32 = -32700;
    /// Invalid Request - Not a valid Request object
    pub const INVALID_REQUEST: i32 = -32600;
    /// Method not found
    pub const METHOD_NOT_FOUND: i32 = -32601;
    /// Invalid params
    pub const INVALID_PARAMS: i32 = -32602;
    /// Internal error
    pub const INTERNAL_ERROR: i32 = -32603;
    /// Task id has no match on the backend
    pub const TASK_NOT_FOUND: i32 = -32001;
    /// Task already terminal or cancellation unsupported
    pub const TASK_NOT_CANCELABLE: i32 = -32002;
    /// Push notifications unsupported by the backend
    pub const PUSH_NOTIFICATION_NOT_SUPPORTED: i32 = -32003;
    /// Operation unsupported by the backend
    pub const UNSUPPORTED_OPERATION: i32 = -32004;
    /// Caller is not authorized for the method or backend
    pub const UNAUTHORIZED: i32 = -32010;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_cancelable_maps_to_a2a_code() {
        let err = Error::NotCancelable("task t1 already completed".to_string());
        assert_eq!(err.to_rpc_code(), rpc_codes::TASK_NOT_CANCELABLE);
        assert!(err.is_not_cancelable());
    }

    #[test]
    fn json_rpc_error_preserves_code() {
        let err = Error::json_rpc(rpc_codes::TASK_NOT_FOUND, "no such task");
        assert_eq!(err.to_rpc_code(), rpc_codes::TASK_NOT_FOUND);
        assert!(!err.is_not_cancelable());
    }

    #[test]
    fn wire_not_cancelable_is_recognized() {
        let err = Error::json_rpc(rpc_codes::TASK_NOT_CANCELABLE, "already terminal");
        assert!(err.is_not_cancelable());
    }
}
