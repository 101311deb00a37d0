//! Error types for the bridge.
//!
//! All public APIs return `BridgeResult<T>`; no panics in library code.

use thiserror::Error;

/// Unified error type for all bridge operations.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// Opening the transport to the endpoint failed
    #[error("connect to '{uri}' failed: {message}")]
    Connect { uri: String, message: String },

    /// Root sign-in was rejected
    #[error("signin as '{account}' failed: {message}")]
    Auth { account: String, message: String },

    /// Selecting namespace/database on a fresh connection failed
    #[error("use ns '{namespace}' db '{schema}' failed: {message}")]
    Scope {
        namespace: String,
        schema: String,
        message: String,
    },

    /// Store-side rejection of a statement
    #[error("query error: {message}\nSQL: {sql}")]
    Query { message: String, sql: String },

    /// Releasing a cached connection failed (only reported, never propagated by drain)
    #[error("release of session '{key}' failed: {message}")]
    Release { key: String, message: String },

    /// No cached session and auto-creation disabled
    #[error("no session cached for '{key}'")]
    SessionUnavailable { key: String },

    /// Unexpected value shape while decoding a row
    #[error("decode error: {0}")]
    Decode(String),

    /// Malformed response from the store
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Config is missing something the operation needs
    #[error("invalid config: {0}")]
    InvalidConfig(String),

    /// Serialization/deserialization error
    #[error("serialization error: {0}")]
    Serialization(String),

    /// HTTP transport error
    #[cfg(feature = "http")]
    #[error("http error: {0}")]
    Http(String),
}

/// Result type alias for all bridge operations.
pub type BridgeResult<T> = Result<T, BridgeError>;

impl From<serde_json::Error> for BridgeError {
    fn from(err: serde_json::Error) -> Self {
        BridgeError::Serialization(err.to_string())
    }
}

#[cfg(feature = "http")]
impl From<reqwest::Error> for BridgeError {
    fn from(err: reqwest::Error) -> Self {
        BridgeError::Http(err.to_string())
    }
}
