//! Error taxonomy shared by the client, the connection manager and the probe.

use thiserror::Error;

/// Result alias used across the workspace
pub type McpResult<T> = Result<T, McpError>;

/// Errors surfaced by connection management and the MCP transports.
///
/// Cloneable so a single failure can be handed to every pending request of a
/// transport and copied into the registry.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum McpError {
    /// No config exists for the id
    #[error("server '{0}' not found")]
    NotFound(String),

    /// Missing or malformed base URL, or an unusable header
    #[error("invalid server config: {0}")]
    InvalidConfig(String),

    #[error("unsupported transport type: {0}")]
    UnsupportedTransport(String),

    /// The initialize exchange did not produce a result
    #[error("handshake failed: {0}")]
    HandshakeFailure(String),

    #[error("request timed out after {0}s")]
    Timeout(u64),

    /// Non-2xx response from the server (or from the relay)
    #[error("{reason} (HTTP {status})")]
    Http { status: u16, reason: String },

    /// Connection-level failure before a response arrived
    #[error("request failed: {0}")]
    Request(String),

    /// Malformed JSON-RPC or event-stream payload
    #[error("protocol error: {0}")]
    Protocol(String),

    /// JSON-RPC error object returned by the server
    #[error("JSON-RPC error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("transport closed unexpectedly")]
    TransportClosed,

    #[error("relay upstream error: {0}")]
    ProxyUpstream(String),

    /// Config store failure
    #[error("config store error: {0}")]
    Store(String),
}

impl McpError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, McpError::NotFound(_))
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, McpError::Timeout(_))
    }

    pub fn http(status: u16, reason: impl Into<String>) -> Self {
        McpError::Http {
            status,
            reason: reason.into(),
        }
    }
}

impl From<anyhow::Error> for McpError {
    fn from(err: anyhow::Error) -> Self {
        McpError::Store(format!("{:#}", err))
    }
}

impl From<serde_json::Error> for McpError {
    fn from(err: serde_json::Error) -> Self {
        McpError::Protocol(err.to_string())
    }
}
