use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

/// Default per-request timeout in seconds
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Wire transport a remote server speaks.
///
/// Unknown strings are preserved so the transport factory can name them
/// when it refuses the config.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum TransportType {
    /// Legacy HTTP+SSE: GET event stream plus POSTs to an announced endpoint
    Sse,
    /// Bidirectional Streamable HTTP: POSTs answered with JSON or an event stream
    StreamableHttp,
    Unsupported(String),
}

impl TransportType {
    pub fn as_str(&self) -> &str {
        match self {
            TransportType::Sse => "sse",
            TransportType::StreamableHttp => "streamableHttp",
            TransportType::Unsupported(other) => other.as_str(),
        }
    }

    pub fn is_supported(&self) -> bool {
        !matches!(self, TransportType::Unsupported(_))
    }
}

impl From<String> for TransportType {
    fn from(value: String) -> Self {
        match value.as_str() {
            "sse" => TransportType::Sse,
            "streamableHttp" | "streamable_http" | "streamable-http" => {
                TransportType::StreamableHttp
            }
            _ => TransportType::Unsupported(value),
        }
    }
}

impl From<&str> for TransportType {
    fn from(value: &str) -> Self {
        TransportType::from(value.to_string())
    }
}

impl From<TransportType> for String {
    fn from(value: TransportType) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for TransportType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Persisted status of a configured server
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServerStatus {
    Active,
    Paused,
    Error,
}

impl ServerStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServerStatus::Active => "active",
            ServerStatus::Paused => "paused",
            ServerStatus::Error => "error",
        }
    }
}

/// Configuration of one remote MCP server, keyed by id in the config store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerConfig {
    #[serde(rename = "type")]
    pub transport_type: TransportType,

    /// Absolute URL of the server (SSE stream or Streamable HTTP endpoint)
    #[serde(default)]
    pub base_url: String,

    /// Caller headers; these win over the computed defaults on collision
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,

    /// Per-request timeout in seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,

    /// Override of the negotiated protocol version
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protocol_version: Option<String>,

    /// Override of the Accept header sent on POSTs
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post_accept: Option<String>,

    /// `None` means never set; a fresh `add` treats it as active
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<ServerStatus>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl ServerConfig {
    pub fn new(transport_type: TransportType, base_url: impl Into<String>) -> Self {
        Self {
            transport_type,
            base_url: base_url.into(),
            headers: BTreeMap::new(),
            timeout: None,
            protocol_version: None,
            post_accept: None,
            status: None,
            name: None,
            description: None,
        }
    }

    pub fn sse(base_url: impl Into<String>) -> Self {
        Self::new(TransportType::Sse, base_url)
    }

    pub fn streamable_http(base_url: impl Into<String>) -> Self {
        Self::new(TransportType::StreamableHttp, base_url)
    }

    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout = Some(secs);
        self
    }

    pub fn with_protocol_version(mut self, version: impl Into<String>) -> Self {
        self.protocol_version = Some(version.into());
        self
    }

    pub fn with_post_accept(mut self, accept: impl Into<String>) -> Self {
        self.post_accept = Some(accept.into());
        self
    }

    pub fn with_status(mut self, status: ServerStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn is_paused(&self) -> bool {
        self.status == Some(ServerStatus::Paused)
    }

    /// Per-request timeout, falling back to 30 seconds.
    ///
    /// A zero value is treated as unset.
    pub fn timeout_duration(&self) -> Duration {
        let secs = match self.timeout {
            Some(secs) if secs > 0 => secs,
            _ => DEFAULT_TIMEOUT_SECS,
        };
        Duration::from_secs(secs)
    }

    /// Protocol version to negotiate (the override or the crate default)
    pub fn protocol_version_or_default(&self) -> &str {
        self.protocol_version
            .as_deref()
            .filter(|v| !v.trim().is_empty())
            .unwrap_or(crate::protocol::MCP_PROTOCOL_VERSION)
    }

    /// Accept header for POSTs (the override unless blank, else the default)
    pub fn post_accept_or_default(&self) -> &str {
        self.post_accept
            .as_deref()
            .filter(|accept| !accept.trim().is_empty())
            .unwrap_or(crate::protocol::DEFAULT_ACCEPT)
    }

    /// Human readable label for logs
    pub fn display_name<'a>(&'a self, id: &'a str) -> &'a str {
        self.name.as_deref().unwrap_or(id)
    }
}
