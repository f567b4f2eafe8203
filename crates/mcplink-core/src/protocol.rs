//! MCP wire constants shared by the client transports, the relay and the probe.

/// Protocol version negotiated when a server config does not override it
pub const MCP_PROTOCOL_VERSION: &str = "2025-06-18";

/// Header names that all carry the protocol version on every outbound request.
///
/// Remote servers disagree on the spelling, so every alias is sent at once.
/// HTTP header names are case-insensitive, so each entry here must differ by
/// more than case or it would collapse into another one on the wire.
pub const MCP_VERSION_HEADER_KEYS: &[&str] = &["X-MCP-Version", "MCP-Protocol-Version", "mcp-version"];

/// Session header assigned by Streamable HTTP servers
pub const SESSION_ID_HEADER: &str = "mcp-session-id";

/// Header carrying base64(JSON(header map)) to the relay
pub const FORWARD_HEADERS_HEADER: &str = "x-proxy-forward-headers";

/// Query parameter naming the relayed target URL
pub const TARGET_QUERY_PARAM: &str = "target";

/// Inbound headers the relay copies verbatim even when absent from the bundle
pub const RELAY_PASS_THROUGH_HEADERS: &[&str] = &[
    "mcp-session-id",
    "mcp-protocol-version",
    "x-mcp-version",
    "last-event-id",
];

/// Default Accept header for POSTs: servers may answer with either form
pub const DEFAULT_ACCEPT: &str = "application/json, text/event-stream";

pub const EVENT_STREAM: &str = "text/event-stream";

pub const JSON_CONTENT_TYPE: &str = "application/json";

pub const JSON_UTF8_CONTENT_TYPE: &str = "application/json; charset=utf-8";

/// JSON-RPC method names used by the core
pub mod methods {
    pub const INITIALIZE: &str = "initialize";
    pub const INITIALIZED: &str = "notifications/initialized";
    pub const TOOLS_LIST: &str = "tools/list";
}
