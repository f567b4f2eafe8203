//! Centralized branding constants
//!
//! All product naming and well-known paths come from this module.

/// Product name used in logs and the relay health check
pub const PRODUCT_NAME: &str = "mcplink";

/// Display name
pub const DISPLAY_NAME: &str = "McpLink";

/// Prefix of the `clientInfo.name` sent during the initialize handshake
pub const CLIENT_NAME_PREFIX: &str = "mcplink-client";

/// Version reported in `clientInfo.version`
pub const CLIENT_VERSION: &str = "1.0.0";

/// Path of the same-origin relay endpoint
pub const RELAY_PATH: &str = "/mcp-proxy";

/// Default port of the relay server
pub const DEFAULT_RELAY_PORT: u16 = 3000;

/// Log file prefix (e.g. `mcplink.2026-01-22.log`)
pub const LOG_PREFIX: &str = "mcplink";

/// Client name used for a given server id, e.g. `mcplink-client-github`
pub fn client_name(server_id: &str) -> String {
    format!("{}-{}", CLIENT_NAME_PREFIX, server_id)
}
