//! Shared test utilities and fixtures for McpLink integration tests.

pub use mcplink_core::{
    DisplayStatus, McpError, ServerCatalog, ServerConfig, ServerStatus, TransportType,
};

pub use mocks::MockConfigStore;


/// Test fixture utilities
pub mod fixtures {
    use serde_json::{json, Value};

    /// Tool descriptor as a server would list it
    pub fn tool_json(name: &str) -> Value {
        json!({
            "name": name,
            "description": format!("Test tool: {}", name),
            "inputSchema": { "type": "object", "properties": {} }
        })
    }

    /// `initialize` result announcing tool support
    pub fn initialize_result(server_name: &str) -> Value {
        json!({
            "protocolVersion": mcplink_core::protocol::MCP_PROTOCOL_VERSION,
            "capabilities": { "tools": { "listChanged": false } },
            "serverInfo": { "name": server_name, "version": "0.1.0" }
        })
    }

    /// An address nothing listens on
    pub fn unreachable_url() -> String {
        "http://127.0.0.1:9/mcp".to_string()
    }
}

/// Async test helpers
pub mod async_helpers {
    use std::time::Duration;

    /// Default test timeout (5 seconds)
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

    /// Route `tracing` output through the test harness; safe to call repeatedly
    pub fn init_test_tracing() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
            )
            .with_test_writer()
            .try_init();
    }
}
