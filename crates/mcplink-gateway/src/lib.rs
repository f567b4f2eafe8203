//! McpLink Gateway
//!
//! Host side of McpLink:
//! - Connection lifecycle for configured remote MCP servers
//! - Handshake diagnostics for servers that reject the default request shape
//! - Same-origin HTTP relay for pages that cannot reach a server directly

pub mod diagnostics;
pub mod logging;
pub mod pool;
pub mod server;

pub use diagnostics::{Diagnosis, DiagnosticsProbe, ProbeResponse, VariantResult};
pub use pool::{
    resolve_display_status, ConnectionManager, ConnectionRegistry, ConnectionState,
    RegistryEntry,
};
pub use server::{relay_router, RelayConfig, RelayHandle, RelayServer, RelayState};
