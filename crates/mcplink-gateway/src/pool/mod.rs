//! Connection Pool - one live MCP client per configured server
//!
//! - **ConnectionRegistry**: per-server state with a generation guard against stale writes
//! - **ConnectionManager**: add / pause / resume / remove / restart orchestration

mod lifecycle;
mod registry;

pub use lifecycle::ConnectionManager;
pub use registry::{resolve_display_status, ConnectionRegistry, ConnectionState, RegistryEntry};
