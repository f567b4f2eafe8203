//! # McpLink Core Library
//!
//! Domain types shared by the MCP client, the connection manager and the relay.
//!
//! ## Modules
//!
//! - `branding` - Product naming and well-known endpoint paths
//! - `domain` - Server configuration, persisted status and derived display status
//! - `error` - Error taxonomy used across the workspace
//! - `protocol` - MCP wire constants (protocol version, header names, media types)
//! - `repository` - Config store contract plus an in-memory implementation

pub mod branding;
pub mod domain;
pub mod error;
pub mod protocol;
pub mod repository;

// Re-export commonly used types
pub use domain::*;
pub use error::{McpError, McpResult};
pub use repository::*;
