//! MCP client side of McpLink
//!
//! Builds SSE or Streamable HTTP clients for a `ServerConfig`, applies the
//! outbound header policy, routes cross-origin requests through the
//! same-origin relay and performs the initialize handshake.

pub mod headers;
pub mod jsonrpc;
pub mod relay;
pub mod sse;
pub mod transport;

pub use headers::HeaderSet;
pub use jsonrpc::{JsonRpcRequest, RequestId};
pub use relay::{ClientOptions, RoutedRequest};
pub use transport::{McpClient, SseClient, StreamableHttpClient, TransportFactory};

/// Tool descriptor as listed by `tools/list`
pub use rmcp::model::Tool;
