//! Transport selection and the initialize handshake
//!
//! `TransportFactory::connect` validates a `ServerConfig`, opens the matching
//! wire client and runs `initialize` followed by `notifications/initialized`.
//! There is no retry with older protocol versions; a failed handshake is final.

mod sse;
mod streamable;

use std::time::Duration;

use mcplink_core::protocol::methods;
use mcplink_core::{McpError, McpResult, ServerConfig, TransportType};
use rmcp::model::ListToolsResult;
use serde_json::{json, Value};
use tracing::{debug, info, warn};
use url::Url;

use crate::jsonrpc::{self, JsonRpcRequest, JsonRpcResponse, RequestId};
use crate::relay::ClientOptions;
use crate::Tool;

pub use sse::SseClient;
pub use streamable::StreamableHttpClient;

/// Upper bound on `tools/list` pages followed for one server
const MAX_TOOL_PAGES: usize = 64;

/// A connected MCP client over one of the supported transports
#[derive(Debug)]
pub enum McpClient {
    Streamable(StreamableHttpClient),
    Sse(SseClient),
}

impl McpClient {
    pub fn server_id(&self) -> &str {
        match self {
            McpClient::Streamable(client) => client.server_id(),
            McpClient::Sse(client) => client.server_id(),
        }
    }

    pub fn transport_type(&self) -> TransportType {
        match self {
            McpClient::Streamable(_) => TransportType::StreamableHttp,
            McpClient::Sse(_) => TransportType::Sse,
        }
    }

    pub fn protocol_version(&self) -> &str {
        match self {
            McpClient::Streamable(client) => client.protocol_version(),
            McpClient::Sse(client) => client.protocol_version(),
        }
    }

    pub fn is_closed(&self) -> bool {
        match self {
            McpClient::Streamable(client) => client.is_closed(),
            McpClient::Sse(client) => client.is_closed(),
        }
    }

    fn next_id(&self) -> RequestId {
        match self {
            McpClient::Streamable(client) => client.next_id(),
            McpClient::Sse(client) => client.next_id(),
        }
    }

    async fn send(&self, request: &JsonRpcRequest) -> McpResult<JsonRpcResponse> {
        match self {
            McpClient::Streamable(client) => client.send_request(request).await,
            McpClient::Sse(client) => client.send_request(request).await,
        }
    }

    /// Send a request and return its `result`
    pub async fn request(&self, method: &str, params: Option<Value>) -> McpResult<Value> {
        let request = JsonRpcRequest::new(self.next_id(), method, params);
        self.send(&request).await?.into_result()
    }

    async fn send_notification(&self, notification: &JsonRpcRequest) -> McpResult<()> {
        match self {
            McpClient::Streamable(client) => client.send_notification(notification).await,
            McpClient::Sse(client) => client.send_notification(notification).await,
        }
    }

    /// Forward a caller-built JSON-RPC message untouched except for its id.
    ///
    /// Requests are re-numbered so they cannot collide with ids this client
    /// issues itself. Notifications resolve to `null`.
    pub async fn execute(&self, message: Value) -> McpResult<Value> {
        let mut request = JsonRpcRequest::from_value(message)?;
        if request.is_notification() {
            self.send_notification(&request).await?;
            return Ok(Value::Null);
        }
        request.id = Some(self.next_id());
        self.send(&request).await?.into_result()
    }

    /// Fetch the complete tool list, following `nextCursor`
    pub async fn list_tools(&self) -> McpResult<Vec<Tool>> {
        let mut tools = Vec::new();
        let mut cursor: Option<String> = None;

        for _ in 0..MAX_TOOL_PAGES {
            let params = cursor.as_ref().map(|c| json!({ "cursor": c }));
            let result = self.request(methods::TOOLS_LIST, params).await?;
            let page: ListToolsResult = serde_json::from_value(result)
                .map_err(|e| McpError::Protocol(format!("invalid tools/list result: {}", e)))?;
            tools.extend(page.tools);

            match page.next_cursor {
                Some(next) if !next.is_empty() && cursor.as_deref() != Some(next.as_str()) => {
                    cursor = Some(next)
                }
                _ => return Ok(tools),
            }
        }

        warn!(
            server_id = %self.server_id(),
            pages = MAX_TOOL_PAGES,
            "tools/list pagination limit reached, keeping tools fetched so far"
        );
        Ok(tools)
    }

    /// Release the transport; safe to call more than once
    pub async fn close(&self) {
        match self {
            McpClient::Streamable(client) => client.close().await,
            McpClient::Sse(client) => client.close().await,
        }
    }
}

/// Builds connected clients from server configs
#[derive(Debug, Clone)]
pub struct TransportFactory {
    options: ClientOptions,
    http: reqwest::Client,
}

impl TransportFactory {
    pub fn new(options: ClientOptions) -> McpResult<Self> {
        let http = reqwest::Client::builder()
            .build()
            .map_err(|e| McpError::Request(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self { options, http })
    }

    pub fn options(&self) -> &ClientOptions {
        &self.options
    }

    /// Check the transport type and base URL without touching the network
    pub fn validate(config: &ServerConfig) -> McpResult<Url> {
        if let TransportType::Unsupported(other) = &config.transport_type {
            return Err(McpError::UnsupportedTransport(format!(
                "{}. Supported types: sse, streamableHttp",
                other
            )));
        }

        let base_url = config.base_url.trim();
        if base_url.is_empty() {
            return Err(McpError::InvalidConfig(format!(
                "base URL is required for {} transport",
                config.transport_type
            )));
        }
        let url = Url::parse(base_url)
            .map_err(|_| McpError::InvalidConfig(format!("invalid base URL: {}", base_url)))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(McpError::InvalidConfig(format!(
                "unsupported URL scheme '{}' in base URL",
                url.scheme()
            )));
        }
        Ok(url)
    }

    /// Open a transport without running the handshake
    pub async fn open(&self, server_id: &str, config: &ServerConfig) -> McpResult<McpClient> {
        let base_url = Self::validate(config)?;
        let version = config.protocol_version_or_default().to_string();

        debug!(
            server_id = %server_id,
            transport = %config.transport_type,
            url = %base_url,
            "Creating transport"
        );

        match &config.transport_type {
            TransportType::Sse => {
                let client =
                    SseClient::connect(server_id, self.http.clone(), base_url, config, version)
                        .await?;
                Ok(McpClient::Sse(client))
            }
            TransportType::StreamableHttp => {
                let client = StreamableHttpClient::new(
                    server_id,
                    self.http.clone(),
                    &self.options,
                    base_url,
                    config,
                    version,
                )?;
                Ok(McpClient::Streamable(client))
            }
            TransportType::Unsupported(other) => {
                Err(McpError::UnsupportedTransport(other.clone()))
            }
        }
    }

    /// Open a transport and complete the initialize handshake
    pub async fn connect(&self, server_id: &str, config: &ServerConfig) -> McpResult<McpClient> {
        let client = self.open(server_id, config).await?;

        if let Err(e) = self.handshake(&client).await {
            client.close().await;
            return Err(e);
        }

        info!(
            server_id = %server_id,
            transport = %client.transport_type(),
            "Client connected"
        );
        Ok(client)
    }

    async fn handshake(&self, client: &McpClient) -> McpResult<()> {
        let server_id = client.server_id();
        let params = jsonrpc::initialize_params(
            client.protocol_version(),
            &self.options.client_name(server_id),
        )?;

        let result = client
            .request(methods::INITIALIZE, Some(params))
            .await
            .map_err(|e| McpError::HandshakeFailure(e.to_string()))?;
        if !result.is_object() {
            return Err(McpError::HandshakeFailure(
                "initialize returned no result object".to_string(),
            ));
        }

        let server_version = result
            .get("protocolVersion")
            .and_then(|v| v.as_str())
            .unwrap_or("?");
        let server_name = result
            .pointer("/serverInfo/name")
            .and_then(|v| v.as_str())
            .unwrap_or("?");
        debug!(
            server_id = %server_id,
            server_version = %server_version,
            server_name = %server_name,
            "initialize succeeded"
        );

        let initialized = jsonrpc::initialized_notification();
        if let Err(e) = client.send_notification(&initialized).await {
            warn!(server_id = %server_id, error = %e, "notifications/initialized was not accepted");
        }
        Ok(())
    }
}

/// Map a reqwest failure onto the taxonomy
pub(crate) fn request_error(err: reqwest::Error, timeout: Duration) -> McpError {
    if err.is_timeout() {
        McpError::Timeout(timeout.as_secs())
    } else {
        McpError::Request(error_chain(&err))
    }
}

/// Flatten an error and its sources into one line
fn error_chain(err: &dyn std::error::Error) -> String {
    let mut text = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        let cause_text = cause.to_string();
        if !text.contains(&cause_text) {
            text.push_str(": ");
            text.push_str(&cause_text);
        }
        source = cause.source();
    }
    text
}

/// Error for a non-2xx response, with a short body excerpt when present
pub(crate) async fn status_error(context: &str, response: reqwest::Response) -> McpError {
    let status = response.status();
    let reason = status.canonical_reason().unwrap_or("");
    let body = response.text().await.unwrap_or_default();
    let excerpt: String = body.trim().chars().take(200).collect();

    let mut message = format!("{}: {} {}", context, status.as_u16(), reason);
    if !excerpt.is_empty() {
        message.push_str(" - ");
        message.push_str(&excerpt);
    }
    McpError::Http {
        status: status.as_u16(),
        reason: message.trim_end().to_string(),
    }
}
