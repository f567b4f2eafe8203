//! Streamable HTTP client
//!
//! Every JSON-RPC message is a POST to the server URL (or to the relay when
//! the server is cross-origin). Responses come back either as a JSON body or
//! as an event stream that is read until the matching response arrives.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::time::Duration;

use futures::StreamExt;
use mcplink_core::protocol::{EVENT_STREAM, SESSION_ID_HEADER};
use mcplink_core::{McpError, McpResult, ServerConfig};
use parking_lot::RwLock;
use reqwest::header::{HeaderMap, CONTENT_TYPE};
use reqwest::StatusCode;
use serde_json::Value;
use tracing::{debug, warn};
use url::Url;

use super::{request_error, status_error};
use crate::headers::streamable_post_headers;
use crate::jsonrpc::{find_response, JsonRpcRequest, JsonRpcResponse, RequestId};
use crate::relay::{ClientOptions, RoutedRequest};
use crate::sse::SseDecoder;

/// Cap on the best-effort session DELETE sent on close
const CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

pub struct StreamableHttpClient {
    server_id: String,
    http: reqwest::Client,
    routed: RoutedRequest,
    headers: HeaderMap,
    protocol_version: String,
    timeout: Duration,
    session_id: RwLock<Option<String>>,
    next_id: AtomicI64,
    closed: AtomicBool,
}

impl fmt::Debug for StreamableHttpClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamableHttpClient")
            .field("server_id", &self.server_id)
            .field("url", &self.routed.url.as_str())
            .field("relayed", &self.routed.relayed)
            .field("session", &self.session_id.read().is_some())
            .finish()
    }
}

impl StreamableHttpClient {
    pub(crate) fn new(
        server_id: &str,
        http: reqwest::Client,
        options: &ClientOptions,
        base_url: Url,
        config: &ServerConfig,
        protocol_version: String,
    ) -> McpResult<Self> {
        let headers = streamable_post_headers(config, &protocol_version);
        let routed = options.route(&base_url, headers)?;
        let header_map = routed.headers.to_header_map()?;

        if routed.relayed {
            debug!(
                server_id = %server_id,
                relay = %routed.url,
                "Target is cross-origin, routing through relay"
            );
        }

        Ok(Self {
            server_id: server_id.to_string(),
            http,
            routed,
            headers: header_map,
            protocol_version,
            timeout: config.timeout_duration(),
            session_id: RwLock::new(None),
            next_id: AtomicI64::new(0),
            closed: AtomicBool::new(false),
        })
    }

    pub fn server_id(&self) -> &str {
        &self.server_id
    }

    pub fn protocol_version(&self) -> &str {
        &self.protocol_version
    }

    /// URL requests are actually sent to (the relay URL when relayed)
    pub fn request_url(&self) -> &Url {
        &self.routed.url
    }

    pub fn is_relayed(&self) -> bool {
        self.routed.relayed
    }

    pub fn session_id(&self) -> Option<String> {
        self.session_id.read().clone()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub(crate) fn next_id(&self) -> RequestId {
        RequestId::Number(self.next_id.fetch_add(1, Ordering::SeqCst))
    }

    async fn post(&self, message: &JsonRpcRequest) -> McpResult<reqwest::Response> {
        if self.is_closed() {
            return Err(McpError::TransportClosed);
        }

        let body = serde_json::to_vec(message)?;
        let mut builder = self
            .http
            .post(self.routed.url.clone())
            .headers(self.headers.clone())
            .timeout(self.timeout)
            .body(body);
        if let Some(session) = self.session_id() {
            builder = builder.header(SESSION_ID_HEADER, session);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| request_error(e, self.timeout))?;
        self.capture_session(&response);
        Ok(response)
    }

    fn capture_session(&self, response: &reqwest::Response) {
        let Some(session) = response
            .headers()
            .get(SESSION_ID_HEADER)
            .and_then(|v| v.to_str().ok())
        else {
            return;
        };

        let mut current = self.session_id.write();
        if current.as_deref() != Some(session) {
            debug!(server_id = %self.server_id, "Session established");
            *current = Some(session.to_string());
        }
    }

    pub(crate) async fn send_request(&self, request: &JsonRpcRequest) -> McpResult<JsonRpcResponse> {
        let id = request
            .id
            .clone()
            .ok_or_else(|| McpError::Protocol("request without id".to_string()))?;

        let response = self.post(request).await?;
        let status = response.status();
        if status == StatusCode::ACCEPTED {
            return Err(McpError::Protocol(format!(
                "server accepted request {} without a response",
                id
            )));
        }
        if !status.is_success() {
            return Err(status_error("MCP request failed", response).await);
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_ascii_lowercase();

        if content_type.starts_with(EVENT_STREAM) {
            self.read_event_stream(response, &id).await
        } else {
            let bytes = response
                .bytes()
                .await
                .map_err(|e| request_error(e, self.timeout))?;
            let message: Value = serde_json::from_slice(&bytes)
                .map_err(|e| McpError::Protocol(format!("invalid JSON response: {}", e)))?;
            find_response(message, &id)
                .ok_or_else(|| McpError::Protocol(format!("no response for request {}", id)))
        }
    }

    async fn read_event_stream(
        &self,
        response: reqwest::Response,
        id: &RequestId,
    ) -> McpResult<JsonRpcResponse> {
        let mut stream = response.bytes_stream();
        let mut decoder = SseDecoder::new();

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| request_error(e, self.timeout))?;
            for event in decoder.push(&chunk) {
                if let Some(found) = self.match_event(&event.data, event.kind(), id) {
                    return Ok(found);
                }
            }
        }
        if let Some(event) = decoder.finish() {
            if let Some(found) = self.match_event(&event.data, event.kind(), id) {
                return Ok(found);
            }
        }
        Err(McpError::TransportClosed)
    }

    fn match_event(&self, data: &str, kind: &str, id: &RequestId) -> Option<JsonRpcResponse> {
        if kind != "message" {
            return None;
        }
        match serde_json::from_str::<Value>(data) {
            Ok(message) => find_response(message, id),
            Err(e) => {
                warn!(server_id = %self.server_id, error = %e, "Skipping undecodable event");
                None
            }
        }
    }

    pub(crate) async fn send_notification(&self, notification: &JsonRpcRequest) -> McpResult<()> {
        let response = self.post(notification).await?;
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        Err(status_error("MCP notification failed", response).await)
    }

    /// Mark closed and end the server session with a DELETE.
    ///
    /// The relay only forwards GET and POST, so the DELETE is skipped for
    /// relayed servers.
    pub async fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        let Some(session) = self.session_id() else {
            return;
        };
        if self.routed.relayed {
            return;
        }

        let result = self
            .http
            .delete(self.routed.url.clone())
            .headers(self.headers.clone())
            .header(SESSION_ID_HEADER, session)
            .timeout(self.timeout.min(CLOSE_TIMEOUT))
            .send()
            .await;
        match result {
            Ok(response) => debug!(
                server_id = %self.server_id,
                status = response.status().as_u16(),
                "Session closed"
            ),
            Err(e) => debug!(server_id = %self.server_id, error = %e, "Session DELETE failed"),
        }
    }
}
