//! Legacy HTTP+SSE client
//!
//! A long-lived GET opens the event stream. The server first sends an
//! `endpoint` event naming the URL to POST JSON-RPC messages to; responses
//! then arrive as `message` events and are matched to pending requests by id.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use mcplink_core::{McpError, McpResult, ServerConfig};
use parking_lot::Mutex;
use reqwest::header::HeaderMap;
use serde_json::Value;
use tokio::sync::oneshot;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;

use super::{request_error, status_error};
use crate::headers::{sse_post_headers, sse_stream_headers};
use crate::jsonrpc::{collect_responses, JsonRpcRequest, JsonRpcResponse, RequestId};
use crate::sse::{SseDecoder, SseEvent};

type PendingMap = Mutex<HashMap<RequestId, oneshot::Sender<McpResult<JsonRpcResponse>>>>;

/// State shared between the client and its stream reader task
struct Shared {
    server_id: String,
    pending: PendingMap,
    closed: AtomicBool,
}

impl Shared {
    fn fail_pending(&self) {
        let drained: Vec<_> = self.pending.lock().drain().collect();
        if !drained.is_empty() {
            debug!(
                server_id = %self.server_id,
                count = drained.len(),
                "Failing pending requests, stream closed"
            );
        }
        for (_, tx) in drained {
            let _ = tx.send(Err(McpError::TransportClosed));
        }
    }
}

pub struct SseClient {
    shared: Arc<Shared>,
    http: reqwest::Client,
    endpoint: Url,
    post_headers: HeaderMap,
    protocol_version: String,
    timeout: Duration,
    next_id: AtomicI64,
    cancel: CancellationToken,
}

impl fmt::Debug for SseClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SseClient")
            .field("server_id", &self.shared.server_id)
            .field("endpoint", &self.endpoint.as_str())
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl SseClient {
    /// Open the event stream and wait for the `endpoint` event.
    ///
    /// The configured timeout covers both the wait for response headers and
    /// the wait for the endpoint announcement.
    pub(crate) async fn connect(
        server_id: &str,
        http: reqwest::Client,
        base_url: Url,
        config: &ServerConfig,
        protocol_version: String,
    ) -> McpResult<Self> {
        let timeout = config.timeout_duration();
        let deadline = Instant::now() + timeout;
        let stream_headers = sse_stream_headers(config, &protocol_version).to_header_map()?;
        let post_headers = sse_post_headers(config, &protocol_version).to_header_map()?;

        let response = tokio::time::timeout_at(
            deadline,
            http.get(base_url.clone()).headers(stream_headers).send(),
        )
        .await
        .map_err(|_| McpError::Timeout(timeout.as_secs()))?
        .map_err(|e| request_error(e, timeout))?;

        if !response.status().is_success() {
            return Err(status_error("SSE request failed", response).await);
        }

        let shared = Arc::new(Shared {
            server_id: server_id.to_string(),
            pending: Mutex::new(HashMap::new()),
            closed: AtomicBool::new(false),
        });
        let cancel = CancellationToken::new();
        let (endpoint_tx, endpoint_rx) = oneshot::channel();

        tokio::spawn(read_stream(
            response,
            base_url,
            endpoint_tx,
            Arc::clone(&shared),
            cancel.clone(),
        ));

        let endpoint = match tokio::time::timeout_at(deadline, endpoint_rx).await {
            Ok(Ok(Ok(endpoint))) => endpoint,
            Ok(Ok(Err(e))) => {
                cancel.cancel();
                return Err(e);
            }
            Ok(Err(_)) => {
                cancel.cancel();
                return Err(McpError::TransportClosed);
            }
            Err(_) => {
                cancel.cancel();
                return Err(McpError::Timeout(timeout.as_secs()));
            }
        };

        info!(server_id = %server_id, endpoint = %endpoint, "SSE stream open");

        Ok(Self {
            shared,
            http,
            endpoint,
            post_headers,
            protocol_version,
            timeout,
            next_id: AtomicI64::new(0),
            cancel,
        })
    }

    pub fn server_id(&self) -> &str {
        &self.shared.server_id
    }

    pub fn protocol_version(&self) -> &str {
        &self.protocol_version
    }

    /// URL announced by the `endpoint` event
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    pub fn is_closed(&self) -> bool {
        self.shared.closed.load(Ordering::SeqCst)
    }

    pub(crate) fn next_id(&self) -> RequestId {
        RequestId::Number(self.next_id.fetch_add(1, Ordering::SeqCst))
    }

    async fn post(&self, message: &JsonRpcRequest) -> McpResult<()> {
        let body = serde_json::to_vec(message)?;
        let response = self
            .http
            .post(self.endpoint.clone())
            .headers(self.post_headers.clone())
            .timeout(self.timeout)
            .body(body)
            .send()
            .await
            .map_err(|e| request_error(e, self.timeout))?;

        if !response.status().is_success() {
            return Err(status_error("MCP POST failed", response).await);
        }
        Ok(())
    }

    pub(crate) async fn send_request(&self, request: &JsonRpcRequest) -> McpResult<JsonRpcResponse> {
        let id = request
            .id
            .clone()
            .ok_or_else(|| McpError::Protocol("request without id".to_string()))?;

        let (tx, rx) = oneshot::channel();
        self.shared.pending.lock().insert(id.clone(), tx);
        if self.is_closed() {
            self.shared.pending.lock().remove(&id);
            return Err(McpError::TransportClosed);
        }

        if let Err(e) = self.post(request).await {
            self.shared.pending.lock().remove(&id);
            return Err(e);
        }

        match tokio::time::timeout(self.timeout, rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(McpError::TransportClosed),
            Err(_) => {
                self.shared.pending.lock().remove(&id);
                Err(McpError::Timeout(self.timeout.as_secs()))
            }
        }
    }

    pub(crate) async fn send_notification(&self, notification: &JsonRpcRequest) -> McpResult<()> {
        if self.is_closed() {
            return Err(McpError::TransportClosed);
        }
        self.post(notification).await
    }

    pub async fn close(&self) {
        if self.shared.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.cancel.cancel();
        self.shared.fail_pending();
        debug!(server_id = %self.shared.server_id, "SSE client closed");
    }
}

impl Drop for SseClient {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Reader task: decodes the stream until it ends or the client is cancelled
async fn read_stream(
    response: reqwest::Response,
    base_url: Url,
    endpoint_tx: oneshot::Sender<McpResult<Url>>,
    shared: Arc<Shared>,
    cancel: CancellationToken,
) {
    let mut endpoint_tx = Some(endpoint_tx);
    let mut stream = response.bytes_stream();
    let mut decoder = SseDecoder::new();

    loop {
        let next = tokio::select! {
            _ = cancel.cancelled() => break,
            next = stream.next() => next,
        };

        match next {
            Some(Ok(chunk)) => {
                for event in decoder.push(&chunk) {
                    handle_event(event, &base_url, &mut endpoint_tx, &shared);
                }
            }
            Some(Err(e)) => {
                warn!(server_id = %shared.server_id, error = %e, "SSE stream error");
                break;
            }
            None => {
                if let Some(event) = decoder.finish() {
                    handle_event(event, &base_url, &mut endpoint_tx, &shared);
                }
                debug!(server_id = %shared.server_id, "SSE stream ended");
                break;
            }
        }
    }

    shared.closed.store(true, Ordering::SeqCst);
    if let Some(tx) = endpoint_tx.take() {
        let _ = tx.send(Err(McpError::TransportClosed));
    }
    shared.fail_pending();
}

fn handle_event(
    event: SseEvent,
    base_url: &Url,
    endpoint_tx: &mut Option<oneshot::Sender<McpResult<Url>>>,
    shared: &Shared,
) {
    match event.kind() {
        "endpoint" => {
            let Some(tx) = endpoint_tx.take() else {
                debug!(server_id = %shared.server_id, "Ignoring repeated endpoint event");
                return;
            };
            let _ = tx.send(resolve_endpoint(base_url, &event.data));
        }
        "message" => {
            let message: Value = match serde_json::from_str(&event.data) {
                Ok(message) => message,
                Err(e) => {
                    warn!(server_id = %shared.server_id, error = %e, "Skipping undecodable message");
                    return;
                }
            };
            for response in collect_responses(message) {
                let Some(id) = response.id.clone() else {
                    continue;
                };
                match shared.pending.lock().remove(&id) {
                    Some(tx) => {
                        let _ = tx.send(Ok(response));
                    }
                    None => debug!(server_id = %shared.server_id, id = %id, "Response for unknown request"),
                }
            }
        }
        other => debug!(server_id = %shared.server_id, event = %other, "Ignoring SSE event"),
    }
}

/// Resolve the announced endpoint against the stream URL; it must stay on the same origin
fn resolve_endpoint(base_url: &Url, announced: &str) -> McpResult<Url> {
    let endpoint = base_url
        .join(announced.trim())
        .map_err(|e| McpError::Protocol(format!("invalid endpoint '{}': {}", announced, e)))?;
    if endpoint.origin() != base_url.origin() {
        return Err(McpError::Protocol(format!(
            "endpoint origin does not match connection origin: {}",
            endpoint
        )));
    }
    Ok(endpoint)
}
