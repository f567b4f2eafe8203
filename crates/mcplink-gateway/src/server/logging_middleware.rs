//! HTTP Request/Response Logging Middleware
//!
//! One entry line and one exit line per request, correlated by trace id.
//! Bodies are never buffered here: relayed responses may be event streams
//! that stay open for minutes.

use axum::{extract::Request, http::HeaderMap, middleware::Next, response::Response};
use tracing::{debug, Instrument};
use url::Url;

use crate::logging::{RequestSpan, TraceContext};
use mcplink_core::protocol::TARGET_QUERY_PARAM;

/// Headers that should be redacted
const SENSITIVE_HEADERS: &[&str] = &[
    "authorization",
    "cookie",
    "set-cookie",
    "x-api-key",
    "x-proxy-forward-headers",
];

/// Compact header dump for DEBUG, limited to the headers that matter for MCP
pub fn redact_headers_compact(headers: &HeaderMap) -> String {
    headers
        .iter()
        .filter(|(name, _)| {
            matches!(
                name.as_str(),
                "content-type"
                    | "accept"
                    | "user-agent"
                    | "mcp-session-id"
                    | "mcp-protocol-version"
                    | "last-event-id"
                    | "authorization"
                    | "x-proxy-forward-headers"
            )
        })
        .map(|(name, value)| {
            if SENSITIVE_HEADERS.contains(&name.as_str()) {
                format!("{}=[REDACTED]", name)
            } else {
                format!("{}={:?}", name, value)
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Extract the JSON-RPC method from a request body, if it is one
pub fn extract_mcp_method(bytes: &[u8]) -> Option<String> {
    let json: serde_json::Value = serde_json::from_slice(bytes).ok()?;
    json.get("method")
        .and_then(|m| m.as_str())
        .map(String::from)
}

/// Host of the `target` query parameter, for log lines
fn target_host(query: &str) -> Option<String> {
    url::form_urlencoded::parse(query.as_bytes())
        .find(|(key, _)| key == TARGET_QUERY_PARAM)
        .and_then(|(_, value)| Url::parse(&value).ok())
        .and_then(|url| url.host_str().map(String::from))
}

/// Logging middleware for the relay router
pub async fn http_logging_middleware(request: Request, next: Next) -> Response {
    let ctx = TraceContext::new(request.method().as_str(), request.uri().path())
        .with_target_host(request.uri().query().and_then(target_host));
    let span = RequestSpan::enter(&ctx);

    async move {
        RequestSpan::log_entry(&ctx);
        debug!(
            trace_id = %ctx.trace_id,
            headers = %redact_headers_compact(request.headers()),
            "Request headers"
        );

        let response = next.run(request).await;

        RequestSpan::log_exit(&ctx, response.status().as_u16());
        response
    }
    .instrument(span)
    .await
}
