//! HTTP handlers for the relay server

use std::time::Duration;

use axum::{
    body::{Body, Bytes},
    extract::{Query, State},
    http::{header, HeaderMap, HeaderName, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use mcplink_core::branding::PRODUCT_NAME;
use mcplink_core::protocol::{FORWARD_HEADERS_HEADER, RELAY_PASS_THROUGH_HEADERS};
use mcplink_mcp::HeaderSet;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, warn};
use url::Url;

use super::logging_middleware::extract_mcp_method;

/// Shared state of the relay routes
#[derive(Clone)]
pub struct RelayState {
    /// Client with redirects disabled: 3xx responses go back to the caller as-is
    pub http: reqwest::Client,
    /// Limit on waiting for the upstream response headers
    pub upstream_timeout: Duration,
}

/// Request headers never copied from the forwarded bundle.
///
/// Framing headers are recomputed for the outbound request; Accept-Encoding
/// is left to the HTTP client so it can decode what it asked for.
const SKIPPED_REQUEST_HEADERS: &[&str] = &[
    "host",
    "content-length",
    "connection",
    "keep-alive",
    "proxy-connection",
    "transfer-encoding",
    "te",
    "trailer",
    "upgrade",
    "accept-encoding",
];

/// Upstream response headers dropped before answering the caller
const STRIPPED_RESPONSE_HEADERS: &[&str] = &[
    "www-authenticate",
    "content-encoding",
    "content-length",
    "transfer-encoding",
    "connection",
    "keep-alive",
];

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub version: String,
}

/// Health check endpoint
pub async fn health() -> Json<HealthResponse> {
    debug!("[Relay] Health check");
    Json(HealthResponse {
        status: "ok".to_string(),
        service: PRODUCT_NAME.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

#[derive(Debug, Deserialize)]
pub struct ProxyParams {
    pub target: Option<String>,
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(json!({ "error": message.into() }))).into_response()
}

/// Parse the relay target; only absolute http(s) URLs are accepted
fn parse_target(target: Option<&str>) -> Result<Url, Response> {
    let target = target
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| error_response(StatusCode::BAD_REQUEST, "missing target"))?;

    match Url::parse(target) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => Ok(url),
        _ => Err(error_response(
            StatusCode::BAD_REQUEST,
            format!("invalid target '{}': expected an absolute http(s) URL", target),
        )),
    }
}

/// Outbound headers: the decoded bundle, then the pass-through allow-list
fn build_upstream_headers(inbound: &HeaderMap) -> HeaderMap {
    let mut outbound = HeaderMap::new();

    let bundle = inbound
        .get(FORWARD_HEADERS_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(HeaderSet::decode_bundle);
    match bundle {
        Some(bundle) => {
            for (name, value) in bundle.iter() {
                let lower = name.to_ascii_lowercase();
                if SKIPPED_REQUEST_HEADERS.contains(&lower.as_str()) {
                    continue;
                }
                match (
                    HeaderName::from_bytes(lower.as_bytes()),
                    HeaderValue::from_str(value),
                ) {
                    (Ok(name), Ok(value)) => {
                        outbound.insert(name, value);
                    }
                    _ => debug!(header = %name, "Skipping unusable forwarded header"),
                }
            }
        }
        None if inbound.contains_key(FORWARD_HEADERS_HEADER) => {
            debug!("Ignoring undecodable forward-headers bundle");
        }
        None => {}
    }

    for &key in RELAY_PASS_THROUGH_HEADERS {
        if let Some(value) = inbound.get(key) {
            outbound.insert(HeaderName::from_static(key), value.clone());
        }
    }

    outbound
}

/// `GET|POST /mcp-proxy?target=<url>` - forward the request to `target`
pub async fn mcp_proxy(
    State(state): State<RelayState>,
    Query(params): Query<ProxyParams>,
    method: Method,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let target = match parse_target(params.target.as_deref()) {
        Ok(target) => target,
        Err(response) => return response,
    };

    let outbound_headers = build_upstream_headers(&headers);
    let has_body = !matches!(method, Method::GET | Method::HEAD);
    let mcp_method = extract_mcp_method(&body).unwrap_or_else(|| "-".to_string());

    debug!(
        upstream = %target,
        mcp_method = %mcp_method,
        header_count = outbound_headers.len(),
        "Forwarding to upstream"
    );

    let mut request = state
        .http
        .request(method, target.clone())
        .headers(outbound_headers);
    if has_body {
        request = request.body(body);
    }

    let upstream = match tokio::time::timeout(state.upstream_timeout, request.send()).await {
        Ok(Ok(response)) => response,
        Ok(Err(e)) => {
            warn!(upstream = %target, error = %e, "Upstream request failed");
            return error_response(
                StatusCode::BAD_GATEWAY,
                format!("upstream request failed: {}", e),
            );
        }
        Err(_) => {
            warn!(
                upstream = %target,
                timeout_secs = state.upstream_timeout.as_secs(),
                "Upstream request aborted"
            );
            return error_response(
                StatusCode::GATEWAY_TIMEOUT,
                "upstream request aborted: timed out",
            );
        }
    };

    relay_response(upstream)
}

/// Copy status and headers (minus the stripped set) and stream the body through
fn relay_response(upstream: reqwest::Response) -> Response {
    let status = upstream.status();
    let mut headers = upstream.headers().clone();
    for name in STRIPPED_RESPONSE_HEADERS {
        headers.remove(*name);
    }
    headers.insert(
        HeaderName::from_static("x-accel-buffering"),
        HeaderValue::from_static("no"),
    );

    let mut response = Response::new(Body::from_stream(upstream.bytes_stream()));
    *response.status_mut() = status;
    *response.headers_mut() = headers;
    response
}

/// `OPTIONS /mcp-proxy` - permissive preflight answer
pub async fn mcp_proxy_preflight() -> Response {
    let mut response = StatusCode::NO_CONTENT.into_response();
    let headers = response.headers_mut();
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_ORIGIN,
        HeaderValue::from_static("*"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static("*"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static("*"),
    );
    headers.insert(
        header::ACCESS_CONTROL_MAX_AGE,
        HeaderValue::from_static("86400"),
    );
    response
}
