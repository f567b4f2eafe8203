//! Relay HTTP contract

use std::time::Duration;

use mcplink_core::protocol::FORWARD_HEADERS_HEADER;
use mcplink_gateway::{RelayConfig, RelayHandle, RelayServer};
use mcplink_mcp::HeaderSet;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn start_relay(config: RelayConfig) -> RelayHandle {
    RelayServer::new(RelayConfig { port: 0, ..config })
        .unwrap()
        .start()
        .await
        .unwrap()
}

fn http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .unwrap()
}

fn proxy_url(relay: &RelayHandle, target: &str) -> String {
    let mut url = url::Url::parse(&format!("{}/mcp-proxy", relay.base_url())).unwrap();
    url.query_pairs_mut().append_pair("target", target);
    url.to_string()
}

// ============================================================================
// Target validation
// ============================================================================

#[tokio::test]
async fn test_missing_target_is_bad_request() {
    let relay = start_relay(RelayConfig::default()).await;

    let response = http_client()
        .post(format!("{}/mcp-proxy", relay.base_url()))
        .body("{}")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 400);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body, json!({ "error": "missing target" }));

    relay.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_relative_target_is_bad_request() {
    let relay = start_relay(RelayConfig::default()).await;

    let response = http_client()
        .post(proxy_url(&relay, "/mcp"))
        .body("{}")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 400);
    let body: Value = response.json().await.unwrap();
    assert!(body["error"].as_str().unwrap().contains("invalid target"));

    relay.shutdown().await.unwrap();
}

// ============================================================================
// Forwarding
// ============================================================================

#[tokio::test]
async fn test_bundle_and_pass_through_headers_are_forwarded() {
    let upstream = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/mcp"))
        .and(header("authorization", "Bearer upstream-token"))
        .and(header("mcp-session-id", "sess-9"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
        .expect(1)
        .mount(&upstream)
        .await;
    let relay = start_relay(RelayConfig::default()).await;

    let bundle = HeaderSet::new()
        .with("Authorization", "Bearer upstream-token")
        .with("Content-Type", "application/json")
        .with("Host", "should-not-leak.example");
    let response = http_client()
        .post(proxy_url(&relay, &format!("{}/mcp", upstream.uri())))
        .header(FORWARD_HEADERS_HEADER, bundle.encode_bundle())
        .header("mcp-session-id", "sess-9")
        .header("cookie", "page-cookie=1")
        .body(r#"{"jsonrpc":"2.0","id":1,"method":"ping"}"#)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    assert_eq!(response.headers().get("x-accel-buffering").unwrap(), "no");
    let body: Value = response.json().await.unwrap();
    assert_eq!(body, json!({"ok": true}));

    let received = upstream.received_requests().await.unwrap();
    let request = &received[0];
    assert!(request.headers.get(FORWARD_HEADERS_HEADER).is_none());
    assert!(request.headers.get("cookie").is_none());
    assert_eq!(request.headers.get("content-type").unwrap(), "application/json");
    assert_ne!(request.headers.get("host").unwrap(), "should-not-leak.example");
    assert_eq!(request.body, br#"{"jsonrpc":"2.0","id":1,"method":"ping"}"#.to_vec());

    relay.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_undecodable_bundle_is_ignored() {
    let upstream = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&upstream)
        .await;
    let relay = start_relay(RelayConfig::default()).await;

    let response = http_client()
        .post(proxy_url(&relay, &upstream.uri()))
        .header(FORWARD_HEADERS_HEADER, "not base64 at all!")
        .body("{}")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    relay.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_get_is_forwarded_without_body() {
    let upstream = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/sse"))
        .respond_with(
            ResponseTemplate::new(200).set_body_raw("event: endpoint\ndata: /m\n\n", "text/event-stream"),
        )
        .mount(&upstream)
        .await;
    let relay = start_relay(RelayConfig::default()).await;

    let response = http_client()
        .get(proxy_url(&relay, &format!("{}/sse", upstream.uri())))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    assert_eq!(
        response.headers().get("content-type").unwrap(),
        "text/event-stream"
    );
    assert_eq!(response.text().await.unwrap(), "event: endpoint\ndata: /m\n\n");

    let received = upstream.received_requests().await.unwrap();
    assert!(received[0].body.is_empty());

    relay.shutdown().await.unwrap();
}

// ============================================================================
// Response rewriting
// ============================================================================

#[tokio::test]
async fn test_auth_and_encoding_headers_are_stripped_for_every_status() {
    let upstream = MockServer::start().await;
    for (route, status) in [("/ok", 200u16), ("/denied", 401), ("/broken", 500)] {
        Mock::given(path(route))
            .respond_with(
                ResponseTemplate::new(status)
                    .insert_header("www-authenticate", "Bearer realm=\"mcp\"")
                    .insert_header("content-encoding", "identity")
                    .insert_header("x-upstream", "kept")
                    .set_body_string("payload"),
            )
            .mount(&upstream)
            .await;
    }
    let relay = start_relay(RelayConfig::default()).await;

    for (route, status) in [("/ok", 200u16), ("/denied", 401), ("/broken", 500)] {
        let response = http_client()
            .post(proxy_url(&relay, &format!("{}{}", upstream.uri(), route)))
            .body("{}")
            .send()
            .await
            .unwrap();
        assert_eq!(response.status().as_u16(), status);
        assert!(response.headers().get("www-authenticate").is_none(), "{}", route);
        assert!(response.headers().get("content-encoding").is_none(), "{}", route);
        assert_eq!(response.headers().get("x-upstream").unwrap(), "kept");
        assert_eq!(response.headers().get("x-accel-buffering").unwrap(), "no");
        assert_eq!(response.text().await.unwrap(), "payload");
    }

    relay.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_redirects_are_returned_not_followed() {
    let upstream = MockServer::start().await;
    Mock::given(path("/old"))
        .respond_with(ResponseTemplate::new(307).insert_header("location", "/new"))
        .mount(&upstream)
        .await;
    let relay = start_relay(RelayConfig::default()).await;

    let response = http_client()
        .post(proxy_url(&relay, &format!("{}/old", upstream.uri())))
        .body("{}")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 307);
    assert_eq!(response.headers().get("location").unwrap(), "/new");
    assert_eq!(upstream.received_requests().await.unwrap().len(), 1);

    relay.shutdown().await.unwrap();
}

// ============================================================================
// Failures
// ============================================================================

#[tokio::test]
async fn test_unreachable_upstream_is_bad_gateway() {
    let relay = start_relay(RelayConfig::default()).await;

    let response = http_client()
        .post(proxy_url(&relay, "http://127.0.0.1:9/mcp"))
        .body("{}")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 502);
    let body: Value = response.json().await.unwrap();
    assert!(body["error"].as_str().unwrap().contains("upstream request failed"));

    relay.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_slow_upstream_is_gateway_timeout() {
    let upstream = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(3)))
        .mount(&upstream)
        .await;
    let relay = start_relay(RelayConfig {
        upstream_timeout: Duration::from_millis(200),
        ..RelayConfig::default()
    })
    .await;

    let response = http_client()
        .post(proxy_url(&relay, &upstream.uri()))
        .body("{}")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 504);
    let body: Value = response.json().await.unwrap();
    assert!(body["error"].as_str().unwrap().contains("aborted"));

    relay.shutdown().await.unwrap();
}

// ============================================================================
// Preflight and health
// ============================================================================

#[tokio::test]
async fn test_preflight_is_permissive() {
    let relay = start_relay(RelayConfig::default()).await;

    let response = http_client()
        .request(
            reqwest::Method::OPTIONS,
            format!("{}/mcp-proxy", relay.base_url()),
        )
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 204);
    let headers = response.headers();
    assert_eq!(headers.get("access-control-allow-origin").unwrap(), "*");
    assert_eq!(headers.get("access-control-allow-methods").unwrap(), "*");
    assert_eq!(headers.get("access-control-allow-headers").unwrap(), "*");
    assert_eq!(headers.get("access-control-max-age").unwrap(), "86400");

    relay.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_health() {
    let relay = start_relay(RelayConfig::default()).await;

    let body: Value = http_client()
        .get(format!("{}/health", relay.base_url()))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["service"], "mcplink");

    relay.shutdown().await.unwrap();
}
