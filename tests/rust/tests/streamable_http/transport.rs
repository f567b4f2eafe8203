//! Streamable HTTP client behaviour against scripted servers

use std::time::Duration;

use mcplink_core::protocol::MCP_PROTOCOL_VERSION;
use mcplink_core::{McpError, ServerConfig};
use mcplink_mcp::{ClientOptions, McpClient, TransportFactory};
use pretty_assertions::assert_eq;
use serde_json::json;
use tests::servers::{header_values, rpc_method, JsonRpcResponder};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn factory() -> TransportFactory {
    TransportFactory::new(ClientOptions::default()).unwrap()
}

async fn mock_server(responder: JsonRpcResponder) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/mcp"))
        .respond_with(responder)
        .mount(&server)
        .await;
    server
}

fn config_for(server: &MockServer) -> ServerConfig {
    ServerConfig::streamable_http(format!("{}/mcp", server.uri()))
}

// ============================================================================
// Handshake and tool listing
// ============================================================================

#[tokio::test]
async fn test_handshake_and_tools_over_json() {
    let server = mock_server(JsonRpcResponder::new()).await;

    let client = factory().connect("json", &config_for(&server)).await.unwrap();
    let tools = client.list_tools().await.unwrap();
    assert_eq!(tools.len(), 1);
    assert_eq!(tools[0].name, "echo");

    let requests = server.received_requests().await.unwrap();
    let methods: Vec<_> = requests.iter().filter_map(rpc_method).collect();
    assert_eq!(
        methods,
        vec!["initialize", "notifications/initialized", "tools/list"]
    );
}

#[tokio::test]
async fn test_initialize_body_shape() {
    let server = mock_server(JsonRpcResponder::new()).await;
    factory().connect("github", &config_for(&server)).await.unwrap();

    let requests = server.received_requests().await.unwrap();
    let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert_eq!(body["jsonrpc"], "2.0");
    assert_eq!(body["method"], "initialize");
    assert_eq!(body["params"]["protocolVersion"], MCP_PROTOCOL_VERSION);
    assert_eq!(body["params"]["clientInfo"]["name"], "mcplink-client-github");
    assert_eq!(body["params"]["capabilities"], json!({}));
}

#[tokio::test]
async fn test_handshake_and_tools_over_event_stream() {
    let server = mock_server(JsonRpcResponder::new().with_event_stream()).await;

    let client = factory().connect("stream", &config_for(&server)).await.unwrap();
    let tools = client.list_tools().await.unwrap();
    assert_eq!(tools.len(), 1);
    assert_eq!(tools[0].name, "echo");
}

#[tokio::test]
async fn test_tools_list_follows_cursor() {
    let responder =
        JsonRpcResponder::new().with_tool_pages(&[&["a", "b"], &["c"], &["d", "e"]]);
    let server = mock_server(responder).await;

    let client = factory().connect("paged", &config_for(&server)).await.unwrap();
    let names: Vec<String> = client
        .list_tools()
        .await
        .unwrap()
        .into_iter()
        .map(|t| t.name.to_string())
        .collect();
    assert_eq!(names, vec!["a", "b", "c", "d", "e"]);
}

// ============================================================================
// Header policy
// ============================================================================

#[tokio::test]
async fn test_every_request_carries_all_version_aliases() {
    let server = mock_server(JsonRpcResponder::new()).await;
    let client = factory().connect("v", &config_for(&server)).await.unwrap();
    client.list_tools().await.unwrap();

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 3);
    for name in ["X-MCP-Version", "MCP-Protocol-Version", "mcp-version"] {
        assert_eq!(
            header_values(&requests, name),
            vec![Some(MCP_PROTOCOL_VERSION.to_string()); 3],
            "header {}",
            name
        );
    }
    assert_eq!(
        header_values(&requests, "accept")[0].as_deref(),
        Some("application/json, text/event-stream")
    );
    assert_eq!(
        header_values(&requests, "content-type")[0].as_deref(),
        Some("application/json; charset=utf-8")
    );
}

#[tokio::test]
async fn test_config_overrides_version_accept_and_headers() {
    let server = mock_server(JsonRpcResponder::new()).await;
    let config = config_for(&server)
        .with_protocol_version("2024-11-05")
        .with_post_accept("application/json")
        .with_header("Authorization", "Bearer secret")
        .with_header("content-type", "application/json");

    factory().connect("custom", &config).await.unwrap();

    let requests = server.received_requests().await.unwrap();
    let first = &requests[0];
    assert_eq!(first.headers.get("mcp-protocol-version").unwrap(), "2024-11-05");
    assert_eq!(first.headers.get("x-mcp-version").unwrap(), "2024-11-05");
    assert_eq!(first.headers.get("accept").unwrap(), "application/json");
    assert_eq!(first.headers.get("authorization").unwrap(), "Bearer secret");
    // caller header replaces the computed one instead of being appended
    assert_eq!(first.headers.get_all("content-type").iter().count(), 1);
    assert_eq!(first.headers.get("content-type").unwrap(), "application/json");

    let body: serde_json::Value = serde_json::from_slice(&first.body).unwrap();
    assert_eq!(body["params"]["protocolVersion"], "2024-11-05");
}

// ============================================================================
// Sessions
// ============================================================================

#[tokio::test]
async fn test_session_id_is_echoed_and_deleted_on_close() {
    let server = mock_server(JsonRpcResponder::new().with_session("sess-42")).await;
    Mock::given(method("DELETE"))
        .and(path("/mcp"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let client = factory().connect("s", &config_for(&server)).await.unwrap();
    client.list_tools().await.unwrap();

    let requests = server.received_requests().await.unwrap();
    let sessions = header_values(&requests, "mcp-session-id");
    assert_eq!(sessions[0], None);
    assert!(sessions[1..].iter().all(|s| s.as_deref() == Some("sess-42")));

    client.close().await;
    assert!(client.is_closed());

    let requests = server.received_requests().await.unwrap();
    let delete = requests.last().unwrap();
    assert_eq!(delete.method.as_str(), "DELETE");
    assert_eq!(delete.headers.get("mcp-session-id").unwrap(), "sess-42");

    let err = client.request("ping", None).await.unwrap_err();
    assert_eq!(err, McpError::TransportClosed);

    // second close sends nothing
    client.close().await;
    assert_eq!(server.received_requests().await.unwrap().len(), requests.len());
}

// ============================================================================
// Failures
// ============================================================================

#[tokio::test]
async fn test_http_error_fails_handshake() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500).set_body_string("backend exploded"))
        .mount(&server)
        .await;

    let err = factory().connect("e", &config_for(&server)).await.unwrap_err();
    match err {
        McpError::HandshakeFailure(message) => {
            assert!(message.contains("500"), "{}", message);
            assert!(message.contains("backend exploded"), "{}", message);
        }
        other => panic!("expected handshake failure, got {:?}", other),
    }
}

#[tokio::test]
async fn test_slow_server_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(3)))
        .mount(&server)
        .await;

    // opening a streamable client does not touch the network
    let client = factory()
        .open("slow", &config_for(&server).with_timeout(1))
        .await
        .unwrap();

    let err = client.request("ping", None).await.unwrap_err();
    assert_eq!(err, McpError::Timeout(1));
    assert!(err.is_timeout());
}

#[tokio::test]
async fn test_unreachable_server_fails_handshake() {
    let config = ServerConfig::streamable_http(tests::fixtures::unreachable_url());
    let err = factory().connect("down", &config).await.unwrap_err();
    assert!(matches!(err, McpError::HandshakeFailure(ref m) if !m.is_empty()));
}

#[tokio::test]
async fn test_rpc_error_is_returned() {
    let server = mock_server(JsonRpcResponder::new()).await;
    let client = factory().connect("rpc", &config_for(&server)).await.unwrap();

    let err = client.request("resources/list", None).await.unwrap_err();
    assert!(matches!(err, McpError::Rpc { code: -32601, .. }));
}

// ============================================================================
// Passthrough
// ============================================================================

#[tokio::test]
async fn test_execute_renumbers_requests() {
    let server = mock_server(JsonRpcResponder::new()).await;
    let client = factory().connect("x", &config_for(&server)).await.unwrap();

    let result = client
        .execute(json!({"jsonrpc": "2.0", "id": "caller-7", "method": "tools/list"}))
        .await
        .unwrap();
    assert_eq!(result["tools"][0]["name"], "echo");

    let requests = server.received_requests().await.unwrap();
    let body: serde_json::Value = serde_json::from_slice(&requests.last().unwrap().body).unwrap();
    assert_ne!(body["id"], "caller-7");

    let notified = client
        .execute(json!({"jsonrpc": "2.0", "method": "notifications/cancelled"}))
        .await
        .unwrap();
    assert!(notified.is_null());
}

#[tokio::test]
async fn test_client_reports_transport() {
    let server = mock_server(JsonRpcResponder::new()).await;
    let client = factory().connect("t", &config_for(&server)).await.unwrap();

    assert_eq!(client.server_id(), "t");
    assert_eq!(client.protocol_version(), MCP_PROTOCOL_VERSION);
    match &client {
        McpClient::Streamable(inner) => {
            assert!(!inner.is_relayed());
            assert_eq!(inner.request_url().as_str(), format!("{}/mcp", server.uri()));
        }
        McpClient::Sse(_) => panic!("expected a streamable client"),
    }
}
