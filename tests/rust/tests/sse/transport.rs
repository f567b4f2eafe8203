//! SSE client behaviour: endpoint discovery, request matching, stream loss

use std::time::Duration;

use mcplink_core::protocol::MCP_PROTOCOL_VERSION;
use mcplink_core::{McpError, ServerConfig};
use mcplink_mcp::{ClientOptions, McpClient, TransportFactory};
use pretty_assertions::assert_eq;
use tests::servers::{LegacySseServer, SseBehavior, HANGUP_METHOD};

fn factory() -> TransportFactory {
    TransportFactory::new(ClientOptions::default()).unwrap()
}

#[tokio::test]
async fn test_handshake_and_tools() {
    let server = LegacySseServer::start(SseBehavior::Normal).await;

    let client = factory()
        .connect("legacy", &ServerConfig::sse(server.url()))
        .await
        .unwrap();
    let names: Vec<String> = client
        .list_tools()
        .await
        .unwrap()
        .into_iter()
        .map(|t| t.name.to_string())
        .collect();
    assert_eq!(names, vec!["search", "fetch"]);

    match &client {
        McpClient::Sse(inner) => {
            assert_eq!(inner.endpoint().path(), "/messages");
            assert_eq!(inner.endpoint().port(), Some(server.addr.port()));
        }
        McpClient::Streamable(_) => panic!("expected an SSE client"),
    }
    client.close().await;
}

#[tokio::test]
async fn test_stream_and_post_headers() {
    let server = LegacySseServer::start(SseBehavior::Normal).await;
    let config = ServerConfig::sse(server.url()).with_header("X-Api-Key", "k-1");

    factory().connect("h", &config).await.unwrap();

    let streams = server.stream_headers();
    assert_eq!(streams.len(), 1);
    let get = &streams[0];
    assert_eq!(get.get("accept").unwrap(), "text/event-stream");
    assert_eq!(get.get("cache-control").unwrap(), "no-cache");
    assert_eq!(get.get("x-api-key").unwrap(), "k-1");
    for alias in ["x-mcp-version", "mcp-protocol-version", "mcp-version"] {
        assert_eq!(get.get(alias).unwrap(), MCP_PROTOCOL_VERSION, "{}", alias);
    }

    let posts = server.post_headers();
    // initialize + notifications/initialized
    assert_eq!(posts.len(), 2);
    for post in &posts {
        assert_eq!(post.get("content-type").unwrap(), "application/json");
        assert_eq!(post.get("x-api-key").unwrap(), "k-1");
        for alias in ["x-mcp-version", "mcp-protocol-version", "mcp-version"] {
            assert_eq!(post.get(alias).unwrap(), MCP_PROTOCOL_VERSION, "{}", alias);
        }
    }
}

#[tokio::test]
async fn test_foreign_endpoint_is_rejected() {
    let server = LegacySseServer::start(SseBehavior::ForeignEndpoint).await;

    let err = factory()
        .open("foreign", &ServerConfig::sse(server.url()))
        .await
        .unwrap_err();
    assert!(matches!(err, McpError::Protocol(ref m) if m.contains("origin")), "{:?}", err);
}

#[tokio::test]
async fn test_missing_stream_is_http_error() {
    let server = LegacySseServer::start(SseBehavior::Normal).await;
    let url = format!("http://{}/missing", server.addr);

    let err = factory()
        .open("missing", &ServerConfig::sse(url))
        .await
        .unwrap_err();
    assert!(matches!(err, McpError::Http { status: 404, .. }), "{:?}", err);
}

#[tokio::test]
async fn test_unanswered_request_times_out() {
    let server = LegacySseServer::start(SseBehavior::Silent).await;

    let client = factory()
        .open("silent", &ServerConfig::sse(server.url()).with_timeout(1))
        .await
        .unwrap();
    let err = client.request("tools/list", None).await.unwrap_err();
    assert_eq!(err, McpError::Timeout(1));

    // the stream itself is still open
    assert!(!client.is_closed());
    client.close().await;
}

#[tokio::test]
async fn test_stream_end_fails_pending_request() {
    let server = LegacySseServer::start(SseBehavior::Normal).await;
    let client = factory()
        .connect("hangup", &ServerConfig::sse(server.url()))
        .await
        .unwrap();

    let err = client.request(HANGUP_METHOD, None).await.unwrap_err();
    assert_eq!(err, McpError::TransportClosed);

    tokio::time::timeout(Duration::from_secs(2), async {
        while !client.is_closed() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("client notices the closed stream");

    let err = client.request("tools/list", None).await.unwrap_err();
    assert_eq!(err, McpError::TransportClosed);
}

#[tokio::test]
async fn test_close_is_idempotent() {
    let server = LegacySseServer::start(SseBehavior::Normal).await;
    let client = factory()
        .connect("close", &ServerConfig::sse(server.url()))
        .await
        .unwrap();

    client.close().await;
    client.close().await;
    assert!(client.is_closed());
    assert_eq!(
        client.request("tools/list", None).await.unwrap_err(),
        McpError::TransportClosed
    );
}

#[tokio::test]
async fn test_unreachable_server_fails_to_open() {
    let config = ServerConfig::sse("http://127.0.0.1:9/sse").with_timeout(2);
    let err = factory().open("down", &config).await.unwrap_err();
    assert!(
        matches!(err, McpError::Request(_) | McpError::Timeout(_)),
        "{:?}",
        err
    );
}
