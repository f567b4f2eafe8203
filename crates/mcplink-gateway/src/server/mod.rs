//! Relay Server
//!
//! Same-origin HTTP relay: a browser page that cannot reach a remote MCP
//! server directly (CORS) posts to `/mcp-proxy?target=<url>` instead, and the
//! relay forwards the request with the headers carried in the bundle header.

mod handlers;
pub mod logging_middleware;

pub use handlers::{HealthResponse, ProxyParams, RelayState};

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::Context;
use axum::{extract::DefaultBodyLimit, middleware, routing::get, Router};
use mcplink_core::branding::{DEFAULT_RELAY_PORT, RELAY_PATH};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

/// Relay server configuration
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Host to bind to
    pub host: String,
    /// Port to listen on (0 picks a free port)
    pub port: u16,
    /// Add a permissive CORS layer on top of the preflight route
    pub enable_cors: bool,
    /// Longest wait for upstream response headers
    pub upstream_timeout: Duration,
    /// Largest accepted request body
    pub max_body_bytes: usize,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: DEFAULT_RELAY_PORT,
            enable_cors: false,
            upstream_timeout: Duration::from_secs(600),
            max_body_bytes: 16 * 1024 * 1024,
        }
    }
}

impl RelayConfig {
    /// Get the socket address
    pub fn addr(&self) -> anyhow::Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .with_context(|| format!("invalid relay address {}:{}", self.host, self.port))
    }

    /// Base URL pages should use as their origin
    pub fn base_url(&self) -> String {
        format!("http://localhost:{}", self.port)
    }

    /// Defaults overridden by `MCPLINK_HOST`, `MCPLINK_PORT`, `MCPLINK_CORS`
    /// and `MCPLINK_RELAY_TIMEOUT_SECS`
    pub fn from_env() -> anyhow::Result<Self> {
        let mut config = Self::default();

        if let Ok(host) = std::env::var("MCPLINK_HOST") {
            config.host = host;
        }
        if let Ok(port) = std::env::var("MCPLINK_PORT") {
            config.port = port
                .parse()
                .with_context(|| format!("MCPLINK_PORT is not a port number: {}", port))?;
        }
        if let Ok(cors) = std::env::var("MCPLINK_CORS") {
            config.enable_cors = matches!(cors.as_str(), "1" | "true" | "yes" | "on");
        }
        if let Ok(secs) = std::env::var("MCPLINK_RELAY_TIMEOUT_SECS") {
            let secs: u64 = secs
                .parse()
                .with_context(|| format!("MCPLINK_RELAY_TIMEOUT_SECS is not a number: {}", secs))?;
            config.upstream_timeout = Duration::from_secs(secs);
        }

        Ok(config)
    }
}

/// Build the relay router around an existing state
pub fn relay_router(state: RelayState, config: &RelayConfig) -> Router {
    let mut router = Router::new()
        .route("/health", get(handlers::health))
        .route(
            RELAY_PATH,
            get(handlers::mcp_proxy)
                .post(handlers::mcp_proxy)
                .options(handlers::mcp_proxy_preflight),
        )
        .layer(DefaultBodyLimit::max(config.max_body_bytes))
        .with_state(state)
        .layer(middleware::from_fn(
            logging_middleware::http_logging_middleware,
        ))
        .layer(TraceLayer::new_for_http());

    if config.enable_cors {
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);
        router = router.layer(cors);
    }

    router
}

/// Handle to a relay running in the background
#[derive(Debug)]
pub struct RelayHandle {
    /// Address actually bound (resolves port 0)
    pub addr: SocketAddr,
    shutdown: CancellationToken,
    task: JoinHandle<anyhow::Result<()>>,
}

impl RelayHandle {
    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Stop accepting connections and wait for the server task
    pub async fn shutdown(self) -> anyhow::Result<()> {
        self.shutdown.cancel();
        self.task.await.context("relay task panicked")?
    }
}

/// Same-origin relay server
pub struct RelayServer {
    config: RelayConfig,
    state: RelayState,
}

impl RelayServer {
    pub fn new(config: RelayConfig) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .context("failed to build relay HTTP client")?;

        Ok(Self {
            state: RelayState {
                http,
                upstream_timeout: config.upstream_timeout,
            },
            config,
        })
    }

    pub fn config(&self) -> &RelayConfig {
        &self.config
    }

    pub fn router(&self) -> Router {
        relay_router(self.state.clone(), &self.config)
    }

    /// Bind and serve in the background until the handle is shut down
    pub async fn start(self) -> anyhow::Result<RelayHandle> {
        let addr = self.config.addr()?;
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .with_context(|| format!("failed to bind relay on {}", addr))?;
        let addr = listener.local_addr()?;
        let router = self.router();

        info!("[Relay] Listening on {}", addr);
        info!(
            "[Relay] CORS: {}",
            if self.config.enable_cors {
                "enabled"
            } else {
                "disabled"
            }
        );

        let shutdown = CancellationToken::new();
        let signal = shutdown.clone();
        let task = tokio::spawn(async move {
            axum::serve(listener, router)
                .with_graceful_shutdown(async move { signal.cancelled().await })
                .await?;
            info!("[Relay] Stopped");
            Ok(())
        });

        Ok(RelayHandle {
            addr,
            shutdown,
            task,
        })
    }

    /// Run the relay until the process receives Ctrl-C
    pub async fn run(self) -> anyhow::Result<()> {
        let handle = self.start().await?;

        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("[Relay] Failed to listen for shutdown signal: {}", e);
        }
        info!("[Relay] Shutting down");
        handle.shutdown().await
    }

    /// Start the relay in the background
    pub fn spawn(self) -> JoinHandle<anyhow::Result<()>> {
        tokio::spawn(async move { self.run().await })
    }
}
