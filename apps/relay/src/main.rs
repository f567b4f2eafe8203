//! McpLink relay binary
//!
//! Serves `/mcp-proxy` and `/health`. Configuration comes from the
//! environment (a `.env` file is loaded when present):
//!
//! - `MCPLINK_HOST` / `MCPLINK_PORT` - bind address (default 127.0.0.1:3000)
//! - `MCPLINK_CORS` - add a permissive CORS layer
//! - `MCPLINK_RELAY_TIMEOUT_SECS` - upstream header timeout
//! - `MCPLINK_LOG_DIR` - also write daily-rotated log files there
//! - `RUST_LOG` - log filter

use std::path::PathBuf;

use mcplink_core::branding;
use mcplink_gateway::{RelayConfig, RelayServer};
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;

/// Default filter when RUST_LOG is not set
const DEFAULT_FILTER: &str = "info,mcplink_core=debug,mcplink_mcp=debug,mcplink_gateway=debug,mcplink_relay=debug";

/// Console output always; file output when `MCPLINK_LOG_DIR` is set.
///
/// The returned guard flushes the file writer and must outlive the server.
fn init_tracing() -> Option<WorkerGuard> {
    use tracing_appender::rolling::{RollingFileAppender, Rotation};
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let console_layer = fmt::layer()
        .with_ansi(true)
        .compact()
        .with_thread_names(false)
        .with_line_number(false)
        .with_file(false)
        .with_target(true);

    let mut guard = None;
    let file_layer = std::env::var_os("MCPLINK_LOG_DIR")
        .map(PathBuf::from)
        .and_then(|dir| {
            // Creates files like: mcplink.2026-01-22.log
            RollingFileAppender::builder()
                .rotation(Rotation::DAILY)
                .filename_prefix(branding::LOG_PREFIX)
                .filename_suffix("log")
                .build(&dir)
                .map_err(|e| eprintln!("Warning: file logging disabled ({}): {}", dir.display(), e))
                .ok()
        })
        .map(|appender| {
            let (writer, file_guard) = tracing_appender::non_blocking(appender);
            guard = Some(file_guard);
            fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_thread_ids(true)
                .with_line_number(true)
                .with_file(true)
                .with_target(true)
        });

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .init();

    guard
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    // Dropping the guard stops file logging
    let _log_guard = init_tracing();

    let config = RelayConfig::from_env()?;
    info!(
        "[Relay] {} v{} starting on {}",
        branding::DISPLAY_NAME,
        env!("CARGO_PKG_VERSION"),
        config.base_url()
    );

    RelayServer::new(config)?.run().await
}
