//! Trace Context - Request correlation for relayed requests
//!
//! Generates short trace IDs and the spans every relay log line is emitted under.

use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{info, info_span, Span};

/// Global request counter for trace ID generation
static REQUEST_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Generate a short, unique trace ID for this request
/// Format: 6 hex characters (e.g., "a1b2c3")
pub fn generate_trace_id() -> String {
    let counter = REQUEST_COUNTER.fetch_add(1, Ordering::Relaxed);
    let timestamp = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_micros() as u64)
        .unwrap_or(0);

    // counter keeps ids distinct within the same microsecond
    let mixed = counter.wrapping_mul(0x9E37_79B9).wrapping_add(timestamp);
    format!("{:06x}", mixed & 0xFFFFFF)
}

/// Correlation data for one relay request
#[derive(Debug, Clone)]
pub struct TraceContext {
    /// Unique trace ID (6 hex chars)
    pub trace_id: String,
    pub method: String,
    pub path: String,
    /// Host of the relay target
    pub target_host: Option<String>,
    pub started_at: std::time::Instant,
}

impl TraceContext {
    pub fn new(method: &str, path: &str) -> Self {
        Self {
            trace_id: generate_trace_id(),
            method: method.to_string(),
            path: path.to_string(),
            target_host: None,
            started_at: std::time::Instant::now(),
        }
    }

    pub fn with_target_host(mut self, host: Option<String>) -> Self {
        self.target_host = host;
        self
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.started_at.elapsed().as_millis() as u64
    }
}

/// Request span builder for structured logging
pub struct RequestSpan;

impl RequestSpan {
    /// Span carrying the trace id into every child log line
    pub fn enter(ctx: &TraceContext) -> Span {
        info_span!(
            "request",
            trace_id = %ctx.trace_id,
            method = %ctx.method,
            path = %ctx.path,
        )
    }

    /// Single entry line
    pub fn log_entry(ctx: &TraceContext) {
        match &ctx.target_host {
            Some(host) => info!(
                trace_id = %ctx.trace_id,
                upstream = %host,
                "→ {} {}",
                ctx.method,
                ctx.path
            ),
            None => info!(trace_id = %ctx.trace_id, "→ {} {}", ctx.method, ctx.path),
        }
    }

    /// Single exit line
    pub fn log_exit(ctx: &TraceContext, status: u16) {
        info!(
            trace_id = %ctx.trace_id,
            "← {} ({}ms)",
            status,
            ctx.elapsed_ms()
        );
    }
}
