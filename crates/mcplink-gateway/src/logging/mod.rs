//! Centralized Logging Infrastructure
//!
//! Trace IDs and request spans for the relay. Subscriber setup (console and
//! rolling file output) lives in the relay binary.

mod trace_context;

pub use trace_context::{generate_trace_id, RequestSpan, TraceContext};
