//! Gateway integration tests
//!
//! Tests for ConnectionManager lifecycle operations and the diagnostics probe.
