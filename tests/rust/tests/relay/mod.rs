//! Relay Proxy Integration Tests
//!
//! Runs the relay on an ephemeral port in front of wiremock upstreams:
//! - HTTP contract (target validation, header bundle, stripped headers, errors)
//! - Cross-origin clients routed through the relay end to end

mod proxy;
