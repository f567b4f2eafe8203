//! Outbound header policy
//!
//! Every request carries the negotiated protocol version under each alias in
//! [`MCP_VERSION_HEADER_KEYS`], an Accept header and the caller's configured
//! headers. Caller headers are applied last and win on a case-insensitive
//! name collision.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use mcplink_core::protocol::{
    EVENT_STREAM, JSON_CONTENT_TYPE, JSON_UTF8_CONTENT_TYPE, MCP_VERSION_HEADER_KEYS,
};
use mcplink_core::{McpError, McpResult, ServerConfig};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde_json::Value;

/// Ordered header list with case-insensitive replacement.
///
/// Kept as a list rather than a `HeaderMap` so the spelling the caller chose
/// survives into the relay bundle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderSet {
    entries: Vec<(String, String)>,
}

impl HeaderSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a header, replacing any existing entry whose name matches ignoring case
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self
            .entries
            .iter_mut()
            .find(|(existing, _)| existing.eq_ignore_ascii_case(&name))
        {
            Some(slot) => *slot = (name, value),
            None => self.entries.push((name, value)),
        }
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.set(name, value);
        self
    }

    /// Apply every entry of `other` over this set
    pub fn extend<I, K, V>(&mut self, other: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        for (name, value) in other {
            self.set(name, value);
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(existing, _)| existing.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn remove(&mut self, name: &str) -> Option<String> {
        let pos = self
            .entries
            .iter()
            .position(|(existing, _)| existing.eq_ignore_ascii_case(name))?;
        Some(self.entries.remove(pos).1)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Convert to a reqwest header map; an invalid name or value is a config error
    pub fn to_header_map(&self) -> McpResult<HeaderMap> {
        let mut map = HeaderMap::with_capacity(self.entries.len());
        for (name, value) in &self.entries {
            let header_name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|_| McpError::InvalidConfig(format!("invalid header name '{}'", name)))?;
            let header_value = HeaderValue::from_str(value).map_err(|_| {
                McpError::InvalidConfig(format!("invalid value for header '{}'", name))
            })?;
            map.insert(header_name, header_value);
        }
        Ok(map)
    }

    /// base64(JSON object) form carried in `x-proxy-forward-headers`
    pub fn encode_bundle(&self) -> String {
        let object: serde_json::Map<String, Value> = self
            .entries
            .iter()
            .map(|(k, v)| (k.clone(), Value::String(v.clone())))
            .collect();
        STANDARD.encode(Value::Object(object).to_string())
    }

    /// Decode a relay bundle; anything that is not base64 of a JSON object yields `None`.
    ///
    /// Scalar values are stringified, nested values and nulls are dropped.
    pub fn decode_bundle(encoded: &str) -> Option<Self> {
        let raw = STANDARD.decode(encoded.trim()).ok()?;
        let object: serde_json::Map<String, Value> = serde_json::from_slice(&raw).ok()?;

        let mut set = HeaderSet::new();
        for (name, value) in object {
            let value = match value {
                Value::String(s) => s,
                Value::Number(n) => n.to_string(),
                Value::Bool(b) => b.to_string(),
                _ => continue,
            };
            set.set(name, value);
        }
        Some(set)
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for HeaderSet {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let mut set = HeaderSet::new();
        set.extend(iter);
        set
    }
}

/// The protocol version under every alias header name
pub fn version_headers(version: &str) -> HeaderSet {
    MCP_VERSION_HEADER_KEYS
        .iter()
        .map(|key| (*key, version))
        .collect()
}

/// Headers for JSON-RPC POSTs on the Streamable HTTP transport
pub fn streamable_post_headers(config: &ServerConfig, version: &str) -> HeaderSet {
    let mut headers = HeaderSet::new()
        .with("Content-Type", JSON_UTF8_CONTENT_TYPE)
        .with("Accept", config.post_accept_or_default());
    headers.extend(version_headers(version).entries);
    headers.extend(config.headers.iter().map(|(k, v)| (k.as_str(), v.as_str())));
    headers
}

/// Headers for the long-lived GET of the SSE transport
pub fn sse_stream_headers(config: &ServerConfig, version: &str) -> HeaderSet {
    let mut headers = HeaderSet::new()
        .with("Accept", EVENT_STREAM)
        .with("Cache-Control", "no-cache");
    headers.extend(version_headers(version).entries);
    headers.extend(config.headers.iter().map(|(k, v)| (k.as_str(), v.as_str())));
    headers
}

/// Headers for POSTs to the endpoint announced on the SSE stream
pub fn sse_post_headers(config: &ServerConfig, version: &str) -> HeaderSet {
    let mut headers = HeaderSet::new()
        .with("Content-Type", JSON_CONTENT_TYPE)
        .with("Accept", config.post_accept_or_default());
    headers.extend(version_headers(version).entries);
    headers.extend(config.headers.iter().map(|(k, v)| (k.as_str(), v.as_str())));
    headers
}
