//! Cross-origin routing through the same-origin relay
//!
//! A request whose target origin differs from the configured page origin is
//! rewritten to `<page origin><relay path>?target=<url>` and its computed
//! headers are folded into a single `x-proxy-forward-headers` bundle.

use mcplink_core::branding::{CLIENT_NAME_PREFIX, RELAY_PATH};
use mcplink_core::protocol::{FORWARD_HEADERS_HEADER, TARGET_QUERY_PARAM};
use mcplink_core::{McpError, McpResult};
use url::Url;

use crate::headers::HeaderSet;

/// Options shared by every client the factory builds
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// Origin the client runs under; `None` disables relaying entirely
    pub page_origin: Option<Url>,
    /// Path of the relay endpoint on the page origin
    pub relay_path: String,
    /// `clientInfo.name` prefix, completed with `-<id>`
    pub client_name_prefix: String,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            page_origin: None,
            relay_path: RELAY_PATH.to_string(),
            client_name_prefix: CLIENT_NAME_PREFIX.to_string(),
        }
    }
}

impl ClientOptions {
    pub fn with_page_origin(mut self, origin: Url) -> Self {
        self.page_origin = Some(origin);
        self
    }

    pub fn client_name(&self, server_id: &str) -> String {
        format!("{}-{}", self.client_name_prefix, server_id)
    }

    /// True when `target` must go through the relay
    pub fn is_cross_origin(&self, target: &Url) -> bool {
        match &self.page_origin {
            Some(page) => page.origin() != target.origin(),
            None => false,
        }
    }

    /// Absolute relay URL on the page origin, with the target in the query
    pub fn relay_url(&self, target: &Url) -> McpResult<Url> {
        let page = self
            .page_origin
            .as_ref()
            .ok_or_else(|| McpError::InvalidConfig("no page origin configured".to_string()))?;
        let mut url = page
            .join(&self.relay_path)
            .map_err(|e| McpError::InvalidConfig(format!("invalid relay path: {}", e)))?;
        url.set_query(None);
        url.query_pairs_mut()
            .append_pair(TARGET_QUERY_PARAM, target.as_str());
        Ok(url)
    }

    /// Decide where a request to `target` with `headers` is actually sent
    pub fn route(&self, target: &Url, headers: HeaderSet) -> McpResult<RoutedRequest> {
        if !self.is_cross_origin(target) {
            return Ok(RoutedRequest {
                url: target.clone(),
                headers,
                relayed: false,
            });
        }

        let bundle = headers.encode_bundle();
        Ok(RoutedRequest {
            url: self.relay_url(target)?,
            headers: HeaderSet::new().with(FORWARD_HEADERS_HEADER, bundle),
            relayed: true,
        })
    }
}

/// Final destination and header set of an outbound request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutedRequest {
    pub url: Url,
    pub headers: HeaderSet,
    pub relayed: bool,
}
