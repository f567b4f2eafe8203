//! Handshake diagnostics
//!
//! Sends raw `initialize` requests to a configured server and reports the
//! response verbatim, so a failing handshake can be narrowed down to the
//! Accept / Content-Type combination the server objects to.

use std::collections::BTreeMap;
use std::sync::Arc;

use mcplink_core::protocol::{
    DEFAULT_ACCEPT, EVENT_STREAM, JSON_CONTENT_TYPE, JSON_UTF8_CONTENT_TYPE,
};
use mcplink_core::{ConfigStore, McpError, McpResult, ServerConfig};
use mcplink_mcp::headers::{version_headers, HeaderSet};
use mcplink_mcp::jsonrpc::{initialize_request, RequestId};
use mcplink_mcp::{ClientOptions, RoutedRequest, TransportFactory};
use reqwest::Method;
use serde::Serialize;
use tracing::{debug, info};

/// Raw response of one probe request
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProbeResponse {
    /// URL the request was sent to (the relay URL when relayed)
    pub url: String,
    pub status: u16,
    pub status_text: String,
    pub headers: BTreeMap<String, String>,
    /// `None` for the `sse-get` probe, whose body is a never-ending stream
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
}

/// Outcome of one variant; exactly one of `response` / `error` is set
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VariantResult {
    pub name: String,
    #[serde(flatten)]
    pub response: Option<ProbeResponse>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnosis {
    pub target: String,
    pub basic: ProbeResponse,
    /// Empty unless the basic probe answered 4xx
    pub results: Vec<VariantResult>,
}

struct PostVariant {
    name: &'static str,
    accept: &'static str,
    content_type: &'static str,
}

const POST_VARIANTS: &[PostVariant] = &[
    PostVariant {
        name: "json+eventstream",
        accept: DEFAULT_ACCEPT,
        content_type: JSON_UTF8_CONTENT_TYPE,
    },
    PostVariant {
        name: "json-only",
        accept: JSON_CONTENT_TYPE,
        content_type: JSON_CONTENT_TYPE,
    },
    PostVariant {
        name: "json-only-utf8",
        accept: JSON_CONTENT_TYPE,
        content_type: JSON_UTF8_CONTENT_TYPE,
    },
];

pub struct DiagnosticsProbe {
    store: Arc<dyn ConfigStore>,
    options: ClientOptions,
    http: reqwest::Client,
}

impl DiagnosticsProbe {
    pub fn new(store: Arc<dyn ConfigStore>, options: ClientOptions) -> McpResult<Self> {
        let http = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| McpError::Request(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self {
            store,
            options,
            http,
        })
    }

    async fn config(&self, id: &str) -> McpResult<ServerConfig> {
        self.store
            .get(id)
            .await?
            .ok_or_else(|| McpError::NotFound(id.to_string()))
    }

    /// One `initialize` POST with the configured Accept header and protocol version
    pub async fn test_connection(&self, id: &str) -> McpResult<ProbeResponse> {
        let config = self.config(id).await?;
        let accept = config.post_accept_or_default();
        let response = self
            .post_initialize(id, &config, accept, JSON_UTF8_CONTENT_TYPE, 0)
            .await?;
        info!(server_id = %id, status = response.status, "Connection test finished");
        Ok(response)
    }

    /// `test_connection`, plus the variant matrix when it answered 4xx.
    ///
    /// Variant failures are reported inline and never abort the run.
    pub async fn diagnose_connection(&self, id: &str) -> McpResult<Diagnosis> {
        let config = self.config(id).await?;
        let basic = self.test_connection(id).await?;

        let mut results = Vec::new();
        if (400..500).contains(&basic.status) {
            debug!(server_id = %id, status = basic.status, "Basic probe rejected, running variants");
            for variant in POST_VARIANTS {
                let outcome = self
                    .post_initialize(id, &config, variant.accept, variant.content_type, 1)
                    .await;
                results.push(VariantResult::from_outcome(variant.name, outcome));
            }
            let outcome = self.sse_get(&config).await;
            results.push(VariantResult::from_outcome("sse-get", outcome));
        }

        Ok(Diagnosis {
            target: config.base_url.clone(),
            basic,
            results,
        })
    }

    async fn post_initialize(
        &self,
        id: &str,
        config: &ServerConfig,
        accept: &str,
        content_type: &str,
        request_id: i64,
    ) -> McpResult<ProbeResponse> {
        let version = config.protocol_version_or_default();
        let mut headers = HeaderSet::new()
            .with("Content-Type", content_type)
            .with("Accept", accept);
        headers.extend(version_headers(version).iter());
        headers.extend(config.headers.iter().map(|(k, v)| (k.as_str(), v.as_str())));

        let body = initialize_request(
            RequestId::Number(request_id),
            version,
            &self.options.client_name(id),
        )?;
        let routed = self.route(config, headers)?;
        let body = serde_json::to_vec(&body)?;
        self.send(routed, Method::POST, Some(body), config).await
    }

    async fn sse_get(&self, config: &ServerConfig) -> McpResult<ProbeResponse> {
        let mut headers = HeaderSet::new().with("Accept", EVENT_STREAM);
        headers.extend(config.headers.iter().map(|(k, v)| (k.as_str(), v.as_str())));
        let routed = self.route(config, headers)?;
        self.send(routed, Method::GET, None, config).await
    }

    fn route(&self, config: &ServerConfig, headers: HeaderSet) -> McpResult<RoutedRequest> {
        let target = TransportFactory::validate(config)?;
        self.options.route(&target, headers)
    }

    async fn send(
        &self,
        routed: RoutedRequest,
        method: Method,
        body: Option<Vec<u8>>,
        config: &ServerConfig,
    ) -> McpResult<ProbeResponse> {
        let read_body = method != Method::GET;
        let timeout = config.timeout_duration();
        let mut builder = self
            .http
            .request(method, routed.url.clone())
            .headers(routed.headers.to_header_map()?)
            .timeout(timeout);
        if let Some(body) = body {
            builder = builder.body(body);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    McpError::Timeout(timeout.as_secs())
                } else {
                    McpError::Request(e.to_string())
                }
            })?;

        let status = response.status();
        let headers = response
            .headers()
            .iter()
            .map(|(name, value)| {
                (
                    name.as_str().to_string(),
                    String::from_utf8_lossy(value.as_bytes()).into_owned(),
                )
            })
            .collect();

        let body = if read_body {
            Some(response.text().await.unwrap_or_default())
        } else {
            None
        };

        Ok(ProbeResponse {
            url: routed.url.to_string(),
            status: status.as_u16(),
            status_text: status.canonical_reason().unwrap_or("").to_string(),
            headers,
            body,
        })
    }
}

impl VariantResult {
    fn from_outcome(name: &str, outcome: McpResult<ProbeResponse>) -> Self {
        match outcome {
            Ok(response) => Self {
                name: name.to_string(),
                response: Some(response),
                error: None,
            },
            Err(e) => Self {
                name: name.to_string(),
                response: None,
                error: Some(e.to_string()),
            },
        }
    }

    pub fn status(&self) -> Option<u16> {
        self.response.as_ref().map(|r| r.status)
    }
}
