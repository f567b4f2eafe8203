//! Minimal JSON-RPC 2.0 envelope types

use mcplink_core::branding::CLIENT_VERSION;
use mcplink_core::protocol::methods;
use mcplink_core::{McpError, McpResult};
use rmcp::model::{ClientCapabilities, ClientInfo, Implementation, ProtocolVersion};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestId {
    Number(i64),
    String(String),
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestId::Number(n) => write!(f, "{}", n),
            RequestId::String(s) => f.write_str(s),
        }
    }
}

/// Outbound request or notification (a notification has no id)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<RequestId>,
    pub method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl JsonRpcRequest {
    pub fn new(id: RequestId, method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id: Some(id),
            method: method.into(),
            params,
        }
    }

    pub fn notification(method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id: None,
            method: method.into(),
            params,
        }
    }

    pub fn is_notification(&self) -> bool {
        self.id.is_none()
    }

    /// Parse an opaque JSON-RPC value supplied by a caller
    pub fn from_value(value: Value) -> McpResult<Self> {
        let request: JsonRpcRequest = serde_json::from_value(value)
            .map_err(|e| McpError::Protocol(format!("invalid JSON-RPC request: {}", e)))?;
        Ok(request)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JsonRpcError {
    pub code: i64,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// Inbound response
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct JsonRpcResponse {
    #[serde(default)]
    pub id: Option<RequestId>,
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub error: Option<JsonRpcError>,
}

impl JsonRpcResponse {
    pub fn into_result(self) -> McpResult<Value> {
        if let Some(error) = self.error {
            return Err(McpError::Rpc {
                code: error.code,
                message: error.message,
            });
        }
        Ok(self.result.unwrap_or(Value::Null))
    }
}

/// Every response carried by a message that may be a batch.
///
/// Requests and notifications sent by the server are skipped.
pub fn collect_responses(message: Value) -> Vec<JsonRpcResponse> {
    let candidates = match message {
        Value::Array(items) => items,
        other => vec![other],
    };
    candidates
        .into_iter()
        .filter(|item| item.get("method").is_none())
        .filter_map(|item| serde_json::from_value::<JsonRpcResponse>(item).ok())
        .filter(|response| response.id.is_some())
        .collect()
}

/// The response for `id` inside a message, if present
pub fn find_response(message: Value, id: &RequestId) -> Option<JsonRpcResponse> {
    collect_responses(message)
        .into_iter()
        .find(|response| response.id.as_ref() == Some(id))
}

/// Params of the `initialize` request.
///
/// Capabilities stay empty; the version string is sent as given, known or not.
pub fn initialize_params(protocol_version: &str, client_name: &str) -> McpResult<Value> {
    let protocol_version = ProtocolVersion::deserialize(Value::from(protocol_version))
        .map_err(|e| McpError::InvalidConfig(format!("invalid protocol version: {}", e)))?;

    let info = ClientInfo {
        meta: None,
        protocol_version,
        capabilities: ClientCapabilities::default(),
        client_info: Implementation {
            name: client_name.to_string(),
            version: CLIENT_VERSION.to_string(),
            ..Default::default()
        },
    };
    serde_json::to_value(&info)
        .map_err(|e| McpError::Protocol(format!("failed to encode initialize params: {}", e)))
}

pub fn initialize_request(
    id: RequestId,
    protocol_version: &str,
    client_name: &str,
) -> McpResult<JsonRpcRequest> {
    Ok(JsonRpcRequest::new(
        id,
        methods::INITIALIZE,
        Some(initialize_params(protocol_version, client_name)?),
    ))
}

pub fn initialized_notification() -> JsonRpcRequest {
    JsonRpcRequest::notification(methods::INITIALIZED, None)
}
