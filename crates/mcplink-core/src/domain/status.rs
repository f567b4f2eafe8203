//! Display status derived from the config store and the connection registry.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Connection status as shown to callers.
///
/// Serialized as `{"status": "...", "errorMsg": "..."}` with `errorMsg`
/// present only for errors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "errorMsg", rename_all = "lowercase")]
pub enum DisplayStatus {
    Paused,
    Undefined,
    Initializing,
    Active,
    Error(String),
}

impl DisplayStatus {
    pub fn label(&self) -> &'static str {
        match self {
            DisplayStatus::Paused => "paused",
            DisplayStatus::Undefined => "undefined",
            DisplayStatus::Initializing => "initializing",
            DisplayStatus::Active => "active",
            DisplayStatus::Error(_) => "error",
        }
    }

    pub fn error_message(&self) -> Option<&str> {
        match self {
            DisplayStatus::Error(message) => Some(message.as_str()),
            _ => None,
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self, DisplayStatus::Active)
    }
}

impl fmt::Display for DisplayStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DisplayStatus::Error(message) => write!(f, "error: {}", message),
            other => f.write_str(other.label()),
        }
    }
}
