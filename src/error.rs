use std::fmt::Display;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum HubError {
    #[error("Server already connected: {0}")]
    AlreadyConnected(String),

    #[error("Server not connected: {0}")]
    NotConnected(String),

    #[error("Configuration load failed: {0}")]
    ConfigurationLoadFailure(String),

    #[error("Transport failure on {name}: {message}")]
    Transport { name: String, message: String },

    #[error("{operation} on {name} timed out after {after:?}")]
    Timeout {
        name: String,
        operation: &'static str,
        after: Duration,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, HubError>;

impl HubError {
    pub(crate) fn transport(name: impl Into<String>, err: impl Display) -> Self {
        HubError::Transport {
            name: name.into(),
            message: err.to_string(),
        }
    }

    pub(crate) fn timeout(name: impl Into<String>, operation: &'static str, after: Duration) -> Self {
        HubError::Timeout {
            name: name.into(),
            operation,
            after,
        }
    }

    pub(crate) fn config(err: impl Display) -> Self {
        HubError::ConfigurationLoadFailure(err.to_string())
    }

    /// Stable label used in structured error payloads
    pub fn kind(&self) -> &'static str {
        match self {
            HubError::AlreadyConnected(_) => "already_connected",
            HubError::NotConnected(_) => "not_connected",
            HubError::ConfigurationLoadFailure(_) => "configuration_load_failure",
            HubError::Transport { .. } => "transport_failure",
            HubError::Timeout { .. } => "timeout",
            HubError::Io(_) => "io",
            HubError::Json(_) => "json",
        }
    }

    /// Structured `{kind, message}` descriptor handed back to the host
    pub fn to_descriptor(&self) -> serde_json::Value {
        serde_json::json!({
            "kind": self.kind(),
            "message": self.to_string(),
        })
    }
}
