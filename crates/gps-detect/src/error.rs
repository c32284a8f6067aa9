//! Error types for GPS detection

use thiserror::Error;

/// Errors that can occur while setting up or running detection
#[derive(Debug, Error)]
pub enum DetectError {
    /// Network endpoint does not follow `host:port:extra`
    #[error("malformed network endpoint {endpoint:?}: {reason}")]
    MalformedEndpoint { endpoint: String, reason: String },

    /// Detector configuration is unusable
    #[error("invalid detector configuration: {0}")]
    InvalidConfig(String),

    /// Failed to open serial port
    #[error("failed to open port {port}: {reason}")]
    OpenFailed { port: String, reason: String },

    /// Port busy or in use
    #[error("port {0} is busy or in use")]
    PortBusy(String),
}

impl DetectError {
    pub(crate) fn malformed(endpoint: &str, reason: impl Into<String>) -> Self {
        Self::MalformedEndpoint {
            endpoint: endpoint.to_string(),
            reason: reason.into(),
        }
    }
}
