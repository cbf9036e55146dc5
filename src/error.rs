//! Forwarding errors
//! Every variant is surfaced to the caller as a gateway error, never a crash

use hyper::StatusCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ForwardError {
    #[error("invalid backend target {target}: {reason}")]
    InvalidTarget { target: String, reason: String },

    #[error("failed to connect to backend {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("handshake with backend {addr} failed: {source}")]
    Handshake {
        addr: String,
        #[source]
        source: hyper::Error,
    },

    #[error("backend {addr} request failed: {source}")]
    Upstream {
        addr: String,
        #[source]
        source: hyper::Error,
    },

    #[error("failed to build proxied request: {0}")]
    Build(#[from] hyper::http::Error),
}

impl ForwardError {
    /// Status returned to the original caller
    pub fn status(&self) -> StatusCode {
        StatusCode::BAD_GATEWAY
    }
}
