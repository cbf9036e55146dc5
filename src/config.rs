//! Gateway configuration
//! Resolved once at startup and handed to the proxy server by value

use std::collections::HashMap;
use std::net::SocketAddr;

/// Port the front door listens on
pub const DEFAULT_PORT: u16 = 8080;

/// Namespace used when `NAMESPACE` is not set
pub const DEFAULT_NAMESPACE: &str = "chaosmania";

/// Gateway configuration
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Listening port, bound on all interfaces
    pub port: u16,
    /// Namespace substituted into every backend host template
    pub namespace: String,
    /// Static host -> address overrides consulted before DNS
    pub resolve: HashMap<String, SocketAddr>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            namespace: DEFAULT_NAMESPACE.to_string(),
            resolve: HashMap::new(),
        }
    }
}

impl GatewayConfig {
    /// Create a configuration for the given namespace on the fixed port
    pub fn new(namespace: Option<String>) -> Self {
        Self {
            namespace: resolve_namespace(namespace),
            ..Self::default()
        }
    }

    /// Pin a backend host name to a fixed socket address
    pub fn with_resolve(mut self, host: impl Into<String>, addr: SocketAddr) -> Self {
        self.resolve.insert(host.into(), addr);
        self
    }
}

/// Pick the namespace, falling back to the default only when unset
pub fn resolve_namespace(value: Option<String>) -> String {
    value.unwrap_or_else(|| DEFAULT_NAMESPACE.to_string())
}
