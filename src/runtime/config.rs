//! Gateway configuration.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// Environment variable overriding [`GatewayConfig::host`].
pub const HOST_VAR: &str = "FEZZ_GATEWAY_HOST";
/// Environment variable overriding [`GatewayConfig::port`].
pub const PORT_VAR: &str = "FEZZ_GATEWAY_PORT";
/// Environment variable overriding [`GatewayConfig::max_body_size`].
pub const MAX_BODY_SIZE_VAR: &str = "FEZZ_GATEWAY_MAX_BODY_SIZE";

/// Invalid configuration value.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{var} must be {expected}, got \"{value}\"")]
    InvalidVar {
        var: &'static str,
        expected: &'static str,
        value: String,
    },
}

/// Configuration for the gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Host address to bind to.
    pub host: String,
    /// Port to listen on.
    pub port: u16,
    /// Environment variables exposed to every function.
    pub env: HashMap<String, String>,
    /// Whether to serve `/_health`.
    pub enable_health: bool,
    /// Maximum request body size in bytes.
    pub max_body_size: usize,
    /// `access-control-allow-origin` sent with every response.
    pub allow_origin: String,
    /// `access-control-allow-headers` sent with every response.
    pub allow_headers: String,
    /// `access-control-expose-headers` sent with every response.
    pub expose_headers: String,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8170,
            env: HashMap::new(),
            enable_health: true,
            max_body_size: 128 * 1024 * 1024, // 128MB
            allow_origin: "*".to_string(),
            allow_headers: "Content-Type, Authorization, Origin, User-Agent, X-Convert-Strings"
                .to_string(),
            expose_headers: "x-faaslang, Content-Type, Content-Length, Cache-Control".to_string(),
        }
    }
}

impl GatewayConfig {
    /// Create a new config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Defaults overlaid with `FEZZ_GATEWAY_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::default().overlay(|var| std::env::var(var).ok())
    }

    /// Overlay values looked up through `lookup`.
    fn overlay(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        if let Some(host) = lookup(HOST_VAR) {
            self.host = host;
        }
        if let Some(port) = lookup(PORT_VAR) {
            self.port = port.trim().parse().map_err(|_| ConfigError::InvalidVar {
                var: PORT_VAR,
                expected: "a port number",
                value: port,
            })?;
        }
        if let Some(size) = lookup(MAX_BODY_SIZE_VAR) {
            self.max_body_size = size.trim().parse().map_err(|_| ConfigError::InvalidVar {
                var: MAX_BODY_SIZE_VAR,
                expected: "a size in bytes",
                value: size,
            })?;
        }
        Ok(self)
    }

    /// Set the host address.
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// Set the port.
    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Add an environment variable.
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Set the maximum request body size.
    pub fn max_body_size(mut self, bytes: usize) -> Self {
        self.max_body_size = bytes;
        self
    }

    /// Set the allowed CORS origin.
    pub fn allow_origin(mut self, origin: impl Into<String>) -> Self {
        self.allow_origin = origin.into();
        self
    }

    /// Get the bind address.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
