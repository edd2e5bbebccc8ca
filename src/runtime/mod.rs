//! Gateway runtime: configuration and the HTTP listener.

mod config;
mod server;

pub use config::{ConfigError, GatewayConfig, HOST_VAR, MAX_BODY_SIZE_VAR, PORT_VAR};
pub use server::GatewayServer;
