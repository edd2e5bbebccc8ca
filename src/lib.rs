//! # fezz-gateway - schema-typed function gateway
//!
//! Exposes plain async functions over HTTP under one invocation protocol.
//! Every request is parsed into typed parameters according to the
//! function's declared schema, the function is invoked, its result is
//! checked against the declared return schema, and the response is rendered
//! with a deterministic status code, header set and error body.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────────┐
//! │                 GatewayServer (hyper, one task per conn)           │
//! └────────────────────────────────────────────────────────────────────┘
//!                                  │ GatewayRequest
//!                                  ▼
//! ┌────────────────────────────────────────────────────────────────────┐
//! │                             Dispatcher                             │
//! │  PathResolver → ParameterSources → resolve_params → invoke         │
//! │       │                                              │             │
//! │   redirect / 404                          ResultSanitizer          │
//! │                                                      │             │
//! │            GatewayError ─────────────► uniform error body          │
//! └────────────────────────────────────────────────────────────────────┘
//!                                  │ GatewayResponse
//!                                  ▼
//! ```
//!
//! ## Usage
//!
//! ```rust,no_run
//! use fezz_gateway::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
//!     let mut server = GatewayServer::new(GatewayConfig::from_env()?);
//!
//!     server.register_function(
//!         FunctionDefinition::new(
//!             "add",
//!             from_fn(|params: Params, _ctx: FunctionContext| async move {
//!                 let a = params.get("a").and_then(Value::as_f64).unwrap_or_default();
//!                 let b = params.get("b").and_then(Value::as_f64).unwrap_or_default();
//!                 Ok(FunctionOutput::new(Value::number(a + b)))
//!             }),
//!         )
//!         .param(ParameterSchema::number("a"))
//!         .param(ParameterSchema::number("b"))
//!         .returns(ParameterSchema::number("sum")),
//!     )?;
//!
//!     // GET /add/?a=1&b=2 -> 200 `3`
//!     server.run().await
//! }
//! ```
//!
//! ## Error kinds
//!
//! | `error.type` | Status | Raised when |
//! |---|---|---|
//! | `ClientError` | 400 / 404 | the request is malformed or names no function |
//! | `ParameterError` | 400 | a parameter fails its schema |
//! | `ValueError` | 502 | the function's result fails its return schema |
//! | `RuntimeError` | 403 | the function fails or panics |
//! | `FatalError` | 500 | the function reports an unrecoverable failure |

pub mod dispatch;
pub mod error;
pub mod function;
pub mod http;
pub mod params;
pub mod routing;
pub mod runtime;
pub mod sanitize;
pub mod schema;
pub mod value;

/// Re-export commonly used types.
pub mod prelude {
    pub use crate::dispatch::Dispatcher;
    pub use crate::error::{ErrorKind, GatewayError};
    pub use crate::function::{
        from_fn, FunctionContext, FunctionDefinition, FunctionError, FunctionOutput,
        FunctionRegistry, FunctionSignature, GatewayFunction, Params,
    };
    pub use crate::http::{GatewayRequest, GatewayResponse, Method, StatusCode};
    pub use crate::routing::BackgroundMode;
    pub use crate::runtime::{GatewayConfig, GatewayServer};
    pub use crate::schema::{ParameterSchema, ParameterType};
    pub use crate::value::Value;
    pub use async_trait::async_trait;
    pub use fezz_macro::gateway_function;
}

// Re-export for convenience
pub use dispatch::Dispatcher;
pub use error::GatewayError;
pub use function::{FunctionDefinition, FunctionRegistry, GatewayFunction};
pub use http::{GatewayRequest, GatewayResponse};
pub use runtime::{GatewayConfig, GatewayServer};
pub use value::Value;
