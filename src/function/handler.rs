//! Gateway function handler trait and context.

use crate::http::Method;
use crate::routing::BackgroundMode;
use crate::value::{Object, Value};
use async_trait::async_trait;
use bytes::Bytes;
use indexmap::IndexMap;
use std::collections::HashMap;
use std::future::Future;
use thiserror::Error;

/// Resolved parameters handed to a function, in declaration order.
pub type Params = Object;

/// The raw HTTP request behind an invocation.
#[derive(Debug, Clone, Default)]
pub struct HttpContext {
    pub method: Method,
    pub path: String,
    /// Lowercased header names.
    pub headers: HashMap<String, String>,
    /// Body bytes exactly as received.
    pub body: Bytes,
}

impl HttpContext {
    /// The body as lossy UTF-8 text.
    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Execution context for gateway functions.
#[derive(Debug, Clone, Default)]
pub struct FunctionContext {
    /// Environment variables available to the function.
    pub env: HashMap<String, String>,
    /// Function name.
    pub function_name: String,
    /// Request ID for tracing.
    pub request_id: String,
    /// The request that triggered this invocation.
    pub http: HttpContext,
    /// Set when the invocation runs detached from its response.
    pub background: Option<BackgroundMode>,
}

impl FunctionContext {
    /// Create a new function context.
    pub fn new(function_name: impl Into<String>, request_id: impl Into<String>) -> Self {
        Self {
            function_name: function_name.into(),
            request_id: request_id.into(),
            ..Self::default()
        }
    }

    /// Add an environment variable.
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Attach the originating HTTP request.
    pub fn with_http(mut self, http: HttpContext) -> Self {
        self.http = http;
        self
    }

    /// Get an environment variable.
    pub fn get_env(&self, key: &str) -> Option<&String> {
        self.env.get(key)
    }
}

/// What a function produced.
///
/// `status` and `headers` apply when `value` is rendered as an ordinary
/// result; a raw HTTP response object carries its own.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FunctionOutput {
    pub value: Value,
    pub status: Option<u16>,
    pub headers: IndexMap<String, String>,
}

impl FunctionOutput {
    /// Wrap a return value.
    pub fn new(value: impl Into<Value>) -> Self {
        Self {
            value: value.into(),
            ..Self::default()
        }
    }

    /// Override the response status.
    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    /// Add a response header.
    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }
}

impl From<Value> for FunctionOutput {
    fn from(value: Value) -> Self {
        Self::new(value)
    }
}

/// Function failure.
#[derive(Debug, Clone, Error)]
pub enum FunctionError {
    /// An ordinary error raised by the function.
    #[error("{message}")]
    Runtime {
        message: String,
        details: Option<Value>,
    },
    /// The function cannot continue at all.
    #[error("{message}")]
    Fatal { message: String },
    /// A bare value raised in error position instead of an error.
    #[error("non-error value raised: {0:?}")]
    Thrown(Value),
}

impl FunctionError {
    /// Create a runtime error.
    pub fn new(message: impl Into<String>) -> Self {
        FunctionError::Runtime {
            message: message.into(),
            details: None,
        }
    }

    /// Create a runtime error with structured details.
    pub fn with_details(message: impl Into<String>, details: impl Into<Value>) -> Self {
        FunctionError::Runtime {
            message: message.into(),
            details: Some(details.into()),
        }
    }

    /// Create a fatal error.
    pub fn fatal(message: impl Into<String>) -> Self {
        FunctionError::Fatal {
            message: message.into(),
        }
    }
}

impl From<std::io::Error> for FunctionError {
    fn from(err: std::io::Error) -> Self {
        FunctionError::new(err.to_string())
    }
}

impl From<serde_json::Error> for FunctionError {
    fn from(err: serde_json::Error) -> Self {
        FunctionError::new(err.to_string())
    }
}

/// A callable exposed through the gateway.
///
/// Implementations receive parameters that already satisfy the function's
/// declared schema.
#[async_trait]
pub trait GatewayFunction: Send + Sync {
    /// Run the function.
    async fn call(
        &self,
        params: Params,
        ctx: &FunctionContext,
    ) -> Result<FunctionOutput, FunctionError>;
}

/// A [`GatewayFunction`] backed by a closure.
pub struct FnFunction<F> {
    f: F,
}

/// Wrap an async closure as a [`GatewayFunction`].
///
/// The closure receives its own copy of the context.
pub fn from_fn<F, Fut>(f: F) -> FnFunction<F>
where
    F: Fn(Params, FunctionContext) -> Fut + Send + Sync,
    Fut: Future<Output = Result<FunctionOutput, FunctionError>> + Send,
{
    FnFunction { f }
}

#[async_trait]
impl<F, Fut> GatewayFunction for FnFunction<F>
where
    F: Fn(Params, FunctionContext) -> Fut + Send + Sync,
    Fut: Future<Output = Result<FunctionOutput, FunctionError>> + Send,
{
    async fn call(
        &self,
        params: Params,
        ctx: &FunctionContext,
    ) -> Result<FunctionOutput, FunctionError> {
        (self.f)(params, ctx.clone()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_from_fn_receives_params_and_context() {
        let function = from_fn(|params: Params, ctx: FunctionContext| async move {
            let name = params.get("name").and_then(Value::as_str).unwrap_or("?").to_string();
            Ok(FunctionOutput::new(format!("{}:{}", ctx.function_name, name)))
        });

        let mut params = Params::new();
        params.insert("name".to_string(), Value::from("steve"));
        let ctx = FunctionContext::new("greet", "req-1");

        let output = function.call(params, &ctx).await.unwrap();
        assert_eq!(output.value, Value::from("greet:steve"));
    }

    #[test]
    fn test_context_env() {
        let ctx = FunctionContext::new("test-fn", "req-456")
            .with_env("API_KEY", "secret123")
            .with_env("ENV", "test");

        assert_eq!(ctx.function_name, "test-fn");
        assert_eq!(ctx.request_id, "req-456");
        assert_eq!(ctx.get_env("API_KEY"), Some(&"secret123".to_string()));
        assert_eq!(ctx.get_env("NONEXISTENT"), None);
    }

    #[test]
    fn test_output_builders() {
        let output = FunctionOutput::new("not found")
            .with_status(404)
            .with_header("X-Reason", "missing");
        assert_eq!(output.status, Some(404));
        assert_eq!(output.headers.get("X-Reason"), Some(&"missing".to_string()));
    }
}
