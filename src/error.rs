//! Failure classification and the uniform error body.
//!
//! Every failure the gateway can observe ends up as exactly one
//! [`GatewayError`] variant, which fixes both the status code and the
//! `error.type` clients see:
//!
//! | Variant | `error.type` | Status |
//! |---|---|---|
//! | `Client` | `ClientError` | 400 |
//! | `NotFound` | `ClientError` | 404 |
//! | `Parameter` | `ParameterError` | 400 |
//! | `Value` | `ValueError` | 502 |
//! | `Runtime` | `RuntimeError` | 403 |
//! | `Fatal` | `FatalError` | 500 |

use crate::function::FunctionError;
use crate::http::{GatewayResponse, StatusCode};
use crate::schema::{ParameterSchema, ParameterType, TypeMismatch};
use crate::value::{Value, ValueKind};
use indexmap::IndexMap;
use serde::Serialize;
use thiserror::Error;

/// The five error kinds exposed on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ErrorKind {
    ClientError,
    ParameterError,
    ValueError,
    RuntimeError,
    FatalError,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::ClientError => "ClientError",
            ErrorKind::ParameterError => "ParameterError",
            ErrorKind::ValueError => "ValueError",
            ErrorKind::RuntimeError => "RuntimeError",
            ErrorKind::FatalError => "FatalError",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a field was declared as.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Expected {
    #[serde(rename = "type")]
    pub kind: ParameterType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema: Option<Vec<ParameterSchema>>,
}

impl From<&ParameterSchema> for Expected {
    fn from(schema: &ParameterSchema) -> Self {
        Self {
            kind: schema.kind,
            schema: schema.schema.clone(),
        }
    }
}

/// What a field actually held.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Actual {
    #[serde(rename = "type")]
    pub kind: ValueKind,
    pub value: Value,
}

impl From<Value> for Actual {
    fn from(value: Value) -> Self {
        Self {
            kind: value.kind(),
            value,
        }
    }
}

/// Per-field failure attached under `details.<field>`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorDetail {
    pub message: String,
    /// Set when a return value breaks the raw HTTP response convention.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub invalid: bool,
    pub expected: Expected,
    pub actual: Actual,
}

impl ErrorDetail {
    /// Detail for a value that does not match its schema.
    pub fn mismatch(schema: &ParameterSchema, mismatch: TypeMismatch) -> Self {
        let actual = Actual::from(mismatch.actual);
        Self {
            message: format!(
                "invalid value for \"{}\": expected {}, received {}",
                schema.name, schema.kind, actual.kind
            ),
            invalid: false,
            expected: Expected::from(schema),
            actual,
        }
    }

    /// Detail for a required value that was not supplied.
    pub fn required(schema: &ParameterSchema) -> Self {
        Self {
            message: format!("\"{}\" is required", schema.name),
            invalid: false,
            expected: Expected::from(schema),
            actual: Actual::from(Value::Null),
        }
    }

    /// Detail for a structurally invalid return value.
    pub fn invalid(message: impl Into<String>, expected: ParameterType, actual: Value) -> Self {
        Self {
            message: message.into(),
            invalid: true,
            expected: Expected {
                kind: expected,
                schema: None,
            },
            actual: Actual::from(actual),
        }
    }
}

/// Field-keyed error details, in parameter order.
pub type ErrorDetails = IndexMap<String, ErrorDetail>;

/// A classified gateway failure.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Malformed request.
    #[error("Bad Request: {0}")]
    Client(String),
    /// No function matches the request path.
    #[error("Not Found: {0}")]
    NotFound(String),
    /// One or more parameters failed validation.
    #[error("{message}")]
    Parameter {
        message: String,
        details: ErrorDetails,
    },
    /// The function returned a value that breaks its declared contract.
    #[error("{message}")]
    Value {
        message: String,
        details: ErrorDetails,
    },
    /// The function failed while running.
    #[error("{message}")]
    Runtime {
        message: String,
        details: Option<Value>,
    },
    /// The function reported an unrecoverable failure.
    #[error("{message}")]
    Fatal { message: String },
}

impl GatewayError {
    pub fn client(message: impl Into<String>) -> Self {
        GatewayError::Client(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        GatewayError::NotFound(message.into())
    }

    pub fn parameters(details: ErrorDetails) -> Self {
        let names: Vec<&str> = details.keys().map(String::as_str).collect();
        GatewayError::Parameter {
            message: format!("Parameter Error: invalid parameters: {}", names.join(", ")),
            details,
        }
    }

    /// A return value failure, reported under `details.returns`.
    pub fn returns(detail: ErrorDetail) -> Self {
        let mut details = ErrorDetails::new();
        let message = format!("Value Error: {}", detail.message);
        details.insert("returns".to_string(), detail);
        GatewayError::Value { message, details }
    }

    pub fn runtime(message: impl Into<String>) -> Self {
        GatewayError::Runtime {
            message: message.into(),
            details: None,
        }
    }

    pub fn fatal(message: impl Into<String>) -> Self {
        GatewayError::Fatal {
            message: message.into(),
        }
    }

    /// Wire kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            GatewayError::Client(_) | GatewayError::NotFound(_) => ErrorKind::ClientError,
            GatewayError::Parameter { .. } => ErrorKind::ParameterError,
            GatewayError::Value { .. } => ErrorKind::ValueError,
            GatewayError::Runtime { .. } => ErrorKind::RuntimeError,
            GatewayError::Fatal { .. } => ErrorKind::FatalError,
        }
    }

    /// Status code this error is rendered with.
    pub fn status(&self) -> StatusCode {
        match self {
            GatewayError::Client(_) | GatewayError::Parameter { .. } => StatusCode::BAD_REQUEST,
            GatewayError::NotFound(_) => StatusCode::NOT_FOUND,
            GatewayError::Value { .. } => StatusCode::BAD_GATEWAY,
            GatewayError::Runtime { .. } => StatusCode::FORBIDDEN,
            GatewayError::Fatal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Whether the failure originated with the client rather than the function.
    pub fn is_client_fault(&self) -> bool {
        self.status().is_client_error() && !matches!(self, GatewayError::Runtime { .. })
    }

    /// Render `{"error": {"type", "message", "details"?}}` as a JSON response.
    pub fn into_response(self) -> GatewayResponse {
        let status = self.status();
        let body = ErrorBody {
            error: ErrorPayload {
                kind: self.kind(),
                message: self.to_string(),
                details: match &self {
                    GatewayError::Parameter { details, .. } | GatewayError::Value { details, .. } => {
                        Some(Details::Fields(details))
                    }
                    GatewayError::Runtime {
                        details: Some(details),
                        ..
                    } => Some(Details::Value(details)),
                    _ => None,
                },
            },
        };
        // Serializing these types cannot fail: every map key is a string.
        let bytes = serde_json::to_vec(&body).unwrap_or_default();
        GatewayResponse::new(status)
            .header("Content-Type", "application/json")
            .body(bytes)
    }
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: ErrorPayload<'a>,
}

#[derive(Serialize)]
struct ErrorPayload<'a> {
    #[serde(rename = "type")]
    kind: ErrorKind,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<Details<'a>>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum Details<'a> {
    Fields(&'a ErrorDetails),
    Value(&'a Value),
}

impl From<FunctionError> for GatewayError {
    fn from(err: FunctionError) -> Self {
        match err {
            FunctionError::Runtime { message, details } => GatewayError::Runtime { message, details },
            FunctionError::Fatal { message } => GatewayError::Fatal { message },
            FunctionError::Thrown(Value::Str(message)) => GatewayError::runtime(message),
            FunctionError::Thrown(value) => {
                let kind = value.kind();
                let details = Value::Object(crate::value::object([
                    ("type", Value::from(kind.as_str())),
                    ("value", value),
                ]));
                GatewayError::Runtime {
                    message: format!("Function raised a non-error {} value", kind),
                    details: Some(details),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value as Json};

    fn body(response: &GatewayResponse) -> Json {
        response.json_body().unwrap().unwrap()
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(GatewayError::client("x").status(), StatusCode::BAD_REQUEST);
        assert_eq!(GatewayError::not_found("x").status(), StatusCode::NOT_FOUND);
        assert_eq!(
            GatewayError::parameters(ErrorDetails::new()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(GatewayError::runtime("x").status(), StatusCode::FORBIDDEN);
        assert_eq!(GatewayError::fatal("x").status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_client_error_body() {
        let response = GatewayError::client("Invalid JSON: Must be Object").into_response();
        assert_eq!(response.status, StatusCode::BAD_REQUEST);
        assert_eq!(
            response.get_header("content-type"),
            Some(&"application/json".to_string())
        );
        assert_eq!(
            body(&response),
            json!({"error": {"type": "ClientError", "message": "Bad Request: Invalid JSON: Must be Object"}})
        );
    }

    #[test]
    fn test_parameter_error_details() {
        let schema = ParameterSchema::integer("alpha");
        let mut details = ErrorDetails::new();
        details.insert(
            "alpha".to_string(),
            ErrorDetail::mismatch(&schema, TypeMismatch::new(ParameterType::Integer, Value::Num(47.2))),
        );
        let response = GatewayError::parameters(details).into_response();
        let body = body(&response);

        assert_eq!(body["error"]["type"], "ParameterError");
        assert_eq!(body["error"]["details"]["alpha"]["expected"]["type"], "integer");
        assert_eq!(body["error"]["details"]["alpha"]["actual"]["type"], "number");
        assert_eq!(body["error"]["details"]["alpha"]["actual"]["value"], 47.2);
        assert!(body["error"]["details"]["alpha"].get("invalid").is_none());
    }

    #[test]
    fn test_invalid_return_detail() {
        let detail = ErrorDetail::invalid("statusCode out of range", ParameterType::ObjectHttp, Value::Int(600));
        let response = GatewayError::returns(detail).into_response();
        let body = body(&response);

        assert_eq!(response.status, StatusCode::BAD_GATEWAY);
        assert_eq!(body["error"]["type"], "ValueError");
        assert_eq!(body["error"]["details"]["returns"]["invalid"], true);
    }

    #[test]
    fn test_thrown_values_are_runtime_errors() {
        let from_string: GatewayError = FunctionError::Thrown(Value::from("oops")).into();
        assert_eq!(from_string.kind(), ErrorKind::RuntimeError);
        assert_eq!(from_string.to_string(), "oops");

        let from_array: GatewayError = FunctionError::Thrown(Value::Array(vec![])).into();
        let response = from_array.into_response();
        assert_eq!(response.status, StatusCode::FORBIDDEN);
        assert_eq!(body(&response)["error"]["details"]["type"], "array");
    }

    #[test]
    fn test_fatal_function_error() {
        let err: GatewayError = FunctionError::fatal("disk on fire").into();
        assert_eq!(err.kind(), ErrorKind::FatalError);
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
