//! Result sanitization.
//!
//! Turns what a function returned into the status, headers and body of a
//! response, enforcing the function's declared return schema and the raw
//! HTTP response convention ([`HttpObject`]).

use crate::error::{ErrorDetail, GatewayError};
use crate::function::FunctionOutput;
use crate::http::{GatewayResponse, StatusCode};
use crate::schema::{resolve, ParameterSchema, ParameterType, Source};
use crate::value::{Object, Value};
use bytes::Bytes;
use hyper::header::{HeaderName, HeaderValue};
use indexmap::IndexMap;

const STATUS_CODE_KEY: &str = "statusCode";
const HEADERS_KEY: &str = "headers";
const BODY_KEY: &str = "body";

/// A function-controlled raw HTTP response.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpObject {
    pub status: u16,
    /// Lowercased header names.
    pub headers: IndexMap<String, String>,
    pub body: Bytes,
}

impl HttpObject {
    /// Whether an undeclared return value looks like a raw HTTP response:
    /// a non-empty object using only the three known keys. A missing `body`
    /// is left for [`HttpObject::from_object`] to reject.
    pub fn is_shaped(map: &Object) -> bool {
        !map.is_empty()
            && map
                .keys()
                .all(|key| matches!(key.as_str(), STATUS_CODE_KEY | HEADERS_KEY | BODY_KEY))
    }

    /// Validate `map` as a raw HTTP response.
    pub fn from_object(map: &Object) -> Result<Self, String> {
        if let Some(key) = map
            .keys()
            .find(|key| !matches!(key.as_str(), STATUS_CODE_KEY | HEADERS_KEY | BODY_KEY))
        {
            return Err(format!("unexpected key \"{}\"", key));
        }

        let status = match map.get(STATUS_CODE_KEY) {
            None | Some(Value::Null) => StatusCode::OK.0,
            Some(value) => value
                .as_i64()
                .and_then(|code| u16::try_from(code).ok())
                .filter(|code| is_valid_status(*code))
                .ok_or_else(|| "statusCode must be an integer between 100 and 599".to_string())?,
        };

        let mut headers = IndexMap::new();
        match map.get(HEADERS_KEY) {
            None | Some(Value::Null) => {}
            Some(Value::Object(declared)) => {
                for (name, value) in declared {
                    let Value::Str(value) = value else {
                        return Err(format!("header \"{}\" must be a string", name));
                    };
                    let (name, value) = checked_header(name, value)?;
                    headers.insert(name, value);
                }
            }
            Some(_) => return Err("headers must be an object of strings".to_string()),
        }

        let (body, content_type) = match map.get(BODY_KEY) {
            None | Some(Value::Null) => return Err("body is required".to_string()),
            Some(Value::Str(text)) => (Bytes::from(text.clone()), "text/plain"),
            Some(Value::Buffer(bytes)) => (bytes.clone(), "application/octet-stream"),
            Some(value) => match value.decode_base64() {
                Some(Ok(bytes)) => (bytes, "application/octet-stream"),
                Some(Err(err)) => return Err(format!("body is not valid base64: {}", err)),
                None => return Err("body must be a string or a buffer".to_string()),
            },
        };
        headers
            .entry("content-type".to_string())
            .or_insert_with(|| content_type.to_string());

        Ok(Self {
            status,
            headers,
            body,
        })
    }

    pub fn into_response(self) -> GatewayResponse {
        let mut response = GatewayResponse::new(self.status).body(self.body);
        response.headers = self.headers;
        response
    }
}

/// Sanitizes return values against an optional declared return schema.
pub struct ResultSanitizer<'a> {
    returns: Option<&'a ParameterSchema>,
}

impl<'a> ResultSanitizer<'a> {
    pub fn new(returns: Option<&'a ParameterSchema>) -> Self {
        Self { returns }
    }

    /// Render a function's output as a response.
    ///
    /// When the value is a raw HTTP response object its own `statusCode` and
    /// `headers` take precedence; the output's status and headers are ignored.
    ///
    /// Contract violations are [`GatewayError::Value`] failures reported
    /// under `details.returns`.
    pub fn sanitize(&self, output: FunctionOutput) -> Result<GatewayResponse, GatewayError> {
        let FunctionOutput {
            value,
            status,
            headers,
        } = output;

        let value = match self.returns {
            Some(schema) if schema.kind == ParameterType::ObjectHttp => {
                return http_object(&value).map(HttpObject::into_response);
            }
            Some(schema) if schema.kind != ParameterType::Any => resolve(value, schema, Source::Typed)
                .map_err(|mismatch| GatewayError::returns(ErrorDetail::mismatch(schema, mismatch)))?,
            _ => match value {
                Value::Object(map) if HttpObject::is_shaped(&map) => {
                    return http_object(&Value::Object(map)).map(HttpObject::into_response);
                }
                value => match value.decode_base64() {
                    Some(Ok(bytes)) => Value::Buffer(bytes),
                    _ => value,
                },
            },
        };

        render(value, status, headers)
    }
}

fn http_object(value: &Value) -> Result<HttpObject, GatewayError> {
    let reason = match value {
        Value::Object(map) => match HttpObject::from_object(map) {
            Ok(http) => return Ok(http),
            Err(reason) => reason,
        },
        other => format!("expected an object, received {}", other.kind()),
    };
    Err(GatewayError::returns(ErrorDetail::invalid(
        format!("Invalid HTTP response object: {}", reason),
        ParameterType::ObjectHttp,
        value.clone(),
    )))
}

/// Render an ordinary value: buffers as raw bytes, everything else as JSON.
fn render(
    value: Value,
    status: Option<u16>,
    headers: IndexMap<String, String>,
) -> Result<GatewayResponse, GatewayError> {
    let status = status.unwrap_or(StatusCode::OK.0);
    if !is_valid_status(status) {
        return Err(GatewayError::returns(ErrorDetail::invalid(
            format!("Invalid status code: {}", status),
            ParameterType::Integer,
            Value::Int(i64::from(status)),
        )));
    }

    let mut response = match value {
        Value::Buffer(bytes) => GatewayResponse::new(status)
            .header("Content-Type", "application/octet-stream")
            .body(bytes),
        value => {
            let bytes = value.to_json_vec().map_err(|err| {
                GatewayError::fatal(format!("Could not serialize return value: {}", err))
            })?;
            GatewayResponse::new(status)
                .header("Content-Type", "application/json")
                .body(bytes)
        }
    };

    for (name, value) in &headers {
        let (name, value) = checked_header(name, value).map_err(|reason| {
            GatewayError::returns(ErrorDetail::invalid(
                format!("Invalid response header: {}", reason),
                ParameterType::Object,
                Value::from(value.as_str()),
            ))
        })?;
        response.set_header(name, value);
    }
    Ok(response)
}

fn is_valid_status(code: u16) -> bool {
    (100..=599).contains(&code)
}

/// Validate a header pair, returning the lowercased name.
fn checked_header(name: &str, value: &str) -> Result<(String, String), String> {
    let name = HeaderName::from_bytes(name.as_bytes())
        .map_err(|_| format!("invalid header name \"{}\"", name))?;
    HeaderValue::from_str(value).map_err(|_| format!("invalid value for header \"{}\"", name))?;
    Ok((name.as_str().to_string(), value.to_string()))
}
