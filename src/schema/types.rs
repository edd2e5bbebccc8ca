//! Parameter types and the per-type coercion rules.

use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Declared type of a parameter or return value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ParameterType {
    #[serde(rename = "string")]
    String,
    #[serde(rename = "number")]
    Number,
    #[serde(rename = "integer")]
    Integer,
    #[serde(rename = "boolean")]
    Boolean,
    #[serde(rename = "object")]
    Object,
    /// An object following the raw HTTP response convention.
    #[serde(rename = "object.http")]
    ObjectHttp,
    #[serde(rename = "array")]
    Array,
    #[serde(rename = "buffer")]
    Buffer,
    #[serde(rename = "any")]
    Any,
}

impl ParameterType {
    pub const ALL: [ParameterType; 9] = [
        ParameterType::String,
        ParameterType::Number,
        ParameterType::Integer,
        ParameterType::Boolean,
        ParameterType::Object,
        ParameterType::ObjectHttp,
        ParameterType::Array,
        ParameterType::Buffer,
        ParameterType::Any,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ParameterType::String => "string",
            ParameterType::Number => "number",
            ParameterType::Integer => "integer",
            ParameterType::Boolean => "boolean",
            ParameterType::Object => "object",
            ParameterType::ObjectHttp => "object.http",
            ParameterType::Array => "array",
            ParameterType::Buffer => "buffer",
            ParameterType::Any => "any",
        }
    }

    /// Whether a nested `schema` may be attached to this type.
    pub fn is_structured(&self) -> bool {
        matches!(self, ParameterType::Object | ParameterType::Array)
    }
}

impl fmt::Display for ParameterType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ParameterType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ParameterType::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| format!("unknown parameter type: {}", s))
    }
}

/// Where a raw value came from.
///
/// Values from textual sources (query string, URL-encoded bodies, multipart
/// text fields) are strings that may be converted to the declared type.
/// Values from typed sources (JSON) must already have the declared type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    Typed,
    Text,
}

/// A value that does not satisfy its declared type.
#[derive(Debug, Clone, PartialEq)]
pub struct TypeMismatch {
    pub expected: ParameterType,
    /// The offending value, after any conversion that succeeded.
    pub actual: Value,
}

impl TypeMismatch {
    pub fn new(expected: ParameterType, actual: Value) -> Self {
        Self { expected, actual }
    }
}

impl fmt::Display for TypeMismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "expected {}, received {}",
            self.expected,
            self.actual.kind()
        )
    }
}

/// Validate `value` against `target`, converting it first when it came from
/// a textual source.
///
/// Null is never coerced; optionality and defaults are decided by the caller.
/// Structure inside objects and arrays is checked separately by the schema
/// resolver.
pub fn coerce(value: Value, target: ParameterType, source: Source) -> Result<Value, TypeMismatch> {
    match (source, value) {
        (Source::Text, Value::Str(text)) => coerce_text(text, target),
        (_, value) => check_typed(value, target),
    }
}

fn coerce_text(text: String, target: ParameterType) -> Result<Value, TypeMismatch> {
    match target {
        ParameterType::String | ParameterType::Any => Ok(Value::Str(text)),
        ParameterType::Number | ParameterType::Integer => match parse_number(&text) {
            Some(n) => check_typed(Value::number(n), target),
            None => Err(TypeMismatch::new(target, Value::Str(text))),
        },
        ParameterType::Boolean => match parse_bool(&text) {
            Some(b) => Ok(Value::Bool(b)),
            None => Err(TypeMismatch::new(target, Value::Str(text))),
        },
        ParameterType::Object
        | ParameterType::ObjectHttp
        | ParameterType::Array
        | ParameterType::Buffer => match serde_json::from_str::<serde_json::Value>(&text) {
            Ok(parsed) => check_typed(Value::from(parsed), target)
                .map_err(|_| TypeMismatch::new(target, Value::Str(text))),
            Err(_) => Err(TypeMismatch::new(target, Value::Str(text))),
        },
    }
}

fn check_typed(value: Value, target: ParameterType) -> Result<Value, TypeMismatch> {
    match (target, value) {
        (ParameterType::Any, value) => Ok(value),
        (_, Value::Null) => Err(TypeMismatch::new(target, Value::Null)),
        (ParameterType::String, value @ Value::Str(_)) => Ok(value),
        (ParameterType::Number, value @ (Value::Int(_) | Value::Num(_))) => Ok(value),
        (ParameterType::Integer, value @ Value::Int(_)) => Ok(value),
        (ParameterType::Integer, Value::Num(n)) => match Value::number(n) {
            int @ Value::Int(_) => Ok(int),
            other => Err(TypeMismatch::new(target, other)),
        },
        (ParameterType::Boolean, value @ Value::Bool(_)) => Ok(value),
        (ParameterType::Object | ParameterType::ObjectHttp, value @ Value::Object(_)) => Ok(value),
        (ParameterType::Array, value @ Value::Array(_)) => Ok(value),
        (ParameterType::Buffer, value @ Value::Buffer(_)) => Ok(value),
        (ParameterType::Buffer, value @ Value::Object(_)) => match value.decode_base64() {
            Some(Ok(bytes)) => Ok(Value::Buffer(bytes)),
            _ => Err(TypeMismatch::new(target, value)),
        },
        (_, value) => Err(TypeMismatch::new(target, value)),
    }
}

/// Parse a textual number. Infinite and NaN results are rejected.
fn parse_number(text: &str) -> Option<f64> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }
    trimmed.parse::<f64>().ok().filter(|n| n.is_finite())
}

fn parse_bool(text: &str) -> Option<bool> {
    match text.trim().to_ascii_lowercase().as_str() {
        "true" | "t" => Some(true),
        "false" | "f" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use serde_json::json;

    #[test]
    fn test_text_number_is_converted() {
        let value = coerce(Value::from("10"), ParameterType::Number, Source::Text).unwrap();
        assert_eq!(value, Value::Int(10));
    }

    #[test]
    fn test_text_number_failure_reports_original_string() {
        let err = coerce(Value::from("hello world"), ParameterType::Number, Source::Text)
            .unwrap_err();
        assert_eq!(err.expected, ParameterType::Number);
        assert_eq!(err.actual, Value::from("hello world"));
    }

    #[test]
    fn test_typed_string_is_not_converted_to_number() {
        let err = coerce(Value::from("30"), ParameterType::Number, Source::Typed).unwrap_err();
        assert_eq!(err.actual, Value::from("30"));
    }

    #[test]
    fn test_integer_rejects_fraction_from_either_source() {
        let text = coerce(Value::from("47.2"), ParameterType::Integer, Source::Text).unwrap_err();
        assert_eq!(text.actual, Value::Num(47.2));

        let typed = coerce(Value::Num(47.2), ParameterType::Integer, Source::Typed).unwrap_err();
        assert_eq!(typed.expected, ParameterType::Integer);
        assert_eq!(typed.actual, Value::Num(47.2));
    }

    #[test]
    fn test_integer_accepts_integral_values() {
        assert_eq!(
            coerce(Value::from("47"), ParameterType::Integer, Source::Text).unwrap(),
            Value::Int(47)
        );
        assert_eq!(
            coerce(Value::Num(47.0), ParameterType::Integer, Source::Typed).unwrap(),
            Value::Int(47)
        );
    }

    #[test]
    fn test_non_finite_text_is_not_a_number() {
        for text in ["inf", "NaN", "infinity", ""] {
            assert!(coerce(Value::from(text), ParameterType::Number, Source::Text).is_err());
        }
    }

    #[test]
    fn test_text_boolean() {
        assert_eq!(
            coerce(Value::from("t"), ParameterType::Boolean, Source::Text).unwrap(),
            Value::Bool(true)
        );
        assert_eq!(
            coerce(Value::from("FALSE"), ParameterType::Boolean, Source::Text).unwrap(),
            Value::Bool(false)
        );
        assert!(coerce(Value::from("yes"), ParameterType::Boolean, Source::Text).is_err());
    }

    #[test]
    fn test_text_object_is_parsed_as_json() {
        let value = coerce(Value::from(r#"{"a":1}"#), ParameterType::Object, Source::Text).unwrap();
        assert_eq!(value, Value::from(json!({"a": 1})));

        let err = coerce(Value::from("[1]"), ParameterType::Object, Source::Text).unwrap_err();
        assert_eq!(err.actual, Value::from("[1]"));
    }

    #[test]
    fn test_typed_object_rejects_string() {
        let err = coerce(Value::from("xxx"), ParameterType::Object, Source::Typed).unwrap_err();
        assert_eq!(err.actual.kind().as_str(), "string");
    }

    #[test]
    fn test_buffer_from_base64_object() {
        let value = Value::from(json!({"_base64": "YWJj"}));
        assert_eq!(
            coerce(value, ParameterType::Buffer, Source::Typed).unwrap(),
            Value::Buffer(Bytes::from_static(b"abc"))
        );
    }

    #[test]
    fn test_buffer_from_base64_text() {
        let value = Value::from(r#"{"_base64": "YWJj"}"#);
        assert_eq!(
            coerce(value, ParameterType::Buffer, Source::Text).unwrap(),
            Value::Buffer(Bytes::from_static(b"abc"))
        );
    }

    #[test]
    fn test_null_is_never_coerced() {
        assert!(coerce(Value::Null, ParameterType::String, Source::Typed).is_err());
        assert_eq!(
            coerce(Value::Null, ParameterType::Any, Source::Typed).unwrap(),
            Value::Null
        );
    }

    #[test]
    fn test_type_names_round_trip() {
        for kind in ParameterType::ALL {
            assert_eq!(kind.as_str().parse::<ParameterType>().unwrap(), kind);
        }
        assert!("date".parse::<ParameterType>().is_err());
    }
}
