//! Request parameter sources.
//!
//! Parameters may arrive in the query string and in one body, which is
//! JSON, URL-encoded, or multipart form-data. Each raw value is tagged with
//! how it was transported so coercion can tell a typed JSON `"5"` apart from
//! a textual query `5`.

use crate::error::GatewayError;
use crate::http::Method;
use crate::schema::Source;
use crate::value::Value;
use bytes::Bytes;
use indexmap::IndexMap;
use std::collections::HashMap;
use tracing::debug;

/// Header that asks for top-level JSON strings to be coerced like query values.
pub const CONVERT_STRINGS_HEADER: &str = "x-convert-strings";

/// A raw parameter value and the transport it came through.
#[derive(Debug, Clone, PartialEq)]
pub struct SourcedValue {
    pub value: Value,
    pub source: Source,
}

impl SourcedValue {
    pub fn text(value: impl Into<String>) -> Self {
        Self {
            value: Value::Str(value.into()),
            source: Source::Text,
        }
    }

    pub fn typed(value: impl Into<Value>) -> Self {
        Self {
            value: value.into(),
            source: Source::Typed,
        }
    }
}

/// Raw values keyed by parameter name, in arrival order.
pub type SourceMap = IndexMap<String, SourcedValue>;

/// Everything a request supplied, before resolution.
#[derive(Debug, Clone, Default)]
pub struct ParameterSources {
    pub query: SourceMap,
    pub body: SourceMap,
}

impl ParameterSources {
    /// Parse the query string and, for body-bearing methods, the body.
    pub async fn parse(
        method: &Method,
        query: Option<&str>,
        headers: &HashMap<String, String>,
        body: Option<&Bytes>,
    ) -> Result<Self, GatewayError> {
        let query = parse_query(query);
        let body = match body {
            Some(body) if method.has_body() => parse_body(headers, body).await?,
            _ => SourceMap::new(),
        };
        Ok(Self { query, body })
    }
}

/// Parse a query string. A key repeated in the query keeps its last value.
pub fn parse_query(query: Option<&str>) -> SourceMap {
    query
        .map(|query| parse_urlencoded(query.as_bytes()))
        .unwrap_or_default()
}

fn parse_urlencoded(input: &[u8]) -> SourceMap {
    url::form_urlencoded::parse(input)
        .map(|(key, value)| (key.into_owned(), SourcedValue::text(value)))
        .collect()
}

/// Parse a request body according to its `Content-Type`.
///
/// An empty body contributes nothing, whatever its content type.
pub async fn parse_body(
    headers: &HashMap<String, String>,
    body: &Bytes,
) -> Result<SourceMap, GatewayError> {
    if body.is_empty() {
        return Ok(SourceMap::new());
    }
    let content_type = headers
        .get("content-type")
        .ok_or_else(|| GatewayError::client("No Content-Type specified"))?;
    let essence = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();

    debug!("Parsing {} byte body as {}", body.len(), essence);
    match essence.as_str() {
        "application/json" => parse_json(body, convert_strings(headers)),
        json if json.ends_with("+json") => parse_json(body, convert_strings(headers)),
        "application/x-www-form-urlencoded" => Ok(parse_urlencoded(body)),
        "multipart/form-data" => parse_multipart(content_type, body.clone()).await,
        other => Err(GatewayError::client(format!("Unsupported Content-Type: {}", other))),
    }
}

fn convert_strings(headers: &HashMap<String, String>) -> bool {
    headers
        .get(CONVERT_STRINGS_HEADER)
        .is_some_and(|value| value.trim().eq_ignore_ascii_case("true"))
}

fn parse_json(body: &[u8], convert_strings: bool) -> Result<SourceMap, GatewayError> {
    let json: serde_json::Value = serde_json::from_slice(body)
        .map_err(|err| GatewayError::client(format!("Invalid JSON: {}", err)))?;
    let serde_json::Value::Object(map) = json else {
        return Err(GatewayError::client("Invalid JSON: Must be Object"));
    };

    Ok(map
        .into_iter()
        .map(|(key, value)| {
            let sourced = match value {
                serde_json::Value::String(text) if convert_strings => SourcedValue::text(text),
                other => SourcedValue::typed(other),
            };
            (key, sourced)
        })
        .collect())
}

/// Parse multipart form-data.
///
/// A part without a filename whose content type is absent or `text/*` is
/// text. A part named `*.json`
/// or typed `application/json` is parsed as JSON. Everything else is kept as
/// a byte buffer.
async fn parse_multipart(content_type: &str, body: Bytes) -> Result<SourceMap, GatewayError> {
    let boundary = multer::parse_boundary(content_type)
        .map_err(|err| GatewayError::client(format!("Invalid multipart form-data: {}", err)))?;
    let stream = futures::stream::once(async move { Ok::<Bytes, std::io::Error>(body) });
    let mut multipart = multer::Multipart::new(stream, boundary);

    let mut parts = SourceMap::new();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| GatewayError::client(format!("Invalid multipart form-data: {}", err)))?
    {
        let Some(name) = field.name().map(str::to_string) else {
            debug!("Skipping unnamed multipart part");
            continue;
        };
        let file_name = field.file_name().map(str::to_string);
        let mime = field.content_type().map(|mime| mime.essence_str().to_ascii_lowercase());
        let invalid = || GatewayError::client(format!("Invalid multipart form-data with key: {}", name));
        let data = field.bytes().await.map_err(|_| invalid())?;

        let is_json = file_name
            .as_deref()
            .is_some_and(|file_name| file_name.to_ascii_lowercase().ends_with(".json"))
            || mime.as_deref() == Some("application/json");

        let value = if is_json {
            let json: serde_json::Value = serde_json::from_slice(&data).map_err(|_| invalid())?;
            SourcedValue::typed(json)
        } else if file_name.is_none()
            && mime.as_deref().map_or(true, |mime| mime.starts_with("text/"))
        {
            SourcedValue::text(String::from_utf8_lossy(&data))
        } else {
            SourcedValue::typed(Value::Buffer(data))
        };
        parts.insert(name, value);
    }
    Ok(parts)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    const BOUNDARY: &str = "X-GATEWAY-BOUNDARY";

    fn multipart_body(parts: &[(&str, Option<&str>, Option<&str>, &[u8])]) -> Bytes {
        let mut body = Vec::new();
        for (name, file_name, content_type, data) in parts {
            body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
            let mut disposition = format!("Content-Disposition: form-data; name=\"{}\"", name);
            if let Some(file_name) = file_name {
                disposition.push_str(&format!("; filename=\"{}\"", file_name));
            }
            body.extend_from_slice(disposition.as_bytes());
            body.extend_from_slice(b"\r\n");
            if let Some(content_type) = content_type {
                body.extend_from_slice(format!("Content-Type: {}\r\n", content_type).as_bytes());
            }
            body.extend_from_slice(b"\r\n");
            body.extend_from_slice(data);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
        Bytes::from(body)
    }

    fn multipart_headers() -> HashMap<String, String> {
        headers(&[(
            "content-type",
            &format!("multipart/form-data; boundary={}", BOUNDARY),
        )])
    }

    #[test]
    fn test_query_last_value_wins() {
        let query = parse_query(Some("a=1&b=two%20words&a=3"));
        assert_eq!(query["a"], SourcedValue::text("3"));
        assert_eq!(query["b"], SourcedValue::text("two words"));
        assert!(parse_query(None).is_empty());
    }

    #[tokio::test]
    async fn test_get_ignores_body() {
        let sources = ParameterSources::parse(
            &Method::Get,
            Some("a=1"),
            &HashMap::new(),
            Some(&Bytes::from_static(b"garbage")),
        )
        .await
        .unwrap();
        assert_eq!(sources.query.len(), 1);
        assert!(sources.body.is_empty());
    }

    #[tokio::test]
    async fn test_body_without_content_type_is_rejected() {
        let err = parse_body(&HashMap::new(), &Bytes::from_static(b"a=1"))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Bad Request: No Content-Type specified");

        let empty = parse_body(&HashMap::new(), &Bytes::new()).await.unwrap();
        assert!(empty.is_empty());
    }

    #[tokio::test]
    async fn test_json_body_values_are_typed() {
        let body = parse_body(
            &headers(&[("content-type", "application/json; charset=utf-8")]),
            &Bytes::from_static(br#"{"a": 1, "b": "2"}"#),
        )
        .await
        .unwrap();
        assert_eq!(body["a"], SourcedValue::typed(Value::Int(1)));
        assert_eq!(body["b"], SourcedValue::typed("2"));
    }

    #[tokio::test]
    async fn test_json_body_must_be_object() {
        let err = parse_body(
            &headers(&[("content-type", "application/json")]),
            &Bytes::from_static(b"[1, 2]"),
        )
        .await
        .unwrap_err();
        assert_eq!(err.to_string(), "Bad Request: Invalid JSON: Must be Object");
    }

    #[tokio::test]
    async fn test_convert_strings_header() {
        let body = parse_body(
            &headers(&[
                ("content-type", "application/json"),
                (CONVERT_STRINGS_HEADER, "true"),
            ]),
            &Bytes::from_static(br#"{"a": "1", "b": 2}"#),
        )
        .await
        .unwrap();
        assert_eq!(body["a"], SourcedValue::text("1"));
        assert_eq!(body["b"], SourcedValue::typed(Value::Int(2)));
    }

    #[tokio::test]
    async fn test_urlencoded_body_is_text() {
        let body = parse_body(
            &headers(&[("content-type", "application/x-www-form-urlencoded")]),
            &Bytes::from_static(b"a=10&b=20"),
        )
        .await
        .unwrap();
        assert_eq!(body["a"], SourcedValue::text("10"));
        assert_eq!(body["b"], SourcedValue::text("20"));
    }

    #[tokio::test]
    async fn test_unsupported_content_type() {
        let err = parse_body(
            &headers(&[("content-type", "application/xml")]),
            &Bytes::from_static(b"<a/>"),
        )
        .await
        .unwrap_err();
        assert_eq!(err.status().0, 400);
    }

    #[tokio::test]
    async fn test_multipart_parts() {
        let body = multipart_body(&[
            ("my_field", None, None, b"my value"),
            ("my_string_buffer", None, Some("application/octet-stream"), b"123"),
            ("my_file", Some("data.bin"), None, &[0, 159, 146, 150]),
            ("my_json", Some("my.json"), None, br#"{"someJsonNums": 123}"#),
        ]);
        let parts = parse_body(&multipart_headers(), &body).await.unwrap();

        assert_eq!(parts["my_field"], SourcedValue::text("my value"));
        assert_eq!(
            parts["my_string_buffer"].value,
            Value::Buffer(Bytes::from_static(b"123"))
        );
        assert_eq!(
            parts["my_file"].value,
            Value::Buffer(Bytes::from_static(&[0, 159, 146, 150]))
        );
        assert_eq!(
            parts["my_json"],
            SourcedValue::typed(serde_json::json!({"someJsonNums": 123}))
        );
    }

    #[tokio::test]
    async fn test_multipart_text_parts_are_strings() {
        let body = multipart_body(&[
            ("note", None, Some("text/plain; charset=utf-8"), b"hello"),
            ("page", None, Some("text/html"), b"<b>hi</b>"),
            ("upload", Some("note.txt"), Some("text/plain"), b"hello"),
        ]);
        let parts = parse_body(&multipart_headers(), &body).await.unwrap();

        assert_eq!(parts["note"], SourcedValue::text("hello"));
        assert_eq!(parts["page"], SourcedValue::text("<b>hi</b>"));
        assert_eq!(
            parts["upload"].value,
            Value::Buffer(Bytes::from_static(b"hello"))
        );
    }

    #[tokio::test]
    async fn test_multipart_bad_json_names_the_field() {
        let body = multipart_body(&[
            ("my_field", None, None, b"my value"),
            ("my_json", Some("my.json"), None, b"totally not json"),
        ]);
        let err = parse_body(&multipart_headers(), &body).await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "Bad Request: Invalid multipart form-data with key: my_json"
        );
    }
}
