//! Parameter resolution.

use crate::error::{ErrorDetail, ErrorDetails, GatewayError};
use crate::function::Params;
use crate::params::sources::{ParameterSources, SourcedValue};
use crate::schema::{resolve, ParameterSchema, ParameterType, Source};
use std::collections::HashSet;

/// Parameters ready for invocation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolvedParams {
    /// Declared parameters in declaration order, then undeclared ones as sent.
    pub values: Params,
    /// Names of declared parameters the request actually supplied.
    pub supplied: HashSet<String>,
}

/// Merge the request's sources and resolve them against `params`.
///
/// A name sent both in the query string and in the body is ambiguous and
/// fails the whole request. Every declared parameter is then resolved
/// independently and all failures are reported together. Undeclared
/// parameters are passed through unchecked.
pub fn resolve_params(
    params: &[ParameterSchema],
    sources: ParameterSources,
) -> Result<ResolvedParams, GatewayError> {
    let ParameterSources { query, body } = sources;

    let conflicts: Vec<&str> = query
        .keys()
        .filter(|name| body.contains_key(*name))
        .map(String::as_str)
        .collect();
    if !conflicts.is_empty() {
        return Err(GatewayError::client(format!(
            "Parameters supplied in both the query string and the body: {}",
            conflicts.join(", ")
        )));
    }

    let mut merged = query;
    merged.extend(body);

    let mut resolved = ResolvedParams::default();
    let mut details = ErrorDetails::new();
    for param in params {
        let raw = merged
            .shift_remove(&param.name)
            .filter(|raw| !is_absent(raw, param.kind));

        match raw {
            None if param.is_optional() => {
                resolved
                    .values
                    .insert(param.name.clone(), param.default_or_null());
            }
            None => {
                details.insert(param.name.clone(), ErrorDetail::required(param));
            }
            Some(SourcedValue { value, source }) => match resolve(value, param, source) {
                Ok(value) => {
                    resolved.values.insert(param.name.clone(), value);
                    resolved.supplied.insert(param.name.clone());
                }
                Err(mismatch) => {
                    details.insert(param.name.clone(), ErrorDetail::mismatch(param, mismatch));
                }
            },
        }
    }

    if !details.is_empty() {
        return Err(GatewayError::parameters(details));
    }
    for (name, raw) in merged {
        resolved.values.insert(name, raw.value);
    }
    Ok(resolved)
}

/// Null never satisfies a type, and an empty text value only satisfies text.
fn is_absent(raw: &SourcedValue, kind: ParameterType) -> bool {
    match (&raw.value, raw.source) {
        (value, _) if value.is_null() => true,
        (crate::value::Value::Str(text), Source::Text) => {
            text.is_empty() && !matches!(kind, ParameterType::String | ParameterType::Any)
        }
        _ => false,
    }
}
