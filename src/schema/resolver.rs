//! Recursive validation of values against schema trees.

use crate::schema::param::ParameterSchema;
use crate::schema::types::{coerce, Source, TypeMismatch};
use crate::value::{Object, Value};

/// Resolve `value` against `schema`.
///
/// The value is first coerced to the declared type, then, for objects and
/// arrays with a nested schema, every declared field or element is resolved
/// recursively. Any nested failure is reported once for the whole node with
/// the node's full value as `actual`, never as a separate error per leaf.
///
/// Nested values always come from parsed JSON, so only the top-level value
/// is subject to textual conversion.
pub fn resolve(value: Value, schema: &ParameterSchema, source: Source) -> Result<Value, TypeMismatch> {
    let value = coerce(value, schema.kind, source)?;
    match &schema.schema {
        Some(children) if schema.kind.is_structured() => match value {
            Value::Object(map) => resolve_object(map, children)
                .map(Value::Object)
                .map_err(|map| TypeMismatch::new(schema.kind, Value::Object(map))),
            Value::Array(items) => resolve_array(items, children)
                .map(Value::Array)
                .map_err(|items| TypeMismatch::new(schema.kind, Value::Array(items))),
            other => Ok(other),
        },
        _ => Ok(value),
    }
}

/// Resolve the declared fields of an object.
///
/// Undeclared fields pass through untouched. An absent optional field stays
/// absent and an explicit null on an optional field stays null. On failure
/// the original map is handed back so the caller can report it whole.
fn resolve_object(mut map: Object, fields: &[ParameterSchema]) -> Result<Object, Object> {
    let mut resolved = Vec::with_capacity(fields.len());
    for field in fields {
        let present = map.get(&field.name).filter(|value| !value.is_null()).cloned();
        match present {
            None if field.is_optional() => continue,
            None => return Err(map),
            Some(value) => match resolve(value, field, Source::Typed) {
                Ok(value) => resolved.push((field.name.as_str(), value)),
                Err(_) => return Err(map),
            },
        }
    }
    for (name, value) in resolved {
        if let Some(slot) = map.get_mut(name) {
            *slot = value;
        }
    }
    Ok(map)
}

/// Resolve array elements.
///
/// A single definition applies to every element. Several definitions
/// describe one composite row that every element must satisfy as an object.
fn resolve_array(
    mut items: Vec<Value>,
    elements: &[ParameterSchema],
) -> Result<Vec<Value>, Vec<Value>> {
    match elements {
        [] => Ok(items),
        [element] => {
            let mut resolved = Vec::with_capacity(items.len());
            for index in 0..items.len() {
                if items[index].is_null() && element.is_optional() {
                    resolved.push(Value::Null);
                    continue;
                }
                match resolve(items[index].clone(), element, Source::Typed) {
                    Ok(value) => resolved.push(value),
                    Err(_) => return Err(items),
                }
            }
            Ok(resolved)
        }
        row => {
            for index in 0..items.len() {
                if !matches!(items[index], Value::Object(_)) {
                    return Err(items);
                }
                let Value::Object(map) = std::mem::take(&mut items[index]) else {
                    return Err(items);
                };
                match resolve_object(map, row) {
                    Ok(map) => items[index] = Value::Object(map),
                    Err(map) => {
                        items[index] = Value::Object(map);
                        return Err(items);
                    }
                }
            }
            Ok(items)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::types::ParameterType;
    use serde_json::json;

    fn users_schema() -> ParameterSchema {
        ParameterSchema::array_of(
            "users",
            ParameterSchema::object(
                "user",
                vec![ParameterSchema::string("username"), ParameterSchema::number("age")],
            ),
        )
    }

    #[test]
    fn test_valid_object_passes_through_unchanged() {
        let schema = ParameterSchema::object(
            "obj",
            vec![
                ParameterSchema::string("name"),
                ParameterSchema::object(
                    "options",
                    vec![
                        ParameterSchema::boolean("istest"),
                        ParameterSchema::integer("threads").optional(),
                    ],
                )
                .optional(),
            ],
        );
        let input = Value::from(json!({"name": "steve", "options": {"istest": true, "threads": 4}}));
        assert_eq!(resolve(input.clone(), &schema, Source::Typed).unwrap(), input);
    }

    #[test]
    fn test_nested_failure_reports_whole_object() {
        let schema = ParameterSchema::object(
            "obj",
            vec![
                ParameterSchema::string("name"),
                ParameterSchema::object(
                    "data",
                    vec![ParameterSchema::string("a"), ParameterSchema::string("b")],
                ),
            ],
        );
        let input = Value::from(json!({"name": "hello", "data": "xxx"}));
        let err = resolve(input.clone(), &schema, Source::Typed).unwrap_err();
        assert_eq!(err.expected, ParameterType::Object);
        assert_eq!(err.actual, input);
    }

    #[test]
    fn test_wrong_shape_is_one_node_error() {
        let err = resolve(Value::from("xxx"), &users_schema(), Source::Typed).unwrap_err();
        assert_eq!(err.expected, ParameterType::Array);
        assert_eq!(err.actual, Value::from("xxx"));
    }

    #[test]
    fn test_array_element_failure_reports_whole_array() {
        let input = Value::from(json!(["alpha", "beta"]));
        let err = resolve(input.clone(), &users_schema(), Source::Typed).unwrap_err();
        assert_eq!(err.actual, input);
    }

    #[test]
    fn test_nested_arrays() {
        let schema = ParameterSchema::array_of(
            "users",
            ParameterSchema::object(
                "user",
                vec![
                    ParameterSchema::string("username"),
                    ParameterSchema::array_of(
                        "posts",
                        ParameterSchema::object(
                            "post",
                            vec![ParameterSchema::string("title"), ParameterSchema::string("body")],
                        ),
                    ),
                ],
            ),
        );

        let good = Value::from(json!([
            {"username": "steve", "posts": [{"title": "t", "body": "b"}]},
            {"username": "steve2", "posts": [{"title": "t", "body": "b"}]}
        ]));
        assert_eq!(resolve(good.clone(), &schema, Source::Typed).unwrap(), good);

        let bad = Value::from(json!([
            {"username": "steve", "posts": [{"title": "t", "body": "b"}]},
            {"posts": [{"title": "t", "body": "b"}]}
        ]));
        let err = resolve(bad.clone(), &schema, Source::Typed).unwrap_err();
        assert_eq!(err.actual, bad);
    }

    #[test]
    fn test_row_schema_applies_to_every_element() {
        let schema = ParameterSchema::new("rows", ParameterType::Array).schema(vec![
            ParameterSchema::string("id"),
            ParameterSchema::number("amount"),
        ]);

        let good = Value::from(json!([{"id": "a", "amount": 1}, {"id": "b", "amount": 2.5}]));
        assert_eq!(resolve(good.clone(), &schema, Source::Typed).unwrap(), good);

        let bad = Value::from(json!([{"id": "a", "amount": 1}, {"id": "b"}]));
        assert_eq!(resolve(bad.clone(), &schema, Source::Typed).unwrap_err().actual, bad);

        let scalar = Value::from(json!([{"id": "a", "amount": 1}, 7]));
        assert_eq!(resolve(scalar.clone(), &schema, Source::Typed).unwrap_err().actual, scalar);
    }

    #[test]
    fn test_optional_fields_absent_or_null() {
        let schema = ParameterSchema::object(
            "obj",
            vec![ParameterSchema::string("name"), ParameterSchema::boolean("enabled").optional()],
        );

        let absent = Value::from(json!({"name": "steve"}));
        assert_eq!(resolve(absent.clone(), &schema, Source::Typed).unwrap(), absent);

        let null = Value::from(json!({"name": "steve", "enabled": null}));
        assert_eq!(resolve(null.clone(), &schema, Source::Typed).unwrap(), null);
    }

    #[test]
    fn test_present_optional_object_must_be_valid() {
        let schema = ParameterSchema::object(
            "obj",
            vec![ParameterSchema::object("options", vec![ParameterSchema::boolean("istest")])
                .optional()],
        );
        let input = Value::from(json!({"options": {}}));
        assert!(resolve(input, &schema, Source::Typed).is_err());
    }

    #[test]
    fn test_unknown_fields_pass_through() {
        let schema = ParameterSchema::object("obj", vec![ParameterSchema::string("name")]);
        let input = Value::from(json!({"name": "steve", "extra": [1, 2]}));
        assert_eq!(resolve(input.clone(), &schema, Source::Typed).unwrap(), input);
    }

    #[test]
    fn test_text_source_object_is_parsed_then_checked() {
        let schema = ParameterSchema::object("obj", vec![ParameterSchema::number("n")]);
        let resolved = resolve(Value::from(r#"{"n": 3}"#), &schema, Source::Text).unwrap();
        assert_eq!(resolved, Value::from(json!({"n": 3})));

        let err = resolve(Value::from(r#"{"n": "3"}"#), &schema, Source::Text).unwrap_err();
        assert_eq!(err.actual, Value::from(json!({"n": "3"})));
    }
}
