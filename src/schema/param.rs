//! Declared parameter schemas.

use crate::schema::types::ParameterType;
use crate::value::Value;
use serde::{Deserialize, Serialize};

/// Schema for one parameter, return value, or nested field.
///
/// Serializes to the shape clients see under `details.<name>.expected.schema`:
/// `required` is only written for optional fields and `defaultValue` only
/// when one is declared.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParameterSchema {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: ParameterType,
    #[serde(default)]
    pub description: String,
    #[serde(default = "required_by_default", skip_serializing_if = "is_required")]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<Value>,
    /// Nested fields of an object, or the element definition(s) of an array.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<Vec<ParameterSchema>>,
}

fn required_by_default() -> bool {
    true
}

fn is_required(required: &bool) -> bool {
    *required
}

impl ParameterSchema {
    /// Create a required parameter of the given type.
    pub fn new(name: impl Into<String>, kind: ParameterType) -> Self {
        Self {
            name: name.into(),
            kind,
            description: String::new(),
            required: true,
            default_value: None,
            schema: None,
        }
    }

    pub fn string(name: impl Into<String>) -> Self {
        Self::new(name, ParameterType::String)
    }

    pub fn number(name: impl Into<String>) -> Self {
        Self::new(name, ParameterType::Number)
    }

    pub fn integer(name: impl Into<String>) -> Self {
        Self::new(name, ParameterType::Integer)
    }

    pub fn boolean(name: impl Into<String>) -> Self {
        Self::new(name, ParameterType::Boolean)
    }

    pub fn buffer(name: impl Into<String>) -> Self {
        Self::new(name, ParameterType::Buffer)
    }

    pub fn any(name: impl Into<String>) -> Self {
        Self::new(name, ParameterType::Any)
    }

    /// An object with declared fields.
    pub fn object(name: impl Into<String>, fields: Vec<ParameterSchema>) -> Self {
        Self::new(name, ParameterType::Object).schema(fields)
    }

    /// An array whose every element satisfies `element`.
    pub fn array_of(name: impl Into<String>, element: ParameterSchema) -> Self {
        Self::new(name, ParameterType::Array).schema(vec![element])
    }

    /// Set the description.
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Mark the parameter optional; it resolves to null when absent.
    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    /// Mark the parameter optional with a default value.
    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.required = false;
        self.default_value = Some(value.into());
        self
    }

    /// Attach nested fields or element definitions.
    pub fn schema(mut self, schema: Vec<ParameterSchema>) -> Self {
        self.schema = Some(schema);
        self
    }

    /// Whether the parameter may be absent. Declaring a default implies it.
    pub fn is_optional(&self) -> bool {
        !self.required || self.default_value.is_some()
    }

    /// Value used when the parameter is absent or null.
    pub fn default_or_null(&self) -> Value {
        self.default_value.clone().unwrap_or(Value::Null)
    }

    /// Check the structural invariants of this schema tree.
    ///
    /// Nested schemas are only allowed on `object` and `array`, and field
    /// names within one level must be unique and non-empty.
    pub fn validate(&self) -> Result<(), String> {
        if let Some(children) = &self.schema {
            if !self.kind.is_structured() {
                return Err(format!(
                    "\"{}\": type {} cannot declare a nested schema",
                    self.name, self.kind
                ));
            }
            if self.kind == ParameterType::Object {
                let mut seen = std::collections::HashSet::new();
                for child in children {
                    if child.name.is_empty() {
                        return Err(format!("\"{}\": nested field without a name", self.name));
                    }
                    if !seen.insert(child.name.as_str()) {
                        return Err(format!(
                            "\"{}\": duplicate nested field \"{}\"",
                            self.name, child.name
                        ));
                    }
                }
            }
            for child in children {
                child.validate()?;
            }
        }
        Ok(())
    }
}
