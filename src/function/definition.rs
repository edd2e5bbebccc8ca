//! Function definitions.
//!
//! A definition pairs a declarative [`FunctionSignature`] (parameter schema,
//! optional return schema, background support) with the callable that
//! implements it. Signatures are plain data and can be shipped as JSON by a
//! definition provider; the callable is always attached in code.

use crate::function::handler::GatewayFunction;
use crate::routing::{BackgroundMode, BACKGROUND_MARKER};
use crate::schema::ParameterSchema;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

/// Declarative half of a function definition.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FunctionSignature {
    /// Path-derived name, e.g. `my_function` or `runtime/array`.
    pub name: String,
    /// Optional description of the function.
    #[serde(default)]
    pub description: String,
    /// Declared parameters, in order.
    #[serde(default)]
    pub params: Vec<ParameterSchema>,
    /// Declared return schema.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub returns: Option<ParameterSchema>,
    /// Whether the function may be invoked in background mode.
    #[serde(default)]
    pub background: bool,
    /// Mode used when a background path names none.
    #[serde(default)]
    pub mode: BackgroundMode,
}

impl FunctionSignature {
    /// Create a signature with no parameters.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Set the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Append a parameter.
    pub fn param(mut self, param: ParameterSchema) -> Self {
        self.params.push(param);
        self
    }

    /// Set the return schema.
    pub fn returns(mut self, returns: ParameterSchema) -> Self {
        self.returns = Some(returns);
        self
    }

    /// Allow background invocation with the given default mode.
    pub fn background(mut self, mode: BackgroundMode) -> Self {
        self.background = true;
        self.mode = mode;
        self
    }

    /// Check that the signature is well formed.
    pub fn validate(&self) -> Result<(), String> {
        if self.name.is_empty() {
            return Err("function name cannot be empty".to_string());
        }
        if self.name.split('/').any(str::is_empty) {
            return Err(format!("function name \"{}\" has an empty path segment", self.name));
        }
        if self.name.contains(BACKGROUND_MARKER) || self.name.contains('?') {
            return Err(format!("function name \"{}\" contains a reserved token", self.name));
        }

        let mut seen = HashSet::new();
        for param in &self.params {
            if !seen.insert(param.name.as_str()) {
                return Err(format!("parameter \"{}\" is declared twice", param.name));
            }
            param.validate()?;
        }
        if let Some(returns) = &self.returns {
            returns.validate()?;
        }
        Ok(())
    }
}

/// A function signature together with its implementation.
///
/// Immutable once registered.
#[derive(Clone)]
pub struct FunctionDefinition {
    signature: FunctionSignature,
    handler: Arc<dyn GatewayFunction>,
}

impl FunctionDefinition {
    /// Create a definition with no parameters.
    pub fn new(name: impl Into<String>, handler: impl GatewayFunction + 'static) -> Self {
        Self::from_signature(FunctionSignature::new(name), handler)
    }

    /// Attach a handler to a signature.
    pub fn from_signature(
        signature: FunctionSignature,
        handler: impl GatewayFunction + 'static,
    ) -> Self {
        Self {
            signature,
            handler: Arc::new(handler),
        }
    }

    /// Set the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.signature = self.signature.with_description(description);
        self
    }

    /// Append a parameter.
    pub fn param(mut self, param: ParameterSchema) -> Self {
        self.signature = self.signature.param(param);
        self
    }

    /// Set the return schema.
    pub fn returns(mut self, returns: ParameterSchema) -> Self {
        self.signature = self.signature.returns(returns);
        self
    }

    /// Allow background invocation with the given default mode.
    pub fn background(mut self, mode: BackgroundMode) -> Self {
        self.signature = self.signature.background(mode);
        self
    }

    pub fn name(&self) -> &str {
        &self.signature.name
    }

    pub fn signature(&self) -> &FunctionSignature {
        &self.signature
    }

    pub fn params(&self) -> &[ParameterSchema] {
        &self.signature.params
    }

    pub fn returns_schema(&self) -> Option<&ParameterSchema> {
        self.signature.returns.as_ref()
    }

    /// Shared handle to the implementation.
    pub fn handler(&self) -> Arc<dyn GatewayFunction> {
        Arc::clone(&self.handler)
    }
}

impl fmt::Debug for FunctionDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionDefinition")
            .field("signature", &self.signature)
            .finish_non_exhaustive()
    }
}
