//! Function registry.
//!
//! The registry is filled once before serving begins and is read-only
//! afterwards, so it is shared between requests behind a plain `Arc`.

use crate::function::definition::FunctionDefinition;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

/// Registration failure.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Function '{0}' is already registered")]
    Duplicate(String),
    #[error("Function '{name}' is invalid: {reason}")]
    Invalid { name: String, reason: String },
}

/// Table of function definitions keyed by name.
#[derive(Debug, Default, Clone)]
pub struct FunctionRegistry {
    functions: HashMap<String, Arc<FunctionDefinition>>,
}

impl FunctionRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new function.
    pub fn register(&mut self, definition: FunctionDefinition) -> Result<(), RegistryError> {
        let name = definition.name().to_string();
        if self.functions.contains_key(&name) {
            return Err(RegistryError::Duplicate(name));
        }
        definition
            .signature()
            .validate()
            .map_err(|reason| RegistryError::Invalid {
                name: name.clone(),
                reason,
            })?;

        info!("Registered function: {}", name);
        self.functions.insert(name, Arc::new(definition));
        Ok(())
    }

    /// Register a function, builder style.
    pub fn with(mut self, definition: FunctionDefinition) -> Result<Self, RegistryError> {
        self.register(definition)?;
        Ok(self)
    }

    /// Look up a function by exact name.
    pub fn get(&self, name: &str) -> Option<&Arc<FunctionDefinition>> {
        self.functions.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.functions.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::function::handler::{from_fn, FunctionContext, FunctionOutput, Params};
    use crate::value::Value;

    fn noop(name: &str) -> FunctionDefinition {
        FunctionDefinition::new(
            name,
            from_fn(|_params: Params, _ctx: FunctionContext| async {
                Ok(FunctionOutput::new(Value::Null))
            }),
        )
    }

    #[test]
    fn test_register_and_lookup() {
        let mut registry = FunctionRegistry::new();
        registry.register(noop("b")).unwrap();
        registry.register(noop("a/nested")).unwrap();

        assert_eq!(registry.len(), 2);
        assert!(registry.contains("b"));
        assert!(registry.get("a/nested").is_some());
        assert!(registry.get("a").is_none());
        assert_eq!(registry.names(), vec!["a/nested", "b"]);
    }

    #[test]
    fn test_duplicate_rejected() {
        let mut registry = FunctionRegistry::new();
        registry.register(noop("f")).unwrap();
        let err = registry.register(noop("f")).unwrap_err();
        assert!(matches!(err, RegistryError::Duplicate(name) if name == "f"));
    }

    #[test]
    fn test_invalid_rejected() {
        let err = FunctionRegistry::new().with(noop("bad:bg")).unwrap_err();
        assert!(matches!(err, RegistryError::Invalid { .. }));
    }
}
