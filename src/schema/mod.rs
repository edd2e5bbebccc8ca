//! Parameter schemas, type coercion, and recursive schema resolution.

pub mod param;
pub mod resolver;
pub mod types;

pub use param::ParameterSchema;
pub use resolver::resolve;
pub use types::{coerce, ParameterType, Source, TypeMismatch};
