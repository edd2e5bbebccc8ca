//! Request parameter parsing and resolution.

pub mod resolver;
pub mod sources;

pub use resolver::{resolve_params, ResolvedParams};
pub use sources::{ParameterSources, SourceMap, SourcedValue, CONVERT_STRINGS_HEADER};
