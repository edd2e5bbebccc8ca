//! Gateway functions: definitions, the handler trait, and the registry.

pub mod definition;
pub mod handler;
pub mod registry;

pub use definition::{FunctionDefinition, FunctionSignature};
pub use handler::{
    from_fn, FnFunction, FunctionContext, FunctionError, FunctionOutput, GatewayFunction,
    HttpContext, Params,
};
pub use registry::{FunctionRegistry, RegistryError};
