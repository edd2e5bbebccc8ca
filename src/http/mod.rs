//! Transport-neutral HTTP types exchanged between the listener and the dispatcher.

mod request;
mod response;

pub use request::{GatewayRequest, Method};
pub use response::{GatewayResponse, StatusCode};
