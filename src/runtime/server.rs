//! Gateway HTTP server.

use crate::dispatch::{generate_request_id, Dispatcher};
use crate::error::GatewayError;
use crate::function::{FunctionDefinition, FunctionRegistry, RegistryError};
use crate::http::{GatewayRequest, GatewayResponse, Method};
use crate::runtime::GatewayConfig;
use bytes::Bytes;
use http_body_util::{BodyExt, Full, Limited};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response};
use hyper_util::rt::TokioIo;
use std::collections::HashMap;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tracing::{debug, error, info, warn};

/// Gateway server.
///
/// Functions are registered up front; once [`GatewayServer::run`] is called
/// the registry is frozen and shared read-only by every connection.
pub struct GatewayServer {
    config: GatewayConfig,
    registry: FunctionRegistry,
}

impl GatewayServer {
    /// Create a new gateway server.
    pub fn new(config: GatewayConfig) -> Self {
        Self {
            config,
            registry: FunctionRegistry::new(),
        }
    }

    /// Create a new gateway server with default configuration.
    pub fn with_defaults() -> Self {
        Self::new(GatewayConfig::default())
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    pub fn registry(&self) -> &FunctionRegistry {
        &self.registry
    }

    /// Register a function with the server.
    pub fn register_function(&mut self, definition: FunctionDefinition) -> Result<(), RegistryError> {
        self.registry.register(definition)
    }

    /// Freeze the registry into a dispatcher.
    pub fn into_dispatcher(self) -> Dispatcher {
        Dispatcher::new(self.registry, self.config)
    }

    /// Start the HTTP server.
    pub async fn run(self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let addr: SocketAddr = self.config.bind_addr().parse()?;
        let listener = TcpListener::bind(addr).await?;

        info!(
            "Gateway listening on {} with {} function(s)",
            addr,
            self.registry.len()
        );

        let dispatcher = self.into_dispatcher();

        loop {
            let (stream, remote_addr) = listener.accept().await?;
            let io = TokioIo::new(stream);

            let dispatcher = dispatcher.clone();

            tokio::task::spawn(async move {
                let service = service_fn(move |req| {
                    let dispatcher = dispatcher.clone();
                    async move { handle_request(req, dispatcher, remote_addr).await }
                });

                if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
                    error!("Error serving connection: {:?}", err);
                }
            });
        }
    }
}

/// Handle an incoming HTTP request.
async fn handle_request(
    req: Request<Incoming>,
    dispatcher: Dispatcher,
    remote_addr: SocketAddr,
) -> Result<Response<Full<Bytes>>, hyper::Error> {
    let request_id = generate_request_id();
    debug!(
        "Handling request: {} {} from {} [{}]",
        req.method(),
        req.uri(),
        remote_addr,
        request_id
    );

    if dispatcher.config().enable_health && req.uri().path() == "/_health" {
        return Ok(build_response(GatewayResponse::text("OK")));
    }

    let request = match convert_request(req, dispatcher.config().max_body_size).await {
        Ok(request) => request,
        Err(err) => {
            warn!("Failed to read request: {} [{}]", err, request_id);
            return Ok(build_response(dispatcher.error_response(err)));
        }
    };

    let response = dispatcher.dispatch_with_id(request, request_id).await;
    Ok(build_response(response))
}

/// Convert a hyper Request to a GatewayRequest, buffering the whole body.
async fn convert_request(
    req: Request<Incoming>,
    max_body_size: usize,
) -> Result<GatewayRequest, GatewayError> {
    let (parts, body) = req.into_parts();
    let method = Method::from(&parts.method);
    let url = parts
        .uri
        .path_and_query()
        .map(|path_and_query| path_and_query.as_str().to_string())
        .unwrap_or_else(|| parts.uri.path().to_string());

    let mut headers = HashMap::new();
    for (name, value) in &parts.headers {
        if let Ok(v) = value.to_str() {
            headers.insert(name.as_str().to_string(), v.to_string());
        }
    }

    let body_bytes = Limited::new(body, max_body_size)
        .collect()
        .await
        .map_err(|err| {
            if err.is::<http_body_util::LengthLimitError>() {
                GatewayError::client("Request body too large")
            } else {
                GatewayError::client(format!("Could not read request body: {}", err))
            }
        })?
        .to_bytes();
    let body = if body_bytes.is_empty() {
        None
    } else {
        Some(body_bytes)
    };

    Ok(GatewayRequest {
        method,
        url,
        headers,
        body,
    })
}

/// Build a hyper Response from a GatewayResponse.
fn build_response(response: GatewayResponse) -> Response<Full<Bytes>> {
    let status = hyper::StatusCode::from_u16(response.status.0).unwrap_or_else(|_| {
        warn!(
            "Invalid status code {}, falling back to 500 Internal Server Error",
            response.status.0
        );
        hyper::StatusCode::INTERNAL_SERVER_ERROR
    });

    let mut built = Response::new(Full::new(response.body.unwrap_or_default()));
    *built.status_mut() = status;
    for (name, value) in response.headers {
        match (
            hyper::header::HeaderName::from_bytes(name.as_bytes()),
            hyper::header::HeaderValue::from_str(&value),
        ) {
            (Ok(name), Ok(value)) => {
                built.headers_mut().insert(name, value);
            }
            _ => warn!("Dropping invalid response header {:?}", name),
        }
    }
    built
}
