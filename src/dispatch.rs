//! Request dispatch.
//!
//! The [`Dispatcher`] runs one request through path resolution, parameter
//! resolution, invocation and result sanitization, and classifies every
//! failure along the way. It never fails itself: whatever happens, the
//! caller gets a complete [`GatewayResponse`] carrying the shared headers.

use crate::error::GatewayError;
use crate::function::{
    FunctionContext, FunctionDefinition, FunctionOutput, FunctionRegistry, HttpContext, Params,
};
use crate::http::{GatewayRequest, GatewayResponse, Method, StatusCode};
use crate::params::{resolve_params, ParameterSources, ResolvedParams};
use crate::routing::{BackgroundMode, Execution, PathResolution, PathResolver};
use crate::runtime::GatewayConfig;
use crate::sanitize::ResultSanitizer;
use crate::value::{Object, Value};
use bytes::Bytes;
use std::any::Any;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Identity header naming the invocation protocol. Functions cannot override it.
pub const IDENTITY_HEADER: &str = "x-faaslang";
const IDENTITY_VALUE: &str = "true";

pub const ALLOW_ORIGIN_HEADER: &str = "access-control-allow-origin";
pub const ALLOW_HEADERS_HEADER: &str = "access-control-allow-headers";
pub const EXPOSE_HEADERS_HEADER: &str = "access-control-expose-headers";

/// Request identity and timing, used for logs and to build each
/// [`FunctionContext`]. Parameter state lives in [`ResolvedParams`].
struct RequestContext {
    request_id: String,
    started: Instant,
    method: Method,
    path: String,
}

impl RequestContext {
    fn new(request: &GatewayRequest, request_id: String) -> Self {
        Self {
            request_id,
            started: Instant::now(),
            method: request.method.clone(),
            path: request.path().to_string(),
        }
    }

    fn function_context(
        &self,
        definition: &FunctionDefinition,
        config: &GatewayConfig,
        request: &GatewayRequest,
        background: Option<BackgroundMode>,
    ) -> FunctionContext {
        let mut ctx = FunctionContext::new(definition.name(), self.request_id.as_str()).with_http(
            HttpContext {
                method: request.method.clone(),
                path: self.path.clone(),
                headers: request.headers.clone(),
                body: request.body.clone().unwrap_or_default(),
            },
        );
        ctx.env = config.env.clone();
        ctx.background = background;
        ctx
    }
}

/// Runs requests against an immutable function registry.
#[derive(Clone)]
pub struct Dispatcher {
    registry: Arc<FunctionRegistry>,
    config: Arc<GatewayConfig>,
}

impl Dispatcher {
    pub fn new(registry: FunctionRegistry, config: GatewayConfig) -> Self {
        Self {
            registry: Arc::new(registry),
            config: Arc::new(config),
        }
    }

    pub fn registry(&self) -> &FunctionRegistry {
        &self.registry
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// Handle a request with a freshly generated request id.
    pub async fn dispatch(&self, request: GatewayRequest) -> GatewayResponse {
        self.dispatch_with_id(request, generate_request_id()).await
    }

    /// Handle a request.
    pub async fn dispatch_with_id(
        &self,
        request: GatewayRequest,
        request_id: String,
    ) -> GatewayResponse {
        let ctx = RequestContext::new(&request, request_id);
        debug!("Dispatching {} {} [{}]", ctx.method, ctx.path, ctx.request_id);

        let mut response = match self.handle(&ctx, request).await {
            Ok(response) => response,
            Err(err) => {
                if err.is_client_fault() {
                    warn!("{} {} failed: {} [{}]", ctx.method, ctx.path, err, ctx.request_id);
                } else {
                    error!("{} {} failed: {} [{}]", ctx.method, ctx.path, err, ctx.request_id);
                }
                err.into_response()
            }
        };

        if matches!(ctx.method, Method::Head | Method::Options) {
            response.body = None;
        }
        self.apply_shared_headers(&mut response);

        debug!(
            "{} {} -> {} in {:?} [{}]",
            ctx.method,
            ctx.path,
            response.status.0,
            ctx.started.elapsed(),
            ctx.request_id
        );
        response
    }

    /// Render a failure the way [`Dispatcher::dispatch`] would.
    pub fn error_response(&self, err: GatewayError) -> GatewayResponse {
        let mut response = err.into_response();
        self.apply_shared_headers(&mut response);
        response
    }

    async fn handle(
        &self,
        ctx: &RequestContext,
        request: GatewayRequest,
    ) -> Result<GatewayResponse, GatewayError> {
        let has_user_agent = request.get_header("user-agent").is_some();
        let resolution = PathResolver::new(&self.registry).resolve(&request.url, has_user_agent)?;

        if matches!(request.method, Method::Options | Method::Head) {
            return Ok(GatewayResponse::ok());
        }
        let (definition, execution) = match resolution {
            PathResolution::Redirect { location } => {
                debug!("Redirecting {} to {} [{}]", ctx.path, location, ctx.request_id);
                return Ok(GatewayResponse::redirect(location));
            }
            PathResolution::Dispatch {
                definition,
                execution,
            } => (definition, execution),
        };

        if let Execution::Background(_) = execution {
            if !definition.signature().background {
                return Err(GatewayError::client(format!(
                    "Function \"{}\" does not support background execution",
                    definition.name()
                )));
            }
        }
        if request.body.as_ref().is_some_and(|body| body.len() > self.config.max_body_size) {
            return Err(GatewayError::client("Request body too large"));
        }

        let sources = ParameterSources::parse(
            &request.method,
            request.query(),
            &request.headers,
            request.body.as_ref(),
        )
        .await?;
        let resolved = resolve_params(definition.params(), sources)?;

        match execution {
            Execution::Foreground => {
                let function_ctx = ctx.function_context(&definition, &self.config, &request, None);
                let output = invoke(Arc::clone(&definition), resolved.values, function_ctx).await?;
                ResultSanitizer::new(definition.returns_schema()).sanitize(output)
            }
            Execution::Background(mode) => {
                let response = acknowledge(mode, &definition, &resolved, &ctx.request_id)?;
                let function_ctx =
                    ctx.function_context(&definition, &self.config, &request, Some(mode));
                spawn_background(definition, resolved.values, function_ctx);
                Ok(response)
            }
        }
    }

    /// Add the CORS headers unless the response already set them, and
    /// always stamp the identity header.
    fn apply_shared_headers(&self, response: &mut GatewayResponse) {
        for (name, value) in [
            (ALLOW_ORIGIN_HEADER, &self.config.allow_origin),
            (ALLOW_HEADERS_HEADER, &self.config.allow_headers),
            (EXPOSE_HEADERS_HEADER, &self.config.expose_headers),
        ] {
            response
                .headers
                .entry(name.to_string())
                .or_insert_with(|| value.clone());
        }
        response.set_header(IDENTITY_HEADER, IDENTITY_VALUE);
    }
}

/// Run a function in its own task so a panic is contained and classified.
async fn invoke(
    definition: Arc<FunctionDefinition>,
    params: Params,
    ctx: FunctionContext,
) -> Result<FunctionOutput, GatewayError> {
    let handler = definition.handler();
    let task = tokio::spawn(async move { handler.call(params, &ctx).await });

    match task.await {
        Ok(result) => result.map_err(GatewayError::from),
        Err(err) if err.is_panic() => Err(GatewayError::runtime(format!(
            "Function \"{}\" panicked: {}",
            definition.name(),
            panic_message(err.into_panic())
        ))),
        Err(err) => Err(GatewayError::fatal(format!(
            "Function \"{}\" did not complete: {}",
            definition.name(),
            err
        ))),
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Detach a background invocation. Its failures can only be logged.
fn spawn_background(definition: Arc<FunctionDefinition>, params: Params, ctx: FunctionContext) {
    tokio::spawn(async move {
        let request_id = ctx.request_id.clone();
        let name = definition.name().to_string();
        match invoke(definition, params, ctx).await {
            Ok(_) => info!("Background function \"{}\" completed [{}]", name, request_id),
            Err(err) => error!(
                "Background function \"{}\" failed: {}: {} [{}]",
                name,
                err.kind(),
                err,
                request_id
            ),
        }
    });
}

/// The `202 Accepted` response for a background invocation.
fn acknowledge(
    mode: BackgroundMode,
    definition: &FunctionDefinition,
    resolved: &ResolvedParams,
    request_id: &str,
) -> Result<GatewayResponse, GatewayError> {
    let accepted = GatewayResponse::new(StatusCode::ACCEPTED);
    let response = match mode {
        BackgroundMode::Default => accepted
            .header("Content-Type", "text/plain")
            .body(format!("initiated \"{}\" ...", definition.name())),
        BackgroundMode::Info => {
            let names: Vec<&str> = resolved.values.keys().map(String::as_str).collect();
            accepted.header("Content-Type", "text/plain").body(format!(
                "function: {}\nmode: {}\nrequest_id: {}\nparams: {}\n",
                definition.name(),
                mode,
                request_id,
                names.join(", ")
            ))
        }
        BackgroundMode::Empty => accepted.body(Bytes::new()),
        BackgroundMode::Params => json_ack(accepted, resolved.values.clone())?,
        BackgroundMode::ParamsSpecific(count) => {
            let selected: Object = definition
                .params()
                .iter()
                .take(count)
                .filter(|param| resolved.supplied.contains(&param.name))
                .filter_map(|param| {
                    resolved
                        .values
                        .get(&param.name)
                        .map(|value| (param.name.clone(), value.clone()))
                })
                .collect();
            json_ack(accepted, selected)?
        }
    };
    Ok(response)
}

fn json_ack(response: GatewayResponse, params: Object) -> Result<GatewayResponse, GatewayError> {
    let bytes = Value::Object(params)
        .to_json_vec()
        .map_err(|err| GatewayError::fatal(format!("Could not serialize parameters: {}", err)))?;
    Ok(response.header("Content-Type", "application/json").body(bytes))
}

/// Generate a unique request ID.
pub fn generate_request_id() -> String {
    use std::time::{SystemTime, UNIX_EPOCH};
    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_nanos())
        .unwrap_or_default();
    format!("{:x}", timestamp)
}
