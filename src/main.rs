//! fezz-gateway - example server
//!
//! Runs the gateway with a handful of sample functions.

use fezz_gateway::function::RegistryError;
use fezz_gateway::prelude::*;
use fezz_gateway::value::Object;
use tracing_subscriber::EnvFilter;

/// Adds three numbers, each with a default.
#[gateway_function(name = "my_function", description = "Adds a, b and c")]
async fn my_function(params: Params, _ctx: &FunctionContext) -> Result<FunctionOutput, FunctionError> {
    let sum: f64 = ["a", "b", "c"]
        .iter()
        .filter_map(|name| params.get(*name).and_then(Value::as_f64))
        .sum();
    Ok(FunctionOutput::new(Value::number(sum)))
}

/// Returns every parameter it received, declared or not.
#[gateway_function(description = "Echoes its parameters")]
async fn reflect(params: Params, _ctx: &FunctionContext) -> Result<FunctionOutput, FunctionError> {
    Ok(FunctionOutput::new(Value::Object(params)))
}

/// Returns the raw request body as text.
#[gateway_function(description = "Echoes the raw request body")]
async fn http_body(_params: Params, ctx: &FunctionContext) -> Result<FunctionOutput, FunctionError> {
    Ok(FunctionOutput::new(ctx.http.body_text()))
}

/// Simulates slow work; meant to be called as `/bg/:bg`.
struct BackgroundFunction;

#[async_trait]
impl GatewayFunction for BackgroundFunction {
    async fn call(
        &self,
        params: Params,
        ctx: &FunctionContext,
    ) -> Result<FunctionOutput, FunctionError> {
        tokio::time::sleep(std::time::Duration::from_millis(250)).await;
        tracing::info!(
            "Background work for {} finished with {} parameter(s)",
            ctx.request_id,
            params.len()
        );
        Ok(FunctionOutput::default())
    }
}

fn definitions() -> Vec<FunctionDefinition> {
    vec![
        MyFunctionFunction::definition()
            .param(ParameterSchema::number("a").default_value(1))
            .param(ParameterSchema::number("b").default_value(2))
            .param(ParameterSchema::number("c").default_value(3))
            .returns(ParameterSchema::number("sum")),
        ReflectFunction::definition(),
        HttpBodyFunction::definition(),
        FunctionDefinition::new("bg", BackgroundFunction)
            .with_description("Runs detached")
            .param(ParameterSchema::string("data").optional())
            .param(ParameterSchema::string("otherdata").optional())
            .param(ParameterSchema::string("discarded").optional())
            .background(BackgroundMode::Default),
        FunctionDefinition::new(
            "html",
            from_fn(|params: Params, _ctx: FunctionContext| async move {
                let name = params.get("name").and_then(Value::as_str).unwrap_or("world");
                let mut headers = Object::new();
                headers.insert("Content-Type".to_string(), Value::from("text/html"));
                let mut response = Object::new();
                response.insert("headers".to_string(), Value::Object(headers));
                response.insert("body".to_string(), Value::from(format!("<b>hello {}</b>", name)));
                Ok(FunctionOutput::new(Value::Object(response)))
            }),
        )
        .param(ParameterSchema::string("name").default_value("world"))
        .returns(ParameterSchema::new("response", ParameterType::ObjectHttp)),
        FunctionDefinition::new(
            "runtime/fatal",
            from_fn(|_params: Params, _ctx: FunctionContext| async {
                Err(FunctionError::fatal("The function cannot continue"))
            }),
        ),
    ]
}

fn build_server(config: GatewayConfig) -> Result<GatewayServer, RegistryError> {
    let mut server = GatewayServer::new(config);
    for definition in definitions() {
        server.register_function(definition)?;
    }
    Ok(server)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    tracing::info!("Starting fezz gateway...");

    let config = GatewayConfig::from_env()?.env("ENVIRONMENT", "development");
    let server = build_server(config)?;
    let port = server.config().port;

    tracing::info!("Registered functions: {}", server.registry().names().join(", "));
    tracing::info!("Try: curl 'http://localhost:{}/my_function/?a=10&b=20'", port);
    tracing::info!(
        "Try: curl -X POST -H 'Content-Type: application/json' -d '{{\"data\":\"x\"}}' http://localhost:{}/bg/params/:bg",
        port
    );
    tracing::info!("Health check: curl http://localhost:{}/_health", port);

    server.run().await
}
