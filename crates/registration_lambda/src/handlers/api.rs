use std::collections::HashMap;

use base64::Engine;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::{HandlerError, ServiceError};
use crate::handlers::register::handle_register;
use crate::handlers::subscription_status::{subscription_confirmed, SubscriptionStatusResponse};
use crate::handlers::Services;

pub const REGISTER_PATH: &str = "/register";
pub const SUBSCRIPTION_CONFIRMED_PATH: &str = "/subscription_confirmed";

const ALLOWED_HEADERS: &str =
    "Authorization,Content-Type,X-Amz-Date,X-Amz-Security-Token,X-Api-Key";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ApiGatewayResponse {
    #[serde(rename = "statusCode")]
    pub status_code: u16,
    pub headers: Value,
    pub body: String,
}

/// The parts of an API Gateway proxy event the router looks at.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: String,
    pub path: String,
    pub query: HashMap<String, String>,
    pub body: Option<Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Route {
    Register,
    SubscriptionConfirmed,
    Preflight,
}

/// Maps `(method, path)` to a handler and renders its result.
///
/// Client mistakes become 4xx responses. Missing deployment settings become
/// a 500 before any side effect. Any other downstream failure is returned
/// as an error so the invocation fails.
pub fn route_api_event(
    event: Value,
    services: &Services<'_>,
    received_at: &str,
) -> Result<ApiGatewayResponse, HandlerError> {
    let request = match ApiRequest::from_event(&event) {
        Ok(value) => value,
        Err(message) => return Ok(validation_error_response(&message)),
    };

    let route = match resolve_route(&request.method, &request.path) {
        Ok(route) => route,
        Err(response) => return Ok(response),
    };

    tracing::info!(
        component = "api",
        event = "request_routed",
        method = %request.method,
        path = %request.path,
        route = ?route
    );

    let result = match route {
        Route::Preflight => return Ok(preflight_response()),
        Route::Register => register(request, services, received_at),
        Route::SubscriptionConfirmed => subscription_status(&request, services),
    };

    match result {
        Ok(response) => Ok(response),
        Err(HandlerError::Validation(error)) => {
            tracing::warn!(
                component = "api",
                event = "malformed_request",
                path = %request_path(&event),
                error = %error
            );
            Ok(validation_error_response(error.message()))
        }
        Err(HandlerError::Service(ServiceError::Misconfigured(name))) => {
            tracing::error!(component = "api", event = "misconfiguration", setting = name);
            Ok(error_response(
                500,
                json!({
                    "error": "misconfiguration",
                    "message": format!("{name} must be configured"),
                }),
            ))
        }
        Err(error) => Err(error),
    }
}

impl ApiRequest {
    /// Reads REST (v1) proxy events, with fallbacks for HTTP API (v2) fields.
    pub fn from_event(event: &Value) -> Result<Self, String> {
        let Some(object) = event.as_object() else {
            return Err("Request payload must be a JSON object".to_string());
        };

        let method = object
            .get("httpMethod")
            .and_then(Value::as_str)
            .or_else(|| {
                event
                    .pointer("/requestContext/http/method")
                    .and_then(Value::as_str)
            })
            .ok_or_else(|| "Request is missing httpMethod".to_string())?
            .to_ascii_uppercase();

        let path = object
            .get("path")
            .and_then(Value::as_str)
            .or_else(|| object.get("rawPath").and_then(Value::as_str))
            .ok_or_else(|| "Request is missing path".to_string())?;

        let query = object
            .get("queryStringParameters")
            .and_then(Value::as_object)
            .map(|parameters| {
                parameters
                    .iter()
                    .filter_map(|(key, value)| {
                        value.as_str().map(|text| (key.clone(), text.to_string()))
                    })
                    .collect()
            })
            .unwrap_or_default();

        let is_base64 = object
            .get("isBase64Encoded")
            .and_then(Value::as_bool)
            .unwrap_or(false);
        let body = decode_body(object.get("body"), is_base64)?;

        Ok(Self {
            method,
            path: normalize_path(path),
            query,
            body,
        })
    }
}

fn register(
    request: ApiRequest,
    services: &Services<'_>,
    received_at: &str,
) -> Result<ApiGatewayResponse, HandlerError> {
    let payload = request
        .body
        .ok_or_else(|| HandlerError::validation("Request body is required"))?;
    let registration = handle_register(payload, received_at, services.store, services.queue)?;
    success_response(200, registration.payload())
}

fn subscription_status(
    request: &ApiRequest,
    services: &Services<'_>,
) -> Result<ApiGatewayResponse, HandlerError> {
    let email = request
        .query
        .get("id")
        .map(|value| value.trim())
        .filter(|value| !value.is_empty())
        .ok_or_else(|| HandlerError::validation("id parameter missing"))?;

    services.topic.check_configured()?;
    let confirmed = subscription_confirmed(email, services.topic)?;
    success_response(
        200,
        SubscriptionStatusResponse {
            subscription_confirmed: confirmed,
        },
    )
}

fn resolve_route(method: &str, path: &str) -> Result<Route, ApiGatewayResponse> {
    let route = match (method, path) {
        ("OPTIONS", REGISTER_PATH | SUBSCRIPTION_CONFIRMED_PATH) => Route::Preflight,
        ("POST", REGISTER_PATH) => Route::Register,
        ("GET", SUBSCRIPTION_CONFIRMED_PATH) => Route::SubscriptionConfirmed,
        (_, REGISTER_PATH | SUBSCRIPTION_CONFIRMED_PATH) => {
            return Err(error_response(
                405,
                json!({
                    "error": "method_not_allowed",
                    "message": format!("{method} is not supported on {path}"),
                }),
            ));
        }
        _ => {
            return Err(error_response(
                404,
                json!({
                    "error": "not_found",
                    "message": format!("No route for {path}"),
                }),
            ));
        }
    };
    Ok(route)
}

fn decode_body(body: Option<&Value>, is_base64: bool) -> Result<Option<Value>, String> {
    match body {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Object(_)) => Ok(body.cloned()),
        Some(Value::String(text)) if text.trim().is_empty() => Ok(None),
        Some(Value::String(text)) => {
            let decoded = if is_base64 {
                let bytes = base64::engine::general_purpose::STANDARD
                    .decode(text.trim())
                    .map_err(|error| format!("Malformed base64 body: {error}"))?;
                String::from_utf8(bytes)
                    .map_err(|error| format!("Request body must be UTF-8: {error}"))?
            } else {
                text.clone()
            };
            serde_json::from_str(&decoded)
                .map(Some)
                .map_err(|error| format!("Malformed JSON body: {error}"))
        }
        _ => Err("Request body must be a JSON object".to_string()),
    }
}

fn normalize_path(path: &str) -> String {
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else {
        trimmed.to_string()
    }
}

fn request_path(event: &Value) -> &str {
    event.get("path").and_then(Value::as_str).unwrap_or_default()
}

fn response_headers() -> Value {
    json!({
        "Content-Type": "application/json",
        "Access-Control-Allow-Origin": "*",
        "Access-Control-Allow-Methods": "GET,POST,OPTIONS",
        "Access-Control-Allow-Headers": ALLOWED_HEADERS,
    })
}

fn preflight_response() -> ApiGatewayResponse {
    ApiGatewayResponse {
        status_code: 204,
        headers: response_headers(),
        body: String::new(),
    }
}

fn validation_error_response(message: &str) -> ApiGatewayResponse {
    error_response(
        400,
        json!({
            "error": "validation_error",
            "message": message,
        }),
    )
}

fn success_response(
    status_code: u16,
    payload: impl Serialize,
) -> Result<ApiGatewayResponse, HandlerError> {
    Ok(ApiGatewayResponse {
        status_code,
        headers: response_headers(),
        body: serde_json::to_string(&payload)?,
    })
}

fn error_response(status_code: u16, payload: Value) -> ApiGatewayResponse {
    ApiGatewayResponse {
        status_code,
        headers: response_headers(),
        body: payload.to_string(),
    }
}
