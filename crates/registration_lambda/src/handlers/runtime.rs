use serde_json::Value;

use crate::error::HandlerError;
use crate::handlers::api::route_api_event;
use crate::handlers::generator::{handle_sqs_batch, GeneratorConfig};
use crate::handlers::post_confirmation::handle_post_confirmation;
use crate::handlers::Services;

const POST_CONFIRMATION_PREFIX: &str = "PostConfirmation_";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    SqsBatch,
    PostConfirmation,
    Http,
}

pub fn classify_event(event: &Value) -> EventKind {
    if is_sqs_event(event) {
        EventKind::SqsBatch
    } else if is_post_confirmation_event(event) {
        EventKind::PostConfirmation
    } else {
        EventKind::Http
    }
}

/// Single entry point for deployments that wire every trigger to one
/// function.
pub fn handle_event(
    event: Value,
    services: &Services<'_>,
    generator: &GeneratorConfig,
    received_at: &str,
) -> Result<Value, HandlerError> {
    let kind = classify_event(&event);
    tracing::debug!(component = "runtime", event = "event_classified", kind = ?kind);

    match kind {
        EventKind::SqsBatch => {
            let response = handle_sqs_batch(
                &event,
                received_at,
                generator,
                services.store,
                services.model,
                services.topic,
            )?;
            Ok(serde_json::to_value(response)?)
        }
        EventKind::PostConfirmation => handle_post_confirmation(event, services.topic),
        EventKind::Http => {
            let response = route_api_event(event, services, received_at)?;
            Ok(serde_json::to_value(response)?)
        }
    }
}

fn is_sqs_event(event: &Value) -> bool {
    event
        .get("Records")
        .and_then(Value::as_array)
        .map(|records| {
            !records.is_empty()
                && records.iter().all(|record| {
                    record
                        .get("eventSource")
                        .and_then(Value::as_str)
                        .map(|source| source == "aws:sqs")
                        .unwrap_or(false)
                })
        })
        .unwrap_or(false)
}

fn is_post_confirmation_event(event: &Value) -> bool {
    event
        .get("triggerSource")
        .and_then(Value::as_str)
        .map(|source| source.starts_with(POST_CONFIRMATION_PREFIX))
        .unwrap_or(false)
}
