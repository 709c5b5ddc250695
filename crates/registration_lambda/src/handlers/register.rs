use registration_core::contract::{
    validate_registration, Registration, RegistrationRecord, RegistrationRequest,
};
use serde_json::Value;

use crate::adapters::queue::RegistrationQueue;
use crate::adapters::store::RegistrationStore;
use crate::error::HandlerError;

/// Persists a submitted registration and queues it for content generation.
///
/// Nothing is written unless the payload validates and both the store and
/// the queue are configured. The store write and the enqueue are not atomic.
pub fn handle_register(
    payload: Value,
    created_at: &str,
    store: &dyn RegistrationStore,
    queue: &dyn RegistrationQueue,
) -> Result<Registration, HandlerError> {
    let request = serde_json::from_value::<RegistrationRequest>(payload)
        .map_err(|error| HandlerError::validation(format!("Malformed request: {error}")))?;
    let registration = validate_registration(request)?;

    store.check_configured()?;
    queue.check_configured()?;

    tracing::info!(
        component = "register_handler",
        event = "registration_received",
        email = %registration.email
    );

    store.put_registration(&RegistrationRecord::new(&registration, created_at))?;
    queue.enqueue(&registration.queue_message_body()?)?;

    tracing::info!(
        component = "register_handler",
        event = "registration_enqueued",
        email = %registration.email
    );
    Ok(registration)
}
