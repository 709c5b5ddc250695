use serde_json::Value;

use crate::adapters::topic::NotificationTopic;
use crate::error::HandlerError;

const EMAIL_ALIAS_ATTRIBUTE: &str = "cognito:email_alias";

/// Subscribes a newly confirmed user's email to the welcome topic. The
/// identity provider expects the trigger event back unchanged.
pub fn handle_post_confirmation(
    event: Value,
    topic: &dyn NotificationTopic,
) -> Result<Value, HandlerError> {
    let email = confirmed_email(&event)?;
    let trigger_source = event
        .get("triggerSource")
        .and_then(Value::as_str)
        .unwrap_or_default();
    tracing::info!(
        component = "post_confirmation",
        event = "user_confirmed",
        email = %email,
        trigger_source
    );

    let subscription_arn = topic.subscribe_email(&email)?;
    tracing::info!(
        component = "post_confirmation",
        event = "subscription_requested",
        email = %email,
        subscription_arn = subscription_arn.as_deref().unwrap_or("unknown")
    );

    Ok(event)
}

fn confirmed_email(event: &Value) -> Result<String, HandlerError> {
    let attributes = event
        .get("request")
        .and_then(|request| request.get("userAttributes"))
        .ok_or_else(|| {
            HandlerError::validation("trigger event must include request.userAttributes")
        })?;

    ["email", EMAIL_ALIAS_ATTRIBUTE]
        .iter()
        .filter_map(|key| attributes.get(*key).and_then(Value::as_str))
        .map(str::trim)
        .find(|email| !email.is_empty())
        .map(str::to_string)
        .ok_or_else(|| HandlerError::validation("confirmed user has no email attribute"))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::adapters::memory::MemoryTopic;

    fn trigger_event(attributes: Value) -> Value {
        json!({
            "version": "1",
            "region": "us-east-1",
            "userPoolId": "us-east-1_example",
            "userName": "8448b4a8-0041-7022-555e-ca588f55b8b9",
            "triggerSource": "PostConfirmation_ConfirmSignUp",
            "request": {"userAttributes": attributes},
            "response": {}
        })
    }

    #[test]
    fn subscribes_email_and_returns_event_unchanged() {
        let topic = MemoryTopic::new();
        let event = trigger_event(json!({
            "sub": "8448b4a8-0041-7022-555e-ca588f55b8b9",
            "email_verified": "true",
            "cognito:user_status": "CONFIRMED",
            "email": "ada@example.com"
        }));

        let returned =
            handle_post_confirmation(event.clone(), &topic).expect("trigger should succeed");

        assert_eq!(returned, event);
        assert_eq!(
            topic.filter_policy("ada@example.com").as_deref(),
            Some(r#"{"recipient":["ada@example.com"]}"#)
        );
    }

    #[test]
    fn falls_back_to_email_alias() {
        let topic = MemoryTopic::new();
        let event = trigger_event(json!({"cognito:email_alias": "grace@example.com"}));

        handle_post_confirmation(event, &topic).expect("trigger should succeed");

        assert!(topic.filter_policy("grace@example.com").is_some());
    }

    #[test]
    fn missing_email_is_an_error() {
        let topic = MemoryTopic::new();
        let event = trigger_event(json!({"sub": "8448b4a8"}));

        let error = handle_post_confirmation(event, &topic).expect_err("trigger should fail");
        assert!(error.to_string().contains("no email attribute"));
    }
}
